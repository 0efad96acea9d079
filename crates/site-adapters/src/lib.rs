//! Platform-specific integration data for the detection engine.
//!
//! Each supported site supplies locators and an ad predicate behind one
//! shared trait; the engine core never knows which structural signal a
//! platform uses, only the boolean result. Selectors here are the part
//! of the system expected to rot as host pages change, so they live in
//! one place per platform and nowhere else.

mod hotstar;
mod prime;
mod youtube;

use std::sync::Arc;

use async_trait::async_trait;

use admuter_core_types::{AdMuterError, SiteId};
use page_port::TreePort;

pub use hotstar::HotstarAdapter;
pub use prime::PrimeAdapter;
pub use youtube::YoutubeAdapter;

/// Shared site-integration interface.
#[async_trait]
pub trait SiteAdapter: Send + Sync {
    fn site(&self) -> SiteId;

    fn player_selector(&self) -> &'static str;

    fn video_selector(&self) -> &'static str;

    /// Skip-control locators, most specific first.
    fn skip_selectors(&self) -> &'static [&'static str];

    /// Overlay/close controls dismissed regardless of skip-button
    /// presence.
    fn overlay_selectors(&self) -> &'static [&'static str] {
        &[]
    }

    /// Playback rate forced while an ad runs, when the platform
    /// tolerates it.
    fn ad_playback_rate(&self) -> Option<f64> {
        None
    }

    /// Rates above this are assumed engine-set and restored to 1.0 when
    /// the ad ends.
    fn rate_restore_threshold(&self) -> f64 {
        2.0
    }

    /// Whether forcing the video position past its duration is an
    /// acceptable last-resort skip on this platform.
    fn allow_duration_force(&self) -> bool {
        false
    }

    /// Fresh evaluation of "is an ad rendered right now" against the
    /// current tree. Never cached.
    async fn is_ad_showing(&self, tree: &dyn TreePort) -> Result<bool, AdMuterError>;
}

/// Adapter instance for a site.
pub fn adapter_for(site: SiteId) -> Arc<dyn SiteAdapter> {
    match site {
        SiteId::Youtube => Arc::new(YoutubeAdapter),
        SiteId::Hotstar => Arc::new(HotstarAdapter),
        SiteId::Prime => Arc::new(PrimeAdapter),
    }
}
