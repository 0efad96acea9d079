use async_trait::async_trait;

use admuter_core_types::{AdMuterError, SiteId};
use page_port::TreePort;

use crate::SiteAdapter;

const PLAYER: &str = "#movie_player";
const VIDEO: &str = "video.html5-main-video";
const AD_MODULE: &str = ".ytp-ad-module";
const AD_SHOWING_CLASS: &str = "ad-showing";

const SKIP_SELECTORS: &[&str] = &[
    ".ytp-ad-skip-button",
    ".ytp-ad-skip-button-modern",
    ".videoAdUiSkipButton",
    ".ytp-skip-ad-button",
];

const OVERLAY_SELECTORS: &[&str] = &[".ytp-ad-overlay-close-button"];

/// YouTube integration. Ads announce themselves either as an
/// `ad-showing` class on the player or as populated ad-module slots;
/// either signal alone counts.
pub struct YoutubeAdapter;

#[async_trait]
impl SiteAdapter for YoutubeAdapter {
    fn site(&self) -> SiteId {
        SiteId::Youtube
    }

    fn player_selector(&self) -> &'static str {
        PLAYER
    }

    fn video_selector(&self) -> &'static str {
        VIDEO
    }

    fn skip_selectors(&self) -> &'static [&'static str] {
        SKIP_SELECTORS
    }

    fn overlay_selectors(&self) -> &'static [&'static str] {
        OVERLAY_SELECTORS
    }

    fn ad_playback_rate(&self) -> Option<f64> {
        Some(16.0)
    }

    fn allow_duration_force(&self) -> bool {
        true
    }

    async fn is_ad_showing(&self, tree: &dyn TreePort) -> Result<bool, AdMuterError> {
        let Some(player) = tree.query(PLAYER).await? else {
            return Ok(false);
        };
        if tree.has_class(&player, AD_SHOWING_CLASS).await? {
            return Ok(true);
        }
        if let Some(module) = tree.query(AD_MODULE).await? {
            return Ok(tree.child_count(&module).await? > 0);
        }
        Ok(false)
    }
}
