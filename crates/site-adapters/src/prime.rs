use async_trait::async_trait;

use admuter_core_types::{AdMuterError, SiteId};
use page_port::TreePort;

use crate::SiteAdapter;

const PLAYER: &str = "video";
const VIDEO: &str = "video";
const SKIP_BUTTON: &str = ".atvwebplayersdk-ad-skip-button, .adSkipButton";
const TIME_LEFT: &str = ".atvwebplayersdk-ad-time-left";

const SKIP_SELECTORS: &[&str] = &[".atvwebplayersdk-ad-skip-button", ".adSkipButton"];

/// Prime Video integration. Ads surface either a skip button or an
/// ad-countdown element; there is no player-level marker class.
pub struct PrimeAdapter;

#[async_trait]
impl SiteAdapter for PrimeAdapter {
    fn site(&self) -> SiteId {
        SiteId::Prime
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

    async fn is_ad_showing(&self, tree: &dyn TreePort) -> Result<bool, AdMuterError> {
        if tree.query(SKIP_BUTTON).await?.is_some() {
            return Ok(true);
        }
        Ok(tree.query(TIME_LEFT).await?.is_some())
    }
}
