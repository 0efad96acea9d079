use async_trait::async_trait;

use admuter_core_types::{AdMuterError, SiteId};
use page_port::TreePort;

use crate::SiteAdapter;

const PLAYER: &str = ".shaka-video-container, .player-container";
const VIDEO: &str = "video";
const AD_CONTAINER: &str = ".ad-container";

/// Hotstar integration. The platform recreates its video element across
/// ad transitions and ships no stable skip control, so detection leans
/// on the dedicated ad container alone and skipping falls back to the
/// engine's label-text scan.
pub struct HotstarAdapter;

#[async_trait]
impl SiteAdapter for HotstarAdapter {
    fn site(&self) -> SiteId {
        SiteId::Hotstar
    }

    fn player_selector(&self) -> &'static str {
        PLAYER
    }

    fn video_selector(&self) -> &'static str {
        VIDEO
    }

    fn skip_selectors(&self) -> &'static [&'static str] {
        &[]
    }

    async fn is_ad_showing(&self, tree: &dyn TreePort) -> Result<bool, AdMuterError> {
        Ok(tree.query(AD_CONTAINER).await?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use page_port::fake::{FakePage, NodeSpec};

    #[tokio::test]
    async fn ad_container_presence_drives_the_predicate() {
        let page = FakePage::new();
        page.insert(NodeSpec::new([".player-container"]));
        assert!(!HotstarAdapter.is_ad_showing(&*page).await.unwrap());

        let container = page.insert(NodeSpec::new([AD_CONTAINER]));
        assert!(HotstarAdapter.is_ad_showing(&*page).await.unwrap());

        page.remove(container);
        assert!(!HotstarAdapter.is_ad_showing(&*page).await.unwrap());
    }
}
