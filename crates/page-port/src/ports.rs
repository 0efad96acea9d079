use async_trait::async_trait;
use tokio::sync::broadcast;

use admuter_core_types::AdMuterError;

use crate::model::{LayoutBox, MutationEvent, NodeHandle};

/// Structural queries over the host page tree.
///
/// Every method is a fresh snapshot read; the tree may change between any
/// two calls, so callers must never assume two reads describe the same
/// state of the page.
#[async_trait]
pub trait TreePort: Send + Sync {
    /// Resolve the first element matching `selector`, if any.
    async fn query(&self, selector: &str) -> Result<Option<NodeHandle>, AdMuterError>;

    /// Resolve every element matching `selector`, in document order.
    async fn query_all(&self, selector: &str) -> Result<Vec<NodeHandle>, AdMuterError>;

    /// Whether the node behind the handle is still attached to the tree.
    async fn is_attached(&self, node: &NodeHandle) -> Result<bool, AdMuterError>;

    /// Rendered geometry; `None` when detached, hidden or zero-sized.
    async fn layout_box(&self, node: &NodeHandle) -> Result<Option<LayoutBox>, AdMuterError>;

    async fn has_class(&self, node: &NodeHandle, class: &str) -> Result<bool, AdMuterError>;

    async fn child_count(&self, node: &NodeHandle) -> Result<u32, AdMuterError>;

    async fn visible_text(&self, node: &NodeHandle) -> Result<String, AdMuterError>;

    /// Subscribe to child-list and class-attribute changes under `root`.
    async fn watch_subtree(
        &self,
        root: &NodeHandle,
    ) -> Result<broadcast::Receiver<MutationEvent>, AdMuterError>;
}

/// Simulated user interaction against host page elements.
#[async_trait]
pub trait InputPort: Send + Sync {
    /// Direct activation call on the element itself.
    async fn activate(&self, node: &NodeHandle) -> Result<(), AdMuterError>;

    /// Direct activation call on the element's immediate container, for
    /// handlers attached one level up.
    async fn activate_parent(&self, node: &NodeHandle) -> Result<(), AdMuterError>;

    /// Dispatch press, release and click in order at the given page
    /// coordinates, bubbling, with no artificial delay between them.
    async fn dispatch_pointer_sequence(
        &self,
        node: &NodeHandle,
        center: (f64, f64),
    ) -> Result<(), AdMuterError>;
}

/// Media element property access for the tracked video.
#[async_trait]
pub trait MediaPort: Send + Sync {
    async fn muted(&self, node: &NodeHandle) -> Result<bool, AdMuterError>;

    async fn set_muted(&self, node: &NodeHandle, muted: bool) -> Result<(), AdMuterError>;

    async fn playback_rate(&self, node: &NodeHandle) -> Result<f64, AdMuterError>;

    async fn set_playback_rate(&self, node: &NodeHandle, rate: f64) -> Result<(), AdMuterError>;

    async fn current_time(&self, node: &NodeHandle) -> Result<f64, AdMuterError>;

    async fn set_current_time(&self, node: &NodeHandle, time: f64) -> Result<(), AdMuterError>;

    /// Media duration in seconds; `None` when unknown or not finite.
    async fn duration(&self, node: &NodeHandle) -> Result<Option<f64>, AdMuterError>;
}
