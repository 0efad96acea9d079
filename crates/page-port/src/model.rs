use tokio::sync::broadcast;

/// Non-owning reference to a host page element.
///
/// Carries the selector that resolved it so a later verification pass can
/// re-resolve the same target instead of trusting a possibly stale id.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NodeHandle {
    pub node_id: u64,
    pub selector: String,
}

impl NodeHandle {
    pub fn new(node_id: u64, selector: impl Into<String>) -> Self {
        Self {
            node_id,
            selector: selector.into(),
        }
    }
}

/// On-screen geometry of a rendered element.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LayoutBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl LayoutBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// An element only counts as actionable when it occupies layout space.
    pub fn is_rendered(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }

    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// Kind of structural change reported by a subtree watch.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MutationKind {
    /// Children added to or removed from a watched node.
    ChildList,
    /// Class attribute changed on a watched node.
    Attribute,
}

/// One change notification from the watched player subtree.
#[derive(Clone, Debug)]
pub struct MutationEvent {
    pub kind: MutationKind,
    pub node_id: u64,
}

/// Broadcast channel carrying subtree mutation notifications.
pub fn mutation_bus(capacity: usize) -> (
    broadcast::Sender<MutationEvent>,
    broadcast::Receiver<MutationEvent>,
) {
    broadcast::channel(capacity)
}
