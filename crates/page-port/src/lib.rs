//! Port layer between the ad-muter engine and the host page.
//!
//! The host page owns every element the engine touches and may mutate or
//! destroy any of them between two port calls. Handles returned here are
//! therefore non-owning: a call against a node that has since been removed
//! degrades to "absent" (`None`, default value, or silent no-op), never to
//! an error surfaced at the host boundary.

pub mod fake;
mod model;
mod ports;

pub use model::{mutation_bus, LayoutBox, MutationEvent, MutationKind, NodeHandle};
pub use ports::{InputPort, MediaPort, TreePort};
