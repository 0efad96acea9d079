//! Per-site ad-state detection and intervention engine.
//!
//! One engine instance per site adapter, owned by its
//! [`LifecycleController`]; no ambient state, so several adapters (or
//! tests) run in isolation. Detection ticks come from the observation
//! scheduler, feed the two-state machine, and transitions drive the
//! mute/rate side effects and the skip controller.

mod engine;
mod lifecycle;
pub mod machine;
mod skip;

pub use engine::AdEngine;
pub use lifecycle::LifecycleController;
pub use skip::SkipController;
