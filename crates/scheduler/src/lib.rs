//! Observation scheduler for the ad-state engine.
//!
//! Detection work is triggered two ways: a mutation feed scoped to the
//! player subtree, and a fixed-interval fallback for changes the feed
//! cannot see. Both triggers funnel through one throttle gate, so a
//! notification burst followed by a fallback tick cannot double-fire,
//! and a tick always runs to completion before the next trigger is
//! examined.

mod runtime;
mod throttle;

pub use runtime::{ObservationScheduler, SchedulerConfig, SchedulerHandle, TickSink};
pub use throttle::ThrottleGate;
