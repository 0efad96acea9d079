/// Current machine state for one tracked player.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum AdState {
    #[default]
    Normal,
    AdActive,
}

/// Edge produced by an observation that changed the state.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Transition {
    AdStarted,
    AdEnded,
}

/// Two-state machine fed one predicate result per detection tick.
///
/// Side effects hang off transitions only; a tick that observes the
/// same predicate value as the previous one produces nothing, which is
/// what keeps mute/rate writes idempotent across the polling loop.
#[derive(Debug, Default)]
pub struct AdStateMachine {
    state: AdState,
}

impl AdStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> AdState {
        self.state
    }

    /// Feed the current "ad showing" observation; returns the edge if
    /// the state changed.
    pub fn observe(&mut self, ad_showing: bool) -> Option<Transition> {
        match (self.state, ad_showing) {
            (AdState::Normal, true) => {
                self.state = AdState::AdActive;
                Some(Transition::AdStarted)
            }
            (AdState::AdActive, false) => {
                self.state = AdState::Normal;
                Some(Transition::AdEnded)
            }
            _ => None,
        }
    }
}
