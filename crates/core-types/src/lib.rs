use std::fmt;

use thiserror::Error;

/// Shared error type for the ad-muter engine crates.
///
/// Boundary calls against the host page degrade to inaction rather than
/// propagate, so a single message-carrying error is enough for the few
/// places a failure reaches a caller.
#[derive(Debug, Error, Clone)]
pub enum AdMuterError {
    #[error("{message}")]
    Message { message: String },
}

impl AdMuterError {
    pub fn new(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }
}

/// Supported streaming platforms. `as_str` doubles as the per-site
/// settings key in the flag store.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum SiteId {
    Youtube,
    Hotstar,
    Prime,
}

impl SiteId {
    pub fn as_str(&self) -> &'static str {
        match self {
            SiteId::Youtube => "youtube",
            SiteId::Hotstar => "hotstar",
            SiteId::Prime => "prime",
        }
    }

    pub fn all() -> [SiteId; 3] {
        [SiteId::Youtube, SiteId::Hotstar, SiteId::Prime]
    }
}

impl fmt::Display for SiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Monotonic sequence number identifying one skip attempt.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct AttemptId(pub u64);

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "attempt-{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn site_keys_match_settings_names() {
        assert_eq!(SiteId::Youtube.as_str(), "youtube");
        assert_eq!(SiteId::Hotstar.as_str(), "hotstar");
        assert_eq!(SiteId::Prime.as_str(), "prime");
        assert_eq!(SiteId::all().len(), 3);
    }

    #[test]
    fn attempt_ids_order() {
        assert!(AttemptId(2) > AttemptId(1));
        assert_eq!(AttemptId(7).to_string(), "attempt-7");
    }
}
