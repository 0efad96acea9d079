//! Thin read/subscribe wrapper over the external flag store.
//!
//! The store is a collaborator the engine cannot rely on: keys may be
//! absent ("not yet configured") and reads may fail outright. Both cases
//! fail open, so protection is never silently disabled by a missing or
//! unreadable setting.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::warn;

use admuter_core_types::{AdMuterError, SiteId};

/// Settings key for the global kill switch.
pub const GLOBAL_KEY: &str = "enabled";
/// Settings key for the auto-skip toggle.
pub const AUTOSKIP_KEY: &str = "autoskip";

/// One changed key, delivered independently of any other keys changed
/// in the same write.
#[derive(Clone, Debug)]
pub struct SettingChange {
    pub key: String,
    pub old_value: Option<bool>,
    pub new_value: Option<bool>,
}

/// Backing flag store. `get` returns `None` per key when unset.
#[async_trait]
pub trait SettingsPort: Send + Sync {
    async fn get(&self, keys: &[&str]) -> Result<HashMap<String, Option<bool>>, AdMuterError>;

    fn watch(&self) -> broadcast::Receiver<SettingChange>;
}

/// Flag snapshot with defaults applied. Absent keys read as `true`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Flags {
    pub enabled: bool,
    pub site_enabled: bool,
    pub autoskip: bool,
}

impl Default for Flags {
    fn default() -> Self {
        Self {
            enabled: true,
            site_enabled: true,
            autoskip: true,
        }
    }
}

impl Flags {
    /// Whether observation should run at all for the site.
    pub fn observing(&self) -> bool {
        self.enabled && self.site_enabled
    }
}

/// Read side of the settings collaborator as the engine sees it.
#[derive(Clone)]
pub struct SettingsGateway {
    store: Arc<dyn SettingsPort>,
}

impl SettingsGateway {
    pub fn new(store: Arc<dyn SettingsPort>) -> Self {
        Self { store }
    }

    /// Current flags for `site`. A store failure logs and yields the
    /// all-true snapshot; an unreadable store must never turn the
    /// engine off.
    pub async fn read_flags(&self, site: SiteId) -> Flags {
        let site_key = site.as_str();
        match self.store.get(&[GLOBAL_KEY, site_key, AUTOSKIP_KEY]).await {
            Ok(values) => Flags {
                enabled: flag_value(&values, GLOBAL_KEY),
                site_enabled: flag_value(&values, site_key),
                autoskip: flag_value(&values, AUTOSKIP_KEY),
            },
            Err(err) => {
                warn!(target: "settings", %err, "settings read failed, staying enabled");
                Flags::default()
            }
        }
    }

    pub fn changes(&self) -> broadcast::Receiver<SettingChange> {
        self.store.watch()
    }

    /// Whether a changed key affects this site's engine.
    pub fn is_relevant(key: &str, site: SiteId) -> bool {
        key == GLOBAL_KEY || key == AUTOSKIP_KEY || key == site.as_str()
    }
}

fn flag_value(values: &HashMap<String, Option<bool>>, key: &str) -> bool {
    values.get(key).copied().flatten().unwrap_or(true)
}

/// In-memory flag store, used by the test suites and as the local
/// backing for the configuration surface.
pub struct MemorySettings {
    values: Mutex<HashMap<String, bool>>,
    changes: broadcast::Sender<SettingChange>,
}

impl MemorySettings {
    pub fn new() -> Arc<Self> {
        let (changes, _rx) = broadcast::channel(32);
        Arc::new(Self {
            values: Mutex::new(HashMap::new()),
            changes,
        })
    }

    pub fn set(&self, key: impl Into<String>, value: bool) {
        let key = key.into();
        let old_value = self.values.lock().insert(key.clone(), value);
        let _ = self.changes.send(SettingChange {
            key,
            old_value,
            new_value: Some(value),
        });
    }

    pub fn unset(&self, key: &str) {
        let old_value = self.values.lock().remove(key);
        if old_value.is_some() {
            let _ = self.changes.send(SettingChange {
                key: key.to_string(),
                old_value,
                new_value: None,
            });
        }
    }
}

#[async_trait]
impl SettingsPort for MemorySettings {
    async fn get(&self, keys: &[&str]) -> Result<HashMap<String, Option<bool>>, AdMuterError> {
        let values = self.values.lock();
        Ok(keys
            .iter()
            .map(|key| (key.to_string(), values.get(*key).copied()))
            .collect())
    }

    fn watch(&self) -> broadcast::Receiver<SettingChange> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BrokenStore;

    #[async_trait]
    impl SettingsPort for BrokenStore {
        async fn get(
            &self,
            _keys: &[&str],
        ) -> Result<HashMap<String, Option<bool>>, AdMuterError> {
            Err(AdMuterError::new("store unavailable"))
        }

        fn watch(&self) -> broadcast::Receiver<SettingChange> {
            broadcast::channel(1).1
        }
    }

    #[tokio::test]
    async fn absent_keys_default_to_enabled() {
        let gateway = SettingsGateway::new(MemorySettings::new());
        let flags = gateway.read_flags(SiteId::Youtube).await;
        assert_eq!(flags, Flags::default());
        assert!(flags.observing());
    }

    #[tokio::test]
    async fn explicit_false_disables() {
        let store = MemorySettings::new();
        store.set("youtube", false);
        let gateway = SettingsGateway::new(store);

        let flags = gateway.read_flags(SiteId::Youtube).await;
        assert!(flags.enabled);
        assert!(!flags.site_enabled);
        assert!(!flags.observing());

        // Another site is untouched by the youtube key.
        let flags = gateway.read_flags(SiteId::Prime).await;
        assert!(flags.observing());
    }

    #[tokio::test]
    async fn store_failure_fails_open() {
        let gateway = SettingsGateway::new(Arc::new(BrokenStore));
        let flags = gateway.read_flags(SiteId::Hotstar).await;
        assert_eq!(flags, Flags::default());
    }

    #[tokio::test]
    async fn changes_are_delivered_per_key() {
        let store = MemorySettings::new();
        let gateway = SettingsGateway::new(Arc::clone(&store) as Arc<dyn SettingsPort>);
        let mut rx = gateway.changes();

        store.set(AUTOSKIP_KEY, false);
        store.set(AUTOSKIP_KEY, true);

        let first = rx.recv().await.unwrap();
        assert_eq!(first.key, AUTOSKIP_KEY);
        assert_eq!(first.old_value, None);
        assert_eq!(first.new_value, Some(false));

        let second = rx.recv().await.unwrap();
        assert_eq!(second.old_value, Some(false));
        assert_eq!(second.new_value, Some(true));
    }

    #[test]
    fn relevance_is_scoped_to_the_site() {
        assert!(SettingsGateway::is_relevant(GLOBAL_KEY, SiteId::Youtube));
        assert!(SettingsGateway::is_relevant(AUTOSKIP_KEY, SiteId::Prime));
        assert!(SettingsGateway::is_relevant("hotstar", SiteId::Hotstar));
        assert!(!SettingsGateway::is_relevant("hotstar", SiteId::Youtube));
        assert!(!SettingsGateway::is_relevant("theme", SiteId::Youtube));
    }
}
