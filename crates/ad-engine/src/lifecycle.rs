use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::select;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use admuter_core_types::SiteId;
use admuter_scheduler::{ObservationScheduler, SchedulerConfig, SchedulerHandle};
use page_port::{InputPort, MediaPort, TreePort};
use settings_gateway::{SettingsGateway, SettingsPort};
use site_adapters::{adapter_for, SiteAdapter};

use crate::engine::AdEngine;

/// Starts and stops observation for one site in response to settings
/// changes. Owns the single live scheduler for its engine instance;
/// every (re)start tears the previous one down first.
pub struct LifecycleController {
    site: SiteId,
    adapter: Arc<dyn SiteAdapter>,
    tree: Arc<dyn TreePort>,
    input: Arc<dyn InputPort>,
    media: Arc<dyn MediaPort>,
    gateway: SettingsGateway,
    scheduler: ObservationScheduler,
    autoskip: Arc<AtomicBool>,
    observation: Mutex<Option<SchedulerHandle>>,
    watcher: Mutex<Option<JoinHandle<()>>>,
    cancel: CancellationToken,
}

impl LifecycleController {
    pub fn new(
        site: SiteId,
        tree: Arc<dyn TreePort>,
        input: Arc<dyn InputPort>,
        media: Arc<dyn MediaPort>,
        store: Arc<dyn SettingsPort>,
        config: SchedulerConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            site,
            adapter: adapter_for(site),
            tree,
            input,
            media,
            gateway: SettingsGateway::new(store),
            scheduler: ObservationScheduler::new(config),
            autoskip: Arc::new(AtomicBool::new(true)),
            observation: Mutex::new(None),
            watcher: Mutex::new(None),
            cancel: CancellationToken::new(),
        })
    }

    /// Read initial flags, start observation when enabled, and keep
    /// following the settings change stream until `stop`.
    pub async fn start(self: &Arc<Self>) {
        let flags = self.gateway.read_flags(self.site).await;
        self.autoskip.store(flags.autoskip, Ordering::SeqCst);
        info!(
            target: "lifecycle",
            site = %self.site,
            enabled = flags.observing(),
            autoskip = flags.autoskip,
            "muter initialized"
        );

        if flags.observing() {
            self.start_observation().await;
        }
        self.spawn_settings_watcher();
    }

    /// Tear down the watcher and any running observation. Idempotent;
    /// an in-flight skip verification may still fire afterwards, which
    /// is harmless because it only logs.
    pub async fn stop(&self) {
        self.cancel.cancel();
        let watcher = self.watcher.lock().take();
        if let Some(watcher) = watcher {
            let _ = watcher.await;
        }
        self.stop_observation().await;
        info!(target: "lifecycle", site = %self.site, "monitoring stopped");
    }

    pub fn is_observing(&self) -> bool {
        self.observation.lock().is_some()
    }

    async fn start_observation(&self) {
        // At most one live scheduler per engine instance.
        self.stop_observation().await;

        let engine = Arc::new(AdEngine::new(
            Arc::clone(&self.adapter),
            Arc::clone(&self.tree),
            Arc::clone(&self.input),
            Arc::clone(&self.media),
            Arc::clone(&self.autoskip),
        ));
        let handle = self.scheduler.start(
            Arc::clone(&self.tree),
            self.adapter.player_selector(),
            engine,
        );
        *self.observation.lock() = Some(handle);
        info!(target: "lifecycle", site = %self.site, "monitoring started");
    }

    async fn stop_observation(&self) {
        let handle = self.observation.lock().take();
        if let Some(handle) = handle {
            handle.stop().await;
        }
    }

    fn spawn_settings_watcher(self: &Arc<Self>) {
        let this = Arc::clone(self);
        let cancel = self.cancel.clone();
        let mut changes = self.gateway.changes();
        let task = tokio::spawn(async move {
            loop {
                select! {
                    _ = cancel.cancelled() => break,
                    change = changes.recv() => match change {
                        Ok(change) => {
                            if SettingsGateway::is_relevant(&change.key, this.site) {
                                debug!(
                                    target: "lifecycle",
                                    key = %change.key,
                                    new_value = ?change.new_value,
                                    "setting changed"
                                );
                                this.apply_settings().await;
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            // Missed events; re-read the whole flag set.
                            warn!(target: "lifecycle", skipped, "settings stream lagged");
                            this.apply_settings().await;
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
        });
        *self.watcher.lock() = Some(task);
    }

    async fn apply_settings(&self) {
        let flags = self.gateway.read_flags(self.site).await;
        // Autoskip takes effect on the next transition, no restart needed.
        self.autoskip.store(flags.autoskip, Ordering::SeqCst);

        let observing = self.is_observing();
        if flags.observing() && !observing {
            self.start_observation().await;
        } else if !flags.observing() && observing {
            self.stop_observation().await;
            info!(target: "lifecycle", site = %self.site, "monitoring stopped");
        }
    }
}
