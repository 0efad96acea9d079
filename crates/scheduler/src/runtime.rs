use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::select;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use page_port::{MutationEvent, NodeHandle, TreePort};

use crate::throttle::ThrottleGate;

/// Detection callback invoked once per admitted tick.
#[async_trait]
pub trait TickSink: Send + Sync {
    async fn tick(&self);
}

/// Timing knobs for one observation loop.
#[derive(Clone, Copy, Debug)]
pub struct SchedulerConfig {
    /// Minimum interval between executed ticks.
    pub throttle: Duration,
    /// Fixed cadence covering changes the mutation feed misses.
    pub fallback: Duration,
    /// Delay between attempts to locate a player that is not yet in
    /// the page.
    pub player_retry: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            throttle: Duration::from_millis(50),
            fallback: Duration::from_millis(1000),
            player_retry: Duration::from_millis(1000),
        }
    }
}

/// Starts observation loops; one live loop per engine instance.
pub struct ObservationScheduler {
    config: SchedulerConfig,
}

impl ObservationScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self { config }
    }

    /// Spawn the observation loop for `player_selector`, feeding every
    /// admitted tick into `sink`. The returned handle owns the loop.
    pub fn start(
        &self,
        tree: Arc<dyn TreePort>,
        player_selector: impl Into<String>,
        sink: Arc<dyn TickSink>,
    ) -> SchedulerHandle {
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run(
            self.config,
            tree,
            player_selector.into(),
            sink,
            cancel.clone(),
        ));
        SchedulerHandle {
            cancel,
            task: Mutex::new(Some(task)),
        }
    }
}

/// Owner of one running observation loop.
pub struct SchedulerHandle {
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SchedulerHandle {
    /// Cancel the loop and wait for it to exit. Safe to call any number
    /// of times, including when the loop already stopped on its own.
    pub async fn stop(&self) {
        self.cancel.cancel();
        let task = self.task.lock().take();
        if let Some(task) = task {
            let _ = task.await;
        }
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
    }
}

async fn run(
    config: SchedulerConfig,
    tree: Arc<dyn TreePort>,
    player_selector: String,
    sink: Arc<dyn TickSink>,
    cancel: CancellationToken,
) {
    let Some(player) = locate_player(&*tree, &player_selector, &config, &cancel).await else {
        return;
    };

    let mut mutations = match tree.watch_subtree(&player).await {
        Ok(rx) => Some(rx),
        Err(err) => {
            // Interval-only operation still detects ads, just slower.
            warn!(target: "scheduler", %err, "subtree watch unavailable, falling back to polling only");
            None
        }
    };

    let mut gate = ThrottleGate::new(config.throttle);
    let mut fallback = interval(config.fallback);
    fallback.set_missed_tick_behavior(MissedTickBehavior::Delay);

    debug!(target: "scheduler", selector = %player_selector, "observation started");

    loop {
        select! {
            _ = cancel.cancelled() => break,
            _ = fallback.tick() => {
                maybe_tick(&mut gate, &*sink).await;
            }
            fired = next_mutation(&mut mutations) => {
                if fired {
                    maybe_tick(&mut gate, &*sink).await;
                }
            }
        }
    }

    debug!(target: "scheduler", "observation stopped");
}

async fn locate_player(
    tree: &dyn TreePort,
    selector: &str,
    config: &SchedulerConfig,
    cancel: &CancellationToken,
) -> Option<NodeHandle> {
    loop {
        match tree.query(selector).await {
            Ok(Some(player)) => return Some(player),
            Ok(None) => {
                debug!(target: "scheduler", selector, "player not present yet, retrying");
            }
            Err(err) => {
                warn!(target: "scheduler", %err, "player lookup failed, retrying");
            }
        }
        select! {
            _ = cancel.cancelled() => return None,
            _ = sleep(config.player_retry) => {}
        }
    }
}

async fn maybe_tick(gate: &mut ThrottleGate, sink: &dyn TickSink) {
    if gate.admit(Instant::now()) {
        sink.tick().await;
    }
}

/// Waits for the next mutation notification. Lag still signals that the
/// subtree changed, so it counts as a trigger; a closed feed parks this
/// branch and leaves the fallback interval in charge.
async fn next_mutation(rx: &mut Option<broadcast::Receiver<MutationEvent>>) -> bool {
    match rx {
        Some(receiver) => match receiver.recv().await {
            Ok(_) => true,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                debug!(target: "scheduler", skipped, "mutation feed lagged");
                true
            }
            Err(broadcast::error::RecvError::Closed) => {
                debug!(target: "scheduler", "mutation feed closed");
                *rx = None;
                false
            }
        },
        None => std::future::pending().await,
    }
}
