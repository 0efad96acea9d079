use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use admuter_core_types::AdMuterError;
use admuter_scheduler::TickSink;
use page_port::{InputPort, MediaPort, NodeHandle, TreePort};
use site_adapters::SiteAdapter;

use crate::machine::{AdStateMachine, Transition};
use crate::skip::SkipController;

/// One engine instance per adapter: detection tick plus transition side
/// effects. All element references are resolved fresh on every tick;
/// the host page replaces the player and video elements across ad
/// transitions without notice.
pub struct AdEngine {
    adapter: Arc<dyn SiteAdapter>,
    tree: Arc<dyn TreePort>,
    media: Arc<dyn MediaPort>,
    machine: Mutex<AdStateMachine>,
    skip: SkipController,
    autoskip: Arc<AtomicBool>,
}

impl AdEngine {
    pub fn new(
        adapter: Arc<dyn SiteAdapter>,
        tree: Arc<dyn TreePort>,
        input: Arc<dyn InputPort>,
        media: Arc<dyn MediaPort>,
        autoskip: Arc<AtomicBool>,
    ) -> Self {
        let skip = SkipController::new(
            Arc::clone(&adapter),
            Arc::clone(&tree),
            input,
            Arc::clone(&media),
        );
        Self {
            adapter,
            tree,
            media,
            machine: Mutex::new(AdStateMachine::new()),
            skip,
            autoskip,
        }
    }

    async fn run_tick(&self) -> Result<(), AdMuterError> {
        // Player or video missing is "nothing to do yet", not an error.
        if self.tree.query(self.adapter.player_selector()).await?.is_none() {
            return Ok(());
        }
        let Some(video) = self.tree.query(self.adapter.video_selector()).await? else {
            return Ok(());
        };

        let ad_showing = self.adapter.is_ad_showing(&*self.tree).await?;
        let transition = self.machine.lock().observe(ad_showing);

        match transition {
            Some(Transition::AdStarted) => self.on_ad_started(&video).await,
            Some(Transition::AdEnded) => self.on_ad_ended(&video).await,
            None => Ok(()),
        }
    }

    async fn on_ad_started(&self, video: &NodeHandle) -> Result<(), AdMuterError> {
        if !self.media.muted(video).await? {
            info!(target: "ad-engine", site = %self.adapter.site(), "ad detected, muting");
            self.media.set_muted(video, true).await?;
        }

        if let Some(rate) = self.adapter.ad_playback_rate() {
            if self.media.playback_rate(video).await? < rate {
                debug!(target: "ad-engine", rate, "speeding up ad playback");
                self.media.set_playback_rate(video, rate).await?;
            }
        }

        if self.autoskip.load(Ordering::SeqCst) {
            self.skip.attempt(video).await;
        }
        Ok(())
    }

    async fn on_ad_ended(&self, video: &NodeHandle) -> Result<(), AdMuterError> {
        // Known heuristic: a muted video here is assumed engine-muted.
        // A user mute during the ad is cleared along with ours.
        if self.media.muted(video).await? {
            info!(target: "ad-engine", site = %self.adapter.site(), "ad ended, unmuting");
            self.media.set_muted(video, false).await?;
        }

        if self.media.playback_rate(video).await? > self.adapter.rate_restore_threshold() {
            debug!(target: "ad-engine", "restoring playback rate");
            self.media.set_playback_rate(video, 1.0).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl TickSink for AdEngine {
    async fn tick(&self) {
        // Nothing on the tick path may escape into the host page; a
        // failed read degrades to inaction until the next trigger.
        if let Err(err) = self.run_tick().await {
            warn!(target: "ad-engine", %err, "detection tick failed");
        }
    }
}
