//! In-memory host page used by the engine test suites.
//!
//! Models just enough of a page for the detection and skip paths: nodes
//! match literal selector keys, structural edits feed the mutation bus,
//! and simulated interactions are recorded for assertions.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::broadcast;

use admuter_core_types::AdMuterError;

use crate::model::{LayoutBox, MutationEvent, MutationKind, NodeHandle};
use crate::ports::{InputPort, MediaPort, TreePort};

/// Recorded simulated interaction.
#[derive(Clone, Debug, PartialEq)]
pub enum Dispatch {
    Activate(u64),
    ActivateParent(u64),
    Pointer { node_id: u64, center: (f64, f64) },
}

/// Media element state carried by video nodes.
#[derive(Clone, Debug)]
pub struct MediaState {
    pub muted: bool,
    pub playback_rate: f64,
    pub current_time: f64,
    pub duration: Option<f64>,
}

impl Default for MediaState {
    fn default() -> Self {
        Self {
            muted: false,
            playback_rate: 1.0,
            current_time: 0.0,
            duration: None,
        }
    }
}

/// Declarative node description for `FakePage::insert`.
#[derive(Clone, Debug, Default)]
pub struct NodeSpec {
    selectors: Vec<String>,
    classes: Vec<String>,
    text: String,
    layout: Option<LayoutBox>,
    child_count: u32,
    media: Option<MediaState>,
}

impl NodeSpec {
    /// Node matched by the given selector keys (comma-free literals).
    pub fn new<I, S>(selectors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            selectors: selectors.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.classes.push(class.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn rendered(mut self, bx: LayoutBox) -> Self {
        self.layout = Some(bx);
        self
    }

    pub fn with_children(mut self, count: u32) -> Self {
        self.child_count = count;
        self
    }

    pub fn video(mut self, media: MediaState) -> Self {
        self.media = Some(media);
        self
    }
}

#[derive(Clone, Debug)]
struct FakeNode {
    selectors: Vec<String>,
    classes: Vec<String>,
    text: String,
    layout: Option<LayoutBox>,
    child_count: u32,
    media: Option<MediaState>,
}

#[derive(Default)]
struct PageState {
    next_id: u64,
    nodes: HashMap<u64, FakeNode>,
    order: Vec<u64>,
    dispatched: Vec<Dispatch>,
    query_counts: HashMap<String, usize>,
}

/// Shared in-memory page implementing all three host ports.
pub struct FakePage {
    state: Mutex<PageState>,
    mutations: broadcast::Sender<MutationEvent>,
}

impl FakePage {
    pub fn new() -> Arc<Self> {
        let (mutations, _rx) = crate::model::mutation_bus(64);
        Arc::new(Self {
            state: Mutex::new(PageState::default()),
            mutations,
        })
    }

    pub fn insert(&self, spec: NodeSpec) -> u64 {
        let id = {
            let mut state = self.state.lock();
            state.next_id += 1;
            let id = state.next_id;
            state.nodes.insert(
                id,
                FakeNode {
                    selectors: spec.selectors,
                    classes: spec.classes,
                    text: spec.text,
                    layout: spec.layout,
                    child_count: spec.child_count,
                    media: spec.media,
                },
            );
            state.order.push(id);
            id
        };
        self.emit(MutationKind::ChildList, id);
        id
    }

    pub fn remove(&self, node_id: u64) {
        let removed = {
            let mut state = self.state.lock();
            state.order.retain(|id| *id != node_id);
            state.nodes.remove(&node_id).is_some()
        };
        if removed {
            self.emit(MutationKind::ChildList, node_id);
        }
    }

    pub fn add_class(&self, node_id: u64, class: &str) {
        let changed = {
            let mut state = self.state.lock();
            match state.nodes.get_mut(&node_id) {
                Some(node) if !node.classes.iter().any(|c| c == class) => {
                    node.classes.push(class.to_string());
                    true
                }
                _ => false,
            }
        };
        if changed {
            self.emit(MutationKind::Attribute, node_id);
        }
    }

    pub fn remove_class(&self, node_id: u64, class: &str) {
        let changed = {
            let mut state = self.state.lock();
            match state.nodes.get_mut(&node_id) {
                Some(node) => {
                    let before = node.classes.len();
                    node.classes.retain(|c| c != class);
                    node.classes.len() != before
                }
                None => false,
            }
        };
        if changed {
            self.emit(MutationKind::Attribute, node_id);
        }
    }

    pub fn set_child_count(&self, node_id: u64, count: u32) {
        let changed = {
            let mut state = self.state.lock();
            match state.nodes.get_mut(&node_id) {
                Some(node) if node.child_count != count => {
                    node.child_count = count;
                    true
                }
                _ => false,
            }
        };
        if changed {
            self.emit(MutationKind::ChildList, node_id);
        }
    }

    pub fn set_layout(&self, node_id: u64, layout: Option<LayoutBox>) {
        let mut state = self.state.lock();
        if let Some(node) = state.nodes.get_mut(&node_id) {
            node.layout = layout;
        }
    }

    pub fn muted(&self, node_id: u64) -> bool {
        self.media_field(node_id, |m| m.muted).unwrap_or(false)
    }

    pub fn playback_rate(&self, node_id: u64) -> f64 {
        self.media_field(node_id, |m| m.playback_rate).unwrap_or(1.0)
    }

    pub fn current_time(&self, node_id: u64) -> f64 {
        self.media_field(node_id, |m| m.current_time).unwrap_or(0.0)
    }

    /// Direct media edit, as the host page itself would make.
    pub fn set_media(&self, node_id: u64, write: impl FnOnce(&mut MediaState)) {
        self.with_media(node_id, write);
    }

    pub fn dispatched(&self) -> Vec<Dispatch> {
        self.state.lock().dispatched.clone()
    }

    pub fn clear_dispatched(&self) {
        self.state.lock().dispatched.clear();
    }

    fn media_field<T>(&self, node_id: u64, read: impl Fn(&MediaState) -> T) -> Option<T> {
        let state = self.state.lock();
        state
            .nodes
            .get(&node_id)
            .and_then(|node| node.media.as_ref())
            .map(read)
    }

    fn with_media(&self, node_id: u64, write: impl FnOnce(&mut MediaState)) {
        let mut state = self.state.lock();
        if let Some(media) = state
            .nodes
            .get_mut(&node_id)
            .and_then(|node| node.media.as_mut())
        {
            write(media);
        }
    }

    fn emit(&self, kind: MutationKind, node_id: u64) {
        // No receivers is fine; the page mutates whether or not anyone
        // is watching.
        let _ = self.mutations.send(MutationEvent { kind, node_id });
    }

    /// How many times `selector` has been resolved. Lets tests assert
    /// how many observation loops are actually polling the page.
    pub fn query_count(&self, selector: &str) -> usize {
        self.state
            .lock()
            .query_counts
            .get(selector)
            .copied()
            .unwrap_or(0)
    }

    fn matching_ids(&self, selector: &str) -> Vec<(u64, String)> {
        let mut state = self.state.lock();
        *state
            .query_counts
            .entry(selector.to_string())
            .or_insert(0) += 1;
        let parts: Vec<&str> = selector.split(',').map(str::trim).collect();
        let mut found = Vec::new();
        for id in &state.order {
            let Some(node) = state.nodes.get(id) else {
                continue;
            };
            for part in &parts {
                if node_matches(node, part) {
                    found.push((*id, (*part).to_string()));
                    break;
                }
            }
        }
        found
    }
}

fn node_matches(node: &FakeNode, part: &str) -> bool {
    if node.selectors.iter().any(|s| s == part) {
        return true;
    }
    if let Some(class) = part.strip_prefix('.') {
        return node.classes.iter().any(|c| c == class);
    }
    false
}

#[async_trait]
impl TreePort for FakePage {
    async fn query(&self, selector: &str) -> Result<Option<NodeHandle>, AdMuterError> {
        Ok(self
            .matching_ids(selector)
            .into_iter()
            .next()
            .map(|(id, part)| NodeHandle::new(id, part)))
    }

    async fn query_all(&self, selector: &str) -> Result<Vec<NodeHandle>, AdMuterError> {
        Ok(self
            .matching_ids(selector)
            .into_iter()
            .map(|(id, part)| NodeHandle::new(id, part))
            .collect())
    }

    async fn is_attached(&self, node: &NodeHandle) -> Result<bool, AdMuterError> {
        Ok(self.state.lock().nodes.contains_key(&node.node_id))
    }

    async fn layout_box(&self, node: &NodeHandle) -> Result<Option<LayoutBox>, AdMuterError> {
        let state = self.state.lock();
        Ok(state
            .nodes
            .get(&node.node_id)
            .and_then(|n| n.layout)
            .filter(LayoutBox::is_rendered))
    }

    async fn has_class(&self, node: &NodeHandle, class: &str) -> Result<bool, AdMuterError> {
        let state = self.state.lock();
        Ok(state
            .nodes
            .get(&node.node_id)
            .map(|n| n.classes.iter().any(|c| c == class))
            .unwrap_or(false))
    }

    async fn child_count(&self, node: &NodeHandle) -> Result<u32, AdMuterError> {
        let state = self.state.lock();
        Ok(state
            .nodes
            .get(&node.node_id)
            .map(|n| n.child_count)
            .unwrap_or(0))
    }

    async fn visible_text(&self, node: &NodeHandle) -> Result<String, AdMuterError> {
        let state = self.state.lock();
        Ok(state
            .nodes
            .get(&node.node_id)
            .map(|n| n.text.clone())
            .unwrap_or_default())
    }

    async fn watch_subtree(
        &self,
        _root: &NodeHandle,
    ) -> Result<broadcast::Receiver<MutationEvent>, AdMuterError> {
        Ok(self.mutations.subscribe())
    }
}

#[async_trait]
impl InputPort for FakePage {
    async fn activate(&self, node: &NodeHandle) -> Result<(), AdMuterError> {
        let mut state = self.state.lock();
        if state.nodes.contains_key(&node.node_id) {
            state.dispatched.push(Dispatch::Activate(node.node_id));
        }
        Ok(())
    }

    async fn activate_parent(&self, node: &NodeHandle) -> Result<(), AdMuterError> {
        let mut state = self.state.lock();
        if state.nodes.contains_key(&node.node_id) {
            state
                .dispatched
                .push(Dispatch::ActivateParent(node.node_id));
        }
        Ok(())
    }

    async fn dispatch_pointer_sequence(
        &self,
        node: &NodeHandle,
        center: (f64, f64),
    ) -> Result<(), AdMuterError> {
        let mut state = self.state.lock();
        if state.nodes.contains_key(&node.node_id) {
            state.dispatched.push(Dispatch::Pointer {
                node_id: node.node_id,
                center,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl MediaPort for FakePage {
    async fn muted(&self, node: &NodeHandle) -> Result<bool, AdMuterError> {
        Ok(self.media_field(node.node_id, |m| m.muted).unwrap_or(false))
    }

    async fn set_muted(&self, node: &NodeHandle, muted: bool) -> Result<(), AdMuterError> {
        self.with_media(node.node_id, |m| m.muted = muted);
        Ok(())
    }

    async fn playback_rate(&self, node: &NodeHandle) -> Result<f64, AdMuterError> {
        Ok(self
            .media_field(node.node_id, |m| m.playback_rate)
            .unwrap_or(1.0))
    }

    async fn set_playback_rate(&self, node: &NodeHandle, rate: f64) -> Result<(), AdMuterError> {
        self.with_media(node.node_id, |m| m.playback_rate = rate);
        Ok(())
    }

    async fn current_time(&self, node: &NodeHandle) -> Result<f64, AdMuterError> {
        Ok(self
            .media_field(node.node_id, |m| m.current_time)
            .unwrap_or(0.0))
    }

    async fn set_current_time(&self, node: &NodeHandle, time: f64) -> Result<(), AdMuterError> {
        self.with_media(node.node_id, |m| m.current_time = time);
        Ok(())
    }

    async fn duration(&self, node: &NodeHandle) -> Result<Option<f64>, AdMuterError> {
        Ok(self.media_field(node.node_id, |m| m.duration).flatten())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn query_matches_selector_keys_and_classes() {
        let page = FakePage::new();
        let player = page.insert(NodeSpec::new(["#movie_player"]).with_class("ad-showing"));
        page.insert(NodeSpec::new(["video.html5-main-video"]).video(MediaState::default()));

        let by_key = page.query("#movie_player").await.unwrap().unwrap();
        assert_eq!(by_key.node_id, player);

        let by_class = page.query(".ad-showing").await.unwrap().unwrap();
        assert_eq!(by_class.node_id, player);

        assert!(page.query(".missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn comma_lists_match_any_part() {
        let page = FakePage::new();
        let id = page.insert(NodeSpec::new([".player-container"]));
        let hit = page
            .query(".shaka-video-container, .player-container")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hit.node_id, id);
        assert_eq!(hit.selector, ".player-container");
    }

    #[tokio::test]
    async fn stale_handles_degrade_to_absent() {
        let page = FakePage::new();
        let id = page.insert(NodeSpec::new(["button"]).rendered(LayoutBox::new(0.0, 0.0, 10.0, 10.0)));
        let handle = page.query("button").await.unwrap().unwrap();
        page.remove(id);

        assert!(!page.is_attached(&handle).await.unwrap());
        assert!(page.layout_box(&handle).await.unwrap().is_none());
        assert!(!MediaPort::muted(&*page, &handle).await.unwrap());
        page.activate(&handle).await.unwrap();
        assert!(page.dispatched().is_empty());
    }

    #[tokio::test]
    async fn set_layout_toggles_rendered_state() {
        let page = FakePage::new();
        let id = page.insert(NodeSpec::new(["button"]));
        let handle = page.query("button").await.unwrap().unwrap();
        assert!(page.layout_box(&handle).await.unwrap().is_none());

        page.set_layout(id, Some(LayoutBox::new(0.0, 0.0, 40.0, 20.0)));
        assert!(page.layout_box(&handle).await.unwrap().is_some());

        page.set_layout(id, None);
        assert!(page.layout_box(&handle).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn query_counts_track_resolutions() {
        let page = FakePage::new();
        page.insert(NodeSpec::new(["#movie_player"]));
        assert_eq!(page.query_count("#movie_player"), 0);

        page.query("#movie_player").await.unwrap();
        page.query_all("#movie_player").await.unwrap();
        page.query(".missing").await.unwrap();

        assert_eq!(page.query_count("#movie_player"), 2);
        assert_eq!(page.query_count(".missing"), 1);
    }

    #[tokio::test]
    async fn structural_edits_feed_the_mutation_bus() {
        let page = FakePage::new();
        let root = page.insert(NodeSpec::new(["#movie_player"]));
        let handle = page.query("#movie_player").await.unwrap().unwrap();
        let mut rx = page.watch_subtree(&handle).await.unwrap();

        page.add_class(root, "ad-showing");
        let event = rx.try_recv().unwrap();
        assert_eq!(event.kind, MutationKind::Attribute);
        assert_eq!(event.node_id, root);

        page.remove(root);
        let event = rx.try_recv().unwrap();
        assert_eq!(event.kind, MutationKind::ChildList);
    }

    #[tokio::test]
    async fn media_writes_round_trip() {
        let page = FakePage::new();
        page.insert(NodeSpec::new(["video"]).video(MediaState {
            duration: Some(15.0),
            ..MediaState::default()
        }));
        let video = page.query("video").await.unwrap().unwrap();

        MediaPort::set_muted(&*page, &video, true).await.unwrap();
        MediaPort::set_playback_rate(&*page, &video, 16.0)
            .await
            .unwrap();
        assert!(MediaPort::muted(&*page, &video).await.unwrap());
        assert_eq!(
            MediaPort::playback_rate(&*page, &video).await.unwrap(),
            16.0
        );
        assert_eq!(
            MediaPort::duration(&*page, &video).await.unwrap(),
            Some(15.0)
        );
    }
}
