//! Flow visualizer: the per-mount controller the host talks to.
//!
//! One instance owns everything for one mounted view: the scene, the
//! animation scheduler, the surface subscription and the current batch
//! list. Host commands (`play`, `pause`, `reset_view`, `resize`) and
//! pointer input go through here; selections come back as
//! [`SelectionEvent`]s.
//!
//! Teardown order is fixed: cancel the scheduler, dispose the scene, then
//! drop the subscription. It runs once, from [`FlowVisualizer::dispose`]
//! or from `Drop`.

use std::path::Path;

use glam::Vec2;

use crate::config::VisualizerConfig;
use crate::error::{Result, VizError};
use crate::ledger::feed::BatchSource;
use crate::ledger::Batch;
use crate::render::animator::{AnimationScheduler, FrameRequester, TickOutcome};
use crate::render::backend::Frame;
use crate::render::events::{Subscription, SurfaceEvent, SurfaceEvents};
use crate::render::flow_graph::{FlowGraph, FlowGraphBuilder, FlowStats, NodeKind};
use crate::render::picker::InteractionPicker;
use crate::render::scene::{BackendFactory, SceneController};
use crate::render::{PlaybackState, SurfaceSize};

/// Radians of orbit per dragged pixel.
const ORBIT_RATE: f32 = 0.008;

/// Emitted to the host on a successful pick.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionEvent {
    pub kind: NodeKind,
    pub batch: Batch,
    pub node_id: String,
}

pub struct FlowVisualizer {
    builder: FlowGraphBuilder,
    picker: InteractionPicker,
    scene: SceneController,
    scheduler: AnimationScheduler,
    subscription: Subscription,
    batches: Vec<Batch>,
    graph: FlowGraph,
    stats: FlowStats,
    selection: Option<SelectionEvent>,
    disposed: bool,
}

impl FlowVisualizer {
    /// Mount on a surface of `size`, listening to `events`.
    ///
    /// Fails with `ContextUnavailable` when no render backend can be
    /// created; the animation loop is never started in that case.
    pub fn mount(
        config: &VisualizerConfig,
        size: SurfaceSize,
        events: &SurfaceEvents,
        requester: Box<dyn FrameRequester>,
    ) -> Result<Self> {
        let scene = SceneController::initialize(config, size)?;
        Ok(Self::assemble(config, scene, events, requester))
    }

    /// [`mount`](Self::mount) with a caller-supplied backend factory.
    pub fn mount_with(
        config: &VisualizerConfig,
        size: SurfaceSize,
        events: &SurfaceEvents,
        requester: Box<dyn FrameRequester>,
        factory: Box<BackendFactory<'_>>,
    ) -> Result<Self> {
        let scene = SceneController::initialize_with(config, size, factory)?;
        Ok(Self::assemble(config, scene, events, requester))
    }

    fn assemble(
        config: &VisualizerConfig,
        scene: SceneController,
        events: &SurfaceEvents,
        requester: Box<dyn FrameRequester>,
    ) -> Self {
        let mut scheduler = AnimationScheduler::new(config.animation, requester);
        scheduler.start();
        Self {
            builder: FlowGraphBuilder::new(config.layout),
            picker: InteractionPicker::new(),
            scene,
            scheduler,
            subscription: events.subscribe(),
            batches: Vec::new(),
            graph: FlowGraph::default(),
            stats: FlowStats::default(),
            selection: None,
            disposed: false,
        }
    }

    /// Replace the displayed batches: halt, clear, attach, re-arm.
    pub fn load(&mut self, batches: Vec<Batch>) {
        if self.disposed {
            return;
        }
        self.scheduler.halt();
        self.scene.clear();
        self.graph = self.builder.build(&batches);
        self.scene.attach(&self.graph);
        self.stats = FlowStats::from_batches(&batches);
        self.batches = batches;
        self.refresh_selection();
        self.scheduler.rearm();
        log::info!(
            "flow graph rebuilt: {} batches, {} nodes, {} edges",
            self.batches.len(),
            self.graph.nodes.len(),
            self.graph.edges.len()
        );
    }

    /// Fetch from `source` and rebuild. On failure the current graph stays.
    pub fn refresh(&mut self, source: &dyn BatchSource) -> Result<()> {
        match source.fetch_batches() {
            Ok(batches) => {
                self.load(batches);
                Ok(())
            }
            Err(e) => {
                log::warn!("batch refresh failed: {}", e);
                Err(e)
            }
        }
    }

    /// Keep the selection only if its node survived the rebuild, with the
    /// batch record updated.
    fn refresh_selection(&mut self) {
        let Some(sel) = self.selection.take() else {
            return;
        };
        self.selection = self.graph.node(&sel.node_id).and_then(|node| {
            Some(SelectionEvent {
                kind: node.kind,
                batch: self.batches.get(node.batch_index)?.clone(),
                node_id: node.id.clone(),
            })
        });
    }

    // ── Host commands ──

    pub fn play(&mut self) {
        self.scheduler.resume();
    }

    pub fn pause(&mut self) {
        self.scheduler.pause();
    }

    pub fn toggle_playback(&mut self) {
        match self.scheduler.state() {
            PlaybackState::Playing => self.pause(),
            PlaybackState::Paused => self.play(),
        }
    }

    pub fn playback(&self) -> PlaybackState {
        self.scheduler.state()
    }

    /// Default camera pose, no selection.
    pub fn reset_view(&mut self) {
        if self.disposed {
            return;
        }
        self.scene.camera_mut().reset();
        self.selection = None;
        self.scheduler.invalidate();
    }

    pub fn resize(&mut self, size: SurfaceSize) {
        if self.disposed || size.is_degenerate() || size == self.scene.size() {
            return;
        }
        self.scene.resize(size);
        self.scheduler.invalidate();
    }

    /// Orbit by a pointer drag of `delta` pixels.
    pub fn orbit(&mut self, delta: Vec2) {
        if self.disposed {
            return;
        }
        self.scene
            .camera_mut()
            .orbit(delta.x * ORBIT_RATE, -delta.y * ORBIT_RATE);
        self.scheduler.invalidate();
    }

    /// Dolly by a scroll amount; positive moves closer.
    pub fn zoom(&mut self, scroll: f32) {
        if self.disposed {
            return;
        }
        self.scene.camera_mut().dolly(scroll);
        self.scheduler.invalidate();
    }

    /// Pick at surface pixel `px`. A hit becomes the current selection;
    /// a miss emits nothing and leaves the selection alone.
    pub fn pointer_down(&mut self, px: Vec2) -> Option<SelectionEvent> {
        if self.disposed {
            return None;
        }
        let hit = self.picker.pick(&self.scene, px)?;
        let event = SelectionEvent {
            kind: hit.kind,
            batch: self.batches.get(hit.batch_index)?.clone(),
            node_id: hit.node_id,
        };
        self.selection = Some(event.clone());
        Some(event)
    }

    /// Apply queued surface events; returns the selections they produced.
    pub fn pump_events(&mut self) -> Vec<SelectionEvent> {
        let mut selections = Vec::new();
        for event in self.subscription.drain() {
            match event {
                SurfaceEvent::Resized(size) => self.resize(size),
                SurfaceEvent::PointerDown { x, y } => {
                    selections.extend(self.pointer_down(Vec2::new(x, y)));
                }
            }
        }
        selections
    }

    /// Host frame callback.
    pub fn on_frame(&mut self, dt: f32) -> Result<TickOutcome> {
        self.scheduler.tick(&mut self.scene, dt)
    }

    // ── Queries ──

    pub fn frame(&self) -> Option<&Frame> {
        self.scene.last_frame()
    }

    pub fn stats(&self) -> FlowStats {
        self.stats
    }

    pub fn selection(&self) -> Option<&SelectionEvent> {
        self.selection.as_ref()
    }

    pub fn batches(&self) -> &[Batch] {
        &self.batches
    }

    pub fn graph(&self) -> &FlowGraph {
        &self.graph
    }

    pub fn scene(&self) -> &SceneController {
        &self.scene
    }

    pub fn elapsed(&self) -> f32 {
        self.scheduler.elapsed()
    }

    /// Where the node `id` currently appears on the surface.
    pub fn node_screen_position(&self, id: &str) -> Option<Vec2> {
        let t = self.scene.node_transform(id)?;
        self.scene.camera().project(t.position, self.scene.size())
    }

    /// Write the last rendered frame to a PNG file.
    pub fn snapshot(&self, path: impl AsRef<Path>) -> Result<()> {
        let frame = self
            .frame()
            .ok_or_else(|| VizError::Snapshot("no frame rendered yet".into()))?;
        frame.save_png(path)
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Tear down: cancel the loop, release the scene, unsubscribe.
    /// Returns `false` if already disposed.
    pub fn dispose(&mut self) -> bool {
        if self.disposed {
            return false;
        }
        self.disposed = true;
        self.scheduler.cancel();
        self.scene.dispose();
        self.subscription.unsubscribe();
        self.selection = None;
        true
    }
}

impl Drop for FlowVisualizer {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendKind;
    use crate::ledger::feed::StaticSource;
    use crate::ledger::BatchStatus;
    use crate::render::animator::tests::{RecordingRequester, RequestLog};
    use crate::render::backend::RenderBackend;
    use crate::render::camera::Camera;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn config() -> VisualizerConfig {
        VisualizerConfig::default()
            .with_backend(BackendKind::Software)
            .with_background(false)
    }

    fn batches(statuses: &[BatchStatus]) -> Vec<Batch> {
        statuses
            .iter()
            .enumerate()
            .map(|(i, s)| Batch::new(format!("b{}", i + 1), *s))
            .collect()
    }

    fn mounted(events: &SurfaceEvents) -> (FlowVisualizer, Rc<RefCell<RequestLog>>) {
        let requester = RecordingRequester::default();
        let log = requester.0.clone();
        let viz = FlowVisualizer::mount(&config(), SurfaceSize::new(320, 240), events, Box::new(requester))
            .unwrap();
        (viz, log)
    }

    fn positions(viz: &FlowVisualizer) -> Vec<glam::Vec3> {
        viz.graph()
            .nodes
            .iter()
            .map(|n| viz.scene().node_transform(&n.id).unwrap().position)
            .collect()
    }

    #[test]
    fn scenario_single_issued_batch() {
        let events = SurfaceEvents::new();
        let (mut viz, _) = mounted(&events);
        viz.load(batches(&[BatchStatus::Issued]));
        assert_eq!(viz.scene().node_count(), 1);
        assert_eq!(viz.scene().edge_count(), 0);
        assert_eq!(viz.graph().nodes[0].id, "issue-b1");
    }

    #[test]
    fn scenario_single_retired_batch() {
        let events = SurfaceEvents::new();
        let (mut viz, _) = mounted(&events);
        viz.load(batches(&[BatchStatus::Retired]));
        let ids: Vec<&str> = viz.graph().nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, ["issue-b1", "transfer-b1", "retire-b1"]);
        assert_eq!(viz.scene().edge_count(), 2);
        assert_eq!(viz.stats().retired, 1);
    }

    #[test]
    fn unavailable_context_never_starts_loop() {
        let events = SurfaceEvents::new();
        let requester = RecordingRequester::default();
        let log = requester.0.clone();
        let result = FlowVisualizer::mount_with(
            &config(),
            SurfaceSize::new(320, 240),
            &events,
            Box::new(requester),
            Box::new(|_: SurfaceSize| -> Result<Box<dyn RenderBackend>> {
                Err(VizError::ContextUnavailable("no adapter".into()))
            }),
        );
        assert!(matches!(result, Err(VizError::ContextUnavailable(_))));
        assert_eq!(log.borrow().requested, 0);
        assert_eq!(events.listener_count(), 0);
    }

    #[test]
    fn click_on_node_emits_selection() {
        let events = SurfaceEvents::new();
        let (mut viz, _) = mounted(&events);
        viz.load(batches(&[BatchStatus::Issued, BatchStatus::Retired]));
        viz.on_frame(0.016).unwrap();

        let px = viz.node_screen_position("transfer-b2").unwrap();
        let event = viz.pointer_down(px).unwrap();
        assert_eq!(event.kind, NodeKind::Transfer);
        assert_eq!(event.batch.id, "b2");
        assert_eq!(viz.selection(), Some(&event));

        // Miss: no event, selection kept.
        assert!(viz.pointer_down(Vec2::new(1.0, 1.0)).is_none());
        assert_eq!(viz.selection(), Some(&event));

        viz.reset_view();
        assert!(viz.selection().is_none());
    }

    #[test]
    fn rebuild_with_same_list_picks_identically() {
        let events = SurfaceEvents::new();
        let (mut viz, _) = mounted(&events);
        use BatchStatus::*;
        let list = batches(&[Retired, Issued, Transferred, Retired, Issued, Retired]);
        viz.load(list.clone());
        let px = viz.node_screen_position("retire-b4").unwrap();
        let first = viz.pointer_down(px).unwrap();
        viz.load(list);
        let second = viz.pointer_down(px).unwrap();
        assert_eq!(first, second);
        assert_eq!(viz.selection(), Some(&second));
    }

    #[test]
    fn rebuild_drops_selection_of_vanished_node() {
        let events = SurfaceEvents::new();
        let (mut viz, _) = mounted(&events);
        viz.load(batches(&[BatchStatus::Retired]));
        let px = viz.node_screen_position("retire-b1").unwrap();
        assert!(viz.pointer_down(px).is_some());
        viz.load(batches(&[BatchStatus::Transferred]));
        assert!(viz.selection().is_none());
    }

    #[test]
    fn pause_freezes_and_play_resumes() {
        let events = SurfaceEvents::new();
        let (mut viz, _) = mounted(&events);
        viz.load(batches(&[BatchStatus::Retired, BatchStatus::Transferred]));
        viz.on_frame(0.016).unwrap();

        viz.pause();
        viz.on_frame(0.016).unwrap();
        let a = positions(&viz);
        viz.on_frame(0.016).unwrap();
        assert_eq!(a, positions(&viz));

        viz.play();
        viz.on_frame(0.016).unwrap();
        assert_ne!(a, positions(&viz));
    }

    #[test]
    fn surface_events_drive_resize_and_pick() {
        let events = SurfaceEvents::new();
        let (mut viz, _) = mounted(&events);
        viz.load(batches(&[BatchStatus::Retired]));
        let logical: Vec<glam::Vec3> = viz.graph().nodes.iter().map(|n| n.position).collect();

        events.emit(SurfaceEvent::Resized(SurfaceSize::new(0, 0)));
        events.emit(SurfaceEvent::Resized(SurfaceSize::new(640, 200)));
        assert!(viz.pump_events().is_empty());
        assert_eq!(viz.scene().size(), SurfaceSize::new(640, 200));
        let after: Vec<glam::Vec3> = viz.graph().nodes.iter().map(|n| n.position).collect();
        assert_eq!(logical, after);

        let px = viz.node_screen_position("issue-b1").unwrap();
        events.emit(SurfaceEvent::PointerDown { x: px.x, y: px.y });
        let picked = viz.pump_events();
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].node_id, "issue-b1");
    }

    #[test]
    fn pointer_after_resize_uses_the_new_size() {
        let events = SurfaceEvents::new();
        let requester = RecordingRequester::default();
        let mut viz =
            FlowVisualizer::mount(&config(), SurfaceSize::new(800, 600), &events, Box::new(requester)).unwrap();
        use BatchStatus::*;
        viz.load(batches(&[Issued, Issued, Issued]));

        let narrow = SurfaceSize::new(400, 600);
        let target = viz.scene().node_transform("issue-b3").unwrap().position;
        let px = Camera::new(&config().camera, narrow).project(target, narrow).unwrap();

        events.emit(SurfaceEvent::Resized(narrow));
        events.emit(SurfaceEvent::PointerDown { x: px.x, y: px.y });
        events.emit(SurfaceEvent::Resized(SurfaceSize::new(500, 600)));

        let picked = viz.pump_events();
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].node_id, "issue-b3");
        assert_eq!(viz.scene().size(), SurfaceSize::new(500, 600));
    }

    #[test]
    fn dispose_is_ordered_and_idempotent() {
        let events = SurfaceEvents::new();
        let (mut viz, log) = mounted(&events);
        viz.load(batches(&[BatchStatus::Retired]));
        assert_eq!(events.listener_count(), 1);
        let revoked = log.borrow().revoked;

        assert!(viz.dispose());
        assert!(!viz.dispose());
        assert_eq!(events.listener_count(), 0);
        assert_eq!(log.borrow().revoked, revoked + 1);
        assert!(viz.scene().is_disposed());

        let requested = log.borrow().requested;
        assert_eq!(viz.on_frame(0.016).unwrap(), TickOutcome::Inert);
        assert!(viz.frame().is_none());
        assert!(viz.pointer_down(Vec2::new(160.0, 120.0)).is_none());
        viz.load(batches(&[BatchStatus::Issued]));
        viz.play();
        viz.reset_view();
        assert_eq!(log.borrow().requested, requested);
    }

    #[test]
    fn repeated_mounts_leave_no_listeners() {
        let events = SurfaceEvents::new();
        for _ in 0..10 {
            let (mut viz, _) = mounted(&events);
            viz.load(batches(&[BatchStatus::Issued]));
            viz.on_frame(0.016).unwrap();
        }
        assert_eq!(events.listener_count(), 0);
    }

    #[test]
    fn refresh_failure_keeps_current_graph() {
        struct Failing;
        impl BatchSource for Failing {
            fn fetch_batches(&self) -> Result<Vec<Batch>> {
                Err(VizError::Feed("connection refused".into()))
            }
        }
        let events = SurfaceEvents::new();
        let (mut viz, _) = mounted(&events);
        viz.refresh(&StaticSource(batches(&[BatchStatus::Retired]))).unwrap();
        assert_eq!(viz.scene().node_count(), 3);
        assert!(viz.refresh(&Failing).is_err());
        assert_eq!(viz.scene().node_count(), 3);
    }

    #[test]
    fn empty_list_renders_empty_scene() {
        let events = SurfaceEvents::new();
        let (mut viz, _) = mounted(&events);
        viz.load(Vec::new());
        assert_eq!(viz.stats(), FlowStats::default());
        let outcome = viz.on_frame(0.016).unwrap();
        assert_eq!(outcome, TickOutcome::Rendered { requested: true });
        assert!(viz.frame().is_some());
    }

    #[test]
    fn snapshot_writes_png() {
        let events = SurfaceEvents::new();
        let (mut viz, _) = mounted(&events);
        assert!(matches!(
            viz.snapshot(std::env::temp_dir().join("h2-flow-none.png")),
            Err(VizError::Snapshot(_))
        ));
        viz.load(batches(&[BatchStatus::Retired]));
        viz.on_frame(0.016).unwrap();
        let path = std::env::temp_dir().join(format!("h2-flow-{}.png", std::process::id()));
        viz.snapshot(&path).unwrap();
        let img = image::open(&path).unwrap();
        assert_eq!((img.width(), img.height()), (320, 240));
        let _ = std::fs::remove_file(&path);
    }
}
