//! Scene lifecycle: the single owner of camera, render backend and meshes
//! for one mounted view.
//!
//! Nothing outside this type mutates the scene directly. The scheduler,
//! picker and host go through its operations; meshes are addressed by
//! [`MeshHandle`] and resolved back to flow nodes through a typed map kept
//! here, never by tagging the mesh itself.

use std::collections::HashMap;

use glam::Vec3;

use crate::config::VisualizerConfig;
use crate::error::{Result, VizError};
use crate::render::background::ProceduralBackground;
use crate::render::backend::{self, DrawList, Frame, RenderBackend};
use crate::render::camera::Camera;
use crate::render::flow_graph::{FlowGraph, FlowNode, NodeKind};
use crate::render::mesh::{Geometry, Mesh, MeshHandle, MeshStore, Transform};
use crate::render::SurfaceSize;

/// Screen width of edge lines.
const EDGE_WIDTH_PX: f32 = 2.0;
const EDGE_OPACITY: f32 = 0.6;

/// Creates the backend for a surface. Swappable so hosts and tests can
/// supply their own context.
pub type BackendFactory<'a> = dyn FnOnce(SurfaceSize) -> Result<Box<dyn RenderBackend>> + 'a;

/// Geometry used for each node kind.
pub fn node_geometry(kind: NodeKind) -> Geometry {
    match kind {
        NodeKind::Issue => Geometry::Sphere { radius: 0.3 },
        NodeKind::Transfer => Geometry::Cone {
            radius: 0.2,
            height: 0.6,
        },
        NodeKind::Retire => Geometry::Octahedron { radius: 0.25 },
    }
}

#[derive(Debug, Clone)]
struct NodeEntry {
    node: FlowNode,
    handle: MeshHandle,
}

/// A node as the picker sees it: identity plus live bounding sphere.
#[derive(Debug, Clone, Copy)]
pub struct PickTarget<'a> {
    pub node: &'a FlowNode,
    pub center: Vec3,
    pub radius: f32,
}

/// SceneLifecycleManager: camera, backend and meshes of one view.
pub struct SceneController {
    camera: Camera,
    size: SurfaceSize,
    clear_color: [f32; 4],
    backend: Option<Box<dyn RenderBackend>>,
    store: MeshStore,
    nodes: Vec<NodeEntry>,
    /// Mesh → index into `nodes`.
    by_handle: HashMap<MeshHandle, usize>,
    edges: Vec<MeshHandle>,
    background: ProceduralBackground,
    last_frame: Option<Frame>,
    frames_rendered: u64,
    disposed: bool,
}

impl SceneController {
    /// Create the scene with the backend selected in `config`.
    pub fn initialize(config: &VisualizerConfig, size: SurfaceSize) -> Result<Self> {
        let kind = config.renderer.backend;
        Self::initialize_with(
            config,
            size,
            Box::new(move |s: SurfaceSize| backend::create_backend(kind, s)),
        )
    }

    /// Create the scene with a caller-supplied backend factory.
    pub fn initialize_with(
        config: &VisualizerConfig,
        size: SurfaceSize,
        factory: Box<BackendFactory<'_>>,
    ) -> Result<Self> {
        if size.is_degenerate() {
            return Err(VizError::InvalidSurface {
                width: size.width,
                height: size.height,
            });
        }
        let backend = factory(size)?;
        log::info!(
            "scene initialised: {}x{} on {} backend",
            size.width,
            size.height,
            backend.name()
        );

        let mut store = MeshStore::new();
        let background = ProceduralBackground::generate(&config.background, &mut store);

        Ok(Self {
            camera: Camera::new(&config.camera, size),
            size,
            clear_color: config.renderer.clear_color,
            backend: Some(backend),
            store,
            nodes: Vec::new(),
            by_handle: HashMap::new(),
            edges: Vec::new(),
            background,
            last_frame: None,
            frames_rendered: 0,
            disposed: false,
        })
    }

    /// Apply a new surface size. Degenerate sizes, and sizes the backend
    /// cannot render, keep the last valid one.
    pub fn resize(&mut self, size: SurfaceSize) {
        if self.disposed {
            return;
        }
        if size.is_degenerate() {
            log::debug!("ignoring degenerate resize {}x{}", size.width, size.height);
            return;
        }
        if size == self.size {
            return;
        }
        if let Err(e) = backend::check_surface(size) {
            log::warn!("ignoring resize: {}", e);
            return;
        }
        if self.backend.as_ref().is_some_and(|b| !b.accepts(size)) {
            log::warn!(
                "ignoring resize {}x{}: too large for the {} backend",
                size.width,
                size.height,
                self.backend_name().unwrap_or("current")
            );
            return;
        }
        self.size = size;
        self.camera.set_aspect(size);
        if let Some(backend) = self.backend.as_mut() {
            backend.resize(size);
        }
    }

    /// Instantiate meshes for every node and edge of `graph`.
    pub fn attach(&mut self, graph: &FlowGraph) {
        if self.disposed {
            return;
        }
        for node in &graph.nodes {
            let mesh = Mesh::new(
                node_geometry(node.kind),
                node.kind.color(),
                Transform::at(node.position),
            );
            let handle = self.store.insert(mesh);
            self.by_handle.insert(handle, self.nodes.len());
            self.nodes.push(NodeEntry {
                node: node.clone(),
                handle,
            });
        }
        for edge in &graph.edges {
            let Some((start, end)) = graph.edge_endpoints(edge) else {
                continue;
            };
            let [r, g, b, _] = edge.kind.color();
            let mesh = Mesh::new(
                Geometry::Line {
                    start,
                    end,
                    width_px: EDGE_WIDTH_PX,
                },
                [r, g, b, EDGE_OPACITY],
                Transform::default(),
            );
            self.edges.push(self.store.insert(mesh));
        }
        log::debug!(
            "attached {} nodes, {} edges",
            self.nodes.len(),
            self.edges.len()
        );
    }

    /// Remove all node and edge meshes. Returns how many were released;
    /// a second call releases nothing.
    pub fn clear(&mut self) -> usize {
        let mut released = 0;
        for entry in self.nodes.drain(..) {
            released += self.store.remove(entry.handle).is_some() as usize;
        }
        for handle in self.edges.drain(..) {
            released += self.store.remove(handle).is_some() as usize;
        }
        self.by_handle.clear();
        released
    }

    /// Draw one frame. After dispose this does nothing and returns `None`.
    pub fn render(&mut self) -> Result<Option<&Frame>> {
        if self.disposed {
            return Ok(None);
        }
        let Some(backend) = self.backend.as_mut() else {
            return Ok(None);
        };
        let list = DrawList::build(
            self.store.iter().map(|(_, m)| m),
            &self.camera,
            self.size,
            self.clear_color,
        );
        let frame = backend.draw(&list)?;
        self.frames_rendered += 1;
        Ok(Some(&*self.last_frame.insert(frame)))
    }

    /// Release meshes and the backend. Only the first call does anything;
    /// it returns `true` when it performed the release.
    pub fn dispose(&mut self) -> bool {
        if self.disposed {
            return false;
        }
        self.disposed = true;
        self.nodes.clear();
        self.edges.clear();
        self.by_handle.clear();
        let meshes = self.store.clear();
        if let Some(mut backend) = self.backend.take() {
            backend.release();
        }
        self.last_frame = None;
        log::info!("scene disposed: released {} meshes", meshes);
        true
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    // ── Queries ──

    pub fn size(&self) -> SurfaceSize {
        self.size
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn backend_name(&self) -> Option<&'static str> {
        self.backend.as_ref().map(|b| b.name())
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn mesh_count(&self) -> usize {
        self.store.len()
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    pub fn last_frame(&self) -> Option<&Frame> {
        self.last_frame.as_ref()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &FlowNode> {
        self.nodes.iter().map(|e| &e.node)
    }

    /// Node owning `handle`, if it is a live node mesh.
    pub fn node_for(&self, handle: MeshHandle) -> Option<&FlowNode> {
        self.by_handle.get(&handle).map(|&i| &self.nodes[i].node)
    }

    /// Current mesh transform of the node with `id`.
    pub fn node_transform(&self, id: &str) -> Option<Transform> {
        let entry = self.nodes.iter().find(|e| e.node.id == id)?;
        self.store.get(entry.handle).map(|m| m.transform)
    }

    /// Live node meshes for picking. Edges and background never appear.
    pub fn pick_targets(&self) -> impl Iterator<Item = PickTarget<'_>> {
        self.nodes.iter().filter_map(|e| {
            let (center, radius) = self.store.get(e.handle)?.bounds();
            Some(PickTarget {
                node: &e.node,
                center,
                radius,
            })
        })
    }

    // ── Animation hooks ──

    /// Visit every node mesh with its index in attach order.
    pub fn for_each_node_mesh(&mut self, mut f: impl FnMut(usize, &FlowNode, &mut Mesh)) {
        for (i, entry) in self.nodes.iter().enumerate() {
            if let Some(mesh) = self.store.get_mut(entry.handle) {
                f(i, &entry.node, mesh);
            }
        }
    }

    pub fn animate_background(&mut self, elapsed: f32, dt: f32) {
        self.background.animate(&mut self.store, elapsed, dt);
    }
}

impl Drop for SceneController {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::BackendKind;
    use crate::ledger::{Batch, BatchStatus};
    use crate::render::backend::SoftwareRenderer;
    use crate::render::flow_graph::FlowGraphBuilder;
    use std::cell::Cell;
    use std::rc::Rc;

    pub(crate) fn test_config() -> VisualizerConfig {
        VisualizerConfig::default()
            .with_backend(BackendKind::Software)
            .with_background(false)
    }

    pub(crate) fn graph(statuses: &[BatchStatus]) -> FlowGraph {
        let batches: Vec<Batch> = statuses
            .iter()
            .enumerate()
            .map(|(i, s)| Batch::new(format!("b{}", i + 1), *s))
            .collect();
        FlowGraphBuilder::default().build(&batches)
    }

    /// Software backend that counts releases.
    struct CountingBackend {
        inner: SoftwareRenderer,
        releases: Rc<Cell<u32>>,
    }

    impl RenderBackend for CountingBackend {
        fn name(&self) -> &'static str {
            "counting"
        }
        fn resize(&mut self, size: SurfaceSize) {
            self.inner.resize(size);
        }
        fn draw(&mut self, list: &DrawList) -> Result<Frame> {
            self.inner.draw(list)
        }
        fn release(&mut self) {
            self.releases.set(self.releases.get() + 1);
        }
    }

    fn counting_scene(releases: Rc<Cell<u32>>) -> SceneController {
        SceneController::initialize_with(
            &test_config(),
            SurfaceSize::new(80, 60),
            Box::new(move |s: SurfaceSize| -> Result<Box<dyn RenderBackend>> {
                let b: Box<dyn RenderBackend> = Box::new(CountingBackend {
                    inner: SoftwareRenderer::new(s),
                    releases,
                });
                Ok(b)
            }),
        )
        .unwrap()
    }

    #[test]
    fn unavailable_context_fails_initialize() {
        let result = SceneController::initialize_with(
            &test_config(),
            SurfaceSize::new(80, 60),
            Box::new(|_: SurfaceSize| -> Result<Box<dyn RenderBackend>> {
                Err(VizError::ContextUnavailable("headless".into()))
            }),
        );
        assert!(matches!(result, Err(VizError::ContextUnavailable(_))));
    }

    #[test]
    fn degenerate_initial_surface_is_rejected() {
        let result = SceneController::initialize(&test_config(), SurfaceSize::new(0, 60));
        assert!(matches!(result, Err(VizError::InvalidSurface { .. })));
    }

    #[test]
    fn attach_creates_node_and_edge_meshes() {
        let mut scene = SceneController::initialize(&test_config(), SurfaceSize::new(80, 60)).unwrap();
        scene.attach(&graph(&[BatchStatus::Retired, BatchStatus::Issued]));
        assert_eq!(scene.node_count(), 4);
        assert_eq!(scene.edge_count(), 2);
        assert_eq!(scene.mesh_count(), 6);
        assert_eq!(scene.pick_targets().count(), 4);
    }

    #[test]
    fn clear_is_idempotent_and_keeps_background() {
        let config = VisualizerConfig::default().with_backend(BackendKind::Software);
        let mut scene = SceneController::initialize(&config, SurfaceSize::new(80, 60)).unwrap();
        let background = scene.mesh_count();
        scene.attach(&graph(&[BatchStatus::Transferred]));
        assert_eq!(scene.clear(), 3);
        assert_eq!(scene.clear(), 0);
        assert_eq!(scene.node_count(), 0);
        assert_eq!(scene.mesh_count(), background);
    }

    #[test]
    fn resize_keeps_logical_positions_and_ignores_degenerate() {
        let mut scene = SceneController::initialize(&test_config(), SurfaceSize::new(80, 60)).unwrap();
        scene.attach(&graph(&[BatchStatus::Retired]));
        let before: Vec<Vec3> = scene.nodes().map(|n| n.position).collect();

        scene.resize(SurfaceSize::new(160, 40));
        assert_eq!(scene.camera().aspect(), 4.0);
        scene.resize(SurfaceSize::new(0, 40));
        assert_eq!(scene.size(), SurfaceSize::new(160, 40));
        assert_eq!(scene.camera().aspect(), 4.0);

        let after: Vec<Vec3> = scene.nodes().map(|n| n.position).collect();
        assert_eq!(before, after);
        let frame = scene.render().unwrap().unwrap();
        assert_eq!(frame.size, SurfaceSize::new(160, 40));
    }

    #[test]
    fn oversize_resize_is_ignored() {
        let mut scene = SceneController::initialize(&test_config(), SurfaceSize::new(80, 60)).unwrap();
        scene.resize(SurfaceSize::new(20_000, 20_000));
        scene.resize(SurfaceSize::new(backend::MAX_SURFACE_EDGE + 1, 60));
        assert_eq!(scene.size(), SurfaceSize::new(80, 60));
        let frame = scene.render().unwrap().unwrap();
        assert_eq!(frame.size, SurfaceSize::new(80, 60));
    }

    /// Software backend limited to 100 px wide surfaces.
    struct NarrowBackend(SoftwareRenderer);

    impl RenderBackend for NarrowBackend {
        fn name(&self) -> &'static str {
            "narrow"
        }
        fn accepts(&self, size: SurfaceSize) -> bool {
            size.width <= 100
        }
        fn resize(&mut self, size: SurfaceSize) {
            self.0.resize(size);
        }
        fn draw(&mut self, list: &DrawList) -> Result<Frame> {
            self.0.draw(list)
        }
        fn release(&mut self) {}
    }

    #[test]
    fn resize_respects_backend_limits() {
        let mut scene = SceneController::initialize_with(
            &test_config(),
            SurfaceSize::new(80, 60),
            Box::new(|s: SurfaceSize| -> Result<Box<dyn RenderBackend>> {
                let b: Box<dyn RenderBackend> = Box::new(NarrowBackend(SoftwareRenderer::new(s)));
                Ok(b)
            }),
        )
        .unwrap();
        scene.resize(SurfaceSize::new(200, 60));
        assert_eq!(scene.size(), SurfaceSize::new(80, 60));
        scene.resize(SurfaceSize::new(100, 50));
        assert_eq!(scene.size(), SurfaceSize::new(100, 50));
    }

    #[test]
    fn handle_map_resolves_nodes() {
        let mut scene = SceneController::initialize(&test_config(), SurfaceSize::new(80, 60)).unwrap();
        scene.attach(&graph(&[BatchStatus::Transferred]));
        let handles: Vec<MeshHandle> = scene.nodes.iter().map(|e| e.handle).collect();
        assert_eq!(scene.node_for(handles[1]).unwrap().id, "transfer-b1");
        scene.clear();
        assert!(scene.node_for(handles[1]).is_none());
    }

    #[test]
    fn dispose_releases_exactly_once() {
        let releases = Rc::new(Cell::new(0));
        let mut scene = counting_scene(releases.clone());
        scene.attach(&graph(&[BatchStatus::Retired]));
        assert!(scene.render().unwrap().is_some());

        assert!(scene.dispose());
        assert!(!scene.dispose());
        assert_eq!(releases.get(), 1);
        assert_eq!(scene.mesh_count(), 0);

        assert!(scene.render().unwrap().is_none());
        assert_eq!(scene.frames_rendered(), 1);
        drop(scene);
        assert_eq!(releases.get(), 1);
    }

    #[test]
    fn drop_disposes() {
        let releases = Rc::new(Cell::new(0));
        drop(counting_scene(releases.clone()));
        assert_eq!(releases.get(), 1);
    }
}
