//! Pointer picking: surface pixel → camera ray → nearest node.
//!
//! Only node meshes are candidates (edges and background never are), and
//! they are tested at their live animated transforms against their
//! bounding spheres.

use glam::Vec2;

use crate::render::camera::pixel_to_ndc;
use crate::render::flow_graph::NodeKind;
use crate::render::scene::SceneController;

/// A resolved pick.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub node_id: String,
    pub kind: NodeKind,
    /// Index into the batch list the graph was built from.
    pub batch_index: usize,
    /// Distance from the ray origin to the hit.
    pub distance: f32,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct InteractionPicker;

impl InteractionPicker {
    pub fn new() -> Self {
        Self
    }

    /// Resolve a pointer-down at `px` against the scene as it is now.
    pub fn pick(&self, scene: &SceneController, px: Vec2) -> Option<Selection> {
        let size = scene.size();
        if px.x < 0.0 || px.y < 0.0 || px.x >= size.width as f32 || px.y >= size.height as f32 {
            return None;
        }
        let ray = scene.camera().ray_from_ndc(pixel_to_ndc(px, size));

        let hit = scene
            .pick_targets()
            .filter_map(|t| ray.intersect_sphere(t.center, t.radius).map(|d| (d, t.node)))
            .min_by(|a, b| a.0.total_cmp(&b.0));

        match hit {
            Some((distance, node)) => {
                log::debug!("pick ({:.0}, {:.0}) → {}", px.x, px.y, node.id);
                Some(Selection {
                    node_id: node.id.clone(),
                    kind: node.kind,
                    batch_index: node.batch_index,
                    distance,
                })
            }
            None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VisualizerConfig;
    use crate::ledger::BatchStatus;
    use crate::render::scene::tests::{graph, test_config};
    use crate::render::SurfaceSize;
    use glam::Vec3;

    fn scene(size: SurfaceSize) -> SceneController {
        let mut scene = SceneController::initialize(&test_config(), size).unwrap();
        use BatchStatus::*;
        scene.attach(&graph(&[Retired, Issued, Transferred, Retired, Retired, Transferred, Retired]));
        scene
    }

    fn project(scene: &SceneController, id: &str) -> Vec2 {
        let p = scene.node_transform(id).unwrap().position;
        scene.camera().project(p, scene.size()).unwrap()
    }

    #[test]
    fn node_center_resolves_to_that_node() {
        let scene = scene(SurfaceSize::new(800, 600));
        let picker = InteractionPicker::new();
        for node in scene.nodes() {
            let hit = picker.pick(&scene, project(&scene, &node.id)).unwrap();
            assert_eq!(hit.node_id, node.id);
            assert_eq!(hit.kind, node.kind);
            assert_eq!(hit.batch_index, node.batch_index);
        }
    }

    #[test]
    fn picks_follow_orbit_and_resize() {
        let mut scene = scene(SurfaceSize::new(800, 600));
        scene.camera_mut().orbit(0.5, 0.3);
        scene.resize(SurfaceSize::new(1024, 400));
        let picker = InteractionPicker::new();
        let px = project(&scene, "retire-b4");
        let hit = picker.pick(&scene, px).unwrap();
        assert_eq!(hit.node_id, "retire-b4");
        assert_eq!(hit.kind, NodeKind::Retire);
        assert_eq!(hit.batch_index, 3);
    }

    #[test]
    fn picks_use_live_transforms() {
        let mut scene = scene(SurfaceSize::new(800, 600));
        scene.for_each_node_mesh(|_, _, mesh| mesh.transform.position += Vec3::Y * 0.15);
        let hit = InteractionPicker::new()
            .pick(&scene, project(&scene, "issue-b2"))
            .unwrap();
        assert_eq!(hit.node_id, "issue-b2");
    }

    #[test]
    fn edges_empty_space_and_outside_are_misses() {
        let scene = scene(SurfaceSize::new(800, 600));
        let picker = InteractionPicker::new();
        // Midway along the issue → transfer edge of b1.
        let mid = (scene.node_transform("issue-b1").unwrap().position
            + scene.node_transform("transfer-b1").unwrap().position)
            * 0.5;
        let px = scene.camera().project(mid, scene.size()).unwrap();
        assert!(picker.pick(&scene, px).is_none());

        assert!(picker.pick(&scene, Vec2::new(2.0, 2.0)).is_none());
        assert!(picker.pick(&scene, Vec2::new(-5.0, 300.0)).is_none());
        assert!(picker.pick(&scene, Vec2::new(800.0, 300.0)).is_none());
    }

    #[test]
    fn background_is_never_pickable() {
        let config = VisualizerConfig::default()
            .with_backend(crate::config::BackendKind::Software);
        let scene = SceneController::initialize(&config, SurfaceSize::new(200, 150)).unwrap();
        assert!(scene.mesh_count() > 0);
        let picker = InteractionPicker::new();
        for y in (0..150).step_by(5) {
            for x in (0..200).step_by(5) {
                assert!(picker.pick(&scene, Vec2::new(x as f32, y as f32)).is_none());
            }
        }
    }

    #[test]
    fn pick_after_clear_sees_new_graph() {
        let mut scene = scene(SurfaceSize::new(800, 600));
        let px = project(&scene, "transfer-b1");
        scene.clear();
        assert!(InteractionPicker::new().pick(&scene, px).is_none());
        scene.attach(&graph(&[BatchStatus::Transferred]));
        let hit = InteractionPicker::new().pick(&scene, px).unwrap();
        assert_eq!(hit.node_id, "transfer-b1");
    }
}
