//! Scene geometry and the handle-addressed mesh arena.
//!
//! Meshes live in a [`MeshStore`] owned by the scene controller. Everything
//! else refers to them through copyable [`MeshHandle`]s; a handle whose slot
//! was freed simply stops resolving.

use glam::{EulerRot, Mat4, Quat, Vec3};

/// Shape of a mesh, in its local frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Sphere { radius: f32 },
    /// Apex along local +Y.
    Cone { radius: f32, height: f32 },
    Octahedron { radius: f32 },
    /// World-space segment; the transform is ignored.
    Line { start: Vec3, end: Vec3, width_px: f32 },
    /// Two atoms joined by a bond, atoms on local ±X.
    Molecule {
        atom_radius: f32,
        separation: f32,
        bond_radius: f32,
        bond_color: [f32; 4],
    },
    /// Point cloud with per-point colour.
    Points {
        positions: Vec<Vec3>,
        colors: Vec<[f32; 3]>,
        size_px: f32,
    },
}

impl Geometry {
    /// Radius of a sphere around the local origin that encloses the shape.
    pub fn bounding_radius(&self) -> f32 {
        match self {
            Geometry::Sphere { radius } | Geometry::Octahedron { radius } => *radius,
            Geometry::Cone { radius, height } => (radius * radius + height * height * 0.25).sqrt(),
            Geometry::Line { start, end, .. } => (*end - *start).length() * 0.5,
            Geometry::Molecule {
                atom_radius,
                separation,
                ..
            } => separation * 0.5 + atom_radius,
            Geometry::Points { positions, .. } => positions
                .iter()
                .map(|p| p.length())
                .fold(0.0, f32::max),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    /// Euler angles (XYZ order), radians.
    pub rotation: Vec3,
    pub scale: f32,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: 1.0,
        }
    }
}

impl Transform {
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    pub fn quat(&self) -> Quat {
        Quat::from_euler(EulerRot::XYZ, self.rotation.x, self.rotation.y, self.rotation.z)
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(Vec3::splat(self.scale), self.quat(), self.position)
    }

    /// Local point → world point.
    pub fn apply(&self, local: Vec3) -> Vec3 {
        self.position + self.quat() * (local * self.scale)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    pub geometry: Geometry,
    pub color: [f32; 4],
    pub transform: Transform,
}

impl Mesh {
    pub fn new(geometry: Geometry, color: [f32; 4], transform: Transform) -> Self {
        Self {
            geometry,
            color,
            transform,
        }
    }

    /// World-space bounding sphere (center, radius).
    pub fn bounds(&self) -> (Vec3, f32) {
        match &self.geometry {
            Geometry::Line { start, end, .. } => {
                ((*start + *end) * 0.5, self.geometry.bounding_radius())
            }
            g => (
                self.transform.position,
                g.bounding_radius() * self.transform.scale,
            ),
        }
    }
}

/// Generational index into a [`MeshStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshHandle {
    index: u32,
    generation: u32,
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    mesh: Option<Mesh>,
}

/// Arena of meshes. Freed slots are reused with a bumped generation so
/// stale handles never alias a new mesh.
#[derive(Debug, Default)]
pub struct MeshStore {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
}

impl MeshStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, mesh: Mesh) -> MeshHandle {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.mesh = Some(mesh);
            return MeshHandle {
                index,
                generation: slot.generation,
            };
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            mesh: Some(mesh),
        });
        MeshHandle {
            index,
            generation: 0,
        }
    }

    pub fn get(&self, handle: MeshHandle) -> Option<&Mesh> {
        self.slots
            .get(handle.index as usize)
            .filter(|s| s.generation == handle.generation)
            .and_then(|s| s.mesh.as_ref())
    }

    pub fn get_mut(&mut self, handle: MeshHandle) -> Option<&mut Mesh> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|s| s.generation == handle.generation)
            .and_then(|s| s.mesh.as_mut())
    }

    pub fn remove(&mut self, handle: MeshHandle) -> Option<Mesh> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        let mesh = slot.mesh.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        self.live -= 1;
        Some(mesh)
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (MeshHandle, &Mesh)> {
        self.slots.iter().enumerate().filter_map(|(i, s)| {
            s.mesh.as_ref().map(|m| {
                (
                    MeshHandle {
                        index: i as u32,
                        generation: s.generation,
                    },
                    m,
                )
            })
        })
    }

    /// Drop every mesh and invalidate all outstanding handles.
    /// Returns the number of meshes released.
    pub fn clear(&mut self) -> usize {
        let released = self.live;
        for (i, slot) in self.slots.iter_mut().enumerate() {
            if slot.mesh.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(i as u32);
            }
        }
        self.live = 0;
        released
    }
}
