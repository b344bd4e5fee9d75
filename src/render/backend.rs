//! Render backends and the screen-space draw list they consume.
//!
//! The scene controller flattens its meshes into a [`DrawList`] of
//! depth-sorted 2D primitives (discs, capsules, convex polygons). Backends
//! only rasterize that list, so the CPU and GPU paths produce the same image
//! from the same input.
//!
//! - [`SoftwareRenderer`]: rayon, one task per pixel row
//! - `GpuRenderer` (feature `gpu`): wgpu compute pass, one thread per pixel

use std::path::Path;

use glam::{Vec2, Vec3};
use rayon::prelude::*;

use crate::config::BackendKind;
use crate::error::{Result, VizError};
use crate::render::camera::Camera;
use crate::render::mesh::{Geometry, Mesh};
use crate::render::SurfaceSize;

/// Largest surface edge any backend will allocate for.
pub const MAX_SURFACE_EDGE: u32 = 8192;

/// Cone base ring resolution.
const CONE_SEGMENTS: usize = 8;

// ── Draw list ──

#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Disc { center: Vec2, radius: f32 },
    /// Segment with round caps.
    Capsule { a: Vec2, b: Vec2, radius: f32 },
    /// Convex, either winding.
    Polygon { points: Vec<Vec2> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct DrawPrim {
    pub shape: Shape,
    pub color: [f32; 4],
    /// View depth, used only for ordering.
    pub depth: f32,
    /// Radial darkening toward the rim (spheres and atoms).
    pub shaded: bool,
}

impl DrawPrim {
    /// Screen-space bounding box (min, max).
    pub fn bbox(&self) -> (Vec2, Vec2) {
        match &self.shape {
            Shape::Disc { center, radius } => (*center - *radius, *center + *radius),
            Shape::Capsule { a, b, radius } => (a.min(*b) - *radius, a.max(*b) + *radius),
            Shape::Polygon { points } => points.iter().fold(
                (Vec2::splat(f32::MAX), Vec2::splat(f32::MIN)),
                |(mn, mx), p| (mn.min(*p), mx.max(*p)),
            ),
        }
    }

    /// Brightness factor if `p` is covered, `None` otherwise.
    pub fn coverage(&self, p: Vec2) -> Option<f32> {
        match &self.shape {
            Shape::Disc { center, radius } => {
                let d2 = p.distance_squared(*center);
                let r2 = radius * radius;
                if d2 > r2 {
                    return None;
                }
                Some(if self.shaded { 1.0 - 0.45 * d2 / r2 } else { 1.0 })
            }
            Shape::Capsule { a, b, radius } => {
                let ab = *b - *a;
                let len2 = ab.length_squared();
                let h = if len2 > 0.0 {
                    ((p - *a).dot(ab) / len2).clamp(0.0, 1.0)
                } else {
                    0.0
                };
                (p.distance_squared(*a + ab * h) <= radius * radius).then_some(1.0)
            }
            Shape::Polygon { points } => point_in_convex(points, p).then_some(1.0),
        }
    }
}

/// Depth-sorted primitives for one frame, back to front.
#[derive(Debug, Clone, Default)]
pub struct DrawList {
    pub size: SurfaceSize,
    pub clear_color: [f32; 4],
    pub prims: Vec<DrawPrim>,
}

impl DrawList {
    /// Project meshes through `camera` onto a surface of `size`.
    pub fn build<'a>(
        meshes: impl IntoIterator<Item = &'a Mesh>,
        camera: &Camera,
        size: SurfaceSize,
        clear_color: [f32; 4],
    ) -> Self {
        let mut prims = Vec::new();
        for mesh in meshes {
            emit_mesh(mesh, camera, size, &mut prims);
        }
        prims.sort_by(|a, b| b.depth.total_cmp(&a.depth));
        Self {
            size,
            clear_color,
            prims,
        }
    }
}

fn emit_mesh(mesh: &Mesh, camera: &Camera, size: SurfaceSize, out: &mut Vec<DrawPrim>) {
    let t = &mesh.transform;
    let disc = |world: Vec3, radius: f32, color: [f32; 4], shaded: bool| {
        let depth = camera.view_depth(world);
        let center = camera.project(world, size)?;
        Some(DrawPrim {
            shape: Shape::Disc {
                center,
                radius: radius * camera.pixels_per_unit(depth, size),
            },
            color,
            depth,
            shaded,
        })
    };

    match &mesh.geometry {
        Geometry::Sphere { radius } => {
            out.extend(disc(t.position, radius * t.scale, mesh.color, true));
        }
        Geometry::Cone { radius, height } => {
            let apex = Vec3::new(0.0, height * 0.5, 0.0);
            let ring = (0..CONE_SEGMENTS).map(|k| {
                let a = k as f32 / CONE_SEGMENTS as f32 * std::f32::consts::TAU;
                Vec3::new(radius * a.cos(), -height * 0.5, radius * a.sin())
            });
            let local: Vec<Vec3> = std::iter::once(apex).chain(ring).collect();
            out.extend(hull_prim(&local, mesh, camera, size));
        }
        Geometry::Octahedron { radius } => {
            let r = *radius;
            let local = [
                Vec3::X * r,
                Vec3::NEG_X * r,
                Vec3::Y * r,
                Vec3::NEG_Y * r,
                Vec3::Z * r,
                Vec3::NEG_Z * r,
            ];
            out.extend(hull_prim(&local, mesh, camera, size));
        }
        Geometry::Line {
            start,
            end,
            width_px,
        } => {
            if let (Some(a), Some(b)) = (camera.project(*start, size), camera.project(*end, size)) {
                out.push(DrawPrim {
                    shape: Shape::Capsule {
                        a,
                        b,
                        radius: width_px * 0.5,
                    },
                    color: mesh.color,
                    depth: camera.view_depth((*start + *end) * 0.5),
                    shaded: false,
                });
            }
        }
        Geometry::Molecule {
            atom_radius,
            separation,
            bond_radius,
            bond_color,
        } => {
            let left = t.apply(Vec3::NEG_X * (separation * 0.5));
            let right = t.apply(Vec3::X * (separation * 0.5));
            if let (Some(a), Some(b)) = (camera.project(left, size), camera.project(right, size)) {
                let depth = camera.view_depth(t.position);
                out.push(DrawPrim {
                    shape: Shape::Capsule {
                        a,
                        b,
                        radius: bond_radius * t.scale * camera.pixels_per_unit(depth, size),
                    },
                    color: *bond_color,
                    depth,
                    shaded: false,
                });
            }
            out.extend(disc(left, atom_radius * t.scale, mesh.color, true));
            out.extend(disc(right, atom_radius * t.scale, mesh.color, true));
        }
        Geometry::Points {
            positions,
            colors,
            size_px,
        } => {
            for (p, c) in positions.iter().zip(colors) {
                let world = t.apply(*p);
                let Some(center) = camera.project(world, size) else {
                    continue;
                };
                out.push(DrawPrim {
                    shape: Shape::Disc {
                        center,
                        radius: size_px * 0.5,
                    },
                    color: [c[0], c[1], c[2], mesh.color[3]],
                    depth: camera.view_depth(world),
                    shaded: false,
                });
            }
        }
    }
}

/// Project local vertices and fill their screen-space convex hull.
fn hull_prim(local: &[Vec3], mesh: &Mesh, camera: &Camera, size: SurfaceSize) -> Option<DrawPrim> {
    let projected: Option<Vec<Vec2>> = local
        .iter()
        .map(|v| camera.project(mesh.transform.apply(*v), size))
        .collect();
    let points = convex_hull(projected?);
    (points.len() >= 3).then(|| DrawPrim {
        shape: Shape::Polygon { points },
        color: mesh.color,
        depth: camera.view_depth(mesh.transform.position),
        shaded: false,
    })
}

/// Andrew's monotone chain.
fn convex_hull(mut pts: Vec<Vec2>) -> Vec<Vec2> {
    pts.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
    pts.dedup();
    if pts.len() < 3 {
        return pts;
    }
    let cross = |o: Vec2, a: Vec2, b: Vec2| (a - o).perp_dot(b - o);
    let mut hull: Vec<Vec2> = Vec::with_capacity(pts.len() * 2);
    for pass in 0..2 {
        let start = hull.len();
        let iter: Box<dyn Iterator<Item = &Vec2>> = if pass == 0 {
            Box::new(pts.iter())
        } else {
            Box::new(pts.iter().rev())
        };
        for &p in iter {
            while hull.len() >= start + 2 && cross(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0.0 {
                hull.pop();
            }
            hull.push(p);
        }
        hull.pop();
    }
    hull
}

fn point_in_convex(points: &[Vec2], p: Vec2) -> bool {
    let mut sign = 0.0f32;
    for (i, a) in points.iter().enumerate() {
        let b = points[(i + 1) % points.len()];
        let c = (b - *a).perp_dot(p - *a);
        if c != 0.0 {
            if sign != 0.0 && c.signum() != sign {
                return false;
            }
            sign = c.signum();
        }
    }
    true
}

// ── Frames ──

/// One rendered RGBA8 image.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub size: SurfaceSize,
    pub pixels: Vec<u8>,
}

impl Frame {
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.size.width || y >= self.size.height {
            return None;
        }
        let off = ((y * self.size.width + x) * 4) as usize;
        let px = self.pixels.get(off..off + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }

    pub fn save_png(&self, path: impl AsRef<Path>) -> Result<()> {
        image::save_buffer(
            path.as_ref(),
            &self.pixels,
            self.size.width,
            self.size.height,
            image::ExtendedColorType::Rgba8,
        )
        .map_err(|e| VizError::Snapshot(e.to_string()))
    }
}

// ── Backends ──

/// A rendering context bound to one surface.
pub trait RenderBackend {
    fn name(&self) -> &'static str;

    /// Whether this backend can render a surface of `size`.
    fn accepts(&self, size: SurfaceSize) -> bool {
        check_surface(size).is_ok()
    }

    /// Resize the output surface. Only sizes the backend
    /// [`accepts`](Self::accepts) reach here.
    fn resize(&mut self, size: SurfaceSize);

    fn draw(&mut self, list: &DrawList) -> Result<Frame>;

    /// Free device-side resources. Called exactly once by the owner.
    fn release(&mut self);
}

/// Create the backend `kind` asks for, sized to `size`.
pub fn create_backend(kind: BackendKind, size: SurfaceSize) -> Result<Box<dyn RenderBackend>> {
    check_surface(size)?;
    match kind {
        BackendKind::Software => Ok(Box::new(SoftwareRenderer::new(size))),
        BackendKind::Gpu => create_gpu(size),
        BackendKind::Auto => create_gpu(size).or_else(|e| {
            log::warn!("{}; falling back to software renderer", e);
            let fallback: Box<dyn RenderBackend> = Box::new(SoftwareRenderer::new(size));
            Ok(fallback)
        }),
    }
}

#[cfg(feature = "gpu")]
fn create_gpu(size: SurfaceSize) -> Result<Box<dyn RenderBackend>> {
    Ok(Box::new(crate::render::gpu_renderer::GpuRenderer::new(size)?))
}

#[cfg(not(feature = "gpu"))]
fn create_gpu(_size: SurfaceSize) -> Result<Box<dyn RenderBackend>> {
    Err(VizError::ContextUnavailable(
        "built without the `gpu` feature".into(),
    ))
}

pub(crate) fn check_surface(size: SurfaceSize) -> Result<()> {
    if size.is_degenerate() {
        return Err(VizError::InvalidSurface {
            width: size.width,
            height: size.height,
        });
    }
    if size.width > MAX_SURFACE_EDGE || size.height > MAX_SURFACE_EDGE {
        return Err(VizError::ContextUnavailable(format!(
            "surface {}x{} exceeds {} px",
            size.width, size.height, MAX_SURFACE_EDGE
        )));
    }
    Ok(())
}

/// CPU rasterizer: rayon parallel rows, painter's algorithm.
pub struct SoftwareRenderer {
    size: SurfaceSize,
}

impl SoftwareRenderer {
    pub fn new(size: SurfaceSize) -> Self {
        log::info!("software renderer initialised: {}x{}", size.width, size.height);
        Self { size }
    }
}

impl RenderBackend for SoftwareRenderer {
    fn name(&self) -> &'static str {
        "software"
    }

    fn resize(&mut self, size: SurfaceSize) {
        self.size = size;
    }

    fn draw(&mut self, list: &DrawList) -> Result<Frame> {
        let w = self.size.width as usize;
        let h = self.size.height as usize;
        let clear = [list.clear_color[0], list.clear_color[1], list.clear_color[2]];
        let boxes: Vec<(Vec2, Vec2)> = list.prims.iter().map(DrawPrim::bbox).collect();

        let mut pixels = vec![0u8; w * h * 4];
        pixels.par_chunks_mut(w * 4).enumerate().for_each(|(y, row)| {
            let py = y as f32 + 0.5;
            let mut acc = vec![clear; w];

            for (prim, (mn, mx)) in list.prims.iter().zip(&boxes) {
                if py < mn.y || py > mx.y || mx.x < 0.0 || mn.x >= w as f32 {
                    continue;
                }
                let x0 = mn.x.floor().max(0.0) as usize;
                let x1 = (mx.x.ceil() as usize).min(w - 1);
                let alpha = prim.color[3];
                for (x, dst) in acc.iter_mut().enumerate().take(x1 + 1).skip(x0) {
                    if let Some(shade) = prim.coverage(Vec2::new(x as f32 + 0.5, py)) {
                        for c in 0..3 {
                            dst[c] = prim.color[c] * shade * alpha + dst[c] * (1.0 - alpha);
                        }
                    }
                }
            }

            for (px, rgb) in row.chunks_exact_mut(4).zip(&acc) {
                px[0] = (rgb[0].clamp(0.0, 1.0) * 255.0) as u8;
                px[1] = (rgb[1].clamp(0.0, 1.0) * 255.0) as u8;
                px[2] = (rgb[2].clamp(0.0, 1.0) * 255.0) as u8;
                px[3] = 255;
            }
        });

        Ok(Frame {
            size: self.size,
            pixels,
        })
    }

    fn release(&mut self) {
        log::debug!("software renderer released");
    }
}
