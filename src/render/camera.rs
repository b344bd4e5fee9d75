//! Orbit camera: perspective projection, screen projection and picking rays.

use std::f32::consts::FRAC_PI_2;

use glam::{Mat4, Vec2, Vec3};

use crate::config::CameraConfig;
use crate::render::SurfaceSize;

/// Orbit pose around a target point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraParams {
    /// Horizontal orbit angle in radians (0 = front)
    pub azimuth: f32,
    /// Vertical orbit angle in radians (0 = level, positive = looking down)
    pub elevation: f32,
    /// Distance from the camera to the target point
    pub distance: f32,
    /// Target point the camera looks at [x, y, z]
    pub target: [f32; 3],
}

impl Default for CameraParams {
    fn default() -> Self {
        Self::from(&CameraConfig::default())
    }
}

impl From<&CameraConfig> for CameraParams {
    fn from(c: &CameraConfig) -> Self {
        Self {
            azimuth: c.azimuth,
            elevation: c.elevation,
            distance: c.distance,
            target: c.target,
        }
    }
}

impl CameraParams {
    pub fn eye(&self) -> Vec3 {
        let target = Vec3::from(self.target);
        target
            + Vec3::new(
                self.distance * self.azimuth.sin() * self.elevation.cos(),
                self.distance * self.elevation.sin(),
                self.distance * self.azimuth.cos() * self.elevation.cos(),
            )
    }
}

/// A half-line in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    /// Unit length.
    pub dir: Vec3,
}

impl Ray {
    /// Distance along the ray to the first hit on a sphere, if any.
    pub fn intersect_sphere(&self, center: Vec3, radius: f32) -> Option<f32> {
        let oc = self.origin - center;
        let b = oc.dot(self.dir);
        let c = oc.length_squared() - radius * radius;
        let disc = b * b - c;
        if disc < 0.0 {
            return None;
        }
        let sq = disc.sqrt();
        let near = -b - sq;
        if near >= 0.0 {
            return Some(near);
        }
        // Origin inside the sphere
        let far = -b + sq;
        (far >= 0.0).then_some(far)
    }

    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.dir * t
    }
}

const MIN_ELEVATION: f32 = -FRAC_PI_2 + 0.05;
const MAX_ELEVATION: f32 = FRAC_PI_2 - 0.05;

/// Perspective camera bound to one surface.
#[derive(Debug, Clone)]
pub struct Camera {
    pub params: CameraParams,
    home: CameraParams,
    fov_y: f32,
    near: f32,
    far: f32,
    aspect: f32,
}

impl Camera {
    pub fn new(config: &CameraConfig, size: SurfaceSize) -> Self {
        let home = CameraParams::from(config);
        Self {
            params: home,
            home,
            fov_y: config.fov_deg.to_radians(),
            near: config.near,
            far: config.far,
            aspect: size.aspect(),
        }
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn set_aspect(&mut self, size: SurfaceSize) {
        if !size.is_degenerate() {
            self.aspect = size.aspect();
        }
    }

    /// Restore the default pose.
    pub fn reset(&mut self) {
        self.params = self.home;
    }

    pub fn eye(&self) -> Vec3 {
        self.params.eye()
    }

    pub fn forward(&self) -> Vec3 {
        (Vec3::from(self.params.target) - self.eye()).normalize()
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye(), Vec3::from(self.params.target), Vec3::Y)
    }

    pub fn projection(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, self.aspect, self.near, self.far)
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection() * self.view()
    }

    /// Rotate around the target; elevation is clamped short of the poles.
    pub fn orbit(&mut self, d_azimuth: f32, d_elevation: f32) {
        self.params.azimuth += d_azimuth;
        self.params.elevation =
            (self.params.elevation + d_elevation).clamp(MIN_ELEVATION, MAX_ELEVATION);
    }

    /// Scroll to dolly in/out (zoom).
    pub fn dolly(&mut self, scroll: f32) {
        self.params.distance *= 1.0 - scroll * 0.003;
        self.params.distance = self.params.distance.clamp(0.5, 200.0);
    }

    /// Depth of a world point along the view direction.
    pub fn view_depth(&self, world: Vec3) -> f32 {
        (world - self.eye()).dot(self.forward())
    }

    /// Screen pixels covered by one world unit at `depth`.
    pub fn pixels_per_unit(&self, depth: f32, size: SurfaceSize) -> f32 {
        if depth <= 0.0 {
            return 0.0;
        }
        size.height as f32 * 0.5 / (depth * (self.fov_y * 0.5).tan())
    }

    /// Project a world point to surface pixels (origin top-left).
    /// `None` when the point is behind the near plane.
    pub fn project(&self, world: Vec3, size: SurfaceSize) -> Option<Vec2> {
        let clip = self.view_projection() * world.extend(1.0);
        if clip.w <= self.near {
            return None;
        }
        let ndc = Vec2::new(clip.x, clip.y) / clip.w;
        Some(ndc_to_pixel(ndc, size))
    }

    /// Ray from the eye through a point in normalized device coordinates.
    pub fn ray_from_ndc(&self, ndc: Vec2) -> Ray {
        let inv = self.view_projection().inverse();
        let near = inv.project_point3(ndc.extend(0.0));
        let far = inv.project_point3(ndc.extend(1.0));
        Ray {
            origin: near,
            dir: (far - near).normalize(),
        }
    }
}

/// Surface pixel → NDC in [-1, 1], +Y up.
pub fn pixel_to_ndc(px: Vec2, size: SurfaceSize) -> Vec2 {
    Vec2::new(
        px.x / size.width as f32 * 2.0 - 1.0,
        -(px.y / size.height as f32 * 2.0 - 1.0),
    )
}

/// NDC → surface pixel, inverse of [`pixel_to_ndc`].
pub fn ndc_to_pixel(ndc: Vec2, size: SurfaceSize) -> Vec2 {
    Vec2::new(
        (ndc.x + 1.0) * 0.5 * size.width as f32,
        (1.0 - ndc.y) * 0.5 * size.height as f32,
    )
}
