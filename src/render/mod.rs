pub mod animator;
pub mod backend;
pub mod background;
pub mod camera;
pub mod events;
pub mod flow_graph;
pub mod mesh;
pub mod picker;
pub mod scene;
pub mod view;

#[cfg(feature = "gpu")]
pub mod gpu_renderer;

/// Pixel size of the host surface region the scene renders into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
}

impl SurfaceSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Zero-area sizes are never applied to the camera or viewport.
    pub fn is_degenerate(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn aspect(&self) -> f32 {
        if self.height == 0 {
            return 1.0;
        }
        self.width as f32 / self.height as f32
    }
}

/// Playback state of the animation loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Playing,
    Paused,
}

/// `0xRRGGBB` + opacity → normalized RGBA.
pub fn rgba(hex: u32, alpha: f32) -> [f32; 4] {
    [
        ((hex >> 16) & 0xFF) as f32 / 255.0,
        ((hex >> 8) & 0xFF) as f32 / 255.0,
        (hex & 0xFF) as f32 / 255.0,
        alpha,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degenerate_surfaces() {
        assert!(SurfaceSize::new(0, 10).is_degenerate());
        assert!(SurfaceSize::new(10, 0).is_degenerate());
        assert!(!SurfaceSize::new(1, 1).is_degenerate());
        assert_eq!(SurfaceSize::new(0, 0).aspect(), 1.0);
    }

    #[test]
    fn hex_colors() {
        let c = rgba(0xef4444, 0.8);
        assert!((c[0] - 239.0 / 255.0).abs() < 1e-6);
        assert!((c[2] - 68.0 / 255.0).abs() < 1e-6);
        assert_eq!(c[3], 0.8);
    }
}
