//! Visualizer configuration.
//!
//! Every group has a `Default` matching the dashboard's stock look, so a
//! TOML file only needs the keys it wants to change:
//!
//! ```toml
//! [layout]
//! columns_per_row = 8
//!
//! [renderer]
//! backend = "software"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, VizError};

/// Grid layout of the flow graph.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutParams {
    pub columns_per_row: usize,
    pub spacing_x: f32,
    pub spacing_y: f32,
    pub offset_x: f32,
    pub offset_y: f32,
}

impl Default for LayoutParams {
    fn default() -> Self {
        Self {
            columns_per_row: 5,
            spacing_x: 4.0,
            spacing_y: 2.0,
            offset_x: 8.0,
            offset_y: 2.0,
        }
    }
}

/// Idle motion applied to flow nodes while playing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationParams {
    /// Rotation increment in radians per second (applied to X and Y).
    pub rotation_speed: f32,
    /// Vertical bob amplitude in world units.
    pub bob_amplitude: f32,
    /// Upper bound on a single tick's time step, in seconds.
    pub max_frame_dt: f32,
}

impl Default for AnimationParams {
    fn default() -> Self {
        Self {
            rotation_speed: 0.6,
            bob_amplitude: 0.15,
            max_frame_dt: 0.1,
        }
    }
}

/// Perspective camera and its default orbit pose.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub fov_deg: f32,
    pub near: f32,
    pub far: f32,
    pub azimuth: f32,
    pub elevation: f32,
    pub distance: f32,
    pub target: [f32; 3],
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_deg: 75.0,
            near: 0.1,
            far: 1000.0,
            azimuth: 0.0,
            elevation: 0.0,
            distance: 12.0,
            target: [0.0, 0.0, 0.0],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackgroundParams {
    pub enabled: bool,
    pub molecule_count: usize,
    pub particle_count: usize,
    /// Edge length of the cube molecules are scattered in.
    pub molecule_extent: f32,
    /// Edge length of the cube particles are scattered in.
    pub particle_extent: f32,
    pub seed: u64,
}

impl Default for BackgroundParams {
    fn default() -> Self {
        Self {
            enabled: true,
            molecule_count: 40,
            particle_count: 200,
            molecule_extent: 25.0,
            particle_extent: 30.0,
            seed: 0x4832,
        }
    }
}

/// Which render backend `SceneController::initialize` should create.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// GPU when an adapter exists, CPU otherwise.
    #[default]
    Auto,
    Gpu,
    Software,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    pub backend: BackendKind,
    pub clear_color: [f32; 4],
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Auto,
            clear_color: [0.02, 0.03, 0.06, 1.0],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// HTTP(S) URL or local JSON file path.
    pub source: String,
    pub timeout_secs: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            source: "http://127.0.0.1:5000/api/v1/batches".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Top-level configuration for one mounted visualizer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualizerConfig {
    pub layout: LayoutParams,
    pub animation: AnimationParams,
    pub camera: CameraConfig,
    pub background: BackgroundParams,
    pub renderer: RendererConfig,
    pub feed: FeedConfig,
}

impl VisualizerConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s).map_err(|e| VizError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| VizError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }

    pub fn with_backend(mut self, backend: BackendKind) -> Self {
        self.renderer.backend = backend;
        self
    }

    pub fn with_layout(mut self, layout: LayoutParams) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_animation(mut self, animation: AnimationParams) -> Self {
        self.animation = animation;
        self
    }

    /// Enable/disable the decorative background
    pub fn with_background(mut self, enabled: bool) -> Self {
        self.background.enabled = enabled;
        self
    }

    pub fn with_feed_source(mut self, source: impl Into<String>) -> Self {
        self.feed.source = source.into();
        self
    }

    fn validate(&self) -> Result<()> {
        let l = &self.layout;
        if l.columns_per_row == 0 {
            return Err(VizError::Config("layout.columns_per_row must be > 0".into()));
        }
        require_finite("layout.spacing_x", l.spacing_x)?;
        require_finite("layout.spacing_y", l.spacing_y)?;
        require_finite("layout.offset_x", l.offset_x)?;
        require_finite("layout.offset_y", l.offset_y)?;

        let a = &self.animation;
        require_finite("animation.rotation_speed", a.rotation_speed)?;
        require_finite("animation.bob_amplitude", a.bob_amplitude)?;
        if !(a.max_frame_dt.is_finite() && a.max_frame_dt > 0.0) {
            return Err(VizError::Config(format!(
                "animation.max_frame_dt must be a positive number: {}",
                a.max_frame_dt
            )));
        }

        if !(1.0..179.0).contains(&self.camera.fov_deg) {
            return Err(VizError::Config(format!(
                "camera.fov_deg out of range: {}",
                self.camera.fov_deg
            )));
        }
        if self.camera.near <= 0.0 || self.camera.far <= self.camera.near {
            return Err(VizError::Config("camera near/far planes are inverted".into()));
        }
        Ok(())
    }
}

fn require_finite(key: &str, value: f32) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(VizError::Config(format!("{} must be finite: {}", key, value)))
    }
}
