//! Error type shared by the visualizer library.

use thiserror::Error;

/// Errors surfaced by the flow visualizer.
///
/// Empty batch lists, pick misses and ticks after disposal are not errors
/// and never produce one of these.
#[derive(Debug, Error)]
pub enum VizError {
    /// The graphics context could not be created. The host should show a
    /// static fallback instead of the canvas.
    #[error("rendering context unavailable: {0}")]
    ContextUnavailable(String),

    #[error("invalid surface size {width}x{height}")]
    InvalidSurface { width: u32, height: u32 },

    /// A mutating operation was requested on a disposed scene.
    #[error("scene already disposed")]
    Disposed,

    #[error("batch feed error: {0}")]
    Feed(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("snapshot error: {0}")]
    Snapshot(String),
}

pub type Result<T> = std::result::Result<T, VizError>;
