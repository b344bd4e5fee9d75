pub mod config;
pub mod error;
pub mod ledger;
pub mod render;

pub use config::VisualizerConfig;
pub use error::{Result, VizError};
