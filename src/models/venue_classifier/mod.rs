/// Venue classifier configuration
pub mod config;

/// Venue classifier model
pub mod model;

/// Training and validation steps
pub mod train;

pub use config::{Config, ModelOptions};
pub use model::{Model, ModelRecord};
