/// Batcher
pub mod batcher;

/// Training
pub mod training;

/// Model archives
pub mod archive;

/// Predictor
pub mod predictor;

pub use batcher::Batcher;
pub use predictor::{Prediction, Predictor, PredictorError};
pub use training::{train, Experiment, Training};
