use std::path::Path;

use burn::{
    config::Config as _,
    module::Module,
    record::{CompactRecorder, Recorder},
    tensor::backend::Backend,
};

use crate::{data::Vocabulary, models::venue_classifier};

use super::training::Experiment;

/// Name of the archive directory inside the artifact dir
pub static ARCHIVE_DIR: &str = "archive";

/// Model configuration file
pub static CONFIG_FILE: &str = "config.json";

/// Experiment configuration file
pub static EXPERIMENT_FILE: &str = "experiment.json";

/// Vocabulary directory
pub static VOCABULARY_DIR: &str = "vocabulary";

/// Model weights, the recorder adds its own extension
pub static WEIGHTS_FILE: &str = "model";

/// Everything needed to make predictions with a trained model
pub struct Archive<B: Backend> {
    /// The model configuration
    pub config: venue_classifier::Config,

    /// The experiment the model was trained with
    pub experiment: Experiment,

    /// Token and label indices
    pub vocab: Vocabulary,

    /// The trained model
    pub model: venue_classifier::Model<B>,
}

/// Write a model archive into the given directory
pub async fn save<B: Backend>(
    dir: &Path,
    config: &venue_classifier::Config,
    experiment: &Experiment,
    vocab: &Vocabulary,
    model: venue_classifier::Model<B>,
) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(dir).await?;

    config
        .save(dir.join(CONFIG_FILE))
        .map_err(|e| anyhow!("Unable to save model config: {}", e))?;

    experiment
        .save(dir.join(EXPERIMENT_FILE))
        .map_err(|e| anyhow!("Unable to save experiment config: {}", e))?;

    vocab.save_to_files(dir.join(VOCABULARY_DIR)).await?;

    CompactRecorder::new()
        .record(model.into_record(), dir.join(WEIGHTS_FILE))
        .map_err(|e| anyhow!("Unable to save trained model weights: {}", e))?;

    Ok(())
}

/// Read a model archive, with dropout disabled for inference
pub async fn load<B: Backend>(dir: &Path, device: &B::Device) -> anyhow::Result<Archive<B>> {
    let mut config = venue_classifier::Config::load(dir.join(CONFIG_FILE))
        .map_err(|e| anyhow!("Unable to load config file: {}", e))?;

    config.dropout = 0.0;

    let experiment = Experiment::load(dir.join(EXPERIMENT_FILE))
        .map_err(|e| anyhow!("Unable to load experiment file: {}", e))?;

    let vocab = Vocabulary::from_files(dir.join(VOCABULARY_DIR)).await?;

    log::info!("Loading weights from {}", dir.display());

    let record = CompactRecorder::new()
        .load(dir.join(WEIGHTS_FILE), device)
        .map_err(|e| anyhow!("Unable to load trained model weights: {}", e))?;

    let model = config.init::<B>(device).load_record(record);

    Ok(Archive {
        config,
        experiment,
        vocab,
        model,
    })
}
