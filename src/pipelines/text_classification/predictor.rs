use std::{path::Path, sync::Arc};

use burn::tensor::backend::Backend;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    data::{Instance, TokenizerError, Vocabulary},
    datasets::VenueReader,
    models::venue_classifier,
};

use super::{archive, Batcher};

/// A venue prediction for one paper
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// The most probable venue
    pub label: String,

    /// Probability of each venue, aligned with `all_labels`
    pub class_probabilities: Vec<f32>,

    /// Every venue the model knows, ordered by class id
    pub all_labels: Vec<String>,
}

/// Runs a trained venue classifier on raw JSON input
pub struct Predictor<B: Backend> {
    model: venue_classifier::Model<B>,
    reader: VenueReader,
    batcher: Batcher<B>,
    vocab: Arc<Vocabulary>,
}

impl<B: Backend> Predictor<B> {
    /// Wrap a model together with the reader and vocabulary it was trained with
    pub fn new(
        model: venue_classifier::Model<B>,
        reader: VenueReader,
        vocab: Arc<Vocabulary>,
        max_seq_len: Option<usize>,
        device: B::Device,
    ) -> Self {
        let batcher = Batcher::new(vocab.clone(), max_seq_len, device);

        Self {
            model,
            reader,
            batcher,
            vocab,
        }
    }

    /// Load a predictor from a model archive directory
    pub async fn from_archive(dir: impl AsRef<Path>, device: B::Device) -> anyhow::Result<Self> {
        let archive = archive::load::<B>(dir.as_ref(), &device).await?;

        // Prediction instances never carry a cap on how many are read
        let reader = VenueReader::new(archive.experiment.tokenizer.clone(), None);

        Ok(Self::new(
            archive.model,
            reader,
            Arc::new(archive.vocab),
            archive.experiment.training.max_seq_len,
            device,
        ))
    }

    /// Convert `{"title": ..., "paperAbstract": ...}` into an instance
    pub fn json_to_instance(&self, input: &Value) -> Result<Instance, PredictorError> {
        let field = |name: &'static str| {
            input
                .get(name)
                .and_then(Value::as_str)
                .ok_or(PredictorError::MissingField(name))
        };

        let title = field("title")?;
        let paper_abstract = field("paperAbstract")?;

        Ok(self.reader.text_to_instance(title, paper_abstract, None)?)
    }

    /// Predict venues for instances in a single forward pass
    pub fn predict_instances(&self, instances: Vec<Instance>) -> Vec<Prediction> {
        if instances.is_empty() {
            return Vec::new();
        }

        let probabilities = self
            .model
            .infer(self.batcher.infer_batch(instances))
            .into_data()
            .convert::<f32>()
            .value;

        let all_labels = self.vocab.labels().to_vec();
        let n_classes = all_labels.len().max(1);

        probabilities
            .chunks(n_classes)
            .map(|row| {
                let best = row
                    .iter()
                    .enumerate()
                    .max_by(|(_, a), (_, b)| a.total_cmp(b))
                    .map_or(0, |(index, _)| index);

                Prediction {
                    label: all_labels.get(best).cloned().unwrap_or_default(),
                    class_probabilities: row.to_vec(),
                    all_labels: all_labels.clone(),
                }
            })
            .collect()
    }

    /// Predict the venue of one paper given as JSON
    pub fn predict_json(&self, input: &Value) -> Result<Value, PredictorError> {
        let mut outputs = self.predict_batch_json(std::slice::from_ref(input))?;

        Ok(outputs.pop().unwrap_or(Value::Null))
    }

    /// Predict the venues of several papers given as JSON, batched together
    pub fn predict_batch_json(&self, inputs: &[Value]) -> Result<Vec<Value>, PredictorError> {
        let instances = inputs
            .iter()
            .map(|input| self.json_to_instance(input))
            .collect::<Result<Vec<_>, _>>()?;

        self.predict_instances(instances)
            .into_iter()
            .map(|prediction| serde_json::to_value(prediction).map_err(PredictorError::from))
            .collect()
    }
}

/// Predictor Error
#[derive(thiserror::Error, Debug)]
pub enum PredictorError {
    /// A required string field is absent from the input
    #[error("input is missing the string field {0}")]
    MissingField(&'static str),

    /// The input text could not be tokenized
    #[error(transparent)]
    Tokenize(#[from] TokenizerError),

    /// The prediction could not be serialized
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
