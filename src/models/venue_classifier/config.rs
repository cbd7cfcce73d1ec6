//! Hyperparameters and the full configuration of the venue classifier

use burn::{nn::EmbeddingConfig, tensor::backend::Backend};

use crate::models::layers::{BiLstmEncoderConfig, FeedForwardConfig};

use super::Model;

/// Architecture choices that do not depend on the data
#[derive(burn::config::Config, Debug)]
pub struct ModelOptions {
    /// Size of each token embedding (must match the pretrained file, if any)
    #[config(default = 100)]
    pub embedding_dim: usize,

    /// Hidden size of each LSTM direction
    #[config(default = 100)]
    pub encoder_hidden_size: usize,

    /// Hidden layer sizes of the classifier head, before the output layer
    #[config(default = "vec![200]")]
    pub feedforward_hidden_dims: Vec<usize>,

    /// Dropout rate in the classifier head
    #[config(default = 0.2)]
    pub dropout: f64,
}

/// The Model Configuration
#[derive(burn::config::Config, Debug)]
pub struct Config {
    /// Size of the token vocabulary, including padding and OOV
    pub vocab_size: usize,

    /// Number of venue labels
    pub n_classes: usize,

    /// Size of each token embedding
    #[config(default = 100)]
    pub embedding_dim: usize,

    /// Hidden size of each LSTM direction
    #[config(default = 100)]
    pub encoder_hidden_size: usize,

    /// Hidden layer sizes of the classifier head, before the output layer
    #[config(default = "vec![200]")]
    pub feedforward_hidden_dims: Vec<usize>,

    /// Dropout rate in the classifier head
    #[config(default = 0.2)]
    pub dropout: f64,
}

impl Config {
    /// Combine architecture options with the sizes learned from the vocabulary
    pub fn from_options(options: &ModelOptions, vocab_size: usize, n_classes: usize) -> Self {
        Self::new(vocab_size, n_classes)
            .with_embedding_dim(options.embedding_dim)
            .with_encoder_hidden_size(options.encoder_hidden_size)
            .with_feedforward_hidden_dims(options.feedforward_hidden_dims.clone())
            .with_dropout(options.dropout)
    }

    fn encoder(&self) -> BiLstmEncoderConfig {
        BiLstmEncoderConfig::new(self.embedding_dim, self.encoder_hidden_size)
    }

    /// The classifier head: title and abstract encodings in, one logit per class out
    pub fn feedforward(&self) -> FeedForwardConfig {
        let mut dims = self.feedforward_hidden_dims.clone();
        dims.push(self.n_classes);

        FeedForwardConfig::new(self.encoder().output_dim() * 2, dims).with_dropout(self.dropout)
    }

    /// Initializes a venue classifier with random weights
    pub fn init<B: Backend>(&self, device: &B::Device) -> Model<B> {
        Model {
            embedding: EmbeddingConfig::new(self.vocab_size, self.embedding_dim).init(device),
            title_encoder: self.encoder().init(device),
            abstract_encoder: self.encoder().init(device),
            classifier: self.feedforward().init(device),
            n_classes: self.n_classes,
        }
    }
}
