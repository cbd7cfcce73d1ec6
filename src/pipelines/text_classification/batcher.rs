use std::sync::Arc;

use burn::{
    data::dataloader,
    tensor::{backend::Backend, Data, ElementConversion, Int, Shape, Tensor},
};
use derive_new::new;

use crate::{
    data::{
        vocabulary::{LABELS, TOKENS},
        Instance, Vocabulary,
    },
    utils::tensors::{last_position_mask, pad_to},
};

/// One text field of a batch, indexed and padded
#[derive(Clone, Debug, new)]
pub struct TextBatch<B: Backend> {
    /// Token indices as 2D tensor: [batch_size, seq_length]
    pub tokens: Tensor<B, 2, Int>,

    /// The same rows, each reversed within its own length
    pub tokens_reversed: Tensor<B, 2, Int>,

    /// One-hot over positions marking each row's last real token: [batch_size, seq_length]
    pub last_mask: Tensor<B, 2>,
}

/// An inference batch for venue classification
#[derive(Clone, Debug, new)]
pub struct Infer<B: Backend> {
    /// The title field
    pub title: TextBatch<B>,

    /// The abstract field
    pub abstract_text: TextBatch<B>,
}

/// A training batch for venue classification
#[derive(Clone, Debug, new)]
pub struct Train<B: Backend> {
    /// Model input
    pub input: Infer<B>,

    /// Class ids for the batch
    pub targets: Tensor<B, 1, Int>,
}

/// Turns instances into tensors through the vocabulary
#[derive(Clone, new)]
pub struct Batcher<B: Backend> {
    /// Vocabulary for token and label indices
    pub vocab: Arc<Vocabulary>,

    /// Truncate each text field to this many tokens
    pub max_seq_len: Option<usize>,

    /// Device on which to perform computation (e.g., CPU or CUDA device)
    pub device: B::Device,
}

impl<B: Backend> Batcher<B> {
    fn index_tokens(&self, tokens: &[String]) -> Vec<usize> {
        let limit = self.max_seq_len.unwrap_or(usize::MAX);

        tokens
            .iter()
            .take(limit)
            .map(|token| {
                self.vocab
                    .get_token_index(token, TOKENS)
                    .unwrap_or(self.vocab.oov_index())
            })
            .collect()
    }

    /// Index and pad one field across the batch; an empty field becomes a single padding token
    pub fn text_batch(&self, fields: &[&[String]]) -> TextBatch<B> {
        let token_ids: Vec<Vec<usize>> = fields.iter().map(|f| self.index_tokens(f)).collect();
        let reversed: Vec<Vec<usize>> = token_ids
            .iter()
            .map(|ids| ids.iter().rev().copied().collect())
            .collect();

        let lengths: Vec<usize> = token_ids.iter().map(Vec::len).collect();
        let seq_length = lengths.iter().copied().max().unwrap_or(0).max(1);
        let pad = self.vocab.padding_index();

        TextBatch {
            tokens: pad_to(pad, &token_ids, seq_length, &self.device),
            tokens_reversed: pad_to(pad, &reversed, seq_length, &self.device),
            last_mask: last_position_mask(&lengths, seq_length, &self.device),
        }
    }

    /// Collects instances into an inference batch, ignoring their labels
    pub fn infer_batch(&self, items: Vec<Instance>) -> Infer<B> {
        let titles: Vec<&[String]> = items.iter().map(|i| i.title.as_slice()).collect();
        let abstracts: Vec<&[String]> = items.iter().map(|i| i.abstract_tokens.as_slice()).collect();

        Infer {
            title: self.text_batch(&titles),
            abstract_text: self.text_batch(&abstracts),
        }
    }
}

/// Implement Batcher trait for Batcher struct for training
impl<B: Backend> dataloader::batcher::Batcher<Instance, Train<B>> for Batcher<B> {
    /// Collects labelled instances into a training batch
    fn batch(&self, items: Vec<Instance>) -> Train<B> {
        let batch_size = items.len();

        // Labels are validated against the vocabulary before any loader is built
        let class_ids: Vec<B::IntElem> = items
            .iter()
            .map(|item| {
                let label = item.label.as_deref().expect("training instance without a label");

                let class_id = self
                    .vocab
                    .get_token_index(label, LABELS)
                    .expect("label missing from the vocabulary");

                (class_id as i64).elem()
            })
            .collect();

        let targets = Tensor::from_data(Data::new(class_ids, Shape::new([batch_size])), &self.device);

        Train {
            input: self.infer_batch(items),
            targets,
        }
    }
}
