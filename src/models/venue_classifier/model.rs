use burn::{
    module::{Module, Param, ParamId},
    nn::{loss::CrossEntropyLossConfig, Embedding},
    tensor::{activation::softmax, backend::Backend, Tensor},
    train::ClassificationOutput,
};

use crate::{
    models::layers::{BiLstmEncoder, EmbeddingError, FeedForward},
    pipelines::text_classification::batcher::{Infer, TextBatch, Train},
};

/// Venue classifier: a shared token embedding, one BiLSTM encoder per text field, and a
/// feed-forward head over the concatenated encodings
#[derive(Module, Debug)]
pub struct Model<B: Backend> {
    /// Token embeddings shared by the title and abstract
    pub embedding: Embedding<B>,

    /// Encoder for the title
    pub title_encoder: BiLstmEncoder<B>,

    /// Encoder for the abstract
    pub abstract_encoder: BiLstmEncoder<B>,

    /// Classifier head producing one logit per venue
    pub classifier: FeedForward<B>,

    /// Total number of classes
    pub n_classes: usize,
}

/// Define model behavior
impl<B: Backend> Model<B> {
    /// Swap in pretrained embedding weights, frozen unless `trainable`
    pub fn with_pretrained_embedding(
        mut self,
        weights: Tensor<B, 2>,
        trainable: bool,
    ) -> Result<Self, EmbeddingError> {
        let expected = self.embedding.weight.dims();
        let actual = weights.dims();

        if expected != actual {
            return Err(EmbeddingError::ShapeMismatch { expected, actual });
        }

        self.embedding.weight = Param::initialized(ParamId::new(), weights.require_grad());

        if !trainable {
            self.embedding = self.embedding.no_grad();
        }

        Ok(self)
    }

    fn encode(&self, field: TextBatch<B>, encoder: &BiLstmEncoder<B>) -> Tensor<B, 2> {
        let embedded = self.embedding.forward(field.tokens);
        let embedded_reversed = self.embedding.forward(field.tokens_reversed);

        encoder.forward(embedded, embedded_reversed, field.last_mask)
    }

    /// Unnormalized class scores, `[batch_size, n_classes]`
    pub fn logits(&self, input: Infer<B>) -> Tensor<B, 2> {
        let title = self.encode(input.title, &self.title_encoder);
        let abstract_encoding = self.encode(input.abstract_text, &self.abstract_encoder);

        self.classifier
            .forward(Tensor::cat(vec![title, abstract_encoding], 1))
    }

    /// Defines forward pass for training
    pub fn forward(&self, item: Train<B>) -> ClassificationOutput<B> {
        let device = &self.devices()[0];
        let targets = item.targets.to_device(device);

        let output = self.logits(item.input);

        let loss = CrossEntropyLossConfig::new()
            .init(&output.device())
            .forward(output.clone(), targets.clone());

        ClassificationOutput {
            loss,
            output,
            targets,
        }
    }

    /// Defines forward pass for inference, returning class probabilities
    pub fn infer(&self, input: Infer<B>) -> Tensor<B, 2> {
        softmax(self.logits(input), 1)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use burn::{
        backend::{Autodiff, NdArray},
        data::dataloader::batcher::Batcher as _,
        train::TrainStep,
    };
    use pretty_assertions::assert_eq;

    use crate::{
        data::{vocabulary::TOKENS, Instance, Vocabulary, VocabularyConfig},
        models::venue_classifier::Config,
        pipelines::text_classification::Batcher,
    };

    use super::*;

    type TestBackend = NdArray;
    type TestAutodiffBackend = Autodiff<NdArray>;

    fn instance(title: &str, abstract_text: &str, label: &str) -> Instance {
        Instance::new(
            title.split_whitespace().map(String::from).collect(),
            abstract_text.split_whitespace().map(String::from).collect(),
            Some(label.to_string()),
        )
    }

    fn fixtures() -> (Arc<Vocabulary>, Vec<Instance>) {
        let instances = vec![
            instance("neural parsing", "we parse sentences", "ACL"),
            instance("robot planning", "we plan", "AI"),
            instance("kernel methods", "", "ML"),
        ];

        let vocab = Vocabulary::from_instances(&instances, &VocabularyConfig::new(), None);

        (Arc::new(vocab), instances)
    }

    fn config(vocab: &Vocabulary) -> Config {
        Config::new(vocab.get_vocab_size(TOKENS), vocab.labels().len())
            .with_embedding_dim(6)
            .with_encoder_hidden_size(4)
            .with_feedforward_hidden_dims(vec![5])
    }

    #[test]
    fn infers_a_distribution_per_instance() {
        let device = Default::default();
        let (vocab, instances) = fixtures();
        let model = config(&vocab).init::<TestBackend>(&device);
        let batcher = Batcher::<TestBackend>::new(vocab, None, device);

        let probabilities = model.infer(batcher.infer_batch(instances));
        assert_eq!(probabilities.dims(), [3, 3]);

        let sums = probabilities.sum_dim(1).into_data().convert::<f32>().value;
        for sum in sums {
            assert!((sum - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn train_step_reports_loss_for_every_target() {
        let device = Default::default();
        let (vocab, instances) = fixtures();
        let model = config(&vocab).init::<TestAutodiffBackend>(&device);
        let batcher = Batcher::<TestAutodiffBackend>::new(vocab, None, device);

        let output = TrainStep::step(&model, batcher.batch(instances));
        let item = output.item;

        assert_eq!(item.output.dims(), [3, 3]);
        assert_eq!(
            item.targets.into_data().convert::<i64>().value,
            vec![0, 1, 2]
        );
        assert!(item.loss.into_scalar() > 0.0);
    }

    #[test]
    fn rejects_pretrained_weights_of_the_wrong_shape() {
        let device = Default::default();
        let (vocab, _) = fixtures();
        let model = config(&vocab).init::<TestBackend>(&device);

        let weights = Tensor::<TestBackend, 2>::zeros([2, 6], &device);
        let result = model.with_pretrained_embedding(weights, false);

        assert!(matches!(result, Err(EmbeddingError::ShapeMismatch { .. })));
    }

    #[test]
    fn accepts_pretrained_weights() {
        let device = Default::default();
        let (vocab, _) = fixtures();
        let config = config(&vocab);
        let model = config.init::<TestBackend>(&device);

        let weights = Tensor::<TestBackend, 2>::ones([config.vocab_size, 6], &device);
        let model = model.with_pretrained_embedding(weights, true).unwrap();

        let sum = model.embedding.weight.val().sum().into_scalar();
        assert_eq!(sum, (config.vocab_size * 6) as f32);
    }

    #[test]
    fn freezes_pretrained_weights_unless_trainable() {
        let device = Default::default();
        let (vocab, _) = fixtures();
        let config = config(&vocab);
        let weights = || Tensor::<TestAutodiffBackend, 2>::ones([config.vocab_size, 6], &device);

        let frozen = config
            .init::<TestAutodiffBackend>(&device)
            .with_pretrained_embedding(weights(), false)
            .unwrap();
        assert!(!frozen.embedding.weight.val().is_require_grad());

        let trainable = config
            .init::<TestAutodiffBackend>(&device)
            .with_pretrained_embedding(weights(), true)
            .unwrap();
        assert!(trainable.embedding.weight.val().is_require_grad());
    }
}
