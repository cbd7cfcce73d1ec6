use std::{path::PathBuf, sync::Arc};

use serde_json::Value;

use burn::{
    data::{dataloader::DataLoaderBuilder, dataset::Dataset as _},
    optim::AdamWConfig,
    record::CompactRecorder,
    tensor::backend::AutodiffBackend,
    train::{
        metric::{AccuracyMetric, CudaMetric, LearningRateMetric, LossMetric},
        LearnerBuilder,
    },
    LearningRate,
};

use crate::{
    data::{
        vocabulary::{LABELS, TOKENS},
        Vocabulary, VocabularyConfig, WordTokenizer,
    },
    datasets::{Dataset, VenueReader},
    models::{
        layers::{read_embedding_words, read_pretrained},
        venue_classifier::{self, ModelOptions},
    },
    utils::{cached_path::cached_path, renderer::Simple},
};

use super::{archive, Batcher};

/// Optimization settings
#[derive(burn::config::Config, Debug)]
pub struct Training {
    /// Batch size
    #[config(default = 32)]
    pub batch_size: usize,

    /// Number of epochs
    #[config(default = 10)]
    pub num_epochs: usize,

    /// Adam epsilon
    #[config(default = 1e-8)]
    pub adam_epsilon: f32,

    /// AdamW weight decay
    #[config(default = 0.0)]
    pub weight_decay: f32,

    /// Learning rate
    #[config(default = 1e-3)]
    pub learning_rate: LearningRate,

    /// Seed for weight initialization and shuffling
    #[config(default = 42)]
    pub seed: u64,

    /// Data loader worker threads, defaulting to the available parallelism
    pub num_workers: Option<usize>,

    /// Truncate each text field to this many tokens when batching
    pub max_seq_len: Option<usize>,
}

/// Everything needed to reproduce a training run
#[derive(burn::config::Config, Debug)]
pub struct Experiment {
    /// JSON-lines file with the training papers
    pub train_data_path: String,

    /// JSON-lines file with the validation papers
    pub validation_data_path: String,

    /// Where checkpoints and the final model archive are written
    #[config(default = "\"output\".to_string()")]
    pub artifact_dir: String,

    /// GloVe-format embedding file, local or `hf://<owner>/<repo>/<file>`
    pub pretrained_file: Option<String>,

    /// Keep updating the pretrained embeddings during training
    #[config(default = true)]
    pub trainable_embeddings: bool,

    /// Stop reading each data file after this many papers
    pub max_instances: Option<usize>,

    /// Tokenizer for titles and abstracts
    #[config(default = "WordTokenizer::new()")]
    pub tokenizer: WordTokenizer,

    /// Vocabulary construction
    #[config(default = "VocabularyConfig::new()")]
    pub vocabulary: VocabularyConfig,

    /// Model architecture
    #[config(default = "ModelOptions::new()")]
    pub model: ModelOptions,

    /// Optimization
    #[config(default = "Training::new()")]
    pub training: Training,
}

impl Experiment {
    /// Load an experiment from a JSON or YAML file, judged by its extension
    ///
    /// Settings absent from the file keep their defaults. The data paths default to empty, for
    /// the command line to fill in, and are checked by `validate`.
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("Unable to read experiment file {}: {}", path, e))?;

        let overrides: Value = if path.ends_with(".yaml") || path.ends_with(".yml") {
            serde_yaml::from_str(&contents)
                .map_err(|e| anyhow!("Unable to parse experiment file {}: {}", path, e))?
        } else {
            serde_json::from_str(&contents)
                .map_err(|e| anyhow!("Unable to parse experiment file {}: {}", path, e))?
        };

        let mut experiment = serde_json::to_value(Self::new(String::new(), String::new()))?;
        merge(&mut experiment, overrides);

        serde_json::from_value(experiment)
            .map_err(|e| anyhow!("Invalid experiment file {}: {}", path, e))
    }

    /// Reject settings that cannot be honoured together
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.train_data_path.is_empty() || self.validation_data_path.is_empty() {
            return Err(anyhow!("Both train and validation data paths are required"));
        }

        if self.vocabulary.only_include_pretrained_words && self.pretrained_file.is_none() {
            return Err(anyhow!(
                "only_include_pretrained_words is set but no pretrained_file is given"
            ));
        }

        Ok(())
    }

    /// The dataset reader described by this experiment
    pub fn reader(&self) -> VenueReader {
        VenueReader::new(self.tokenizer.clone(), self.max_instances)
    }
}

/// Overlay `overrides` onto `base`, descending into objects present in both
fn merge(base: &mut Value, overrides: Value) {
    match (base, overrides) {
        (Value::Object(base), Value::Object(overrides)) => {
            for (key, value) in overrides {
                match base.get_mut(&key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overrides) => *base = overrides,
    }
}

/// Fail when any instance lacks a label, since targets cannot be built for it
fn ensure_labelled(dataset: &Dataset, path: &str) -> anyhow::Result<()> {
    let unlabelled = dataset.instances().filter(|i| i.label.is_none()).count();

    if unlabelled > 0 {
        return Err(anyhow!(
            "{} of {} papers in {} have no venue",
            unlabelled,
            dataset.len(),
            path
        ));
    }

    Ok(())
}

/// Define train function, returning the directory holding the model archive
pub async fn train<B: AutodiffBackend>(
    devices: Vec<B::Device>, // Devices on which to perform computation (e.g., CPU or CUDA device)
    experiment: Experiment,  // Experiment configuration
    use_tui: bool,           // Render progress with the terminal UI
) -> anyhow::Result<PathBuf> {
    let device = devices
        .first()
        .ok_or_else(|| anyhow!("At least one device is required"))?
        .clone();

    experiment.validate()?;

    B::seed(experiment.training.seed);

    let reader = experiment.reader();
    let dataset_train = Dataset::load(&reader, &experiment.train_data_path).await?;
    let dataset_valid = Dataset::load(&reader, &experiment.validation_data_path).await?;

    ensure_labelled(&dataset_train, &experiment.train_data_path)?;
    ensure_labelled(&dataset_valid, &experiment.validation_data_path)?;

    let pretrained_file = match &experiment.pretrained_file {
        Some(path) => Some(cached_path(path).await?),
        None => None,
    };

    let pretrained_words = match &pretrained_file {
        Some(path) if experiment.vocabulary.only_include_pretrained_words => {
            Some(read_embedding_words(path).await?)
        }
        _ => None,
    };

    // The vocabulary covers both corpora so validation labels always have an index
    let instances: Vec<_> = dataset_train
        .instances()
        .chain(dataset_valid.instances())
        .collect();
    let vocab = Vocabulary::from_instances(
        &instances,
        &experiment.vocabulary,
        pretrained_words.as_ref(),
    );
    drop(instances);

    let n_classes = vocab.get_vocab_size(LABELS);
    if n_classes == 0 {
        return Err(anyhow!("No venues found in the training data"));
    }

    let model_config = venue_classifier::Config::from_options(
        &experiment.model,
        vocab.get_vocab_size(TOKENS),
        n_classes,
    );

    let mut model = model_config.init::<B>(&device);

    if let Some(path) = &pretrained_file {
        let weights =
            read_pretrained::<B>(path, &vocab, TOKENS, model_config.embedding_dim, &device).await?;

        model = model.with_pretrained_embedding(weights, experiment.trainable_embeddings)?;
    }

    let vocab = Arc::new(vocab);

    // Initialize batchers for training and validation data
    let max_seq_len = experiment.training.max_seq_len;
    let batcher_train = Batcher::<B>::new(vocab.clone(), max_seq_len, device.clone());
    let batcher_valid = Batcher::<B::InnerBackend>::new(vocab.clone(), max_seq_len, device.clone());

    let workers = match experiment.training.num_workers {
        Some(workers) => workers,
        None => std::thread::available_parallelism()?.into(),
    };

    // Initialize data loaders for training and validation data
    let dataloader_train = DataLoaderBuilder::new(batcher_train)
        .batch_size(experiment.training.batch_size)
        .shuffle(experiment.training.seed)
        .num_workers(workers)
        .build(dataset_train);

    let dataloader_valid = DataLoaderBuilder::new(batcher_valid)
        .batch_size(experiment.training.batch_size * 2)
        .num_workers(workers)
        .build(dataset_valid);

    // Initialize optimizer
    let optimizer = AdamWConfig::new()
        .with_epsilon(experiment.training.adam_epsilon)
        .with_weight_decay(experiment.training.weight_decay)
        .init();

    let artifact_dir = experiment.artifact_dir.clone();

    // Initialize learner
    let mut builder = LearnerBuilder::new(&artifact_dir)
        .metric_train(CudaMetric::new())
        .metric_valid(CudaMetric::new())
        .metric_train_numeric(AccuracyMetric::new())
        .metric_valid_numeric(AccuracyMetric::new())
        .metric_train_numeric(LossMetric::new())
        .metric_valid_numeric(LossMetric::new())
        .metric_train_numeric(LearningRateMetric::new())
        .with_file_checkpointer(CompactRecorder::new())
        .devices(devices)
        .num_epochs(experiment.training.num_epochs)
        .summary();

    if !use_tui {
        builder = builder.renderer(Simple::new());
    }

    let learner = builder.build(model, optimizer, experiment.training.learning_rate);

    log::info!(
        "Training for {} epochs, writing to {}",
        experiment.training.num_epochs,
        artifact_dir
    );

    // Train the model
    let model_trained = learner.fit(dataloader_train, dataloader_valid);

    // Save the configuration, vocabulary and trained model
    let archive_dir = PathBuf::from(&artifact_dir).join(archive::ARCHIVE_DIR);
    archive::save(&archive_dir, &model_config, &experiment, &vocab, model_trained).await?;

    log::info!("Model archive written to {}", archive_dir.display());

    Ok(archive_dir)
}

#[cfg(test)]
mod tests {
    use burn::{
        backend::{Autodiff, NdArray},
        config::Config as _,
    };
    use pretty_assertions::assert_eq;

    use crate::pipelines::text_classification::Predictor;

    use super::*;

    #[test]
    fn fills_defaults_for_a_partial_yaml_experiment() {
        let path = std::env::temp_dir().join(format!("experiment-{}.yaml", std::process::id()));
        std::fs::write(
            &path,
            "train_data_path: train.jsonl\n\
             validation_data_path: dev.jsonl\n\
             pretrained_file: glove.6B.100d.txt\n\
             training:\n  batch_size: 8\n",
        )
        .unwrap();

        let experiment = Experiment::from_file(&path.to_string_lossy()).unwrap();

        assert_eq!(experiment.train_data_path, "train.jsonl");
        assert_eq!(experiment.pretrained_file.as_deref(), Some("glove.6B.100d.txt"));
        assert_eq!(experiment.training.batch_size, 8);
        assert_eq!(experiment.training.num_epochs, 10);
        assert_eq!(experiment.model.embedding_dim, 100);
        assert!(experiment.tokenizer.lowercase);

        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn survives_a_trip_through_json() {
        let path = std::env::temp_dir().join(format!("experiment-{}.json", std::process::id()));
        let experiment = Experiment::new("train.jsonl".to_string(), "dev.jsonl".to_string())
            .with_max_instances(Some(100));

        experiment.save(&path).unwrap();
        let reloaded = Experiment::from_file(&path.to_string_lossy()).unwrap();

        assert_eq!(reloaded.max_instances, Some(100));
        assert_eq!(reloaded.artifact_dir, "output");

        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn rejects_unlabelled_training_data() {
        let reader = VenueReader::default();
        let instance = reader.text_to_instance("a title", "an abstract", None).unwrap();
        let dataset = Dataset::new(vec![instance]);

        assert!(ensure_labelled(&dataset, "train.jsonl").is_err());
    }

    #[test]
    fn fills_defaults_for_a_partial_json_experiment() {
        let path = std::env::temp_dir().join(format!("partial-{}.json", std::process::id()));
        std::fs::write(
            &path,
            r#"{
                "train_data_path": "train.jsonl",
                "validation_data_path": "dev.jsonl",
                "vocabulary": {"min_count": 3},
                "model": {"feedforward_hidden_dims": [64, 32]}
            }"#,
        )
        .unwrap();

        let experiment = Experiment::from_file(&path.to_string_lossy()).unwrap();

        assert_eq!(experiment.vocabulary.min_count, 3);
        assert!(!experiment.vocabulary.only_include_pretrained_words);
        assert_eq!(experiment.model.feedforward_hidden_dims, vec![64, 32]);
        assert_eq!(experiment.model.encoder_hidden_size, 100);
        assert_eq!(experiment.training.learning_rate, 1e-3);
        assert_eq!(experiment.pretrained_file, None);

        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn leaves_missing_data_paths_for_the_command_line() {
        let path = std::env::temp_dir().join(format!("no-paths-{}.yaml", std::process::id()));
        std::fs::write(&path, "train_data_path: train.jsonl\n").unwrap();

        let mut experiment = Experiment::from_file(&path.to_string_lossy()).unwrap();
        assert_eq!(experiment.validation_data_path, "");
        assert!(experiment.validate().is_err());

        experiment.validation_data_path = "dev.jsonl".to_string();
        assert!(experiment.validate().is_ok());

        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn pretrained_words_need_a_pretrained_file() {
        let experiment = Experiment::new("train.jsonl".to_string(), "dev.jsonl".to_string())
            .with_vocabulary(VocabularyConfig::new().with_only_include_pretrained_words(true));

        assert!(experiment.validate().is_err());
        assert!(experiment
            .with_pretrained_file(Some("glove.txt".to_string()))
            .validate()
            .is_ok());
    }

    const TRAIN: &str = r#"{"title": "Neural parsing", "paperAbstract": "We parse sentences.", "venue": "ACL"}
{"title": "Robot planning", "paperAbstract": "We plan paths.", "venue": "AI"}
{"title": "Parsing trees", "paperAbstract": "Trees parse well.", "venue": "ACL"}
{"title": "Planning robots", "paperAbstract": "Robots plan.", "venue": "AI"}
"#;

    const VALID: &str = r#"{"title": "Neural trees", "paperAbstract": "We parse.", "venue": "ACL"}
{"title": "Robot paths", "paperAbstract": "We plan.", "venue": "AI"}
"#;

    const GLOVE: &str = "neural 0.1 0.2 0.3 0.4\n\
                         parsing 0.5 0.6 0.7 0.8\n\
                         robot -0.1 -0.2 -0.3 -0.4\n\
                         planning -0.5 -0.6 -0.7 -0.8\n\
                         we 0.0 0.1 0.0 0.1\n";

    #[tokio::test]
    async fn trains_one_epoch_and_writes_a_loadable_archive() {
        let dir = std::env::temp_dir().join(format!("venue-train-{}", std::process::id()));
        tokio::fs::create_dir_all(&dir).await.unwrap();

        let train_path = dir.join("train.jsonl");
        let valid_path = dir.join("valid.jsonl");
        let glove_path = dir.join("glove.txt");
        tokio::fs::write(&train_path, TRAIN).await.unwrap();
        tokio::fs::write(&valid_path, VALID).await.unwrap();
        tokio::fs::write(&glove_path, GLOVE).await.unwrap();

        let experiment = Experiment::new(
            train_path.to_string_lossy().to_string(),
            valid_path.to_string_lossy().to_string(),
        )
        .with_artifact_dir(dir.join("output").to_string_lossy().to_string())
        .with_pretrained_file(Some(glove_path.to_string_lossy().to_string()))
        .with_trainable_embeddings(false)
        .with_vocabulary(VocabularyConfig::new().with_only_include_pretrained_words(true))
        .with_model(
            ModelOptions::new()
                .with_embedding_dim(4)
                .with_encoder_hidden_size(3)
                .with_feedforward_hidden_dims(vec![5]),
        )
        .with_training(
            Training::new()
                .with_num_epochs(1)
                .with_batch_size(2)
                .with_num_workers(Some(1)),
        );

        let archive_dir = train::<Autodiff<NdArray>>(vec![Default::default()], experiment, false)
            .await
            .unwrap();

        let archive = archive::load::<NdArray>(&archive_dir, &Default::default())
            .await
            .unwrap();

        // Only words present in the embedding file, plus padding and OOV
        assert_eq!(archive.vocab.get_vocab_size(TOKENS), 2 + 5);
        assert_eq!(archive.vocab.get_token_index("sentences", TOKENS).unwrap(), 1);
        assert_eq!(archive.vocab.labels(), &["ACL", "AI"]);
        assert!(!archive.experiment.trainable_embeddings);

        let predictor = Predictor::<NdArray>::from_archive(&archive_dir, Default::default())
            .await
            .unwrap();
        let output = predictor
            .predict_json(&serde_json::json!({
                "title": "Neural parsing",
                "paperAbstract": "We parse."
            }))
            .unwrap();

        assert_eq!(output["all_labels"], serde_json::json!(["ACL", "AI"]));
        assert_eq!(output["class_probabilities"].as_array().unwrap().len(), 2);

        tokio::fs::remove_dir_all(dir).await.unwrap();
    }
}
