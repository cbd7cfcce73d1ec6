use async_trait::async_trait;
use burn::data::dataset::{self, Dataset as _, InMemDataset};
use rand::seq::index::sample;

use crate::data::{Instance, TokenizerError};

///  The Semantic Scholar venue dataset
pub mod venues;

pub use venues::VenueReader;

/// A reader which turns a data file into instances
#[async_trait]
pub trait DatasetReader: Send + Sync {
    /// Read every instance from the file at the given path
    async fn read(&self, path: &str) -> Result<Vec<Instance>, ReaderError>;
}

/// An in-memory dataset of instances
pub struct Dataset {
    /// Underlying In-Memory dataset
    dataset: InMemDataset<Instance>,
}

impl dataset::Dataset<Instance> for Dataset {
    fn get(&self, index: usize) -> Option<Instance> {
        self.dataset.get(index)
    }

    fn len(&self) -> usize {
        self.dataset.len()
    }
}

impl Dataset {
    /// Wrap instances that were already read
    pub fn new(instances: Vec<Instance>) -> Self {
        Self {
            dataset: InMemDataset::new(instances),
        }
    }

    /// Read a dataset file with the given reader
    pub async fn load<R: DatasetReader + ?Sized>(reader: &R, path: &str) -> Result<Self, ReaderError> {
        let instances = reader.read(path).await?;

        log::info!("Read {} instances from {}", instances.len(), path);

        Ok(Self::new(instances))
    }

    /// Every instance, in file order
    pub fn instances(&self) -> impl Iterator<Item = Instance> + '_ {
        self.iter()
    }

    /// Returns up to `count` distinct random instances from the dataset
    pub fn get_samples(&self, count: usize) -> Vec<Instance> {
        let mut rng = rand::thread_rng();
        let count = count.min(self.len());

        sample(&mut rng, self.len(), count)
            .into_iter()
            .filter_map(|i| self.get(i))
            .collect()
    }
}

/// Dataset Reader Error
#[derive(thiserror::Error, Debug)]
pub enum ReaderError {
    /// The data file could not be read
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A line could not be parsed as a record
    #[error("line {line}: {source}")]
    Parse {
        /// The 1-based line number
        line: usize,
        /// The parse failure
        source: serde_json::Error,
    },

    /// A text field could not be tokenized
    #[error("line {line}: {source}")]
    Tokenize {
        /// The 1-based line number
        line: usize,
        /// The tokenizer failure
        source: TokenizerError,
    },
}
