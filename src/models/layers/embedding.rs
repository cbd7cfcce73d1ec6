use std::{
    collections::{HashMap, HashSet},
    path::Path,
};

use burn::tensor::{backend::Backend, Data, Distribution, Shape, Tensor};

use crate::{data::Vocabulary, utils::files::file_reader};

/// Split a GloVe-format line into its word and vector, `None` when a value is not a number
fn parse_line(line: &str) -> Option<(&str, Vec<f32>)> {
    let mut fields = line.trim_end().split(' ');
    let word = fields.next().filter(|w| !w.is_empty())?;

    let vector = fields
        .map(str::parse::<f32>)
        .collect::<Result<Vec<_>, _>>()
        .ok()?;

    Some((word, vector))
}

/// A `<count> <dim>` header line as written by word2vec-style exports
fn is_header(line: &str) -> bool {
    let fields: Vec<_> = line.split_whitespace().collect();

    fields.len() == 2 && fields.iter().all(|f| f.parse::<usize>().is_ok())
}

/// The set of words present in a pretrained embedding file
pub async fn read_embedding_words(path: &Path) -> Result<HashSet<String>, EmbeddingError> {
    let mut lines = file_reader(path).await?;
    let mut words = HashSet::new();
    let mut first = true;

    while let Some(line) = lines.next_line().await? {
        if std::mem::take(&mut first) && is_header(&line) {
            continue;
        }

        if let Some(word) = line.split(' ').next().filter(|w| !w.is_empty()) {
            words.insert(word.to_string());
        }
    }

    Ok(words)
}

/// Build an embedding matrix for a vocabulary namespace from a GloVe-format text file
///
/// Rows for tokens missing from the file are drawn from a normal distribution matching the mean
/// and standard deviation of the vectors that were found.
pub async fn read_pretrained<B: Backend>(
    path: &Path,
    vocab: &Vocabulary,
    namespace: &str,
    dim: usize,
    device: &B::Device,
) -> Result<Tensor<B, 2>, EmbeddingError> {
    let tokens = vocab.get_index_to_token(namespace)?;
    let wanted: HashMap<&str, usize> = tokens
        .iter()
        .enumerate()
        .map(|(index, token)| (token.as_str(), index))
        .collect();

    let mut lines = file_reader(path).await?;
    let mut found: HashMap<usize, Vec<f32>> = HashMap::new();
    let mut number = 0;
    let mut vectors = 0;
    let mut skipped = 0;

    while let Some(line) = lines.next_line().await? {
        number += 1;

        if number == 1 && is_header(&line) {
            continue;
        }

        let Some((word, vector)) = parse_line(&line) else {
            skipped += 1;
            continue;
        };

        if vector.len() != dim {
            // The first vector settles the file's width
            if vectors == 0 {
                return Err(EmbeddingError::DimensionMismatch {
                    path: path.display().to_string(),
                    expected: dim,
                    found: vector.len(),
                });
            }

            skipped += 1;
            continue;
        }
        vectors += 1;

        if let Some(index) = wanted.get(word) {
            found.insert(*index, vector);
        }
    }

    if skipped > 0 {
        log::warn!(
            "Skipped {} lines of {} without a word and {} values",
            skipped,
            path.display(),
            dim
        );
    }

    if found.is_empty() {
        return Err(EmbeddingError::NoOverlap(path.display().to_string()));
    }

    log::info!(
        "Found pretrained vectors for {} of {} {} entries",
        found.len(),
        tokens.len(),
        namespace
    );

    let count = (found.len() * dim) as f64;
    let mean = found.values().flatten().map(|v| *v as f64).sum::<f64>() / count;
    let variance = found
        .values()
        .flatten()
        .map(|v| (*v as f64 - mean).powi(2))
        .sum::<f64>()
        / count;

    let mut values = Tensor::<B, 2>::random(
        [tokens.len(), dim],
        Distribution::Normal(mean, variance.sqrt()),
        device,
    )
    .into_data()
    .convert::<f32>()
    .value;

    for (index, vector) in found {
        values[index * dim..(index + 1) * dim].copy_from_slice(&vector);
    }

    Ok(Tensor::from_data(
        Data::new(values, Shape::new([tokens.len(), dim])).convert::<B::FloatElem>(),
        device,
    ))
}

/// Embedding Error
#[derive(thiserror::Error, Debug)]
pub enum EmbeddingError {
    /// The embedding file could not be read
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The vocabulary has no namespace to embed
    #[error(transparent)]
    Vocabulary(#[from] crate::data::VocabularyError),

    /// Not a single vocabulary entry appears in the file
    #[error("no vocabulary tokens were found in {0}")]
    NoOverlap(String),

    /// The file's vectors are not as wide as the embedding layer
    #[error("{path} holds {found}-dimensional vectors but the embedding dimension is {expected}")]
    DimensionMismatch {
        /// The embedding file
        path: String,
        /// The configured embedding dimension
        expected: usize,
        /// The width of the first vector in the file
        found: usize,
    },

    /// Pretrained weights do not fit the embedding layer
    #[error("pretrained weights are {actual:?} but the embedding layer is {expected:?}")]
    ShapeMismatch {
        /// The embedding layer shape
        expected: [usize; 2],
        /// The pretrained matrix shape
        actual: [usize; 2],
    },
}
