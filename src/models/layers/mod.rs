/// Pretrained token embeddings
pub mod embedding;

/// Sequence-to-vector encoders
pub mod seq2vec;

/// Feed-forward classifier head
pub mod feedforward;

pub use embedding::{read_embedding_words, read_pretrained, EmbeddingError};
pub use feedforward::{FeedForward, FeedForwardConfig};
pub use seq2vec::{BiLstmEncoder, BiLstmEncoderConfig};
