/// Instances: the named fields of one example
pub mod instance;

/// Word tokenization
pub mod tokenizer;

/// Token and label indexing
pub mod vocabulary;

pub use instance::Instance;
pub use tokenizer::{TokenizerError, WordTokenizer};
pub use vocabulary::{Vocabulary, VocabularyConfig, VocabularyError};
