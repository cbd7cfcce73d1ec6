use tokenizers::{
    pre_tokenizers::bert::BertPreTokenizer, OffsetReferential, OffsetType, PreTokenizedString,
    PreTokenizer,
};

/// Splits raw text into word and punctuation tokens
#[derive(burn::config::Config, Debug)]
pub struct WordTokenizer {
    /// Lowercase every token
    #[config(default = true)]
    pub lowercase: bool,

    /// Keep at most this many tokens
    pub max_tokens: Option<usize>,
}

impl WordTokenizer {
    /// Split text on whitespace and punctuation, each punctuation character becoming its own token
    pub fn tokenize(&self, text: &str) -> Result<Vec<String>, TokenizerError> {
        let mut pretokenized = PreTokenizedString::from(text);

        BertPreTokenizer
            .pre_tokenize(&mut pretokenized)
            .map_err(|e| TokenizerError::PreTokenize(e.to_string()))?;

        let splits = pretokenized.get_splits(OffsetReferential::Original, OffsetType::Byte);
        let limit = self.max_tokens.unwrap_or(usize::MAX);

        let tokens = splits
            .into_iter()
            .take(limit)
            .map(|(token, _, _)| {
                if self.lowercase {
                    token.to_lowercase()
                } else {
                    token.to_string()
                }
            })
            .collect();

        Ok(tokens)
    }
}

impl Default for WordTokenizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Tokenizer Error
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum TokenizerError {
    /// The underlying pre-tokenizer rejected the input
    #[error("unable to pre-tokenize text: {0}")]
    PreTokenize(String),
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn splits_punctuation_into_separate_tokens() {
        let tokens = WordTokenizer::new()
            .tokenize("Deep Learning, for NLP!")
            .unwrap();

        assert_eq!(tokens, vec!["deep", "learning", ",", "for", "nlp", "!"]);
    }

    #[test]
    fn keeps_case_when_asked() {
        let tokens = WordTokenizer::new()
            .with_lowercase(false)
            .tokenize("Neural Nets")
            .unwrap();

        assert_eq!(tokens, vec!["Neural", "Nets"]);
    }

    #[test]
    fn truncates_to_max_tokens() {
        let tokens = WordTokenizer::new()
            .with_max_tokens(Some(2))
            .tokenize("one two three four")
            .unwrap();

        assert_eq!(tokens, vec!["one", "two"]);
    }

    #[test]
    fn blank_text_has_no_tokens() {
        let tokens = WordTokenizer::new().tokenize("   \n\t").unwrap();

        assert!(tokens.is_empty());
    }
}
