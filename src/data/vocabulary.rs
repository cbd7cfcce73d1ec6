use std::{
    collections::{BTreeMap, HashMap, HashSet},
    path::Path,
};

use tokio::fs;

use crate::utils::files::read_file;

use super::Instance;

/// The namespace holding text tokens
pub static TOKENS: &str = "tokens";

/// The namespace holding venue labels
pub static LABELS: &str = "labels";

/// The padding entry, always index 0 in a padded namespace
pub static PADDING_TOKEN: &str = "@@PADDING@@";

/// The out-of-vocabulary entry, always index 1 in a padded namespace
pub static OOV_TOKEN: &str = "@@UNKNOWN@@";

/// Namespaces matching these patterns carry no padding or OOV entries
pub static NON_PADDED_NAMESPACES: &[&str] = &["*tags", "*labels"];

/// Stands in for a newline inside an entry, which would otherwise split it on reload
pub static NEWLINE_TOKEN: &str = "@@NEWLINE@@";

const NON_PADDED_FILE: &str = "non_padded_namespaces.txt";

/// Options for building a vocabulary from instances
#[derive(burn::config::Config, Debug)]
pub struct VocabularyConfig {
    /// Tokens seen fewer times than this are dropped
    #[config(default = 1)]
    pub min_count: usize,

    /// Cap on the number of tokens kept, not counting padding and OOV
    pub max_vocab_size: Option<usize>,

    /// Restrict tokens to those present in the pretrained embedding file
    #[config(default = false)]
    pub only_include_pretrained_words: bool,
}

#[derive(Clone, Debug, PartialEq)]
struct Namespace {
    index_to_token: Vec<String>,
    token_to_index: HashMap<String, usize>,
    padded: bool,
}

impl Namespace {
    fn new(padded: bool) -> Self {
        let index_to_token = if padded {
            vec![PADDING_TOKEN.to_string(), OOV_TOKEN.to_string()]
        } else {
            Vec::new()
        };

        Self::from_tokens(index_to_token, padded)
    }

    fn from_tokens(index_to_token: Vec<String>, padded: bool) -> Self {
        let token_to_index = index_to_token
            .iter()
            .enumerate()
            .map(|(index, token)| (token.clone(), index))
            .collect();

        Self {
            index_to_token,
            token_to_index,
            padded,
        }
    }

    fn add(&mut self, token: &str) {
        if !self.token_to_index.contains_key(token) {
            self.token_to_index
                .insert(token.to_string(), self.index_to_token.len());
            self.index_to_token.push(token.to_string());
        }
    }
}

/// A mapping from tokens and labels to integer indices, organised in namespaces
#[derive(Clone, Debug, PartialEq)]
pub struct Vocabulary {
    namespaces: BTreeMap<String, Namespace>,
}

/// Whether a namespace is padded, judged by the non-padded patterns
pub fn is_padded(namespace: &str) -> bool {
    !NON_PADDED_NAMESPACES.iter().any(|pattern| {
        if let Some(suffix) = pattern.strip_prefix('*') {
            namespace.ends_with(suffix)
        } else {
            namespace == *pattern
        }
    })
}

/// Order counted entries by descending count, ties broken lexicographically
fn sorted_by_count(counts: HashMap<&str, usize>) -> Vec<(&str, usize)> {
    let mut entries: Vec<_> = counts.into_iter().collect();
    entries.sort_by(|(a, a_count), (b, b_count)| b_count.cmp(a_count).then_with(|| a.cmp(b)));
    entries
}

impl Vocabulary {
    /// An empty vocabulary with the token and label namespaces
    pub fn empty() -> Self {
        let namespaces = [TOKENS, LABELS]
            .iter()
            .map(|ns| (ns.to_string(), Namespace::new(is_padded(ns))))
            .collect();

        Self { namespaces }
    }

    /// Count tokens and labels across the given instances
    pub fn from_instances<'a, I>(
        instances: I,
        config: &VocabularyConfig,
        pretrained_words: Option<&HashSet<String>>,
    ) -> Self
    where
        I: IntoIterator<Item = &'a Instance>,
    {
        let mut token_counts: HashMap<&str, usize> = HashMap::new();
        let mut label_counts: HashMap<&str, usize> = HashMap::new();

        for instance in instances {
            for token in instance.tokens() {
                *token_counts.entry(token).or_default() += 1;
            }

            if let Some(label) = &instance.label {
                *label_counts.entry(label.as_str()).or_default() += 1;
            }
        }

        let restrict_to = pretrained_words.filter(|_| config.only_include_pretrained_words);

        let mut vocab = Self::empty();

        let tokens = sorted_by_count(token_counts)
            .into_iter()
            .filter(|(_, count)| *count >= config.min_count)
            .filter(|(token, _)| restrict_to.map_or(true, |words| words.contains(*token)))
            .take(config.max_vocab_size.unwrap_or(usize::MAX));

        for (token, _) in tokens {
            vocab.add_token(token, TOKENS);
        }

        for (label, _) in sorted_by_count(label_counts) {
            vocab.add_token(label, LABELS);
        }

        log::info!(
            "Built vocabulary with {} tokens and {} labels",
            vocab.get_vocab_size(TOKENS),
            vocab.get_vocab_size(LABELS)
        );

        vocab
    }

    /// Add a token to a namespace, creating the namespace if needed
    pub fn add_token(&mut self, token: &str, namespace: &str) {
        self.namespaces
            .entry(namespace.to_string())
            .or_insert_with(|| Namespace::new(is_padded(namespace)))
            .add(token);
    }

    fn namespace(&self, namespace: &str) -> Result<&Namespace, VocabularyError> {
        self.namespaces
            .get(namespace)
            .ok_or_else(|| VocabularyError::UnknownNamespace(namespace.to_string()))
    }

    /// Look up a token's index, falling back to OOV in padded namespaces
    pub fn get_token_index(&self, token: &str, namespace: &str) -> Result<usize, VocabularyError> {
        let ns = self.namespace(namespace)?;

        match ns.token_to_index.get(token) {
            Some(index) => Ok(*index),
            None if ns.padded => Ok(ns.token_to_index[OOV_TOKEN]),
            None => Err(VocabularyError::UnknownToken {
                token: token.to_string(),
                namespace: namespace.to_string(),
            }),
        }
    }

    /// Look up the token stored at an index
    pub fn get_token_from_index(
        &self,
        index: usize,
        namespace: &str,
    ) -> Result<&str, VocabularyError> {
        self.namespace(namespace)?
            .index_to_token
            .get(index)
            .map(String::as_str)
            .ok_or_else(|| VocabularyError::UnknownIndex {
                index,
                namespace: namespace.to_string(),
            })
    }

    /// The number of entries in a namespace, zero for an unknown namespace
    pub fn get_vocab_size(&self, namespace: &str) -> usize {
        self.namespaces
            .get(namespace)
            .map_or(0, |ns| ns.index_to_token.len())
    }

    /// Every entry in a namespace, ordered by index
    pub fn get_index_to_token(&self, namespace: &str) -> Result<&[String], VocabularyError> {
        Ok(&self.namespace(namespace)?.index_to_token)
    }

    /// The venue labels, ordered by index
    pub fn labels(&self) -> &[String] {
        self.namespaces
            .get(LABELS)
            .map_or(&[][..], |ns| ns.index_to_token.as_slice())
    }

    /// The padding index of the token namespace
    pub fn padding_index(&self) -> usize {
        0
    }

    /// The out-of-vocabulary index of the token namespace
    pub fn oov_index(&self) -> usize {
        1
    }

    /// Write one file per namespace into the given directory
    pub async fn save_to_files(&self, dir: impl AsRef<Path>) -> Result<(), VocabularyError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).await?;

        fs::write(dir.join(NON_PADDED_FILE), NON_PADDED_NAMESPACES.join("\n")).await?;

        for (name, ns) in &self.namespaces {
            // Padding is implied on reload
            let skip = usize::from(ns.padded);
            let mut contents = ns.index_to_token[skip..]
                .iter()
                .map(|token| token.replace('\n', NEWLINE_TOKEN))
                .collect::<Vec<_>>()
                .join("\n");
            contents.push('\n');

            fs::write(dir.join(format!("{name}.txt")), contents).await?;
        }

        Ok(())
    }

    /// Read a vocabulary previously written with `save_to_files`
    pub async fn from_files(dir: impl AsRef<Path>) -> Result<Self, VocabularyError> {
        let dir = dir.as_ref();

        let patterns = read_file(dir.join(NON_PADDED_FILE))
            .await?
            .into_iter()
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>();

        let mut namespaces = BTreeMap::new();
        let mut entries = fs::read_dir(dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            if path.extension().and_then(|e| e.to_str()) != Some("txt")
                || path.file_name().and_then(|n| n.to_str()) == Some(NON_PADDED_FILE)
            {
                continue;
            }

            let padded = !patterns.iter().any(|pattern| match pattern.strip_prefix('*') {
                Some(suffix) => name.ends_with(suffix),
                None => name == pattern.as_str(),
            });

            let mut index_to_token = if padded {
                vec![PADDING_TOKEN.to_string()]
            } else {
                Vec::new()
            };

            index_to_token.extend(
                read_file(&path)
                    .await?
                    .into_iter()
                    .filter(|line| !line.is_empty())
                    .map(|line| line.replace(NEWLINE_TOKEN, "\n")),
            );

            if padded && index_to_token.get(1).map(String::as_str) != Some(OOV_TOKEN) {
                return Err(VocabularyError::MissingOov(name.to_string()));
            }

            namespaces.insert(name.to_string(), Namespace::from_tokens(index_to_token, padded));
        }

        Ok(Self { namespaces })
    }
}

/// Vocabulary Error
#[derive(thiserror::Error, Debug)]
pub enum VocabularyError {
    /// The namespace has never been populated
    #[error("no vocabulary namespace named {0}")]
    UnknownNamespace(String),

    /// A token missing from a namespace with no OOV entry
    #[error("{token} is not in the {namespace} namespace")]
    UnknownToken {
        /// The token looked up
        token: String,
        /// The namespace searched
        namespace: String,
    },

    /// An index past the end of a namespace
    #[error("index {index} is out of range for the {namespace} namespace")]
    UnknownIndex {
        /// The index looked up
        index: usize,
        /// The namespace searched
        namespace: String,
    },

    /// A padded namespace file that does not start with the OOV entry
    #[error("padded namespace {0} does not begin with the OOV token")]
    MissingOov(String),

    /// Reading or writing vocabulary files failed
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn instance(title: &str, abstract_text: &str, label: &str) -> Instance {
        Instance::new(
            title.split_whitespace().map(String::from).collect(),
            abstract_text.split_whitespace().map(String::from).collect(),
            Some(label.to_string()),
        )
    }

    fn corpus() -> Vec<Instance> {
        vec![
            instance("neural parsing", "we parse with neural nets", "ACL"),
            instance("robot planning", "we plan with search", "AI"),
            instance("neural kernels", "we learn kernels", "ML"),
            instance("parsing again", "we parse", "ACL"),
        ]
    }

    #[test]
    fn reserves_padding_and_oov_in_token_namespace() {
        let vocab = Vocabulary::from_instances(&corpus(), &VocabularyConfig::new(), None);

        assert_eq!(vocab.get_token_from_index(0, TOKENS).unwrap(), PADDING_TOKEN);
        assert_eq!(vocab.get_token_from_index(1, TOKENS).unwrap(), OOV_TOKEN);
        assert_eq!(vocab.get_token_index("never-seen", TOKENS).unwrap(), 1);
    }

    #[test]
    fn orders_by_count_then_lexicographically() {
        let vocab = Vocabulary::from_instances(&corpus(), &VocabularyConfig::new(), None);

        // "we" x4, "neural" x3, then the pairs in lexicographic order
        let tokens = vocab.get_index_to_token(TOKENS).unwrap();
        assert_eq!(
            &tokens[2..7],
            &["we", "neural", "kernels", "parse", "parsing"]
        );
        assert_eq!(vocab.labels(), &["ACL", "AI", "ML"]);
    }

    #[test]
    fn labels_have_no_padding_and_reject_unknowns() {
        let vocab = Vocabulary::from_instances(&corpus(), &VocabularyConfig::new(), None);

        assert_eq!(vocab.get_vocab_size(LABELS), 3);
        assert_eq!(vocab.get_token_index("ACL", LABELS).unwrap(), 0);
        assert!(matches!(
            vocab.get_token_index("NeurIPS", LABELS),
            Err(VocabularyError::UnknownToken { .. })
        ));
    }

    #[test]
    fn applies_min_count_and_max_size() {
        let config = VocabularyConfig::new().with_min_count(2);
        let vocab = Vocabulary::from_instances(&corpus(), &config, None);
        assert_eq!(vocab.get_vocab_size(TOKENS), 2 + 6);

        let config = VocabularyConfig::new().with_max_vocab_size(Some(3));
        let vocab = Vocabulary::from_instances(&corpus(), &config, None);
        assert_eq!(vocab.get_vocab_size(TOKENS), 2 + 3);
    }

    #[test]
    fn restricts_to_pretrained_words_when_asked() {
        let words: HashSet<String> = ["neural", "kernels"].iter().map(|w| w.to_string()).collect();

        let config = VocabularyConfig::new().with_only_include_pretrained_words(true);
        let vocab = Vocabulary::from_instances(&corpus(), &config, Some(&words));

        assert_eq!(vocab.get_vocab_size(TOKENS), 4);
        assert_eq!(vocab.get_token_index("we", TOKENS).unwrap(), 1);
    }

    #[test]
    fn non_padded_patterns() {
        assert!(is_padded(TOKENS));
        assert!(!is_padded(LABELS));
        assert!(!is_padded("ner_tags"));
    }

    #[tokio::test]
    async fn survives_a_trip_through_files() {
        let dir = std::env::temp_dir().join(format!("vocab-files-{}", std::process::id()));
        let vocab = Vocabulary::from_instances(&corpus(), &VocabularyConfig::new(), None);

        vocab.save_to_files(&dir).await.unwrap();
        let reloaded = Vocabulary::from_files(&dir).await.unwrap();

        assert_eq!(reloaded, vocab);

        std::fs::remove_dir_all(dir).unwrap();
    }

    #[tokio::test]
    async fn keeps_entries_with_newlines_intact_on_disk() {
        let dir = std::env::temp_dir().join(format!("vocab-newlines-{}", std::process::id()));
        let mut vocab = Vocabulary::empty();
        vocab.add_token("ML", LABELS);
        vocab.add_token("Proc.\nACL", LABELS);
        vocab.add_token("NeurIPS", LABELS);

        vocab.save_to_files(&dir).await.unwrap();
        let reloaded = Vocabulary::from_files(&dir).await.unwrap();

        assert_eq!(reloaded.labels(), &["ML", "Proc.\nACL", "NeurIPS"]);
        assert_eq!(reloaded.get_token_index("NeurIPS", LABELS).unwrap(), 2);

        std::fs::remove_dir_all(dir).unwrap();
    }
}
