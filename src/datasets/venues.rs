use std::path::Path;

use async_trait::async_trait;
use derive_new::new;
use serde::{Deserialize, Serialize};

use crate::{
    data::{Instance, TokenizerError, WordTokenizer},
    utils::files::file_reader,
};

use super::{DatasetReader, ReaderError};

/// The name of the venue dataset
pub static DATASET: &str = "venues";

/// One raw paper record from a Semantic Scholar JSON-lines file
#[derive(Clone, Debug, Serialize, Deserialize, new)]
pub struct Paper {
    /// The paper title
    pub title: String,

    /// The paper abstract
    #[serde(rename = "paperAbstract")]
    pub paper_abstract: String,

    /// The venue the paper appeared at
    #[serde(default)]
    pub venue: Option<String>,
}

/// Reads papers from JSON lines, one `{"title", "paperAbstract", "venue"}` object per line
#[derive(Clone, Debug, Default, new)]
pub struct VenueReader {
    /// Tokenizer applied to the title and abstract
    pub tokenizer: WordTokenizer,

    /// Stop after this many instances
    pub max_instances: Option<usize>,
}

impl VenueReader {
    /// Tokenize the raw fields of a paper into an instance
    pub fn text_to_instance(
        &self,
        title: &str,
        paper_abstract: &str,
        venue: Option<&str>,
    ) -> Result<Instance, TokenizerError> {
        let label = venue
            .map(str::trim)
            .filter(|venue| !venue.is_empty())
            .map(String::from);

        Ok(Instance::new(
            self.tokenizer.tokenize(title)?,
            self.tokenizer.tokenize(paper_abstract)?,
            label,
        ))
    }

    /// Turn a single line into an instance, `None` for blank lines
    pub fn line_to_instance(&self, line: &str, number: usize) -> Result<Option<Instance>, ReaderError> {
        if line.trim().is_empty() {
            return Ok(None);
        }

        let paper: Paper =
            serde_json::from_str(line).map_err(|source| ReaderError::Parse { line: number, source })?;

        self.text_to_instance(&paper.title, &paper.paper_abstract, paper.venue.as_deref())
            .map(Some)
            .map_err(|source| ReaderError::Tokenize { line: number, source })
    }
}

#[async_trait]
impl DatasetReader for VenueReader {
    async fn read(&self, path: &str) -> Result<Vec<Instance>, ReaderError> {
        let mut lines = file_reader(Path::new(path)).await?;
        let limit = self.max_instances.unwrap_or(usize::MAX);

        let mut instances = Vec::new();
        let mut number = 0;

        while instances.len() < limit {
            let Some(line) = lines.next_line().await? else {
                break;
            };
            number += 1;

            if let Some(instance) = self.line_to_instance(&line, number)? {
                instances.push(instance);
            }
        }

        Ok(instances)
    }
}
