use derive_new::new;
use serde::{Deserialize, Serialize};

/// A single example: the tokenized fields of one paper, plus its venue when known
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, new)]
pub struct Instance {
    /// Title tokens
    pub title: Vec<String>,

    /// Abstract tokens
    pub abstract_tokens: Vec<String>,

    /// The venue label, absent for prediction instances
    pub label: Option<String>,
}

impl Instance {
    /// Every text token across both fields
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.title
            .iter()
            .chain(self.abstract_tokens.iter())
            .map(String::as_str)
    }
}
