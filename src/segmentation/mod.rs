pub mod text;
pub mod tokenizer;

use std::{
    borrow::Borrow,
    fmt,
};

use serde::{
    Deserialize,
    Serialize,
};

pub use text::{
    create_word_token,
    get_plain_text,
    is_acceptable_word,
};
pub use tokenizer::{
    RegexTokenizer,
    Tokenizer,
    Tokenizers,
};

/// A normalized (trimmed, lowercased) word as it appears in frequency lists and note fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WordToken(String);

impl WordToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for WordToken {
    fn from(value: &str) -> Self {
        WordToken(value.to_string())
    }
}

impl From<String> for WordToken {
    fn from(value: String) -> Self {
        WordToken(value)
    }
}

impl Borrow<str> for WordToken {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WordToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
