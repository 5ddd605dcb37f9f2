pub mod frequency_list;
pub mod ignore_list;
pub mod language_data;

use std::fmt;

use serde::{
    Deserialize,
    Serialize,
};

pub use frequency_list::WordFrequencyIndex;
pub use ignore_list::IgnoreList;
pub use language_data::LanguageData;

/// Names a directory of frequency/ignore lists, e.g. `en` or `en_medical`. Always lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct LangDataId(String);

impl LangDataId {
    pub fn new(id: &str) -> Self {
        LangDataId(id.trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `en_medical` belongs to `en`; anything without a two letter prefix is its own language.
    pub fn lang_id(&self) -> LangId {
        let bytes = self.0.as_bytes();
        if bytes.len() > 3 && bytes[2] == b'_' && self.0.is_char_boundary(2) {
            LangId(self.0[..2].to_string())
        } else {
            LangId(self.0.clone())
        }
    }
}

impl From<String> for LangDataId {
    fn from(value: String) -> Self {
        LangDataId::new(&value)
    }
}

impl From<LangDataId> for String {
    fn from(value: LangDataId) -> Self {
        value.0
    }
}

impl fmt::Display for LangDataId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LangId(String);

impl LangId {
    pub fn new(id: &str) -> Self {
        LangId(id.trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LangId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
