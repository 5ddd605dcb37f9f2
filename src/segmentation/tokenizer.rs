use std::{
    collections::HashMap,
    sync::LazyLock,
};

use regex::Regex;

use super::{
    text::{
        create_word_token,
        get_plain_text,
        is_acceptable_word,
    },
    WordToken,
};
use crate::dictionary::LangId;

static WORD_SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\-_'’.]+").unwrap());

/// Splits plain text into raw tokens. Normalization and filtering happen afterwards, so
/// implementations only need to find word boundaries.
pub trait Tokenizer: Send + Sync {
    fn tokenize(&self, text: &str) -> Vec<String>;
}

/// Splits on anything that is not a word character, hyphen, apostrophe or dot.
#[derive(Debug, Default, Clone, Copy)]
pub struct RegexTokenizer;

impl Tokenizer for RegexTokenizer {
    fn tokenize(&self, text: &str) -> Vec<String> {
        WORD_SEPARATORS
            .split(text)
            .filter(|token| !token.is_empty())
            .map(|token| token.to_string())
            .collect()
    }
}

/// Per-language tokenizers with the regex tokenizer as fallback.
#[derive(Default)]
pub struct Tokenizers {
    by_lang: HashMap<LangId, Box<dyn Tokenizer>>,
    fallback: RegexTokenizer,
}

impl Tokenizers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, lang_id: LangId, tokenizer: Box<dyn Tokenizer>) {
        self.by_lang.insert(lang_id, tokenizer);
    }

    pub fn get(&self, lang_id: &LangId) -> &dyn Tokenizer {
        match self.by_lang.get(lang_id) {
            Some(tokenizer) => tokenizer.as_ref(),
            None => &self.fallback,
        }
    }

    /// Field value (may contain markup) to ordered, acceptable word tokens.
    pub fn word_tokens(&self, field_value: &str, lang_id: &LangId) -> Vec<WordToken> {
        let plain = get_plain_text(field_value);
        self.get(lang_id)
            .tokenize(&plain)
            .iter()
            .map(|token| create_word_token(token))
            .filter(|token| is_acceptable_word(token.as_str(), lang_id))
            .collect()
    }
}
