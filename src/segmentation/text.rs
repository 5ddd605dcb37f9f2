use std::sync::LazyLock;

use regex::Regex;

use super::WordToken;
use crate::dictionary::LangId;

static CHINESE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\u{4e00}-\u{9fff}]+").unwrap());
static JAPANESE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"[\u{3040}-\u{309f}\u{30a0}-\u{30ff}\u{4e00}-\u{9faf}",
        r"\u{f900}-\u{faff}\u{3400}-\u{4dbf}]+"
    ))
    .unwrap()
});
static KOREAN_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\u{ac00}-\u{d7a3}]+").unwrap());
static ARABIC_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\u{0600}-\u{06ff}]+").unwrap());
static ETHIOPIC_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\u{1200}-\u{137f}]+").unwrap());
static DEFAULT_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\w{2,}").unwrap());

static HIDDEN_BLOCKS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    ["style", "head", "script", "object", "noscript", "embed", "noembed", "applet"]
        .iter()
        .map(|tag| Regex::new(&format!(r"(?is)<{tag}\b[^>]*>.*?</{tag}>")).unwrap())
        .collect()
});
static BLOCK_TAGS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)</?(p|div|br|blockquote|h[1-6]|ul|ol|li|table|tr|td|th)\b[^>]*>").unwrap()
});
static ANY_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());
static MEDIA_REFS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(sound|type):[^\]]+\]").unwrap());
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

const ACCEPT_STRIP_CHARS: &[char] = &[
    '!', '@', '#', '$', '%', '^', '&', '*', '(', ')', '_', '-', '=', '+', '{', '}', ':', '"',
    '<', '>', '?', ',', '.', '/', ';', '\'', ' ',
];

const TOKEN_STRIP_CHARS: &[char] = &[
    '.', ',', '\'', '’', '"', ' ', '\t', '\n', '\r', '!', '@', '#', '$', '%', '^', '&', '*', '(',
    ')', '_', '-', '=', '+', '{', '}', ':', '<', '>', '?', '/', ';',
];

const MAX_WORD_LENGTH: usize = 300;

/// Whether a token counts as a word for the given language (used for list entries and field
/// content alike).
pub fn is_acceptable_word(word: &str, lang_id: &LangId) -> bool {
    let (pattern, min_length): (&Regex, usize) = match lang_id.as_str() {
        "zh" => (&CHINESE_PATTERN, 1),
        "ja" => (&JAPANESE_PATTERN, 1),
        "ko" => (&KOREAN_PATTERN, 1),
        "ar" => (&ARABIC_PATTERN, 1),
        "am" | "ti" | "om" | "so" | "ha" => (&ETHIOPIC_PATTERN, 1),
        _ => (&DEFAULT_PATTERN, 2),
    };

    let stripped = word.trim_matches(ACCEPT_STRIP_CHARS);
    let length = stripped.chars().count();
    if length < min_length || length > MAX_WORD_LENGTH {
        return false;
    }

    pattern.is_match(stripped) && !stripped.chars().all(|c| c.is_numeric())
}

pub fn create_word_token(text: &str) -> WordToken {
    WordToken::from(text.trim_matches(TOKEN_STRIP_CHARS).to_lowercase())
}

/// Strips markup from a field value, leaving space separated text.
pub fn get_plain_text(value: &str) -> String {
    let mut text = value.to_string();
    for hidden in HIDDEN_BLOCKS.iter() {
        text = hidden.replace_all(&text, " ").to_string();
    }
    text = BLOCK_TAGS.replace_all(&text, " ").to_string();
    text = ANY_TAG.replace_all(&text, "").to_string();
    text = MEDIA_REFS.replace_all(&text, " ").to_string();
    text = html_escape::decode_html_entities(&text).to_string();
    text = WHITESPACE.replace_all(&text, " ").to_string();
    text.trim().to_string()
}
