use std::collections::{
    HashMap,
    HashSet,
};

use super::{
    CorpusSegmentId,
    WordClass,
};
use crate::{
    dictionary::LangId,
    segmentation::WordToken,
};

/// Familiarity of every word in one corpus segment of a target. Read-only once built.
#[derive(Debug, Clone)]
pub struct SegmentContentMetrics {
    pub segment_id: CorpusSegmentId,
    pub lang_id: LangId,
    /// Only words with a familiarity above zero.
    pub words_familiarity: HashMap<WordToken, f32>,
    pub words_num_cards: HashMap<WordToken, usize>,
    pub words_num_notes: HashMap<WordToken, usize>,
    /// Every word in the segment, reviewed or not.
    pub all_words: HashSet<WordToken>,
    pub mature_words: HashSet<WordToken>,
    pub familiarity_mean: f32,
    pub familiarity_median: f32,
    pub familiarity_max: f32,
    pub maturity_threshold: f32,
}

impl SegmentContentMetrics {
    pub fn familiarity(&self, word: &str) -> f32 {
        self.words_familiarity.get(word).copied().unwrap_or(0.0)
    }

    pub fn is_mature(&self, word: &str) -> bool {
        self.mature_words.contains(word)
    }

    pub fn word_class(&self, word: &str) -> WordClass {
        if self.is_mature(word) {
            WordClass::Mature
        } else if self.familiarity(word) > 0.0 {
            WordClass::Learning
        } else {
            WordClass::New
        }
    }

    pub fn num_reviewed_words(&self) -> usize {
        self.words_familiarity.len()
    }

    pub fn num_new_words(&self) -> usize {
        self.all_words.iter().filter(|w| !self.words_familiarity.contains_key(*w)).count()
    }

    pub fn num_mature_words(&self) -> usize {
        self.mature_words.len()
    }
}
