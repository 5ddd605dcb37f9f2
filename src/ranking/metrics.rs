use std::collections::HashSet;

use serde::Serialize;

use crate::{
    collection::NoteId,
    corpus::{
        CorpusSegmentId,
        FieldContent,
        TargetCorpusData,
        WordClass,
    },
    dictionary::LanguageData,
    segmentation::WordToken,
};

/// Frequency and familiarity of one word occurrence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WordScores {
    pub word: WordToken,
    pub frequency: f32,
    pub familiarity: f32,
    pub class: WordClass,
}

/// Scored words of one targeted field, in field order.
#[derive(Debug, Clone, Serialize)]
pub struct FieldWordData {
    pub field_name: String,
    pub segment_id: CorpusSegmentId,
    pub words: Vec<WordScores>,
    pub maturity_threshold: f32,
    pub familiarity_median: f32,
}

impl FieldWordData {
    pub fn build(
        field: &FieldContent,
        language_data: &LanguageData,
        corpus: &TargetCorpusData,
    ) -> Self {
        let segment = corpus.segment(&field.segment_id);

        let words = field
            .tokens
            .iter()
            .map(|token| {
                let (familiarity, class) = match segment {
                    Some(segment) => {
                        (segment.familiarity(token.as_str()), segment.word_class(token.as_str()))
                    }
                    None => (0.0, WordClass::New),
                };
                let frequency =
                    language_data.word_frequency(&field.lang_data_id, token.as_str(), 0.0);
                WordScores { word: token.clone(), frequency, familiarity, class }
            })
            .collect();

        Self {
            field_name: field.field_name.clone(),
            segment_id: field.segment_id.clone(),
            words,
            maturity_threshold: segment.map(|s| s.maturity_threshold).unwrap_or_default(),
            familiarity_median: segment.map(|s| s.familiarity_median).unwrap_or_default(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn word_count(&self) -> usize {
        self.words.len()
    }

    /// First occurrence of every distinct word.
    pub fn unique_words(&self) -> Vec<&WordScores> {
        let mut seen: HashSet<&WordToken> = HashSet::new();
        self.words.iter().filter(|w| seen.insert(&w.word)).collect()
    }

    fn unique_with_class(&self, class: WordClass) -> Vec<&WordScores> {
        self.unique_words().into_iter().filter(|w| w.class == class).collect()
    }

    pub fn new_words(&self) -> Vec<&WordScores> {
        self.unique_with_class(WordClass::New)
    }

    pub fn learning_words(&self) -> Vec<&WordScores> {
        self.unique_with_class(WordClass::Learning)
    }

    /// Reviewed at least once.
    pub fn seen_words(&self) -> Vec<&WordScores> {
        self.unique_words().into_iter().filter(|w| w.class != WordClass::New).collect()
    }

    /// Every word not mature yet, least familiar first.
    pub fn focus_words(&self) -> Vec<&WordScores> {
        let mut words: Vec<&WordScores> =
            self.unique_words().into_iter().filter(|w| w.class != WordClass::Mature).collect();
        words.sort_by(|a, b| a.familiarity.total_cmp(&b.familiarity));
        words
    }

    pub fn lowest_fr_word(&self) -> Option<&WordScores> {
        self.words.iter().reduce(|best, w| if w.frequency < best.frequency { w } else { best })
    }

    pub fn lowest_familiarity_word(&self) -> Option<&WordScores> {
        self.words.iter().reduce(|best, w| if w.familiarity < best.familiarity { w } else { best })
    }

    /// Among the least familiar words, the one with the lowest frequency.
    pub fn lowest_fr_least_familiar_word(&self) -> Option<&WordScores> {
        self.words.iter().reduce(|best, w| {
            let less_familiar = w.familiarity < best.familiarity;
            let same_but_rarer = w.familiarity == best.familiarity && w.frequency < best.frequency;
            if less_familiar || same_but_rarer {
                w
            } else {
                best
            }
        })
    }

    /// The word a learner should focus on first, if any word is still unfamiliar.
    pub fn main_focus_word(&self) -> Option<&WordScores> {
        self.lowest_fr_least_familiar_word().filter(|w| w.class != WordClass::Mature)
    }

    pub fn frequencies(&self) -> Vec<f32> {
        self.words.iter().map(|w| w.frequency).collect()
    }

    pub fn familiarities(&self) -> Vec<f32> {
        self.words.iter().map(|w| w.familiarity).collect()
    }
}

/// Everything the factor functions read for one note.
#[derive(Debug, Clone, Serialize)]
pub struct CardWordData {
    pub note_id: NoteId,
    pub fields: Vec<FieldWordData>,
}

impl CardWordData {
    pub fn build(
        note_id: NoteId,
        language_data: &LanguageData,
        corpus: &TargetCorpusData,
    ) -> Self {
        let fields = corpus
            .fields(note_id)
            .iter()
            .map(|field| FieldWordData::build(field, language_data, corpus))
            .collect();
        Self { note_id, fields }
    }

    /// Word that keys dispersion: the first field's lowest frequency, least familiar word.
    pub fn dispersion_key(&self) -> Option<&WordToken> {
        self.fields.iter().find_map(|f| f.lowest_fr_least_familiar_word()).map(|w| &w.word)
    }
}
