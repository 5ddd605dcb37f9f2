pub mod familiarity;
pub mod segment;

use std::{
    collections::{
        BTreeMap,
        HashMap,
    },
    time::Instant,
};

use rayon::iter::{
    IntoParallelIterator,
    ParallelIterator,
};
use serde::{
    Deserialize,
    Serialize,
};
use tracing::info;

pub use familiarity::FamiliaritySettings;
pub use segment::SegmentContentMetrics;

use crate::{
    collection::{
        Card,
        CardId,
        ModelId,
        Note,
        NoteId,
    },
    core::ReorderError,
    dictionary::{
        LangDataId,
        LanguageData,
    },
    segmentation::{
        Tokenizers,
        WordToken,
    },
};

pub type CorpusSegmentId = String;

/// How note fields are grouped into corpus segments. Fixed per target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorpusSegmentationStrategy {
    #[default]
    ByLangDataId,
    ByNoteModelIdAndFieldName,
    ByLangId,
}

impl CorpusSegmentationStrategy {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "by_lang_data_id" => Some(Self::ByLangDataId),
            "by_note_model_id_and_field_name" => Some(Self::ByNoteModelIdAndFieldName),
            "by_lang_id" => Some(Self::ByLangId),
            _ => None,
        }
    }

    pub fn segment_id(
        &self,
        lang_data_id: &LangDataId,
        model_id: ModelId,
        field_name: &str,
    ) -> CorpusSegmentId {
        match self {
            Self::ByLangDataId => lang_data_id.to_string(),
            Self::ByNoteModelIdAndFieldName => format!("{} {}", model_id, field_name),
            Self::ByLangId => lang_data_id.lang_id().to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WordClass {
    /// Never reviewed.
    New,
    /// Reviewed but not mature yet.
    Learning,
    Mature,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldLanguage {
    pub field_name: String,
    pub lang_data_id: LangDataId,
}

/// Targeted fields per note type.
pub type FieldLanguages = HashMap<ModelId, Vec<FieldLanguage>>;

/// Tokenized content of one targeted field, ignored words removed.
#[derive(Debug, Clone)]
pub struct FieldContent {
    pub field_name: String,
    pub lang_data_id: LangDataId,
    pub segment_id: CorpusSegmentId,
    pub tokens: Vec<WordToken>,
}

/// Field content and familiarity metrics for everything in a target's main scope.
#[derive(Debug, Clone, Default)]
pub struct TargetCorpusData {
    pub notes_fields: HashMap<NoteId, Vec<FieldContent>>,
    pub segments: BTreeMap<CorpusSegmentId, SegmentContentMetrics>,
}

fn tokenize_note(
    note: &Note,
    fields: &[FieldLanguage],
    strategy: CorpusSegmentationStrategy,
    language_data: &LanguageData,
    tokenizers: &Tokenizers,
) -> Result<Vec<FieldContent>, ReorderError> {
    fields
        .iter()
        .map(|field| {
            if field.lang_data_id.as_str().is_empty() {
                return Err(ReorderError::Configuration(format!(
                    "Field '{}' has no language configured",
                    field.field_name
                )));
            }
            let value = note.field(&field.field_name).ok_or_else(|| {
                ReorderError::Configuration(format!(
                    "Field '{}' not found on note {}",
                    field.field_name, note.id
                ))
            })?;

            let lang_id = field.lang_data_id.lang_id();
            let tokens = tokenizers
                .word_tokens(value, &lang_id)
                .into_iter()
                .filter(|token| !language_data.is_ignored(&field.lang_data_id, token.as_str()))
                .collect();

            let segment_id =
                strategy.segment_id(&field.lang_data_id, note.model_id, &field.field_name);
            Ok(FieldContent {
                field_name: field.field_name.clone(),
                lang_data_id: field.lang_data_id.clone(),
                segment_id,
                tokens,
            })
        })
        .collect()
}

impl TargetCorpusData {
    /// Pure function of the given cards and notes: tokenizes every targeted field, then derives
    /// per segment familiarity from the reviewed cards.
    pub fn build(
        cards: &[Card],
        notes: &HashMap<NoteId, Note>,
        field_languages: &FieldLanguages,
        strategy: CorpusSegmentationStrategy,
        language_data: &LanguageData,
        tokenizers: &Tokenizers,
        settings: &FamiliaritySettings,
    ) -> Result<Self, ReorderError> {
        let start = Instant::now();

        let mut note_ids: Vec<NoteId> = cards.iter().map(|c| c.note_id).collect();
        note_ids.sort_unstable();
        note_ids.dedup();

        let notes_fields: HashMap<NoteId, Vec<FieldContent>> = note_ids
            .into_par_iter()
            .map(|note_id| -> Result<(NoteId, Vec<FieldContent>), ReorderError> {
                let note = notes.get(&note_id).ok_or_else(|| {
                    ReorderError::Data(format!("Note {} not found", note_id))
                })?;
                let fields = field_languages.get(&note.model_id).ok_or_else(|| {
                    ReorderError::Configuration(format!(
                        "Note type {} of note {} is not part of the target",
                        note.model_id, note_id
                    ))
                })?;
                Ok((note_id, tokenize_note(note, fields, strategy, language_data, tokenizers)?))
            })
            .collect::<Result<_, _>>()?;

        let mut note_contributions: HashMap<NoteId, Vec<(CardId, f32)>> = HashMap::new();
        for card in cards.iter().filter(|c| c.has_been_reviewed()) {
            let is_leech = notes.get(&card.note_id).is_some_and(|n| n.is_leech());
            let contribution = familiarity::card_contribution(card, is_leech, settings);
            note_contributions.entry(card.note_id).or_default().push((card.id, contribution));
        }
        let note_contributions: HashMap<NoteId, Vec<(CardId, f32)>> = note_contributions
            .into_iter()
            .map(|(note_id, values)| (note_id, familiarity::devalue_same_note_cards(values)))
            .filter(|(_, values)| !values.is_empty())
            .collect();

        let mut segment_fields: BTreeMap<CorpusSegmentId, Vec<(NoteId, &FieldContent)>> =
            BTreeMap::new();
        for (note_id, fields) in &notes_fields {
            for field in fields {
                segment_fields.entry(field.segment_id.clone()).or_default().push((*note_id, field));
            }
        }

        let segments: BTreeMap<CorpusSegmentId, SegmentContentMetrics> = segment_fields
            .into_iter()
            .map(|(segment_id, fields)| {
                let lang_id = fields
                    .first()
                    .map(|(_, field)| field.lang_data_id.lang_id())
                    .unwrap_or_else(|| LangDataId::new(&segment_id).lang_id());
                let metrics = familiarity::build_segment_metrics(
                    segment_id.clone(),
                    lang_id,
                    &fields,
                    &note_contributions,
                    settings,
                );
                (segment_id, metrics)
            })
            .collect();

        info!(
            "Built corpus: {} notes, {} segment(s) ({:.1}s)",
            notes_fields.len(),
            segments.len(),
            start.elapsed().as_secs_f32()
        );

        Ok(Self { notes_fields, segments })
    }

    pub fn fields(&self, note_id: NoteId) -> &[FieldContent] {
        self.notes_fields.get(&note_id).map(|f| f.as_slice()).unwrap_or_default()
    }

    pub fn segment(&self, segment_id: &str) -> Option<&SegmentContentMetrics> {
        self.segments.get(segment_id)
    }
}
