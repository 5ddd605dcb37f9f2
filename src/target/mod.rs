pub mod definition;
pub mod list;
pub mod planner;

use std::{
    collections::{
        BTreeMap,
        HashMap,
        HashSet,
    },
    time::Instant,
};

use serde::{
    Deserialize,
    Serialize,
};
use tracing::{
    info,
    warn,
};

pub use definition::{
    TargetDefinition,
    TargetNote,
};
pub use list::TargetList;
pub use planner::{
    PlanOptions,
    ReorderPlan,
    ReorderResult,
    TargetReorderResult,
};

use crate::{
    collection::{
        Card,
        CardId,
        Collection,
        FieldWrite,
        Note,
        NoteId,
    },
    core::ReorderError,
    corpus::{
        FieldLanguage,
        FieldLanguages,
        TargetCorpusData,
    },
    dictionary::LanguageData,
    ranking::{
        note_fields::note_field_writes,
        CardRanker,
        CardWordData,
    },
    segmentation::Tokenizers,
};

/// Familiarity summary of one corpus segment, as kept in the reorder log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentStats {
    pub segment_id: String,
    pub lang_id: String,
    pub num_words_new: usize,
    pub num_words_reviewed: usize,
    pub num_words_mature: usize,
    pub familiarity_mean: f32,
    pub familiarity_median: f32,
    pub familiarity_max: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetStats {
    pub num_cards: usize,
    pub num_new_cards: usize,
    pub num_notes: usize,
    pub num_new_notes: usize,
    pub segments: Vec<SegmentStats>,
    /// Distinct mature words per language over all segments.
    pub mature_words_per_language: BTreeMap<String, usize>,
}

impl TargetStats {
    fn from_corpus(cards: &[Card], new_notes: &HashSet<NoteId>, corpus: &TargetCorpusData) -> Self {
        let segments = corpus
            .segments
            .values()
            .map(|segment| SegmentStats {
                segment_id: segment.segment_id.clone(),
                lang_id: segment.lang_id.to_string(),
                num_words_new: segment.num_new_words(),
                num_words_reviewed: segment.num_reviewed_words(),
                num_words_mature: segment.num_mature_words(),
                familiarity_mean: segment.familiarity_mean,
                familiarity_median: segment.familiarity_median,
                familiarity_max: segment.familiarity_max,
            })
            .collect();

        let mut mature_words: BTreeMap<String, HashSet<&str>> = BTreeMap::new();
        for segment in corpus.segments.values() {
            mature_words
                .entry(segment.lang_id.to_string())
                .or_default()
                .extend(segment.mature_words.iter().map(|w| w.as_str()));
        }

        Self {
            num_cards: cards.len(),
            num_new_cards: cards.iter().filter(|c| c.is_new()).count(),
            num_notes: corpus.notes_fields.len(),
            num_new_notes: new_notes.len(),
            segments,
            mature_words_per_language: mature_words
                .into_iter()
                .map(|(lang, words)| (lang, words.len()))
                .collect(),
        }
    }
}

/// Everything a target wants to change, computed without touching the collection.
#[derive(Debug, Clone, Default)]
pub struct TargetPlan {
    /// Cards to reposition, in their new order.
    pub sorted_card_ids: Vec<CardId>,
    pub field_writes: Vec<FieldWrite>,
    pub stats: TargetStats,
    pub warnings: Vec<String>,
}

/// Runs one target definition against a collection.
pub struct Target<'a> {
    pub definition: &'a TargetDefinition,
}

impl<'a> Target<'a> {
    pub fn new(definition: &'a TargetDefinition) -> Self {
        Self { definition }
    }

    /// Validation that needs the collection: decks, note types and fields must exist.
    fn field_languages(&self, collection: &dyn Collection) -> Result<FieldLanguages, ReorderError> {
        let name = self.definition.name();

        for deck in &self.definition.decks {
            if !collection.deck_exists(deck) {
                return Err(ReorderError::Configuration(format!(
                    "Deck '{}' defined in target {} not found",
                    deck, name
                )));
            }
        }

        let mut field_languages = FieldLanguages::new();
        for note in &self.definition.notes {
            let model = collection.model_by_name(&note.name).ok_or_else(|| {
                ReorderError::Configuration(format!(
                    "Note type '{}' defined in target {} does not exist",
                    note.name, name
                ))
            })?;
            let fields = note
                .fields
                .iter()
                .map(|(field_name, lang_data_id)| {
                    if !model.has_field(field_name) {
                        return Err(ReorderError::Configuration(format!(
                            "Field '{}' does not exist on note type '{}' (target {})",
                            field_name, note.name, name
                        )));
                    }
                    Ok(FieldLanguage {
                        field_name: field_name.clone(),
                        lang_data_id: lang_data_id.clone(),
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            field_languages.insert(model.id, fields);
        }
        Ok(field_languages)
    }

    fn find_cards(
        &self,
        collection: &dyn Collection,
        query: &str,
    ) -> Result<Vec<Card>, ReorderError> {
        Ok(collection
            .find_cards(query)?
            .into_iter()
            .filter_map(|id| collection.card(id).cloned())
            .collect())
    }

    /// Plans the new order of the target's queued new cards. Cards in `placed` belong to an
    /// earlier target and are left alone. Language data for the target must be loaded.
    pub fn plan(
        &self,
        collection: &dyn Collection,
        language_data: &LanguageData,
        tokenizers: &Tokenizers,
        placed: &HashSet<CardId>,
        with_field_writes: bool,
    ) -> Result<TargetPlan, ReorderError> {
        let start = Instant::now();
        let definition = self.definition;
        let field_languages = self.field_languages(collection)?;

        let cards = self.find_cards(collection, &definition.main_scope_query())?;
        if cards.is_empty() {
            return Err(ReorderError::Data(format!(
                "No cards found for target {}",
                definition.name()
            )));
        }

        let new_notes: HashSet<NoteId> =
            cards.iter().filter(|c| c.is_queued_new()).map(|c| c.note_id).collect();
        if new_notes.is_empty() {
            return Err(ReorderError::Data(format!(
                "Found no new cards in a target collection of {} cards",
                cards.len()
            )));
        }
        info!(
            "Found {} new card(s) in a target collection of {} cards",
            new_notes.len(),
            cards.len()
        );

        let notes: HashMap<NoteId, Note> = cards
            .iter()
            .filter_map(|c| collection.note(c.note_id).map(|n| (n.id, n.clone())))
            .collect();

        let corpus = TargetCorpusData::build(
            &cards,
            &notes,
            &field_languages,
            definition.segmentation,
            language_data,
            tokenizers,
            &definition.familiarity,
        )?;
        let stats = TargetStats::from_corpus(&cards, &new_notes, &corpus);

        let mut warnings = Vec::new();
        let reorder_scope: Vec<Card> = match definition.reorder_scope_query() {
            Some(query) => {
                let scoped = self.find_cards(collection, &query)?;
                if scoped.is_empty() {
                    return Err(ReorderError::Data("Reorder scope query yielded no results".into()));
                }
                if scoped.len() == cards.len() {
                    warnings.push(
                        "Reorder scope had no effect (same result as main scope)".to_string(),
                    );
                }
                scoped
            }
            None => cards.clone(),
        };

        let candidates: Vec<&Card> =
            reorder_scope.iter().filter(|c| c.is_queued_new() && !placed.contains(&c.id)).collect();
        if candidates.is_empty() {
            return Err(ReorderError::Data(format!(
                "No new cards left to reorder for target {}",
                definition.name()
            )));
        }

        let mut new_note_ids: Vec<NoteId> = new_notes.iter().copied().collect();
        new_note_ids.sort_unstable();

        let ranker =
            CardRanker::new(&corpus, language_data, &definition.weights, &definition.scoring);
        let rankings = ranker.rank_notes(&new_note_ids);
        let sorted_card_ids = ranker.sort_cards(&candidates, &rankings);

        let mut field_writes = Vec::new();
        if with_field_writes {
            let mut note_ids: Vec<&NoteId> = notes.keys().collect();
            note_ids.sort_unstable();
            for note_id in note_ids {
                let model = notes.get(note_id).and_then(|n| collection.model(n.model_id));
                let Some(model) = model else {
                    continue;
                };
                let ranking = rankings.notes.get(note_id);
                let writes = match rankings.word_data.get(note_id) {
                    Some(data) => note_field_writes(model, data, ranking)?,
                    None => {
                        let data = CardWordData::build(*note_id, language_data, &corpus);
                        note_field_writes(model, &data, ranking)?
                    }
                };
                field_writes.extend(writes);
            }
        }

        for warning in &warnings {
            warn!("Target {}: {}", definition.name(), warning);
        }
        info!(
            "Planned {} card(s) for target {} ({:.1}s)",
            sorted_card_ids.len(),
            definition.name(),
            start.elapsed().as_secs_f32()
        );

        Ok(TargetPlan { sorted_card_ids, field_writes, stats, warnings })
    }
}
