use std::{
    collections::HashSet,
    time::Instant,
};

use serde::Serialize;
use tracing::{
    error,
    info,
    warn,
};

use super::{
    definition::TargetDefinition,
    list::TargetList,
    Target,
    TargetPlan,
    TargetStats,
};
use crate::{
    collection::{
        CardId,
        Collection,
        NoteId,
    },
    core::ReorderError,
    dictionary::LanguageData,
    segmentation::Tokenizers,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanOptions {
    /// Move new cards outside the reordered set back to make room.
    pub shift_existing: bool,
    pub update_note_fields: bool,
}

impl Default for PlanOptions {
    fn default() -> Self {
        Self { shift_existing: true, update_note_fields: true }
    }
}

#[derive(Debug)]
enum PlanOutcome {
    Planned(TargetPlan),
    /// Nothing to do, reported as a warning.
    NoOp(String),
    Failed(String),
}

#[derive(Debug)]
struct PlannedTarget {
    name: String,
    id: Option<String>,
    starting_from: i64,
    /// The cards already sit in the planned order at the planned positions.
    unchanged: bool,
    outcome: PlanOutcome,
}

/// What happened to one target.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TargetReorderResult {
    pub target_name: String,
    pub id: Option<String>,
    pub success: bool,
    pub error: Option<String>,
    pub warnings: Vec<String>,
    pub sorted_card_ids: Vec<CardId>,
    pub starting_from: i64,
    pub num_cards_repositioned: usize,
    pub num_fields_updated: usize,
    pub stats: Option<TargetStats>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReorderResult {
    pub targets: Vec<TargetReorderResult>,
}

impl ReorderResult {
    pub fn num_cards_repositioned(&self) -> usize {
        self.targets.iter().map(|t| t.num_cards_repositioned).sum()
    }

    pub fn num_failed(&self) -> usize {
        self.targets.iter().filter(|t| !t.success).count()
    }
}

/// Positions and field values for every target, computed before anything is written. Dropping
/// a plan leaves the collection untouched.
#[derive(Debug)]
pub struct ReorderPlan {
    targets: Vec<PlannedTarget>,
    shift_existing: bool,
}

fn already_in_place(collection: &dyn Collection, card_ids: &[CardId], starting_from: i64) -> bool {
    card_ids
        .iter()
        .enumerate()
        .all(|(offset, id)| {
            collection.card(*id).is_some_and(|c| c.due == starting_from + offset as i64)
        })
}

impl ReorderPlan {
    /// Plans the targets in list order. Cards placed by one target are excluded from the ones
    /// after it, and each target starts where the previous one ended.
    pub fn build(
        list: &TargetList,
        collection: &dyn Collection,
        language_data: &mut LanguageData,
        tokenizers: &Tokenizers,
        options: PlanOptions,
    ) -> Self {
        let start = Instant::now();
        let mut placed: HashSet<CardId> = HashSet::new();
        let mut written_notes: HashSet<NoteId> = HashSet::new();
        let mut starting_from: i64 = 0;
        let mut earlier_moves = false;
        let mut targets = Vec::with_capacity(list.len());

        for (index, entry) in list.entries.iter().enumerate() {
            let (name, id) = match entry {
                Ok(definition) => (definition.name(), definition.id.clone()),
                Err(_) => (format!("#{}", index + 1), None),
            };
            let outcome = match entry {
                Ok(definition) => plan_target(
                    definition,
                    collection,
                    language_data,
                    tokenizers,
                    &placed,
                    options,
                ),
                Err(err) => PlanOutcome::Failed(err.to_string()),
            };

            let mut planned = PlannedTarget { name, id, starting_from, unchanged: false, outcome };

            if let PlanOutcome::Planned(plan) = &mut planned.outcome {
                plan.field_writes.retain(|w| !written_notes.contains(&w.note_id));
                written_notes.extend(plan.field_writes.iter().map(|w| w.note_id));

                planned.unchanged = !earlier_moves
                    && already_in_place(collection, &plan.sorted_card_ids, starting_from);
                earlier_moves |= !planned.unchanged;

                placed.extend(plan.sorted_card_ids.iter().copied());
                starting_from += plan.sorted_card_ids.len() as i64;
            }
            targets.push(planned);
        }

        info!("Planned {} target(s) ({:.1}s)", targets.len(), start.elapsed().as_secs_f32());
        Self { targets, shift_existing: options.shift_existing }
    }

    fn result(target: &PlannedTarget) -> TargetReorderResult {
        let mut result = TargetReorderResult {
            target_name: target.name.clone(),
            id: target.id.clone(),
            starting_from: target.starting_from,
            ..Default::default()
        };
        match &target.outcome {
            PlanOutcome::Planned(plan) => {
                result.success = true;
                result.warnings = plan.warnings.clone();
                result.sorted_card_ids = plan.sorted_card_ids.clone();
                result.stats = Some(plan.stats.clone());
            }
            PlanOutcome::NoOp(warning) => {
                result.success = true;
                result.warnings.push(warning.clone());
            }
            PlanOutcome::Failed(err) => {
                result.error = Some(err.clone());
            }
        }
        result
    }

    /// What `commit` would do, without doing it.
    pub fn preview(&self) -> ReorderResult {
        let targets = self
            .targets
            .iter()
            .map(|target| {
                let mut result = Self::result(target);
                if let PlanOutcome::Planned(plan) = &target.outcome {
                    if !target.unchanged {
                        result.num_cards_repositioned = plan.sorted_card_ids.len();
                    }
                    result.num_fields_updated = plan.field_writes.len();
                }
                result
            })
            .collect();
        ReorderResult { targets }
    }

    /// Writes positions and fields target by target. A rejected write stops that target only;
    /// targets committed before it stay committed.
    pub fn commit(self, collection: &mut dyn Collection) -> ReorderResult {
        let mut results = Vec::with_capacity(self.targets.len());

        for target in &self.targets {
            let mut result = Self::result(target);
            if let PlanOutcome::Planned(plan) = &target.outcome {
                let start = Instant::now();
                match commit_target(collection, target, plan, self.shift_existing) {
                    Ok((repositioned, fields)) => {
                        result.num_cards_repositioned = repositioned;
                        result.num_fields_updated = fields;
                        info!(
                            "Committed target {}: {} card(s) repositioned, \
                             {} field(s) updated ({:.1}s)",
                            target.name,
                            repositioned,
                            fields,
                            start.elapsed().as_secs_f32()
                        );
                    }
                    Err(err) => {
                        error!("Target {}: {}", target.name, err);
                        result.success = false;
                        result.error = Some(err.to_string());
                    }
                }
            }
            results.push(result);
        }

        ReorderResult { targets: results }
    }
}

fn plan_target(
    definition: &TargetDefinition,
    collection: &dyn Collection,
    language_data: &mut LanguageData,
    tokenizers: &Tokenizers,
    placed: &HashSet<CardId>,
    options: PlanOptions,
) -> PlanOutcome {
    let planned = language_data.load(&definition.lang_data_ids()).and_then(|_| {
        Target::new(definition).plan(
            collection,
            language_data,
            tokenizers,
            placed,
            options.update_note_fields,
        )
    });
    match planned {
        Ok(plan) => PlanOutcome::Planned(plan),
        Err(ReorderError::Data(message)) => {
            warn!("Target {}: {}", definition.name(), message);
            PlanOutcome::NoOp(message)
        }
        Err(err) => {
            error!("Target {}: {}", definition.name(), err);
            PlanOutcome::Failed(err.to_string())
        }
    }
}

fn commit_target(
    collection: &mut dyn Collection,
    target: &PlannedTarget,
    plan: &TargetPlan,
    shift_existing: bool,
) -> Result<(usize, usize), ReorderError> {
    let repositioned = if target.unchanged {
        info!("Target {} is already in order", target.name);
        0
    } else {
        collection.reposition_new_cards(
            &plan.sorted_card_ids,
            target.starting_from,
            shift_existing,
        )?
    };
    let fields = if plan.field_writes.is_empty() {
        0
    } else {
        collection.update_note_fields(&plan.field_writes)?
    };
    Ok((repositioned, fields))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use serde_json::json;

    use super::*;
    use crate::{
        collection::{
            Card,
            CardType,
            InMemoryCollection,
            Note,
            NoteField,
            NoteModel,
            ReviewStats,
        },
        dictionary::{
            language_data::LanguageLists,
            LangDataId,
            WordFrequencyIndex,
        },
        ranking::note_fields::{
            FOCUS_WORDS,
            SEEN_WORDS,
        },
    };

    const MATURE: ReviewStats =
        ReviewStats { interval: 300, ease_factor: 2500, reps: 12, days_overdue: -1 };

    struct Fixture {
        collection: InMemoryCollection,
        next_id: u64,
    }

    impl Fixture {
        fn new() -> Self {
            let mut collection = InMemoryCollection::default();
            collection.add_model(NoteModel {
                id: 1,
                name: "Basic".into(),
                fields: vec!["EN".into(), FOCUS_WORDS.into(), SEEN_WORDS.into()],
            });
            Self { collection, next_id: 1 }
        }

        fn note(
            &mut self,
            deck: &str,
            text: &str,
            tags: &[&str],
            card: impl FnOnce(&mut Card),
        ) -> CardId {
            let id = self.next_id;
            self.next_id += 1;
            self.collection.add_note(Note {
                id,
                model_id: 1,
                fields: vec![
                    NoteField { name: "EN".into(), value: text.into() },
                    NoteField { name: FOCUS_WORDS.into(), value: String::new() },
                    NoteField { name: SEEN_WORDS.into(), value: String::new() },
                ],
                tags: tags.iter().map(|t| t.to_string()).collect(),
            });
            let mut new_card = Card {
                id: id * 10,
                note_id: id,
                deck: deck.into(),
                ordinal: 0,
                card_type: CardType::New,
                suspended: false,
                due: id as i64,
                review: None,
            };
            card(&mut new_card);
            self.collection.add_card(new_card);
            new_card_id(id)
        }

        fn new_note(&mut self, deck: &str, text: &str) -> CardId {
            self.note(deck, text, &[], |_| {})
        }

        fn reviewed_note(&mut self, deck: &str, text: &str) -> CardId {
            self.note(deck, text, &[], |card| {
                card.card_type = CardType::Review;
                card.review = Some(MATURE);
            })
        }
    }

    fn new_card_id(note_id: u64) -> CardId {
        note_id * 10
    }

    fn language_data(ranked: &[&str]) -> LanguageData {
        let frequency =
            WordFrequencyIndex::from_ranked_lists(&[ranked.to_vec()], &Default::default());
        let mut languages = HashMap::new();
        let lists = LanguageLists { frequency, ignored: Default::default() };
        languages.insert(LangDataId::new("en"), lists);
        LanguageData::in_memory(languages)
    }

    fn target(deck: &str, extra: serde_json::Value) -> serde_json::Value {
        let mut value = json!({
            "deck": deck,
            "notes": [{ "name": "Basic", "fields": { "EN": "en" } }],
        });
        if let (Some(object), Some(extra)) = (value.as_object_mut(), extra.as_object()) {
            object.extend(extra.clone());
        }
        value
    }

    fn run(
        fixture: &mut Fixture,
        targets: serde_json::Value,
        data: &mut LanguageData,
        options: PlanOptions,
    ) -> ReorderResult {
        let list = TargetList::from_value(&targets).unwrap();
        let plan =
            ReorderPlan::build(&list, &fixture.collection, data, &Tokenizers::new(), options);
        plan.commit(&mut fixture.collection)
    }

    #[test]
    fn test_single_higher_frequency_word_first() {
        let mut fixture = Fixture::new();
        let a = fixture.new_note("Deck", "hello world");
        let b = fixture.new_note("Deck", "hello");
        let mut data = language_data(&["hello", "world"]);

        let weights = json!({ "ranking_factors": { "word_frequency": 1 } });
        let targets = json!([target("Deck", weights)]);
        let result = run(&mut fixture, targets, &mut data, PlanOptions::default());

        assert!(result.targets[0].success);
        assert_eq!(result.targets[0].sorted_card_ids, vec![b, a]);
        assert_eq!(fixture.collection.new_queue(), vec![b, a]);
        assert_eq!(result.num_cards_repositioned(), 2);
    }

    #[test]
    fn test_one_focus_word_beats_zero_and_three() {
        let mut fixture = Fixture::new();
        fixture.reviewed_note("Deck", "sun moon");
        fixture.reviewed_note("Deck", "sun moon");
        let zero = fixture.new_note("Deck", "sun moon");
        let three = fixture.new_note("Deck", "star comet planet");
        let one = fixture.new_note("Deck", "sun moon star");
        let mut data = language_data(&["sun", "moon", "star", "comet", "planet"]);

        let weights = json!({ "ranking_factors": { "ideal_focus_word_count": 1 } });
        let targets = json!([target("Deck", weights)]);
        let result = run(&mut fixture, targets, &mut data, PlanOptions::default());

        let order = &result.targets[0].sorted_card_ids;
        assert_eq!(order[0], one);
        assert!(order.contains(&zero) && order.contains(&three));

        let stats = result.targets[0].stats.as_ref().unwrap();
        assert_eq!(stats.mature_words_per_language["en"], 2);
        assert_eq!(stats.num_new_notes, 3);

        let note = fixture.collection.note(5).unwrap();
        assert_eq!(note.field(FOCUS_WORDS), Some("star"));
        assert_eq!(note.field(SEEN_WORDS), Some("sun, moon"));
    }

    #[test]
    fn test_suspended_leech_counts_as_unseen() {
        let mut fixture = Fixture::new();
        fixture.note("Deck", "ghost", &["leech"], |card| {
            card.card_type = CardType::Review;
            card.suspended = true;
            card.review = Some(MATURE);
        });
        let ghost = fixture.new_note("Deck", "ghost");
        let other = fixture.new_note("Deck", "other");
        let mut data = language_data(&["ghost", "other"]);

        let targets = json!([target(
            "Deck",
            json!({ "ranking_factors": { "familiarity": 1 }, "suspended_leech_card_value": 0.0 })
        )]);
        let result = run(&mut fixture, targets, &mut data, PlanOptions::default());

        let stats = result.targets[0].stats.as_ref().unwrap();
        assert_eq!(stats.segments[0].num_words_reviewed, 0);
        assert_eq!(result.targets[0].sorted_card_ids, vec![ghost, other]);
    }

    #[test]
    fn test_second_run_changes_nothing() {
        let mut fixture = Fixture::new();
        fixture.reviewed_note("Deck", "the cat");
        fixture.new_note("Deck", "rare words here");
        fixture.new_note("Deck", "the dog");
        fixture.new_note("Deck", "the cat sat");
        let mut data = language_data(&["the", "cat", "dog", "sat", "here", "words", "rare"]);

        let targets = json!([target("Deck", json!({}))]);
        let first = run(&mut fixture, targets.clone(), &mut data, PlanOptions::default());
        let queue = fixture.collection.new_queue();
        let second = run(&mut fixture, targets, &mut data, PlanOptions::default());

        assert_eq!(first.targets[0].sorted_card_ids, second.targets[0].sorted_card_ids);
        assert_eq!(fixture.collection.new_queue(), queue);
        assert_eq!(second.num_cards_repositioned(), 0);
        assert_eq!(second.targets[0].num_fields_updated, 0);
    }

    #[test]
    fn test_targets_follow_each_other() {
        let mut fixture = Fixture::new();
        let spanish_rare = fixture.new_note("Spanish", "rare");
        let spanish_common = fixture.new_note("Spanish", "common");
        let latin = fixture.new_note("Latin", "common");
        let mut data = language_data(&["common", "rare"]);

        let frequency = json!({ "ranking_factors": { "word_frequency": 1 } });
        let targets = json!([
            target("Latin", frequency.clone()),
            json!({ "deck": "Missing", "notes": [] }),
            target("Spanish", frequency),
        ]);
        let result = run(&mut fixture, targets, &mut data, PlanOptions::default());

        assert!(result.targets[0].success);
        assert!(!result.targets[1].success);
        assert!(result.targets[2].success);
        assert_eq!(result.targets[2].starting_from, 1);
        assert_eq!(fixture.collection.new_queue(), vec![latin, spanish_common, spanish_rare]);
    }

    #[test]
    fn test_reorder_scope_and_no_op_targets() {
        let mut fixture = Fixture::new();
        let tagged = fixture.note("Deck", "rare", &["focus"], |_| {});
        let plain = fixture.new_note("Deck", "common");
        let mut data = language_data(&["common", "rare"]);

        let targets = json!([
            target("Deck", json!({ "reorder_scope_query": "tag:focus" })),
            target("Deck", json!({ "reorder_scope_query": "tag:nothing" })),
        ]);
        let options = PlanOptions { shift_existing: false, update_note_fields: false };
        let result = run(&mut fixture, targets, &mut data, options);

        assert_eq!(result.targets[0].sorted_card_ids, vec![tagged]);
        assert!(result.targets[1].success);
        assert!(result.targets[1].warnings[0].contains("no results"));
        assert_eq!(fixture.collection.card(tagged).unwrap().due, 0);
        assert_eq!(fixture.collection.card(plain).unwrap().due, 2);
        assert_eq!(result.targets[0].num_fields_updated, 0);
    }

    #[test]
    fn test_missing_language_fails_only_its_target() {
        let mut fixture = Fixture::new();
        fixture.new_note("Deck", "hello");
        let mut data = language_data(&["hello"]);

        let other_language = json!({
            "deck": "Deck",
            "notes": [{ "name": "Basic", "fields": { "EN": "de" } }],
        });
        let targets = json!([other_language, target("Deck", json!({}))]);
        let list = TargetList::from_value(&targets).unwrap();
        let plan = ReorderPlan::build(
            &list,
            &fixture.collection,
            &mut data,
            &Tokenizers::new(),
            PlanOptions::default(),
        );
        let preview = plan.preview();

        assert!(preview.targets[0].error.as_ref().unwrap().contains("language data id"));
        assert!(preview.targets[1].success);
        assert_eq!(preview.targets[1].starting_from, 0);
        assert_eq!(fixture.collection.card(new_card_id(1)).unwrap().due, 1);
    }

    #[test]
    fn test_rejected_write_fails_target_but_keeps_earlier_ones() {
        let mut fixture = Fixture::new();
        let first = fixture.new_note("First", "hello");
        let second = fixture.new_note("Second", "hello");
        fixture.collection.lock_card(second);
        let mut data = language_data(&["hello"]);

        let targets = json!([target("First", json!({})), target("Second", json!({}))]);
        let result = run(&mut fixture, targets, &mut data, PlanOptions::default());

        assert!(result.targets[0].success);
        assert_eq!(fixture.collection.card(first).unwrap().due, 0);
        assert!(!result.targets[1].success);
        assert!(result.targets[1].error.as_ref().unwrap().contains("can not be repositioned"));
        assert_eq!(result.num_failed(), 1);
    }
}
