use std::{
    collections::{
        BTreeMap,
        BTreeSet,
        HashMap,
        HashSet,
    },
    fs,
    path::Path,
};

use serde::{
    Deserialize,
    Serialize,
};
use tracing::debug;

use super::{
    query::{
        parse_query,
        SearchContext,
    },
    types::{
        Card,
        CardId,
        FieldWrite,
        ModelId,
        Note,
        NoteId,
        NoteModel,
        WritePolicy,
    },
    Collection,
};
use crate::core::ReorderError;

/// Serialized form of a collection, as read from and written to JSON.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollectionSnapshot {
    #[serde(default)]
    pub decks: Vec<String>,
    pub models: Vec<NoteModel>,
    pub notes: Vec<Note>,
    pub cards: Vec<Card>,
}

/// A complete collection held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCollection {
    decks: BTreeSet<String>,
    models: HashMap<ModelId, NoteModel>,
    notes: HashMap<NoteId, Note>,
    cards: BTreeMap<CardId, Card>,
    locked_cards: HashSet<CardId>,
}

impl InMemoryCollection {
    pub fn from_snapshot(snapshot: CollectionSnapshot) -> Self {
        let mut decks: BTreeSet<String> = snapshot.decks.into_iter().collect();
        decks.extend(snapshot.cards.iter().map(|c| c.deck.clone()));

        Self {
            decks,
            models: snapshot.models.into_iter().map(|m| (m.id, m)).collect(),
            notes: snapshot.notes.into_iter().map(|n| (n.id, n)).collect(),
            cards: snapshot.cards.into_iter().map(|c| (c.id, c)).collect(),
            locked_cards: HashSet::new(),
        }
    }

    pub fn load(path: &Path) -> Result<Self, ReorderError> {
        let json = fs::read_to_string(path)?;
        let snapshot: CollectionSnapshot = serde_json::from_str(&json)?;
        Ok(Self::from_snapshot(snapshot))
    }

    pub fn save(&self, path: &Path) -> Result<(), ReorderError> {
        let json = serde_json::to_string_pretty(&self.to_snapshot())?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn to_snapshot(&self) -> CollectionSnapshot {
        let mut models: Vec<NoteModel> = self.models.values().cloned().collect();
        models.sort_by_key(|m| m.id);
        let mut notes: Vec<Note> = self.notes.values().cloned().collect();
        notes.sort_by_key(|n| n.id);

        CollectionSnapshot {
            decks: self.decks.iter().cloned().collect(),
            models,
            notes,
            cards: self.cards.values().cloned().collect(),
        }
    }

    pub fn add_model(&mut self, model: NoteModel) {
        self.models.insert(model.id, model);
    }

    pub fn add_note(&mut self, note: Note) {
        self.notes.insert(note.id, note);
    }

    pub fn add_card(&mut self, card: Card) {
        self.decks.insert(card.deck.clone());
        self.cards.insert(card.id, card);
    }

    /// Refuse any reposition touching this card.
    pub fn lock_card(&mut self, card_id: CardId) {
        self.locked_cards.insert(card_id);
    }

    /// Queued new cards, front of the queue first.
    pub fn new_queue(&self) -> Vec<CardId> {
        let mut queue: Vec<&Card> = self.cards.values().filter(|c| c.is_queued_new()).collect();
        queue.sort_by_key(|c| (c.due, c.id));
        queue.into_iter().map(|c| c.id).collect()
    }
}

impl Collection for InMemoryCollection {
    fn find_cards(&self, query: &str) -> Result<Vec<CardId>, ReorderError> {
        let node = parse_query(query)?;

        let mut found: Vec<&Card> = self
            .cards
            .values()
            .filter(|card| {
                self.notes.get(&card.note_id).is_some_and(|note| {
                    let ctx = SearchContext { card, note, model: self.models.get(&note.model_id) };
                    node.matches(&ctx)
                })
            })
            .collect();
        found.sort_by_key(|c| (c.due, c.id));

        debug!("Query '{}' matched {} card(s)", query, found.len());
        Ok(found.into_iter().map(|c| c.id).collect())
    }

    fn card(&self, card_id: CardId) -> Option<&Card> {
        self.cards.get(&card_id)
    }

    fn note(&self, note_id: NoteId) -> Option<&Note> {
        self.notes.get(&note_id)
    }

    fn model(&self, model_id: ModelId) -> Option<&NoteModel> {
        self.models.get(&model_id)
    }

    fn model_by_name(&self, name: &str) -> Option<&NoteModel> {
        self.models.values().find(|m| m.name.eq_ignore_ascii_case(name))
    }

    fn deck_exists(&self, name: &str) -> bool {
        let prefix = format!("{}::", name.to_lowercase());
        self.decks.iter().any(|d| {
            let d = d.to_lowercase();
            d == name.to_lowercase() || d.starts_with(&prefix)
        })
    }

    fn reposition_new_cards(
        &mut self,
        card_ids: &[CardId],
        starting_from: i64,
        shift_existing: bool,
    ) -> Result<usize, ReorderError> {
        if let Some(locked) = card_ids.iter().find(|id| self.locked_cards.contains(*id)) {
            return Err(ReorderError::Commit(format!("Card {} can not be repositioned", locked)));
        }
        if let Some(missing) = card_ids.iter().find(|id| !self.cards.contains_key(*id)) {
            return Err(ReorderError::Commit(format!("Card {} does not exist", missing)));
        }

        let moving: Vec<CardId> = card_ids
            .iter()
            .copied()
            .filter(|id| self.cards.get(id).is_some_and(|c| c.is_new()))
            .collect();
        let moving_set: HashSet<CardId> = moving.iter().copied().collect();

        if shift_existing {
            let shift_by = moving.len() as i64;
            for card in self.cards.values_mut() {
                if card.is_new() && !moving_set.contains(&card.id) && card.due >= starting_from {
                    card.due += shift_by;
                }
            }
        }

        for (offset, card_id) in moving.iter().enumerate() {
            if let Some(card) = self.cards.get_mut(card_id) {
                card.due = starting_from + offset as i64;
            }
        }

        Ok(moving.len())
    }

    fn update_note_fields(&mut self, writes: &[FieldWrite]) -> Result<usize, ReorderError> {
        let mut changed = 0;
        for write in writes {
            let Some(note) = self.notes.get_mut(&write.note_id) else {
                return Err(ReorderError::Commit(format!("Note {} does not exist", write.note_id)));
            };
            let Some(current) = note.field_mut(&write.field) else {
                continue;
            };
            let allowed = match write.policy {
                WritePolicy::Live => true,
                WritePolicy::SetOnce => current.trim().is_empty(),
            };
            if allowed && *current != write.value {
                *current = write.value.clone();
                changed += 1;
            }
        }
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::types::{
        CardType,
        NoteField,
    };

    fn new_card(id: CardId, due: i64) -> Card {
        Card {
            id,
            note_id: id,
            deck: "Vocab".into(),
            ordinal: 0,
            card_type: CardType::New,
            suspended: false,
            due,
            review: None,
        }
    }

    fn collection(cards: usize) -> InMemoryCollection {
        let mut col = InMemoryCollection::default();
        col.add_model(NoteModel {
            id: 1,
            name: "Basic".into(),
            fields: vec!["Front".into(), "fm_seen_words".into()],
        });
        for i in 0..cards as u64 {
            col.add_note(Note {
                id: i,
                model_id: 1,
                fields: vec![
                    NoteField { name: "Front".into(), value: format!("word{}", i) },
                    NoteField { name: "fm_seen_words".into(), value: String::new() },
                ],
                tags: vec![],
            });
            col.add_card(new_card(i, i as i64));
        }
        col
    }

    #[test]
    fn test_reposition_with_shift() {
        let mut col = collection(5);
        let moved = col.reposition_new_cards(&[4, 3], 1, true).unwrap();
        assert_eq!(moved, 2);
        assert_eq!(col.new_queue(), vec![0, 4, 3, 1, 2]);
        assert_eq!(col.card(4).unwrap().due, 1);
        assert_eq!(col.card(1).unwrap().due, 3);
    }

    #[test]
    fn test_reposition_without_shift() {
        let mut col = collection(3);
        col.reposition_new_cards(&[2], 0, false).unwrap();
        assert_eq!(col.card(2).unwrap().due, 0);
        assert_eq!(col.card(0).unwrap().due, 0);
        assert_eq!(col.card(1).unwrap().due, 1);
    }

    #[test]
    fn test_locked_card_rejects_whole_call() {
        let mut col = collection(3);
        col.lock_card(1);
        let err = col.reposition_new_cards(&[2, 1], 0, true).unwrap_err();
        assert!(matches!(err, ReorderError::Commit(_)));
        assert_eq!(col.card(2).unwrap().due, 2);
    }

    #[test]
    fn test_find_cards_and_decks() {
        let col = collection(3);
        assert_eq!(col.find_cards("deck:Vocab").unwrap(), vec![0, 1, 2]);
        assert_eq!(col.find_cards("word1").unwrap(), vec![1]);
        assert!(col.deck_exists("vocab"));
        assert!(!col.deck_exists("Other"));
        assert!(col.find_cards("deck:(").is_err());
    }

    #[test]
    fn test_field_write_policies() {
        let mut col = collection(1);
        let live = FieldWrite {
            note_id: 0,
            field: "fm_seen_words".into(),
            value: "a, b".into(),
            policy: WritePolicy::SetOnce,
        };
        assert_eq!(col.update_note_fields(&[live.clone()]).unwrap(), 1);

        let again = FieldWrite { value: "c".into(), ..live.clone() };
        assert_eq!(col.update_note_fields(&[again.clone()]).unwrap(), 0);
        assert_eq!(col.note(0).unwrap().field("fm_seen_words"), Some("a, b"));

        let overwrite = FieldWrite { policy: WritePolicy::Live, ..again };
        assert_eq!(col.update_note_fields(&[overwrite]).unwrap(), 1);
        assert_eq!(col.note(0).unwrap().field("fm_seen_words"), Some("c"));

        let missing_field = FieldWrite { field: "Nope".into(), ..live };
        assert_eq!(col.update_note_fields(&[missing_field]).unwrap(), 0);
    }
}
