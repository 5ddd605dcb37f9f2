pub mod memory;
pub mod query;
pub mod types;

pub use memory::{
    CollectionSnapshot,
    InMemoryCollection,
};
pub use types::{
    Card,
    CardId,
    CardType,
    FieldWrite,
    ModelId,
    Note,
    NoteField,
    NoteId,
    NoteModel,
    ReviewStats,
    WritePolicy,
};

use crate::core::ReorderError;

/// The host card store. Reads happen while planning; the two mutating calls are only made
/// once a plan is complete.
pub trait Collection {
    /// Cards matching a search query, ordered by their current new-queue position.
    fn find_cards(&self, query: &str) -> Result<Vec<CardId>, ReorderError>;

    fn card(&self, card_id: CardId) -> Option<&Card>;

    fn note(&self, note_id: NoteId) -> Option<&Note>;

    fn model(&self, model_id: ModelId) -> Option<&NoteModel>;

    fn model_by_name(&self, name: &str) -> Option<&NoteModel>;

    fn deck_exists(&self, name: &str) -> bool;

    /// Gives `card_ids` the positions `starting_from..`, in order. With `shift_existing`, other
    /// new cards at or after `starting_from` move back to make room.
    fn reposition_new_cards(
        &mut self,
        card_ids: &[CardId],
        starting_from: i64,
        shift_existing: bool,
    ) -> Result<usize, ReorderError>;

    /// Applies field writes honoring their policy. Returns the number of fields changed.
    fn update_note_fields(&mut self, writes: &[FieldWrite]) -> Result<usize, ReorderError>;
}
