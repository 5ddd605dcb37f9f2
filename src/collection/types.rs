use serde::{
    Deserialize,
    Serialize,
};

pub type CardId = u64;
pub type NoteId = u64;
pub type ModelId = u64;

pub const LEECH_TAG: &str = "leech";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardType {
    #[default]
    New,
    Learning,
    Review,
    Relearning,
}

/// Latest scheduling state of a reviewed card.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReviewStats {
    /// Days.
    pub interval: u32,
    /// Permille, 2500 is the usual starting ease.
    pub ease_factor: u32,
    pub reps: u32,
    /// Days past the due date; negative while the card is not due yet.
    #[serde(default = "not_due")]
    pub days_overdue: i32,
}

fn not_due() -> i32 {
    -1
}

impl ReviewStats {
    pub fn is_due(&self) -> bool {
        self.days_overdue >= 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub id: CardId,
    pub note_id: NoteId,
    pub deck: String,
    /// Zero-based template index.
    #[serde(default)]
    pub ordinal: u32,
    #[serde(default)]
    pub card_type: CardType,
    #[serde(default)]
    pub suspended: bool,
    /// Position in the new card queue. Only meaningful for new cards.
    #[serde(default)]
    pub due: i64,
    #[serde(default)]
    pub review: Option<ReviewStats>,
}

impl Card {
    pub fn is_new(&self) -> bool {
        self.card_type == CardType::New
    }

    /// New and not suspended, so it sits in the new queue.
    pub fn is_queued_new(&self) -> bool {
        self.is_new() && !self.suspended
    }

    pub fn has_been_reviewed(&self) -> bool {
        !self.is_new() && self.review.is_some_and(|r| r.reps > 0 && r.interval > 0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteField {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
    pub model_id: ModelId,
    pub fields: Vec<NoteField>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Note {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.iter().find(|f| f.name == name).map(|f| f.value.as_str())
    }

    pub fn field_mut(&mut self, name: &str) -> Option<&mut String> {
        self.fields.iter_mut().find(|f| f.name == name).map(|f| &mut f.value)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }

    pub fn is_leech(&self) -> bool {
        self.has_tag(LEECH_TAG)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteModel {
    pub id: ModelId,
    pub name: String,
    pub fields: Vec<String>,
}

impl NoteModel {
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f == name)
    }
}

/// How the collection should apply a computed field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WritePolicy {
    /// Overwrite on every reorder.
    Live,
    /// Only fill the field while it is empty.
    SetOnce,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldWrite {
    pub note_id: NoteId,
    pub field: String,
    pub value: String,
    pub policy: WritePolicy,
}
