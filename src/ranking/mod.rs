pub mod dispersion;
pub mod factors;
pub mod metrics;
pub mod note_fields;
pub mod ranker;
pub mod scoring;

pub use factors::{
    RankingFactor,
    RankingWeights,
};
pub use metrics::{
    CardWordData,
    FieldWordData,
    WordScores,
};
pub use ranker::{
    CardRanker,
    NoteRanking,
    NoteRankings,
};
pub use scoring::{
    ScoringParams,
    SweetspotPoint,
};
