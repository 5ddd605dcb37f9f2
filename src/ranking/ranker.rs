use std::{
    collections::{
        BTreeMap,
        HashMap,
    },
    time::Instant,
};

use rayon::iter::{
    IntoParallelRefIterator,
    ParallelIterator,
};
use tracing::{
    info,
    warn,
};

use super::{
    dispersion::disperse,
    factors::{
        RankingFactor,
        RankingWeights,
    },
    metrics::CardWordData,
    scoring::{
        factor_score,
        ScoringParams,
    },
};
use crate::{
    collection::{
        Card,
        CardId,
        NoteId,
    },
    core::utils::standardize,
    corpus::TargetCorpusData,
    dictionary::LanguageData,
    segmentation::WordToken,
};

/// Rank of one note plus the factor breakdown behind it.
#[derive(Debug, Clone, Default)]
pub struct NoteRanking {
    pub rank: f32,
    /// Factor values before normalization.
    pub factor_scores: BTreeMap<RankingFactor, f32>,
    /// Values after standardization across the ranked notes.
    pub normalized_scores: BTreeMap<RankingFactor, f32>,
    /// Word that keys dispersion, set for notes that take part in it.
    pub dispersion_key: Option<WordToken>,
}

#[derive(Debug, Default)]
pub struct NoteRankings {
    pub notes: HashMap<NoteId, NoteRanking>,
    pub word_data: HashMap<NoteId, CardWordData>,
}

impl NoteRankings {
    pub fn rank(&self, note_id: NoteId) -> f32 {
        self.notes.get(&note_id).map(|n| n.rank).unwrap_or(0.0)
    }
}

/// Turns a target's corpus into one rank per note.
pub struct CardRanker<'a> {
    corpus: &'a TargetCorpusData,
    language_data: &'a LanguageData,
    weights: &'a RankingWeights,
    params: &'a ScoringParams,
}

impl<'a> CardRanker<'a> {
    pub fn new(
        corpus: &'a TargetCorpusData,
        language_data: &'a LanguageData,
        weights: &'a RankingWeights,
        params: &'a ScoringParams,
    ) -> Self {
        Self { corpus, language_data, weights, params }
    }

    fn raw_scores(
        &self,
        data: &CardWordData,
        factors: &[RankingFactor],
    ) -> BTreeMap<RankingFactor, f32> {
        factors
            .iter()
            .map(|factor| {
                let value = factor_score(*factor, data, self.params).unwrap_or_else(|err| {
                    warn!("{}", err);
                    0.0
                });
                (*factor, value)
            })
            .collect()
    }

    pub fn rank_notes(&self, note_ids: &[NoteId]) -> NoteRankings {
        let start = Instant::now();

        let enabled = self.weights.enabled();
        let mut factors: Vec<RankingFactor> = enabled.iter().map(|(f, _)| *f).collect();
        if self.weights.dispersion_enabled() {
            factors.push(RankingFactor::ProperIntroductionDispersed);
        }

        let scored: Vec<(NoteId, CardWordData, BTreeMap<RankingFactor, f32>)> = note_ids
            .par_iter()
            .map(|note_id| {
                let data = CardWordData::build(*note_id, self.language_data, self.corpus);
                let scores = self.raw_scores(&data, &factors);
                (*note_id, data, scores)
            })
            .collect();

        let mut normalized: Vec<BTreeMap<RankingFactor, f32>> = vec![BTreeMap::new(); scored.len()];
        for (factor, _) in &enabled {
            let values: Vec<f32> = scored
                .iter()
                .map(|(_, _, scores)| scores.get(factor).copied().unwrap_or(0.0))
                .collect();
            let standardized = standardize(&values).unwrap_or_else(|| vec![0.0; values.len()]);
            for (note_scores, value) in normalized.iter_mut().zip(standardized) {
                note_scores.insert(*factor, value);
            }
        }

        let total_weight = self.weights.total();
        let mut rankings = NoteRankings::default();

        for ((note_id, data, factor_scores), normalized_scores) in
            scored.into_iter().zip(normalized)
        {
            let weighted: f32 = enabled
                .iter()
                .map(|(f, w)| w * normalized_scores.get(f).copied().unwrap_or(0.0))
                .sum();
            let rank = if total_weight > 0.0 { weighted / total_weight } else { 0.0 };

            let dispersed = factor_scores
                .get(&RankingFactor::ProperIntroductionDispersed)
                .is_some_and(|s| *s > 0.0);
            let dispersion_key = if dispersed { data.dispersion_key().cloned() } else { None };

            rankings.notes.insert(
                note_id,
                NoteRanking { rank, factor_scores, normalized_scores, dispersion_key },
            );
            rankings.word_data.insert(note_id, data);
        }

        info!(
            "Ranked {} notes on {} factor(s) ({:.1}s)",
            rankings.notes.len(),
            enabled.len(),
            start.elapsed().as_secs_f32()
        );
        rankings
    }

    /// Cards of a note share its rank. Equal ranks keep the given order.
    pub fn sort_cards(&self, cards: &[&Card], rankings: &NoteRankings) -> Vec<CardId> {
        let mut sorted: Vec<&Card> = cards.to_vec();
        sorted.sort_by(|a, b| rankings.rank(b.note_id).total_cmp(&rankings.rank(a.note_id)));

        if !self.weights.dispersion_enabled() {
            return sorted.into_iter().map(|c| c.id).collect();
        }

        disperse(sorted, |card| {
            rankings.notes.get(&card.note_id).and_then(|n| n.dispersion_key.clone())
        })
        .into_iter()
        .map(|c| c.id)
        .collect()
    }
}
