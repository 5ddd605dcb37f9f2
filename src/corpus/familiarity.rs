use std::collections::{
    HashMap,
    HashSet,
};

use serde::{
    Deserialize,
    Serialize,
};

use super::{
    segment::SegmentContentMetrics,
    CorpusSegmentId,
    FieldContent,
};
use crate::{
    collection::{
        Card,
        CardId,
        NoteId,
        ReviewStats,
    },
    core::utils::{
        fmax,
        fmean,
        median,
    },
    dictionary::LangId,
    segmentation::WordToken,
};

pub const INTERVAL_BASELINE: f32 = 300.0;
pub const EASE_BASELINE: f32 = 2500.0;
pub const REPS_BASELINE: f32 = 12.0;

const REPS_WEIGHT: f32 = 0.05;
const SATURATION_RATE: f32 = 2.0;
const PRESENCE_LENGTH_DAMPING: f32 = 0.5;

/// Familiarity tuning taken from a target definition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FamiliaritySettings {
    pub suspended_card_value: f32,
    pub suspended_leech_card_value: f32,
    pub maturity_threshold: f32,
    pub maturity_min_num_cards: usize,
    pub maturity_min_num_notes: usize,
}

impl Default for FamiliaritySettings {
    fn default() -> Self {
        Self {
            suspended_card_value: 0.25,
            suspended_leech_card_value: 0.0,
            maturity_threshold: 0.28,
            maturity_min_num_cards: 2,
            maturity_min_num_notes: 1,
        }
    }
}

/// Ratio against a baseline: linear up to 1, then saturating towards 1.5.
fn soft_cap(ratio: f32) -> f32 {
    if ratio <= 1.0 {
        ratio.max(0.0)
    } else {
        1.0 + 0.5 * (1.0 - 1.0 / ratio)
    }
}

/// Ease scales how much the interval counts: 2500 is neutral.
fn ease_offset(ease_factor: u32) -> f32 {
    let ease = soft_cap(ease_factor as f32 / EASE_BASELINE);
    if ease > 1.0 {
        (ease + 0.7) / 1.7
    } else {
        (ease + 0.75) / 1.75
    }
}

/// Unbounded score of how well a card is known, around 1.0 at the baselines. Zero for cards
/// without a real review.
pub fn card_familiarity_score(review: &ReviewStats) -> f32 {
    if review.reps < 1 || review.interval < 1 {
        return 0.0;
    }
    let interval = soft_cap(review.interval as f32 / INTERVAL_BASELINE);
    let reps = soft_cap(review.reps as f32 / REPS_BASELINE);
    interval * ease_offset(review.ease_factor) + reps * REPS_WEIGHT
}

/// Due cards are at risk of being forgotten; the longer overdue relative to the interval, the
/// less they count.
pub fn due_devaluation(review: &ReviewStats) -> f32 {
    if !review.is_due() {
        return 1.0;
    }
    let relative_overdue = (review.days_overdue as f32 + 1.0) / (review.interval as f32 + 1.0);
    1.0 / (1.0 + relative_overdue).powi(2)
}

/// Contribution of one card to the familiarity of the words on its note, in [0,1).
pub fn card_contribution(card: &Card, is_leech: bool, settings: &FamiliaritySettings) -> f32 {
    let Some(review) = card.review.as_ref().filter(|_| card.has_been_reviewed()) else {
        return 0.0;
    };

    let score = card_familiarity_score(review) * due_devaluation(review);
    let mut contribution = 1.0 - (-SATURATION_RATE * score).exp();

    if card.suspended {
        let multiplier = if is_leech {
            settings.suspended_leech_card_value.min(settings.suspended_card_value)
        } else {
            settings.suspended_card_value
        };
        contribution *= multiplier.clamp(0.0, 1.0);
    }

    contribution.clamp(0.0, 1.0)
}

/// Extra cards of one note review the same content, so each next one counts half as much.
pub fn devalue_same_note_cards(mut contributions: Vec<(CardId, f32)>) -> Vec<(CardId, f32)> {
    contributions.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    contributions
        .into_iter()
        .enumerate()
        .map(|(i, (card_id, value))| (card_id, value / 2f32.powi(i as i32)))
        .filter(|(_, value)| *value > 0.0)
        .collect()
}

/// A word seen among many others gets less attention than a word studied on its own.
pub fn word_presence(field_len: usize) -> f32 {
    if field_len <= 1 {
        return 1.0;
    }
    1.0 / (1.0 + PRESENCE_LENGTH_DAMPING * (field_len as f32).ln())
}

/// Saturating aggregation: `1 - prod(1 - x)`. Never exceeds 1 and never decreases when a
/// value is added.
pub fn noisy_or<I: IntoIterator<Item = f32>>(values: I) -> f32 {
    let missing: f32 = values.into_iter().map(|v| 1.0 - v.clamp(0.0, 1.0)).product();
    (1.0 - missing).clamp(0.0, 1.0)
}

#[derive(Debug, Default)]
struct WordExposure {
    contributions: Vec<f32>,
    cards: HashSet<CardId>,
    notes: HashSet<NoteId>,
}

/// Familiarity for every word of one corpus segment.
pub fn build_segment_metrics(
    segment_id: CorpusSegmentId,
    lang_id: LangId,
    fields: &[(NoteId, &FieldContent)],
    note_contributions: &HashMap<NoteId, Vec<(CardId, f32)>>,
    settings: &FamiliaritySettings,
) -> SegmentContentMetrics {
    let mut all_words: HashSet<WordToken> = HashSet::new();
    let mut exposures: HashMap<WordToken, WordExposure> = HashMap::new();

    for (note_id, field) in fields {
        all_words.extend(field.tokens.iter().cloned());

        let Some(cards) = note_contributions.get(note_id) else {
            continue;
        };
        let presence = word_presence(field.tokens.len());
        let unique: HashSet<&WordToken> = field.tokens.iter().collect();

        for word in unique {
            let exposure = exposures.entry(word.clone()).or_default();
            for (card_id, contribution) in cards {
                exposure.contributions.push(contribution * presence);
                exposure.cards.insert(*card_id);
            }
            exposure.notes.insert(*note_id);
        }
    }

    let mut words_familiarity = HashMap::new();
    let mut words_num_cards = HashMap::new();
    let mut words_num_notes = HashMap::new();
    let mut mature_words = HashSet::new();

    for (word, mut exposure) in exposures {
        // Float products depend on order, and exposures come out of a hash map.
        exposure.contributions.sort_by(|a, b| a.total_cmp(b));
        let familiarity = noisy_or(exposure.contributions.iter().copied());
        if familiarity <= 0.0 {
            continue;
        }
        if familiarity > settings.maturity_threshold
            && exposure.cards.len() >= settings.maturity_min_num_cards
            && exposure.notes.len() >= settings.maturity_min_num_notes
        {
            mature_words.insert(word.clone());
        }
        words_num_cards.insert(word.clone(), exposure.cards.len());
        words_num_notes.insert(word.clone(), exposure.notes.len());
        words_familiarity.insert(word, familiarity);
    }

    let mut values: Vec<f32> = words_familiarity.values().copied().collect();
    values.sort_by(|a, b| a.total_cmp(b));

    SegmentContentMetrics {
        segment_id,
        lang_id,
        familiarity_mean: fmean(&values),
        familiarity_median: median(&values),
        familiarity_max: fmax(&values),
        words_familiarity,
        words_num_cards,
        words_num_notes,
        all_words,
        mature_words,
        maturity_threshold: settings.maturity_threshold,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        collection::CardType,
        corpus::WordClass,
        dictionary::LangDataId,
    };

    fn reviewed(interval: u32, ease_factor: u32, suspended: bool) -> Card {
        Card {
            id: 1,
            note_id: 1,
            deck: "Deck".into(),
            ordinal: 0,
            card_type: CardType::Review,
            suspended,
            due: 0,
            review: Some(ReviewStats { interval, ease_factor, reps: 6, days_overdue: -3 }),
        }
    }

    #[test]
    fn test_unreviewed_card_contributes_nothing() {
        let settings = FamiliaritySettings::default();
        let mut card = reviewed(10, 2500, false);
        card.card_type = CardType::New;
        card.review = None;
        assert_eq!(card_contribution(&card, false, &settings), 0.0);
    }

    #[test]
    fn test_monotonic_in_interval_and_ease() {
        let settings = FamiliaritySettings::default();
        let mut previous = 0.0;
        for interval in [1, 2, 5, 20, 100, 299, 300, 301, 1000, 5000] {
            let value = card_contribution(&reviewed(interval, 2500, false), false, &settings);
            assert!(value >= previous, "interval {} dropped", interval);
            assert!(value < 1.0);
            previous = value;
        }

        let mut previous = 0.0;
        for ease in [1300, 1800, 2499, 2500, 2501, 3000, 5000] {
            let value = card_contribution(&reviewed(30, ease, false), false, &settings);
            assert!(value >= previous, "ease {} dropped", ease);
            previous = value;
        }
    }

    #[test]
    fn test_due_card_is_devalued() {
        let settings = FamiliaritySettings::default();
        let fresh = reviewed(20, 2500, false);
        let mut due = fresh.clone();
        due.review = Some(ReviewStats { days_overdue: 5, ..fresh.review.unwrap() });
        assert!(
            card_contribution(&due, false, &settings) < card_contribution(&fresh, false, &settings)
        );
    }

    #[test]
    fn test_suspended_and_leech() {
        let settings = FamiliaritySettings {
            suspended_card_value: 0.5,
            suspended_leech_card_value: 0.2,
            ..FamiliaritySettings::default()
        };
        let active = card_contribution(&reviewed(50, 2500, false), false, &settings);
        let suspended = card_contribution(&reviewed(50, 2500, true), false, &settings);
        let leech = card_contribution(&reviewed(50, 2500, true), true, &settings);
        assert!((suspended - active * 0.5).abs() < 1e-6);
        assert!(leech <= suspended);

        let zero = FamiliaritySettings { suspended_leech_card_value: 0.0, ..settings };
        assert_eq!(card_contribution(&reviewed(50, 2500, true), true, &zero), 0.0);

        let inverted = FamiliaritySettings { suspended_leech_card_value: 0.9, ..settings };
        assert!(card_contribution(&reviewed(50, 2500, true), true, &inverted) <= suspended);
    }

    #[test]
    fn test_same_note_devaluation() {
        let result = devalue_same_note_cards(vec![(1, 0.2), (2, 0.8), (3, 0.0)]);
        assert_eq!(result, vec![(2, 0.8), (1, 0.1)]);
    }

    #[test]
    fn test_noisy_or_is_bounded_and_monotonic() {
        assert_eq!(noisy_or(Vec::new()), 0.0);
        let one = noisy_or([0.5]);
        let two = noisy_or([0.5, 0.5]);
        let many = noisy_or(vec![0.9; 50]);
        assert!((one - 0.5).abs() < 1e-6);
        assert!(two > one);
        assert!(many <= 1.0);
    }

    fn content(words: &[&str]) -> FieldContent {
        FieldContent {
            field_name: "Front".into(),
            lang_data_id: LangDataId::new("en"),
            segment_id: "en".into(),
            tokens: words.iter().map(|w| WordToken::from(*w)).collect(),
        }
    }

    fn metrics(
        fields: &[(NoteId, &FieldContent)],
        note_contributions: &HashMap<NoteId, Vec<(CardId, f32)>>,
    ) -> SegmentContentMetrics {
        build_segment_metrics(
            "en".into(),
            LangId::new("en"),
            fields,
            note_contributions,
            &FamiliaritySettings::default(),
        )
    }

    #[test]
    fn test_maturity_needs_enough_cards() {
        let first = content(&["sol"]);
        let second = content(&["sol"]);
        let mut contributions = HashMap::new();
        contributions.insert(1, vec![(10, 0.95)]);

        let single = metrics(&[(1, &first)], &contributions);
        assert!(single.familiarity("sol") > FamiliaritySettings::default().maturity_threshold);
        assert!(!single.is_mature("sol"));
        assert_eq!(single.word_class("sol"), WordClass::Learning);

        contributions.insert(2, vec![(20, 0.95)]);
        let both = metrics(&[(1, &first), (2, &second)], &contributions);
        assert!(both.is_mature("sol"));
        assert_eq!(both.words_num_cards["sol"], 2);
        assert_eq!(both.words_num_notes["sol"], 2);
    }

    #[test]
    fn test_familiarity_ignores_input_order() {
        let fields: Vec<FieldContent> =
            (0..40).map(|i| content(&["sol", &format!("w{}", i)])).collect();
        let mut contributions = HashMap::new();
        for i in 0..40u64 {
            contributions.insert(i, vec![(i, 0.013 * (i + 1) as f32)]);
        }

        let forward: Vec<(NoteId, &FieldContent)> =
            fields.iter().enumerate().map(|(i, f)| (i as u64, f)).collect();
        let mut backward = forward.clone();
        backward.reverse();

        let a = metrics(&forward, &contributions);
        let b = metrics(&backward, &contributions);
        assert_eq!(a.familiarity("sol").to_bits(), b.familiarity("sol").to_bits());
        assert_eq!(a.familiarity_mean.to_bits(), b.familiarity_mean.to_bits());
        assert_eq!(a.familiarity_median.to_bits(), b.familiarity_median.to_bits());
    }

    #[test]
    fn test_presence_decreases_with_length() {
        assert_eq!(word_presence(1), 1.0);
        assert!(word_presence(2) < 1.0);
        assert!(word_presence(10) < word_presence(3));
    }
}
