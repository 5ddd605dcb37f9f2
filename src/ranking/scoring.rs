use std::fmt;

use serde::{
    Deserialize,
    Serialize,
};

use super::{
    factors::RankingFactor,
    metrics::{
        CardWordData,
        FieldWordData,
    },
};
use crate::{
    core::{
        utils::{
            clamp_unit,
            fmean,
            fmin,
        },
        ReorderError,
    },
    corpus::WordClass,
};

pub const DEFAULT_IDEAL_WORD_COUNT: (usize, usize) = (2, 5);
pub const IDEAL_FOCUS_WORDS: usize = 1;
pub const IDEAL_NEW_WORDS: usize = 1;

/// Familiarity at which reviewing a word pays off most.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SweetspotPoint {
    Absolute(f32),
    /// `~x`: a fraction of the maturity threshold.
    RelativeToMaturity(f32),
    /// `^x`: a fraction of the segment's median familiarity.
    RelativeToMedian(f32),
}

impl Default for SweetspotPoint {
    fn default() -> Self {
        SweetspotPoint::RelativeToMaturity(0.5)
    }
}

impl SweetspotPoint {
    pub fn parse(value: &str) -> Result<Self, ReorderError> {
        let value = value.trim();
        let invalid = || {
            ReorderError::Configuration(format!("Invalid familiarity_sweetspot_point '{}'", value))
        };
        let number = |s: &str| -> Result<f32, ReorderError> {
            let n = s.trim().parse::<f32>().map_err(|_| invalid())?;
            if !n.is_finite() || n < 0.0 {
                return Err(invalid());
            }
            Ok(n)
        };

        if let Some(rest) = value.strip_prefix('~') {
            Ok(SweetspotPoint::RelativeToMaturity(number(rest)?))
        } else if let Some(rest) = value.strip_prefix('^') {
            Ok(SweetspotPoint::RelativeToMedian(number(rest)?))
        } else {
            let n = number(value)?;
            if n > 1.0 {
                return Err(invalid());
            }
            Ok(SweetspotPoint::Absolute(n))
        }
    }

    pub fn resolve(&self, maturity_threshold: f32, familiarity_median: f32) -> f32 {
        let point = match self {
            SweetspotPoint::Absolute(p) => *p,
            SweetspotPoint::RelativeToMaturity(x) => x * maturity_threshold,
            SweetspotPoint::RelativeToMedian(x) => x * familiarity_median,
        };
        clamp_unit(point)
    }
}

impl fmt::Display for SweetspotPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SweetspotPoint::Absolute(p) => write!(f, "{}", p),
            SweetspotPoint::RelativeToMaturity(x) => write!(f, "~{}", x),
            SweetspotPoint::RelativeToMedian(x) => write!(f, "^{}", x),
        }
    }
}

/// Per target tuning read by the factor functions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringParams {
    pub ideal_word_count_min: usize,
    pub ideal_word_count_max: usize,
    pub sweetspot_point: SweetspotPoint,
}

impl Default for ScoringParams {
    fn default() -> Self {
        Self {
            ideal_word_count_min: DEFAULT_IDEAL_WORD_COUNT.0,
            ideal_word_count_max: DEFAULT_IDEAL_WORD_COUNT.1,
            sweetspot_point: SweetspotPoint::default(),
        }
    }
}

/// Mean pulled towards the minimum, so one hard word is not hidden by easy ones.
fn blend(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    0.5 * fmean(values) + 0.5 * fmin(values)
}

/// 1 at `ideal`, falling off with the squared distance.
fn bell(count: usize, ideal: usize) -> f32 {
    let distance = count as f32 - ideal as f32;
    1.0 / (1.0 + distance * distance)
}

/// Largest `f32` below 1.0. Counts outside the range never reach a full score.
const BELOW_ONE: f32 = 1.0 - f32::EPSILON / 2.0;

/// 1.0 inside `[min, max]`, falling off steeply with the distance from the middle of the range.
pub fn ideal_word_count_score(count: usize, min: usize, max: usize) -> f32 {
    if count >= min && count <= max {
        return 1.0;
    }
    let middle = ((min + max) as f64 / 2.0).max(1.0);
    let difference = (middle - count as f64).abs();
    let mut score = 1.0 / (1.0 + (difference / middle).powi(7));
    if count > 0 && count < min {
        score = (score + 1.0) / 2.0;
    }
    (score as f32).min(BELOW_ONE)
}

fn familiarity_sweetspot(field: &FieldWordData, params: &ScoringParams) -> f32 {
    let point = params.sweetspot_point.resolve(field.maturity_threshold, field.familiarity_median);
    let reach = point.max(1.0 - point);
    field
        .seen_words()
        .iter()
        .map(|w| 1.0 - (w.familiarity - point).abs() / reach)
        .fold(0.0, f32::max)
}

fn proper_introduction(field: &FieldWordData) -> f32 {
    let Some(index) = field.words.iter().position(|w| w.class == WordClass::New) else {
        return 0.0;
    };
    let introduced = &field.words[index].word;
    let position_score = 1.0 - index as f32 / field.word_count() as f32;

    let others: Vec<f32> = field
        .words
        .iter()
        .filter(|w| &w.word != introduced)
        .map(|w| (w.frequency + w.familiarity) / 2.0)
        .collect();
    let context_score = if others.is_empty() { 1.0 } else { fmean(&others) };

    0.5 * position_score + 0.5 * context_score
}

/// Score of one factor for one field, in [0,1].
pub fn field_factor_score(
    factor: RankingFactor,
    field: &FieldWordData,
    params: &ScoringParams,
) -> f32 {
    let frequencies = field.frequencies();
    let familiarities = field.familiarities();

    let score = match factor {
        RankingFactor::WordFrequency => blend(&frequencies),
        RankingFactor::Familiarity => blend(&familiarities),
        RankingFactor::LowestWordFrequency => fmin(&frequencies),
        RankingFactor::LowestFamiliarity => fmin(&familiarities),
        RankingFactor::LexicalUnderexposure => blend(&frequencies) - blend(&familiarities),
        RankingFactor::FamiliaritySweetspot => familiarity_sweetspot(field, params),
        RankingFactor::IdealFocusWordCount => bell(field.focus_words().len(), IDEAL_FOCUS_WORDS),
        RankingFactor::IdealWordCount => ideal_word_count_score(
            field.word_count(),
            params.ideal_word_count_min,
            params.ideal_word_count_max,
        ),
        RankingFactor::IdealNewWordCount => bell(field.new_words().len(), IDEAL_NEW_WORDS),
        RankingFactor::ReinforceLearningWords => {
            let learning = field.learning_words().len();
            if field.new_words().is_empty() && learning > 0 {
                learning as f32 / field.unique_words().len() as f32
            } else {
                0.0
            }
        }
        RankingFactor::MostObscureWord => {
            let ubiquity: Vec<f32> =
                field.words.iter().map(|w| w.frequency.max(w.familiarity)).collect();
            fmin(&ubiquity)
        }
        RankingFactor::LowestFrLeastFamiliarWord => {
            field.lowest_fr_least_familiar_word().map(|w| w.frequency).unwrap_or(0.0)
        }
        RankingFactor::NewWords => {
            if field.new_words().is_empty() {
                0.0
            } else {
                1.0
            }
        }
        RankingFactor::NoNewWords => {
            if field.new_words().is_empty() {
                1.0
            } else {
                0.0
            }
        }
        RankingFactor::ProperIntroduction | RankingFactor::ProperIntroductionDispersed => {
            proper_introduction(field)
        }
    };

    clamp_unit(score)
}

/// Score of one factor for a note: the mean over its targeted fields.
pub fn factor_score(
    factor: RankingFactor,
    card: &CardWordData,
    params: &ScoringParams,
) -> Result<f32, ReorderError> {
    if card.fields.is_empty() {
        return Ok(0.0);
    }
    let per_field: Vec<f32> =
        card.fields.iter().map(|field| field_factor_score(factor, field, params)).collect();
    let score = fmean(&per_field);
    if !score.is_finite() {
        return Err(ReorderError::Compute(format!(
            "Factor {} produced {} for note {}",
            factor, score, card.note_id
        )));
    }
    Ok(score)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ranking::metrics::tests::{
        field,
        word,
    };

    fn score(factor: RankingFactor, data: &FieldWordData) -> f32 {
        field_factor_score(factor, data, &ScoringParams::default())
    }

    #[test]
    fn test_every_factor_is_total_and_bounded() {
        let fields = vec![
            field(vec![]),
            field(vec![word("solo", 0.3, 0.0, WordClass::New)]),
            field(vec![
                word("same", 0.5, 0.5, WordClass::Mature),
                word("same", 0.5, 0.5, WordClass::Mature),
            ]),
            field(vec![
                word("a", 1.0, 1.0, WordClass::Mature),
                word("b", 0.0, 0.2, WordClass::Learning),
                word("c", 0.7, 0.0, WordClass::New),
            ]),
        ];
        for data in &fields {
            for factor in RankingFactor::ALL {
                let value = score(factor, data);
                assert!((0.0..=1.0).contains(&value), "{} gave {}", factor, value);
            }
        }
    }

    #[test]
    fn test_lexical_underexposure() {
        let familiar = field(vec![
            word("a", 0.6, 0.9, WordClass::Mature),
            word("b", 0.2, 0.4, WordClass::Mature),
        ]);
        assert_eq!(score(RankingFactor::LexicalUnderexposure, &familiar), 0.0);

        let unknown_common = field(vec![word("a", 0.9, 0.1, WordClass::Learning)]);
        assert!((score(RankingFactor::LexicalUnderexposure, &unknown_common) - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_ideal_word_count() {
        for count in 2..=5 {
            assert_eq!(ideal_word_count_score(count, 2, 5), 1.0);
        }
        let mut previous = 1.0;
        for count in 6..20 {
            let value = ideal_word_count_score(count, 2, 5);
            assert!(value < previous);
            previous = value;
        }
        assert!(ideal_word_count_score(1, 2, 5) > ideal_word_count_score(0, 2, 5));
        assert!(ideal_word_count_score(1, 2, 5) < 1.0);
    }

    #[test]
    fn test_ideal_word_count_wide_range() {
        assert_eq!(ideal_word_count_score(90, 90, 100), 1.0);
        assert_eq!(ideal_word_count_score(100, 90, 100), 1.0);
        for count in [88, 89, 101, 102] {
            assert!(ideal_word_count_score(count, 90, 100) < 1.0, "count {}", count);
        }

        let mut previous = 1.0;
        for count in 101..400 {
            let value = ideal_word_count_score(count, 90, 100);
            assert!(value <= previous, "count {} rose", count);
            previous = value;
        }
        let mut previous = 1.0;
        for count in (0..90).rev() {
            let value = ideal_word_count_score(count, 90, 100);
            assert!(value <= previous, "count {} rose", count);
            previous = value;
        }
        assert!(ideal_word_count_score(300, 90, 100) < ideal_word_count_score(101, 90, 100));
    }

    #[test]
    fn test_focus_word_count_peaks_at_one() {
        let mature = |w| word(w, 0.5, 0.9, WordClass::Mature);
        let new = |w| word(w, 0.5, 0.0, WordClass::New);
        let zero = field(vec![mature("a"), mature("b")]);
        let one = field(vec![mature("a"), new("x")]);
        let three = field(vec![new("x"), new("y"), new("z")]);
        let s = |f: &FieldWordData| score(RankingFactor::IdealFocusWordCount, f);
        assert_eq!(s(&one), 1.0);
        assert!(s(&one) > s(&zero));
        assert!(s(&one) > s(&three));
    }

    #[test]
    fn test_reinforce_learning_words() {
        let learning = field(vec![
            word("a", 0.5, 0.1, WordClass::Learning),
            word("b", 0.5, 0.9, WordClass::Mature),
        ]);
        assert_eq!(score(RankingFactor::ReinforceLearningWords, &learning), 0.5);

        let with_new = field(vec![
            word("a", 0.5, 0.1, WordClass::Learning),
            word("c", 0.5, 0.0, WordClass::New),
        ]);
        assert_eq!(score(RankingFactor::ReinforceLearningWords, &with_new), 0.0);
    }

    #[test]
    fn test_obscurity_factors() {
        let data = field(vec![
            word("common", 0.9, 0.0, WordClass::New),
            word("rare", 0.1, 0.3, WordClass::Mature),
            word("odd", 0.2, 0.0, WordClass::New),
        ]);
        assert!((score(RankingFactor::MostObscureWord, &data) - 0.2).abs() < 1e-6);
        assert!((score(RankingFactor::LowestFrLeastFamiliarWord, &data) - 0.2).abs() < 1e-6);
        assert!((score(RankingFactor::LowestWordFrequency, &data) - 0.1).abs() < 1e-6);
        assert_eq!(score(RankingFactor::NewWords, &data), 1.0);
        assert_eq!(score(RankingFactor::NoNewWords, &data), 0.0);
    }

    #[test]
    fn test_proper_introduction_prefers_early_new_word_in_known_context() {
        let early = field(vec![
            word("new", 0.5, 0.0, WordClass::New),
            word("known", 0.9, 0.9, WordClass::Mature),
        ]);
        let late = field(vec![
            word("known", 0.9, 0.9, WordClass::Mature),
            word("new", 0.5, 0.0, WordClass::New),
        ]);
        let no_new = field(vec![word("known", 0.9, 0.9, WordClass::Mature)]);
        let s = |f: &FieldWordData| score(RankingFactor::ProperIntroduction, f);
        assert!(s(&early) > s(&late));
        assert_eq!(s(&no_new), 0.0);
        assert_eq!(s(&early), score(RankingFactor::ProperIntroductionDispersed, &early));
    }

    #[test]
    fn test_sweetspot() {
        assert_eq!(SweetspotPoint::parse("~0.5").unwrap(), SweetspotPoint::RelativeToMaturity(0.5));
        assert_eq!(SweetspotPoint::parse("^1.2").unwrap(), SweetspotPoint::RelativeToMedian(1.2));
        assert_eq!(SweetspotPoint::parse("0.3").unwrap(), SweetspotPoint::Absolute(0.3));
        assert!(SweetspotPoint::parse("1.5").is_err());
        assert!(SweetspotPoint::parse("~x").is_err());

        let params =
            ScoringParams { sweetspot_point: SweetspotPoint::Absolute(0.4), ..Default::default() };
        let at_point = field(vec![word("a", 0.5, 0.4, WordClass::Learning)]);
        let far = field(vec![word("a", 0.5, 0.95, WordClass::Mature)]);
        let unseen = field(vec![word("a", 0.5, 0.0, WordClass::New)]);
        let s = |f: &FieldWordData| {
            field_factor_score(RankingFactor::FamiliaritySweetspot, f, &params)
        };
        assert_eq!(s(&at_point), 1.0);
        assert!(s(&far) < s(&at_point));
        assert_eq!(s(&unseen), 0.0);
    }

    #[test]
    fn test_factor_score_averages_fields() {
        let card = CardWordData {
            note_id: 1,
            fields: vec![
                field(vec![word("a", 0.5, 0.0, WordClass::New)]),
                field(vec![word("b", 0.5, 0.9, WordClass::Mature)]),
            ],
        };
        let params = ScoringParams::default();
        let value = factor_score(RankingFactor::NewWords, &card, &params).unwrap();
        assert_eq!(value, 0.5);

        let empty = CardWordData { note_id: 2, fields: vec![] };
        assert_eq!(factor_score(RankingFactor::WordFrequency, &empty, &params).unwrap(), 0.0);
    }
}
