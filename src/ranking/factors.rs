use std::{
    collections::BTreeMap,
    fmt,
};

use serde::{
    Deserialize,
    Serialize,
};

use crate::core::ReorderError;

/// Every scoring signal a target can weigh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankingFactor {
    WordFrequency,
    Familiarity,
    LowestWordFrequency,
    LowestFamiliarity,
    LexicalUnderexposure,
    FamiliaritySweetspot,
    IdealFocusWordCount,
    IdealWordCount,
    IdealNewWordCount,
    ReinforceLearningWords,
    MostObscureWord,
    LowestFrLeastFamiliarWord,
    NewWords,
    NoNewWords,
    ProperIntroduction,
    ProperIntroductionDispersed,
}

impl RankingFactor {
    pub const ALL: [RankingFactor; 16] = [
        RankingFactor::WordFrequency,
        RankingFactor::Familiarity,
        RankingFactor::LowestWordFrequency,
        RankingFactor::LowestFamiliarity,
        RankingFactor::LexicalUnderexposure,
        RankingFactor::FamiliaritySweetspot,
        RankingFactor::IdealFocusWordCount,
        RankingFactor::IdealWordCount,
        RankingFactor::IdealNewWordCount,
        RankingFactor::ReinforceLearningWords,
        RankingFactor::MostObscureWord,
        RankingFactor::LowestFrLeastFamiliarWord,
        RankingFactor::NewWords,
        RankingFactor::NoNewWords,
        RankingFactor::ProperIntroduction,
        RankingFactor::ProperIntroductionDispersed,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            RankingFactor::WordFrequency => "word_frequency",
            RankingFactor::Familiarity => "familiarity",
            RankingFactor::LowestWordFrequency => "lowest_word_frequency",
            RankingFactor::LowestFamiliarity => "lowest_familiarity",
            RankingFactor::LexicalUnderexposure => "lexical_underexposure",
            RankingFactor::FamiliaritySweetspot => "familiarity_sweetspot",
            RankingFactor::IdealFocusWordCount => "ideal_focus_word_count",
            RankingFactor::IdealWordCount => "ideal_word_count",
            RankingFactor::IdealNewWordCount => "ideal_new_word_count",
            RankingFactor::ReinforceLearningWords => "reinforce_learning_words",
            RankingFactor::MostObscureWord => "most_obscure_word",
            RankingFactor::LowestFrLeastFamiliarWord => "lowest_fr_least_familiar_word",
            RankingFactor::NewWords => "new_words",
            RankingFactor::NoNewWords => "no_new_words",
            RankingFactor::ProperIntroduction => "proper_introduction",
            RankingFactor::ProperIntroductionDispersed => "proper_introduction_dispersed",
        }
    }

    /// Accepts the current names and the older ones still found in saved target lists.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        match name {
            "ideal_unseen_word_count" => return Some(RankingFactor::IdealNewWordCount),
            "reinforce_focus_words" => return Some(RankingFactor::ReinforceLearningWords),
            _ => {}
        }
        Self::ALL.into_iter().find(|factor| factor.name() == name)
    }

    pub fn default_weight(&self) -> f32 {
        match self {
            RankingFactor::WordFrequency => 1.0,
            RankingFactor::Familiarity => 1.0,
            RankingFactor::LowestWordFrequency => 1.0,
            RankingFactor::LowestFamiliarity => 1.0,
            RankingFactor::LexicalUnderexposure => 0.25,
            RankingFactor::FamiliaritySweetspot => 0.5,
            RankingFactor::IdealFocusWordCount => 4.0,
            RankingFactor::IdealWordCount => 1.0,
            RankingFactor::IdealNewWordCount => 0.0,
            RankingFactor::ReinforceLearningWords => 1.0,
            RankingFactor::MostObscureWord => 0.5,
            RankingFactor::LowestFrLeastFamiliarWord => 0.25,
            RankingFactor::NewWords => 0.5,
            RankingFactor::NoNewWords => 0.0,
            RankingFactor::ProperIntroduction => 0.1,
            RankingFactor::ProperIntroductionDispersed => 0.0,
        }
    }

    /// Factors that reorder the ranked pool instead of adding to the rank.
    pub fn is_dispersion(&self) -> bool {
        matches!(self, RankingFactor::ProperIntroductionDispersed)
    }
}

impl fmt::Display for RankingFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Weight per factor for one target. Factors weighted zero are never computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingWeights {
    weights: BTreeMap<RankingFactor, f32>,
}

impl Default for RankingWeights {
    fn default() -> Self {
        Self { weights: RankingFactor::ALL.into_iter().map(|f| (f, f.default_weight())).collect() }
    }
}

fn check_weight(name: &str, weight: f32) -> Result<f32, ReorderError> {
    if !weight.is_finite() || weight < 0.0 {
        return Err(ReorderError::Configuration(format!(
            "Weight of ranking factor '{}' must be a positive number, got {}",
            name, weight
        )));
    }
    Ok(weight)
}

impl RankingWeights {
    /// All factors at zero.
    pub fn none() -> Self {
        Self { weights: RankingFactor::ALL.into_iter().map(|f| (f, 0.0)).collect() }
    }

    /// Named weights replace the defaults wholesale; unnamed factors are off.
    pub fn from_named<'a, I>(named: I) -> Result<Self, ReorderError>
    where
        I: IntoIterator<Item = (&'a str, f32)>,
    {
        let mut weights = Self::none();
        for (name, weight) in named {
            let factor = RankingFactor::from_name(name).ok_or_else(|| {
                ReorderError::Configuration(format!("Unknown ranking factor '{}'", name))
            })?;
            weights.set(factor, check_weight(name, weight)?);
        }
        Ok(weights)
    }

    pub fn set(&mut self, factor: RankingFactor, weight: f32) {
        self.weights.insert(factor, weight);
    }

    pub fn with(mut self, factor: RankingFactor, weight: f32) -> Self {
        self.set(factor, weight);
        self
    }

    pub fn get(&self, factor: RankingFactor) -> f32 {
        self.weights.get(&factor).copied().unwrap_or(0.0)
    }

    /// Factors that feed the combined rank, in a fixed order.
    pub fn enabled(&self) -> Vec<(RankingFactor, f32)> {
        self.weights
            .iter()
            .filter(|(factor, weight)| **weight > 0.0 && !factor.is_dispersion())
            .map(|(factor, weight)| (*factor, *weight))
            .collect()
    }

    pub fn dispersion_enabled(&self) -> bool {
        self.get(RankingFactor::ProperIntroductionDispersed) > 0.0
    }

    pub fn total(&self) -> f32 {
        self.enabled().iter().map(|(_, w)| w).sum()
    }
}
