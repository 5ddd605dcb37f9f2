use std::{
    collections::{
        BTreeMap,
        HashSet,
    },
    sync::LazyLock,
};

use regex::Regex;
use serde_json::{
    Map,
    Value,
};

use crate::{
    collection::query::quote,
    core::ReorderError,
    corpus::{
        CorpusSegmentationStrategy,
        FamiliaritySettings,
    },
    dictionary::LangDataId,
    ranking::{
        RankingFactor,
        RankingWeights,
        ScoringParams,
        SweetspotPoint,
    },
};

static TARGET_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_]+$").unwrap());

const KNOWN_KEYS: &[&str] = &[
    "id",
    "deck",
    "decks",
    "scope_query",
    "reorder_scope_query",
    "notes",
    "ranking_factors",
    "familiarity_sweetspot_point",
    "maturity_threshold",
    "focus_words_max_familiarity",
    "maturity_min_num_cards",
    "maturity_min_num_notes",
    "suspended_card_value",
    "suspended_leech_card_value",
    "ideal_word_count",
    "corpus_segmentation_strategy",
];

/// Note type of a target and the language of each of its targeted fields.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetNote {
    pub name: String,
    pub fields: BTreeMap<String, LangDataId>,
}

/// A validated target. Immutable once parsed.
#[derive(Debug, Clone)]
pub struct TargetDefinition {
    /// Position in the target list, zero-based.
    pub index: usize,
    pub id: Option<String>,
    pub decks: Vec<String>,
    pub scope_query: Option<String>,
    pub reorder_scope_query: Option<String>,
    pub notes: Vec<TargetNote>,
    pub weights: RankingWeights,
    pub scoring: ScoringParams,
    pub familiarity: FamiliaritySettings,
    pub segmentation: CorpusSegmentationStrategy,
}

struct TargetObject<'a> {
    index: usize,
    object: &'a Map<String, Value>,
}

impl<'a> TargetObject<'a> {
    fn error(&self, message: impl AsRef<str>) -> ReorderError {
        ReorderError::Configuration(format!("Target #{}: {}", self.index + 1, message.as_ref()))
    }

    fn string(&self, key: &str) -> Result<Option<&'a str>, ReorderError> {
        match self.object.get(key) {
            None => Ok(None),
            Some(Value::String(s)) if !s.trim().is_empty() => Ok(Some(s.as_str())),
            Some(Value::String(_)) => Err(self.error(format!("'{}' is empty", key))),
            Some(_) => Err(self.error(format!("'{}' is not a string", key))),
        }
    }

    fn number(&self, key: &str) -> Result<Option<f32>, ReorderError> {
        match self.object.get(key) {
            None => Ok(None),
            Some(value) => number_value(value)
                .map(Some)
                .ok_or_else(|| self.error(format!("'{}' is not a number", key))),
        }
    }

    fn unit(&self, key: &str) -> Result<Option<f32>, ReorderError> {
        let value = self.number(key)?;
        if value.is_some_and(|v| !(0.0..=1.0).contains(&v)) {
            return Err(self.error(format!("'{}' must be between 0 and 1", key)));
        }
        Ok(value)
    }

    fn count(&self, key: &str) -> Result<Option<usize>, ReorderError> {
        match self.object.get(key) {
            None => Ok(None),
            Some(value) => value
                .as_u64()
                .map(|v| Some(v as usize))
                .ok_or_else(|| self.error(format!("'{}' is not a positive integer", key))),
        }
    }
}

/// Numbers, and strings holding a number.
fn number_value(value: &Value) -> Option<f32> {
    let number = match value {
        Value::Number(n) => n.as_f64()? as f32,
        Value::String(s) => s.trim().parse::<f32>().ok()?,
        _ => return None,
    };
    number.is_finite().then_some(number)
}

/// `"a, b\, c"` is two decks: `a` and `b, c`.
pub fn split_deck_names(decks: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut current = String::new();
    let mut chars = decks.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&',') => {
                current.push(',');
                chars.next();
            }
            ',' => names.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    names.push(current);

    names.into_iter().map(|n| n.trim().to_string()).filter(|n| !n.is_empty()).collect()
}

fn parse_decks(target: &TargetObject<'_>) -> Result<Vec<String>, ReorderError> {
    let mut decks = Vec::new();
    if let Some(deck) = target.string("deck")? {
        decks.push(deck.trim().to_string());
    }
    match target.object.get("decks") {
        None => {}
        Some(Value::String(s)) => {
            let names = split_deck_names(s);
            if names.is_empty() {
                return Err(target.error("'decks' is empty"));
            }
            decks.extend(names);
        }
        Some(Value::Array(items)) => {
            for item in items {
                match item.as_str().map(str::trim) {
                    Some(name) if !name.is_empty() => decks.push(name.to_string()),
                    _ => return Err(target.error("'decks' must only contain deck names")),
                }
            }
        }
        Some(_) => return Err(target.error("'decks' is not a string or a list of strings")),
    }
    Ok(decks)
}

fn parse_notes(target: &TargetObject<'_>) -> Result<Vec<TargetNote>, ReorderError> {
    let items = match target.object.get("notes") {
        None => return Err(target.error("missing key 'notes'")),
        Some(Value::Array(items)) if !items.is_empty() => items,
        Some(Value::Array(_)) => return Err(target.error("'notes' is empty")),
        Some(_) => return Err(target.error("'notes' is not a list")),
    };

    items
        .iter()
        .enumerate()
        .map(|(note_index, item)| {
            let name = item
                .get("name")
                .and_then(Value::as_str)
                .filter(|n| !n.trim().is_empty())
                .ok_or_else(|| target.error(format!("notes[{}] has no valid 'name'", note_index)))?;
            let fields = item
                .get("fields")
                .and_then(Value::as_object)
                .filter(|f| !f.is_empty())
                .ok_or_else(|| {
                    target.error(format!("notes[{}] has no valid 'fields'", note_index))
                })?;

            let fields = fields
                .iter()
                .map(|(field_name, lang)| {
                    let lang = lang.as_str().map(str::trim).filter(|l| !l.is_empty());
                    match lang {
                        Some(lang) if !field_name.is_empty() => {
                            Ok((field_name.clone(), LangDataId::new(lang)))
                        }
                        _ => Err(target.error(format!(
                            "field '{}' of notes[{}] needs a language data id",
                            field_name, note_index
                        ))),
                    }
                })
                .collect::<Result<BTreeMap<_, _>, _>>()?;

            Ok(TargetNote { name: name.to_string(), fields })
        })
        .collect()
}

fn parse_weights(target: &TargetObject<'_>) -> Result<RankingWeights, ReorderError> {
    let mut weights = match target.object.get("ranking_factors") {
        None => RankingWeights::default(),
        Some(Value::Object(factors)) if !factors.is_empty() => {
            let named = factors
                .iter()
                .map(|(name, value)| {
                    number_value(value)
                        .map(|weight| (name.as_str(), weight))
                        .ok_or_else(|| {
                            target.error(format!("weight of '{}' is not a number", name))
                        })
                })
                .collect::<Result<Vec<_>, _>>()?;
            RankingWeights::from_named(named).map_err(|e| target.error(e.to_string()))?
        }
        Some(_) => return Err(target.error("'ranking_factors' is not a non-empty object")),
    };

    for (key, value) in target.object {
        let Some(name) = key.strip_prefix("ranking_").filter(|_| key != "ranking_factors") else {
            continue;
        };
        let factor = RankingFactor::from_name(name)
            .ok_or_else(|| target.error(format!("unknown ranking factor '{}'", name)))?;
        let weight = number_value(value)
            .filter(|w| *w >= 0.0)
            .ok_or_else(|| target.error(format!("'{}' is not a positive number", key)))?;
        weights.set(factor, weight);
    }

    Ok(weights)
}

fn parse_scoring(target: &TargetObject<'_>) -> Result<ScoringParams, ReorderError> {
    let mut scoring = ScoringParams::default();

    if let Some(value) = target.object.get("ideal_word_count") {
        let bounds: Option<Vec<u64>> = value
            .as_array()
            .and_then(|items| items.iter().map(Value::as_u64).collect::<Option<Vec<u64>>>());
        match bounds.as_deref() {
            Some([min, max]) if *min >= 1 && min <= max => {
                scoring.ideal_word_count_min = *min as usize;
                scoring.ideal_word_count_max = *max as usize;
            }
            _ => {
                return Err(
                    target.error("'ideal_word_count' must be [min, max] with 1 <= min <= max")
                )
            }
        }
    }

    match target.object.get("familiarity_sweetspot_point") {
        None => {}
        Some(Value::String(s)) => {
            scoring.sweetspot_point =
                SweetspotPoint::parse(s).map_err(|e| target.error(e.to_string()))?;
        }
        Some(value) => match number_value(value) {
            Some(p) if (0.0..=1.0).contains(&p) => {
                scoring.sweetspot_point = SweetspotPoint::Absolute(p)
            }
            _ => return Err(target.error("'familiarity_sweetspot_point' is not valid")),
        },
    }

    Ok(scoring)
}

fn parse_familiarity(target: &TargetObject<'_>) -> Result<FamiliaritySettings, ReorderError> {
    let mut settings = FamiliaritySettings::default();

    let threshold = match target.unit("maturity_threshold")? {
        Some(t) => Some(t),
        None => target.unit("focus_words_max_familiarity")?,
    };
    if let Some(threshold) = threshold {
        if threshold <= 0.0 {
            return Err(target.error("'maturity_threshold' must be above 0"));
        }
        settings.maturity_threshold = threshold;
    }
    if let Some(value) = target.unit("suspended_card_value")? {
        settings.suspended_card_value = value;
    }
    if let Some(value) = target.unit("suspended_leech_card_value")? {
        settings.suspended_leech_card_value = value;
    }
    if let Some(count) = target.count("maturity_min_num_cards")? {
        settings.maturity_min_num_cards = count;
    }
    if let Some(count) = target.count("maturity_min_num_notes")? {
        settings.maturity_min_num_notes = count;
    }

    Ok(settings)
}

impl TargetDefinition {
    /// Parses and validates one entry of a target list. Checks that need the collection or the
    /// language data happen when the target is planned.
    pub fn from_value(value: &Value, index: usize) -> Result<Self, ReorderError> {
        let object = value.as_object().ok_or_else(|| {
            ReorderError::Configuration(format!("Target #{}: not an object", index + 1))
        })?;
        let target = TargetObject { index, object };

        if object.is_empty() {
            return Err(target.error("has no keys"));
        }
        for key in object.keys() {
            let is_weight = key.starts_with("ranking_");
            if !is_weight && !KNOWN_KEYS.contains(&key.as_str()) {
                return Err(target.error(format!("unknown key '{}'", key)));
            }
        }

        let id = target.string("id")?.map(str::to_string);
        if let Some(id) = &id {
            if !TARGET_ID.is_match(id) {
                return Err(target.error(format!(
                    "id '{}' may only contain letters, numbers and underscores",
                    id
                )));
            }
        }

        let decks = parse_decks(&target)?;
        let scope_query = target.string("scope_query")?.map(|q| q.trim().to_string());
        if decks.is_empty() && scope_query.is_none() {
            return Err(target.error("missing key 'deck', 'decks' or 'scope_query'"));
        }

        let segmentation = match target.string("corpus_segmentation_strategy")? {
            None => CorpusSegmentationStrategy::default(),
            Some(name) => CorpusSegmentationStrategy::from_name(&name.trim().to_lowercase())
                .ok_or_else(|| {
                    target.error(format!("unknown corpus segmentation strategy '{}'", name))
                })?,
        };

        Ok(Self {
            index,
            id,
            decks,
            scope_query,
            reorder_scope_query: target
                .string("reorder_scope_query")?
                .map(|q| q.trim().to_string()),
            notes: parse_notes(&target)?,
            weights: parse_weights(&target)?,
            scoring: parse_scoring(&target)?,
            familiarity: parse_familiarity(&target)?,
            segmentation,
        })
    }

    /// `id` when set, otherwise the one-based position.
    pub fn name(&self) -> String {
        match &self.id {
            Some(id) => id.clone(),
            None => format!("#{}", self.index + 1),
        }
    }

    /// `(decks OR scope query) AND (note types)`.
    pub fn main_scope_query(&self) -> String {
        let mut scopes: Vec<String> = self.decks.iter().map(|deck| quote("deck", deck)).collect();
        if let Some(query) = &self.scope_query {
            scopes.push(format!("({})", query));
        }
        let notes: Vec<String> = self.notes.iter().map(|note| quote("note", &note.name)).collect();
        format!("({}) AND ({})", scopes.join(" OR "), notes.join(" OR "))
    }

    pub fn reorder_scope_query(&self) -> Option<String> {
        self.reorder_scope_query
            .as_ref()
            .map(|query| format!("{} AND ({})", self.main_scope_query(), query))
    }

    pub fn lang_data_ids(&self) -> HashSet<LangDataId> {
        self.notes.iter().flat_map(|note| note.fields.values().cloned()).collect()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn parse(value: Value) -> Result<TargetDefinition, ReorderError> {
        TargetDefinition::from_value(&value, 0)
    }

    fn basic() -> Value {
        json!({
            "deck": "Spanish",
            "notes": [{ "name": "Basic", "fields": { "Front": "ES", "Back": "en" } }]
        })
    }

    #[test]
    fn test_parse_defaults() {
        let target = parse(basic()).unwrap();
        assert_eq!(target.decks, vec!["Spanish"]);
        assert_eq!(target.name(), "#1");
        assert_eq!(target.weights, RankingWeights::default());
        assert_eq!(target.scoring, ScoringParams::default());
        assert_eq!(target.familiarity, FamiliaritySettings::default());
        assert_eq!(target.segmentation, CorpusSegmentationStrategy::ByLangDataId);
        assert_eq!(
            target.lang_data_ids(),
            [LangDataId::new("es"), LangDataId::new("en")].into_iter().collect()
        );
        assert_eq!(
            target.main_scope_query(),
            "(\"deck:Spanish\") AND (\"note:Basic\")"
        );
        assert!(target.reorder_scope_query().is_none());
    }

    #[test]
    fn test_parse_full_target() {
        let target = parse(json!({
            "id": "spanish_main",
            "decks": "Spanish, Latin\\, Greek",
            "scope_query": "tag:vocab",
            "reorder_scope_query": "is:new",
            "notes": [{ "name": "Basic", "fields": { "Front": "es" } }],
            "ranking_factors": { "word_frequency": 1.5, "ideal_unseen_word_count": "2" },
            "ranking_familiarity": 0.5,
            "familiarity_sweetspot_point": "^1.1",
            "focus_words_max_familiarity": 0.4,
            "maturity_min_num_cards": 3,
            "suspended_card_value": 0.1,
            "ideal_word_count": [1, 4],
            "corpus_segmentation_strategy": "BY_NOTE_MODEL_ID_AND_FIELD_NAME"
        }))
        .unwrap();

        assert_eq!(target.name(), "spanish_main");
        assert_eq!(target.decks, vec!["Spanish", "Latin, Greek"]);
        assert_eq!(target.weights.get(RankingFactor::WordFrequency), 1.5);
        assert_eq!(target.weights.get(RankingFactor::IdealNewWordCount), 2.0);
        assert_eq!(target.weights.get(RankingFactor::Familiarity), 0.5);
        assert_eq!(target.weights.get(RankingFactor::IdealFocusWordCount), 0.0);
        assert_eq!(target.scoring.sweetspot_point, SweetspotPoint::RelativeToMedian(1.1));
        assert_eq!(target.scoring.ideal_word_count_min, 1);
        assert_eq!(target.scoring.ideal_word_count_max, 4);
        assert_eq!(target.familiarity.maturity_threshold, 0.4);
        assert_eq!(target.familiarity.maturity_min_num_cards, 3);
        assert_eq!(target.familiarity.suspended_card_value, 0.1);
        assert_eq!(target.segmentation, CorpusSegmentationStrategy::ByNoteModelIdAndFieldName);
        assert_eq!(
            target.main_scope_query(),
            "(\"deck:Spanish\" OR \"deck:Latin, Greek\" OR (tag:vocab)) AND (\"note:Basic\")"
        );
        assert_eq!(
            target.reorder_scope_query().unwrap(),
            format!("{} AND (is:new)", target.main_scope_query())
        );
    }

    #[test]
    fn test_invalid_targets() {
        let with = |key: &str, value: Value| {
            let mut target = basic();
            target[key] = value;
            parse(target).unwrap_err()
        };

        assert!(with("unknown_key", json!(1)).is_configuration());
        assert!(with("id", json!("has space")).is_configuration());
        assert!(with("ranking_factors", json!({ "nope": 1 })).is_configuration());
        assert!(with("ranking_nope", json!(1)).is_configuration());
        assert!(with("ideal_word_count", json!([5, 2])).is_configuration());
        assert!(with("ideal_word_count", json!([0, 2])).is_configuration());
        assert!(with("maturity_threshold", json!(1.5)).is_configuration());
        assert!(with("suspended_card_value", json!("a lot")).is_configuration());
        assert!(with("corpus_segmentation_strategy", json!("by_magic")).is_configuration());
        assert!(with("notes", json!([])).is_configuration());
        assert!(with("notes", json!([{ "name": "Basic", "fields": {} }])).is_configuration());
        let empty_field = json!([{ "name": "Basic", "fields": { "Front": "" } }]);
        assert!(with("notes", empty_field).is_configuration());

        assert!(parse(json!({ "notes": basic()["notes"] })).unwrap_err().is_configuration());
        assert!(parse(json!([])).unwrap_err().is_configuration());
    }

    #[test]
    fn test_ideal_word_count_needs_two_integers() {
        let with = |value: Value| {
            let mut target = basic();
            target["ideal_word_count"] = value;
            parse(target)
        };

        assert!(with(json!([2, "x", 5])).unwrap_err().is_configuration());
        assert!(with(json!([2.5, 5])).unwrap_err().is_configuration());
        assert!(with(json!([-1, 5])).unwrap_err().is_configuration());
        assert!(with(json!([2, null, 5])).unwrap_err().is_configuration());
        assert!(with(json!("2-5")).unwrap_err().is_configuration());

        let target = with(json!([2, 5])).unwrap();
        assert_eq!(target.scoring.ideal_word_count_min, 2);
        assert_eq!(target.scoring.ideal_word_count_max, 5);
    }

    #[test]
    fn test_split_deck_names() {
        assert_eq!(split_deck_names("a, b ,c"), vec!["a", "b", "c"]);
        assert_eq!(split_deck_names("a\\, b, c"), vec!["a, b", "c"]);
        assert_eq!(split_deck_names(" , "), Vec::<String>::new());
    }
}
