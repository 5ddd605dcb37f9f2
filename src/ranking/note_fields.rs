use std::fmt::Write as _;

use super::{
    metrics::{
        CardWordData,
        FieldWordData,
        WordScores,
    },
    ranker::NoteRanking,
};
use crate::{
    collection::{
        FieldWrite,
        NoteModel,
        WritePolicy,
    },
    core::{
        utils::fmean,
        ReorderError,
    },
};

pub const FIELD_SEPARATOR: &str = " | ";
pub const STATIC_SUFFIX: &str = "_static";

pub const FOCUS_WORDS: &str = "fm_focus_words";
pub const NEW_WORDS: &str = "fm_new_words";
pub const UNSEEN_WORDS: &str = "fm_unseen_words";
pub const SEEN_WORDS: &str = "fm_seen_words";
pub const LOWEST_FR_WORD: &str = "fm_lowest_fr_word";
pub const LOWEST_FAMILIARITY_WORD: &str = "fm_lowest_familiarity_word";
pub const MAIN_FOCUS_WORD: &str = "fm_main_focus_word";
pub const DEBUG_INFO: &str = "fm_debug_info";
pub const DEBUG_RANKING_INFO: &str = "fm_debug_ranking_info";
pub const DEBUG_WORDS_INFO: &str = "fm_debug_words_info";

fn join_words(words: &[&WordScores]) -> String {
    words.iter().map(|w| w.word.as_str()).collect::<Vec<_>>().join(", ")
}

/// One slot per field, so the n-th segment always belongs to the n-th field. Empty when no
/// field has a value.
fn per_field<F>(data: &CardWordData, value_of: F) -> String
where
    F: Fn(&FieldWordData) -> String,
{
    let values: Vec<String> = data.fields.iter().map(value_of).collect();
    if values.iter().all(String::is_empty) {
        return String::new();
    }
    values.join(FIELD_SEPARATOR)
}

fn single_word(word: Option<&WordScores>) -> String {
    word.map(|w| w.word.to_string()).unwrap_or_default()
}

fn debug_info(data: &CardWordData) -> String {
    let mut info = String::new();
    let lines: [(&str, fn(&FieldWordData) -> String); 6] = [
        ("word_count", |f| f.word_count().to_string()),
        ("focus_word_count", |f| f.focus_words().len().to_string()),
        ("new_word_count", |f| f.new_words().len().to_string()),
        ("frequency_mean", |f| format!("{:.3}", fmean(&f.frequencies()))),
        ("familiarity_mean", |f| format!("{:.3}", fmean(&f.familiarities()))),
        ("lowest_fr_least_familiar_word", |f| single_word(f.lowest_fr_least_familiar_word())),
    ];
    for (name, value_of) in lines {
        let _ = writeln!(info, "{}: {}<br />", name, per_field(data, value_of));
    }
    info
}

fn debug_ranking_info(ranking: &NoteRanking) -> String {
    let mut info = format!("rank: {:.3}<br />\n", ranking.rank);
    for (factor, raw) in &ranking.factor_scores {
        match ranking.normalized_scores.get(factor) {
            Some(normalized) => {
                let _ = writeln!(info, "{}: {:.3} ({:.3})<br />", factor, raw, normalized);
            }
            None => {
                let _ = writeln!(info, "{}: {:.3}<br />", factor, raw);
            }
        }
    }
    info
}

fn debug_words_info(data: &CardWordData) -> Result<String, ReorderError> {
    let fields = data
        .fields
        .iter()
        .map(|f| serde_json::to_string(&f.unique_words()))
        .collect::<Result<Vec<String>, _>>()?;
    Ok(fields.join(FIELD_SEPARATOR))
}

/// Writes a value to `name` (live) and to `name_static` (set once), for whichever exist.
fn push_word_field(
    writes: &mut Vec<FieldWrite>,
    model: &NoteModel,
    data: &CardWordData,
    name: &str,
    value: &str,
) {
    if model.has_field(name) {
        writes.push(FieldWrite {
            note_id: data.note_id,
            field: name.to_string(),
            value: value.to_string(),
            policy: WritePolicy::Live,
        });
    }
    let static_name = format!("{}{}", name, STATIC_SUFFIX);
    if model.has_field(&static_name) && !value.is_empty() {
        writes.push(FieldWrite {
            note_id: data.note_id,
            field: static_name,
            value: value.to_string(),
            policy: WritePolicy::SetOnce,
        });
    }
}

/// Field writes for one note. `ranking` is `None` for notes without new cards: their debug and
/// word list fields are cleared, the focus word fields stay current.
pub fn note_field_writes(
    model: &NoteModel,
    data: &CardWordData,
    ranking: Option<&NoteRanking>,
) -> Result<Vec<FieldWrite>, ReorderError> {
    let mut writes = Vec::new();

    let focus_words = per_field(data, |f| join_words(&f.focus_words()));
    push_word_field(&mut writes, model, data, FOCUS_WORDS, &focus_words);
    let main_focus_word = per_field(data, |f| single_word(f.main_focus_word()));
    push_word_field(&mut writes, model, data, MAIN_FOCUS_WORD, &main_focus_word);
    let lowest_fr_word = per_field(data, |f| single_word(f.lowest_fr_word()));
    push_word_field(&mut writes, model, data, LOWEST_FR_WORD, &lowest_fr_word);
    let lowest_familiarity_word = per_field(data, |f| single_word(f.lowest_familiarity_word()));
    push_word_field(&mut writes, model, data, LOWEST_FAMILIARITY_WORD, &lowest_familiarity_word);

    let (new_words, seen_words) = match ranking {
        Some(_) => (
            per_field(data, |f| join_words(&f.new_words())),
            per_field(data, |f| join_words(&f.seen_words())),
        ),
        None => (String::new(), String::new()),
    };
    push_word_field(&mut writes, model, data, NEW_WORDS, &new_words);
    push_word_field(&mut writes, model, data, UNSEEN_WORDS, &new_words);
    push_word_field(&mut writes, model, data, SEEN_WORDS, &seen_words);

    let debug = match ranking {
        Some(ranking) => [
            (DEBUG_INFO, debug_info(data)),
            (DEBUG_RANKING_INFO, debug_ranking_info(ranking)),
            (DEBUG_WORDS_INFO, debug_words_info(data)?),
        ],
        None => [
            (DEBUG_INFO, String::new()),
            (DEBUG_RANKING_INFO, String::new()),
            (DEBUG_WORDS_INFO, String::new()),
        ],
    };
    for (name, value) in debug {
        if model.has_field(name) {
            writes.push(FieldWrite {
                note_id: data.note_id,
                field: name.to_string(),
                value,
                policy: WritePolicy::Live,
            });
        }
    }

    Ok(writes)
}
