use std::{
    collections::{
        HashMap,
        HashSet,
    },
    fs::{
        self,
        File,
    },
    io::{
        BufReader,
        Read,
        Write,
    },
    path::{
        Path,
        PathBuf,
    },
    time::{
        Instant,
        UNIX_EPOCH,
    },
};

use serde::{
    Deserialize,
    Serialize,
};
use tracing::{
    debug,
    info,
    warn,
};

use super::{
    LangDataId,
    LangId,
};
use crate::{
    core::{
        utils::normalize_positional_with_ties,
        ReorderError,
    },
    segmentation::{
        is_acceptable_word,
        WordToken,
    },
};

const HEADER_COLUMNS: &[&str] = &["frequency", "freq", "ngram", "word", "count"];

/// Word to frequency score in [0,1] for one language data id. Words on an ignore or names list
/// are never present.
#[derive(Debug, Clone, Default)]
pub struct WordFrequencyIndex {
    scores: HashMap<WordToken, f32>,
}

impl WordFrequencyIndex {
    /// Builds the index from best (1-based) positions. Scores are positional with ties over the
    /// remaining words, so a single list gives `1 - rank / len`.
    pub fn from_positions(positions: &HashMap<String, u32>, excluded: &HashSet<String>) -> Self {
        let inverted: HashMap<WordToken, f32> = positions
            .iter()
            .filter(|(word, _)| !excluded.contains(word.as_str()))
            .map(|(word, position)| (WordToken::from(word.as_str()), -(*position as f32)))
            .collect();

        if inverted.is_empty() {
            return Self::default();
        }

        Self { scores: normalize_positional_with_ties(&inverted) }
    }

    /// Ranked word lists (most frequent first) merged by best position.
    #[cfg(test)]
    pub(crate) fn from_ranked_lists(lists: &[Vec<&str>], excluded: &HashSet<String>) -> Self {
        let parsed = lists.iter().map(|list| {
            list.iter()
                .enumerate()
                .map(|(i, word)| (word.to_lowercase(), i as u32 + 1))
                .collect::<Vec<(String, u32)>>()
        });
        Self::from_positions(&combine_lists_by_top_position(parsed), excluded)
    }

    /// `None` for unknown and excluded words.
    pub fn get(&self, word: &str) -> Option<f32> {
        self.scores.get(word).copied()
    }

    pub fn score(&self, word: &str) -> f32 {
        self.get(word).unwrap_or(0.0)
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

/// Frequency list files in a language directory: `*.txt` and `*.csv`, except `ignore*` files.
pub fn get_list_files(lang_dir: &Path) -> Result<Vec<PathBuf>, ReorderError> {
    let mut files: Vec<PathBuf> = fs::read_dir(lang_dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
            (name.ends_with(".txt") || name.ends_with(".csv")) && !name.starts_with("ignore")
        })
        .collect();
    files.sort();
    Ok(files)
}

/// Parses one list into `(word, position)` pairs. Positions start at 1 and only advance for
/// acceptable words.
pub fn parse_frequency_list(content: &str, is_csv: bool, lang_id: &LangId) -> Vec<(String, u32)> {
    let delimiter = if is_csv { ',' } else { ' ' };
    let mut word_column = 0;
    let mut position = 1;
    let mut words = Vec::new();

    for (line_index, line) in content.lines().enumerate() {
        let columns: Vec<&str> =
            line.split(delimiter).map(|c| c.trim().trim_matches('"')).collect();

        if line_index == 0 && columns.len() > 1 {
            if columns[1] == "Morph-Inflection" {
                word_column = 1;
            }
            if columns.iter().any(|c| HEADER_COLUMNS.contains(&c.to_lowercase().as_str())) {
                continue;
            }
        }

        let Some(word) = columns.get(word_column) else {
            continue;
        };
        let word = word.trim().to_lowercase();

        if is_acceptable_word(&word, lang_id) {
            words.push((word, position));
            position += 1;
        }
    }

    words
}

/// Each word keeps its best (lowest) position across all lists.
pub fn combine_lists_by_top_position<I, L>(lists: I) -> HashMap<String, u32>
where
    I: IntoIterator<Item = L>,
    L: IntoIterator<Item = (String, u32)>,
{
    let mut combined: HashMap<String, u32> = HashMap::new();
    for list in lists {
        for (word, position) in list {
            combined
                .entry(word)
                .and_modify(|best| *best = (*best).min(position))
                .or_insert(position);
        }
    }
    combined
}

#[derive(Debug, Serialize, Deserialize)]
struct FrequencyListCache {
    revision: String,
    positions: HashMap<String, u32>,
}

/// Changes whenever a list file is added, removed, resized or touched.
fn directory_revision(files: &[PathBuf]) -> String {
    files
        .iter()
        .map(|path| {
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
            let (len, modified) = fs::metadata(path)
                .map(|meta| {
                    let modified = meta
                        .modified()
                        .ok()
                        .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
                        .map(|d| d.as_secs())
                        .unwrap_or_default();
                    (meta.len(), modified)
                })
                .unwrap_or_default();
            format!("{}:{}:{}", name, len, modified)
        })
        .collect::<Vec<_>>()
        .join(";")
}

fn load_cached_positions(cache_path: &Path) -> Result<FrequencyListCache, ReorderError> {
    let file = File::open(cache_path)?;
    let mut reader = BufReader::new(file);
    let mut buffer = Vec::new();
    reader.read_to_end(&mut buffer)?;

    let (cache, _): (FrequencyListCache, usize) =
        bincode::serde::decode_from_slice(&buffer, bincode::config::standard())?;
    Ok(cache)
}

fn save_cached_positions(
    cache: &FrequencyListCache,
    cache_path: &Path,
) -> Result<(), ReorderError> {
    if let Some(parent) = cache_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let encoded = bincode::serde::encode_to_vec(cache, bincode::config::standard())?;
    let mut file = File::create(cache_path)?;
    file.write_all(&encoded)?;
    Ok(())
}

fn parse_list_files(
    files: &[PathBuf],
    lang_id: &LangId,
) -> Result<HashMap<String, u32>, ReorderError> {
    let mut lists = Vec::with_capacity(files.len());
    for path in files {
        let content = fs::read_to_string(path)?;
        let is_csv = path.extension().and_then(|e| e.to_str()) == Some("csv");
        let words = parse_frequency_list(&content, is_csv, lang_id);
        debug!("Parsed {} words from {}", words.len(), path.display());
        lists.push(words);
    }
    Ok(combine_lists_by_top_position(lists))
}

/// Reads all lists of one language directory, going through the bincode cache when a cache dir
/// is given and the directory revision still matches.
pub fn load_positions(
    lang_data_id: &LangDataId,
    lang_dir: &Path,
    cache_dir: Option<&Path>,
) -> Result<HashMap<String, u32>, ReorderError> {
    let start = Instant::now();
    let files = get_list_files(lang_dir)?;
    if files.is_empty() {
        warn!("No word frequency list found for '{}'", lang_data_id);
        return Ok(HashMap::new());
    }

    let revision = directory_revision(&files);
    let cache_path = cache_dir.map(|dir| dir.join(format!("frequency_{}.bin", lang_data_id)));

    if let Some(cache_path) = &cache_path {
        match load_cached_positions(cache_path) {
            Ok(cache) if cache.revision == revision => {
                info!(
                    "Loaded '{}' frequency lists from cache: {} words ({:.1}s)",
                    lang_data_id,
                    cache.positions.len(),
                    start.elapsed().as_secs_f32()
                );
                return Ok(cache.positions);
            }
            Ok(_) => debug!("Revision mismatch for '{}' frequency cache", lang_data_id),
            Err(e) => debug!("No usable frequency cache for '{}': {}", lang_data_id, e),
        }
    }

    let lang_id = lang_data_id.lang_id();
    let positions = parse_list_files(&files, &lang_id)?;
    info!(
        "Loaded '{}' frequency lists from {} file(s): {} words ({:.1}s)",
        lang_data_id,
        files.len(),
        positions.len(),
        start.elapsed().as_secs_f32()
    );

    if let Some(cache_path) = &cache_path {
        let cache = FrequencyListCache { revision, positions };
        if let Err(e) = save_cached_positions(&cache, cache_path) {
            warn!("Failed to save frequency cache for '{}': {}", lang_data_id, e);
        }
        return Ok(cache.positions);
    }

    Ok(positions)
}
