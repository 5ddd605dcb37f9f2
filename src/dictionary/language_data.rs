use std::{
    collections::{
        HashMap,
        HashSet,
    },
    path::{
        Path,
        PathBuf,
    },
    time::Instant,
};

use rayon::iter::{
    IntoParallelIterator,
    ParallelIterator,
};
use tracing::info;

use super::{
    frequency_list::load_positions,
    IgnoreList,
    LangDataId,
    WordFrequencyIndex,
};
use crate::core::ReorderError;

#[derive(Debug, Clone, Default)]
pub struct LanguageLists {
    pub frequency: WordFrequencyIndex,
    /// Language ignore lists merged with the shared ignore and names lists.
    pub ignored: IgnoreList,
}

/// Read-only snapshot of every language data id a reorder needs. Built before scoring starts
/// and passed by reference afterwards.
#[derive(Debug)]
pub struct LanguageData {
    data_dir: PathBuf,
    cache_dir: Option<PathBuf>,
    shared_ignored: IgnoreList,
    languages: HashMap<LangDataId, LanguageLists>,
}

impl LanguageData {
    pub fn new(data_dir: &Path) -> Result<Self, ReorderError> {
        if !data_dir.is_dir() {
            return Err(ReorderError::Configuration(format!(
                "Invalid language data directory. Directory not found: {}",
                data_dir.display()
            )));
        }

        Ok(Self {
            data_dir: data_dir.to_path_buf(),
            cache_dir: None,
            shared_ignored: IgnoreList::load_shared(data_dir)?,
            languages: HashMap::new(),
        })
    }

    pub fn with_cache_dir(mut self, cache_dir: Option<PathBuf>) -> Self {
        self.cache_dir = cache_dir;
        self
    }

    /// Snapshot without a backing directory, for callers that already hold the lists.
    pub fn in_memory(languages: HashMap<LangDataId, LanguageLists>) -> Self {
        Self {
            data_dir: PathBuf::new(),
            cache_dir: None,
            shared_ignored: IgnoreList::new(),
            languages,
        }
    }

    pub fn id_has_directory(&self, lang_data_id: &LangDataId) -> bool {
        if lang_data_id.as_str().is_empty() {
            return false;
        }
        if self.languages.contains_key(lang_data_id) {
            return true;
        }
        self.lang_dir(lang_data_id).is_dir()
    }

    fn lang_dir(&self, lang_data_id: &LangDataId) -> PathBuf {
        self.data_dir.join(lang_data_id.as_str())
    }

    /// Loads lists for the ids not loaded yet. A missing directory is a configuration error.
    pub fn load(&mut self, lang_data_ids: &HashSet<LangDataId>) -> Result<(), ReorderError> {
        let pending: Vec<LangDataId> =
            lang_data_ids.iter().filter(|id| !self.languages.contains_key(*id)).cloned().collect();
        if pending.is_empty() {
            return Ok(());
        }

        if let Some(missing) = pending.iter().find(|id| !self.id_has_directory(id)) {
            return Err(ReorderError::Configuration(format!(
                "No directory found for language data id '{}' in {}",
                missing,
                self.data_dir.display()
            )));
        }

        let start = Instant::now();
        let loaded: Vec<(LangDataId, LanguageLists)> = pending
            .into_par_iter()
            .map(|id| -> Result<(LangDataId, LanguageLists), ReorderError> {
                let lang_dir = self.lang_dir(&id);
                let mut ignored = IgnoreList::load_for_language(&lang_dir)?;
                ignored.extend(&self.shared_ignored);
                let positions = load_positions(&id, &lang_dir, self.cache_dir.as_deref())?;
                let frequency = WordFrequencyIndex::from_positions(&positions, ignored.words());
                Ok((id, LanguageLists { frequency, ignored }))
            })
            .collect::<Result<Vec<_>, _>>()?;

        info!(
            "Loaded {} language data set(s) ({:.1}s)",
            loaded.len(),
            start.elapsed().as_secs_f32()
        );
        self.languages.extend(loaded);
        Ok(())
    }

    pub fn lists(&self, lang_data_id: &LangDataId) -> Option<&LanguageLists> {
        self.languages.get(lang_data_id)
    }

    pub fn frequency_index(&self, lang_data_id: &LangDataId) -> Option<&WordFrequencyIndex> {
        self.lists(lang_data_id).map(|lists| &lists.frequency)
    }

    /// `default` for unknown words and ids.
    pub fn word_frequency(&self, lang_data_id: &LangDataId, word: &str, default: f32) -> f32 {
        self.frequency_index(lang_data_id).and_then(|index| index.get(word)).unwrap_or(default)
    }

    pub fn is_ignored(&self, lang_data_id: &LangDataId, word: &str) -> bool {
        match self.lists(lang_data_id) {
            Some(lists) => lists.ignored.contains(word),
            None => self.shared_ignored.contains(word),
        }
    }
}
