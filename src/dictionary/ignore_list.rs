use std::{
    collections::HashSet,
    fs,
    path::{
        Path,
        PathBuf,
    },
};

use tracing::debug;

use crate::core::ReorderError;

/// Unordered set of lowercase words that never take part in ranking (ignore lists and
/// names lists alike).
#[derive(Debug, Clone, Default)]
pub struct IgnoreList {
    words: HashSet<String>,
}

impl IgnoreList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut list = Self::new();
        for word in words {
            list.add_term(word.as_ref());
        }
        list
    }

    /// `ignore*.txt` files inside one language directory.
    pub fn load_for_language(lang_dir: &Path) -> Result<Self, ReorderError> {
        Self::load_files(&files_with_prefix(lang_dir, &["ignore"])?)
    }

    /// `ignore*.txt` and `names*.txt` at the root of the language data dir, applied to every
    /// language.
    pub fn load_shared(data_dir: &Path) -> Result<Self, ReorderError> {
        Self::load_files(&files_with_prefix(data_dir, &["ignore", "names"])?)
    }

    pub fn load_files(files: &[PathBuf]) -> Result<Self, ReorderError> {
        let mut list = Self::new();
        for file in files {
            let terms = load_terms_from_file(file)?;
            debug!("Loaded {} ignored words from {}", terms.len(), file.display());
            for term in terms {
                list.add_term(&term);
            }
        }
        Ok(list)
    }

    pub fn add_term(&mut self, term: &str) -> bool {
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            return false;
        }
        self.words.insert(term)
    }

    pub fn contains(&self, term: &str) -> bool {
        self.words.contains(term)
    }

    pub fn extend(&mut self, other: &IgnoreList) {
        self.words.extend(other.words.iter().cloned());
    }

    pub fn words(&self) -> &HashSet<String> {
        &self.words
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

pub fn load_terms_from_file(path: &Path) -> Result<Vec<String>, ReorderError> {
    let content = fs::read_to_string(path).map_err(|e| {
        ReorderError::Custom(format!("Failed to read file {}: {}", path.display(), e))
    })?;

    Ok(content
        .lines()
        .map(|line| line.trim().to_lowercase())
        .filter(|line| !line.is_empty())
        .collect())
}

fn files_with_prefix(dir: &Path, prefixes: &[&str]) -> Result<Vec<PathBuf>, ReorderError> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
            name.ends_with(".txt") && prefixes.iter().any(|prefix| name.starts_with(prefix))
        })
        .collect();
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_and_language_lists() {
        let dir = tempfile::tempdir().unwrap();
        let lang_dir = dir.path().join("en");
        fs::create_dir_all(&lang_dir).unwrap();
        fs::write(lang_dir.join("ignore.txt"), "The\n\n  a \n").unwrap();
        fs::write(lang_dir.join("list.txt"), "hello\n").unwrap();
        fs::write(dir.path().join("names.txt"), "John\nMary\n").unwrap();
        fs::write(dir.path().join("ignore_shared.txt"), "etc\n").unwrap();

        let language = IgnoreList::load_for_language(&lang_dir).unwrap();
        assert_eq!(language.len(), 2);
        assert!(language.contains("the"));
        assert!(!language.contains("hello"));

        let shared = IgnoreList::load_shared(dir.path()).unwrap();
        assert!(shared.contains("john"));
        assert!(shared.contains("etc"));
        assert!(!shared.contains("the"));

        let mut combined = language.clone();
        combined.extend(&shared);
        assert_eq!(combined.len(), 5);
    }

    #[test]
    fn test_missing_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let list = IgnoreList::load_for_language(&dir.path().join("nope")).unwrap();
        assert!(list.is_empty());
    }
}
