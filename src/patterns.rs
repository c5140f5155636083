//! Pattern file reader.
//!
//! A pattern file holds one entry per line: the first quoted span is the
//! pattern, the second is its replacement. Reading stops at the first blank
//! line.
//!
//! ```text
//! "hello" "HELLO_ID"
//! "world" "WORLD_ID"
//! ```

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::trie::{rules, Trie, TrieError};

pub const DEFAULT_QUOTE: char = '"';

#[derive(Error, Debug)]
pub enum PatternFileError {
    #[error("failed to read pattern file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("line {line}: {reason}")]
    Malformed { line: usize, reason: String },
}

/// Replacement strings, de-duplicated. An id is the index at which a string
/// first appeared.
#[derive(Debug, Clone, Default)]
pub struct ReplacementTable {
    entries: Vec<String>,
    index: HashMap<String, i32>,
}

impl ReplacementTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the id for `replacement`, allocating the next one if unseen.
    pub fn intern(&mut self, replacement: &str) -> i32 {
        if let Some(&id) = self.index.get(replacement) {
            return id;
        }
        let id = self.entries.len() as i32;
        self.entries.push(replacement.to_string());
        self.index.insert(replacement.to_string(), id);
        id
    }

    pub fn get(&self, id: i32) -> Option<&str> {
        usize::try_from(id)
            .ok()
            .and_then(|idx| self.entries.get(idx))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Patterns and the replacement ids they were paired with, in first-seen
/// order.
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    entries: Vec<(Vec<u8>, BTreeSet<i32>)>,
    index: HashMap<Vec<u8>, usize>,
    replacements: ReplacementTable,
}

impl PatternSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pair `pattern` with `replacement`. Empty patterns are ignored.
    pub fn push(&mut self, pattern: &str, replacement: &str) {
        let id = self.replacements.intern(replacement);
        if pattern.is_empty() {
            return;
        }
        let key = pattern.as_bytes().to_vec();
        match self.index.get(&key) {
            Some(&slot) => {
                self.entries[slot].1.insert(id);
            }
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, BTreeSet::from([id])));
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&[u8], &BTreeSet<i32>)> {
        self.entries.iter().map(|(pattern, ids)| (pattern.as_slice(), ids))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn replacements(&self) -> &ReplacementTable {
        &self.replacements
    }

    /// Build the matching trie. With `syntax`, each pattern is compiled
    /// through the rule compiler instead of being taken literally.
    pub fn build_trie(&self, syntax: bool) -> Result<Trie, TrieError> {
        if !syntax {
            return Trie::build(self.iter().map(|(pattern, ids)| (pattern, ids.iter())));
        }
        let mut trie = Trie::new();
        for (pattern, ids) in self.iter() {
            let Some(&id) = ids.first() else { continue };
            let compiled = rules::compile(pattern)?;
            trie.insert_rules(&compiled, id)?;
        }
        Ok(trie)
    }
}

/// Parse pattern file contents.
pub fn parse(text: &str, quote: char) -> Result<PatternSet, PatternFileError> {
    let mut set = PatternSet::new();
    for (idx, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            break;
        }
        let spans: Vec<&str> = line.split(quote).collect();
        if spans.len() < 5 {
            return Err(PatternFileError::Malformed {
                line: idx + 1,
                reason: format!("expected two {quote}-quoted values"),
            });
        }
        set.push(spans[1], spans[3]);
    }
    Ok(set)
}

/// Read and parse the pattern file at `path`.
pub fn read_patterns(path: &Path, quote: char) -> Result<PatternSet, PatternFileError> {
    let bytes = fs::read(path).map_err(|source| PatternFileError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let set = parse(&String::from_utf8_lossy(&bytes), quote)?;
    tracing::info!(
        path = %path.display(),
        patterns = set.len(),
        replacements = set.replacements().len(),
        "read patterns"
    );
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pairs() {
        let set = parse("\"hello\" \"HELLO_ID\"\n\"world\" \"WORLD_ID\"\n", '"').unwrap();
        assert_eq!(set.len(), 2);
        let entries: Vec<_> = set.iter().collect();
        assert_eq!(entries[0].0, b"hello");
        assert_eq!(entries[0].1, &BTreeSet::from([0]));
        assert_eq!(entries[1].1, &BTreeSet::from([1]));
        assert_eq!(set.replacements().get(0), Some("HELLO_ID"));
        assert_eq!(set.replacements().get(1), Some("WORLD_ID"));
        assert_eq!(set.replacements().get(2), None);
        assert_eq!(set.replacements().get(-1), None);
    }

    #[test]
    fn test_replacements_deduplicate() {
        let set = parse("\"a\" \"X\"\n\"b\" \"Y\"\n\"c\" \"X\"\n", '"').unwrap();
        assert_eq!(set.replacements().len(), 2);
        let ids: Vec<_> = set.iter().map(|(_, ids)| ids.clone()).collect();
        assert_eq!(ids[2], BTreeSet::from([0]));
    }

    #[test]
    fn test_duplicate_pattern_collects_ids() {
        let set = parse("'k' 'one'\n'k' 'two'\n", '\'').unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.iter().next().unwrap().1, &BTreeSet::from([0, 1]));
    }

    #[test]
    fn test_blank_line_terminates() {
        let set = parse("\"a\" \"A\"\n\n\"b\" \"B\"\n", '"').unwrap();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_empty_pattern_dropped() {
        let set = parse("\"\" \"EMPTY\"\n\"x\" \"X\"\n", '"').unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.replacements().get(1), Some("X"));
    }

    #[test]
    fn test_malformed_line() {
        let err = parse("\"a\" \"A\"\n\"b\" B\n", '"').unwrap_err();
        assert!(matches!(err, PatternFileError::Malformed { line: 2, .. }));
    }

    #[test]
    fn test_build_trie_literal_and_syntax() {
        let set = parse("\"v.\" \"ANY\"\n", '"').unwrap();
        let literal = set.build_trie(false).unwrap();
        assert_eq!(literal.localize(b"v."), Some(0));
        assert_eq!(literal.localize(b"vx"), None);

        let compiled = set.build_trie(true).unwrap();
        assert_eq!(compiled.localize(b"vx"), Some(0));
    }

    #[test]
    fn test_build_trie_rejects_bad_syntax() {
        let set = parse("\"a+\" \"A\"\n", '"').unwrap();
        assert!(matches!(set.build_trie(true), Err(TrieError::Rule(_))));
    }

    #[test]
    fn test_read_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_patterns(&dir.path().join("none.txt"), '"').unwrap_err();
        assert!(matches!(err, PatternFileError::Io { .. }));
    }
}
