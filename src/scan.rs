//! Byte-by-byte scanning of files through a [`Trie`].
//!
//! The scanner keeps one cursor into the trie. A byte that has no match
//! resets the cursor to the root and is retried there once, so a match can
//! start on the byte that broke the previous attempt. Reaching a terminal node
//! emits a [`Bookmark`] and resets the cursor.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::bookmark::Bookmark;
use crate::encoding::{self, TextEncoding};
use crate::trie::{NodeId, Trie};

/// Growth step of the span buffer once a match outgrows it.
const SPAN_GROWTH: usize = 256;

/// Longest byte-order mark [`encoding::detect`] recognises.
const BOM_PROBE: u64 = 4;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("failed to scan {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Incremental matcher over one byte stream.
pub struct Matcher<'t> {
    trie: &'t Trie,
    encoding: TextEncoding,
    current: NodeId,
    start: usize,
    span: Vec<u8>,
}

impl<'t> Matcher<'t> {
    pub fn new(trie: &'t Trie, encoding: TextEncoding) -> Self {
        Self {
            trie,
            encoding,
            current: trie.root(),
            start: 0,
            span: Vec::with_capacity(SPAN_GROWTH),
        }
    }

    fn reset(&mut self) {
        self.current = self.trie.root();
        self.span.clear();
    }

    /// Feed the byte found at absolute `offset`.
    pub fn feed(&mut self, offset: usize, byte: u8) -> Option<Bookmark> {
        let Some(next) = self.trie.get_match(self.current, byte) else {
            let restarted = self.current != self.trie.root();
            self.reset();
            return if restarted { self.feed(offset, byte) } else { None };
        };

        if self.span.is_empty() {
            self.start = offset;
        }
        if self.span.len() == self.span.capacity() {
            self.span.reserve(SPAN_GROWTH);
        }
        self.span.push(byte);
        self.current = next;

        if !self.trie.is_terminal(next) {
            return None;
        }
        let bookmark = match self.trie.value(next) {
            Ok(id) => Some(Bookmark::new(
                self.start,
                &self.span,
                self.encoding.decode(&self.span),
                id,
            )),
            Err(err) => {
                tracing::warn!(offset = self.start, error = %err, "skipping unresolvable match");
                None
            }
        };
        self.reset();
        bookmark
    }
}

/// Scan an in-memory buffer, honouring a leading byte-order mark.
pub fn scan_bytes(trie: &Trie, bytes: &[u8]) -> Vec<Bookmark> {
    let (encoding, bom_len) = encoding::detect(bytes);
    let mut matcher = Matcher::new(trie, encoding);
    bytes
        .iter()
        .enumerate()
        .skip(bom_len)
        .filter_map(|(offset, &byte)| matcher.feed(offset, byte))
        .collect()
}

/// Scan the file at `path` as a stream.
pub fn scan_file(trie: &Trie, path: &Path) -> Result<Vec<Bookmark>, ScanError> {
    let io_err = |source: io::Error| ScanError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = BufReader::new(File::open(path).map_err(io_err)?);

    let mut head = Vec::with_capacity(BOM_PROBE as usize);
    reader
        .by_ref()
        .take(BOM_PROBE)
        .read_to_end(&mut head)
        .map_err(io_err)?;
    let (encoding, bom_len) = encoding::detect(&head);

    let mut matcher = Matcher::new(trie, encoding);
    let mut bookmarks = Vec::new();
    let mut offset = bom_len;
    for &byte in &head[bom_len..] {
        bookmarks.extend(matcher.feed(offset, byte));
        offset += 1;
    }
    for byte in reader.bytes() {
        bookmarks.extend(matcher.feed(offset, byte.map_err(io_err)?));
        offset += 1;
    }

    tracing::debug!(
        path = %path.display(),
        encoding = encoding.name(),
        matches = bookmarks.len(),
        "scanned file"
    );
    Ok(bookmarks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trie::MatchMode;

    fn trie_of(patterns: &[(&str, i32)]) -> Trie {
        let mut trie = Trie::new();
        for (pattern, id) in patterns {
            trie.insert(pattern.as_bytes(), *id).unwrap();
        }
        trie
    }

    #[test]
    fn test_single_match_offsets() {
        let trie = trie_of(&[("hello", 0)]);
        let found = scan_bytes(&trie, b"say hello there");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].start, 4);
        assert_eq!(found[0].length, 5);
        assert_eq!(found[0].end, 9);
        assert_eq!(found[0].id, 0);
        assert_eq!(found[0].text, "hello");
    }

    #[test]
    fn test_multiple_patterns() {
        let trie = trie_of(&[("cat", 1), ("dog", 2)]);
        let found = scan_bytes(&trie, b"cat and dog and cat");
        let ids: Vec<_> = found.iter().map(|b| (b.start, b.id)).collect();
        assert_eq!(ids, vec![(0, 1), (8, 2), (16, 1)]);
    }

    #[test]
    fn test_mismatch_retries_byte_at_root() {
        let trie = trie_of(&[("ab", 1)]);
        let found = scan_bytes(&trie, b"aab");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].start, 1);
    }

    #[test]
    fn test_terminal_match_emits_shortest() {
        let trie = trie_of(&[("hell", 1), ("hello", 2)]);
        let found = scan_bytes(&trie, b"hello");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, 1);
        assert_eq!(found[0].length, 4);
    }

    #[test]
    fn test_offsets_include_bom() {
        let trie = trie_of(&[("hi", 3)]);
        let found = scan_bytes(&trie, b"\xEF\xBB\xBFhi");
        assert_eq!(found[0].start, 3);
        assert_eq!(found[0].text, "hi");
    }

    #[test]
    fn test_long_match_grows_span() {
        let pattern = "x".repeat(SPAN_GROWTH * 3);
        let trie = trie_of(&[(&pattern, 5)]);
        let text = format!("..{pattern}..");
        let found = scan_bytes(&trie, text.as_bytes());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].length, SPAN_GROWTH * 3);
        assert_eq!(found[0].start, 2);
    }

    #[test]
    fn test_fuzzy_trie_scan() {
        let trie = trie_of(&[("hello", 0)]).with_mode(MatchMode::Fuzzy);
        let found = scan_bytes(&trie, b"a gello!");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].text, "gello");
    }

    #[test]
    fn test_scan_file_matches_scan_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("input.txt");
        let content = b"\xEF\xBB\xBFone hello, two hello";
        std::fs::write(&path, content).unwrap();

        let trie = trie_of(&[("hello", 0)]);
        assert_eq!(scan_file(&trie, &path).unwrap(), scan_bytes(&trie, content));
    }

    #[test]
    fn test_scan_missing_file() {
        let trie = Trie::new();
        let err = scan_file(&trie, Path::new("/nonexistent/multigrep/input")).unwrap_err();
        assert!(matches!(err, ScanError::Io { .. }));
    }
}
