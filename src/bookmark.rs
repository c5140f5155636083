use std::path::{Path, PathBuf};

use xxhash_rust::xxh3::xxh3_64;

/// One match found in a scanned file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bookmark {
    /// Absolute byte offset of the first matched byte.
    pub start: usize,
    /// Byte offset one past the last matched byte.
    pub end: usize,
    pub length: usize,
    /// The matched span, decoded with the file's encoding.
    pub text: String,
    /// Resolved replacement id.
    pub id: i32,
    /// xxh3 of the matched bytes, checked again before the span is replaced.
    pub hash: u64,
}

impl Bookmark {
    pub fn new(start: usize, span: &[u8], text: String, id: i32) -> Self {
        Self {
            start,
            end: start + span.len(),
            length: span.len(),
            text,
            id,
            hash: xxh3_64(span),
        }
    }

    /// Whether `span` still holds the bytes this bookmark was taken from.
    pub fn verify(&self, span: &[u8]) -> bool {
        span.len() == self.length && xxh3_64(span) == self.hash
    }

    pub fn overlaps(&self, other: &Bookmark) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// All bookmarks found in one file.
#[derive(Debug, Clone)]
pub struct FileMatches {
    pub path: PathBuf,
    pub bookmarks: Vec<Bookmark>,
}

impl FileMatches {
    pub fn new(path: impl Into<PathBuf>, bookmarks: Vec<Bookmark>) -> Self {
        Self {
            path: path.into(),
            bookmarks,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_sets_offsets() {
        let bookmark = Bookmark::new(4, b"hello", "hello".to_string(), 0);
        assert_eq!(bookmark.start, 4);
        assert_eq!(bookmark.end, 9);
        assert_eq!(bookmark.length, 5);
        assert!(bookmark.verify(b"hello"));
        assert!(!bookmark.verify(b"jello"));
        assert!(!bookmark.verify(b"hell"));
    }

    #[test]
    fn test_overlaps() {
        let a = Bookmark::new(0, b"abc", "abc".into(), 1);
        let b = Bookmark::new(2, b"cd", "cd".into(), 2);
        let c = Bookmark::new(3, b"de", "de".into(), 3);
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
    }
}
