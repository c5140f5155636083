//! Multigrep: batch multi-pattern rewriting of files in place
//!
//! Many literal patterns are compiled into one byte trie. Every input file is
//! streamed through the trie once, and each match becomes a [`Bookmark`]
//! naming the replacement it maps to. Files with matches are then rewritten
//! by splicing replacements into the original bytes.
//!
//! # Architecture
//!
//! - [`trie`]: arena-backed pattern trie with exact and fuzzy matching, plus
//!   a compact binary format ([`trie::codec`]).
//! - [`scan`]: the byte-by-byte matcher producing bookmarks.
//! - [`rewrite`]: hash-verified span splicing and atomic file replacement.
//! - [`pipeline`]: concurrent scan and write stages over a shared worker pool.
//!
//! # Safety
//!
//! - Every span is re-hashed before it is replaced
//! - Atomic file writes (tempfile + fsync + rename)
//! - Enumeration stays inside the requested roots
//! - A failing file never stops the rest of the run
//!
//! # Example
//!
//! ```
//! use multigrep::{patterns, scan};
//!
//! let set = patterns::parse("\"hello\" \"HELLO\"\n", '"').unwrap();
//! let trie = set.build_trie(false).unwrap();
//!
//! let found = scan::scan_bytes(&trie, b"say hello");
//! assert_eq!(found[0].start, 4);
//! assert_eq!(set.replacements().get(found[0].id), Some("HELLO"));
//! ```

pub mod bookmark;
pub mod config;
pub mod discover;
pub mod distance;
pub mod encoding;
pub mod patterns;
pub mod pipeline;
pub mod pool;
pub mod rewrite;
pub mod safety;
pub mod scan;
pub mod trie;

// Re-exports
pub use bookmark::{Bookmark, FileMatches};
pub use config::{ConfigError, RunConfig};
pub use encoding::TextEncoding;
pub use patterns::{PatternFileError, PatternSet, ReplacementTable};
pub use pipeline::{
    CancelToken, MatchLog, MatchRecord, Monitor, Pipeline, PipelineError, PipelineReport,
    Progress,
};
pub use rewrite::{RewriteError, RewriteOptions, RewriteOutcome};
pub use safety::{RootGuard, SafetyError};
pub use scan::ScanError;
pub use trie::{MatchMode, NodeId, NodeKind, Trie, TrieError};
