//! In-place rewriting of matched files.
//!
//! A file is streamed into a temporary file in its own directory: verbatim
//! gaps, then the replacement for each bookmark in ascending start order,
//! then the untouched tail. The temporary file is fsynced and renamed over
//! the original, so a file on disk is either fully rewritten or untouched.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use filetime::FileTime;
use thiserror::Error;

use crate::bookmark::{Bookmark, FileMatches};
use crate::patterns::ReplacementTable;
use crate::pipeline::CancelToken;
use crate::safety;

/// Line terminator inserted by the newline rule.
pub const NEWLINE: &[u8] = if cfg!(windows) { b"\r\n" } else { b"\n" };

const BACKUP_EXTENSION: &str = "bak";

#[derive(Error, Debug)]
pub enum RewriteError {
    #[error("file I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("{}: bytes at offset {start} changed since they were scanned", file.display())]
    SpanMismatch { file: PathBuf, start: usize },

    #[error("{}: span [{start}, {end}) lies past the end of the file", file.display())]
    SpanOutOfRange {
        file: PathBuf,
        start: usize,
        end: usize,
    },

    #[error("no replacement text for id {id}")]
    UnknownReplacement { id: i32 },

    #[error("rewrite cancelled before it was committed")]
    Cancelled,

    #[error("path has no parent directory: {}", .0.display())]
    NoParent(PathBuf),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RewriteOptions {
    /// Copy the original aside before replacing it.
    pub backup: bool,
    /// Apply the newline rule between consecutive replacements.
    pub split_lines: bool,
    /// Render the rewrite in memory without touching the file.
    pub dry_run: bool,
}

/// Result of rewriting one file.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "RewriteOutcome reports what happened to the file"]
pub enum RewriteOutcome {
    Written {
        file: PathBuf,
        replaced: usize,
        backup: Option<PathBuf>,
    },
    /// Dry run: the file was left alone.
    Preview {
        file: PathBuf,
        replaced: usize,
        original: Vec<u8>,
        rewritten: Vec<u8>,
    },
}

impl RewriteOutcome {
    pub fn file(&self) -> &Path {
        match self {
            RewriteOutcome::Written { file, .. } | RewriteOutcome::Preview { file, .. } => file,
        }
    }

    pub fn replaced(&self) -> usize {
        match self {
            RewriteOutcome::Written { replaced, .. } | RewriteOutcome::Preview { replaced, .. } => {
                *replaced
            }
        }
    }
}

/// Rewrite one file from its bookmarks.
pub fn rewrite_file(
    matches: &FileMatches,
    replacements: &ReplacementTable,
    options: &RewriteOptions,
    cancel: &CancelToken,
) -> Result<RewriteOutcome, RewriteError> {
    let path = matches.path();
    let mut bookmarks = matches.bookmarks.clone();
    bookmarks.sort_by_key(|bookmark| bookmark.start);
    let newline = options.split_lines.then_some(NEWLINE);

    if options.dry_run {
        let original = fs::read(path)?;
        let mut rewritten = Vec::with_capacity(original.len());
        let replaced = splice(
            original.as_slice(),
            &mut rewritten,
            &bookmarks,
            replacements,
            newline,
            path,
        )?;
        return Ok(RewriteOutcome::Preview {
            file: path.to_path_buf(),
            replaced,
            original,
            rewritten,
        });
    }

    let parent = match path.parent() {
        Some(parent) if parent.as_os_str().is_empty() => Path::new("."),
        Some(parent) => parent,
        None => return Err(RewriteError::NoParent(path.to_path_buf())),
    };

    let source = File::open(path)?;
    let metadata = source.metadata()?;

    // Same directory keeps the final rename on one filesystem.
    let mut temp = safety::temp_file_in(parent)?;
    let replaced = {
        let mut writer = BufWriter::new(temp.as_file_mut());
        let replaced = splice(
            BufReader::new(source),
            &mut writer,
            &bookmarks,
            replacements,
            newline,
            path,
        )?;
        writer.flush()?;
        replaced
    };
    temp.as_file().sync_all()?;
    fs::set_permissions(temp.path(), metadata.permissions())?;

    if cancel.is_cancelled() {
        return Err(RewriteError::Cancelled);
    }

    let backup = if options.backup {
        Some(write_backup(path, &metadata)?)
    } else {
        None
    };

    temp.persist(path).map_err(|e| e.error)?;
    tracing::debug!(path = %path.display(), replaced, "rewrote file");

    Ok(RewriteOutcome::Written {
        file: path.to_path_buf(),
        replaced,
        backup,
    })
}

/// Stream `reader` into `writer`, substituting each bookmark's span.
///
/// `bookmarks` must be sorted by start. Bookmarks overlapping an earlier one
/// are skipped. Returns the number of spans replaced.
pub fn splice<R: Read, W: Write>(
    mut reader: R,
    mut writer: W,
    bookmarks: &[Bookmark],
    replacements: &ReplacementTable,
    newline: Option<&[u8]>,
    file: &Path,
) -> Result<usize, RewriteError> {
    let mut position = 0;
    let mut replaced = 0;
    let mut previous: Option<&Bookmark> = None;
    let mut gap = Vec::new();
    let mut span = Vec::new();

    for bookmark in bookmarks {
        if previous.is_some_and(|previous| previous.overlaps(bookmark)) {
            tracing::warn!(
                path = %file.display(),
                start = bookmark.start,
                "skipping overlapping match"
            );
            continue;
        }
        let replacement = replacements
            .get(bookmark.id)
            .ok_or(RewriteError::UnknownReplacement { id: bookmark.id })?;

        read_span(&mut reader, &mut gap, bookmark.start - position)
            .and_then(|()| read_span(&mut reader, &mut span, bookmark.length))
            .map_err(|e| match e.kind() {
                io::ErrorKind::UnexpectedEof => RewriteError::SpanOutOfRange {
                    file: file.to_path_buf(),
                    start: bookmark.start,
                    end: bookmark.end,
                },
                _ => RewriteError::Io(e),
            })?;

        if !bookmark.verify(&span) {
            return Err(RewriteError::SpanMismatch {
                file: file.to_path_buf(),
                start: bookmark.start,
            });
        }

        if replaced > 0 {
            if let Some(newline) = newline {
                if needs_newline(&gap, newline) {
                    writer.write_all(newline)?;
                }
            }
        }
        writer.write_all(&gap)?;
        writer.write_all(replacement.as_bytes())?;

        position = bookmark.end;
        previous = Some(bookmark);
        replaced += 1;
    }

    io::copy(&mut reader, &mut writer)?;
    Ok(replaced)
}

fn read_span<R: Read>(reader: &mut R, buf: &mut Vec<u8>, len: usize) -> io::Result<()> {
    buf.clear();
    reader.by_ref().take(len as u64).read_to_end(buf)?;
    if buf.len() < len {
        return Err(io::ErrorKind::UnexpectedEof.into());
    }
    Ok(())
}

/// Whether a newline has to precede `gap` to keep one replacement per line.
///
/// Leading spaces are skipped. A gap that already holds a full newline, or
/// nothing but spaces, needs none. Any other byte does.
pub fn needs_newline(gap: &[u8], newline: &[u8]) -> bool {
    if newline.is_empty() {
        return false;
    }
    let mut matched = 0;
    for &byte in gap {
        if byte == newline[matched] {
            matched += 1;
            if matched == newline.len() {
                return false;
            }
        } else if byte != b' ' || matched > 0 {
            return true;
        }
    }
    false
}

/// Copy `path` to the first free `<name>.bak` / `<name>.<n>.bak`, keeping
/// its modification time.
fn write_backup(path: &Path, metadata: &fs::Metadata) -> Result<PathBuf, RewriteError> {
    let name = path
        .file_name()
        .ok_or_else(|| RewriteError::NoParent(path.to_path_buf()))?
        .to_string_lossy()
        .into_owned();

    let mut backup = path.with_file_name(format!("{name}.{BACKUP_EXTENSION}"));
    let mut n = 1;
    while backup.exists() {
        backup = path.with_file_name(format!("{name}.{n}.{BACKUP_EXTENSION}"));
        n += 1;
    }

    fs::copy(path, &backup)?;
    filetime::set_file_mtime(&backup, FileTime::from_last_modification_time(metadata))?;
    Ok(backup)
}
