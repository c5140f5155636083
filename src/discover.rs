//! Enumeration of input files.
//!
//! Each requested path is walked on a background thread. Accepted files are
//! sent to the work queue as soon as they are found; when the walk ends the
//! queue is closed and [`Progress::set_adding_complete`] is flagged.

use std::collections::HashSet;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::Sender;
use walkdir::WalkDir;

use crate::pipeline::{CancelToken, Progress};
use crate::safety::{RootGuard, SafetyError, SKIP_DIRECTORIES};

/// Which files a walk accepts.
#[derive(Debug, Clone, Default)]
pub struct FileFilter {
    /// Accepted extensions, without the dot. Empty accepts every file.
    extensions: Vec<String>,
}

impl FileFilter {
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            extensions: extensions
                .into_iter()
                .map(|ext| ext.as_ref().trim_start_matches('.').to_ascii_lowercase())
                .filter(|ext| !ext.is_empty())
                .collect(),
        }
    }

    pub fn accepts(&self, path: &Path) -> bool {
        if self.extensions.is_empty() {
            return true;
        }
        path.extension()
            .and_then(OsStr::to_str)
            .map(|ext| ext.to_ascii_lowercase())
            .is_some_and(|ext| self.extensions.iter().any(|wanted| *wanted == ext))
    }
}

/// Counts from a finished walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkStats {
    pub queued: usize,
    pub skipped: usize,
    pub errors: usize,
}

/// Walk `roots` synchronously, sending every accepted file to `tx`.
pub fn walk(
    roots: &[PathBuf],
    filter: &FileFilter,
    tx: &Sender<PathBuf>,
    progress: &Progress,
    cancel: &CancelToken,
) -> Result<WalkStats, SafetyError> {
    let guard = RootGuard::new(roots)?;
    let mut stats = WalkStats::default();
    // Overlapping roots must not queue a file twice
    let mut seen = HashSet::new();

    'roots: for root in roots {
        let entries = WalkDir::new(root).follow_links(true).into_iter().filter_entry(|entry| {
            !(entry.file_type().is_dir()
                && entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| SKIP_DIRECTORIES.contains(&name)))
        });

        for entry in entries {
            if cancel.is_cancelled() {
                break 'roots;
            }
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    tracing::warn!("Walk error: {err}");
                    stats.errors += 1;
                    continue;
                }
            };
            if !entry.file_type().is_file() || !filter.accepts(entry.path()) {
                continue;
            }

            let path = match guard.validate_path(entry.path()) {
                Ok(path) => path,
                Err(err) => {
                    tracing::warn!("skipping {}: {err}", entry.path().display());
                    stats.skipped += 1;
                    continue;
                }
            };
            if !seen.insert(path.clone()) {
                tracing::debug!("already queued: {}", path.display());
                stats.skipped += 1;
                continue;
            }

            progress.enqueue();
            if tx.send(path).is_err() {
                progress.dequeue();
                break 'roots;
            }
            stats.queued += 1;
        }
    }

    Ok(stats)
}

/// Run [`walk`] on a background thread. The sender is dropped, closing the
/// work queue, when the walk ends.
pub fn spawn(
    roots: Vec<PathBuf>,
    filter: FileFilter,
    tx: Sender<PathBuf>,
    progress: Arc<Progress>,
    cancel: CancelToken,
) -> thread::JoinHandle<Result<WalkStats, SafetyError>> {
    thread::spawn(move || {
        let result = walk(&roots, &filter, &tx, &progress, &cancel);
        drop(tx);
        progress.set_adding_complete();
        if let Ok(stats) = &result {
            tracing::debug!(
                queued = stats.queued,
                skipped = stats.skipped,
                errors = stats.errors,
                "enumeration finished"
            );
        }
        result
    })
}
