//! Concurrent scan and rewrite stages.
//!
//! Two long-lived stage threads share one rayon pool. The scan stage drains
//! the queue of file paths and spawns one scan task per file; files with
//! matches go onto the match queue. The write stage drains the match queue
//! and spawns one rewrite task per file. Both queues are unbounded
//! crossbeam channels. The match queue closes once the work queue is
//! exhausted and every scan task has finished.

pub mod cancel;
pub mod log;
pub mod progress;

pub use cancel::CancelToken;
pub use log::{MatchLog, MatchRecord};
pub use progress::{ActiveGuard, Monitor, Progress, Snapshot};

use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

use crossbeam_channel::{Receiver, Sender};
use thiserror::Error;

use crate::bookmark::FileMatches;
use crate::patterns::ReplacementTable;
use crate::rewrite::{self, RewriteError, RewriteOptions, RewriteOutcome};
use crate::scan;
use crate::trie::Trie;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("failed to build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),

    #[error("pipeline stage panicked")]
    StagePanicked,
}

/// A file that could not be scanned or rewritten.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub path: PathBuf,
    pub error: String,
}

/// What a finished run did.
#[derive(Debug, Default)]
pub struct PipelineReport {
    /// Rewritten (or previewed) files, in completion order.
    pub outcomes: Vec<RewriteOutcome>,
    pub failures: Vec<Failure>,
    pub found: usize,
    pub cancelled: bool,
}

impl PipelineReport {
    /// Number of files changed.
    pub fn changes(&self) -> usize {
        self.outcomes.len()
    }
}

pub struct Pipeline {
    trie: Arc<Trie>,
    replacements: Arc<ReplacementTable>,
    options: RewriteOptions,
    pool: rayon::ThreadPool,
    progress: Arc<Progress>,
    cancel: CancelToken,
    log: Arc<MatchLog>,
    outcomes: Mutex<Vec<RewriteOutcome>>,
    failures: Mutex<Vec<Failure>>,
}

impl Pipeline {
    /// Create a pipeline over `threads` workers (0 picks rayon's default).
    pub fn new(
        trie: Arc<Trie>,
        replacements: Arc<ReplacementTable>,
        options: RewriteOptions,
        threads: usize,
    ) -> Result<Self, PipelineError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("multigrep-worker-{i}"))
            .build()?;
        Ok(Self {
            trie,
            replacements,
            options,
            pool,
            progress: Arc::new(Progress::new()),
            cancel: CancelToken::new(),
            log: Arc::new(MatchLog::new()),
            outcomes: Mutex::new(Vec::new()),
            failures: Mutex::new(Vec::new()),
        })
    }

    pub fn progress(&self) -> Arc<Progress> {
        Arc::clone(&self.progress)
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn log(&self) -> Arc<MatchLog> {
        Arc::clone(&self.log)
    }

    /// Run both stages to completion on the calling thread.
    pub fn run(&self, work: Receiver<PathBuf>) -> PipelineReport {
        let (match_tx, match_rx) = crossbeam_channel::unbounded();

        thread::scope(|stages| {
            stages.spawn(|| self.scan_stage(&work, match_tx));
            stages.spawn(|| self.write_stage(&match_rx));
        });

        PipelineReport {
            outcomes: std::mem::take(&mut *lock(&self.outcomes)),
            failures: std::mem::take(&mut *lock(&self.failures)),
            found: self.progress.found(),
            cancelled: self.cancel.is_cancelled(),
        }
    }

    /// Run the pipeline on a background thread.
    pub fn spawn(self, work: Receiver<PathBuf>) -> RunningPipeline {
        let (done_tx, done_rx) = crossbeam_channel::bounded(1);
        let handle = thread::spawn(move || {
            let report = self.run(work);
            let _ = done_tx.send(());
            report
        });
        RunningPipeline {
            handle,
            done: done_rx,
        }
    }

    fn scan_stage(&self, work: &Receiver<PathBuf>, match_tx: Sender<FileMatches>) {
        self.pool.in_place_scope(|scope| {
            for path in work.iter() {
                self.progress.dequeue();
                if self.cancel.is_cancelled() {
                    break;
                }
                let match_tx = match_tx.clone();
                scope.spawn(move |_| {
                    self.guarded(&path, || self.scan_one(&path, &match_tx));
                });
            }
        });
        tracing::debug!("scan stage finished");
        // match_tx drops here and closes the match queue
    }

    fn write_stage(&self, match_rx: &Receiver<FileMatches>) {
        self.pool.in_place_scope(|scope| {
            for matches in match_rx.iter() {
                self.progress.dequeue();
                if self.cancel.is_cancelled() {
                    continue;
                }
                scope.spawn(move |_| {
                    let path = matches.path.clone();
                    self.guarded(&path, || self.write_one(&matches));
                });
            }
        });
        tracing::debug!("write stage finished");
    }

    /// Run one task, turning a panic into a failure and a cancellation.
    fn guarded(&self, path: &Path, task: impl FnOnce()) {
        if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
            tracing::error!(path = %path.display(), "task panicked, cancelling");
            self.fail(path, "task panicked".to_string());
            self.cancel.cancel();
        }
    }

    fn scan_one(&self, path: &Path, match_tx: &Sender<FileMatches>) {
        let _active = self.progress.activate();
        let bookmarks = match scan::scan_file(&self.trie, path) {
            Ok(bookmarks) => bookmarks,
            Err(err) => {
                tracing::warn!("{err}");
                self.fail(path, err.to_string());
                return;
            }
        };
        if bookmarks.is_empty() {
            return;
        }

        self.progress.record_found(bookmarks.len());
        self.log.extend(bookmarks.iter().map(|bookmark| MatchRecord {
            file: path.to_path_buf(),
            id: bookmark.id,
            text: bookmark.text.clone(),
            replacement: self
                .replacements
                .get(bookmark.id)
                .unwrap_or_default()
                .to_string(),
        }));

        self.progress.enqueue();
        if match_tx.send(FileMatches::new(path, bookmarks)).is_err() {
            self.progress.dequeue();
        }
    }

    fn write_one(&self, matches: &FileMatches) {
        let _active = self.progress.activate();
        match rewrite::rewrite_file(matches, &self.replacements, &self.options, &self.cancel) {
            Ok(outcome) => {
                self.progress.record_written();
                lock(&self.outcomes).push(outcome);
            }
            Err(RewriteError::Cancelled) => {
                tracing::debug!(path = %matches.path.display(), "rewrite abandoned");
            }
            Err(err) => {
                tracing::warn!(path = %matches.path.display(), "{err}");
                self.fail(&matches.path, err.to_string());
            }
        }
    }

    fn fail(&self, path: &Path, error: String) {
        lock(&self.failures).push(Failure {
            path: path.to_path_buf(),
            error,
        });
    }
}

/// Handle to a pipeline running on its own thread.
pub struct RunningPipeline {
    handle: thread::JoinHandle<PipelineReport>,
    done: Receiver<()>,
}

impl RunningPipeline {
    /// Fires once when the run completes.
    pub fn done(&self) -> &Receiver<()> {
        &self.done
    }

    pub fn join(self) -> Result<PipelineReport, PipelineError> {
        self.handle.join().map_err(|_| PipelineError::StagePanicked)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patterns;
    use std::fs;

    fn pipeline(patterns: &str, options: RewriteOptions) -> Pipeline {
        let set = patterns::parse(patterns, '"').unwrap();
        let trie = set.build_trie(false).unwrap();
        Pipeline::new(
            Arc::new(trie),
            Arc::new(set.replacements().clone()),
            options,
            2,
        )
        .unwrap()
    }

    fn feed(paths: &[PathBuf]) -> Receiver<PathBuf> {
        let (tx, rx) = crossbeam_channel::unbounded();
        for path in paths {
            tx.send(path.clone()).unwrap();
        }
        rx
    }

    #[test]
    fn test_run_rewrites_matching_files() {
        let dir = tempfile::tempdir().unwrap();
        let hit = dir.path().join("hit.txt");
        let miss = dir.path().join("miss.txt");
        fs::write(&hit, "say hello there").unwrap();
        fs::write(&miss, "nothing here").unwrap();

        let pipeline = pipeline("\"hello\" \"HELLO_ID\"\n", RewriteOptions::default());
        let log = pipeline.log();
        let report = pipeline.run(feed(&[hit.clone(), miss.clone()]));

        assert_eq!(report.changes(), 1);
        assert_eq!(report.found, 1);
        assert!(report.failures.is_empty());
        assert!(!report.cancelled);
        assert_eq!(fs::read_to_string(&hit).unwrap(), "say HELLO_ID there");
        assert_eq!(fs::read_to_string(&miss).unwrap(), "nothing here");

        let records = log.drain();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].replacement, "HELLO_ID");
    }

    #[test]
    fn test_missing_file_is_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let hit = dir.path().join("hit.txt");
        fs::write(&hit, "hello").unwrap();
        let gone = dir.path().join("gone.txt");

        let pipeline = pipeline("\"hello\" \"X\"\n", RewriteOptions::default());
        let report = pipeline.run(feed(&[gone.clone(), hit.clone()]));

        assert_eq!(report.changes(), 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].path, gone);
        assert_eq!(fs::read_to_string(&hit).unwrap(), "X");
    }

    #[test]
    fn test_cancelled_pipeline_touches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let paths: Vec<_> = (0..8)
            .map(|i| {
                let path = dir.path().join(format!("f{i}.txt"));
                fs::write(&path, "hello").unwrap();
                path
            })
            .collect();

        let pipeline = pipeline("\"hello\" \"X\"\n", RewriteOptions::default());
        pipeline.cancel_token().cancel();
        let report = pipeline.run(feed(&paths));

        assert!(report.cancelled);
        assert_eq!(report.changes(), 0);
        for path in &paths {
            assert_eq!(fs::read_to_string(path).unwrap(), "hello");
        }
    }

    #[test]
    fn test_spawn_signals_done() {
        let dir = tempfile::tempdir().unwrap();
        let hit = dir.path().join("hit.txt");
        fs::write(&hit, "hello hello").unwrap();

        let pipeline = pipeline("\"hello\" \"X\"\n", RewriteOptions::default());
        let progress = pipeline.progress();
        let running = pipeline.spawn(feed(&[hit.clone()]));
        running.done().recv().unwrap();
        let report = running.join().unwrap();

        assert_eq!(report.changes(), 1);
        assert_eq!(progress.written(), 1);
        assert_eq!(progress.active(), 0);
        assert_eq!(fs::read_to_string(&hit).unwrap(), "X X");
    }

    #[test]
    fn test_dry_run_reports_preview() {
        let dir = tempfile::tempdir().unwrap();
        let hit = dir.path().join("hit.txt");
        fs::write(&hit, "hello").unwrap();

        let options = RewriteOptions {
            dry_run: true,
            ..RewriteOptions::default()
        };
        let report = pipeline("\"hello\" \"X\"\n", options).run(feed(&[hit.clone()]));

        assert!(matches!(report.outcomes[0], RewriteOutcome::Preview { .. }));
        assert_eq!(fs::read_to_string(&hit).unwrap(), "hello");
    }
}
