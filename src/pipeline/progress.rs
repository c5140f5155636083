//! Shared progress counters and the console monitor that polls them.

use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError};

/// Default polling interval of the [`Monitor`].
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(350);

/// Rows printed between repeated table headers.
const HEADER_EVERY: usize = 30;

const HEADER: &str = "Complete   |   Found   |   Active   |   Todo";

/// Counters updated by pipeline tasks.
#[derive(Debug, Default)]
pub struct Progress {
    written: AtomicUsize,
    found: AtomicUsize,
    active: AtomicUsize,
    queued: AtomicUsize,
    adding_complete: AtomicBool,
}

/// A consistent-enough reading of [`Progress`] for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Snapshot {
    pub written: usize,
    pub found: usize,
    pub active: usize,
    pub todo: usize,
}

impl Progress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_written(&self) {
        self.written.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_found(&self, count: usize) {
        self.found.fetch_add(count, Ordering::Relaxed);
    }

    /// Count one more item waiting in a queue.
    pub fn enqueue(&self) {
        self.queued.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one item taken off a queue.
    pub fn dequeue(&self) {
        // Saturate: a consumer may observe an item before its producer counts it.
        let _ = self
            .queued
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| {
                Some(n.saturating_sub(1))
            });
    }

    /// Mark a task active until the returned guard drops.
    pub fn activate(&self) -> ActiveGuard<'_> {
        self.active.fetch_add(1, Ordering::Relaxed);
        ActiveGuard { progress: self }
    }

    pub fn set_adding_complete(&self) {
        self.adding_complete.store(true, Ordering::Release);
    }

    pub fn adding_complete(&self) -> bool {
        self.adding_complete.load(Ordering::Acquire)
    }

    pub fn written(&self) -> usize {
        self.written.load(Ordering::Relaxed)
    }

    pub fn found(&self) -> usize {
        self.found.load(Ordering::Relaxed)
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            written: self.written(),
            found: self.found(),
            active: self.active(),
            todo: self.queued.load(Ordering::Relaxed),
        }
    }
}

#[must_use = "the task counts as active only while the guard lives"]
pub struct ActiveGuard<'a> {
    progress: &'a Progress,
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.progress.active.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Prints a progress row whenever the counters change.
#[derive(Debug, Clone)]
pub struct Monitor {
    interval: Duration,
}

impl Default for Monitor {
    fn default() -> Self {
        Self::new(DEFAULT_INTERVAL)
    }
}

impl Monitor {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    /// Poll `progress` until `done` fires or disconnects, writing the table
    /// to `out`. Returns the elapsed wall time.
    pub fn run<W: Write>(
        &self,
        progress: &Progress,
        done: &Receiver<()>,
        mut out: W,
    ) -> io::Result<Duration> {
        let started = Instant::now();
        let mut last = Snapshot::default();
        let mut rows = 0usize;
        let mut announced = false;

        writeln!(out, "Building directory tree..")?;
        loop {
            match done.recv_timeout(self.interval) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => {}
            }

            let current = progress.snapshot();
            if current != last {
                if rows % HEADER_EVERY == 0 {
                    writeln!(out)?;
                    writeln!(out, "{HEADER}")?;
                }
                writeln!(out, "{}", format_row(&current))?;
                rows += 1;
                last = current;
            }

            if !announced && progress.adding_complete() {
                writeln!(out, "Adding complete at {:?}.", started.elapsed())?;
                announced = true;
                rows = HEADER_EVERY;
            }
            out.flush()?;
        }

        Ok(started.elapsed())
    }
}

fn format_row(snapshot: &Snapshot) -> String {
    format!(
        "{:<8}   |   {:<5}   |   {:<6}   |   {:<4}",
        snapshot.written, snapshot.found, snapshot.active, snapshot.todo
    )
}
