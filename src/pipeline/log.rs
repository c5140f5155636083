use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

/// One match, as written to the match log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchRecord {
    pub file: PathBuf,
    pub id: i32,
    pub text: String,
    pub replacement: String,
}

impl fmt::Display for MatchRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:  {} <- '{}' => '{}'",
            self.file.display(),
            self.id,
            self.text,
            self.replacement
        )
    }
}

/// Append-only record of every match, shared by all scan tasks.
///
/// The first [`MatchLog::flush`] truncates the target file; later flushes
/// append to it, so records drained on cancellation are kept.
#[derive(Debug, Default)]
pub struct MatchLog {
    records: Mutex<Vec<MatchRecord>>,
    flushed: AtomicBool,
}

impl MatchLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&self, records: impl IntoIterator<Item = MatchRecord>) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(records);
    }

    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Take every pending record.
    pub fn drain(&self) -> Vec<MatchRecord> {
        std::mem::take(&mut *self.records.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Drain pending records into `path`, one line each. Returns the number
    /// of records written.
    pub fn flush(&self, path: &Path) -> io::Result<usize> {
        let records = self.drain();
        if records.is_empty() {
            return Ok(0);
        }

        let file = if self.flushed.swap(true, Ordering::AcqRel) {
            OpenOptions::new().create(true).append(true).open(path)?
        } else {
            File::create(path)?
        };
        let mut writer = BufWriter::new(file);
        for record in &records {
            writeln!(writer, "{record}")?;
        }
        writer.flush()?;
        writer.get_ref().sync_all()?;

        tracing::debug!(path = %path.display(), records = records.len(), "flushed match log");
        Ok(records.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(file: &str, id: i32, text: &str) -> MatchRecord {
        MatchRecord {
            file: PathBuf::from(file),
            id,
            text: text.to_string(),
            replacement: text.to_uppercase(),
        }
    }

    #[test]
    fn test_record_format() {
        let line = record("src/a.txt", 3, "hello").to_string();
        assert_eq!(line, "src/a.txt:  3 <- 'hello' => 'HELLO'");
    }

    #[test]
    fn test_flush_truncates_then_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("multigrep.log");
        std::fs::write(&path, "stale\n").unwrap();

        let log = MatchLog::new();
        assert_eq!(log.flush(&path).unwrap(), 0);

        log.extend([record("a", 0, "x"), record("b", 1, "y")]);
        assert_eq!(log.len(), 2);
        assert_eq!(log.flush(&path).unwrap(), 2);
        assert!(log.is_empty());

        log.extend([record("c", 2, "z")]);
        assert_eq!(log.flush(&path).unwrap(), 1);

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("a:  0 <- 'x'"));
        assert!(lines[2].starts_with("c:  2 <- 'z'"));
    }

    #[test]
    fn test_concurrent_extend() {
        let log = std::sync::Arc::new(MatchLog::new());
        let handles: Vec<_> = (0..4)
            .map(|n| {
                let log = std::sync::Arc::clone(&log);
                std::thread::spawn(move || {
                    for i in 0..25 {
                        log.extend([record("f", n * 100 + i, "t")]);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(log.len(), 100);
    }
}
