use std::ffi::OsStr;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Directory names never descended into.
pub const SKIP_DIRECTORIES: &[&str] = &[".git"];

/// Extension of backup files written by the rewriter; never rewritten again.
const BACKUP_EXTENSION: &str = "bak";

/// Name affixes of the temporaries staged next to a file being replaced.
pub const TEMP_PREFIX: &str = ".multigrep-";
pub const TEMP_SUFFIX: &str = ".tmp";

/// Create a named temporary in `dir` that [`RootGuard`] will never accept.
pub fn temp_file_in(dir: &Path) -> io::Result<tempfile::NamedTempFile> {
    tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .suffix(TEMP_SUFFIX)
        .tempfile_in(dir)
}

fn is_temp_name(name: &OsStr) -> bool {
    name.to_str()
        .is_some_and(|name| name.starts_with(TEMP_PREFIX) && name.ends_with(TEMP_SUFFIX))
}

/// Keeps enumerated paths inside the roots the user asked for.
#[derive(Debug, Clone)]
pub struct RootGuard {
    /// Canonical roots
    roots: Vec<PathBuf>,
}

#[derive(Error, Debug)]
pub enum SafetyError {
    #[error("Path is outside the requested roots: {path}")]
    OutsideRoots { path: PathBuf },

    #[error("Path is excluded ({reason}): {path}")]
    Excluded { path: PathBuf, reason: &'static str },

    #[error("Failed to canonicalize path: {0}")]
    Canonicalize(#[from] std::io::Error),
}

impl RootGuard {
    /// Create a guard over `roots`, each canonicalized to resolve symlinks.
    pub fn new<I, P>(roots: I) -> Result<Self, SafetyError>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let roots = roots
            .into_iter()
            .map(|root| root.as_ref().canonicalize())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { roots })
    }

    /// Check that `path` may be rewritten.
    ///
    /// Returns the canonicalized absolute path if safe.
    pub fn validate_path(&self, path: impl AsRef<Path>) -> Result<PathBuf, SafetyError> {
        let canonical = path.as_ref().canonicalize()?;
        self.check_canonical(&canonical)?;
        Ok(canonical)
    }

    fn check_canonical(&self, canonical: &Path) -> Result<(), SafetyError> {
        let Some(relative) = self
            .roots
            .iter()
            .find_map(|root| canonical.strip_prefix(root).ok())
        else {
            return Err(SafetyError::OutsideRoots {
                path: canonical.to_path_buf(),
            });
        };

        if relative
            .components()
            .any(|part| SKIP_DIRECTORIES.iter().any(|skip| part.as_os_str() == OsStr::new(skip)))
        {
            return Err(SafetyError::Excluded {
                path: canonical.to_path_buf(),
                reason: "version control",
            });
        }

        if canonical.extension() == Some(OsStr::new(BACKUP_EXTENSION)) {
            return Err(SafetyError::Excluded {
                path: canonical.to_path_buf(),
                reason: "backup file",
            });
        }

        if canonical.file_name().is_some_and(is_temp_name) {
            return Err(SafetyError::Excluded {
                path: canonical.to_path_buf(),
                reason: "temporary file",
            });
        }

        Ok(())
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }
}
