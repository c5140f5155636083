use crate::config::schema::{RunConfig, ValidationError};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Looked up in the working directory when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "multigrep.toml";

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Toml {
        path: Option<PathBuf>,
        source: toml_edit::de::Error,
    },
    Validation {
        path: Option<PathBuf>,
        source: ValidationError,
    },
}

/// Renders ` (path)` after a message when the error came from a file.
struct Origin<'a>(&'a Option<PathBuf>);

impl fmt::Display for Origin<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(path) => write!(f, " ({})", path.display()),
            None => Ok(()),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(f, "failed to read config from {}: {source}", path.display())
            }
            ConfigError::Toml { path, source } => {
                write!(f, "failed to parse config TOML{}: {source}", Origin(path))
            }
            ConfigError::Validation { path, source } => {
                write!(f, "invalid config{}: {source}", Origin(path))
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Toml { source, .. } => Some(source),
            ConfigError::Validation { source, .. } => Some(source),
        }
    }
}

fn parse(input: &str, path: Option<&Path>) -> Result<RunConfig, ConfigError> {
    let path = || path.map(Path::to_path_buf);
    let config: RunConfig = toml_edit::de::from_str(input)
        .map_err(|source| ConfigError::Toml { path: path(), source })?;
    config
        .validate()
        .map_err(|source| ConfigError::Validation { path: path(), source })?;
    Ok(config)
}

pub fn load_from_str(input: &str) -> Result<RunConfig, ConfigError> {
    parse(input, None)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<RunConfig, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse(&contents, Some(path))
}

/// Load `explicit` if given, else `multigrep.toml` in `dir` if it exists,
/// else the defaults.
pub fn load_or_default(explicit: Option<&Path>, dir: &Path) -> Result<RunConfig, ConfigError> {
    if let Some(path) = explicit {
        return load_from_path(path);
    }
    let candidate = dir.join(DEFAULT_CONFIG_FILE);
    if candidate.is_file() {
        tracing::debug!(path = %candidate.display(), "using config file");
        return load_from_path(&candidate);
    }
    Ok(RunConfig::default())
}
