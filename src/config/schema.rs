use crate::patterns::DEFAULT_QUOTE;
use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;

pub const DEFAULT_LOG_PATH: &str = "multigrep.log";
pub const DEFAULT_MONITOR_INTERVAL_MS: u64 = 350;

/// Settings for one run, read from `multigrep.toml` and then overridden by
/// command-line flags.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// Character delimiting values in the pattern file.
    pub quote: char,
    /// Copy each file aside before rewriting it.
    pub backup: bool,
    /// Extensions to enumerate; empty takes every file.
    pub extensions: Vec<String>,
    /// Worker pool size; 0 lets rayon decide.
    pub threads: usize,
    pub monitor_interval_ms: u64,
    /// Newline rule between consecutive replacements.
    pub split_lines: bool,
    /// Where the match log is flushed.
    pub log_path: PathBuf,
    /// Compile patterns through the rule compiler.
    pub syntax: bool,
    /// Edit budget for fuzzy whole-string lookups.
    pub max_edits: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            quote: DEFAULT_QUOTE,
            backup: false,
            extensions: Vec::new(),
            threads: 0,
            monitor_interval_ms: DEFAULT_MONITOR_INTERVAL_MS,
            split_lines: true,
            log_path: PathBuf::from(DEFAULT_LOG_PATH),
            syntax: false,
            max_edits: 1,
        }
    }
}

/// Command-line values that replace file values when present.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub quote: Option<char>,
    pub backup: bool,
    pub no_split_lines: bool,
    pub extensions: Vec<String>,
    pub threads: Option<usize>,
    pub log_path: Option<PathBuf>,
    pub syntax: bool,
}

impl RunConfig {
    /// Apply `overrides` and re-validate.
    pub fn merge(mut self, overrides: Overrides) -> Result<Self, ValidationError> {
        if let Some(quote) = overrides.quote {
            self.quote = quote;
        }
        self.backup |= overrides.backup;
        self.syntax |= overrides.syntax;
        if overrides.no_split_lines {
            self.split_lines = false;
        }
        if !overrides.extensions.is_empty() {
            self.extensions = overrides.extensions;
        }
        if let Some(threads) = overrides.threads {
            self.threads = threads;
        }
        if let Some(log_path) = overrides.log_path {
            self.log_path = log_path;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        if self.quote.is_whitespace() || self.quote.is_control() {
            issues.push(ValidationIssue::InvalidValue {
                field: "quote",
                message: format!("{:?} cannot delimit pattern values", self.quote),
            });
        }
        if self.monitor_interval_ms == 0 {
            issues.push(ValidationIssue::InvalidValue {
                field: "monitor_interval_ms",
                message: "must be greater than zero".to_string(),
            });
        }
        if self.log_path.as_os_str().is_empty() {
            issues.push(ValidationIssue::MissingField { field: "log_path" });
        }
        for ext in &self.extensions {
            if ext.trim_start_matches('.').trim().is_empty() {
                issues.push(ValidationIssue::InvalidValue {
                    field: "extensions",
                    message: "extension entries cannot be empty".to_string(),
                });
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    MissingField {
        field: &'static str,
    },
    InvalidValue {
        field: &'static str,
        message: String,
    },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::MissingField { field } => {
                write!(f, "missing required field '{field}'")
            }
            ValidationIssue::InvalidValue { field, message } => {
                write!(f, "invalid value for '{field}': {message}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = RunConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.quote, '"');
        assert!(config.split_lines);
        assert_eq!(config.monitor_interval_ms, 350);
    }

    #[test]
    fn test_collects_every_issue() {
        let config = RunConfig {
            quote: ' ',
            monitor_interval_ms: 0,
            log_path: PathBuf::new(),
            extensions: vec![".".to_string()],
            ..RunConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert_eq!(err.issues.len(), 4);
        assert!(err.to_string().contains("monitor_interval_ms"));
    }

    #[test]
    fn test_merge_overrides() {
        let merged = RunConfig::default()
            .merge(Overrides {
                quote: Some('\''),
                backup: true,
                no_split_lines: true,
                extensions: vec!["cs".to_string()],
                threads: Some(3),
                log_path: Some(PathBuf::from("out.log")),
                syntax: true,
            })
            .unwrap();
        assert_eq!(merged.quote, '\'');
        assert!(merged.backup);
        assert!(!merged.split_lines);
        assert_eq!(merged.extensions, vec!["cs"]);
        assert_eq!(merged.threads, 3);
        assert_eq!(merged.log_path, PathBuf::from("out.log"));
        assert!(merged.syntax);
    }

    #[test]
    fn test_merge_keeps_file_values() {
        let base = RunConfig {
            backup: true,
            extensions: vec!["txt".to_string()],
            ..RunConfig::default()
        };
        let merged = base.clone().merge(Overrides::default()).unwrap();
        assert_eq!(merged, base);
    }

    #[test]
    fn test_merge_rejects_bad_override() {
        let result = RunConfig::default().merge(Overrides {
            quote: Some('\n'),
            ..Overrides::default()
        });
        assert!(result.is_err());
    }
}
