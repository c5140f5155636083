pub mod loader;
pub mod schema;

pub use loader::{load_from_path, load_from_str, load_or_default, ConfigError, DEFAULT_CONFIG_FILE};
pub use schema::{Overrides, RunConfig, ValidationError, ValidationIssue};
