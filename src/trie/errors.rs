use crate::trie::rules::RuleError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrieError {
    #[error("contract violation: {message}")]
    ContractViolation { message: String },

    #[error("{kind} nodes cannot be extended: not supported")]
    Unsupported { kind: &'static str },

    #[error("cannot find id {id} in tree (last matched fragment: '{fragment}')")]
    TreeInconsistency { id: i32, fragment: String },

    #[error("terminal node is shared by ids {ids:?} and has no end marker to disambiguate")]
    AmbiguousTerminal { ids: Vec<i32> },

    #[error("node has no terminal value")]
    NoTerminalValue,

    #[error("{kind} nodes cannot be stored in format version 1")]
    Unpersistable { kind: &'static str },

    #[error("persisted tree is truncated or corrupt")]
    Truncated,

    #[error("invalid pattern rule: {0}")]
    Rule(#[from] RuleError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
