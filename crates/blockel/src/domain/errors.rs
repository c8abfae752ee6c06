//! Domain-specific errors.

use std::path::PathBuf;

use thiserror::Error;

/// Failure of a round trip to the rule store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to access rule storage at {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid rule storage data")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to format rule timestamp")]
    Timestamp(#[from] time::error::Format),
    #[error("rule store unavailable: {0}")]
    Unavailable(String),
    #[error("rule store rejected the request: {0}")]
    Rejected(String),
}

/// Error produced when a selector string cannot be parsed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SelectorParseError {
    #[error("empty selector")]
    Empty,
    #[error("unexpected character '{found}' at offset {offset}")]
    Unexpected { found: char, offset: usize },
    #[error("unsupported pseudo-class ':{0}'")]
    UnsupportedPseudo(String),
    #[error("invalid nth-of-type argument '{0}'")]
    InvalidNth(String),
    #[error("selector ends with a dangling combinator")]
    DanglingCombinator,
}
