//! Error types for the batch store

use thiserror::Error;

/// Result type alias for the batch store
pub type Result<T> = std::result::Result<T, StoreError>;

/// Main error type for store construction and configuration
#[derive(Error, Debug)]
pub enum StoreError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error a waiting caller observes when its lookup settles with a rejection.
///
/// `Getter` carries the getter's (or response parser's) error exactly as it
/// was returned, so every caller in a rejected dispatch set sees the same
/// value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError<E> {
    /// The getter or its response parser failed and retries were exhausted or disabled
    #[error("{0}")]
    Getter(E),

    /// The owning store was shut down before the lookup settled
    #[error("lookup abandoned: batch store closed before the request settled")]
    Closed,
}

impl<E> FetchError<E> {
    /// Borrow the getter error, if this is one
    pub fn getter_error(&self) -> Option<&E> {
        match self {
            Self::Getter(err) => Some(err),
            Self::Closed => None,
        }
    }

    /// Unwrap into the getter error, if this is one
    pub fn into_getter_error(self) -> Option<E> {
        match self {
            Self::Getter(err) => Some(err),
            Self::Closed => None,
        }
    }

    /// Whether the lookup was abandoned rather than rejected by the getter
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }
}
