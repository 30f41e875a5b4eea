//! Helper functions for creating specific error types

use super::types::StoreError;

/// Helper functions for creating specific errors
impl StoreError {
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config(message.into())
    }

    /// Whether the error came from configuration loading or validation
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Yaml(_))
    }
}
