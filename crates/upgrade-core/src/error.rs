//! Error types for the upgrade core
//!
//! Port failures never surface here: the engines turn them into `Error`
//! phases that the projector renders. These errors cover misuse and
//! configuration only.

use upgrade_query::{MutationError, QueryError};

/// Main upgrade core error type
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UpgradeError {
    /// Query engine rejected the operation
    #[error("query error: {0}")]
    Query(#[from] QueryError),

    /// Awaited activation did not succeed
    #[error("activation error: {0}")]
    Mutation(#[from] MutationError),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

impl UpgradeError {
    /// Check if the failed operation can be retried by the user
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Mutation(MutationError::Failed(_)))
    }
}
