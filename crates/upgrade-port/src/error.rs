//! Port failure type
//!
//! Every variant displays as the human-readable message the rendering
//! layer shows verbatim.

/// Failure of a port operation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    /// Transport-level fault
    #[error("{0}")]
    Network(String),

    /// Provider rejected or failed the request
    #[error("{0}")]
    Server(String),

    /// Failure without a usable message
    #[error("unknown error")]
    Unknown,
}

impl PortError {
    /// Create network error
    #[inline]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }

    /// Create server error
    #[inline]
    pub fn server(message: impl Into<String>) -> Self {
        Self::Server(message.into())
    }
}
