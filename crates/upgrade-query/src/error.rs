//! Error types for the query and mutation engines

/// Boxed failure of a fetch or mutation body
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Query engine misuse
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    /// No cache entry exists for the key
    #[error("unknown query key: {0}")]
    UnknownKey(String),

    /// Entry exists but nobody registered a fetcher for it
    #[error("no fetcher registered for query key: {0}")]
    NoFetcher(String),

    /// Cache entry was torn down while observed
    #[error("query closed: {0}")]
    Closed(String),
}

/// Outcome of an awaited mutation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MutationError {
    /// Another run of the same mutation is still pending
    #[error("mutation already pending")]
    AlreadyPending,

    /// Mutation body failed
    #[error("{0}")]
    Failed(String),
}
