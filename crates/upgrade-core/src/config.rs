//! Upgrade core configuration

use crate::error::UpgradeError;
use serde::{Deserialize, Serialize};
use upgrade_query::{QueryKey, RetryPolicy};

/// Default cache key of the upgrade status resource
pub const DEFAULT_QUERY_KEY: &str = "message-upgrade";

/// Upgrade core configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpgradeConfig {
    /// Cache key of the status query
    pub query_key: String,
    /// Automatic retry policy for status fetches
    pub retry: RetryPolicy,
}

impl UpgradeConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With cache key
    #[inline]
    #[must_use]
    pub fn with_query_key(mut self, key: impl Into<String>) -> Self {
        self.query_key = key.into();
        self
    }

    /// With retry policy
    #[inline]
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Cache key as a query key
    #[inline]
    #[must_use]
    pub fn key(&self) -> QueryKey {
        QueryKey::new(self.query_key.clone())
    }

    /// Validate configuration
    ///
    /// # Errors
    /// `UpgradeError::Config` if the query key is blank.
    pub fn validate(&self) -> Result<(), UpgradeError> {
        if self.query_key.trim().is_empty() {
            return Err(UpgradeError::Config(
                "query key must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for UpgradeConfig {
    fn default() -> Self {
        Self {
            query_key: DEFAULT_QUERY_KEY.to_string(),
            retry: RetryPolicy::default(),
        }
    }
}
