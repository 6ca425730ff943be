//! Port contract

use crate::error::PortError;
use crate::status::UpgradeStatus;
use std::sync::Arc;

/// Upgrade status provider
///
/// Implementations are interchangeable (network-backed, in-memory).
/// The core never calls `activate_trial` unless a consumer explicitly
/// requests it, and never assumes it is idempotent.
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait::async_trait]
pub trait UpgradeStatusPort: Send + Sync {
    /// Fetch the current upgrade status
    async fn fetch_status(&self) -> Result<UpgradeStatus, PortError>;

    /// Activate the trial
    ///
    /// On success resolves to `UpgradeStatus::ActiveTrial` with a future expiry.
    async fn activate_trial(&self) -> Result<UpgradeStatus, PortError>;
}

#[async_trait::async_trait]
impl<P: UpgradeStatusPort + ?Sized> UpgradeStatusPort for Arc<P> {
    async fn fetch_status(&self) -> Result<UpgradeStatus, PortError> {
        (**self).fetch_status().await
    }

    async fn activate_trial(&self) -> Result<UpgradeStatus, PortError> {
        (**self).activate_trial().await
    }
}
