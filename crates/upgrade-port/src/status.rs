//! Upgrade status value returned by providers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current messaging upgrade status
///
/// Immutable once returned by a port. Serialized with an internal
/// `status` tag (`"not-active"` / `"active-trial"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum UpgradeStatus {
    /// No trial or subscription active
    NotActive,
    /// Trial running until `expires_at`
    ActiveTrial {
        /// Trial expiry
        #[serde(rename = "expiresAt")]
        expires_at: DateTime<Utc>,
    },
}

impl UpgradeStatus {
    /// Create active trial status
    #[inline]
    #[must_use]
    pub fn active_trial(expires_at: DateTime<Utc>) -> Self {
        Self::ActiveTrial { expires_at }
    }

    /// Wire tag of the status
    #[inline]
    #[must_use]
    pub fn status(&self) -> &'static str {
        match self {
            Self::NotActive => "not-active",
            Self::ActiveTrial { .. } => "active-trial",
        }
    }

    /// Check if no trial is active
    #[inline]
    #[must_use]
    pub fn is_not_active(&self) -> bool {
        matches!(self, Self::NotActive)
    }

    /// Trial expiry, if a trial is active
    #[inline]
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::NotActive => None,
            Self::ActiveTrial { expires_at } => Some(*expires_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    #[test]
    fn status_tags() {
        let expires = Utc.with_ymd_and_hms(2026, 1, 5, 12, 0, 0).unwrap();
        assert_eq!(UpgradeStatus::NotActive.status(), "not-active");
        assert_eq!(UpgradeStatus::active_trial(expires).status(), "active-trial");
    }

    #[test]
    fn serializes_with_status_tag() {
        let json = serde_json::to_value(UpgradeStatus::NotActive).unwrap();
        assert_eq!(json, serde_json::json!({ "status": "not-active" }));

        let expires = Utc.with_ymd_and_hms(2026, 1, 5, 12, 0, 0).unwrap();
        let json = serde_json::to_value(UpgradeStatus::active_trial(expires)).unwrap();
        assert_eq!(json["status"], "active-trial");
        assert_eq!(json["expiresAt"], "2026-01-05T12:00:00Z");
    }

    #[test]
    fn parses_provider_payload() {
        let status: UpgradeStatus = serde_json::from_str(
            r#"{"status":"active-trial","expiresAt":"2026-01-05T12:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(
            status.expires_at(),
            Some(Utc.with_ymd_and_hms(2026, 1, 5, 12, 0, 0).unwrap())
        );
    }
}
