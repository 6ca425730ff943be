//! Presentation contract
//!
//! `ViewState` is everything the rendering layer may read. It is derived
//! by the projector on every engine change and never mutated directly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Callback handed to the rendering layer
#[derive(Clone)]
pub struct Action {
    name: &'static str,
    callback: Arc<dyn Fn() + Send + Sync>,
}

impl Action {
    /// Create named action
    pub fn new(name: &'static str, callback: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            name,
            callback: Arc::new(callback),
        }
    }

    /// Action that does nothing
    #[must_use]
    pub fn noop(name: &'static str) -> Self {
        Self::new(name, || {})
    }

    /// Action name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Run the callback
    #[inline]
    pub fn invoke(&self) {
        (self.callback)();
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Action({})", self.name)
    }
}

/// Two actions are equal when they share the same callback
impl PartialEq for Action {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && Arc::ptr_eq(&self.callback, &other.callback)
    }
}

/// Actions available while no trial is active
#[derive(Debug, Clone, PartialEq)]
pub struct NotActiveActions {
    /// Start the trial
    pub activate_trial: Action,
}

/// Presentation state, exactly one variant at a time
#[derive(Debug, Clone, PartialEq)]
pub enum ViewState {
    /// Status not yet known
    Loading,
    /// Status fetch failed after automatic retry
    Failed {
        /// Refetch the status
        retry: Action,
        /// Failure message
        error: String,
    },
    /// No trial active
    NotActive {
        /// An activation is pending
        transitioning: bool,
        /// Message of the last failed activation
        error: Option<String>,
        /// Available actions
        actions: NotActiveActions,
    },
    /// Trial running
    ActiveTrial {
        /// Trial expiry
        expires_at: DateTime<Utc>,
    },
}

impl ViewState {
    /// Variant discriminant
    #[must_use]
    pub fn status(&self) -> ViewStatus {
        match self {
            Self::Loading => ViewStatus::Loading,
            Self::Failed { .. } => ViewStatus::Failed,
            Self::NotActive { .. } => ViewStatus::NotActive,
            Self::ActiveTrial { .. } => ViewStatus::ActiveTrial,
        }
    }

    /// Check if an activation is pending
    #[inline]
    #[must_use]
    pub fn is_transitioning(&self) -> bool {
        matches!(self, Self::NotActive { transitioning: true, .. })
    }

    /// Error message shown with this view, if any
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Failed { error, .. } => Some(error),
            Self::NotActive { error, .. } => error.as_deref(),
            Self::Loading | Self::ActiveTrial { .. } => None,
        }
    }
}

/// Discriminant of `ViewState`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ViewStatus {
    /// `ViewState::Loading`
    Loading,
    /// `ViewState::Failed`
    Failed,
    /// `ViewState::NotActive`
    NotActive,
    /// `ViewState::ActiveTrial`
    ActiveTrial,
}

impl ViewStatus {
    /// Wire name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Loading => "loading",
            Self::Failed => "failed",
            Self::NotActive => "not-active",
            Self::ActiveTrial => "active-trial",
        }
    }
}

impl fmt::Display for ViewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
