//! View-state projection
//!
//! A pure function of (query state, mutation state). Decision order is
//! first-match-wins because both engines can be populated at once:
//!
//! 1. query loading → `Loading`
//! 2. query error → `Failed` with the retry action
//! 3. query success → by cached status: `NotActive` or `ActiveTrial`
//! 4. anything else (success without a value) → `Loading`
//!
//! Rule 4 keeps the function total. The query engine never produces that
//! combination, so reaching it is logged as a warning.

use crate::view::{Action, NotActiveActions, ViewState};
use upgrade_port::UpgradeStatus;
use upgrade_query::{MutationPhase, MutationState, QueryPhase, QueryState};

/// Message shown when a failure carries none
const UNKNOWN_ERROR: &str = "unknown error";

/// Actions bound into projected views
#[derive(Debug, Clone, PartialEq)]
pub struct ViewActions {
    /// Refetch the status (query invalidation)
    pub retry: Action,
    /// Run the activation mutation
    pub activate_trial: Action,
}

impl ViewActions {
    /// Actions that do nothing
    #[must_use]
    pub fn noop() -> Self {
        Self {
            retry: Action::noop("retry"),
            activate_trial: Action::noop("activate-trial"),
        }
    }
}

/// Project engine states into a view, `None` for a malformed cache
#[must_use]
pub fn try_project(
    query: &QueryState<UpgradeStatus>,
    mutation: &MutationState,
    actions: &ViewActions,
) -> Option<ViewState> {
    match query.phase {
        QueryPhase::Loading => Some(ViewState::Loading),
        QueryPhase::Error => Some(ViewState::Failed {
            retry: actions.retry.clone(),
            error: query
                .error
                .clone()
                .unwrap_or_else(|| UNKNOWN_ERROR.to_string()),
        }),
        QueryPhase::Success => match query.value.as_ref()? {
            UpgradeStatus::NotActive => Some(ViewState::NotActive {
                transitioning: mutation.phase == MutationPhase::Pending,
                error: match mutation.phase {
                    MutationPhase::Error => Some(
                        mutation
                            .error
                            .clone()
                            .unwrap_or_else(|| UNKNOWN_ERROR.to_string()),
                    ),
                    _ => None,
                },
                actions: NotActiveActions {
                    activate_trial: actions.activate_trial.clone(),
                },
            }),
            UpgradeStatus::ActiveTrial { expires_at } => Some(ViewState::ActiveTrial {
                expires_at: *expires_at,
            }),
        },
    }
}

/// Project engine states into a view
#[must_use]
pub fn project(
    query: &QueryState<UpgradeStatus>,
    mutation: &MutationState,
    actions: &ViewActions,
) -> ViewState {
    try_project(query, mutation, actions).unwrap_or_else(|| {
        tracing::warn!(phase = ?query.phase, "query settled without a value, rendering loading");
        ViewState::Loading
    })
}
