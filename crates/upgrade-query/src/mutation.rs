//! Single-instance async mutation
//!
//! Tracks one logical write: idle → pending → success | error. A run that
//! is requested while another is pending is ignored.
//!
//! On success the completion hook and the flip to `Success` form one
//! commit, held under a write guard. Readers going through
//! `Mutation::read_committed` see either neither or both, never the hook's
//! writes next to a still-pending phase.

use crate::error::MutationError;
use crate::TaskFn;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;

/// Discrete phase of a mutation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MutationPhase {
    /// Never run, or reset
    #[default]
    Idle,
    /// Run in progress
    Pending,
    /// Last run succeeded
    Success,
    /// Last run failed
    Error,
}

/// Observable mutation state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MutationState {
    /// Current phase
    pub phase: MutationPhase,
    /// Failure message when `phase` is `Error`
    pub error: Option<String>,
}

impl MutationState {
    /// Idle state
    #[inline]
    #[must_use]
    pub fn idle() -> Self {
        Self::default()
    }

    /// Pending state
    #[inline]
    #[must_use]
    pub fn pending() -> Self {
        Self {
            phase: MutationPhase::Pending,
            error: None,
        }
    }

    /// Success state
    #[inline]
    #[must_use]
    pub fn succeeded() -> Self {
        Self {
            phase: MutationPhase::Success,
            error: None,
        }
    }

    /// Error state carrying `message`
    #[inline]
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            phase: MutationPhase::Error,
            error: Some(message.into()),
        }
    }

    /// Check if a run is in progress
    #[inline]
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.phase == MutationPhase::Pending
    }
}

type SuccessHook<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct MutationInner<T> {
    mutate: TaskFn<T>,
    on_success: Mutex<Option<SuccessHook<T>>>,
    state: watch::Sender<MutationState>,
    commit: RwLock<()>,
}

/// Async write executor
///
/// Cheap to clone; clones drive the same mutation instance.
pub struct Mutation<T> {
    inner: Arc<MutationInner<T>>,
}

impl<T> Clone for Mutation<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for Mutation<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mutation")
            .field("state", &*self.inner.state.borrow())
            .finish_non_exhaustive()
    }
}

impl<T> Mutation<T>
where
    T: Send + Sync + 'static,
{
    /// Create idle mutation around `mutate`
    #[must_use]
    pub fn new(mutate: TaskFn<T>) -> Self {
        Self {
            inner: Arc::new(MutationInner {
                mutate,
                on_success: Mutex::new(None),
                state: watch::Sender::new(MutationState::idle()),
                commit: RwLock::new(()),
            }),
        }
    }

    /// Register the completion hook, replacing any previous one
    #[must_use]
    pub fn on_success(self, hook: impl Fn(&T) + Send + Sync + 'static) -> Self {
        *self.inner.on_success.lock() = Some(Arc::new(hook));
        self
    }

    /// Start a run in the background
    ///
    /// Ignored while a run is pending. Progress is observed through `state`.
    ///
    /// # Panics
    /// Panics if called outside a Tokio runtime.
    pub fn run(&self) {
        if !self.begin() {
            tracing::debug!("mutation already pending, run ignored");
            return;
        }
        let this = self.clone();
        tokio::spawn(async move {
            // Outcome is published through the state channel.
            let _ = this.execute().await;
        });
    }

    /// Run and wait for the outcome
    ///
    /// # Errors
    /// - `MutationError::AlreadyPending` if another run is in progress
    /// - `MutationError::Failed` with the failure message
    pub async fn run_async(&self) -> Result<T, MutationError> {
        if !self.begin() {
            return Err(MutationError::AlreadyPending);
        }
        self.execute().await
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> MutationState {
        self.inner.state.borrow().clone()
    }

    /// Read the state consistently with the success hook's writes
    ///
    /// `read` runs outside any success commit, so state written by the hook
    /// and the mutation phase are observed together. Must not be called from
    /// inside the success hook.
    pub fn read_committed<R>(&self, read: impl FnOnce(&MutationState) -> R) -> R {
        let _commit = self.inner.commit.read();
        let state = self.inner.state.borrow().clone();
        read(&state)
    }

    /// Watch state changes
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<MutationState> {
        self.inner.state.subscribe()
    }

    /// Return to idle, clearing a previous outcome
    ///
    /// Ignored while a run is pending.
    pub fn reset(&self) {
        self.inner.state.send_if_modified(|state| {
            if state.is_pending() || state.phase == MutationPhase::Idle {
                return false;
            }
            *state = MutationState::idle();
            true
        });
    }

    fn begin(&self) -> bool {
        self.inner.state.send_if_modified(|state| {
            if state.is_pending() {
                return false;
            }
            *state = MutationState::pending();
            true
        })
    }

    async fn execute(&self) -> Result<T, MutationError> {
        match (self.inner.mutate)().await {
            Ok(value) => {
                let hook = self.inner.on_success.lock().clone();
                {
                    let _commit = self.inner.commit.write();
                    if let Some(hook) = hook {
                        hook(&value);
                    }
                    self.inner.state.send_replace(MutationState::succeeded());
                }
                tracing::info!("mutation succeeded");
                Ok(value)
            }
            Err(err) => {
                let message = err.to_string();
                tracing::warn!(error = %message, "mutation failed");
                self.inner
                    .state
                    .send_replace(MutationState::failed(message.clone()));
                Err(MutationError::Failed(message))
            }
        }
    }
}
