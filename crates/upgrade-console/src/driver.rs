//! Scripted user reacting to views

use upgrade_core::ViewState;

/// What the driver does with a view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Reaction {
    /// Wait for the next view
    Wait,
    /// Invoked the retry action
    Retried,
    /// Invoked the activate-trial action
    Activated,
    /// Nothing further applies
    Stop,
}

/// Retry and activation budget
#[derive(Debug, Clone)]
pub(crate) struct Driver {
    activate: bool,
    max_retries: u32,
    retries: u32,
    activations: u32,
}

impl Driver {
    pub(crate) fn new(activate: bool, max_retries: u32) -> Self {
        Self {
            activate,
            max_retries,
            retries: 0,
            activations: 0,
        }
    }

    /// React to a view, invoking at most one of its actions
    pub(crate) fn react(&mut self, view: &ViewState) -> Reaction {
        match view {
            ViewState::Loading => Reaction::Wait,
            ViewState::Failed { retry, .. } => {
                if self.retries >= self.max_retries {
                    return Reaction::Stop;
                }
                self.retries += 1;
                retry.invoke();
                Reaction::Retried
            }
            ViewState::NotActive {
                transitioning: true,
                ..
            } => Reaction::Wait,
            ViewState::NotActive { error, actions, .. } => {
                // First attempt is free, each re-attempt after an error spends a retry.
                let allowed = self.activate
                    && match error {
                        None => self.activations == 0,
                        Some(_) => self.activations > 0 && self.activations <= self.max_retries,
                    };
                if !allowed {
                    return Reaction::Stop;
                }
                self.activations += 1;
                actions.activate_trial.invoke();
                Reaction::Activated
            }
            ViewState::ActiveTrial { .. } => Reaction::Stop,
        }
    }

    pub(crate) fn retries(&self) -> u32 {
        self.retries
    }

    pub(crate) fn activations(&self) -> u32 {
        self.activations
    }
}
