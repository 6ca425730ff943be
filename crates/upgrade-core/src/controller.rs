//! Upgrade controller
//!
//! Composes the status port, the shared query cache and the activation
//! mutation, and exposes the projected view:
//! - The status query fetches through `UpgradeStatusPort::fetch_status`
//! - The activation mutation runs `UpgradeStatusPort::activate_trial` and
//!   writes the returned status into the cache before it settles
//! - `retry` invalidates the status query, never writes it
//!
//! Views are projected inside `Mutation::read_committed`, so a successful
//! activation is seen as one step: the `ActiveTrial` status and the settled
//! mutation appear together.

use crate::config::UpgradeConfig;
use crate::error::UpgradeError;
use crate::projector::{project, ViewActions};
use crate::view::{Action, ViewState};
use std::sync::Arc;
use tokio::sync::watch;
use upgrade_port::{UpgradeStatus, UpgradeStatusPort};
use upgrade_query::{
    task_fn, Mutation, MutationState, QueryClient, QueryKey, QueryState, QuerySubscription,
};

/// Live upgrade view over one port
#[derive(Debug)]
pub struct UpgradeController {
    key: QueryKey,
    client: QueryClient<UpgradeStatus>,
    query: QuerySubscription<UpgradeStatus>,
    mutation: Mutation<UpgradeStatus>,
    mutation_rx: watch::Receiver<MutationState>,
    actions: ViewActions,
}

impl UpgradeController {
    /// Create controller on a shared cache
    ///
    /// Subscribes to the status query, fetching it unless already cached.
    /// The cache's retry policy applies; `config.retry` is only used by
    /// `from_config`.
    ///
    /// # Errors
    /// `UpgradeError::Config` if the configuration is invalid.
    ///
    /// # Panics
    /// Panics if a fetch must start outside a Tokio runtime.
    pub fn new(
        port: Arc<dyn UpgradeStatusPort>,
        client: QueryClient<UpgradeStatus>,
        config: &UpgradeConfig,
    ) -> Result<Self, UpgradeError> {
        config.validate()?;
        let key = config.key();

        let fetch_port = Arc::clone(&port);
        let query = client.subscribe(
            key.clone(),
            task_fn(move || {
                let port = Arc::clone(&fetch_port);
                async move { port.fetch_status().await }
            }),
        );

        let hook_client = client.clone();
        let hook_key = key.clone();
        let mutation = Mutation::new(task_fn(move || {
            let port = Arc::clone(&port);
            async move { port.activate_trial().await }
        }))
        .on_success(move |status: &UpgradeStatus| {
            hook_client.set_value(&hook_key, status.clone());
        });
        let mutation_rx = mutation.subscribe();

        let retry_client = client.clone();
        let retry_key = key.clone();
        let retry = Action::new("retry", move || {
            if let Err(err) = retry_client.invalidate(&retry_key) {
                tracing::warn!(error = %err, "retry ignored");
            }
        });

        let activate_mutation = mutation.clone();
        let activate_trial = Action::new("activate-trial", move || activate_mutation.run());

        tracing::debug!(key = %key, "upgrade controller created");

        Ok(Self {
            key,
            client,
            query,
            mutation,
            mutation_rx,
            actions: ViewActions {
                retry,
                activate_trial,
            },
        })
    }

    /// Create controller with its own cache built from `config`
    ///
    /// # Errors
    /// `UpgradeError::Config` if the configuration is invalid.
    pub fn from_config(
        port: Arc<dyn UpgradeStatusPort>,
        config: &UpgradeConfig,
    ) -> Result<Self, UpgradeError> {
        Self::new(port, QueryClient::new(config.retry), config)
    }

    /// Current view
    #[must_use]
    pub fn view(&self) -> ViewState {
        self.mutation
            .read_committed(|mutation| project(&self.query.state(), mutation, &self.actions))
    }

    /// Status query and activation mutation states, read as one commit
    #[must_use]
    pub fn snapshot(&self) -> (QueryState<UpgradeStatus>, MutationState) {
        self.mutation
            .read_committed(|mutation| (self.query.state(), mutation.clone()))
    }

    /// Wait for either engine to change and return the new view
    ///
    /// Returns `None` once the status query has been torn down.
    pub async fn changed(&mut self) -> Option<ViewState> {
        tokio::select! {
            res = self.query.changed() => res.ok()?,
            res = self.mutation_rx.changed() => res.ok()?,
        }
        Some(self.view())
    }

    /// Refetch the status
    ///
    /// # Errors
    /// `UpgradeError::Query` if the status query no longer exists.
    pub fn retry(&self) -> Result<(), UpgradeError> {
        self.client.invalidate(&self.key)?;
        Ok(())
    }

    /// Start trial activation in the background
    pub fn activate_trial(&self) {
        self.mutation.run();
    }

    /// Activate the trial and wait for the outcome
    ///
    /// # Errors
    /// `UpgradeError::Mutation` if an activation is already pending or fails.
    pub async fn activate_trial_async(&self) -> Result<UpgradeStatus, UpgradeError> {
        Ok(self.mutation.run_async().await?)
    }

    /// Status query state
    ///
    /// Use `snapshot` to read it together with the mutation state.
    #[must_use]
    pub fn query_state(&self) -> QueryState<UpgradeStatus> {
        self.query.state()
    }

    /// Activation mutation state
    #[must_use]
    pub fn mutation_state(&self) -> MutationState {
        self.mutation.state()
    }

    /// Actions bound into the views
    #[inline]
    #[must_use]
    pub fn actions(&self) -> &ViewActions {
        &self.actions
    }

    /// Status query key
    #[inline]
    #[must_use]
    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    /// Shared query cache
    #[inline]
    #[must_use]
    pub fn client(&self) -> &QueryClient<UpgradeStatus> {
        &self.client
    }
}
