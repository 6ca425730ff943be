//! In-memory upgrade status provider
//!
//! Stands in for the network-backed provider:
//! - Fixed manufactured latency before every response (1000ms by default)
//! - Trial length of 4 days from the activation instant
//! - Remembers a successful activation for subsequent fetches
//! - Optional fault injection for the first N calls of each operation

use crate::clock::{Clock, SystemClock};
use crate::error::PortError;
use crate::port::UpgradeStatusPort;
use crate::status::UpgradeStatus;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Simulator configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Delay before each response in milliseconds
    pub latency_ms: u64,
    /// Trial length in days
    pub trial_days: i64,
    /// Number of leading fetches that fail
    pub fail_fetches: u32,
    /// Number of leading activations that fail
    pub fail_activations: u32,
    /// Message carried by injected failures
    pub failure_message: String,
}

impl SimulatorConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With response latency
    #[inline]
    #[must_use]
    pub fn with_latency_ms(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    /// With leading fetch failures
    #[inline]
    #[must_use]
    pub fn with_fail_fetches(mut self, count: u32) -> Self {
        self.fail_fetches = count;
        self
    }

    /// With leading activation failures
    #[inline]
    #[must_use]
    pub fn with_fail_activations(mut self, count: u32) -> Self {
        self.fail_activations = count;
        self
    }

    /// With trial length
    #[inline]
    #[must_use]
    pub fn with_trial_days(mut self, days: i64) -> Self {
        self.trial_days = days;
        self
    }

    /// Response latency
    #[inline]
    #[must_use]
    pub fn latency(&self) -> Duration {
        Duration::from_millis(self.latency_ms)
    }

    /// Trial length as a duration, `None` unless it is a positive
    /// representable number of days
    #[must_use]
    pub fn trial_length(&self) -> Option<chrono::Duration> {
        if self.trial_days < 1 {
            return None;
        }
        chrono::Duration::try_days(self.trial_days)
    }

    /// Validate configuration
    ///
    /// # Errors
    /// `SimulatorConfigError::TrialDays` unless `trial_days` is a positive
    /// representable number of days.
    pub fn validate(&self) -> Result<(), SimulatorConfigError> {
        match self.trial_length() {
            Some(_) => Ok(()),
            None => Err(SimulatorConfigError::TrialDays(self.trial_days)),
        }
    }
}

/// Invalid simulator configuration
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SimulatorConfigError {
    /// Trial must end in the future
    #[error("trial_days must be a positive number of days, got {0}")]
    TrialDays(i64),
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            latency_ms: 1000,
            trial_days: 4,
            fail_fetches: 0,
            fail_activations: 0,
            failure_message: "network error".to_string(),
        }
    }
}

/// In-memory provider
#[derive(Debug)]
pub struct InMemorySimulator {
    config: SimulatorConfig,
    clock: Arc<dyn Clock>,
    activated: Mutex<Option<UpgradeStatus>>,
    fetch_calls: AtomicU32,
    activate_calls: AtomicU32,
}

impl InMemorySimulator {
    /// Create simulator on the system clock
    #[inline]
    #[must_use]
    pub fn new(config: SimulatorConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create simulator on a custom clock
    #[must_use]
    pub fn with_clock(config: SimulatorConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            activated: Mutex::new(None),
            fetch_calls: AtomicU32::new(0),
            activate_calls: AtomicU32::new(0),
        }
    }

    /// Number of `fetch_status` calls received
    #[inline]
    #[must_use]
    pub fn fetch_calls(&self) -> u32 {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    /// Number of `activate_trial` calls received
    #[inline]
    #[must_use]
    pub fn activate_calls(&self) -> u32 {
        self.activate_calls.load(Ordering::SeqCst)
    }

    /// Simulator configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    fn injected_failure(&self) -> PortError {
        PortError::network(self.config.failure_message.clone())
    }
}

impl Default for InMemorySimulator {
    fn default() -> Self {
        Self::new(SimulatorConfig::default())
    }
}

#[async_trait::async_trait]
impl UpgradeStatusPort for InMemorySimulator {
    async fn fetch_status(&self) -> Result<UpgradeStatus, PortError> {
        let call = self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.config.latency()).await;

        if call < self.config.fail_fetches {
            tracing::debug!(call, "simulated fetch failure");
            return Err(self.injected_failure());
        }

        Ok(self
            .activated
            .lock()
            .clone()
            .unwrap_or(UpgradeStatus::NotActive))
    }

    async fn activate_trial(&self) -> Result<UpgradeStatus, PortError> {
        let call = self.activate_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.config.latency()).await;

        if call < self.config.fail_activations {
            tracing::debug!(call, "simulated activation failure");
            return Err(self.injected_failure());
        }

        let expires_at = self
            .config
            .trial_length()
            .and_then(|trial| self.clock.now().checked_add_signed(trial))
            .ok_or_else(|| {
                PortError::server(format!(
                    "cannot grant a trial of {} days",
                    self.config.trial_days
                ))
            })?;
        let status = UpgradeStatus::active_trial(expires_at);
        *self.activated.lock() = Some(status.clone());
        Ok(status)
    }
}
