//! Testing utilities for the messaging upgrade workspace
//!
//! Shared port fixtures and time helpers.

#![allow(missing_docs)]

use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use upgrade_port::{PortError, UpgradeStatus, UpgradeStatusPort};

/// Manufactured provider latency
pub const PROVIDER_LATENCY: Duration = Duration::from_millis(1000);

/// Trial length granted on activation
pub const TRIAL_DAYS: i64 = 4;

pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
}

pub fn trial_expiry(now: DateTime<Utc>) -> DateTime<Utc> {
    now + chrono::Duration::days(TRIAL_DAYS)
}

pub fn network_error() -> PortError {
    PortError::network("network error")
}

type Outcome = Result<UpgradeStatus, PortError>;

/// Port answering from scripted outcome queues
///
/// Every call sleeps `latency` first. When a queue runs dry, fetches
/// resolve to `NotActive` and activations to a 4-day trial from
/// `fixed_now()`.
#[derive(Debug)]
pub struct ScriptedPort {
    latency: Duration,
    fetches: Mutex<VecDeque<Outcome>>,
    activations: Mutex<VecDeque<Outcome>>,
    fetch_calls: AtomicU32,
    activate_calls: AtomicU32,
}

impl ScriptedPort {
    pub fn new() -> Self {
        Self {
            latency: PROVIDER_LATENCY,
            fetches: Mutex::new(VecDeque::new()),
            activations: Mutex::new(VecDeque::new()),
            fetch_calls: AtomicU32::new(0),
            activate_calls: AtomicU32::new(0),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn then_fetch(self, outcome: Outcome) -> Self {
        self.push_fetch(outcome);
        self
    }

    pub fn then_activate(self, outcome: Outcome) -> Self {
        self.push_activation(outcome);
        self
    }

    pub fn push_fetch(&self, outcome: Outcome) {
        self.fetches.lock().push_back(outcome);
    }

    pub fn push_activation(&self, outcome: Outcome) {
        self.activations.lock().push_back(outcome);
    }

    pub fn fetch_calls(&self) -> u32 {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn activate_calls(&self) -> u32 {
        self.activate_calls.load(Ordering::SeqCst)
    }
}

impl Default for ScriptedPort {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl UpgradeStatusPort for ScriptedPort {
    async fn fetch_status(&self) -> Result<UpgradeStatus, PortError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let outcome = self
            .fetches
            .lock()
            .pop_front()
            .unwrap_or(Ok(UpgradeStatus::NotActive));
        tokio::time::sleep(self.latency).await;
        outcome
    }

    async fn activate_trial(&self) -> Result<UpgradeStatus, PortError> {
        self.activate_calls.fetch_add(1, Ordering::SeqCst);
        let outcome = self
            .activations
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(UpgradeStatus::active_trial(trial_expiry(fixed_now()))));
        tokio::time::sleep(self.latency).await;
        outcome
    }
}
