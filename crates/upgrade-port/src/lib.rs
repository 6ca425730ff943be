//! Upgrade Status Port
//!
//! The abstract capability the upgrade core depends on:
//! - `UpgradeStatus`, the tagged status value produced by providers
//! - `UpgradeStatusPort`, the two asynchronous operations (fetch, activate)
//! - `InMemorySimulator`, a provider with manufactured latency and fault injection
//!
//! # Example
//!
//! ```rust,ignore
//! use upgrade_port::{InMemorySimulator, SimulatorConfig, UpgradeStatusPort};
//!
//! # async fn example() -> Result<(), upgrade_port::PortError> {
//! let port = InMemorySimulator::new(SimulatorConfig::new());
//! let status = port.fetch_status().await?;
//! assert!(status.is_not_active());
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod clock;
pub mod error;
pub mod port;
pub mod simulator;
pub mod status;

pub use clock::{Clock, FixedClock, SystemClock};
pub use error::PortError;
pub use port::UpgradeStatusPort;
pub use simulator::{InMemorySimulator, SimulatorConfig, SimulatorConfigError};
pub use status::UpgradeStatus;

#[cfg(any(test, feature = "mock"))]
pub use port::MockUpgradeStatusPort;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
