//! Messaging Upgrade Core
//!
//! Derives a presentation-ready view state from:
//! - The upgrade status query (cached, deduplicated, retried once)
//! - The trial activation mutation (tracked independently of the read path)
//!
//! The rendering layer consumes `ViewState` and calls back into the actions
//! it carries; nothing else crosses the boundary.
//!
//! # Example
//!
//! ```rust,ignore
//! use upgrade_core::{UpgradeConfig, UpgradeController, ViewState};
//! use upgrade_port::InMemorySimulator;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), upgrade_core::UpgradeError> {
//! let port = Arc::new(InMemorySimulator::default());
//! let mut controller = UpgradeController::from_config(port, &UpgradeConfig::new())?;
//!
//! while let Some(view) = controller.changed().await {
//!     if let ViewState::NotActive { transitioning: false, actions, .. } = &view {
//!         actions.activate_trial.invoke();
//!     }
//! }
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod config;
pub mod controller;
pub mod error;
pub mod projector;
pub mod view;

pub use config::UpgradeConfig;
pub use controller::UpgradeController;
pub use error::UpgradeError;
pub use projector::{project, try_project, ViewActions};
pub use view::{Action, NotActiveActions, ViewState, ViewStatus};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for consumers of the upgrade core
    pub use crate::{
        Action, UpgradeConfig, UpgradeController, UpgradeError, ViewState, ViewStatus,
    };
    pub use upgrade_port::{InMemorySimulator, SimulatorConfig, UpgradeStatus, UpgradeStatusPort};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
