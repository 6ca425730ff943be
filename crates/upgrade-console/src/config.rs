//! Console configuration file

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;
use upgrade_core::UpgradeConfig;
use upgrade_port::SimulatorConfig;

/// Console configuration
///
/// Loaded from TOML with `[upgrade]` and `[simulator]` tables; missing
/// tables and fields take their defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct ConsoleConfig {
    pub(crate) upgrade: UpgradeConfig,
    pub(crate) simulator: SimulatorConfig,
}

impl ConsoleConfig {
    pub(crate) fn from_toml_str(input: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(input).context("invalid console configuration")?;
        config.upgrade.validate()?;
        config.simulator.validate()?;
        Ok(config)
    }

    /// Load `path`, or defaults when no file is given
    pub(crate) fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let input = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::from_toml_str(&input).with_context(|| format!("loading {}", path.display()))
    }
}
