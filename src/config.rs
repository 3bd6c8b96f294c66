//! Configuration management
//!
//! Loads an optional config file, then `CRYPTOREGIME__*` environment
//! variables (after `.env`). Every section falls back to its defaults, e.g.
//! `CRYPTOREGIME__PORTFOLIO__TOTAL_CAPITAL=25000`.

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::portfolio::{AllocationPolicy, RegistryError, StrategyAllocation, StrategyRegistry};
use crate::regime::{ConditionConfig, DetectorConfig};
use crate::strategy::BotPolicy;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid strategy roster: {0}")]
    Registry(#[from] RegistryError),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub detector: DetectorConfig,
    pub condition: ConditionConfig,
    pub portfolio: AllocationPolicy,
    pub bots: BotPolicy,
    /// Strategy roster; empty means the built-in roster
    pub strategies: Vec<StrategyAllocation>,
}

impl AppConfig {
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }

        let config = builder
            .add_source(
                Environment::with_prefix("CRYPTOREGIME")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let app_config: AppConfig = config.try_deserialize()?;
        tracing::debug!("Loaded configuration: {:?}", app_config);
        Ok(app_config)
    }

    /// Validated strategy roster
    pub fn registry(&self) -> Result<StrategyRegistry, ConfigError> {
        if self.strategies.is_empty() {
            return Ok(StrategyRegistry::default_roster());
        }
        Ok(StrategyRegistry::new(self.strategies.clone())?)
    }
}
