//! Strategy roster with per-strategy allocation bounds
//!
//! The roster is fixed once built; rebalancing mutates allocations and the
//! active flag in place but never adds or removes strategies.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

use crate::strategy::StrategyType;

pub const DEFAULT_MIN_ALLOCATION: f64 = 5.0;
pub const DEFAULT_MAX_ALLOCATION: f64 = 50.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyAllocation {
    pub name: String,
    pub strategy_type: StrategyType,
    /// Percentage of capital, 0-100
    pub allocation_pct: f64,
    pub active: bool,
    #[serde(default = "default_min_allocation")]
    pub min_allocation: f64,
    #[serde(default = "default_max_allocation")]
    pub max_allocation: f64,
}

fn default_min_allocation() -> f64 {
    DEFAULT_MIN_ALLOCATION
}

fn default_max_allocation() -> f64 {
    DEFAULT_MAX_ALLOCATION
}

impl StrategyAllocation {
    /// Active strategy with the default 5-50% bounds
    pub fn new(name: &str, strategy_type: StrategyType, allocation_pct: f64) -> Self {
        Self {
            name: name.to_string(),
            strategy_type,
            allocation_pct,
            active: true,
            min_allocation: DEFAULT_MIN_ALLOCATION,
            max_allocation: DEFAULT_MAX_ALLOCATION,
        }
    }

    pub fn with_bounds(mut self, min_allocation: f64, max_allocation: f64) -> Self {
        self.min_allocation = min_allocation;
        self.max_allocation = max_allocation;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum RegistryError {
    #[error("strategy registry is empty")]
    Empty,

    #[error("strategy name is empty")]
    EmptyName,

    #[error("duplicate strategy name: {0}")]
    DuplicateName(String),

    #[error("strategy {0} has a non-finite value")]
    NonFinite(String),

    #[error("strategy {name}: bounds must satisfy 0 <= min ({min}) <= max ({max}) <= 100")]
    InvalidBounds { name: String, min: f64, max: f64 },

    #[error("strategy {name}: allocation {value} outside 0-100")]
    InvalidAllocation { name: String, value: f64 },

    #[error("unknown strategy: {0}")]
    UnknownStrategy(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyRegistry {
    strategies: Vec<StrategyAllocation>,
}

impl StrategyRegistry {
    /// Validate and build a roster
    pub fn new(strategies: Vec<StrategyAllocation>) -> Result<Self, RegistryError> {
        if strategies.is_empty() {
            return Err(RegistryError::Empty);
        }

        let mut seen = HashSet::new();
        for s in &strategies {
            if s.name.trim().is_empty() {
                return Err(RegistryError::EmptyName);
            }
            if !seen.insert(s.name.as_str()) {
                return Err(RegistryError::DuplicateName(s.name.clone()));
            }
            if ![s.allocation_pct, s.min_allocation, s.max_allocation]
                .iter()
                .all(|v| v.is_finite())
            {
                return Err(RegistryError::NonFinite(s.name.clone()));
            }
            if s.min_allocation < 0.0 || s.min_allocation > s.max_allocation || s.max_allocation > 100.0 {
                return Err(RegistryError::InvalidBounds {
                    name: s.name.clone(),
                    min: s.min_allocation,
                    max: s.max_allocation,
                });
            }
            if !(0.0..=100.0).contains(&s.allocation_pct) {
                return Err(RegistryError::InvalidAllocation {
                    name: s.name.clone(),
                    value: s.allocation_pct,
                });
            }
        }

        Ok(Self { strategies })
    }

    /// Production roster
    pub fn default_roster() -> Self {
        Self {
            strategies: vec![
                StrategyAllocation::new("MegaMomentumStrategy", StrategyType::MomentumBreakout, 35.0)
                    .with_bounds(DEFAULT_MIN_ALLOCATION, 45.0),
                StrategyAllocation::new("SmartLiquidityStrategy", StrategyType::SmartMoney, 30.0)
                    .with_bounds(DEFAULT_MIN_ALLOCATION, 40.0),
                StrategyAllocation::new("SimpleTrendStrategy", StrategyType::TrendFollowing, 20.0)
                    .with_bounds(DEFAULT_MIN_ALLOCATION, 30.0),
                StrategyAllocation::new("RangeReversionStrategy", StrategyType::MeanReversion, 15.0)
                    .with_bounds(DEFAULT_MIN_ALLOCATION, 25.0),
                // Backup, enabled by the activation floor
                StrategyAllocation::new("ExplosiveMomentumStrategy", StrategyType::MomentumBreakout, 15.0)
                    .with_bounds(0.0, 25.0)
                    .inactive(),
            ],
        }
    }

    pub fn get(&self, name: &str) -> Option<&StrategyAllocation> {
        self.strategies.iter().find(|s| s.name == name)
    }

    pub(crate) fn get_mut(&mut self, name: &str) -> Option<&mut StrategyAllocation> {
        self.strategies.iter_mut().find(|s| s.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StrategyAllocation> {
        self.strategies.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut StrategyAllocation> {
        self.strategies.iter_mut()
    }

    pub fn active(&self) -> impl Iterator<Item = &StrategyAllocation> {
        self.strategies.iter().filter(|s| s.active)
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Sum of active allocations
    pub fn active_total(&self) -> f64 {
        self.active().map(|s| s.allocation_pct).sum()
    }
}
