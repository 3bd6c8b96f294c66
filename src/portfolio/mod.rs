// Multi-strategy capital allocation
pub mod manager;
pub mod performance;
pub mod registry;

pub use manager::{
    normalize_within_bounds, AllocationChange, AllocationPolicy, PortfolioManager, PortfolioSummary,
    RebalanceReport, StrategyConfig, StrategySummary,
};
pub use performance::{performance_multiplier, StrategyPerformance};
pub use registry::{RegistryError, StrategyAllocation, StrategyRegistry};
