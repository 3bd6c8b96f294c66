// Core modules
pub mod backtest;
pub mod config;
pub mod indicators;
pub mod models;
pub mod portfolio;
pub mod regime;
pub mod strategy;

// Re-export commonly used types
pub use models::*;
pub use portfolio::{PortfolioManager, RebalanceReport};
pub use regime::{MarketCondition, RegimeDetector, RegimeSignal};

// Error handling
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;
