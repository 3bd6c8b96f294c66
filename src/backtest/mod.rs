// Synthetic data and walk-forward regime replay
pub mod runner;
pub mod synthetic;

pub use runner::{RegimeReplay, ReplayReport, DEFAULT_LOOKBACK, DEFAULT_WARMUP};
pub use synthetic::{MarketScenario, SyntheticDataGenerator};
