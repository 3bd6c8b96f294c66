// Market regime detection module
pub mod condition;
pub mod detector;
pub mod signal;

use thiserror::Error;

use crate::models::CandleError;

pub use condition::{ConditionConfig, MarketCondition, MarketConditionAnalyzer, PortfolioRegime};
pub use detector::{DetectorConfig, FlowParamsConfig, RegimeDetector, RegimeHistoryEntry, RegimeSummary};
pub use signal::{
    classify_composite, composite_score, signal_strength, DetectorRegime, Indicator, Recommendations,
    RegimeSignal, RegimeThresholds, SignalWeights,
};

#[derive(Debug, Error)]
pub enum RegimeError {
    #[error("invalid candles: {0}")]
    Candles(#[from] CandleError),

    #[error("{0:?} sub-score is not finite")]
    NonFiniteScore(Indicator),

    #[error("composite score is not finite")]
    NonFiniteComposite,

    #[error("{0} reading is not finite")]
    NonFiniteReading(&'static str),

    #[error("no market data for reference symbol {0}")]
    MissingReferenceData(String),

    #[error("no reference symbols configured")]
    NoReferenceSymbols,
}
