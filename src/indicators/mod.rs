// Technical indicators module
// Implements MA, RSI, ATR, VWAP and structure/volume analysis for regime scoring

pub mod atr;
pub mod market_analysis;
pub mod moving_average;
pub mod rsi;
pub mod vwap;

pub use atr::{calculate_atr_pct_series, calculate_atr_series, percentile_rank_of_last, true_ranges};
pub use market_analysis::{
    analyze_structure_counts, calculate_average_volume, calculate_volume_trend,
    calculate_volume_weighted_returns, StructureCounts,
};
pub use moving_average::{calculate_ema_series, calculate_ewm_series, calculate_sma, series_slope};
pub use rsi::{calculate_rsi, centered_rsi};
pub use vwap::{analyze_smart_money_flow, calculate_vwap_series, quantile, FlowParams, SmartMoneyFlow};
