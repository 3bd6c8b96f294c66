//! Portfolio-level market condition classifier
//!
//! A lighter classifier than `RegimeDetector`, run over a basket of reference
//! symbols. Produces a seven-way `PortfolioRegime` from three readings:
//! - trend strength in [-1, 1] (SMA spread, 20-bar momentum, EWM slope)
//! - volatility percentile in [0, 100] of the first reference symbol
//! - volume trend in [-1, 1] (recent vs older average volume)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::signal::{DetectorRegime, RegimeSignal};
use super::RegimeError;
use crate::indicators::{calculate_ewm_series, calculate_sma, calculate_volume_trend, series_slope, true_ranges};
use crate::models::Candle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortfolioRegime {
    BullStrong,
    BullModerate,
    Sideways,
    BearModerate,
    BearStrong,
    Accumulation,
    Distribution,
}

impl PortfolioRegime {
    pub const ALL: [PortfolioRegime; 7] = [
        PortfolioRegime::BullStrong,
        PortfolioRegime::BullModerate,
        PortfolioRegime::Sideways,
        PortfolioRegime::BearModerate,
        PortfolioRegime::BearStrong,
        PortfolioRegime::Accumulation,
        PortfolioRegime::Distribution,
    ];

    /// Column of this regime in the strategy catalog
    pub fn index(&self) -> usize {
        match self {
            PortfolioRegime::BullStrong => 0,
            PortfolioRegime::BullModerate => 1,
            PortfolioRegime::Sideways => 2,
            PortfolioRegime::BearModerate => 3,
            PortfolioRegime::BearStrong => 4,
            PortfolioRegime::Accumulation => 5,
            PortfolioRegime::Distribution => 6,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PortfolioRegime::BullStrong => "bull_strong",
            PortfolioRegime::BullModerate => "bull_moderate",
            PortfolioRegime::Sideways => "sideways",
            PortfolioRegime::BearModerate => "bear_moderate",
            PortfolioRegime::BearStrong => "bear_strong",
            PortfolioRegime::Accumulation => "accumulation",
            PortfolioRegime::Distribution => "distribution",
        }
    }

    /// Map a detector regime onto the portfolio regimes
    ///
    /// Bull/Bear split on confidence 0.6; Transition leans on the sign of the
    /// composite score (non-negative reads as accumulation).
    pub fn from_detector(regime: DetectorRegime, confidence: f64, composite: f64) -> Self {
        match regime {
            DetectorRegime::Bull if confidence >= 0.6 => PortfolioRegime::BullStrong,
            DetectorRegime::Bull => PortfolioRegime::BullModerate,
            DetectorRegime::Bear if confidence >= 0.6 => PortfolioRegime::BearStrong,
            DetectorRegime::Bear => PortfolioRegime::BearModerate,
            DetectorRegime::Sideways => PortfolioRegime::Sideways,
            DetectorRegime::Transition if composite >= 0.0 => PortfolioRegime::Accumulation,
            DetectorRegime::Transition => PortfolioRegime::Distribution,
        }
    }
}

impl std::fmt::Display for PortfolioRegime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketCondition {
    pub regime: PortfolioRegime,
    pub trend_strength: f64,
    pub volatility_percentile: f64,
    pub volume_trend: f64,
    pub confidence: f64,
    pub last_updated: DateTime<Utc>,
}

impl MarketCondition {
    /// Sideways condition with neutral readings
    pub fn neutral(confidence: f64, last_updated: DateTime<Utc>) -> Self {
        Self {
            regime: PortfolioRegime::Sideways,
            trend_strength: 0.0,
            volatility_percentile: 50.0,
            volume_trend: 0.0,
            confidence,
            last_updated,
        }
    }

    /// Condition derived from a detector signal
    ///
    /// The composite stands in for trend strength; volatility and volume are
    /// not measured by this path and stay neutral.
    pub fn from_signal(signal: &RegimeSignal) -> Self {
        Self {
            regime: PortfolioRegime::from_detector(signal.regime, signal.confidence, signal.composite),
            trend_strength: signal.composite.clamp(-1.0, 1.0),
            volatility_percentile: 50.0,
            volume_trend: 0.0,
            confidence: signal.confidence,
            last_updated: signal.timestamp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConditionConfig {
    /// The first symbol is the volatility reference
    pub reference_symbols: Vec<String>,
    pub trend_window: usize,
    pub short_sma: usize,
    pub momentum_bars: usize,
    pub ewm_span: usize,
    pub ewm_slope_bars: usize,
    pub trend_scale: f64,

    pub volatility_window: usize,
    pub atr_period: usize,

    pub volume_recent: usize,
    pub volume_older: usize,

    pub strong_trend: f64,
    pub moderate_trend: f64,
    pub strong_bull_volume: f64,
    pub strong_bull_max_volatility: f64,
    pub strong_bear_volume: f64,
    pub accumulation_volume: f64,
    pub accumulation_max_volatility: f64,
    pub distribution_volume: f64,
    pub distribution_min_volatility: f64,

    /// Confidence when a reference symbol is missing
    pub missing_data_confidence: f64,
}

impl Default for ConditionConfig {
    fn default() -> Self {
        Self {
            reference_symbols: vec!["BTC/USDT".to_string(), "ETH/USDT".to_string()],
            trend_window: 50,
            short_sma: 20,
            momentum_bars: 19,
            ewm_span: 21,
            ewm_slope_bars: 4,
            trend_scale: 5.0,
            volatility_window: 100,
            atr_period: 14,
            volume_recent: 10,
            volume_older: 20,
            strong_trend: 0.4,
            moderate_trend: 0.1,
            strong_bull_volume: 0.2,
            strong_bull_max_volatility: 70.0,
            strong_bear_volume: -0.1,
            accumulation_volume: 0.3,
            accumulation_max_volatility: 40.0,
            distribution_volume: -0.2,
            distribution_min_volatility: 60.0,
            missing_data_confidence: 0.3,
        }
    }
}

pub struct MarketConditionAnalyzer {
    config: ConditionConfig,
}

impl Default for MarketConditionAnalyzer {
    fn default() -> Self {
        Self::new(ConditionConfig::default())
    }
}

impl MarketConditionAnalyzer {
    pub fn new(config: ConditionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ConditionConfig {
        &self.config
    }

    /// Classify the basket of reference symbols
    ///
    /// A missing or empty reference symbol is `MissingReferenceData`; callers
    /// fall back to `MarketCondition::neutral` with `missing_data_confidence`.
    /// Non-finite readings are an error.
    pub fn analyze(
        &self,
        market_data: &HashMap<String, Vec<Candle>>,
        now: DateTime<Utc>,
    ) -> Result<MarketCondition, RegimeError> {
        let mut windows = Vec::with_capacity(self.config.reference_symbols.len());
        for symbol in &self.config.reference_symbols {
            match market_data.get(symbol) {
                Some(candles) if !candles.is_empty() => windows.push(candles.as_slice()),
                _ => {
                    return Err(RegimeError::MissingReferenceData(symbol.clone()));
                }
            }
        }
        if windows.is_empty() {
            return Err(RegimeError::NoReferenceSymbols);
        }

        let trend_strength = self.trend_strength(&windows);
        let volatility_percentile = self.volatility_percentile(windows[0]);
        let volume_trend = self.volume_trend(&windows);

        for (name, value) in [
            ("trend_strength", trend_strength),
            ("volatility_percentile", volatility_percentile),
            ("volume_trend", volume_trend),
        ] {
            if !value.is_finite() {
                return Err(RegimeError::NonFiniteReading(name));
            }
        }

        let regime = self.determine_regime(trend_strength, volatility_percentile, volume_trend);
        let confidence = condition_confidence(trend_strength, volatility_percentile, volume_trend);

        tracing::info!(
            "Market condition: {} (trend {:.3}, volatility {:.1}, volume {:.3}, confidence {:.2})",
            regime,
            trend_strength,
            volatility_percentile,
            volume_trend,
            confidence
        );

        Ok(MarketCondition {
            regime,
            trend_strength,
            volatility_percentile,
            volume_trend,
            confidence,
            last_updated: now,
        })
    }

    /// Average per-symbol trend score, scaled and clipped to [-1, 1]
    pub fn trend_strength(&self, windows: &[&[Candle]]) -> f64 {
        let scores: Vec<f64> = windows
            .iter()
            .filter_map(|candles| self.symbol_trend(candles))
            .collect();

        if scores.is_empty() {
            return 0.0;
        }
        let mean = scores.iter().sum::<f64>() / scores.len() as f64;
        (mean * self.config.trend_scale).clamp(-1.0, 1.0)
    }

    fn symbol_trend(&self, candles: &[Candle]) -> Option<f64> {
        let cfg = &self.config;
        if candles.len() < cfg.trend_window {
            return None;
        }

        let prices: Vec<f64> = candles[candles.len() - cfg.trend_window..]
            .iter()
            .map(|c| c.close)
            .collect();

        let sma_short = calculate_sma(&prices, cfg.short_sma)?;
        let sma_long = calculate_sma(&prices, cfg.trend_window)?;
        if sma_long == 0.0 {
            return None;
        }
        let short_trend = (sma_short - sma_long) / sma_long;

        let momentum = series_slope(&prices, cfg.momentum_bars)?;
        let ewm_slope = series_slope(&calculate_ewm_series(&prices, cfg.ewm_span), cfg.ewm_slope_bars)?;

        Some((short_trend + momentum + ewm_slope) / 3.0)
    }

    /// Share (0-100) of rolling ATR values strictly below the current ATR
    ///
    /// Needs `volatility_window + 1` candles, otherwise reads 50.
    pub fn volatility_percentile(&self, candles: &[Candle]) -> f64 {
        let window = self.config.volatility_window;
        let period = self.config.atr_period;
        if period == 0 || window < period || candles.len() < window + 1 {
            return 50.0;
        }

        let ranges = true_ranges(&candles[candles.len() - window - 1..]);
        let rolling: Vec<f64> = ranges
            .windows(period)
            .map(|w| w.iter().sum::<f64>() / period as f64)
            .collect();

        let Some(&current) = rolling.last() else {
            return 50.0;
        };
        let below = rolling.iter().filter(|&&atr| current > atr).count();
        below as f64 / rolling.len() as f64 * 100.0
    }

    /// Average per-symbol volume trend, clipped to [-1, 1]
    pub fn volume_trend(&self, windows: &[&[Candle]]) -> f64 {
        let trends: Vec<f64> = windows
            .iter()
            .filter_map(|candles| {
                calculate_volume_trend(candles, self.config.volume_recent, self.config.volume_older)
            })
            .collect();

        if trends.is_empty() {
            return 0.0;
        }
        (trends.iter().sum::<f64>() / trends.len() as f64).clamp(-1.0, 1.0)
    }

    pub fn determine_regime(&self, trend: f64, volatility: f64, volume: f64) -> PortfolioRegime {
        let cfg = &self.config;

        if trend > cfg.strong_trend && volume > cfg.strong_bull_volume && volatility < cfg.strong_bull_max_volatility {
            PortfolioRegime::BullStrong
        } else if trend > cfg.moderate_trend && trend <= cfg.strong_trend {
            PortfolioRegime::BullModerate
        } else if trend < -cfg.strong_trend && volume < cfg.strong_bear_volume {
            PortfolioRegime::BearStrong
        } else if trend < -cfg.moderate_trend && trend >= -cfg.strong_trend {
            PortfolioRegime::BearModerate
        } else if trend.abs() < cfg.moderate_trend
            && volume > cfg.accumulation_volume
            && volatility < cfg.accumulation_max_volatility
        {
            PortfolioRegime::Accumulation
        } else if trend.abs() < cfg.moderate_trend
            && volume < cfg.distribution_volume
            && volatility > cfg.distribution_min_volatility
        {
            PortfolioRegime::Distribution
        } else {
            PortfolioRegime::Sideways
        }
    }
}

/// Mean of trend, volume and volatility-extremity confidences
fn condition_confidence(trend: f64, volatility: f64, volume: f64) -> f64 {
    let trend_confidence = (trend.abs() * 2.0).min(1.0);
    let volume_confidence = (volume.abs() * 2.0).min(1.0);
    let volatility_confidence = if volatility > 80.0 || volatility < 20.0 { 0.8 } else { 0.4 };

    (trend_confidence + volume_confidence + volatility_confidence) / 3.0
}
