//! Market Regime Detector using six indicator families
//!
//! Scores trend, volatility, market structure, volume, smart-money flow and
//! momentum in [-1, 1] each, then classifies the weighted composite:
//! - Bull: composite > 0.3 → momentum and smart-money bots
//! - Bear: composite < -0.3 → smart-money exits and mean reversion
//! - Sideways: |composite| < 0.15 → range trading
//! - Transition: anything in between → follow smart money, avoid counter-trend
//!
//! Any sub-score without enough history contributes 0. Regime history and
//! duration are tracked per pair.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};

use super::signal::{
    classify_composite, composite_score, signal_strength, DetectorRegime, Indicator,
    Recommendations, RegimeSignal, RegimeThresholds, SignalWeights,
};
use super::RegimeError;
use crate::indicators::{
    analyze_smart_money_flow, analyze_structure_counts, calculate_atr_pct_series, calculate_ema_series,
    calculate_volume_weighted_returns, centered_rsi, percentile_rank_of_last, series_slope, FlowParams,
};
use crate::models::{validate_candles, Candle};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub weights: SignalWeights,
    pub thresholds: RegimeThresholds,

    pub ema_periods: Vec<usize>,
    /// Contribution of the close being above (+) or below (-) each EMA
    pub ema_alignment_weight: f64,
    pub fast_slope_period: usize,
    pub fast_slope_bars: usize,
    pub fast_slope_threshold: f64,
    pub fast_slope_weight: f64,
    pub slow_slope_period: usize,
    pub slow_slope_bars: usize,
    pub slow_slope_threshold: f64,
    pub slow_slope_weight: f64,

    pub atr_period: usize,
    pub volatility_rank_window: usize,
    pub high_volatility_rank: f64,
    pub low_volatility_rank: f64,
    pub high_volatility_score: f64,
    pub low_volatility_score: f64,
    pub normal_volatility_score: f64,

    pub swing_window: usize,
    pub structure_lookback: usize,

    pub volume_period: usize,
    pub volume_lookback: usize,
    pub volume_scale: f64,

    pub flow: FlowParamsConfig,

    pub rsi_period: usize,
    pub momentum_lookback: usize,
    pub momentum_return_scale: f64,

    /// Entries kept per pair
    pub history_limit: usize,
    /// Readings inspected by `regime_summary` when counting changes
    pub summary_window: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            weights: SignalWeights::default(),
            thresholds: RegimeThresholds::default(),
            ema_periods: vec![8, 21, 50, 200],
            ema_alignment_weight: 0.25,
            fast_slope_period: 21,
            fast_slope_bars: 4,
            fast_slope_threshold: 0.02,
            fast_slope_weight: 0.2,
            slow_slope_period: 50,
            slow_slope_bars: 9,
            slow_slope_threshold: 0.01,
            slow_slope_weight: 0.1,
            atr_period: 14,
            volatility_rank_window: 50,
            high_volatility_rank: 0.8,
            low_volatility_rank: 0.2,
            high_volatility_score: -0.5,
            low_volatility_score: 0.0,
            normal_volatility_score: 0.3,
            swing_window: 5,
            structure_lookback: 10,
            volume_period: 20,
            volume_lookback: 10,
            volume_scale: 10.0,
            flow: FlowParamsConfig::default(),
            rsi_period: 14,
            momentum_lookback: 10,
            momentum_return_scale: 10.0,
            history_limit: 100,
            summary_window: 24,
        }
    }
}

/// Serializable mirror of `FlowParams`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowParamsConfig {
    pub vwap_period: usize,
    pub vwap_smoothing: usize,
    pub volume_window: usize,
    pub volume_quantile: f64,
    pub max_range_pct: f64,
    pub activity_lookback: usize,
}

impl Default for FlowParamsConfig {
    fn default() -> Self {
        let p = FlowParams::default();
        Self {
            vwap_period: p.vwap_period,
            vwap_smoothing: p.vwap_smoothing,
            volume_window: p.volume_window,
            volume_quantile: p.volume_quantile,
            max_range_pct: p.max_range_pct,
            activity_lookback: p.activity_lookback,
        }
    }
}

impl From<FlowParamsConfig> for FlowParams {
    fn from(c: FlowParamsConfig) -> Self {
        FlowParams {
            vwap_period: c.vwap_period,
            vwap_smoothing: c.vwap_smoothing,
            volume_window: c.volume_window,
            volume_quantile: c.volume_quantile,
            max_range_pct: c.max_range_pct,
            activity_lookback: c.activity_lookback,
        }
    }
}

/// One recorded analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeHistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub regime: DetectorRegime,
    pub confidence: f64,
    pub strength: f64,
}

#[derive(Debug, Default)]
struct PairHistory {
    entries: VecDeque<RegimeHistoryEntry>,
    duration: u32,
}

/// Snapshot of the latest regime of a pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeSummary {
    pub pair: String,
    pub current_regime: DetectorRegime,
    pub confidence: f64,
    pub strength: f64,
    pub duration: u32,
    /// Readings in the summary window whose regime differs from the latest
    pub regime_changes: usize,
}

pub struct RegimeDetector {
    config: DetectorConfig,
    history: HashMap<String, PairHistory>,
}

impl Default for RegimeDetector {
    fn default() -> Self {
        Self::new(DetectorConfig::default())
    }
}

impl RegimeDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self {
            config,
            history: HashMap::new(),
        }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Analyze a candle window for one pair
    ///
    /// Never fails: on invalid input or a non-finite score the error is logged
    /// and a neutral Sideways signal is returned without touching the history.
    pub fn analyze_market_regime(&mut self, candles: &[Candle], pair: &str) -> RegimeSignal {
        let timestamp = candles.last().map(|c| c.timestamp).unwrap_or_else(Utc::now);

        match self.try_analyze(candles, pair, timestamp) {
            Ok(signal) => {
                tracing::info!(
                    "Regime detected for {}: {} (confidence {:.2}, strength {:.2}, duration {})",
                    pair,
                    signal.regime,
                    signal.confidence,
                    signal.strength,
                    signal.duration
                );
                signal
            }
            Err(e) => {
                tracing::error!("Regime analysis failed for {}: {}", pair, e);
                RegimeSignal::fallback(pair, timestamp)
            }
        }
    }

    fn try_analyze(
        &mut self,
        candles: &[Candle],
        pair: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<RegimeSignal, RegimeError> {
        validate_candles(candles)?;

        let signals = self.compute_signals(candles)?;
        let composite = composite_score(&signals, &self.config.weights);
        if !composite.is_finite() {
            return Err(RegimeError::NonFiniteComposite);
        }

        let (regime, confidence) = classify_composite(composite, &self.config.thresholds);
        let strength = signal_strength(confidence, &signals);
        let recommendations = Recommendations::for_regime(regime, &signals, &self.config.thresholds);

        let duration = self.record(
            pair,
            RegimeHistoryEntry {
                timestamp,
                regime,
                confidence,
                strength,
            },
        );

        tracing::debug!("{} sub-scores: {:?} composite {:.3}", pair, signals, composite);

        Ok(RegimeSignal {
            pair: pair.to_string(),
            timestamp,
            regime,
            confidence,
            strength,
            duration,
            composite,
            signals,
            recommendations,
        })
    }

    /// All six sub-scores, each clipped to [-1, 1]
    pub fn compute_signals(&self, candles: &[Candle]) -> Result<BTreeMap<Indicator, f64>, RegimeError> {
        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();

        let mut signals = BTreeMap::new();
        for indicator in Indicator::ALL {
            let score = match indicator {
                Indicator::Trend => self.trend_score(&closes),
                Indicator::Volatility => self.volatility_score(candles),
                Indicator::Structure => self.structure_score(candles),
                Indicator::Volume => self.volume_score(candles),
                Indicator::SmartMoney => self.smart_money_score(candles),
                Indicator::Momentum => self.momentum_score(&closes),
            }
            .unwrap_or(0.0);

            if !score.is_finite() {
                return Err(RegimeError::NonFiniteScore(indicator));
            }
            signals.insert(indicator, score.clamp(-1.0, 1.0));
        }

        Ok(signals)
    }

    /// EMA alignment plus EMA slope adjustments
    fn trend_score(&self, closes: &[f64]) -> Option<f64> {
        let cfg = &self.config;
        let current = *closes.last()?;

        let mut score = 0.0;
        for &period in &cfg.ema_periods {
            if let Some(ema) = calculate_ema_series(closes, period).last() {
                score += if current > *ema {
                    cfg.ema_alignment_weight
                } else {
                    -cfg.ema_alignment_weight
                };
            }
        }

        score += slope_adjustment(
            &calculate_ema_series(closes, cfg.fast_slope_period),
            cfg.fast_slope_bars,
            cfg.fast_slope_threshold,
            cfg.fast_slope_weight,
        );
        score += slope_adjustment(
            &calculate_ema_series(closes, cfg.slow_slope_period),
            cfg.slow_slope_bars,
            cfg.slow_slope_threshold,
            cfg.slow_slope_weight,
        );

        Some(score)
    }

    /// Percentile of current ATR% within its recent history
    fn volatility_score(&self, candles: &[Candle]) -> Option<f64> {
        let cfg = &self.config;
        let atr_pct = calculate_atr_pct_series(candles, cfg.atr_period);
        let rank = percentile_rank_of_last(&atr_pct, cfg.volatility_rank_window)?;

        Some(if rank > cfg.high_volatility_rank {
            cfg.high_volatility_score
        } else if rank < cfg.low_volatility_rank {
            cfg.low_volatility_score
        } else {
            cfg.normal_volatility_score
        })
    }

    fn structure_score(&self, candles: &[Candle]) -> Option<f64> {
        let lookback = self.config.structure_lookback;
        analyze_structure_counts(candles, self.config.swing_window, lookback)
            .map(|counts| counts.net_score(lookback))
    }

    fn volume_score(&self, candles: &[Candle]) -> Option<f64> {
        let cfg = &self.config;
        calculate_volume_weighted_returns(candles, cfg.volume_period, cfg.volume_lookback)
            .map(|vwr| vwr * cfg.volume_scale)
    }

    fn smart_money_score(&self, candles: &[Candle]) -> Option<f64> {
        analyze_smart_money_flow(candles, &self.config.flow.into()).map(|flow| flow.score())
    }

    /// Centered RSI blended with the scaled N-bar return
    fn momentum_score(&self, closes: &[f64]) -> Option<f64> {
        let cfg = &self.config;
        let rsi = centered_rsi(closes, cfg.rsi_period)?;
        let price_return = series_slope(closes, cfg.momentum_lookback)?;
        Some((rsi + price_return * cfg.momentum_return_scale) / 2.0)
    }

    /// Append to the pair's history and return the updated duration
    fn record(&mut self, pair: &str, entry: RegimeHistoryEntry) -> u32 {
        let limit = self.config.history_limit.max(1);
        let history = self.history.entry(pair.to_string()).or_default();

        history.duration = match history.entries.back() {
            Some(last) if last.regime == entry.regime => history.duration + 1,
            _ => 0,
        };

        history.entries.push_back(entry);
        while history.entries.len() > limit {
            history.entries.pop_front();
        }

        history.duration
    }

    /// Recorded analyses of a pair, oldest first
    pub fn history(&self, pair: &str) -> Vec<RegimeHistoryEntry> {
        self.history
            .get(pair)
            .map(|h| h.entries.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn regime_summary(&self, pair: &str) -> Option<RegimeSummary> {
        let history = self.history.get(pair)?;
        let latest = history.entries.back()?;

        let regime_changes = history
            .entries
            .iter()
            .rev()
            .take(self.config.summary_window)
            .filter(|e| e.regime != latest.regime)
            .count();

        Some(RegimeSummary {
            pair: pair.to_string(),
            current_regime: latest.regime,
            confidence: latest.confidence,
            strength: latest.strength,
            duration: history.duration,
            regime_changes,
        })
    }
}

/// ±weight when the series moved more than ±threshold over `bars`
fn slope_adjustment(series: &[f64], bars: usize, threshold: f64, weight: f64) -> f64 {
    match series_slope(series, bars) {
        Some(slope) if slope > threshold => weight,
        Some(slope) if slope < -threshold => -weight,
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn create_test_candles(closes: &[f64], volumes: &[f64]) -> Vec<Candle> {
        let start = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        closes
            .iter()
            .zip(volumes)
            .enumerate()
            .map(|(i, (&close, &volume))| Candle {
                symbol: "TEST".to_string(),
                timestamp: start + Duration::hours(i as i64),
                open: close * 0.999,
                high: close * 1.005,
                low: close * 0.995,
                close,
                volume,
            })
            .collect()
    }

    fn rising(n: usize) -> Vec<Candle> {
        let closes: Vec<f64> = (0..n).map(|i| 100.0 * 1.005f64.powi(i as i32)).collect();
        let volumes: Vec<f64> = (0..n).map(|i| 1000.0 + 10.0 * i as f64).collect();
        create_test_candles(&closes, &volumes)
    }

    fn falling(n: usize) -> Vec<Candle> {
        let closes: Vec<f64> = (0..n).map(|i| 100.0 * 0.995f64.powi(i as i32)).collect();
        let volumes: Vec<f64> = (0..n).map(|i| 4000.0 - 10.0 * i as f64).collect();
        create_test_candles(&closes, &volumes)
    }

    fn flat(n: usize) -> Vec<Candle> {
        create_test_candles(&vec![100.0; n], &vec![1000.0; n])
    }

    #[test]
    fn test_detect_bull_market() {
        let mut detector = RegimeDetector::default();
        let signal = detector.analyze_market_regime(&rising(250), "BTC/USDT");

        assert_eq!(signal.regime, DetectorRegime::Bull);
        assert!(signal.confidence >= 0.3, "confidence {}", signal.confidence);
        assert_eq!(signal.signals[&Indicator::Trend], 1.0);
        assert_eq!(signal.recommendations.primary_strategy, "bull");
    }

    #[test]
    fn test_detect_bear_market() {
        let mut detector = RegimeDetector::default();
        let signal = detector.analyze_market_regime(&falling(250), "BTC/USDT");

        assert_eq!(signal.regime, DetectorRegime::Bear);
        assert_eq!(signal.signals[&Indicator::Trend], -1.0);
        assert_eq!(
            signal.recommendations.focus_bots.as_deref(),
            Some("Smart Money Tracker, Mean Reversion Bot")
        );
    }

    #[test]
    fn test_flat_market_is_not_trending() {
        let mut detector = RegimeDetector::default();
        let signal = detector.analyze_market_regime(&flat(250), "BTC/USDT");

        // Close equals every EMA, so alignment reads bearish while the rest is neutral
        assert_ne!(signal.regime, DetectorRegime::Bull);
        assert_eq!(signal.signals[&Indicator::Structure], 0.0);
        assert_eq!(signal.signals[&Indicator::Volume], 0.0);
        assert_eq!(signal.signals[&Indicator::Momentum], 0.0);
    }

    #[test]
    fn test_outputs_are_bounded() {
        let mut detector = RegimeDetector::default();
        for candles in [rising(250), falling(250), flat(250), rising(30)] {
            let signal = detector.analyze_market_regime(&candles, "TEST");
            assert!((0.0..=1.0).contains(&signal.confidence));
            assert!((0.0..=1.0).contains(&signal.strength));
            for (indicator, value) in &signal.signals {
                assert!((-1.0..=1.0).contains(value), "{:?} = {}", indicator, value);
            }
        }
    }

    #[test]
    fn test_short_window_degrades_to_zero() {
        let detector = RegimeDetector::default();
        let signals = detector.compute_signals(&rising(20)).unwrap();

        assert_eq!(signals[&Indicator::Volatility], 0.0);
        assert_eq!(signals[&Indicator::SmartMoney], 0.0);
        // 8-period EMA is available, the longer ones are not
        assert_eq!(signals[&Indicator::Trend], 0.25);
    }

    #[test]
    fn test_same_data_same_result() {
        let candles = rising(250);
        let a = RegimeDetector::default().analyze_market_regime(&candles, "BTC/USDT");
        let b = RegimeDetector::default().analyze_market_regime(&candles, "BTC/USDT");

        assert_eq!(a.regime, b.regime);
        assert_eq!(a.confidence, b.confidence);
        assert_eq!(a.strength, b.strength);
        assert_eq!(a.signals, b.signals);
    }

    #[test]
    fn test_duration_increments_and_resets() {
        let mut detector = RegimeDetector::default();
        let up = rising(250);

        assert_eq!(detector.analyze_market_regime(&up, "BTC/USDT").duration, 0);
        assert_eq!(detector.analyze_market_regime(&up, "BTC/USDT").duration, 1);
        assert_eq!(detector.analyze_market_regime(&up, "BTC/USDT").duration, 2);

        let down = detector.analyze_market_regime(&falling(250), "BTC/USDT");
        assert_eq!(down.duration, 0);
    }

    #[test]
    fn test_history_is_per_pair() {
        let mut detector = RegimeDetector::default();
        detector.analyze_market_regime(&rising(250), "BTC/USDT");
        detector.analyze_market_regime(&rising(250), "BTC/USDT");

        let eth = detector.analyze_market_regime(&falling(250), "ETH/USDT");
        assert_eq!(eth.duration, 0);
        assert_eq!(detector.history("BTC/USDT").len(), 2);
        assert_eq!(detector.history("ETH/USDT").len(), 1);
        assert!(detector.history("SOL/USDT").is_empty());
    }

    #[test]
    fn test_history_is_capped() {
        let mut detector = RegimeDetector::new(DetectorConfig {
            history_limit: 5,
            ..DetectorConfig::default()
        });
        let candles = rising(250);
        for _ in 0..8 {
            detector.analyze_market_regime(&candles, "BTC/USDT");
        }

        assert_eq!(detector.history("BTC/USDT").len(), 5);
        assert_eq!(detector.regime_summary("BTC/USDT").unwrap().duration, 7);
    }

    #[test]
    fn test_invalid_input_returns_fallback() {
        let mut detector = RegimeDetector::default();

        let signal = detector.analyze_market_regime(&[], "BTC/USDT");
        assert!(signal.is_fallback());

        let mut candles = rising(250);
        candles[100].close = f64::NAN;
        let signal = detector.analyze_market_regime(&candles, "BTC/USDT");
        assert!(signal.is_fallback());
        assert_eq!(signal.regime, DetectorRegime::Sideways);
        assert_eq!(signal.confidence, 0.5);

        assert!(detector.history("BTC/USDT").is_empty());
        assert!(detector.regime_summary("BTC/USDT").is_none());
    }

    #[test]
    fn test_regime_summary_counts_changes() {
        let mut detector = RegimeDetector::default();
        let up = rising(250);
        let down = falling(250);

        detector.analyze_market_regime(&up, "BTC/USDT");
        detector.analyze_market_regime(&up, "BTC/USDT");
        detector.analyze_market_regime(&down, "BTC/USDT");

        let summary = detector.regime_summary("BTC/USDT").unwrap();
        assert_eq!(summary.current_regime, DetectorRegime::Bear);
        assert_eq!(summary.duration, 0);
        assert_eq!(summary.regime_changes, 2);
    }
}
