//! Regime signal types and the composite classification rules
//!
//! Sub-scores are combined with `SignalWeights` into a composite score and
//! classified against `RegimeThresholds`:
//! - composite > bull threshold → Bull
//! - composite < bear threshold → Bear
//! - |composite| < sideways band → Sideways
//! - anything else → Transition

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::strategy::{catalog, StrategyType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorRegime {
    Bull,
    Bear,
    Sideways,
    Transition,
}

impl DetectorRegime {
    pub const ALL: [DetectorRegime; 4] = [
        DetectorRegime::Bull,
        DetectorRegime::Bear,
        DetectorRegime::Sideways,
        DetectorRegime::Transition,
    ];

    /// Column of this regime in the strategy catalog
    pub fn index(&self) -> usize {
        match self {
            DetectorRegime::Bull => 0,
            DetectorRegime::Bear => 1,
            DetectorRegime::Sideways => 2,
            DetectorRegime::Transition => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DetectorRegime::Bull => "bull",
            DetectorRegime::Bear => "bear",
            DetectorRegime::Sideways => "sideways",
            DetectorRegime::Transition => "transition",
        }
    }
}

impl std::fmt::Display for DetectorRegime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Indicator family producing one sub-score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Indicator {
    Trend,
    Volatility,
    Structure,
    Volume,
    SmartMoney,
    Momentum,
}

impl Indicator {
    pub const ALL: [Indicator; 6] = [
        Indicator::Trend,
        Indicator::Volatility,
        Indicator::Structure,
        Indicator::Volume,
        Indicator::SmartMoney,
        Indicator::Momentum,
    ];
}

/// Weight of each sub-score in the composite
///
/// The defaults sum to 1.1; they are not renormalised.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalWeights {
    pub trend: f64,
    pub volatility: f64,
    pub structure: f64,
    pub volume: f64,
    pub smart_money: f64,
    pub momentum: f64,
}

impl Default for SignalWeights {
    fn default() -> Self {
        Self {
            trend: 0.30,
            volatility: 0.10,
            structure: 0.25,
            volume: 0.10,
            smart_money: 0.20,
            momentum: 0.15,
        }
    }
}

impl SignalWeights {
    pub fn weight(&self, indicator: Indicator) -> f64 {
        match indicator {
            Indicator::Trend => self.trend,
            Indicator::Volatility => self.volatility,
            Indicator::Structure => self.structure,
            Indicator::Volume => self.volume,
            Indicator::SmartMoney => self.smart_money,
            Indicator::Momentum => self.momentum,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegimeThresholds {
    /// Composite strictly above this is Bull
    pub bull: f64,
    /// Composite strictly below this is Bear
    pub bear: f64,
    /// |composite| strictly below this is Sideways
    pub sideways_band: f64,
    pub max_confidence: f64,
    /// Sideways confidence is `1 - slope * |composite|`
    pub sideways_confidence_slope: f64,
    pub transition_confidence: f64,
    /// Momentum sub-score above which a Bull market focuses on breakout bots
    pub momentum_focus: f64,
}

impl Default for RegimeThresholds {
    fn default() -> Self {
        Self {
            bull: 0.3,
            bear: -0.3,
            sideways_band: 0.15,
            max_confidence: 0.95,
            sideways_confidence_slope: 3.0,
            transition_confidence: 0.6,
            momentum_focus: 0.5,
        }
    }
}

/// Weighted sum over the sub-scores that are present
pub fn composite_score(signals: &BTreeMap<Indicator, f64>, weights: &SignalWeights) -> f64 {
    signals
        .iter()
        .map(|(indicator, value)| value * weights.weight(*indicator))
        .sum()
}

/// Map a composite score to a regime and its confidence (clamped to [0, 1])
pub fn classify_composite(composite: f64, thresholds: &RegimeThresholds) -> (DetectorRegime, f64) {
    let (regime, confidence) = if composite > thresholds.bull {
        (DetectorRegime::Bull, composite.min(thresholds.max_confidence))
    } else if composite < thresholds.bear {
        (DetectorRegime::Bear, composite.abs().min(thresholds.max_confidence))
    } else if composite.abs() < thresholds.sideways_band {
        (
            DetectorRegime::Sideways,
            1.0 - composite.abs() * thresholds.sideways_confidence_slope,
        )
    } else {
        (DetectorRegime::Transition, thresholds.transition_confidence)
    };

    (regime, confidence.clamp(0.0, 1.0))
}

/// Confidence scaled by how much the sub-scores agree
///
/// Agreement is `1 - population_std / 2`. No sub-scores means full agreement.
pub fn signal_strength(confidence: f64, signals: &BTreeMap<Indicator, f64>) -> f64 {
    if signals.is_empty() {
        return confidence.clamp(0.0, 1.0);
    }

    let n = signals.len() as f64;
    let mean = signals.values().sum::<f64>() / n;
    let variance = signals.values().map(|v| (v - mean).powi(2)).sum::<f64>() / n;

    let agreement = 1.0 - variance.sqrt() / 2.0;
    (confidence * agreement).clamp(0.0, 1.0)
}

/// Bot allocation advice attached to a signal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendations {
    pub primary_strategy: String,
    /// Fraction of capital per archetype, empty on the fallback signal
    pub weights: BTreeMap<StrategyType, f64>,
    pub focus_bots: Option<String>,
}

impl Recommendations {
    pub fn for_regime(
        regime: DetectorRegime,
        signals: &BTreeMap<Indicator, f64>,
        thresholds: &RegimeThresholds,
    ) -> Self {
        let weights = catalog::detector_types()
            .map(|p| (p.strategy_type, catalog::detector_weight(p.strategy_type, regime)))
            .collect();

        Self {
            primary_strategy: regime.as_str().to_string(),
            weights,
            focus_bots: Some(focus_bots(regime, signals, thresholds).to_string()),
        }
    }

    fn conservative() -> Self {
        Self {
            primary_strategy: "conservative".to_string(),
            weights: BTreeMap::new(),
            focus_bots: None,
        }
    }

    /// Flat text view, e.g. `momentum_allocation -> "40.0%"`
    pub fn as_text(&self) -> BTreeMap<String, String> {
        let mut text = BTreeMap::new();
        text.insert("primary_strategy".to_string(), self.primary_strategy.clone());

        for (strategy_type, weight) in &self.weights {
            if let Some(group) = catalog::profile(*strategy_type).bot_group {
                text.insert(format!("{}_allocation", group), format!("{:.1}%", weight * 100.0));
            }
        }

        if let Some(focus) = &self.focus_bots {
            text.insert("focus_bots".to_string(), focus.clone());
        }
        text
    }
}

fn focus_bots(
    regime: DetectorRegime,
    signals: &BTreeMap<Indicator, f64>,
    thresholds: &RegimeThresholds,
) -> &'static str {
    match regime {
        DetectorRegime::Bull => {
            let momentum = signals.get(&Indicator::Momentum).copied().unwrap_or(0.0);
            if momentum > thresholds.momentum_focus {
                "Elliott Wave Bot, Breakout Bot"
            } else {
                "Smart Money Tracker, Volatility Surfer"
            }
        }
        DetectorRegime::Bear => "Smart Money Tracker, Mean Reversion Bot",
        DetectorRegime::Sideways => "Support/Resistance Bot, Mean Reversion Bot",
        DetectorRegime::Transition => "Smart Money Tracker, Order Book Predator",
    }
}

/// Result of one regime analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeSignal {
    pub pair: String,
    pub timestamp: DateTime<Utc>,
    pub regime: DetectorRegime,
    pub confidence: f64,
    pub strength: f64,
    /// Consecutive earlier analyses of this pair with the same regime
    pub duration: u32,
    pub composite: f64,
    pub signals: BTreeMap<Indicator, f64>,
    pub recommendations: Recommendations,
}

impl RegimeSignal {
    /// Neutral signal returned when analysis fails
    pub fn fallback(pair: &str, timestamp: DateTime<Utc>) -> Self {
        Self {
            pair: pair.to_string(),
            timestamp,
            regime: DetectorRegime::Sideways,
            confidence: 0.5,
            strength: 0.5,
            duration: 0,
            composite: 0.0,
            signals: BTreeMap::new(),
            recommendations: Recommendations::conservative(),
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.signals.is_empty() && self.recommendations.primary_strategy == "conservative"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signals(values: &[(Indicator, f64)]) -> BTreeMap<Indicator, f64> {
        values.iter().copied().collect()
    }

    #[test]
    fn test_classification_boundaries() {
        let thresholds = RegimeThresholds::default();

        let (regime, confidence) = classify_composite(0.31, &thresholds);
        assert_eq!(regime, DetectorRegime::Bull);
        assert!((confidence - 0.31).abs() < 1e-12);

        assert_eq!(classify_composite(0.29, &thresholds).0, DetectorRegime::Transition);
        assert_eq!(classify_composite(0.3, &thresholds).0, DetectorRegime::Transition);
        assert_eq!(classify_composite(-0.3, &thresholds).0, DetectorRegime::Transition);
        assert_eq!(classify_composite(-0.31, &thresholds).0, DetectorRegime::Bear);
        assert_eq!(classify_composite(0.15, &thresholds).0, DetectorRegime::Transition);
        assert_eq!(classify_composite(0.1499, &thresholds).0, DetectorRegime::Sideways);
    }

    #[test]
    fn test_classification_confidence() {
        let thresholds = RegimeThresholds::default();

        assert_eq!(classify_composite(1.05, &thresholds).1, 0.95);
        assert_eq!(classify_composite(-0.8, &thresholds).1, 0.8);
        assert_eq!(classify_composite(0.0, &thresholds).1, 1.0);
        assert!((classify_composite(-0.1, &thresholds).1 - 0.7).abs() < 1e-12);
        assert_eq!(classify_composite(0.2, &thresholds).1, 0.6);
    }

    #[test]
    fn test_composite_uses_present_scores_only() {
        let weights = SignalWeights::default();
        let only_trend = signals(&[(Indicator::Trend, 1.0)]);
        assert!((composite_score(&only_trend, &weights) - 0.3).abs() < 1e-12);

        let all_max: BTreeMap<_, _> = Indicator::ALL.iter().map(|i| (*i, 1.0)).collect();
        assert!((composite_score(&all_max, &weights) - 1.1).abs() < 1e-12);
    }

    #[test]
    fn test_strength_penalises_disagreement() {
        let agree: BTreeMap<_, _> = Indicator::ALL.iter().map(|i| (*i, 0.5)).collect();
        assert!((signal_strength(0.8, &agree) - 0.8).abs() < 1e-12);

        let split = signals(&[(Indicator::Trend, 1.0), (Indicator::Momentum, -1.0)]);
        // population std of {1, -1} is 1, agreement 0.5
        assert!((signal_strength(0.8, &split) - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_recommendations_text() {
        let thresholds = RegimeThresholds::default();
        let strong_momentum = signals(&[(Indicator::Momentum, 0.7)]);

        let bull = Recommendations::for_regime(DetectorRegime::Bull, &strong_momentum, &thresholds);
        let text = bull.as_text();
        assert_eq!(text["primary_strategy"], "bull");
        assert_eq!(text["momentum_allocation"], "40.0%");
        assert_eq!(text["smart_money_allocation"], "30.0%");
        assert_eq!(text["volatility_allocation"], "20.0%");
        assert_eq!(text["mean_reversion_allocation"], "10.0%");
        assert_eq!(text["focus_bots"], "Elliott Wave Bot, Breakout Bot");

        let weak = Recommendations::for_regime(DetectorRegime::Bull, &BTreeMap::new(), &thresholds);
        assert_eq!(
            weak.focus_bots.as_deref(),
            Some("Smart Money Tracker, Volatility Surfer")
        );

        let transition =
            Recommendations::for_regime(DetectorRegime::Transition, &BTreeMap::new(), &thresholds);
        assert_eq!(transition.weights[&StrategyType::MeanReversion], 0.0);
        assert_eq!(transition.weights[&StrategyType::SmartMoney], 0.5);
    }

    #[test]
    fn test_fallback_signal() {
        let signal = RegimeSignal::fallback("BTC/USDT", Utc::now());
        assert_eq!(signal.regime, DetectorRegime::Sideways);
        assert_eq!(signal.confidence, 0.5);
        assert_eq!(signal.strength, 0.5);
        assert_eq!(signal.duration, 0);
        assert!(signal.is_fallback());
        assert_eq!(signal.recommendations.as_text().len(), 1);
    }
}
