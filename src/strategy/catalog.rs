//! Strategy catalog
//!
//! The single table both the regime detector (bot recommendations) and the
//! portfolio allocator (base allocations) read from. Detector weights are
//! fractions of capital per `DetectorRegime`; base allocations are percentages
//! per `PortfolioRegime`. Each portfolio column sums to 100.

use super::StrategyType;
use crate::regime::{DetectorRegime, PortfolioRegime};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrategyProfile {
    pub strategy_type: StrategyType,
    /// Human readable name for reports
    pub label: &'static str,
    /// Bot family used in detector recommendations, if the detector covers this type
    pub bot_group: Option<&'static str>,
    /// Indexed by `DetectorRegime::index`
    detector_weights: [f64; 4],
    /// Indexed by `PortfolioRegime::index`
    base_allocations: [f64; 7],
}

//                                   Bull  Bear  Side  Trans
// BullStrong BullModerate Sideways BearModerate BearStrong Accumulation Distribution
const CATALOG: [StrategyProfile; 6] = [
    StrategyProfile {
        strategy_type: StrategyType::TrendFollowing,
        label: "Trend Following",
        bot_group: None,
        detector_weights: [0.0, 0.0, 0.0, 0.0],
        base_allocations: [40.0, 35.0, 15.0, 0.0, 0.0, 25.0, 10.0],
    },
    StrategyProfile {
        strategy_type: StrategyType::MeanReversion,
        label: "Mean Reversion",
        bot_group: Some("mean_reversion"),
        detector_weights: [0.1, 0.3, 0.4, 0.0],
        base_allocations: [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    },
    StrategyProfile {
        strategy_type: StrategyType::MomentumBreakout,
        label: "Momentum Breakout",
        bot_group: Some("momentum"),
        detector_weights: [0.4, 0.2, 0.1, 0.3],
        base_allocations: [30.0, 25.0, 20.0, 30.0, 20.0, 35.0, 20.0],
    },
    StrategyProfile {
        strategy_type: StrategyType::SmartMoney,
        label: "Smart Money",
        bot_group: Some("smart_money"),
        detector_weights: [0.3, 0.4, 0.2, 0.5],
        base_allocations: [20.0, 30.0, 35.0, 40.0, 30.0, 30.0, 40.0],
    },
    StrategyProfile {
        strategy_type: StrategyType::Defensive,
        label: "Defensive",
        bot_group: None,
        detector_weights: [0.0, 0.0, 0.0, 0.0],
        base_allocations: [0.0, 0.0, 0.0, 30.0, 50.0, 0.0, 30.0],
    },
    StrategyProfile {
        strategy_type: StrategyType::Scalping,
        label: "Scalping / Volatility",
        bot_group: Some("volatility"),
        detector_weights: [0.2, 0.1, 0.3, 0.2],
        base_allocations: [10.0, 10.0, 30.0, 0.0, 0.0, 10.0, 0.0],
    },
];

/// Catalog entry for a strategy type
pub fn profile(strategy_type: StrategyType) -> &'static StrategyProfile {
    CATALOG
        .iter()
        .find(|p| p.strategy_type == strategy_type)
        .unwrap_or_else(|| unreachable!("catalog covers every StrategyType"))
}

/// Fraction of capital the detector recommends for this type in a regime
pub fn detector_weight(strategy_type: StrategyType, regime: DetectorRegime) -> f64 {
    profile(strategy_type).detector_weights[regime.index()]
}

/// Base allocation percentage for this type in a portfolio regime (0 if absent)
pub fn base_allocation(strategy_type: StrategyType, regime: PortfolioRegime) -> f64 {
    profile(strategy_type).base_allocations[regime.index()]
}

/// Strategy types the detector recommends on, in catalog order
pub fn detector_types() -> impl Iterator<Item = &'static StrategyProfile> {
    CATALOG.iter().filter(|p| p.bot_group.is_some())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_covers_every_type() {
        for strategy_type in StrategyType::ALL {
            assert_eq!(profile(strategy_type).strategy_type, strategy_type);
        }
    }

    #[test]
    fn test_portfolio_tables_sum_to_100() {
        for regime in PortfolioRegime::ALL {
            let total: f64 = StrategyType::ALL
                .iter()
                .map(|t| base_allocation(*t, regime))
                .sum();
            assert!((total - 100.0).abs() < 1e-9, "{:?} sums to {}", regime, total);
        }
    }

    #[test]
    fn test_detector_weights_sum_to_one() {
        for regime in DetectorRegime::ALL {
            let total: f64 = detector_types()
                .map(|p| detector_weight(p.strategy_type, regime))
                .sum();
            assert!((total - 1.0).abs() < 1e-9, "{:?} sums to {}", regime, total);
        }
    }

    #[test]
    fn test_bull_strong_favors_trend_following() {
        assert_eq!(base_allocation(StrategyType::TrendFollowing, PortfolioRegime::BullStrong), 40.0);
        assert_eq!(base_allocation(StrategyType::MomentumBreakout, PortfolioRegime::BullStrong), 30.0);
        assert_eq!(base_allocation(StrategyType::SmartMoney, PortfolioRegime::BullStrong), 20.0);
        assert_eq!(base_allocation(StrategyType::Scalping, PortfolioRegime::BullStrong), 10.0);
        assert_eq!(base_allocation(StrategyType::Defensive, PortfolioRegime::BullStrong), 0.0);
    }

    #[test]
    fn test_detector_types_exclude_portfolio_only() {
        let types: Vec<StrategyType> = detector_types().map(|p| p.strategy_type).collect();
        assert_eq!(types.len(), 4);
        assert!(!types.contains(&StrategyType::TrendFollowing));
        assert!(!types.contains(&StrategyType::Defensive));
    }
}
