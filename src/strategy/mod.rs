// Strategy archetypes, their allocation catalog and bot weighting
pub mod bots;
pub mod catalog;

use serde::{Deserialize, Serialize};

pub use bots::{bot_weights, bots_to_start, plan_bot_changes, BotAction, BotChange, BotPolicy, BotRoster, BotType};
pub use catalog::{base_allocation, detector_weight, profile, StrategyProfile};

/// Strategy archetype a registered strategy belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyType {
    TrendFollowing,
    MeanReversion,
    MomentumBreakout,
    SmartMoney,
    Defensive,
    Scalping,
}

impl StrategyType {
    pub const ALL: [StrategyType; 6] = [
        StrategyType::TrendFollowing,
        StrategyType::MeanReversion,
        StrategyType::MomentumBreakout,
        StrategyType::SmartMoney,
        StrategyType::Defensive,
        StrategyType::Scalping,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyType::TrendFollowing => "trend_following",
            StrategyType::MeanReversion => "mean_reversion",
            StrategyType::MomentumBreakout => "momentum_breakout",
            StrategyType::SmartMoney => "smart_money",
            StrategyType::Defensive => "defensive",
            StrategyType::Scalping => "scalping",
        }
    }
}

impl std::fmt::Display for StrategyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
