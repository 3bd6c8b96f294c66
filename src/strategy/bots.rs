//! Bot weighting for the multi-bot roster
//!
//! Every bot has a base capital weight. The detector regime scales some of
//! them and the result is renormalized to sum to 1. A bot runs while its
//! weight is above `start_threshold`; after the first launch a bot is only
//! started or stopped when its weight moves by more than `change_threshold`.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::regime::DetectorRegime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BotType {
    ElliottWave,
    OrderBookPredator,
    SupportResistance,
    SmartMoneyTracker,
    VolatilitySurfer,
    MeanReversion,
}

impl BotType {
    pub const ALL: [BotType; 6] = [
        BotType::ElliottWave,
        BotType::OrderBookPredator,
        BotType::SupportResistance,
        BotType::SmartMoneyTracker,
        BotType::VolatilitySurfer,
        BotType::MeanReversion,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BotType::ElliottWave => "elliott_wave",
            BotType::OrderBookPredator => "order_book_predator",
            BotType::SupportResistance => "support_resistance",
            BotType::SmartMoneyTracker => "smart_money_tracker",
            BotType::VolatilitySurfer => "volatility_surfer",
            BotType::MeanReversion => "mean_reversion",
        }
    }
}

impl std::fmt::Display for BotType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Base weights, per-regime multipliers and start/stop thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotPolicy {
    pub base_weights: BTreeMap<BotType, f64>,
    pub bull_multipliers: BTreeMap<BotType, f64>,
    pub bear_multipliers: BTreeMap<BotType, f64>,
    pub sideways_multipliers: BTreeMap<BotType, f64>,
    /// Weight a bot needs to run
    pub start_threshold: f64,
    /// Weight move needed before a running bot set is touched
    pub change_threshold: f64,
}

impl Default for BotPolicy {
    fn default() -> Self {
        Self {
            base_weights: BTreeMap::from([
                (BotType::ElliottWave, 0.15),
                (BotType::OrderBookPredator, 0.20),
                (BotType::SupportResistance, 0.15),
                (BotType::SmartMoneyTracker, 0.25),
                (BotType::VolatilitySurfer, 0.15),
                (BotType::MeanReversion, 0.10),
            ]),
            bull_multipliers: BTreeMap::from([
                (BotType::ElliottWave, 1.5),
                (BotType::VolatilitySurfer, 1.3),
                (BotType::MeanReversion, 0.5),
            ]),
            bear_multipliers: BTreeMap::from([
                (BotType::SmartMoneyTracker, 1.4),
                (BotType::MeanReversion, 1.5),
                (BotType::ElliottWave, 0.6),
            ]),
            sideways_multipliers: BTreeMap::from([
                (BotType::SupportResistance, 1.4),
                (BotType::MeanReversion, 1.6),
                (BotType::VolatilitySurfer, 0.7),
            ]),
            start_threshold: 0.05,
            change_threshold: 0.1,
        }
    }
}

impl BotPolicy {
    /// Multiplier table for a regime; Transition leaves the base weights alone
    pub fn multipliers(&self, regime: DetectorRegime) -> Option<&BTreeMap<BotType, f64>> {
        match regime {
            DetectorRegime::Bull => Some(&self.bull_multipliers),
            DetectorRegime::Bear => Some(&self.bear_multipliers),
            DetectorRegime::Sideways => Some(&self.sideways_multipliers),
            DetectorRegime::Transition => None,
        }
    }
}

/// Capital weight of every bot in a regime, summing to 1
///
/// Negative or non-finite products count as zero. If nothing is left the
/// weights are all zero and no bot qualifies to run.
pub fn bot_weights(regime: DetectorRegime, policy: &BotPolicy) -> BTreeMap<BotType, f64> {
    let multipliers = policy.multipliers(regime);

    let raw: BTreeMap<BotType, f64> = policy
        .base_weights
        .iter()
        .map(|(bot, base)| {
            let multiplier = multipliers.and_then(|m| m.get(bot)).copied().unwrap_or(1.0);
            let weight = base * multiplier;
            (*bot, if weight.is_finite() { weight.max(0.0) } else { 0.0 })
        })
        .collect();

    let total: f64 = raw.values().sum();
    if total <= 0.0 {
        tracing::warn!("Bot weights for {} sum to zero", regime);
        return raw.into_keys().map(|bot| (bot, 0.0)).collect();
    }

    raw.into_iter().map(|(bot, w)| (bot, w / total)).collect()
}

/// Bots that qualify to run under `weights`
pub fn bots_to_start(weights: &BTreeMap<BotType, f64>, policy: &BotPolicy) -> Vec<BotType> {
    weights
        .iter()
        .filter(|(_, w)| **w > policy.start_threshold)
        .map(|(bot, _)| *bot)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BotAction {
    Start,
    Stop,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotChange {
    pub bot: BotType,
    pub action: BotAction,
    pub old_weight: f64,
    pub new_weight: f64,
}

/// Start and stop decisions when weights move from `old` to `new`
///
/// Only bots whose weight moved by more than `change_threshold` are
/// considered. Those above `start_threshold` start if idle; the rest stop
/// if running. A bot absent from `old` had weight zero.
pub fn plan_bot_changes(
    old: &BTreeMap<BotType, f64>,
    new: &BTreeMap<BotType, f64>,
    running: &BTreeSet<BotType>,
    policy: &BotPolicy,
) -> Vec<BotChange> {
    let mut changes = Vec::new();
    for (bot, &new_weight) in new {
        let old_weight = old.get(bot).copied().unwrap_or(0.0);
        if (new_weight - old_weight).abs() <= policy.change_threshold {
            continue;
        }

        let is_running = running.contains(bot);
        let action = if new_weight > policy.start_threshold && !is_running {
            BotAction::Start
        } else if new_weight <= policy.start_threshold && is_running {
            BotAction::Stop
        } else {
            continue;
        };

        changes.push(BotChange {
            bot: *bot,
            action,
            old_weight,
            new_weight,
        });
    }
    changes
}

/// Running bots and the weights they were last sized with
#[derive(Debug, Clone)]
pub struct BotRoster {
    policy: BotPolicy,
    weights: BTreeMap<BotType, f64>,
    running: BTreeSet<BotType>,
}

impl Default for BotRoster {
    fn default() -> Self {
        Self::new(BotPolicy::default())
    }
}

impl BotRoster {
    pub fn new(policy: BotPolicy) -> Self {
        Self {
            policy,
            weights: BTreeMap::new(),
            running: BTreeSet::new(),
        }
    }

    pub fn policy(&self) -> &BotPolicy {
        &self.policy
    }

    pub fn weights(&self) -> &BTreeMap<BotType, f64> {
        &self.weights
    }

    pub fn running(&self) -> &BTreeSet<BotType> {
        &self.running
    }

    /// Re-weight the roster for `regime` and apply the start/stop plan
    ///
    /// The first call launches every bot above the start threshold.
    pub fn update(&mut self, regime: DetectorRegime) -> Vec<BotChange> {
        let new_weights = bot_weights(regime, &self.policy);

        let changes = if self.weights.is_empty() {
            bots_to_start(&new_weights, &self.policy)
                .into_iter()
                .map(|bot| BotChange {
                    bot,
                    action: BotAction::Start,
                    old_weight: 0.0,
                    new_weight: new_weights[&bot],
                })
                .collect()
        } else {
            plan_bot_changes(&self.weights, &new_weights, &self.running, &self.policy)
        };

        for change in &changes {
            match change.action {
                BotAction::Start => {
                    tracing::info!("Starting {} at {:.1}% weight", change.bot, change.new_weight * 100.0);
                    self.running.insert(change.bot);
                }
                BotAction::Stop => {
                    tracing::info!("Stopping {} at {:.1}% weight", change.bot, change.new_weight * 100.0);
                    self.running.remove(&change.bot);
                }
            }
        }

        self.weights = new_weights;
        changes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64) {
        assert!((actual - expected).abs() < 1e-9, "{} != {}", actual, expected);
    }

    #[test]
    fn test_weights_sum_to_one_in_every_regime() {
        let policy = BotPolicy::default();
        for regime in DetectorRegime::ALL {
            let weights = bot_weights(regime, &policy);
            assert_eq!(weights.len(), 6);
            assert_close(weights.values().sum::<f64>(), 1.0);
        }
    }

    #[test]
    fn test_bull_weights() {
        let weights = bot_weights(DetectorRegime::Bull, &BotPolicy::default());

        // 0.225 + 0.20 + 0.15 + 0.25 + 0.195 + 0.05 = 1.07
        assert_close(weights[&BotType::ElliottWave], 0.225 / 1.07);
        assert_close(weights[&BotType::VolatilitySurfer], 0.195 / 1.07);
        assert_close(weights[&BotType::MeanReversion], 0.05 / 1.07);
        assert_close(weights[&BotType::OrderBookPredator], 0.20 / 1.07);
    }

    #[test]
    fn test_transition_keeps_base_weights() {
        let policy = BotPolicy::default();
        let weights = bot_weights(DetectorRegime::Transition, &policy);
        for (bot, base) in &policy.base_weights {
            assert_close(weights[bot], *base);
        }
    }

    #[test]
    fn test_bots_to_start_skips_small_weights() {
        let policy = BotPolicy::default();

        let bull = bots_to_start(&bot_weights(DetectorRegime::Bull, &policy), &policy);
        assert_eq!(bull.len(), 5);
        assert!(!bull.contains(&BotType::MeanReversion));

        let sideways = bots_to_start(&bot_weights(DetectorRegime::Sideways, &policy), &policy);
        assert_eq!(sideways.len(), 6);
    }

    #[test]
    fn test_sideways_to_bull_stops_mean_reversion() {
        let policy = BotPolicy::default();
        let sideways = bot_weights(DetectorRegime::Sideways, &policy);
        let bull = bot_weights(DetectorRegime::Bull, &policy);
        let running: BTreeSet<BotType> = BotType::ALL.into_iter().collect();

        // 0.16 / 1.075 -> 0.05 / 1.07 moves by just over 0.1
        let changes = plan_bot_changes(&sideways, &bull, &running, &policy);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].bot, BotType::MeanReversion);
        assert_eq!(changes[0].action, BotAction::Stop);
        assert_close(changes[0].old_weight, 0.16 / 1.075);

        // And back again
        let running: BTreeSet<BotType> = bots_to_start(&bull, &policy).into_iter().collect();
        let changes = plan_bot_changes(&bull, &sideways, &running, &policy);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].action, BotAction::Start);
    }

    #[test]
    fn test_small_moves_leave_bots_alone() {
        let policy = BotPolicy::default();
        let transition = bot_weights(DetectorRegime::Transition, &policy);
        let bull = bot_weights(DetectorRegime::Bull, &policy);
        let running: BTreeSet<BotType> = BotType::ALL.into_iter().collect();

        // Mean reversion drops under the start threshold but only by ~0.053
        assert!(bull[&BotType::MeanReversion] <= policy.start_threshold);
        assert!(plan_bot_changes(&transition, &bull, &running, &policy).is_empty());
    }

    #[test]
    fn test_zero_weights_start_nothing() {
        let policy = BotPolicy {
            base_weights: BTreeMap::from([(BotType::ElliottWave, 0.0), (BotType::MeanReversion, -1.0)]),
            ..BotPolicy::default()
        };
        let weights = bot_weights(DetectorRegime::Bull, &policy);

        assert!(weights.values().all(|w| *w == 0.0));
        assert!(bots_to_start(&weights, &policy).is_empty());
    }

    #[test]
    fn test_roster_update() {
        let mut roster = BotRoster::default();

        let launched = roster.update(DetectorRegime::Sideways);
        assert_eq!(launched.len(), 6);
        assert!(launched.iter().all(|c| c.action == BotAction::Start));
        assert_eq!(roster.running().len(), 6);

        // Same regime again: nothing to do
        assert!(roster.update(DetectorRegime::Sideways).is_empty());

        let changes = roster.update(DetectorRegime::Bull);
        assert_eq!(changes.len(), 1);
        assert!(!roster.running().contains(&BotType::MeanReversion));
        assert_close(roster.weights().values().sum::<f64>(), 1.0);
    }
}
