//! Portfolio manager: regime-driven allocation and rebalancing
//!
//! Allocation pipeline for every active strategy:
//! 1. base % for its type in the current regime (strategy catalog)
//! 2. x performance multiplier (0.5-2.0) x regime confidence
//! 3. clamp to the strategy's [min, max] bounds
//! 4. renormalize to 100% without leaving the bounds
//!
//! A rebalance is due when none has happened yet, when the interval has
//! elapsed, or when the two most recent observed regimes differ.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};
use uuid::Uuid;

use super::performance::{performance_multiplier, StrategyPerformance};
use super::registry::{RegistryError, StrategyAllocation, StrategyRegistry};
use crate::models::Candle;
use crate::regime::{MarketCondition, MarketConditionAnalyzer, PortfolioRegime, RegimeError, RegimeSignal};
use crate::strategy::{base_allocation, profile};

/// Tolerance on the 100% total after normalization
const TOTAL_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocationPolicy {
    pub total_capital: f64,
    pub rebalance_interval_hours: i64,
    /// Changes larger than this (percentage points) are reported
    pub significant_change_pct: f64,
    pub market_history_limit: usize,
    /// Confidence of the neutral condition used when analysis fails
    pub failure_confidence: f64,
    pub activation_floor_pct: f64,
    /// Strategies below this allocation get no trading config
    pub min_config_allocation_pct: f64,
    pub max_open_trades: u32,
    /// Capital share is split across this many trade slots
    pub stake_divisor: f64,
    pub min_stake: f64,
}

impl Default for AllocationPolicy {
    fn default() -> Self {
        Self {
            total_capital: 10_000.0,
            rebalance_interval_hours: 24,
            significant_change_pct: 2.0,
            market_history_limit: 100,
            failure_confidence: 0.1,
            activation_floor_pct: 5.0,
            min_config_allocation_pct: 1.0,
            max_open_trades: 5,
            stake_divisor: 5.0,
            min_stake: 10.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationChange {
    pub old_pct: f64,
    pub new_pct: f64,
    pub change: f64,
}

/// Outcome of one rebalance, ready for downstream persistence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RebalanceReport {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub regime: PortfolioRegime,
    pub confidence: f64,
    pub allocations: BTreeMap<String, f64>,
    /// Only changes above the significance threshold, rounded to 0.1
    pub changes: BTreeMap<String, AllocationChange>,
}

/// Trading parameters derived from a strategy's allocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub strategy: String,
    pub stake_amount: f64,
    pub max_open_trades: u32,
    pub allocation_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategySummary {
    /// Catalog label of the strategy's type
    pub label: String,
    pub allocation_pct: f64,
    pub capital_allocated: f64,
    pub active: bool,
    pub performance: Option<StrategyPerformance>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSummary {
    pub timestamp: DateTime<Utc>,
    pub total_capital: f64,
    pub allocated_capital: f64,
    pub current_regime: Option<PortfolioRegime>,
    pub market_confidence: f64,
    pub active_strategies: usize,
    pub strategies: BTreeMap<String, StrategySummary>,
    pub last_rebalance: Option<DateTime<Utc>>,
}

pub struct PortfolioManager {
    registry: StrategyRegistry,
    policy: AllocationPolicy,
    analyzer: MarketConditionAnalyzer,
    performance: HashMap<String, StrategyPerformance>,
    current_condition: Option<MarketCondition>,
    market_history: VecDeque<MarketCondition>,
    last_rebalance: Option<DateTime<Utc>>,
}

impl Default for PortfolioManager {
    fn default() -> Self {
        Self::new(
            StrategyRegistry::default_roster(),
            AllocationPolicy::default(),
            MarketConditionAnalyzer::default(),
        )
    }
}

impl PortfolioManager {
    pub fn new(registry: StrategyRegistry, policy: AllocationPolicy, analyzer: MarketConditionAnalyzer) -> Self {
        Self {
            registry,
            policy,
            analyzer,
            performance: HashMap::new(),
            current_condition: None,
            market_history: VecDeque::new(),
            last_rebalance: None,
        }
    }

    pub fn registry(&self) -> &StrategyRegistry {
        &self.registry
    }

    pub fn policy(&self) -> &AllocationPolicy {
        &self.policy
    }

    pub fn current_condition(&self) -> Option<&MarketCondition> {
        self.current_condition.as_ref()
    }

    pub fn market_history(&self) -> impl Iterator<Item = &MarketCondition> {
        self.market_history.iter()
    }

    pub fn last_rebalance(&self) -> Option<DateTime<Utc>> {
        self.last_rebalance
    }

    /// Classify the reference symbols, falling back to a neutral condition
    pub fn analyze_market(&self, market_data: &HashMap<String, Vec<Candle>>, now: DateTime<Utc>) -> MarketCondition {
        self.analyzer
            .analyze(market_data, now)
            .unwrap_or_else(|e| self.fallback_condition(&e, now))
    }

    fn fallback_condition(&self, error: &RegimeError, now: DateTime<Utc>) -> MarketCondition {
        match error {
            RegimeError::MissingReferenceData(symbol) => {
                tracing::warn!("Insufficient market data for regime analysis: {} missing", symbol);
                MarketCondition::neutral(self.analyzer.config().missing_data_confidence, now)
            }
            e => {
                tracing::error!("Error analyzing market regime: {}", e);
                MarketCondition::neutral(self.policy.failure_confidence, now)
            }
        }
    }

    /// Record a condition as the latest market state
    pub fn observe_condition(&mut self, condition: MarketCondition) {
        let limit = self.policy.market_history_limit.max(1);
        self.market_history.push_back(condition.clone());
        while self.market_history.len() > limit {
            self.market_history.pop_front();
        }
        self.current_condition = Some(condition);
    }

    /// Allocation for every active strategy, summing to 100
    ///
    /// Performance comes from `performance_data` first and the stored
    /// statistics second; a strategy with neither is neutral.
    pub fn calculate_optimal_allocation(
        &self,
        condition: &MarketCondition,
        performance_data: &HashMap<String, StrategyPerformance>,
    ) -> BTreeMap<String, f64> {
        let confidence = if condition.confidence.is_finite() {
            condition.confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };

        let active: Vec<&StrategyAllocation> = self.registry.active().collect();
        if active.is_empty() {
            tracing::warn!("No active strategies to allocate");
            return BTreeMap::new();
        }

        let adjusted: Vec<f64> = active
            .iter()
            .map(|strategy| {
                let base = base_allocation(strategy.strategy_type, condition.regime);
                let multiplier = performance_data
                    .get(&strategy.name)
                    .or_else(|| self.performance.get(&strategy.name))
                    .map(|p| performance_multiplier(p.sharpe_ratio, p.win_rate))
                    .unwrap_or(1.0);

                (base * multiplier * confidence).clamp(strategy.min_allocation, strategy.max_allocation)
            })
            .collect();

        let bounds: Vec<(f64, f64)> = active.iter().map(|s| (s.min_allocation, s.max_allocation)).collect();
        let normalized = normalize_within_bounds(&adjusted, &bounds);

        active
            .iter()
            .zip(normalized)
            .map(|(strategy, pct)| (strategy.name.clone(), pct))
            .collect()
    }

    pub fn should_rebalance(&self) -> bool {
        self.should_rebalance_at(Utc::now())
    }

    pub fn should_rebalance_at(&self, now: DateTime<Utc>) -> bool {
        let Some(last) = self.last_rebalance else {
            return true;
        };

        if now - last >= Duration::hours(self.policy.rebalance_interval_hours) {
            return true;
        }

        let mut recent = self.market_history.iter().rev();
        if let (Some(latest), Some(previous)) = (recent.next(), recent.next()) {
            if latest.regime != previous.regime {
                tracing::info!("Regime change detected: {} -> {}", previous.regime, latest.regime);
                return true;
            }
        }

        false
    }

    /// Analyze the reference symbols and rebalance on the result
    ///
    /// A fallback condition is allocated on but never enters the market
    /// history, so it cannot fake a regime change.
    pub fn rebalance(
        &mut self,
        market_data: &HashMap<String, Vec<Candle>>,
        performance_data: &HashMap<String, StrategyPerformance>,
        now: DateTime<Utc>,
    ) -> RebalanceReport {
        tracing::info!("Starting portfolio rebalance...");
        match self.analyzer.analyze(market_data, now) {
            Ok(condition) => self.rebalance_with_condition(condition, performance_data, now),
            Err(e) => {
                let neutral = self.fallback_condition(&e, now);
                self.commit_allocation(&neutral, performance_data, now)
            }
        }
    }

    /// Record an externally computed condition and rebalance on it
    pub fn rebalance_with_condition(
        &mut self,
        condition: MarketCondition,
        performance_data: &HashMap<String, StrategyPerformance>,
        now: DateTime<Utc>,
    ) -> RebalanceReport {
        self.observe_condition(condition.clone());
        self.commit_allocation(&condition, performance_data, now)
    }

    /// Rebalance on a detector signal mapped to a portfolio regime
    pub fn rebalance_from_signal(
        &mut self,
        signal: &RegimeSignal,
        performance_data: &HashMap<String, StrategyPerformance>,
    ) -> RebalanceReport {
        self.rebalance_with_condition(MarketCondition::from_signal(signal), performance_data, signal.timestamp)
    }

    /// Compute and write back allocations for an already observed condition
    pub fn commit_allocation(
        &mut self,
        condition: &MarketCondition,
        performance_data: &HashMap<String, StrategyPerformance>,
        now: DateTime<Utc>,
    ) -> RebalanceReport {
        let allocations = self.calculate_optimal_allocation(condition, performance_data);

        let mut changes = BTreeMap::new();
        for (name, &new_pct) in &allocations {
            let Some(strategy) = self.registry.get_mut(name) else {
                continue;
            };

            let old_pct = strategy.allocation_pct;
            let change = new_pct - old_pct;
            if change.abs() > self.policy.significant_change_pct {
                changes.insert(
                    name.clone(),
                    AllocationChange {
                        old_pct: round_to_tenth(old_pct),
                        new_pct: round_to_tenth(new_pct),
                        change: round_to_tenth(change),
                    },
                );
            }
            strategy.allocation_pct = new_pct;
        }

        self.last_rebalance = Some(now);

        tracing::info!("Portfolio rebalanced for {} market", condition.regime);
        tracing::info!("Significant changes: {}", changes.len());
        for (name, c) in &changes {
            tracing::debug!("  {}: {:.1}% -> {:.1}% ({:+.1})", name, c.old_pct, c.new_pct, c.change);
        }

        RebalanceReport {
            id: Uuid::new_v4(),
            timestamp: now,
            regime: condition.regime,
            confidence: condition.confidence,
            allocations,
            changes,
        }
    }

    /// Replace the stored performance of a registered strategy
    pub fn update_strategy_performance(
        &mut self,
        name: &str,
        performance: StrategyPerformance,
    ) -> Result<(), RegistryError> {
        if !self.registry.contains(name) {
            return Err(RegistryError::UnknownStrategy(name.to_string()));
        }
        self.performance.insert(name.to_string(), performance);
        Ok(())
    }

    pub fn strategy_performance(&self, name: &str) -> Option<&StrategyPerformance> {
        self.performance.get(name)
    }

    /// Deactivate strategies below `floor_pct`, reactivate those at or above it
    ///
    /// When any flag changes, the stored allocations of the new active set
    /// are rescaled within their bounds so they again sum to 100. Returns the
    /// names whose active flag changed.
    pub fn apply_activation_floor(&mut self, floor_pct: f64) -> Vec<String> {
        let mut toggled = Vec::new();
        for strategy in self.registry.iter_mut() {
            let should_be_active = strategy.allocation_pct >= floor_pct;
            if strategy.active != should_be_active {
                strategy.active = should_be_active;
                tracing::info!(
                    "{} {} at {:.1}% allocation",
                    if should_be_active { "Activated" } else { "Deactivated" },
                    strategy.name,
                    strategy.allocation_pct
                );
                toggled.push(strategy.name.clone());
            }
        }

        if !toggled.is_empty() {
            let (weights, bounds): (Vec<f64>, Vec<(f64, f64)>) = self
                .registry
                .active()
                .map(|s| (s.allocation_pct, (s.min_allocation, s.max_allocation)))
                .unzip();
            let rescaled = normalize_within_bounds(&weights, &bounds);
            for (strategy, pct) in self.registry.iter_mut().filter(|s| s.active).zip(rescaled) {
                strategy.allocation_pct = pct;
            }
        }
        toggled
    }

    /// Per-strategy trading parameters for active strategies
    pub fn strategy_configs(&self) -> BTreeMap<String, StrategyConfig> {
        let policy = &self.policy;
        self.registry
            .active()
            .filter(|s| s.allocation_pct >= policy.min_config_allocation_pct)
            .map(|s| {
                let stake = policy.total_capital * s.allocation_pct / 100.0 / policy.stake_divisor;
                let stake_amount = ((stake * 100.0).round() / 100.0).max(policy.min_stake);
                let max_open_trades = ((s.allocation_pct / 10.0) as u32).min(policy.max_open_trades);

                (
                    s.name.clone(),
                    StrategyConfig {
                        strategy: s.name.clone(),
                        stake_amount,
                        max_open_trades,
                        allocation_pct: s.allocation_pct,
                    },
                )
            })
            .collect()
    }

    pub fn portfolio_summary(&self, now: DateTime<Utc>) -> PortfolioSummary {
        let capital = self.policy.total_capital;

        let strategies = self
            .registry
            .iter()
            .map(|s| {
                (
                    s.name.clone(),
                    StrategySummary {
                        label: profile(s.strategy_type).label.to_string(),
                        allocation_pct: s.allocation_pct,
                        capital_allocated: capital * s.allocation_pct / 100.0,
                        active: s.active,
                        performance: self.performance.get(&s.name).cloned(),
                    },
                )
            })
            .collect();

        PortfolioSummary {
            timestamp: now,
            total_capital: capital,
            allocated_capital: capital * self.registry.active_total() / 100.0,
            current_regime: self.current_condition.as_ref().map(|c| c.regime),
            market_confidence: self.current_condition.as_ref().map(|c| c.confidence).unwrap_or(0.0),
            active_strategies: self.registry.active().count(),
            strategies,
            last_rebalance: self.last_rebalance,
        }
    }
}

fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Scale `weights` to sum to 100 while keeping each value inside its bounds
///
/// Every value is `clamp(scale * weight, min, max)` for one common scale,
/// found by bisection: strategies that would cross a bound sit on it and the
/// rest share the remainder in proportion to their weights. If the weighted
/// strategies all reach their maximum short of 100, the zero-weight ones
/// share what is left equally, each up to its own maximum. Infeasible bounds
/// (sum of minimums above 100 or sum of maximums below 100) fall back to
/// plain proportional scaling.
pub fn normalize_within_bounds(weights: &[f64], bounds: &[(f64, f64)]) -> Vec<f64> {
    if weights.is_empty() {
        return Vec::new();
    }

    let weights: Vec<f64> = weights
        .iter()
        .map(|w| if w.is_finite() { w.max(0.0) } else { 0.0 })
        .collect();

    let min_total: f64 = bounds.iter().map(|b| b.0).sum();
    let max_total: f64 = bounds.iter().map(|b| b.1).sum();
    if min_total > 100.0 + TOTAL_TOLERANCE || max_total < 100.0 - TOTAL_TOLERANCE {
        tracing::warn!(
            "Allocation bounds are infeasible (min total {:.1}, max total {:.1}), normalizing proportionally",
            min_total,
            max_total
        );
        return proportional(&weights);
    }

    // Highest total the weighted strategies can reach on their own
    let saturated: f64 = weights
        .iter()
        .zip(bounds)
        .map(|(w, (min, max))| if *w > 0.0 { *max } else { *min })
        .sum();
    if saturated >= 100.0 - TOTAL_TOLERANCE {
        return fill_to_target(&weights, bounds, 100.0);
    }

    let weighted_max: f64 = weights
        .iter()
        .zip(bounds)
        .filter(|(w, _)| **w > 0.0)
        .map(|(_, (_, max))| *max)
        .sum();
    let idle_bounds: Vec<(f64, f64)> = weights
        .iter()
        .zip(bounds)
        .filter(|(w, _)| **w <= 0.0)
        .map(|(_, b)| *b)
        .collect();
    let mut idle_fill = fill_to_target(&vec![1.0; idle_bounds.len()], &idle_bounds, 100.0 - weighted_max).into_iter();

    weights
        .iter()
        .zip(bounds)
        .map(|(w, (_, max))| {
            if *w > 0.0 {
                *max
            } else {
                idle_fill.next().unwrap_or(0.0)
            }
        })
        .collect()
}

/// Bisect the common scale at which the clamped weights reach `target`
///
/// Callers guarantee the target is reachable within the bounds.
fn fill_to_target(weights: &[f64], bounds: &[(f64, f64)], target: f64) -> Vec<f64> {
    let scaled = |scale: f64| -> Vec<f64> {
        weights
            .iter()
            .zip(bounds)
            .map(|(w, (min, max))| (w * scale).clamp(*min, *max))
            .collect()
    };
    let scaled_total = |scale: f64| -> f64 { scaled(scale).iter().sum() };

    let mut low = 0.0;
    let mut high = 1.0;
    while scaled_total(high) < target && high < 1e15 {
        high *= 2.0;
    }

    for _ in 0..200 {
        let mid = (low + high) / 2.0;
        if scaled_total(mid) < target {
            low = mid;
        } else {
            high = mid;
        }
    }

    scaled(high)
}

fn proportional(weights: &[f64]) -> Vec<f64> {
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return vec![100.0 / weights.len() as f64; weights.len()];
    }
    weights.iter().map(|w| w / total * 100.0).collect()
}
