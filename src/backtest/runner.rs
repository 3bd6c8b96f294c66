use crate::models::Candle;
use crate::portfolio::{PortfolioManager, RebalanceReport, StrategyPerformance};
use crate::regime::{DetectorRegime, MarketCondition, RegimeDetector, RegimeSignal};
use crate::strategy::{BotPolicy, BotRoster, BotType};
use crate::Result;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Minimum history before the first detection (EMA200 needs 200 bars)
pub const DEFAULT_WARMUP: usize = 200;
/// Trailing window handed to the detector at each step
pub const DEFAULT_LOOKBACK: usize = 300;

/// Outcome of a walk-forward replay
#[derive(Debug, Clone, Serialize)]
pub struct ReplayReport {
    pub pair: String,
    pub steps: usize,
    pub regime_counts: BTreeMap<DetectorRegime, usize>,
    pub regime_changes: usize,
    /// Steps where detection failed and the neutral signal was used
    pub fallbacks: usize,
    pub final_signal: Option<RegimeSignal>,
    pub rebalances: Vec<RebalanceReport>,
    /// Bot starts and stops after the initial launch
    pub bot_changes: usize,
    pub running_bots: Vec<BotType>,
}

impl ReplayReport {
    pub fn last_rebalance(&self) -> Option<&RebalanceReport> {
        self.rebalances.last()
    }

    /// Most frequent regime over the replay
    pub fn dominant_regime(&self) -> Option<DetectorRegime> {
        self.regime_counts
            .iter()
            .max_by_key(|(_, count)| **count)
            .map(|(regime, _)| *regime)
    }
}

/// Walks a candle series forward, detecting the regime at each bar and
/// rebalancing the portfolio whenever the manager's trigger fires
pub struct RegimeReplay {
    detector: RegimeDetector,
    manager: PortfolioManager,
    bots: BotRoster,
    performance: HashMap<String, StrategyPerformance>,
    warmup: usize,
    lookback: usize,
}

impl RegimeReplay {
    pub fn new(detector: RegimeDetector, manager: PortfolioManager) -> Self {
        Self {
            detector,
            manager,
            bots: BotRoster::default(),
            performance: HashMap::new(),
            warmup: DEFAULT_WARMUP,
            lookback: DEFAULT_LOOKBACK,
        }
    }

    pub fn with_warmup(mut self, warmup: usize) -> Self {
        self.warmup = warmup.max(1);
        self.lookback = self.lookback.max(self.warmup);
        self
    }

    pub fn with_lookback(mut self, lookback: usize) -> Self {
        self.lookback = lookback.max(self.warmup);
        self
    }

    /// Strategy statistics applied at every rebalance
    pub fn with_performance(mut self, performance: HashMap<String, StrategyPerformance>) -> Self {
        self.performance = performance;
        self
    }

    pub fn with_bot_policy(mut self, policy: BotPolicy) -> Self {
        self.bots = BotRoster::new(policy);
        self
    }

    pub fn detector(&self) -> &RegimeDetector {
        &self.detector
    }

    pub fn manager(&self) -> &PortfolioManager {
        &self.manager
    }

    pub fn bots(&self) -> &BotRoster {
        &self.bots
    }

    /// Replay `candles` for one pair
    ///
    /// The first detection runs once `warmup` candles are available; every
    /// later bar adds one detection on the trailing `lookback` window.
    pub fn run(&mut self, candles: &[Candle], pair: &str) -> Result<ReplayReport> {
        if candles.len() < self.warmup {
            return Err(format!(
                "Not enough candles for replay. Need {}, got {}",
                self.warmup,
                candles.len()
            )
            .into());
        }

        tracing::info!(
            "Starting regime replay for {}: {} candles, warmup {}",
            pair,
            candles.len(),
            self.warmup
        );

        let mut report = ReplayReport {
            pair: pair.to_string(),
            steps: 0,
            regime_counts: BTreeMap::new(),
            regime_changes: 0,
            fallbacks: 0,
            final_signal: None,
            rebalances: Vec::new(),
            bot_changes: 0,
            running_bots: Vec::new(),
        };
        let mut previous: Option<DetectorRegime> = None;

        for end in self.warmup..=candles.len() {
            let window = &candles[end.saturating_sub(self.lookback)..end];
            let signal = self.detector.analyze_market_regime(window, pair);

            report.steps += 1;
            if signal.is_fallback() {
                report.fallbacks += 1;
            }
            *report.regime_counts.entry(signal.regime).or_insert(0) += 1;
            if previous.is_some_and(|p| p != signal.regime) {
                report.regime_changes += 1;
            }
            previous = Some(signal.regime);

            let first_launch = self.bots.weights().is_empty();
            let changes = self.bots.update(signal.regime);
            if !first_launch {
                report.bot_changes += changes.len();
            }

            let condition = MarketCondition::from_signal(&signal);
            self.manager.observe_condition(condition.clone());

            if self.manager.should_rebalance_at(signal.timestamp) {
                let rebalance = self
                    .manager
                    .commit_allocation(&condition, &self.performance, signal.timestamp);
                tracing::debug!(
                    "Rebalanced at {} for {} ({} significant changes)",
                    signal.timestamp,
                    rebalance.regime,
                    rebalance.changes.len()
                );
                report.rebalances.push(rebalance);
            }

            report.final_signal = Some(signal);
        }

        report.running_bots = self.bots.running().iter().copied().collect();

        tracing::info!(
            "Replay complete: {} steps, {} regime changes, {} rebalances, {} bot changes",
            report.steps,
            report.regime_changes,
            report.rebalances.len(),
            report.bot_changes
        );

        Ok(report)
    }

    /// Run a replay and print a short report
    pub fn run_and_report(&mut self, candles: &[Candle], pair: &str, scenario_name: &str) -> Result<ReplayReport> {
        println!("\n🔬 Replaying scenario: {}", scenario_name);
        println!("   Pair: {}", pair);
        println!("   Candles: {}", candles.len());

        let report = self.run(candles, pair)?;

        println!("   Steps: {}", report.steps);
        for (regime, count) in &report.regime_counts {
            println!("   {:<11} {:>5}", regime.as_str(), count);
        }
        if let Some(dominant) = report.dominant_regime() {
            println!("   Dominant regime: {}", dominant);
        }
        println!("   Regime changes: {}", report.regime_changes);
        println!("   Rebalances: {}", report.rebalances.len());
        println!("   Bot changes: {}", report.bot_changes);
        let running: Vec<&str> = report.running_bots.iter().map(|b| b.as_str()).collect();
        println!("   Running bots: {}", running.join(", "));
        if let Some(last) = report.last_rebalance() {
            println!("   Last allocation ({}, confidence {:.2}):", last.regime, last.confidence);
            for (name, pct) in &last.allocations {
                println!("     {:<28} {:>6.2}%", name, pct);
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backtest::synthetic::{MarketScenario, SyntheticDataGenerator};

    fn replay() -> RegimeReplay {
        RegimeReplay::new(RegimeDetector::default(), PortfolioManager::default())
    }

    #[test]
    fn test_replay_uptrend() {
        tracing_subscriber::fmt()
            .with_env_filter("cryptoregime=debug")
            .try_init()
            .ok();

        let candles = SyntheticDataGenerator::new(42).generate(MarketScenario::Uptrend, 260, 60);
        let mut replay = replay();

        let report = replay.run(&candles, "SYNTH/USDT").unwrap();

        assert_eq!(report.steps, 61);
        assert_eq!(report.regime_counts.values().sum::<usize>(), 61);
        assert_eq!(report.fallbacks, 0);

        // First step always rebalances
        assert!(!report.rebalances.is_empty());
        let last = report.last_rebalance().unwrap();
        let total: f64 = last.allocations.values().sum();
        assert!((total - 100.0).abs() < 1e-6, "Allocations should sum to 100: {}", total);

        let final_signal = report.final_signal.as_ref().unwrap();
        assert_eq!(final_signal.timestamp, candles.last().unwrap().timestamp);
        assert_eq!(replay.detector().history("SYNTH/USDT").len(), 61);

        // Bots launch on the first detection and follow the regime after that
        assert!(!report.running_bots.is_empty());
        assert_eq!(report.running_bots.len(), replay.bots().running().len());
        assert!((replay.bots().weights().values().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_replay_rebalance_cadence() {
        let candles = SyntheticDataGenerator::new(3).generate(MarketScenario::Sideways, 300, 60);
        let report = replay().run(&candles, "SYNTH/USDT").unwrap();

        // 101 hourly steps: at least the initial and the daily rebalances
        assert!(report.rebalances.len() >= 5, "Got {} rebalances", report.rebalances.len());
        assert!(report.rebalances.len() <= report.steps);
        for pair in report.rebalances.windows(2) {
            assert!(pair[1].timestamp > pair[0].timestamp);
        }
    }

    #[test]
    fn test_replay_insufficient_data() {
        let candles = SyntheticDataGenerator::new(42).generate(MarketScenario::Uptrend, 50, 60);

        let result = replay().run(&candles, "SYNTH/USDT");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Not enough candles"));
    }

    #[test]
    fn test_dominant_regime() {
        let mut counts = BTreeMap::new();
        counts.insert(DetectorRegime::Bull, 3);
        counts.insert(DetectorRegime::Sideways, 7);

        let report = ReplayReport {
            pair: "X".to_string(),
            steps: 10,
            regime_counts: counts,
            regime_changes: 1,
            fallbacks: 0,
            final_signal: None,
            rebalances: vec![],
            bot_changes: 0,
            running_bots: vec![],
        };
        assert_eq!(report.dominant_regime(), Some(DetectorRegime::Sideways));
    }
}
