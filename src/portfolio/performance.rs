use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Trailing performance statistics of one strategy
///
/// `win_rate`, `total_return` and `max_drawdown` are fractions (0.55 = 55%).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyPerformance {
    pub sharpe_ratio: f64,
    pub win_rate: f64,
    pub total_return: f64,
    pub max_drawdown: f64,
    pub trades_count: usize,
    pub last_updated: DateTime<Utc>,
}

impl StrategyPerformance {
    /// Statistics of a strategy with no track record (Sharpe 0, win rate 0.5)
    pub fn neutral(last_updated: DateTime<Utc>) -> Self {
        Self {
            sharpe_ratio: 0.0,
            win_rate: 0.5,
            total_return: 0.0,
            max_drawdown: 0.0,
            trades_count: 0,
            last_updated,
        }
    }

    /// Compute statistics from per-trade returns (fractions, 0.02 = +2%)
    ///
    /// Sharpe is mean / population std of the returns with a zero risk-free
    /// rate. Drawdown is the largest peak-to-trough fall of the compounded
    /// equity curve. An empty series is neutral.
    pub fn from_trade_returns(returns: &[f64], last_updated: DateTime<Utc>) -> Self {
        if returns.is_empty() {
            return Self::neutral(last_updated);
        }

        let n = returns.len() as f64;
        let wins = returns.iter().filter(|r| **r > 0.0).count();

        let mean = returns.iter().sum::<f64>() / n;
        let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
        let std_dev = variance.sqrt();
        let sharpe_ratio = if std_dev > f64::EPSILON { mean / std_dev } else { 0.0 };

        let mut equity = 1.0;
        let mut peak = 1.0;
        let mut max_drawdown = 0.0f64;
        for r in returns {
            equity *= 1.0 + r;
            peak = f64::max(peak, equity);
            if peak > 0.0 {
                max_drawdown = max_drawdown.max((peak - equity) / peak);
            }
        }

        Self {
            sharpe_ratio,
            win_rate: wins as f64 / n,
            total_return: equity - 1.0,
            max_drawdown,
            trades_count: returns.len(),
            last_updated,
        }
    }

    pub fn multiplier(&self) -> f64 {
        performance_multiplier(self.sharpe_ratio, self.win_rate)
    }
}

/// Allocation multiplier in [0.5, 2.0] from Sharpe ratio and win rate
///
/// - Sharpe > 1 → 1 + (sharpe - 1) * 0.5, capped at 2
/// - Sharpe < -0.5 → 1 + sharpe * 0.5, floored at 0.5
/// - win rate > 0.6 → x1.2, win rate < 0.4 → x0.8
pub fn performance_multiplier(sharpe_ratio: f64, win_rate: f64) -> f64 {
    let mut multiplier = if sharpe_ratio > 1.0 {
        (1.0 + (sharpe_ratio - 1.0) * 0.5).min(2.0)
    } else if sharpe_ratio < -0.5 {
        (1.0 + sharpe_ratio * 0.5).max(0.5)
    } else {
        1.0
    };

    if win_rate > 0.6 {
        multiplier *= 1.2;
    } else if win_rate < 0.4 {
        multiplier *= 0.8;
    }

    if multiplier.is_finite() {
        multiplier.clamp(0.5, 2.0)
    } else {
        1.0
    }
}
