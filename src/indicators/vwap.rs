//! Rolling VWAP and large-volume / tight-range flow detection

use crate::models::Candle;

/// Rolling VWAP of the typical price `(high + low + close) / 3`
///
/// `vwap[j]` belongs to `candles[j + period - 1]`. Returns None if a window has
/// zero total volume or there is not enough data.
pub fn calculate_vwap_series(candles: &[Candle], period: usize) -> Option<Vec<f64>> {
    if period == 0 || candles.len() < period {
        return None;
    }

    candles
        .windows(period)
        .map(|window| {
            let volume: f64 = window.iter().map(|c| c.volume).sum();
            if volume == 0.0 {
                return None;
            }
            let traded: f64 = window
                .iter()
                .map(|c| (c.high + c.low + c.close) / 3.0 * c.volume)
                .sum();
            Some(traded / volume)
        })
        .collect()
}

/// Linear-interpolated quantile of unsorted values, `q` in [0, 1]
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let position = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;

    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}

/// Parameters of the smart-money flow proxy
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlowParams {
    pub vwap_period: usize,
    pub vwap_smoothing: usize,
    pub volume_window: usize,
    pub volume_quantile: f64,
    pub max_range_pct: f64,
    pub activity_lookback: usize,
}

impl Default for FlowParams {
    fn default() -> Self {
        Self {
            vwap_period: 20,
            vwap_smoothing: 5,
            volume_window: 20,
            volume_quantile: 0.8,
            max_range_pct: 0.02,
            activity_lookback: 10,
        }
    }
}

/// Components of the smart-money flow proxy
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SmartMoneyFlow {
    /// Mean relative distance of close above (+) or below (-) VWAP
    pub vwap_strength: f64,
    /// Share of recent bars with large volume inside a tight range
    pub activity: f64,
}

impl SmartMoneyFlow {
    pub fn score(&self) -> f64 {
        self.vwap_strength + self.activity
    }
}

/// Distance from rolling VWAP plus the "large volume, small range" activity ratio
///
/// Returns None with insufficient data or zero-volume windows.
pub fn analyze_smart_money_flow(candles: &[Candle], params: &FlowParams) -> Option<SmartMoneyFlow> {
    let FlowParams {
        vwap_period,
        vwap_smoothing,
        volume_window,
        volume_quantile,
        max_range_pct,
        activity_lookback,
    } = *params;

    if vwap_smoothing == 0 || activity_lookback == 0 || volume_window == 0 {
        return None;
    }
    if candles.len() < vwap_period + vwap_smoothing - 1
        || candles.len() < volume_window + activity_lookback - 1
    {
        return None;
    }

    let vwap = calculate_vwap_series(candles, vwap_period)?;
    let offset = vwap_period - 1;

    let mut distance_sum = 0.0;
    for i in candles.len() - vwap_smoothing..candles.len() {
        let level = vwap[i - offset];
        if level == 0.0 {
            return None;
        }
        distance_sum += (candles[i].close - level) / level;
    }
    let vwap_strength = distance_sum / vwap_smoothing as f64;

    let mut active_bars = 0usize;
    for i in candles.len() - activity_lookback..candles.len() {
        let window: Vec<f64> = candles[i + 1 - volume_window..=i]
            .iter()
            .map(|c| c.volume)
            .collect();
        let threshold = quantile(&window, volume_quantile)?;
        let candle = &candles[i];

        let large_volume = candle.volume > threshold;
        let tight_range = candle.close != 0.0 && (candle.high - candle.low) / candle.close < max_range_pct;
        if large_volume && tight_range {
            active_bars += 1;
        }
    }
    let activity = active_bars as f64 / activity_lookback as f64;

    Some(SmartMoneyFlow {
        vwap_strength,
        activity,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn create_test_candles(prices: &[(f64, f64, f64, f64)]) -> Vec<Candle> {
        prices
            .iter()
            .enumerate()
            .map(|(i, &(high, low, close, volume))| Candle {
                symbol: "TEST".to_string(),
                timestamp: Utc::now() + chrono::Duration::hours(i as i64),
                open: close,
                high,
                low,
                close,
                volume,
            })
            .collect()
    }

    #[test]
    fn test_vwap_constant_price() {
        let candles = create_test_candles(&vec![(101.0, 99.0, 100.0, 500.0); 25]);
        let vwap = calculate_vwap_series(&candles, 20).unwrap();

        assert_eq!(vwap.len(), 6);
        assert!((vwap[0] - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_vwap_zero_volume() {
        let candles = create_test_candles(&vec![(101.0, 99.0, 100.0, 0.0); 25]);
        assert!(calculate_vwap_series(&candles, 20).is_none());
    }

    #[test]
    fn test_quantile_interpolation() {
        let values = vec![5.0, 1.0, 3.0, 2.0, 4.0];
        assert_eq!(quantile(&values, 0.0), Some(1.0));
        assert_eq!(quantile(&values, 1.0), Some(5.0));
        assert_eq!(quantile(&values, 0.5), Some(3.0));
        assert!((quantile(&values, 0.8).unwrap() - 4.2).abs() < 1e-12);
        assert!(quantile(&[], 0.5).is_none());
    }

    #[test]
    fn test_flat_market_has_no_flow() {
        let candles = create_test_candles(&vec![(101.0, 99.0, 100.0, 500.0); 40]);
        let flow = analyze_smart_money_flow(&candles, &FlowParams::default()).unwrap();

        assert!(flow.vwap_strength.abs() < 1e-9);
        // Equal volumes are never above their own 80th percentile
        assert_eq!(flow.activity, 0.0);
    }

    #[test]
    fn test_accumulation_on_rising_volume() {
        let prices: Vec<_> = (0..40)
            .map(|i| {
                let close = 100.0 + i as f64 * 0.5;
                (close * 1.002, close * 0.998, close, 1000.0 + 100.0 * i as f64)
            })
            .collect();
        let candles = create_test_candles(&prices);
        let flow = analyze_smart_money_flow(&candles, &FlowParams::default()).unwrap();

        assert!(flow.vwap_strength > 0.0);
        assert_eq!(flow.activity, 1.0);
    }

    #[test]
    fn test_insufficient_data() {
        let candles = create_test_candles(&vec![(101.0, 99.0, 100.0, 500.0); 28]);
        assert!(analyze_smart_money_flow(&candles, &FlowParams::default()).is_none());
    }
}
