//! Market structure and volume analysis
//!
//! Provides functions to analyze price structure (higher highs/lows) and volume patterns

use crate::models::Candle;

/// Swing counts over a trailing window of rolling highs and lows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StructureCounts {
    pub higher_highs: usize,
    pub higher_lows: usize,
    pub lower_highs: usize,
    pub lower_lows: usize,
}

impl StructureCounts {
    /// Net bullish minus bearish structure, scaled by `2 * lookback`
    pub fn net_score(&self, lookback: usize) -> f64 {
        if lookback == 0 {
            return 0.0;
        }
        let bullish = (self.higher_highs + self.higher_lows) as f64;
        let bearish = (self.lower_highs + self.lower_lows) as f64;
        (bullish - bearish) / (2 * lookback) as f64
    }
}

/// Count higher/lower highs and lows of the rolling `swing_window` extremes
///
/// The rolling high at bar `i` is the max high over the `swing_window` bars
/// ending at `i` (rolling low likewise). The last `lookback` rolling values are
/// compared bar to bar. Returns None if there are not enough candles.
pub fn analyze_structure_counts(
    candles: &[Candle],
    swing_window: usize,
    lookback: usize,
) -> Option<StructureCounts> {
    if swing_window == 0 || lookback < 2 || candles.len() < swing_window + lookback - 1 {
        return None;
    }

    let start = candles.len() - lookback;
    let rolling: Vec<(f64, f64)> = (start..candles.len())
        .map(|i| {
            let window = &candles[i + 1 - swing_window..=i];
            let high = window.iter().fold(f64::NEG_INFINITY, |a, c| a.max(c.high));
            let low = window.iter().fold(f64::INFINITY, |a, c| a.min(c.low));
            (high, low)
        })
        .collect();

    let mut counts = StructureCounts::default();
    for pair in rolling.windows(2) {
        let (prev_high, prev_low) = pair[0];
        let (high, low) = pair[1];

        if high > prev_high {
            counts.higher_highs += 1;
        } else if high < prev_high {
            counts.lower_highs += 1;
        }

        if low > prev_low {
            counts.higher_lows += 1;
        } else if low < prev_low {
            counts.lower_lows += 1;
        }
    }

    Some(counts)
}

/// Calculate average volume over a period
pub fn calculate_average_volume(candles: &[Candle], period: usize) -> Option<f64> {
    if period == 0 || candles.len() < period {
        return None;
    }

    let start_idx = candles.len() - period;
    let total_volume: f64 = candles[start_idx..].iter().map(|c| c.volume).sum();
    Some(total_volume / period as f64)
}

/// Mean of (close pct change x relative volume) over the last `lookback` bars
///
/// Relative volume is the bar's volume over the SMA of the `volume_period` bars
/// ending at it. Positive when gains come on above-average volume.
/// Returns None with insufficient data or when average volume is zero.
pub fn calculate_volume_weighted_returns(
    candles: &[Candle],
    volume_period: usize,
    lookback: usize,
) -> Option<f64> {
    if volume_period == 0 || lookback == 0 {
        return None;
    }
    // Each bar needs a previous close and a full volume SMA
    let required = (volume_period - 1).max(1) + lookback;
    if candles.len() < required {
        return None;
    }

    let mut total = 0.0;
    for i in candles.len() - lookback..candles.len() {
        let avg_volume = calculate_average_volume(&candles[..=i], volume_period)?;
        let prev_close = candles[i - 1].close;
        if avg_volume == 0.0 || prev_close == 0.0 {
            return None;
        }

        let relative_volume = candles[i].volume / avg_volume;
        let price_change = candles[i].close / prev_close - 1.0;
        total += price_change * relative_volume;
    }

    Some(total / lookback as f64)
}

/// Change of average volume over the last `recent` bars vs the `older` bars before them
///
/// Returns None with insufficient data or zero older volume.
pub fn calculate_volume_trend(candles: &[Candle], recent: usize, older: usize) -> Option<f64> {
    if recent == 0 || older == 0 || candles.len() < recent + older {
        return None;
    }

    let window = &candles[candles.len() - recent - older..];
    let older_avg = window[..older].iter().map(|c| c.volume).sum::<f64>() / older as f64;
    let recent_avg = window[older..].iter().map(|c| c.volume).sum::<f64>() / recent as f64;

    if older_avg <= 0.0 {
        return None;
    }

    Some((recent_avg - older_avg) / older_avg)
}
