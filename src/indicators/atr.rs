//! Average True Range (ATR) indicator
//!
//! Measures market volatility by calculating the average of true ranges over a period.
//! True Range is the greatest of:
//! - Current High - Current Low
//! - Abs(Current High - Previous Close)
//! - Abs(Current Low - Previous Close)
//!
//! Uses Wilder's smoothing (same as RSI) for the moving average.

use crate::models::Candle;

/// True range of every candle after the first
pub fn true_ranges(candles: &[Candle]) -> Vec<f64> {
    candles
        .windows(2)
        .map(|w| {
            let high = w[1].high;
            let low = w[1].low;
            let prev_close = w[0].close;

            (high - low)
                .max((high - prev_close).abs())
                .max((low - prev_close).abs())
        })
        .collect()
}

/// Calculate ATR and return all intermediate values
///
/// Returns vector of ATR values aligned with candles starting from index `period`,
/// i.e. `atr_series[j]` belongs to `candles[j + period]`.
pub fn calculate_atr_series(candles: &[Candle], period: usize) -> Vec<f64> {
    if period == 0 || candles.len() < period + 1 {
        return Vec::new();
    }

    let true_ranges = true_ranges(candles);

    let mut atr_series = Vec::with_capacity(true_ranges.len() - period + 1);

    // First ATR is simple average of first 'period' true ranges
    let first_atr: f64 = true_ranges.iter().take(period).sum::<f64>() / period as f64;
    atr_series.push(first_atr);

    // Apply Wilder's smoothing for subsequent values
    let mut atr = first_atr;
    for tr in &true_ranges[period..] {
        atr = (atr * (period as f64 - 1.0) + tr) / period as f64;
        atr_series.push(atr);
    }

    atr_series
}

/// ATR expressed as a percentage of the close of the candle it belongs to
pub fn calculate_atr_pct_series(candles: &[Candle], period: usize) -> Vec<f64> {
    calculate_atr_series(candles, period)
        .iter()
        .enumerate()
        .map(|(j, atr)| atr / candles[j + period].close * 100.0)
        .collect()
}

/// Percentile rank (0-1] of the latest value within the trailing `window` values
///
/// Ties take the average rank, so a flat window ranks the latest value at the
/// middle. Returns None if fewer than `window` values are available.
pub fn percentile_rank_of_last(values: &[f64], window: usize) -> Option<f64> {
    if window == 0 || values.len() < window {
        return None;
    }

    let recent = &values[values.len() - window..];
    let current = *recent.last()?;

    let below = recent.iter().filter(|&&v| v < current).count() as f64;
    let equal = recent.iter().filter(|&&v| v == current).count() as f64;

    let average_rank = below + (equal + 1.0) / 2.0;
    Some(average_rank / window as f64)
}
