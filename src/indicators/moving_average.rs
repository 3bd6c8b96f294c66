/// Calculate Simple Moving Average (SMA)
pub fn calculate_sma(prices: &[f64], period: usize) -> Option<f64> {
    if period == 0 || prices.len() < period {
        return None;
    }

    let sum: f64 = prices.iter().rev().take(period).sum();
    Some(sum / period as f64)
}

/// EMA for every bar from index `period - 1` onward
///
/// Seeded with the SMA of the first `period` prices, so the returned vector has
/// `prices.len() - period + 1` values (empty if there is not enough data).
/// The last element is aligned with the last price.
pub fn calculate_ema_series(prices: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || prices.len() < period {
        return Vec::new();
    }

    let multiplier = 2.0 / (period as f64 + 1.0);

    let initial_sma = prices[..period].iter().sum::<f64>() / period as f64;

    let mut series = Vec::with_capacity(prices.len() - period + 1);
    let mut ema = initial_sma;
    series.push(ema);
    for price in &prices[period..] {
        ema = (price - ema) * multiplier + ema;
        series.push(ema);
    }

    series
}

/// Adjusted exponentially weighted mean, one value per price
///
/// Every observation is weighted by `(1 - alpha)^age` and the weights are
/// renormalised at each step, so early values are defined from the first bar.
/// `alpha = 2 / (span + 1)`.
pub fn calculate_ewm_series(prices: &[f64], span: usize) -> Vec<f64> {
    if span == 0 {
        return Vec::new();
    }

    let decay = 1.0 - 2.0 / (span as f64 + 1.0);
    let mut numerator = 0.0;
    let mut denominator = 0.0;

    prices
        .iter()
        .map(|&price| {
            numerator = price + decay * numerator;
            denominator = 1.0 + decay * denominator;
            numerator / denominator
        })
        .collect()
}

/// Relative change of a series between `bars_ago` and the latest value
///
/// Returns None when the series is too short or the reference value is zero.
pub fn series_slope(series: &[f64], bars_ago: usize) -> Option<f64> {
    if series.len() <= bars_ago {
        return None;
    }

    let last = *series.last()?;
    let reference = series[series.len() - 1 - bars_ago];
    if reference == 0.0 {
        return None;
    }

    Some((last - reference) / reference)
}
