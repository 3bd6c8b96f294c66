use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// OHLCV candlestick for one symbol
///
/// Every field is required when deserializing; a missing column is a caller
/// error, never silently defaulted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candle {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    fn first_invalid_field(&self) -> Option<&'static str> {
        [
            ("open", self.open),
            ("high", self.high),
            ("low", self.low),
            ("close", self.close),
            ("volume", self.volume),
        ]
        .into_iter()
        .find(|(_, value)| !value.is_finite())
        .map(|(name, _)| name)
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum CandleError {
    #[error("candle window is empty")]
    Empty,

    #[error("candles are not sorted by timestamp (index {0})")]
    NotSorted(usize),

    #[error("non-finite {field} at index {index}")]
    NonFinite { index: usize, field: &'static str },

    #[error("invalid candle at index {index}: {reason}")]
    Invalid { index: usize, reason: &'static str },
}

/// Validate an OHLCV window before analysis
///
/// Checks that the window is non-empty, ordered by time ascending, that every
/// value is finite, that high >= low, and that close and volume are non-negative.
pub fn validate_candles(candles: &[Candle]) -> Result<(), CandleError> {
    if candles.is_empty() {
        return Err(CandleError::Empty);
    }

    for (index, candle) in candles.iter().enumerate() {
        if let Some(field) = candle.first_invalid_field() {
            return Err(CandleError::NonFinite { index, field });
        }
        if candle.high < candle.low {
            return Err(CandleError::Invalid {
                index,
                reason: "high below low",
            });
        }
        if candle.close < 0.0 || candle.volume < 0.0 {
            return Err(CandleError::Invalid {
                index,
                reason: "negative close or volume",
            });
        }
    }

    if let Some(index) = candles
        .windows(2)
        .position(|w| w[1].timestamp < w[0].timestamp)
    {
        return Err(CandleError::NotSorted(index + 1));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(hours: i64, close: f64) -> Candle {
        Candle {
            symbol: "BTC/USDT".to_string(),
            timestamp: DateTime::from_timestamp(1_700_000_000 + hours * 3600, 0).unwrap(),
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 1000.0,
        }
    }

    #[test]
    fn test_valid_window() {
        let candles = vec![candle(0, 100.0), candle(1, 101.0), candle(2, 102.0)];
        assert!(validate_candles(&candles).is_ok());
    }

    #[test]
    fn test_empty_window() {
        assert_eq!(validate_candles(&[]), Err(CandleError::Empty));
    }

    #[test]
    fn test_unsorted_window() {
        let candles = vec![candle(0, 100.0), candle(2, 101.0), candle(1, 102.0)];
        assert_eq!(validate_candles(&candles), Err(CandleError::NotSorted(2)));
    }

    #[test]
    fn test_non_finite_value() {
        let mut bad = candle(1, 101.0);
        bad.volume = f64::NAN;
        let candles = vec![candle(0, 100.0), bad];

        assert_eq!(
            validate_candles(&candles),
            Err(CandleError::NonFinite {
                index: 1,
                field: "volume"
            })
        );
    }

    #[test]
    fn test_inverted_range() {
        let mut bad = candle(0, 100.0);
        bad.high = 90.0;
        assert!(matches!(
            validate_candles(&[bad]),
            Err(CandleError::Invalid { index: 0, .. })
        ));
    }

    #[test]
    fn test_missing_column_is_rejected() {
        let json = r#"[{"symbol":"BTC/USDT","timestamp":"2024-01-01T00:00:00Z",
            "open":1.0,"high":2.0,"low":0.5,"close":1.5}]"#;
        let parsed: Result<Vec<Candle>, _> = serde_json::from_str(json);
        assert!(parsed.is_err());
    }
}
