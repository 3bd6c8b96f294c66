use crate::models::Candle;
use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::str::FromStr;

/// Market scenario types for synthetic data generation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketScenario {
    /// Steady uptrend with noise (+2% daily average)
    Uptrend,
    /// Steady downtrend with noise (-2% daily average)
    Downtrend,
    /// Mean-reverting chop around the starting price
    Sideways,
    /// Large swings with no drift (±5% per candle)
    Volatile,
    /// Slow grind up, then a 40% collapse over the second half
    Crash,
}

impl MarketScenario {
    pub const ALL: [MarketScenario; 5] = [
        MarketScenario::Uptrend,
        MarketScenario::Downtrend,
        MarketScenario::Sideways,
        MarketScenario::Volatile,
        MarketScenario::Crash,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MarketScenario::Uptrend => "uptrend",
            MarketScenario::Downtrend => "downtrend",
            MarketScenario::Sideways => "sideways",
            MarketScenario::Volatile => "volatile",
            MarketScenario::Crash => "crash",
        }
    }
}

impl FromStr for MarketScenario {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MarketScenario::ALL
            .into_iter()
            .find(|scenario| scenario.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                let names: Vec<&str> = MarketScenario::ALL.iter().map(|s| s.as_str()).collect();
                format!("unknown scenario '{}', expected one of: {}", s, names.join(", "))
            })
    }
}

impl std::fmt::Display for MarketScenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Generates synthetic OHLCV data for replays and tests
pub struct SyntheticDataGenerator {
    rng: StdRng,
    symbol: String,
    base_price: f64,
    base_volume: f64,
    start_time: Option<DateTime<Utc>>,
}

impl SyntheticDataGenerator {
    /// Create a new generator with a seed for reproducibility
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            symbol: "SYNTH/USDT".to_string(),
            base_price: 30_000.0,
            base_volume: 1_000.0,
            start_time: None,
        }
    }

    pub fn with_symbol(mut self, symbol: &str) -> Self {
        self.symbol = symbol.to_string();
        self
    }

    pub fn with_base_price(mut self, base_price: f64) -> Self {
        self.base_price = base_price;
        self
    }

    /// Pin the first timestamp; otherwise the series ends now
    pub fn with_start_time(mut self, start_time: DateTime<Utc>) -> Self {
        self.start_time = Some(start_time);
        self
    }

    /// Generate candles for a specific market scenario
    ///
    /// # Arguments
    /// * `scenario` - The market scenario to simulate
    /// * `num_candles` - Number of candles (250+ gives the detector a full window)
    /// * `interval_minutes` - Minutes between candles
    pub fn generate(&mut self, scenario: MarketScenario, num_candles: usize, interval_minutes: i64) -> Vec<Candle> {
        let interval_minutes = interval_minutes.max(1);
        let start_time = self
            .start_time
            .unwrap_or_else(|| Utc::now() - Duration::minutes(num_candles as i64 * interval_minutes));

        // Fraction of a day covered by one candle
        let day_fraction = interval_minutes as f64 / (24.0 * 60.0);

        let mut candles = Vec::with_capacity(num_candles);
        let mut current_price = self.base_price;

        for i in 0..num_candles {
            let timestamp = start_time + Duration::minutes(i as i64 * interval_minutes);

            let change = match scenario {
                MarketScenario::Uptrend => current_price * (0.02 * day_fraction + self.rng.gen_range(-0.001..0.001)),
                MarketScenario::Downtrend => {
                    current_price * (-0.02 * day_fraction + self.rng.gen_range(-0.001..0.001))
                }
                MarketScenario::Sideways => {
                    // 10% pull back to the mean
                    (self.base_price - current_price) * 0.1 + current_price * self.rng.gen_range(-0.01..0.01)
                }
                MarketScenario::Volatile => current_price * self.rng.gen_range(-0.05..0.05),
                MarketScenario::Crash => {
                    if i < num_candles / 2 {
                        current_price * self.rng.gen_range(-0.003..0.005)
                    } else {
                        let drop_rate = -0.40 / (num_candles as f64 / 2.0);
                        current_price * (drop_rate + self.rng.gen_range(-0.003..0.003))
                    }
                }
            };

            // Keep prices strictly positive
            current_price = (current_price + change).max(self.base_price * 0.05);

            let volume_factor = match scenario {
                // Panic selling
                MarketScenario::Crash if i >= num_candles / 2 => 2.5,
                MarketScenario::Volatile => 1.5,
                _ => 1.0,
            };

            let candle = self.create_candle(current_price, timestamp, volume_factor);
            candles.push(candle);
        }

        candles
    }

    /// Build a consistent OHLC bar around a close price
    fn create_candle(&mut self, price: f64, timestamp: DateTime<Utc>, volume_factor: f64) -> Candle {
        let noise_pct = 0.002;

        let open = price * (1.0 + self.rng.gen_range(-noise_pct..noise_pct));
        let high = open.max(price) * (1.0 + self.rng.gen_range(0.0..noise_pct));
        let low = open.min(price) * (1.0 - self.rng.gen_range(0.0..noise_pct));

        // Vary volume ±30%
        let volume = self.base_volume * volume_factor * self.rng.gen_range(0.7..1.3);

        Candle {
            symbol: self.symbol.clone(),
            timestamp,
            open,
            high,
            low,
            close: price,
            volume,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::validate_candles;

    #[test]
    fn test_generate_uptrend() {
        let mut gen = SyntheticDataGenerator::new(42);
        let candles = gen.generate(MarketScenario::Uptrend, 500, 60);

        assert_eq!(candles.len(), 500);

        let first_price = candles.first().unwrap().close;
        let last_price = candles.last().unwrap().close;
        assert!(
            last_price > first_price,
            "Uptrend should end higher: {} -> {}",
            first_price,
            last_price
        );
    }

    #[test]
    fn test_generate_downtrend() {
        let mut gen = SyntheticDataGenerator::new(42);
        let candles = gen.generate(MarketScenario::Downtrend, 500, 60);

        let first_price = candles.first().unwrap().close;
        let last_price = candles.last().unwrap().close;
        assert!(
            last_price < first_price,
            "Downtrend should end lower: {} -> {}",
            first_price,
            last_price
        );
    }

    #[test]
    fn test_generate_sideways() {
        let mut gen = SyntheticDataGenerator::new(42);
        let candles = gen.generate(MarketScenario::Sideways, 500, 60);

        let base = gen.base_price;
        for candle in &candles {
            assert!(
                candle.close > base * 0.9 && candle.close < base * 1.1,
                "Sideways should stay near base: {} vs {}",
                candle.close,
                base
            );
        }
    }

    #[test]
    fn test_generate_crash() {
        let mut gen = SyntheticDataGenerator::new(7);
        let candles = gen.generate(MarketScenario::Crash, 400, 60);

        let midpoint = candles[199].close;
        let last = candles.last().unwrap().close;
        assert!(last < midpoint * 0.75, "Crash should lose most of 40%: {} -> {}", midpoint, last);
        assert!(candles[300].volume > candles[100].volume, "Crash volume should spike");
    }

    #[test]
    fn test_same_seed_same_series() {
        let start = Utc::now();
        let a = SyntheticDataGenerator::new(9)
            .with_start_time(start)
            .generate(MarketScenario::Volatile, 50, 60);
        let b = SyntheticDataGenerator::new(9)
            .with_start_time(start)
            .generate(MarketScenario::Volatile, 50, 60);
        assert_eq!(a, b);
    }

    #[test]
    fn test_candles_pass_validation() {
        for scenario in MarketScenario::ALL {
            let mut gen = SyntheticDataGenerator::new(42).with_symbol("BTC/USDT");
            let candles = gen.generate(scenario, 300, 60);

            assert!(validate_candles(&candles).is_ok(), "{} produced invalid candles", scenario);
            assert!(candles.iter().all(|c| c.symbol == "BTC/USDT"));
            for pair in candles.windows(2) {
                assert_eq!((pair[1].timestamp - pair[0].timestamp).num_minutes(), 60);
            }
        }
    }

    #[test]
    fn test_ohlc_consistency() {
        let mut gen = SyntheticDataGenerator::new(42);
        let candles = gen.generate(MarketScenario::Volatile, 200, 60);

        for candle in &candles {
            assert!(candle.high >= candle.close, "High should be >= close");
            assert!(candle.high >= candle.open, "High should be >= open");
            assert!(candle.low <= candle.close, "Low should be <= close");
            assert!(candle.low <= candle.open, "Low should be <= open");
            assert!(candle.low > 0.0);
        }
    }

    #[test]
    fn test_scenario_from_str() {
        assert_eq!("Crash".parse::<MarketScenario>(), Ok(MarketScenario::Crash));
        assert_eq!(" uptrend ".parse::<MarketScenario>(), Ok(MarketScenario::Uptrend));
        assert!("moon".parse::<MarketScenario>().is_err());
    }
}
