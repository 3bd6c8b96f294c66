use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cryptoregime::backtest::{MarketScenario, RegimeReplay, SyntheticDataGenerator};
use cryptoregime::config::AppConfig;
use cryptoregime::models::Candle;
use cryptoregime::portfolio::PortfolioManager;
use cryptoregime::regime::{MarketConditionAnalyzer, RegimeDetector};
use cryptoregime::strategy::{bot_weights, bots_to_start};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "cryptoregime", about = "Market regime detection and strategy allocation")]
struct Cli {
    /// Config file (JSON, TOML or YAML); CRYPTOREGIME__* variables override it
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Detect the regime of a candle window read from a JSON file
    Analyze {
        /// JSON array of candles, oldest first
        #[arg(long)]
        input: PathBuf,

        #[arg(long, default_value = "BTC/USDT")]
        pair: String,

        /// Also rebalance the roster on the signal and print the report
        #[arg(long)]
        rebalance: bool,
    },

    /// Replay a synthetic scenario through the detector and the allocator
    Simulate {
        #[arg(long, default_value = "uptrend")]
        scenario: MarketScenario,

        #[arg(long, default_value_t = 500)]
        candles: usize,

        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Minutes between candles
        #[arg(long, default_value_t = 60)]
        interval: i64,
    },
}

fn main() -> Result<()> {
    setup_logging();

    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Command::Analyze { input, pair, rebalance } => analyze(&config, &input, &pair, rebalance),
        Command::Simulate {
            scenario,
            candles,
            seed,
            interval,
        } => simulate(&config, scenario, candles, seed, interval),
    }
}

fn setup_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("cryptoregime=info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn build_manager(config: &AppConfig) -> Result<PortfolioManager> {
    let registry = config.registry().context("Invalid strategy roster")?;
    Ok(PortfolioManager::new(
        registry,
        config.portfolio.clone(),
        MarketConditionAnalyzer::new(config.condition.clone()),
    ))
}

fn analyze(config: &AppConfig, input: &Path, pair: &str, rebalance: bool) -> Result<()> {
    let raw = std::fs::read_to_string(input).with_context(|| format!("Failed to read {}", input.display()))?;
    let candles: Vec<Candle> =
        serde_json::from_str(&raw).with_context(|| format!("Failed to parse candles from {}", input.display()))?;

    let foreign = candles.iter().filter(|c| c.symbol != pair).count();
    if foreign > 0 {
        tracing::warn!("{} of {} candles are not tagged {}", foreign, candles.len(), pair);
    }

    let mut detector = RegimeDetector::new(config.detector.clone());
    let signal = detector.analyze_market_regime(&candles, pair);
    println!("{}", serde_json::to_string_pretty(&signal)?);

    let weights = bot_weights(signal.regime, &config.bots);
    println!("{}", serde_json::to_string_pretty(&weights)?);
    tracing::info!("Bots to start: {:?}", bots_to_start(&weights, &config.bots));

    if rebalance {
        let mut manager = build_manager(config)?;
        let report = manager.rebalance_from_signal(&signal, &HashMap::new());
        println!("{}", serde_json::to_string_pretty(&report)?);
        println!("{}", serde_json::to_string_pretty(&manager.strategy_configs())?);
    }

    Ok(())
}

fn simulate(config: &AppConfig, scenario: MarketScenario, num_candles: usize, seed: u64, interval: i64) -> Result<()> {
    let pair = "SYNTH/USDT";
    let candles = SyntheticDataGenerator::new(seed)
        .with_symbol(pair)
        .generate(scenario, num_candles, interval);

    let detector = RegimeDetector::new(config.detector.clone());
    let mut replay = RegimeReplay::new(detector, build_manager(config)?).with_bot_policy(config.bots.clone());

    let report = replay
        .run_and_report(&candles, pair, scenario.as_str())
        .map_err(|e| anyhow::anyhow!(e))
        .context("Replay failed")?;

    if let Some(last) = report.last_rebalance() {
        println!("{}", serde_json::to_string_pretty(last)?);
    }
    println!(
        "{}",
        serde_json::to_string_pretty(&replay.manager().portfolio_summary(chrono::Utc::now()))?
    );

    Ok(())
}
