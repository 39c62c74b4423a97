//! Pairsbot - Main Entry Point
//!
//! Runs the pairs-trading engine against the in-process paper venue, either
//! as a continuous loop or as a fixed-length paper simulation.

use anyhow::Result;
use chrono::{Duration, Utc};
use clap::{Parser, Subcommand};
use pairsbot::config::{Config, PairSpec};
use pairsbot::market::{PaperVenue, PricePoint};
use pairsbot::strategy::StrategyController;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, Level};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

/// Pairsbot CLI
#[derive(Parser)]
#[command(name = "pairsbot")]
#[command(version, about = "Statistical pairs trading on correlated token pairs")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a fixed number of ticks on synthetic data and print a JSON summary
    Paper {
        /// Number of ticks to simulate
        #[arg(short, long, default_value = "200")]
        ticks: u32,

        /// Paper trading capital
        #[arg(short, long, default_value = "10000")]
        capital: Decimal,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging()?;

    let mut config = Config::load()?;
    if config.pairs.is_empty() {
        info!("No pairs configured, using the demo pair set");
        config.pairs = demo_pairs();
    }
    config.validate()?;
    log_config(&config);

    match cli.command {
        Some(Commands::Paper { ticks, capital }) => run_paper(config, ticks, capital).await,
        None => run_loop(config).await,
    }
}

/// Continuous trading loop against the paper venue, until Ctrl-C.
///
/// The venue streams deterministic synthetic prices; swapping in a real
/// market only means providing other implementations of the market traits.
async fn run_loop(config: Config) -> Result<()> {
    info!(
        version = env!("CARGO_PKG_VERSION"),
        pairs = config.pairs.len(),
        interval_secs = config.execution.tick_interval_secs,
        "Starting pairsbot"
    );

    let tick_secs = config.execution.tick_interval_secs;
    let venue = Arc::new(PaperVenue::new(dec!(10000)));
    let mut market = SyntheticMarket::seeded(venue.clone(), config.pairs.clone(), 240);
    let mut controller = StrategyController::new(config, venue.clone(), venue.clone(), venue);

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Shutdown signal received");
        shutdown_clone.store(true, Ordering::SeqCst);
    });

    let mut interval = tokio::time::interval(std::time::Duration::from_secs(tick_secs));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    while !shutdown.load(Ordering::SeqCst) {
        interval.tick().await;
        market.advance();
        match controller.tick().await {
            Ok(report) => report.log(),
            Err(e) => error!(error = ?e, "Tick failed"),
        }
    }

    let stats = controller.aggregate_stats();
    info!(
        total_trades = stats.total_trades,
        win_rate = stats.win_rate,
        "Pairsbot stopped"
    );
    Ok(())
}

/// Fixed-length paper run; prints a machine-readable summary to stdout.
async fn run_paper(config: Config, ticks: u32, capital: Decimal) -> Result<()> {
    info!(ticks, %capital, "Starting paper simulation");

    let venue = Arc::new(PaperVenue::new(capital));
    let mut market = SyntheticMarket::seeded(venue.clone(), config.pairs.clone(), 240);
    let mut controller = StrategyController::new(config, venue.clone(), venue.clone(), venue);

    let mut entries = 0usize;
    let mut closes = 0usize;
    let mut rejections = 0usize;
    for _ in 0..ticks {
        market.advance();
        let report = controller.tick().await?;
        entries += report.entries_opened.len();
        closes += report.closes.len();
        rejections += report.entries_rejected.len();
        report.log();
    }

    let stats = controller.aggregate_stats();
    let summary = serde_json::json!({
        "ticks": ticks,
        "entries": entries,
        "closes": closes,
        "rejections": rejections,
        "open_positions": controller.open_positions(),
        "pair_statistics": controller.pair_statistics(),
        "aggregate": stats,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

/// Deterministic synthetic market: token B of each pair wobbles on a slow
/// sine, token A tracks 1.2x its log price through a quickly reverting
/// residual with a periodic stretch that pushes the spread past the entry
/// band. No randomness, so paper runs are exactly reproducible.
struct SyntheticMarket {
    venue: Arc<PaperVenue>,
    pairs: Vec<PairSpec>,
    step: i64,
}

impl SyntheticMarket {
    fn seeded(venue: Arc<PaperVenue>, pairs: Vec<PairSpec>, history: i64) -> Self {
        let mut market = Self {
            venue,
            pairs,
            step: 0,
        };
        let now = Utc::now();
        for back in (1..=history).rev() {
            market.push_all(now - Duration::seconds(30 * back));
            market.step += 1;
        }
        market
    }

    fn advance(&mut self) {
        self.push_all(Utc::now());
        self.step += 1;
    }

    fn push_all(&self, ts: chrono::DateTime<Utc>) {
        for (i, spec) in self.pairs.iter().enumerate() {
            let (price_a, price_b) = synthetic_prices(i, self.step);
            self.venue
                .push_price(&spec.token_a, PricePoint::new(ts, price_a));
            self.venue
                .push_price(&spec.token_b, PricePoint::new(ts, price_b));
        }
    }
}

fn synthetic_prices(pair_index: usize, step: i64) -> (Decimal, Decimal) {
    let t = step as f64;
    let phase = pair_index as f64 * 0.9;

    let log_b = 3.0 + 0.4 * pair_index as f64 + 0.05 * (t * 0.037 + phase).sin();

    // Fast reverting wiggle plus a periodic stretch episode per pair
    let mut resid = 0.01 * (t * 1.17 + phase).sin();
    if (step + 20 * pair_index as i64).rem_euclid(120) < 12 {
        resid += 0.025;
    }

    let a = (1.2 * log_b + resid).exp();
    let b = log_b.exp();
    (
        Decimal::from_f64(a).unwrap_or(Decimal::ONE),
        Decimal::from_f64(b).unwrap_or(Decimal::ONE),
    )
}

fn demo_pairs() -> Vec<PairSpec> {
    vec![
        PairSpec::new("SOL", "RAY"),
        PairSpec::new("ORCA", "JUP"),
        PairSpec::new("BONK", "WIF"),
    ]
}

fn init_logging() -> Result<()> {
    use tracing_subscriber::fmt::writer::MakeWriterExt;

    std::fs::create_dir_all("logs")?;

    let file_appender = tracing_appender::rolling::hourly("logs", "pairsbot.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    // Keep the writer guard alive for the program duration
    Box::leak(Box::new(guard));

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("pairsbot=debug".parse()?)
                .add_directive(Level::INFO.into()),
        )
        .with_writer(std::io::stdout.and(file_writer))
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .init();

    Ok(())
}

fn log_config(config: &Config) {
    info!("Configuration:");
    for pair in &config.pairs {
        info!("   Pair: {}", pair.id());
    }
    info!(
        "   Entry/Exit/Stop z: {} / {} / {}",
        config.limits.entry_z, config.limits.exit_z, config.limits.stop_z
    );
    info!(
        "   Min correlation: {} | Min confidence: {}",
        config.limits.min_correlation, config.limits.min_confidence
    );
    info!(
        "   Max positions: {} | Per-pair: {}% | Total exposure: {}%",
        config.limits.max_concurrent_positions,
        config.limits.max_capital_per_pair_pct * dec!(100),
        config.limits.max_total_exposure_pct * dec!(100)
    );
    info!(
        "   Tick interval: {}s | Execution timeout: {}s",
        config.execution.tick_interval_secs, config.execution.execution_timeout_secs
    );
}
