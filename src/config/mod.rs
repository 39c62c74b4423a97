//! Configuration management for the pairs-trading engine.
//!
//! Loads settings from environment variables and config files.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Token pairs to trade
    #[serde(default)]
    pub pairs: Vec<PairSpec>,
    /// Portfolio-wide risk limits
    #[serde(default)]
    pub limits: RiskLimits,
    /// Statistical model parameters
    #[serde(default)]
    pub stats: StatsConfig,
    /// Execution and scheduling parameters
    #[serde(default)]
    pub execution: ExecutionConfig,
}

/// A configured token pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairSpec {
    pub token_a: String,
    pub token_b: String,
    /// Stable identifier; defaults to "A/B" when omitted.
    #[serde(default)]
    pub pair_id: Option<String>,
}

impl PairSpec {
    pub fn new(token_a: impl Into<String>, token_b: impl Into<String>) -> Self {
        Self {
            token_a: token_a.into(),
            token_b: token_b.into(),
            pair_id: None,
        }
    }

    pub fn id(&self) -> String {
        self.pair_id
            .clone()
            .unwrap_or_else(|| format!("{}/{}", self.token_a, self.token_b))
    }
}

/// Process-wide risk limits, immutable after load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskLimits {
    /// Z-score magnitude that qualifies for entry
    #[serde(default = "default_entry_z")]
    pub entry_z: f64,
    /// Z-score magnitude at which a position has mean-reverted
    #[serde(default = "default_exit_z")]
    pub exit_z: f64,
    /// Z-score magnitude that forces a stop-loss
    #[serde(default = "default_stop_z")]
    pub stop_z: f64,
    /// Minimum rolling correlation for entries and position health
    #[serde(default = "default_min_correlation")]
    pub min_correlation: f64,
    /// Minimum confidence score for entries
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,
    /// Maximum number of concurrently open positions
    #[serde(default = "default_max_concurrent_positions")]
    pub max_concurrent_positions: usize,
    /// Fraction of total capital allocatable to one pair (0.0-1.0)
    #[serde(default = "default_max_capital_per_pair_pct")]
    pub max_capital_per_pair_pct: Decimal,
    /// Fraction of total capital committed across all open positions (0.0-1.0)
    #[serde(default = "default_max_total_exposure_pct")]
    pub max_total_exposure_pct: Decimal,
    /// Maximum holding period in hours before a forced close
    #[serde(default = "default_max_holding_period_hours")]
    pub max_holding_period_hours: i64,
    /// Consecutive ticks below min_correlation before a breakdown close
    #[serde(default = "default_breakdown_ticks")]
    pub breakdown_ticks: u32,
}

/// Parameters of the statistical layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsConfig {
    /// Minimum aligned samples before any estimate is produced
    #[serde(default = "default_min_samples")]
    pub min_samples: usize,
    /// Price-history bound per token, in points
    #[serde(default = "default_lookback_points")]
    pub lookback_points: usize,
    /// Lookback window requested from the market data feed, in seconds
    #[serde(default = "default_lookback_window_secs")]
    pub lookback_window_secs: u64,
    /// ADF p-value at or below which the pair counts as cointegrated
    #[serde(default = "default_adf_p_threshold")]
    pub adf_p_threshold: f64,
    /// Sample count at which the sample-size confidence term saturates
    #[serde(default = "default_target_samples")]
    pub target_samples: usize,
    /// Half-life (in samples) at which the reversion-speed term is 0.5
    #[serde(default = "default_target_half_life")]
    pub target_half_life: f64,
    /// Confidence scoring weights
    #[serde(default)]
    pub weights: ConfidenceWeights,
}

/// Weights of the confidence score terms. Tunable, normalized at use.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfidenceWeights {
    #[serde(default = "default_w_correlation")]
    pub correlation: f64,
    #[serde(default = "default_w_cointegration")]
    pub cointegration: f64,
    #[serde(default = "default_w_sample_size")]
    pub sample_size: f64,
    #[serde(default = "default_w_half_life")]
    pub half_life: f64,
}

/// Execution and scheduling parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Tick cadence in seconds
    #[serde(default = "default_tick_interval_secs")]
    pub tick_interval_secs: u64,
    /// Timeout for a single pair-trade submission in seconds
    #[serde(default = "default_execution_timeout_secs")]
    pub execution_timeout_secs: u64,
    /// No fresh price within this window marks the pair untradable
    #[serde(default = "default_stale_data_timeout_secs")]
    pub stale_data_timeout_secs: u64,
    /// Scales confidence when computing the entry allocation
    #[serde(default = "default_expected_return_weight")]
    pub expected_return_weight: f64,
}

// Default value functions
fn default_entry_z() -> f64 {
    2.0
}

fn default_exit_z() -> f64 {
    0.5
}

fn default_stop_z() -> f64 {
    3.5
}

fn default_min_correlation() -> f64 {
    0.3
}

fn default_min_confidence() -> f64 {
    0.5
}

fn default_max_concurrent_positions() -> usize {
    5
}

fn default_max_capital_per_pair_pct() -> Decimal {
    Decimal::new(5, 2) // 0.05
}

fn default_max_total_exposure_pct() -> Decimal {
    Decimal::new(20, 2) // 0.20
}

fn default_max_holding_period_hours() -> i64 {
    168 // 7 days
}

fn default_breakdown_ticks() -> u32 {
    3
}

fn default_min_samples() -> usize {
    30
}

fn default_lookback_points() -> usize {
    240
}

fn default_lookback_window_secs() -> u64 {
    240 * 30 // lookback_points * default tick interval
}

fn default_adf_p_threshold() -> f64 {
    0.05
}

fn default_target_samples() -> usize {
    120
}

fn default_target_half_life() -> f64 {
    20.0
}

fn default_w_correlation() -> f64 {
    0.35
}

fn default_w_cointegration() -> f64 {
    0.25
}

fn default_w_sample_size() -> f64 {
    0.20
}

fn default_w_half_life() -> f64 {
    0.20
}

fn default_tick_interval_secs() -> u64 {
    30
}

fn default_execution_timeout_secs() -> u64 {
    30
}

fn default_stale_data_timeout_secs() -> u64 {
    120
}

fn default_expected_return_weight() -> f64 {
    1.0
}

impl Config {
    /// Load configuration from environment variables and config files.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::File::with_name("config").required(false))
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .prefix("PAIRSBOT"),
            )
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.limits.exit_z < self.limits.entry_z && self.limits.entry_z < self.limits.stop_z,
            "z thresholds must satisfy exit_z < entry_z < stop_z"
        );

        anyhow::ensure!(
            self.limits.min_correlation >= 0.0 && self.limits.min_correlation <= 1.0,
            "min_correlation must be between 0 and 1"
        );

        anyhow::ensure!(
            self.limits.max_capital_per_pair_pct > Decimal::ZERO
                && self.limits.max_capital_per_pair_pct <= self.limits.max_total_exposure_pct,
            "max_capital_per_pair_pct must be positive and <= max_total_exposure_pct"
        );

        anyhow::ensure!(
            self.limits.max_total_exposure_pct <= Decimal::ONE,
            "max_total_exposure_pct must be <= 1"
        );

        anyhow::ensure!(
            self.limits.max_concurrent_positions >= 1,
            "max_concurrent_positions must be >= 1"
        );

        anyhow::ensure!(
            self.stats.min_samples >= 3 && self.stats.min_samples <= self.stats.lookback_points,
            "min_samples must be >= 3 and <= lookback_points"
        );

        let w = &self.stats.weights;
        anyhow::ensure!(
            w.correlation + w.cointegration + w.sample_size + w.half_life > 0.0,
            "confidence weights must not all be zero"
        );

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pairs: Vec::new(),
            limits: RiskLimits::default(),
            stats: StatsConfig::default(),
            execution: ExecutionConfig::default(),
        }
    }
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            entry_z: default_entry_z(),
            exit_z: default_exit_z(),
            stop_z: default_stop_z(),
            min_correlation: default_min_correlation(),
            min_confidence: default_min_confidence(),
            max_concurrent_positions: default_max_concurrent_positions(),
            max_capital_per_pair_pct: default_max_capital_per_pair_pct(),
            max_total_exposure_pct: default_max_total_exposure_pct(),
            max_holding_period_hours: default_max_holding_period_hours(),
            breakdown_ticks: default_breakdown_ticks(),
        }
    }
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            min_samples: default_min_samples(),
            lookback_points: default_lookback_points(),
            lookback_window_secs: default_lookback_window_secs(),
            adf_p_threshold: default_adf_p_threshold(),
            target_samples: default_target_samples(),
            target_half_life: default_target_half_life(),
            weights: ConfidenceWeights::default(),
        }
    }
}

impl Default for ConfidenceWeights {
    fn default() -> Self {
        Self {
            correlation: default_w_correlation(),
            cointegration: default_w_cointegration(),
            sample_size: default_w_sample_size(),
            half_life: default_w_half_life(),
        }
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: default_tick_interval_secs(),
            execution_timeout_secs: default_execution_timeout_secs(),
            stale_data_timeout_secs: default_stale_data_timeout_secs(),
            expected_return_weight: default_expected_return_weight(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_inverted_z_thresholds_rejected() {
        let mut config = Config::default();
        config.limits.entry_z = 4.0; // above stop_z
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_per_pair_cap_must_fit_total_exposure() {
        let mut config = Config::default();
        config.limits.max_capital_per_pair_pct = dec!(0.5);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_pair_id_defaults_to_token_names() {
        let spec = PairSpec::new("SOL", "RAY");
        assert_eq!(spec.id(), "SOL/RAY");

        let named = PairSpec {
            pair_id: Some("sol-ray".to_string()),
            ..spec
        };
        assert_eq!(named.id(), "sol-ray");
    }
}
