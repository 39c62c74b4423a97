//! # Pairsbot
//!
//! A statistical pairs-trading engine for correlated token pairs: find
//! cointegrated pairs, trade z-score deviations of their spread, and run
//! the whole book behind hard portfolio risk limits.
//!
//! ## Architecture
//!
//! - `config`: Configuration management and validation
//! - `market`: Market data, execution and capital traits, plus the paper venue
//! - `stats`: Correlation, cointegration, half-life and confidence scoring
//! - `strategy`: Signal generation and the tick controller
//! - `position`: Hedged position lifecycle and the position manager
//! - `risk`: Portfolio-level entry gating
//! - `error`: Statistical and execution error types

pub mod config;
pub mod error;
pub mod market;
pub mod position;
pub mod risk;
pub mod stats;
pub mod strategy;

pub use config::Config;
