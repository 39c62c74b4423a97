//! Statistical inference for pair selection.
//!
//! - Rolling Pearson correlation over the aligned price overlap
//! - Engle-Granger style cointegration test (OLS hedge ratio + ADF on the
//!   residual spread, interpolated Dickey-Fuller critical values)
//! - AR(1) mean-reversion half-life
//! - Weighted confidence score combining the above

mod cointegration;
mod correlation;
mod engine;
mod half_life;

pub use cointegration::{adf_statistic, log_spread, ols_hedge_ratio, AdfResult};
pub use correlation::pearson;
pub use engine::{CorrelationEngine, PairEvaluation, PairStatistics, SpreadSnapshot};
pub use half_life::estimate_half_life;
