//! Market data and venue integration.
//!
//! The engine consumes three external collaborators, all behind traits:
//! - [`MarketDataFeed`] for per-token price history
//! - [`TradeExecutionService`] for hedged two-leg swap submission
//! - [`CapitalAuthority`] for capital and the emergency-stop flag
//!
//! [`PaperVenue`] implements all three in memory for tests and paper runs.

pub mod paper;
mod series;
mod traits;

pub use paper::PaperVenue;
pub use series::{aligned_overlap, PricePoint, PriceSeries};
pub use traits::{
    CapitalAuthority, LegOrder, MarketDataFeed, OrderSide, PairTradeOrder, PairTradeReceipt,
    TradeExecutionService,
};
