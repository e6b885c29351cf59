//! Market data access port trait.

use crate::domain::error::OptitraderError;
use crate::domain::series::MarketSeries;

pub trait DataPort {
    /// Load the full series for `symbol`, sorted by timestamp.
    fn fetch_series(&self, symbol: &str) -> Result<MarketSeries, OptitraderError>;
}
