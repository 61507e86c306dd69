//! Stock and index-member value types.

use chrono::NaiveDate;
use std::hash::{Hash, Hasher};

/// A single listed stock as observed on one trading day. May or may not be
/// part of the index.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Stock {
    pub ticker: String,
    pub price: f64,
    pub shares_outstanding: f64,
}

impl Stock {
    pub fn market_cap(&self) -> f64 {
        self.price * self.shares_outstanding
    }
}

// Identity is the ticker alone: the same listing observed at two different
// prices is still the same stock for set membership.
impl PartialEq for Stock {
    fn eq(&self, other: &Self) -> bool {
        self.ticker == other.ticker
    }
}

impl Eq for Stock {}

impl Hash for Stock {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.ticker.hash(state);
    }
}

/// An index constituent: a stock plus the notional share count that encodes
/// its dollar weight.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IndexMember {
    pub stock: Stock,
    pub notional_num_shares: f64,
}

impl IndexMember {
    pub fn market_cap(&self) -> f64 {
        self.stock.market_cap()
    }

    /// Dollar exposure this member contributes to the index.
    pub fn market_value(&self) -> f64 {
        self.stock.price * self.notional_num_shares
    }
}

/// One dated market-data observation, the row shape used for ingestion.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MarketDataRow {
    pub date: NaiveDate,
    pub stock: Stock,
}
