use serde::{Deserialize, Serialize};

/// A single OHLC bar plus its stable persisted id, keyed by `(ticker, minute)`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    pub bar_id: i64,
    pub ticker: String,
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}
