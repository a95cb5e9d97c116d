use serde::{Deserialize, Serialize};

use backsim_fees::Side;

/// A trade signal deposited by the upstream signal-generation process,
/// keyed by minute timestamp (spec §3 "SignalRecord").
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SignalRecord {
    pub id: i64,
    pub strategy_fk: i64,
    pub ticker: String,
    pub timestamp: i64,
    pub side: Side,
    pub take_profit_price: f64,
    pub stop_loss_price: f64,
    pub leverage_calculated: i64,
    pub signal_price: f64,
    pub mult_sl_assigned: f64,
    pub mult_tp_assigned: f64,
}

/// Raw, possibly-`NULL` signal fields as they arrive from the upstream
/// source, prior to the spec's coercion rule ("`None` becomes `0.0` for
/// prices and `1` for leverage").
#[derive(Clone, Debug, Default)]
pub struct RawSignalFields {
    pub take_profit_price: Option<f64>,
    pub stop_loss_price: Option<f64>,
    pub leverage_calculated: Option<i64>,
    pub signal_price: Option<f64>,
    pub mult_sl_assigned: Option<f64>,
    pub mult_tp_assigned: Option<f64>,
}

impl SignalRecord {
    /// Builds a `SignalRecord` from possibly-absent raw fields, applying the
    /// spec's coercion rule and guarding against non-finite values.
    pub fn coerce(
        id: i64,
        strategy_fk: i64,
        ticker: impl Into<String>,
        timestamp: i64,
        side: Side,
        raw: RawSignalFields,
    ) -> Self {
        let finite_or = |v: Option<f64>, default: f64| -> f64 {
            match v {
                Some(x) if x.is_finite() => x,
                _ => default,
            }
        };
        Self {
            id,
            strategy_fk,
            ticker: ticker.into(),
            timestamp,
            side,
            take_profit_price: finite_or(raw.take_profit_price, 0.0),
            stop_loss_price: finite_or(raw.stop_loss_price, 0.0),
            leverage_calculated: raw.leverage_calculated.filter(|l| *l > 0).unwrap_or(1),
            signal_price: finite_or(raw.signal_price, 0.0),
            mult_sl_assigned: finite_or(raw.mult_sl_assigned, 0.0),
            mult_tp_assigned: finite_or(raw.mult_tp_assigned, 0.0),
        }
    }
}
