//! Core domain types for the discrete-minute backtesting engine (spec §3).

mod event;
mod investor;
mod operation;
mod price;
mod signal;
mod strategy;

pub use backsim_fees::Side;
pub use event::{Event, EventKind};
pub use investor::{Investor, LeveragePolicy};
pub use operation::{Operation, OperationState, PartialClose};
pub use price::PriceRecord;
pub use signal::{RawSignalFields, SignalRecord};
pub use strategy::StrategyParams;

/// Risk sizing configuration for one investor (spec §3 "RiskConfig").
/// Immutable for the duration of a run.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RiskConfig {
    pub risk_max_pct: f64,
    pub size_min: f64,
    pub size_max: f64,
}
