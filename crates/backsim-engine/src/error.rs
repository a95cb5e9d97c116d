use std::fmt;

/// Fatal, pre-run configuration failures (spec §7 "Configuration failure").
/// Unlike rejections, drawdown trips, and persistence failures — all modeled
/// as data on [`crate::Simulator`] — these abort the run for the caller
/// before it produces any events, mirroring the split between
/// `mqk_risk::RiskAction` (data) and `mqk_backtest::BacktestError` (a real
/// `Result::Err`).
#[derive(Clone, Debug, PartialEq)]
pub enum EngineError {
    /// `ts_end < ts_start`.
    InvalidDateRange { ts_start: i64, ts_end: i64 },
    /// The strategy referenced by a signal or investor row could not be
    /// loaded (cache miss, loader error).
    MissingStrategyRow { strategy_fk: i64, cause: String },
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::InvalidDateRange { ts_start, ts_end } => {
                write!(f, "invalid date range: ts_end ({ts_end}) is earlier than ts_start ({ts_start})")
            }
            EngineError::MissingStrategyRow { strategy_fk, cause } => {
                write!(f, "could not load strategy {strategy_fk}: {cause}")
            }
        }
    }
}

impl std::error::Error for EngineError {}
