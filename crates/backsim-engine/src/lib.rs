//! The backtesting Simulator Core (spec §4, §5, §7).
//!
//! Pure gate evaluation lives in [`open`] and [`leverage`]; the stateful,
//! async per-minute loop is [`run::Simulator`]. [`run_backtest`] is the
//! top-level entry point a CLI or scheduler calls: it fetches the active
//! investors, runs each one's [`run::Simulator`] in turn, and never aborts
//! the whole batch because one investor's run hit a fatal error.

mod error;
mod leverage;
mod open;
mod run;

pub use error::EngineError;
pub use leverage::select_leverage;
pub use open::{evaluate_open, OpenCandidate, OpenDecision};
pub use run::Simulator;

use anyhow::Result;
use backsim_db::{Persistence, PriceSource, SignalSource, StrategyLoader};

/// Runs every active investor over `[ts_start, ts_end]` (spec §7).
///
/// Zero active investors is not an error (spec §7 "warn and exit cleanly").
/// A single investor's run failing with a fatal [`EngineError`] halts that
/// investor only — subsequent investors still run, matching the
/// "the engine halts the affected investor" non-goal around persistence
/// recovery scope.
pub async fn run_backtest(
    ts_start: i64,
    ts_end: i64,
    persistence: &dyn Persistence,
    signals: &dyn SignalSource,
    prices: &dyn PriceSource,
    strategy_loader: &dyn StrategyLoader,
) -> Result<()> {
    if ts_end < ts_start {
        return Err(EngineError::InvalidDateRange { ts_start, ts_end }.into());
    }

    let active = persistence.active_investors().await?;
    if active.is_empty() {
        tracing::warn!("no active investors for this run, exiting cleanly");
        return Ok(());
    }

    for (investor, risk) in active {
        let investor_id = investor.id;
        let mut sim = Simulator::new(investor, risk, persistence, signals, prices, strategy_loader);
        if let Err(err) = sim.run(ts_start, ts_end).await {
            tracing::error!(investor_id, error = %err, "investor run aborted");
        }
    }

    Ok(())
}
