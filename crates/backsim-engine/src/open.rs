//! Pure gate evaluation for the open path (spec §4.7 "Open path" steps 1-7).
//!
//! Step 8 (persist, debit, index, log) is I/O and lives on [`crate::Simulator`];
//! everything up to a ready-to-insert [`Operation`] is deterministic and
//! testable in isolation here.

use backsim_capital::sizing;
use backsim_fees::commission;
use backsim_models::{Investor, Operation, PriceRecord, RiskConfig, SignalRecord, StrategyParams};
use backsim_validations::{capital_available, limits_investor, max_open, risk_amount};

use crate::leverage::select_leverage;

/// A fully-built operation plus the bookkeeping amounts the caller still
/// needs to settle (debit, `operations_today` increment).
pub struct OpenCandidate {
    pub operation: Operation,
    pub amount: f64,
    pub commission: f64,
}

pub enum OpenDecision {
    Candidate(OpenCandidate),
    Rejected(&'static str),
}

/// Evaluates whether `signal` may open against `bar`, given `investor`'s
/// current state and `current_open_count` open operations. Note: unlike
/// closures and DCA, the open path does not apply entry slippage — per spec
/// §4.7 step 6, `exec = bar.close` directly.
#[allow(clippy::too_many_arguments)]
pub fn evaluate_open(
    investor: &Investor,
    risk: &RiskConfig,
    current_open_count: u32,
    signal: &SignalRecord,
    bar: &PriceRecord,
    strategy: StrategyParams,
    ts: i64,
) -> OpenDecision {
    if investor.drawdown_active || investor.halted {
        return OpenDecision::Rejected("investor_halted_drawdown");
    }
    if !limits_investor(investor) {
        return OpenDecision::Rejected("limites_inversionista");
    }
    if !max_open(investor, current_open_count) {
        return OpenDecision::Rejected("max_abiertas");
    }

    let leverage = match select_leverage(investor, signal) {
        Ok(l) => l,
        Err(motive) => return OpenDecision::Rejected(motive),
    };

    let amount = sizing(investor, risk);
    if !risk_amount(risk, amount) {
        return OpenDecision::Rejected("monto_fuera_riesgo");
    }

    let exec = bar.close;
    let qty = (amount * leverage as f64) / exec.max(1e-12);
    let comm = commission(exec, qty, investor.commission_pct);
    let total_debit = amount + comm;
    if !capital_available(investor, total_debit) {
        return OpenDecision::Rejected("capital_insuficiente");
    }

    let operation = Operation::open_new(
        investor.id,
        signal.strategy_fk,
        signal.id,
        signal.ticker.clone(),
        signal.side,
        exec,
        signal.take_profit_price,
        signal.stop_loss_price,
        qty,
        leverage,
        amount,
        Some(bar.bar_id),
        signal.mult_sl_assigned,
        signal.mult_tp_assigned,
        strategy,
        ts,
    );

    OpenDecision::Candidate(OpenCandidate {
        operation,
        amount,
        commission: comm,
    })
}
