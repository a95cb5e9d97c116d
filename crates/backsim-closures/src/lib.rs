//! Closure cascade (spec §4.5): evaluates one bar against one open operation
//! in fixed precedence, emitting at most one event. The ordering ambiguity
//! noted in spec §9 is resolved here as
//! TP → Partial-SL → total-SL → profit-protection → retracement-without-advance.
//!
//! Callers are expected to have already updated the operation's extremes
//! with this bar's `(high, low)` before calling [`evaluate`] (the Simulator
//! Core loop does this; see spec §4.7 step 3).

use backsim_capital::credit;
use backsim_fees::{apply_slippage, commission, Side, SlippageDirection};
use backsim_models::{Investor, Operation};

/// One closure event, as emitted by the cascade.
#[derive(Clone, Debug)]
pub enum ClosureOutcome {
    Total {
        motive: &'static str,
        exec_price: f64,
        commission: f64,
        pnl_net: f64,
    },
    Partial {
        motive: &'static str,
        exec_price: f64,
        commission: f64,
        pnl_net: f64,
        qty_liq: f64,
        capital_liq: f64,
        child: Box<Operation>,
    },
}

/// Evaluates the closure cascade for `op` against bar `(high, low, close)` at
/// minute `ts`. On a match, mutates `op` and `investor` (capital credit,
/// realized P&L registration, drawdown check) and returns the event. Returns
/// `None` if the engine is halted, the operation is already closed, or no
/// rule matches.
pub fn evaluate(op: &mut Operation, high: f64, low: f64, close: f64, investor: &mut Investor, ts: i64) -> Option<ClosureOutcome> {
    if investor.halted || !op.open {
        return None;
    }

    let tp = op.take_profit;
    let sl = op.stop_loss;

    // 1. Take-Profit.
    let tp_hit = match op.side {
        Side::Long => high >= tp,
        Side::Short => low <= tp,
    };
    if tp_hit {
        return Some(close_total(op, investor, tp, "Take Profit", ts));
    }

    // 2. Partial SL.
    if op.allows_partial
        && !op.is_child
        && op.strategy.enable_partial
        && op.any_advance()
        && !op.min_advance_reached()
        && op.partials_done < op.strategy.max_partials
    {
        let retro = op.retracement_from_entry(Some(low), Some(high));
        if retro >= op.strategy.partial_retrace_frac() {
            if let Some(outcome) = close_partial(op, investor, close, ts) {
                return Some(outcome);
            }
        }
    }

    // 3. Stop-Loss total.
    let sl_hit = match op.side {
        Side::Long => low <= sl,
        Side::Short => high >= sl,
    };
    if sl_hit {
        return Some(close_total(op, investor, sl, "Stop Loss", ts));
    }

    // 4. Profit-protection retracement.
    if op.min_advance_reached() && op.strategy.enable_profit_protection {
        let ratio = op.retracement_protection_ratio(Some(low), Some(high));
        if ratio >= op.strategy.protection_retrace_frac() {
            let motive = match op.side {
                Side::Long => "Retroceso desde máximo",
                Side::Short => "Retroceso desde mínimo",
            };
            return Some(close_total(op, investor, close, motive, ts));
        }
    }

    // 5. Retracement without advance.
    if op.no_advance() && op.strategy.enable_retracement_without_advance && op.allows_partial {
        let retro = op.retracement_from_entry(Some(low), Some(high));
        if retro >= op.strategy.no_advance_retrace_frac() {
            return Some(close_total(op, investor, close, "Retroceso desde entrada (sin avance)", ts));
        }
    }

    None
}

fn close_total(op: &mut Operation, investor: &mut Investor, trigger_price: f64, motive: &'static str, ts: i64) -> ClosureOutcome {
    let exec_price = apply_slippage(trigger_price, op.side, investor.slippage_close_pct, SlippageDirection::Exit);
    let comm = commission(exec_price, op.quantity, investor.commission_pct);
    let invested = op.invested_capital;
    let pnl_net = op.close_total(exec_price, comm, ts);
    credit(investor, invested + pnl_net);
    investor.register_realized_pnl(pnl_net);
    investor.check_drawdown();

    ClosureOutcome::Total {
        motive,
        exec_price,
        commission: comm,
        pnl_net,
    }
}

fn close_partial(op: &mut Operation, investor: &mut Investor, close: f64, ts: i64) -> Option<ClosureOutcome> {
    let exec_price = apply_slippage(close, op.side, investor.slippage_close_pct, SlippageDirection::Exit);
    let qty_partial = op.quantity * op.strategy.fraction_liq_partial();
    let comm = commission(exec_price, qty_partial, investor.commission_pct);

    let partial = op.close_partial_spawn_child(exec_price, comm, ts)?;
    credit(investor, partial.capital_liq + partial.pnl_partial_net);
    investor.register_realized_pnl(partial.pnl_partial_net);
    investor.check_drawdown();

    Some(ClosureOutcome::Partial {
        motive: "Liquidación parcial por SL",
        exec_price,
        commission: comm,
        pnl_net: partial.pnl_partial_net,
        qty_liq: partial.qty_liq,
        capital_liq: partial.capital_liq,
        child: Box::new(partial.child),
    })
}
