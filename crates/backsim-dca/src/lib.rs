//! Dollar-cost-average adds onto an existing open operation (spec §4.6).

use backsim_fees::{apply_slippage, commission, SlippageDirection};
use backsim_models::{Investor, Operation, RiskConfig};
use backsim_validations::dca_op_cap;

/// Outcome of [`apply_dca`].
#[derive(Clone, Debug)]
pub enum DcaOutcome {
    Applied {
        exec_price: f64,
        qty_extra: f64,
        commission: f64,
        new_entry: f64,
    },
    Rejected {
        motive: &'static str,
    },
}

/// Adds `add_amount` of new margin to `op` at `base_price`, recomputing a
/// weighted-average entry. `op` and `investor` are mutated only when the add
/// is accepted.
///
/// Order of checks (spec §4.6): op-level size cap, then capital for the
/// notional, then capital for notional plus commission — each failure short
/// circuits with its own rejection motive.
pub fn apply_dca(op: &mut Operation, base_price: f64, add_amount: f64, investor: &mut Investor, risk: &RiskConfig) -> DcaOutcome {
    if !dca_op_cap(op, risk, add_amount) {
        return DcaOutcome::Rejected {
            motive: "limite_tamano_operacion",
        };
    }

    let exec_price = apply_slippage(base_price, op.side, investor.slippage_open_pct, SlippageDirection::Entry);
    let qty_extra = (add_amount * op.leverage as f64) / exec_price;

    if investor.capital_current < add_amount {
        return DcaOutcome::Rejected { motive: "sin_capital" };
    }

    let comm = commission(exec_price, qty_extra, investor.commission_pct);
    if investor.capital_current < add_amount + comm {
        return DcaOutcome::Rejected {
            motive: "sin_capital_comision",
        };
    }

    let qty_before = op.quantity;
    let new_entry = (op.entry_price * qty_before + exec_price * qty_extra) / (qty_before + qty_extra);

    op.entry_price = new_entry;
    op.quantity = qty_before + qty_extra;
    op.invested_capital += add_amount;
    op.blocked_capital += add_amount;
    op.accumulated_commissions += comm;

    investor.debit(add_amount + comm);

    DcaOutcome::Applied {
        exec_price,
        qty_extra,
        commission: comm,
        new_entry,
    }
}
