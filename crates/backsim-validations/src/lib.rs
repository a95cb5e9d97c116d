//! Pure predicates over `Investor`/`RiskConfig`/`Operation` (spec §4.3).
//!
//! Every function here is a total, side-effect-free `bool` — callers decide
//! what to do with a `false` (usually: log a rejection and drop the signal).

use backsim_models::{Investor, Operation, RiskConfig};

/// `operations_today < max_daily`. A `max_daily == 0` means "no cap".
pub fn limits_investor(inv: &Investor) -> bool {
    if inv.max_daily == 0 {
        return true;
    }
    inv.operations_today < inv.max_daily
}

/// `current_open < max_concurrent`. A `max_concurrent == 0` means "no cap".
pub fn max_open(inv: &Investor, current_open: u32) -> bool {
    if inv.max_concurrent == 0 {
        return true;
    }
    current_open < inv.max_concurrent
}

/// `size_min <= amount <= size_max`.
pub fn risk_amount(risk: &RiskConfig, amount: f64) -> bool {
    amount >= risk.size_min && amount <= risk.size_max
}

/// `current_capital >= required`.
pub fn capital_available(inv: &Investor, required: f64) -> bool {
    inv.capital_current >= required
}

/// `invested_capital + add_amount <= size_max`.
pub fn dca_op_cap(op: &Operation, risk: &RiskConfig, add_amount: f64) -> bool {
    op.invested_capital + add_amount <= risk.size_max
}

#[cfg(test)]
mod tests {
    use super::*;
    use backsim_fees::Side;
    use backsim_models::StrategyParams;

    fn investor() -> Investor {
        let mut inv = Investor::new(1, 1_000.0);
        inv.max_daily = 2;
        inv.max_concurrent = 1;
        inv
    }

    #[test]
    fn daily_cap_blocks_at_limit() {
        let mut inv = investor();
        assert!(limits_investor(&inv));
        inv.operations_today = 2;
        assert!(!limits_investor(&inv));
    }

    #[test]
    fn max_open_blocks_at_limit() {
        let inv = investor();
        assert!(max_open(&inv, 0));
        assert!(!max_open(&inv, 1));
    }

    #[test]
    fn risk_amount_enforces_both_bounds() {
        let risk = RiskConfig { risk_max_pct: 2.0, size_min: 100.0, size_max: 500.0 };
        assert!(!risk_amount(&risk, 50.0));
        assert!(risk_amount(&risk, 100.0));
        assert!(risk_amount(&risk, 500.0));
        assert!(!risk_amount(&risk, 501.0));
    }

    #[test]
    fn dca_cap_checks_combined_invested() {
        let risk = RiskConfig { risk_max_pct: 2.0, size_min: 100.0, size_max: 500.0 };
        let op = Operation::open_new(
            1, 1, 1, "BTC", Side::Long, 100.0, 110.0, 90.0, 2.0, 1, 400.0, None, 1.0, 1.0,
            StrategyParams::new(2.0, 50.0, 50.0, 50.0, 1.0), 0,
        );
        assert!(dca_op_cap(&op, &risk, 100.0));
        assert!(!dca_op_cap(&op, &risk, 101.0));
    }
}
