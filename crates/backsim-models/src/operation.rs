use serde::{Deserialize, Serialize};

use backsim_fees::Side;

use crate::strategy::StrategyParams;

/// Lifecycle state of an [`Operation`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationState {
    Open,
    ClosedTotal,
    ClosedPartial,
}

/// A single directional position (spec §3 "Operation").
///
/// `id` is `None` until persistence assigns one on insert. `blocked_capital`
/// is kept equal to `invested_capital` at all times, tracked as a separate
/// field purely for audit parity with the persisted schema.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub id: Option<i64>,
    pub investor_fk: i64,
    pub strategy_fk: i64,
    pub signal_fk: i64,
    pub ticker: String,
    pub side: Side,

    pub entry_price: f64,
    pub take_profit: f64,
    pub stop_loss: f64,
    pub quantity: f64,
    pub leverage: i64,
    pub invested_capital: f64,
    pub blocked_capital: f64,

    pub price_max: f64,
    pub price_min: f64,

    pub open: bool,
    pub state: OperationState,
    pub partials_done: u32,
    pub timestamp_open: Option<i64>,
    pub timestamp_close: Option<i64>,
    pub last_exec_close_price: Option<f64>,

    pub accumulated_commissions: f64,
    pub realized_pnl: f64,
    pub opening_bar_id: Option<i64>,

    pub is_child: bool,
    pub parent_op_id: Option<i64>,
    pub allows_partial: bool,

    pub mult_sl_assigned: f64,
    pub mult_tp_assigned: f64,

    pub strategy: StrategyParams,

    /// Set once a partial SL has fired against this operation. Informational
    /// (the actual gate is `partials_done < strategy.max_partials`).
    pub partial_previously_liquidated: bool,
}

/// Result of [`Operation::close_partial_spawn_child`]: what the caller must
/// settle (capital credit, indexing, persistence, logging) after the parent
/// has already mutated itself.
pub struct PartialClose {
    pub qty_liq: f64,
    pub pnl_partial_net: f64,
    pub capital_liq: f64,
    pub child: Operation,
}

impl Operation {
    /// Builds a freshly-opened parent operation with extremes initialized to
    /// `entry_price` (spec: "`±∞` sentinels... become `entry_price` after
    /// `init_extremes`").
    #[allow(clippy::too_many_arguments)]
    pub fn open_new(
        investor_fk: i64,
        strategy_fk: i64,
        signal_fk: i64,
        ticker: impl Into<String>,
        side: Side,
        entry_price: f64,
        take_profit: f64,
        stop_loss: f64,
        quantity: f64,
        leverage: i64,
        invested_capital: f64,
        opening_bar_id: Option<i64>,
        mult_sl_assigned: f64,
        mult_tp_assigned: f64,
        strategy: StrategyParams,
        timestamp_open: i64,
    ) -> Self {
        Self {
            id: None,
            investor_fk,
            strategy_fk,
            signal_fk,
            ticker: ticker.into(),
            side,
            entry_price,
            take_profit,
            stop_loss,
            quantity,
            leverage,
            invested_capital,
            blocked_capital: invested_capital,
            price_max: entry_price,
            price_min: entry_price,
            open: true,
            state: OperationState::Open,
            partials_done: 0,
            timestamp_open: Some(timestamp_open),
            timestamp_close: None,
            last_exec_close_price: None,
            accumulated_commissions: 0.0,
            realized_pnl: 0.0,
            opening_bar_id,
            is_child: false,
            parent_op_id: None,
            allows_partial: true,
            mult_sl_assigned,
            mult_tp_assigned,
            strategy,
            partial_previously_liquidated: false,
        }
    }

    /// Re-seats extremes to "never observed" (`±∞`). Only used by callers
    /// that build an `Operation` outside [`Operation::open_new`] (e.g. test
    /// fixtures) and want the sentinel semantics spec.md §3 describes.
    pub fn init_extremes(&mut self) {
        self.price_max = self.entry_price;
        self.price_min = self.entry_price;
    }

    pub fn update_extremes(&mut self, high: f64, low: f64) {
        if high > self.price_max {
            self.price_max = high;
        }
        if low < self.price_min {
            self.price_min = low;
        }
    }

    pub fn min_advance_reached(&self) -> bool {
        match self.side {
            Side::Long => self.price_max >= self.entry_price * (1.0 + self.strategy.min_advance_frac()),
            Side::Short => self.price_min <= self.entry_price * (1.0 - self.strategy.min_advance_frac()),
        }
    }

    pub fn any_advance(&self) -> bool {
        match self.side {
            Side::Long => self.price_max > self.entry_price,
            Side::Short => self.price_min < self.entry_price,
        }
    }

    pub fn no_advance(&self) -> bool {
        !self.any_advance()
    }

    /// Retracement from entry, expressed as a fraction. Uses the supplied
    /// `low`/`high` of the current bar when given, else falls back to the
    /// running extreme.
    pub fn retracement_from_entry(&self, low: Option<f64>, high: Option<f64>) -> f64 {
        match self.side {
            Side::Long => (self.entry_price - low.unwrap_or(self.price_min)) / self.entry_price,
            Side::Short => (high.unwrap_or(self.price_max) - self.entry_price) / self.entry_price,
        }
    }

    /// Ratio of retracement-from-peak to total-advance-from-entry; `0` if the
    /// position never advanced past entry.
    pub fn retracement_protection_ratio(&self, low: Option<f64>, high: Option<f64>) -> f64 {
        match self.side {
            Side::Long => {
                if self.price_max <= self.entry_price {
                    return 0.0;
                }
                let retro = self.price_max - low.unwrap_or(self.price_min);
                let total = self.price_max - self.entry_price;
                retro / total
            }
            Side::Short => {
                if self.price_min >= self.entry_price {
                    return 0.0;
                }
                let retro = high.unwrap_or(self.price_max) - self.price_min;
                let total = self.entry_price - self.price_min;
                retro / total
            }
        }
    }

    fn pnl_gross(&self, exit_price: f64, qty: f64) -> f64 {
        match self.side {
            Side::Long => (exit_price - self.entry_price) * qty,
            Side::Short => (self.entry_price - exit_price) * qty,
        }
    }

    /// Full closure at `exec_price`. Returns the net realized P&L of this
    /// closure (gross minus exit commission). No-op (returns `0.0`) if the
    /// operation is already closed.
    pub fn close_total(&mut self, exec_price: f64, exit_commission: f64, ts: i64) -> f64 {
        if !self.open {
            return 0.0;
        }
        let gross = self.pnl_gross(exec_price, self.quantity);
        let pnl_net = gross - exit_commission;
        self.realized_pnl += pnl_net;
        self.accumulated_commissions += exit_commission;
        self.quantity = 0.0;
        self.open = false;
        self.state = OperationState::ClosedTotal;
        self.timestamp_close = Some(ts);
        self.last_exec_close_price = Some(exec_price);
        pnl_net
    }

    /// Partial closure: liquidates `quantity * strategy.fraction_liq_partial()`
    /// and spawns a child carrying the remainder. Returns `None` if the
    /// computed liquidation quantity is non-positive (nothing to do).
    pub fn close_partial_spawn_child(
        &mut self,
        exec_price: f64,
        exit_commission: f64,
        ts: i64,
    ) -> Option<PartialClose> {
        let qty_before = self.quantity;
        let qty_liq = qty_before * self.strategy.fraction_liq_partial();
        if qty_liq <= 0.0 {
            return None;
        }

        let gross = self.pnl_gross(exec_price, qty_liq);
        let pnl_partial_net = gross - exit_commission;
        let proportion_liq = qty_liq / qty_before;
        let capital_liq = self.invested_capital * proportion_liq;
        let capital_remaining = self.invested_capital - capital_liq;

        self.accumulated_commissions += exit_commission;
        self.realized_pnl += pnl_partial_net;
        self.quantity = 0.0;
        self.open = false;
        self.state = OperationState::ClosedPartial;
        self.partials_done += 1;
        self.timestamp_close = Some(ts);
        self.last_exec_close_price = Some(exec_price);
        self.partial_previously_liquidated = true;

        let child = Operation {
            id: None,
            investor_fk: self.investor_fk,
            strategy_fk: self.strategy_fk,
            signal_fk: self.signal_fk,
            ticker: self.ticker.clone(),
            side: self.side,
            entry_price: self.entry_price,
            take_profit: self.take_profit,
            stop_loss: self.stop_loss,
            quantity: qty_before - qty_liq,
            leverage: self.leverage,
            invested_capital: capital_remaining,
            blocked_capital: capital_remaining,
            price_max: self.price_max,
            price_min: self.price_min,
            open: true,
            state: OperationState::Open,
            partials_done: 0,
            timestamp_open: Some(ts),
            timestamp_close: None,
            last_exec_close_price: None,
            accumulated_commissions: 0.0,
            realized_pnl: 0.0,
            opening_bar_id: self.opening_bar_id,
            is_child: true,
            parent_op_id: self.id,
            allows_partial: false,
            mult_sl_assigned: self.mult_sl_assigned,
            mult_tp_assigned: self.mult_tp_assigned,
            strategy: self.strategy,
            partial_previously_liquidated: false,
        };

        Some(PartialClose {
            qty_liq,
            pnl_partial_net,
            capital_liq,
            child,
        })
    }

    /// Mark-to-market P&L against `current_price`; `0` if closed or flat.
    pub fn unrealized_pnl(&self, current_price: f64) -> f64 {
        if !self.open || self.quantity <= 0.0 {
            return 0.0;
        }
        self.pnl_gross(current_price, self.quantity)
    }

    pub fn exposure(&self) -> f64 {
        self.quantity * self.entry_price
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strategy() -> StrategyParams {
        StrategyParams::new(2.0, 50.0, 50.0, 50.0, 1.0)
    }

    fn long_op() -> Operation {
        Operation::open_new(
            1, 1, 1, "BTC", Side::Long, 100.0, 110.0, 90.0, 2.0, 1, 200.0, Some(1), 1.0, 1.0,
            strategy(), 0,
        )
    }

    #[test]
    fn extremes_init_to_entry_price() {
        let op = long_op();
        assert_eq!(op.price_max, 100.0);
        assert_eq!(op.price_min, 100.0);
    }

    #[test]
    fn extremes_are_monotonic_across_bars() {
        let mut op = long_op();
        op.update_extremes(105.0, 98.0);
        op.update_extremes(102.0, 99.0);
        assert_eq!(op.price_max, 105.0);
        assert_eq!(op.price_min, 98.0);
    }

    #[test]
    fn close_total_computes_net_pnl_and_closes() {
        let mut op = long_op();
        let net = op.close_total(110.0, 2.0, 5);
        assert_eq!(net, (110.0 - 100.0) * 2.0 - 2.0);
        assert!(!op.open);
        assert_eq!(op.quantity, 0.0);
        assert_eq!(op.state, OperationState::ClosedTotal);
    }

    #[test]
    fn partial_close_conserves_quantity_and_capital() {
        let mut op = long_op();
        let qty_before = op.quantity;
        let invested_before = op.invested_capital;
        let out = op.close_partial_spawn_child(95.0, 0.0, 10).unwrap();

        assert_eq!(out.qty_liq + out.child.quantity, qty_before);
        assert_eq!(out.capital_liq + out.child.invested_capital, invested_before);
        assert!(out.child.is_child);
        assert!(!out.child.allows_partial);
        assert_eq!(out.child.parent_op_id, op.id);
        assert_eq!(out.child.price_max, op.price_max);
        assert_eq!(out.child.price_min, op.price_min);
        assert!(!op.open);
        assert_eq!(op.state, OperationState::ClosedPartial);
    }

    #[test]
    fn short_retracement_helpers_mirror_long() {
        let mut op = Operation::open_new(
            1, 1, 1, "BTC", Side::Short, 100.0, 90.0, 110.0, 2.0, 1, 200.0, Some(1), 1.0, 1.0,
            strategy(), 0,
        );
        op.update_extremes(101.0, 95.0);
        assert!(op.any_advance());
        assert!(!op.min_advance_reached());
        let retro = op.retracement_from_entry(None, Some(101.0));
        assert!((retro - 0.01).abs() < 1e-9);
    }
}
