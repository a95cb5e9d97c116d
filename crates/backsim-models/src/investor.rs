use serde::{Deserialize, Serialize};

/// How an investor's operations select leverage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LeveragePolicy {
    /// Use whatever leverage the signal carries.
    UseSignalLeverage,
    /// Use a fixed investor leverage, falling back to `max_leverage`, then `1`.
    Fixed,
}

/// One investor's account state for the duration of a simulation run.
///
/// Mutated only by the Simulator Core. `halted` is terminal for the run;
/// `desynchronized` implies `halted` (see [`Investor::mark_desynchronized`]).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Investor {
    pub id: i64,
    pub capital_initial: f64,
    pub capital_current: f64,

    pub operations_today: u32,
    pub max_daily: u32,
    pub max_concurrent: u32,
    pub day_current: Option<i64>,

    pub slippage_open_pct: f64,
    pub slippage_close_pct: f64,
    pub commission_pct: f64,

    pub drawdown_max_pct: f64,
    pub drawdown_active: bool,
    pub realized_pnl_accumulated: f64,

    pub halted: bool,
    pub desynchronized: bool,

    pub leverage_policy: LeveragePolicy,
    pub investor_leverage: Option<i64>,
    pub max_leverage: Option<i64>,
}

impl Investor {
    pub fn new(id: i64, capital_initial: f64) -> Self {
        Self {
            id,
            capital_initial,
            capital_current: capital_initial,
            operations_today: 0,
            max_daily: 50,
            max_concurrent: 20,
            day_current: None,
            slippage_open_pct: 0.0,
            slippage_close_pct: 0.0,
            commission_pct: 0.0,
            drawdown_max_pct: 0.0,
            drawdown_active: false,
            realized_pnl_accumulated: 0.0,
            halted: false,
            desynchronized: false,
            leverage_policy: LeveragePolicy::Fixed,
            investor_leverage: None,
            max_leverage: None,
        }
    }

    /// Day-rollover: resets `operations_today` exactly once per calendar day
    /// (`day = ts // 1440`). A `None` `day_current` always counts as a change.
    pub fn reset_day_if_changed(&mut self, day: i64) {
        if self.day_current != Some(day) {
            self.day_current = Some(day);
            self.operations_today = 0;
        }
    }

    pub fn register_realized_pnl(&mut self, pnl_net: f64) {
        self.realized_pnl_accumulated += pnl_net;
    }

    /// Soft-halt trip: `-realized_pnl_accumulated >= capital_initial * drawdown_max_pct/100`.
    /// A `drawdown_max_pct <= 0` disables the check entirely.
    pub fn check_drawdown(&mut self) {
        if self.drawdown_max_pct <= 0.0 {
            return;
        }
        let loss_limit = self.capital_initial * (self.drawdown_max_pct / 100.0);
        if -self.realized_pnl_accumulated >= loss_limit {
            self.drawdown_active = true;
        }
    }

    /// Hard-halt on a persistence failure. `desynchronized` implies `halted`.
    pub fn mark_desynchronized(&mut self) {
        self.desynchronized = true;
        self.halted = true;
    }

    pub fn debit(&mut self, amount: f64) {
        self.capital_current -= amount;
        if self.capital_current < 0.0 {
            self.capital_current = 0.0;
        }
    }

    pub fn credit(&mut self, amount: f64) {
        self.capital_current += amount;
    }
}
