use serde::{Deserialize, Serialize};

/// Strategy parameters governing the closure cascade for one operation.
///
/// All five percentage fields must be `>= 0`; `max_partials >= 0`. Percentages
/// are stored as given (e.g. `2.5` for 2.5%); [`StrategyParams::fractions`]
/// exposes the `/100` form the closure math actually consumes.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct StrategyParams {
    /// Minimum favorable excursion, as a percent of entry, required before
    /// a partial-SL can no longer trigger and profit-protection becomes live.
    pub min_advance_pct: f64,
    /// Retracement-from-peak threshold (percent) for profit-protection.
    pub protection_retrace_pct: f64,
    /// Retracement-from-entry threshold (percent) that triggers partial SL.
    pub partial_retrace_pct: f64,
    /// Fraction of quantity (percent) liquidated by a partial SL.
    pub partial_liquidation_pct: f64,
    /// Retracement-from-entry threshold (percent) for no-advance closure.
    pub no_advance_retrace_pct: f64,
    /// Number of partial liquidations allowed per (parent) operation.
    pub max_partials: u32,
    pub enable_profit_protection: bool,
    pub enable_partial: bool,
    pub enable_retracement_without_advance: bool,
}

impl StrategyParams {
    pub fn new(
        min_advance_pct: f64,
        protection_retrace_pct: f64,
        partial_retrace_pct: f64,
        partial_liquidation_pct: f64,
        no_advance_retrace_pct: f64,
    ) -> Self {
        Self {
            min_advance_pct,
            protection_retrace_pct,
            partial_retrace_pct,
            partial_liquidation_pct,
            no_advance_retrace_pct,
            max_partials: 1,
            enable_profit_protection: true,
            enable_partial: true,
            enable_retracement_without_advance: true,
        }
    }

    pub fn min_advance_frac(&self) -> f64 {
        self.min_advance_pct / 100.0
    }

    pub fn protection_retrace_frac(&self) -> f64 {
        self.protection_retrace_pct / 100.0
    }

    pub fn partial_retrace_frac(&self) -> f64 {
        self.partial_retrace_pct / 100.0
    }

    pub fn fraction_liq_partial(&self) -> f64 {
        self.partial_liquidation_pct / 100.0
    }

    pub fn no_advance_retrace_frac(&self) -> f64 {
        self.no_advance_retrace_pct / 100.0
    }

    /// Returns `true` iff every percentage field is non-negative and
    /// `max_partials` is a valid (always-true for `u32`) count. Kept as an
    /// explicit invariant check rather than relying on the type system, since
    /// these values round-trip through persistence and config files.
    pub fn is_valid(&self) -> bool {
        self.min_advance_pct >= 0.0
            && self.protection_retrace_pct >= 0.0
            && self.partial_retrace_pct >= 0.0
            && self.partial_liquidation_pct >= 0.0
            && self.no_advance_retrace_pct >= 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fractions_are_percent_over_100() {
        let sp = StrategyParams::new(2.0, 50.0, 50.0, 50.0, 1.0);
        assert_eq!(sp.min_advance_frac(), 0.02);
        assert_eq!(sp.protection_retrace_frac(), 0.5);
        assert_eq!(sp.fraction_liq_partial(), 0.5);
    }

    #[test]
    fn defaults_enable_all_behaviors_with_one_partial() {
        let sp = StrategyParams::new(0.0, 0.0, 0.0, 0.0, 0.0);
        assert_eq!(sp.max_partials, 1);
        assert!(sp.enable_profit_protection);
        assert!(sp.enable_partial);
        assert!(sp.enable_retracement_without_advance);
    }
}
