//! Leverage selection (spec §4.7 step 4), with the exact fallback chain
//! recovered from `original_source/simulator_core.py::_seleccionar_apalancamiento`:
//! the investor-leverage path always has a floor of `1` and never rejects;
//! only the signal-provided path can reject with `apalancamiento_cero`.

use backsim_models::{Investor, LeveragePolicy, SignalRecord};

pub fn select_leverage(investor: &Investor, signal: &SignalRecord) -> Result<i64, &'static str> {
    match investor.leverage_policy {
        LeveragePolicy::UseSignalLeverage => {
            if signal.leverage_calculated <= 0 {
                Err("apalancamiento_cero")
            } else {
                Ok(signal.leverage_calculated)
            }
        }
        LeveragePolicy::Fixed => Ok(investor
            .investor_leverage
            .filter(|l| *l > 0)
            .or(investor.max_leverage.filter(|l| *l > 0))
            .unwrap_or(1)),
    }
}
