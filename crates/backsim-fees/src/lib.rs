//! Slippage and commission arithmetic (spec §4.1).
//!
//! Leaf crate: no dependency on the rest of the workspace. `Side` lives here
//! rather than in `backsim-models` because every other crate in the stack
//! needs it and this one needs nothing.

use serde::{Deserialize, Serialize};

/// Long or short directional bias of an operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Long,
    Short,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Long => "LONG",
            Side::Short => "SHORT",
        }
    }
}

/// Which leg of a trade a slippage application is for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlippageDirection {
    Entry,
    Exit,
}

/// Moves `price` against the trader by `pct` percent, in the direction
/// appropriate for `side`/`direction`. A non-positive `pct` is a no-op.
///
/// | side  | direction | moves |
/// |-------|-----------|-------|
/// | LONG  | entry     | up    |
/// | LONG  | exit      | down  |
/// | SHORT | entry     | down  |
/// | SHORT | exit      | up    |
pub fn apply_slippage(price: f64, side: Side, pct: f64, direction: SlippageDirection) -> f64 {
    if pct <= 0.0 {
        return price;
    }
    let factor = pct / 100.0;
    match (side, direction) {
        (Side::Long, SlippageDirection::Entry) => price * (1.0 + factor),
        (Side::Long, SlippageDirection::Exit) => price * (1.0 - factor),
        (Side::Short, SlippageDirection::Entry) => price * (1.0 - factor),
        (Side::Short, SlippageDirection::Exit) => price * (1.0 + factor),
    }
}

/// Flat percentage commission on notional (`price * qty`). Non-positive `pct`
/// yields zero commission.
pub fn commission(price: f64, qty: f64, pct: f64) -> f64 {
    if pct <= 0.0 {
        return 0.0;
    }
    price * qty * (pct / 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_or_negative_slippage_is_noop() {
        assert_eq!(apply_slippage(100.0, Side::Long, 0.0, SlippageDirection::Entry), 100.0);
        assert_eq!(apply_slippage(100.0, Side::Short, -1.0, SlippageDirection::Exit), 100.0);
    }

    #[test]
    fn long_entry_moves_up_long_exit_moves_down() {
        let entry = apply_slippage(100.0, Side::Long, 1.0, SlippageDirection::Entry);
        let exit = apply_slippage(100.0, Side::Long, 1.0, SlippageDirection::Exit);
        assert!(entry > 100.0);
        assert!(exit < 100.0);
    }

    #[test]
    fn short_entry_moves_down_short_exit_moves_up() {
        let entry = apply_slippage(100.0, Side::Short, 1.0, SlippageDirection::Entry);
        let exit = apply_slippage(100.0, Side::Short, 1.0, SlippageDirection::Exit);
        assert!(entry < 100.0);
        assert!(exit > 100.0);
    }

    #[test]
    fn commission_is_flat_pct_of_notional() {
        assert_eq!(commission(100.0, 2.0, 1.0), 2.0);
        assert_eq!(commission(100.0, 2.0, 0.0), 0.0);
        assert_eq!(commission(100.0, 2.0, -5.0), 0.0);
    }
}
