use backsim_models::Side;

/// `porc_sl`/`porc_tp` persisted alongside each operation (spec §6): the
/// distance from entry to SL/TP expressed as a sign-aware, never-negative
/// percentage, rounded to two decimals.
///
/// Grounded in `original_source/persistence.py::_calc_porcentajes`: for LONG,
/// `porc_sl = round((entry-sl)/entry*100, 2)`; SHORT mirrors the subtraction
/// order. A non-positive SL/TP clamps the result to `0.0`.
pub fn porc_sl(side: Side, entry: f64, sl: f64) -> f64 {
    if sl <= 0.0 || entry == 0.0 {
        return 0.0;
    }
    let raw = match side {
        Side::Long => (entry - sl) / entry * 100.0,
        Side::Short => (sl - entry) / entry * 100.0,
    };
    round2(raw.max(0.0))
}

pub fn porc_tp(side: Side, entry: f64, tp: f64) -> f64 {
    if tp <= 0.0 || entry == 0.0 {
        return 0.0;
    }
    let raw = match side {
        Side::Long => (tp - entry) / entry * 100.0,
        Side::Short => (entry - tp) / entry * 100.0,
    };
    round2(raw.max(0.0))
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_porc_sl_and_tp() {
        assert_eq!(porc_sl(Side::Long, 100.0, 90.0), 10.0);
        assert_eq!(porc_tp(Side::Long, 100.0, 110.0), 10.0);
    }

    #[test]
    fn short_porc_sl_and_tp_mirror_subtraction_order() {
        assert_eq!(porc_sl(Side::Short, 100.0, 110.0), 10.0);
        assert_eq!(porc_tp(Side::Short, 100.0, 90.0), 10.0);
    }

    #[test]
    fn non_positive_sl_clamps_to_zero() {
        assert_eq!(porc_sl(Side::Long, 100.0, 0.0), 0.0);
        assert_eq!(porc_sl(Side::Long, 100.0, -5.0), 0.0);
    }
}
