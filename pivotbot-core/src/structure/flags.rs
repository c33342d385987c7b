//! Per-bar signal flags composed from structure state and filters.
//!
//! Reversal-continuation flags (`go_up`/`go_down`) fire at confirmation bars
//! gated by structure labels, the SMA trend (2x family only), envelope
//! position, and the symbol's admissible %ATR band. Breakout/breakdown flags
//! require price closing beyond the last filled opposite pivot; a secondary
//! condition recovers breakouts the primary missed, provided price held on
//! the wrong side of the pivot for the prior ten bars.

use super::labels::{HighStructure, LowStructure};
use super::zigzag::ZigzagSeries;
use crate::indicators::Trend;

/// Prior bars that must sit inside the pivot for the secondary breakout.
const SECONDARY_LOOKBACK: usize = 10;

#[derive(Debug, Clone)]
pub struct StructureFlags {
    pub go_up: Vec<bool>,
    pub go_down: Vec<bool>,
    pub breakout: Vec<bool>,
    pub breakdown: Vec<bool>,
}

/// Filter series shared by both multiplier families.
pub struct FilterContext<'a> {
    pub closes: &'a [f64],
    pub pct_atr: &'a [f64],
    pub nw_upper: &'a [f64],
    pub nw_lower: &'a [f64],
    pub trend: &'a [Trend],
    /// Admissible (low, high) %ATR band for the symbol.
    pub atr_range: (f64, f64),
}

/// Compose flags for one zigzag run.
///
/// `trend_filtered` applies the SMA trend gate (the 2x family);
/// `with_secondary` enables the ten-bar containment breakout (2x only).
pub fn structure_flags(
    zz: &ZigzagSeries,
    high_labels: &[HighStructure],
    low_labels: &[LowStructure],
    ctx: &FilterContext<'_>,
    trend_filtered: bool,
    with_secondary: bool,
) -> StructureFlags {
    let n = ctx.closes.len();
    let (atr_lo, atr_hi) = ctx.atr_range;

    let mut flags = StructureFlags {
        go_up: vec![false; n],
        go_down: vec![false; n],
        breakout: vec![false; n],
        breakdown: vec![false; n],
    };

    for i in 0..n {
        let close = ctx.closes[i];
        let pct_atr = ctx.pct_atr[i];
        let in_band_strict = atr_lo < pct_atr && pct_atr < atr_hi;
        let hl = low_labels[i] == LowStructure::HigherLow;
        let hh = high_labels[i] == HighStructure::HigherHigh;
        let lh = high_labels[i] == HighStructure::LowerHigh;
        let ll = low_labels[i] == LowStructure::LowerLow;

        if zz.low_confirmed[i]
            && hl
            && hh
            && (!trend_filtered || ctx.trend[i] == Trend::Uptrend)
            && close < ctx.nw_upper[i]
            && in_band_strict
        {
            flags.go_up[i] = true;
        }

        if zz.high_confirmed[i]
            && lh
            && ll
            && (!trend_filtered || ctx.trend[i] == Trend::Downtrend)
            && close > ctx.nw_lower[i]
            && in_band_strict
        {
            flags.go_down[i] = true;
        }

        if zz.low_confirmed[i] && hl && !hh && close > zz.high_pivot_filled[i] {
            flags.breakout[i] = true;
        }

        if zz.high_confirmed[i] && lh && !ll && close < zz.low_pivot_filled[i] {
            flags.breakdown[i] = true;
        }
    }

    if with_secondary {
        for i in 0..n {
            let close = ctx.closes[i];
            let pct_atr = ctx.pct_atr[i];
            let in_band = atr_lo <= pct_atr && pct_atr <= atr_hi;
            let hl = low_labels[i] == LowStructure::HigherLow;
            let hh = high_labels[i] == HighStructure::HigherHigh;
            let lh = high_labels[i] == HighStructure::LowerHigh;
            let ll = low_labels[i] == LowStructure::LowerLow;

            if !flags.breakout[i]
                && hl
                && !hh
                && close > zz.high_pivot_filled[i]
                && in_band
                && held_below(ctx.closes, i, zz.high_pivot_filled[i])
            {
                flags.breakout[i] = true;
            }

            if !flags.breakdown[i]
                && lh
                && !ll
                && close < zz.low_pivot_filled[i]
                && in_band
                && held_above(ctx.closes, i, zz.low_pivot_filled[i])
            {
                flags.breakdown[i] = true;
            }
        }
    }

    flags
}

/// All of the prior `SECONDARY_LOOKBACK` closes sit strictly below `level`.
/// Bars before the series start count as failures, not as vacuously true.
fn held_below(closes: &[f64], i: usize, level: f64) -> bool {
    if i < SECONDARY_LOOKBACK {
        return false;
    }
    (1..=SECONDARY_LOOKBACK).all(|k| closes[i - k] < level)
}

fn held_above(closes: &[f64], i: usize, level: f64) -> bool {
    if i < SECONDARY_LOOKBACK {
        return false;
    }
    (1..=SECONDARY_LOOKBACK).all(|k| closes[i - k] > level)
}
