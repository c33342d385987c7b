//! Average True Range (ATR).
//!
//! True Range: max(high-low, |high-prev_close|, |low-prev_close|).
//! TR[0] has no previous close and degrades to high-low.
//! Smoothing is an EMA with alpha = 1/window seeded at TR[0] — the
//! slow-decaying Wilder-style average. The series is defined from bar 0;
//! downstream parity depends on this exact recurrence.

use crate::domain::Bar;

/// Compute the True Range series from bars.
/// TR[0] = high[0] - low[0] (no previous close).
/// TR[t] = max(high[t]-low[t], |high[t]-close[t-1]|, |low[t]-close[t-1]|).
pub fn true_range(bars: &[Bar]) -> Vec<f64> {
    let n = bars.len();
    let mut tr = vec![f64::NAN; n];

    if n == 0 {
        return tr;
    }

    let h = bars[0].high;
    let l = bars[0].low;
    if !h.is_nan() && !l.is_nan() {
        tr[0] = h - l;
    }

    for i in 1..n {
        let h = bars[i].high;
        let l = bars[i].low;
        let pc = bars[i - 1].close;
        if h.is_nan() || l.is_nan() || pc.is_nan() {
            tr[i] = f64::NAN;
        } else {
            tr[i] = (h - l).max((h - pc).abs()).max((l - pc).abs());
        }
    }

    tr
}

/// ATR: EMA of true range with alpha = 1/window, seeded at TR[0].
///
/// A NaN true range leaves a NaN hole in the output; smoothing resumes from
/// the last valid average.
pub fn atr(bars: &[Bar], window: usize) -> Vec<f64> {
    let tr = true_range(bars);
    let n = tr.len();
    let mut out = vec![f64::NAN; n];

    if n == 0 || window == 0 {
        return out;
    }

    let alpha = 1.0 / window as f64;
    let mut prev: Option<f64> = None;

    for i in 0..n {
        if tr[i].is_nan() {
            continue;
        }
        let next = match prev {
            None => tr[i],
            Some(p) => alpha * tr[i] + (1.0 - alpha) * p,
        };
        out[i] = next;
        prev = Some(next);
    }

    out
}
