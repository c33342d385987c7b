//! Relative Strength Index (RSI).
//!
//! Rolling simple means of gains and losses (not Wilder smoothing — parity
//! with the production series requires plain rolling averages).
//! RSI = 100 - 100 / (1 + avg_gain / avg_loss).
//! Edge cases: avg_loss == 0 with gains → 100 (treated as "no losses",
//! not a division error); no movement at all → undefined.

use crate::domain::Bar;

pub fn rsi(bars: &[Bar], window: usize) -> Vec<f64> {
    let n = bars.len();
    let mut out = vec![f64::NAN; n];

    if n == 0 || window == 0 {
        return out;
    }

    // Signed deltas; index 0 has no previous close.
    let mut gains = vec![f64::NAN; n];
    let mut losses = vec![f64::NAN; n];
    for i in 1..n {
        let curr = bars[i].close;
        let prev = bars[i - 1].close;
        if curr.is_nan() || prev.is_nan() {
            continue;
        }
        let delta = curr - prev;
        gains[i] = if delta > 0.0 { delta } else { 0.0 };
        losses[i] = if delta < 0.0 { -delta } else { 0.0 };
    }

    // Rolling means over the trailing `window` deltas; first valid at
    // index `window` (deltas start at index 1).
    for i in window..n {
        let start = i + 1 - window;
        let mut gain_sum = 0.0;
        let mut loss_sum = 0.0;
        let mut valid = true;
        for j in start..=i {
            if gains[j].is_nan() || losses[j].is_nan() {
                valid = false;
                break;
            }
            gain_sum += gains[j];
            loss_sum += losses[j];
        }
        if !valid {
            continue;
        }
        let avg_gain = gain_sum / window as f64;
        let avg_loss = loss_sum / window as f64;
        out[i] = compute_rsi(avg_gain, avg_loss);
    }

    out
}

fn compute_rsi(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 && avg_gain == 0.0 {
        f64::NAN // no movement in the window
    } else if avg_loss == 0.0 {
        100.0
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }
}
