//! Simple moving average and the SMA(50)/SMA(200) trend label.

use crate::domain::Bar;
use serde::{Deserialize, Serialize};

/// Trend label from the SMA crossover, recomputed every bar (no hysteresis).
///
/// Undefined SMA values compare false, so the label is `Downtrend` during
/// warm-up — parity with the production labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trend {
    Uptrend,
    Downtrend,
}

pub fn sma(bars: &[Bar], window: usize) -> Vec<f64> {
    let n = bars.len();
    let mut out = vec![f64::NAN; n];

    if window == 0 {
        return out;
    }

    for i in (window.saturating_sub(1))..n {
        if i + 1 < window {
            continue;
        }
        let start = i + 1 - window;
        let mut sum = 0.0;
        let mut valid = true;
        for bar in &bars[start..=i] {
            if bar.close.is_nan() {
                valid = false;
                break;
            }
            sum += bar.close;
        }
        if valid {
            out[i] = sum / window as f64;
        }
    }

    out
}

/// Uptrend iff sma(short) > sma(long), else Downtrend.
pub fn sma_trend(bars: &[Bar], short_window: usize, long_window: usize) -> Vec<Trend> {
    let short = sma(bars, short_window);
    let long = sma(bars, long_window);
    short
        .iter()
        .zip(long.iter())
        .map(|(&s, &l)| if s > l { Trend::Uptrend } else { Trend::Downtrend })
        .collect()
}
