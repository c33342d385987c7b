//! Indicator engine: pure functions from a bar series to aligned value series.
//!
//! Conventions shared by every indicator:
//! - output has the same length as the input bar series
//! - values before the warm-up window are `f64::NAN`, never zero
//! - NaN inputs yield NaN outputs at the affected indices
//!
//! Downstream comparisons rely on IEEE semantics: any comparison against NaN
//! is false, so undefined values can never fire a signal.

pub mod atr;
pub mod donchian;
pub mod envelope;
pub mod rsi;
pub mod sma;
pub mod zscale;

pub use atr::{atr, true_range};
pub use donchian::{donchian, DonchianSeries};
pub use envelope::{nadaraya_watson, EnvelopeSeries};
pub use rsi::rsi;
pub use sma::{sma, sma_trend, Trend};
pub use zscale::z_series;

/// Create synthetic bars from close prices for testing.
///
/// Generates plausible OHLV: open = prev_close (or close for first bar),
/// high = max(open,close) + 1.0, low = min(open,close) - 1.0, volume = 1000.
#[cfg(test)]
pub fn make_bars(closes: &[f64]) -> Vec<crate::domain::Bar> {
    use crate::domain::Bar;
    use chrono::{Duration, TimeZone, Utc};
    let base = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            let high = open.max(close) + 1.0;
            let low = open.min(close) - 1.0;
            Bar {
                symbol: "TEST".to_string(),
                ts: base + Duration::minutes(15 * i as i64),
                open,
                high,
                low,
                close,
                volume: 1000.0,
            }
        })
        .collect()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
