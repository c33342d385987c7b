//! Normalized volatility "z": ATR clamped to a symbol-specific band of price.
//!
//! z = min(max(close · pct_min/100, atr_multiplier · atr), close · pct_max/100)
//!
//! The zigzag detector thresholds on z rather than raw ATR so a volatility
//! spike or collapse cannot blow pivot spacing outside the symbol's
//! historically sensible range. A symbol without a registered band is a
//! configuration error — that symbol's whole cycle is abandoned.

use crate::config::{ConfigError, Settings};
use crate::domain::Bar;

pub fn z_series(
    bars: &[Bar],
    atr: &[f64],
    symbol: &str,
    settings: &Settings,
) -> Result<Vec<f64>, ConfigError> {
    let (pct_min, pct_max) = settings.z_range(symbol)?;
    let mult = settings.z_atr_multiplier;

    Ok(bars
        .iter()
        .zip(atr.iter())
        .map(|(bar, &a)| {
            let floor = bar.close * pct_min / 100.0;
            let ceil = bar.close * pct_max / 100.0;
            (floor.max(mult * a)).min(ceil)
        })
        .collect())
}
