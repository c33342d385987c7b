//! Position sizing: risk budget over bracket distance, rounded per symbol.
//!
//! quantity = round(risk / (stop_multiplier × atr), precision)
//!
//! The stop multiplier matches the bracket distance so the quantity risks
//! approximately the configured budget when the stop is hit. Precision may
//! be negative (round to tens/hundreds) and is never defaulted — a wrong
//! quantity step gets the order rejected by the exchange.

use crate::config::{ConfigError, Settings};

/// Bracket distance in ATRs; shared with TP/SL level calculation.
pub const STOP_MULTIPLIER: f64 = 3.0;

/// Round to a decimal precision; negative precision rounds to tens/hundreds.
pub fn round_to(value: f64, precision: i32) -> f64 {
    let factor = 10f64.powi(precision);
    (value * factor).round() / factor
}

/// Compute the order quantity for a symbol at the given ATR.
pub fn position_size(symbol: &str, atr_value: f64, settings: &Settings) -> Result<f64, ConfigError> {
    let precision = settings.qty_precision(symbol)?;
    let risk = settings.risk_for(symbol);
    let raw = risk / (STOP_MULTIPLIER * atr_value);
    Ok(round_to(raw, precision))
}

/// Render a quantity the way the exchange expects it in order payloads.
/// Re-rounds to the precision first so sizes read back from the exchange
/// (which may carry float noise) format cleanly.
pub fn format_quantity(quantity: f64, precision: i32) -> String {
    if precision > 0 {
        format!("{:.*}", precision as usize, quantity)
    } else {
        format!("{:.0}", round_to(quantity, precision))
    }
}
