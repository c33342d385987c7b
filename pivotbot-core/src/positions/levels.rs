//! Bracket levels: take-profit and stop-loss at a fixed ATR distance.

use crate::domain::Signal;
use crate::sizing::{round_to, STOP_MULTIPLIER};

/// TP/SL price pair for a new position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BracketLevels {
    pub take_profit: f64,
    pub stop_loss: f64,
}

/// Symmetric bracket around the entry: `entry ± STOP_MULTIPLIER × atr`,
/// rounded to the symbol's price precision. Longs take profit above and
/// stop below; shorts mirror.
pub fn calculate_levels(
    direction: Signal,
    entry_price: f64,
    atr_value: f64,
    price_precision: i32,
) -> BracketLevels {
    let distance = STOP_MULTIPLIER * atr_value;
    let (tp, sl) = match direction {
        Signal::Long => (entry_price + distance, entry_price - distance),
        Signal::Short => (entry_price - distance, entry_price + distance),
    };
    BracketLevels {
        take_profit: round_to(tp, price_precision),
        stop_loss: round_to(sl, price_precision),
    }
}
