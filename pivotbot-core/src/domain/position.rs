//! Open position and its protective OCO bracket pair.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::signal::Signal;

/// Order side as the exchange understands it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn opposite(&self) -> Self {
        match self {
            OrderSide::Buy => OrderSide::Sell,
            OrderSide::Sell => OrderSide::Buy,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "Buy",
            OrderSide::Sell => "Sell",
        }
    }
}

impl Signal {
    /// Entry side for this direction.
    pub fn entry_side(&self) -> OrderSide {
        match self {
            Signal::Long => OrderSide::Buy,
            Signal::Short => OrderSide::Sell,
        }
    }

    /// Side of the closing / bracket orders (opposite of entry).
    pub fn exit_side(&self) -> OrderSide {
        self.entry_side().opposite()
    }
}

/// Take-profit / stop-loss order pair emulating one-cancels-other.
///
/// Invariant: while `active`, at most one leg may be observed filled; the
/// moment either is, the sibling is cancelled exactly once and `active`
/// flips to false.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcoPair {
    pub symbol: String,
    pub tp_order_id: String,
    pub sl_order_id: String,
    pub active: bool,
}

/// An open position tracked by the position manager.
///
/// At most one per symbol. Lives in process memory only; after a restart it
/// is reconstructed from exchange-side positions and open orders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub direction: Signal,
    pub entry_price: f64,
    pub quantity: f64,
    pub take_profit: Option<f64>,
    pub stop_loss: Option<f64>,
    pub pct_atr: Option<f64>,
    pub entry_order_id: Option<String>,
    pub oco: Option<OcoPair>,
    pub opened_at: DateTime<Utc>,
}

impl Position {
    pub fn is_long(&self) -> bool {
        self.direction == Signal::Long
    }

    pub fn is_short(&self) -> bool {
        self.direction == Signal::Short
    }

    pub fn unrealized_pnl(&self, current_price: f64) -> f64 {
        let signed_qty = match self.direction {
            Signal::Long => self.quantity,
            Signal::Short => -self.quantity,
        };
        signed_qty * (current_price - self.entry_price)
    }
}
