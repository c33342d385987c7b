//! Exchange interface: trading operations and structured error types.
//!
//! The `Exchange` trait abstracts the derivatives venue so the position
//! manager and the cycle runner can be driven by a mock in tests. Calls are
//! blocking; any non-success response code surfaces as `ExchangeError::Api`
//! and is treated by callers as a recoverable-per-symbol failure.

pub mod bybit;

use crate::domain::{Bar, OrderSide};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use bybit::BybitClient;

#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("exchange rejected request (retCode {code}): {message}")]
    Api { code: i64, message: String },

    #[error("unexpected response shape: {0}")]
    ResponseFormat(String),

    #[error("missing API credentials ({0})")]
    MissingCredentials(String),
}

impl From<reqwest::Error> for ExchangeError {
    fn from(err: reqwest::Error) -> Self {
        ExchangeError::Transport(err.to_string())
    }
}

/// What kind of order to place, with its price parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum OrderType {
    /// Fill immediately at market.
    Market,
    /// Rest at the limit price (GTC).
    Limit { price: f64 },
    /// Market order armed at a trigger price.
    StopMarket { trigger_price: f64 },
}

/// An order to submit. Quantity is pre-formatted to the symbol's step so no
/// float formatting surprises reach the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequest {
    pub symbol: String,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub qty: String,
    pub reduce_only: bool,
}

/// Acknowledgement of an accepted order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderAck {
    pub order_id: String,
}

/// Exchange-reported order lifecycle states.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    New,
    PartiallyFilled,
    Filled,
    Triggered,
    Untriggered,
    Cancelled,
    Rejected,
    Deactivated,
    NotFound,
    Other(String),
}

impl OrderStatus {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "New" => OrderStatus::New,
            "PartiallyFilled" => OrderStatus::PartiallyFilled,
            "Filled" => OrderStatus::Filled,
            "Triggered" => OrderStatus::Triggered,
            "Untriggered" => OrderStatus::Untriggered,
            "Cancelled" => OrderStatus::Cancelled,
            "Rejected" => OrderStatus::Rejected,
            "Deactivated" => OrderStatus::Deactivated,
            other => OrderStatus::Other(other.to_string()),
        }
    }
}

/// Structural kind of an exchange-side order, for bracket reconstruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderKind {
    Limit,
    Market,
}

/// An order as reported by open-order or history queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenOrder {
    pub order_id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub kind: OrderKind,
    pub qty: f64,
    pub price: Option<f64>,
    pub trigger_price: Option<f64>,
    pub reduce_only: bool,
    pub status: OrderStatus,
}

/// An exchange-side position row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionInfo {
    pub symbol: String,
    pub side: OrderSide,
    pub size: f64,
    pub avg_price: f64,
    pub take_profit: Option<f64>,
    pub stop_loss: Option<f64>,
}

/// Blocking exchange operations the core depends on.
pub trait Exchange: Send + Sync {
    /// Candles in ascending timestamp order (transports returning
    /// newest-first must reverse before returning).
    fn fetch_ohlcv(&self, symbol: &str, interval: &str, limit: u32)
        -> Result<Vec<Bar>, ExchangeError>;

    fn place_order(&self, request: &OrderRequest) -> Result<OrderAck, ExchangeError>;

    fn cancel_order(&self, symbol: &str, order_id: &str) -> Result<(), ExchangeError>;

    fn get_open_orders(&self, symbol: &str) -> Result<Vec<OpenOrder>, ExchangeError>;

    /// Look up one order among the open set.
    fn find_open_order(
        &self,
        symbol: &str,
        order_id: &str,
    ) -> Result<Option<OpenOrder>, ExchangeError> {
        Ok(self
            .get_open_orders(symbol)?
            .into_iter()
            .find(|o| o.order_id == order_id))
    }

    /// Terminal-state lookup once an order left the open set.
    fn order_history_status(
        &self,
        symbol: &str,
        order_id: &str,
    ) -> Result<Option<OrderStatus>, ExchangeError>;

    /// Positions for one symbol, or for the whole USDT settle universe.
    fn get_positions(&self, symbol: Option<&str>) -> Result<Vec<PositionInfo>, ExchangeError>;

    fn set_leverage(&self, symbol: &str, leverage: u32) -> Result<(), ExchangeError>;
}
