//! Shared scriptable exchange fake for integration tests.
//!
//! Behaves like a tiny matching venue: market entries materialize a position
//! row, reduce-only market orders flatten it, and resting bracket legs sit
//! in the open set until a test script fills or drops them.

use std::collections::HashMap;
use std::sync::Mutex;

use pivotbot_core::domain::Bar;
use pivotbot_core::exchange::{
    Exchange, ExchangeError, OpenOrder, OrderAck, OrderKind, OrderRequest, OrderStatus, OrderType,
    PositionInfo,
};

#[derive(Default)]
pub struct MockState {
    next_id: u64,
    pub bars: HashMap<String, Vec<Bar>>,
    pub positions: Vec<PositionInfo>,
    pub open_orders: Vec<OpenOrder>,
    pub history: HashMap<String, OrderStatus>,
    pub placed: Vec<OrderRequest>,
    pub cancelled: Vec<String>,
    pub leverage_calls: Vec<(String, u32)>,
    /// When false, market entries do not materialize a position (simulates
    /// a fill the venue never reports).
    pub fill_market_entries: bool,
    /// When true, every stop-market placement is rejected.
    pub reject_stop_orders: bool,
    /// Fill price used when a market entry materializes.
    pub fill_price: f64,
}

pub struct MockExchange {
    pub state: Mutex<MockState>,
}

impl MockExchange {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                fill_market_entries: true,
                fill_price: 100.0,
                ..MockState::default()
            }),
        }
    }

    /// Script one resting order as filled: it leaves the open set and shows
    /// up in history, and any position it reduces goes away.
    pub fn fill_order(&self, order_id: &str) {
        let mut state = self.state.lock().unwrap();
        if let Some(idx) = state.open_orders.iter().position(|o| o.order_id == order_id) {
            let order = state.open_orders.remove(idx);
            if order.reduce_only {
                let exit_of = order.side.opposite();
                state
                    .positions
                    .retain(|p| !(p.symbol == order.symbol && p.side == exit_of));
            }
        }
        state.history.insert(order_id.to_string(), OrderStatus::Filled);
    }

    pub fn placed_orders(&self) -> Vec<OrderRequest> {
        self.state.lock().unwrap().placed.clone()
    }

    pub fn cancelled_orders(&self) -> Vec<String> {
        self.state.lock().unwrap().cancelled.clone()
    }
}

impl Exchange for MockExchange {
    fn fetch_ohlcv(
        &self,
        symbol: &str,
        _interval: &str,
        _limit: u32,
    ) -> Result<Vec<Bar>, ExchangeError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .bars
            .get(symbol)
            .cloned()
            .unwrap_or_default())
    }

    fn place_order(&self, request: &OrderRequest) -> Result<OrderAck, ExchangeError> {
        let mut state = self.state.lock().unwrap();
        if state.reject_stop_orders {
            if let OrderType::StopMarket { .. } = request.order_type {
                return Err(ExchangeError::Api {
                    code: 10001,
                    message: "stop order rejected".into(),
                });
            }
        }

        state.next_id += 1;
        let order_id = format!("ord-{}", state.next_id);
        state.placed.push(request.clone());
        let qty: f64 = request.qty.parse().unwrap();

        match request.order_type {
            OrderType::Market if !request.reduce_only => {
                if state.fill_market_entries {
                    let fill_price = state.fill_price;
                    state.positions.push(PositionInfo {
                        symbol: request.symbol.clone(),
                        side: request.side,
                        size: qty,
                        avg_price: fill_price,
                        take_profit: None,
                        stop_loss: None,
                    });
                }
                state.history.insert(order_id.clone(), OrderStatus::Filled);
            }
            OrderType::Market => {
                // Reduce-only market close flattens the opposite-side row.
                let exit_of = request.side.opposite();
                state
                    .positions
                    .retain(|p| !(p.symbol == request.symbol && p.side == exit_of));
                state.history.insert(order_id.clone(), OrderStatus::Filled);
            }
            OrderType::Limit { price } => {
                state.open_orders.push(OpenOrder {
                    order_id: order_id.clone(),
                    symbol: request.symbol.clone(),
                    side: request.side,
                    kind: OrderKind::Limit,
                    qty,
                    price: Some(price),
                    trigger_price: None,
                    reduce_only: request.reduce_only,
                    status: OrderStatus::New,
                });
            }
            OrderType::StopMarket { trigger_price } => {
                state.open_orders.push(OpenOrder {
                    order_id: order_id.clone(),
                    symbol: request.symbol.clone(),
                    side: request.side,
                    kind: OrderKind::Market,
                    qty,
                    price: None,
                    trigger_price: Some(trigger_price),
                    reduce_only: request.reduce_only,
                    status: OrderStatus::Untriggered,
                });
            }
        }

        Ok(OrderAck { order_id })
    }

    fn cancel_order(&self, _symbol: &str, order_id: &str) -> Result<(), ExchangeError> {
        let mut state = self.state.lock().unwrap();
        let Some(idx) = state.open_orders.iter().position(|o| o.order_id == order_id) else {
            return Err(ExchangeError::Api {
                code: 110001,
                message: "order not exists or too late to cancel".into(),
            });
        };
        state.open_orders.remove(idx);
        state.cancelled.push(order_id.to_string());
        state
            .history
            .insert(order_id.to_string(), OrderStatus::Cancelled);
        Ok(())
    }

    fn get_open_orders(&self, symbol: &str) -> Result<Vec<OpenOrder>, ExchangeError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .open_orders
            .iter()
            .filter(|o| o.symbol == symbol)
            .cloned()
            .collect())
    }

    fn order_history_status(
        &self,
        _symbol: &str,
        order_id: &str,
    ) -> Result<Option<OrderStatus>, ExchangeError> {
        Ok(self.state.lock().unwrap().history.get(order_id).cloned())
    }

    fn get_positions(&self, symbol: Option<&str>) -> Result<Vec<PositionInfo>, ExchangeError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .positions
            .iter()
            .filter(|p| symbol.map_or(true, |s| p.symbol == s))
            .cloned()
            .collect())
    }

    fn set_leverage(&self, symbol: &str, leverage: u32) -> Result<(), ExchangeError> {
        self.state
            .lock()
            .unwrap()
            .leverage_calls
            .push((symbol.to_string(), leverage));
        Ok(())
    }
}
