//! Position manager integration tests against the scriptable exchange fake.
//!
//! Covers the lifecycle guarantees: entry verification, bracket-or-flat,
//! one-cancels-other sibling handling, repeat/reversal signals, and restart
//! reconciliation.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::MockExchange;
use pivotbot_core::clock::{NoopSleeper, RetryPolicy};
use pivotbot_core::config::Settings;
use pivotbot_core::domain::{OrderSide, Signal};
use pivotbot_core::exchange::{Exchange, OrderType};
use pivotbot_core::features::Snapshot;
use pivotbot_core::indicators::Trend;
use pivotbot_core::positions::{OcoOutcome, PositionManager, TradeError};

fn manager(exchange: Arc<MockExchange>) -> PositionManager {
    PositionManager::with_sleeper(
        exchange,
        Settings::default(),
        Box::new(NoopSleeper),
        RetryPolicy::new(3, Duration::ZERO),
        Duration::ZERO,
    )
}

fn snapshot(symbol: &str, atr: f64, close: f64) -> Snapshot {
    Snapshot {
        symbol: symbol.into(),
        close,
        atr,
        pct_atr: 0.35,
        rsi: 55.0,
        trend: Trend::Uptrend,
        go_up_2x: false,
        go_down_2x: false,
        breakout_2x: false,
        breakdown_2x: false,
        go_up_3x: false,
        go_down_3x: false,
        breakout_3x: false,
        breakdown_3x: false,
    }
}

#[test]
fn open_long_places_entry_then_bracket() {
    let exchange = Arc::new(MockExchange::new());
    exchange.state.lock().unwrap().fill_price = 42000.0;
    let mut mgr = manager(Arc::clone(&exchange));

    mgr.open_position("BTCUSDT", Signal::Long, 500.0, 0.35).unwrap();

    let placed = exchange.placed_orders();
    assert_eq!(placed.len(), 3);

    // Entry: market buy, sized risk/(3*atr) = 20/1500 at 3 decimals.
    assert_eq!(placed[0].side, OrderSide::Buy);
    assert_eq!(placed[0].order_type, OrderType::Market);
    assert_eq!(placed[0].qty, "0.013");
    assert!(!placed[0].reduce_only);

    // TP: reduce-only sell limit at entry + 3*atr.
    assert_eq!(placed[1].side, OrderSide::Sell);
    assert_eq!(placed[1].order_type, OrderType::Limit { price: 43500.0 });
    assert!(placed[1].reduce_only);

    // SL: reduce-only sell stop at entry - 3*atr.
    assert_eq!(
        placed[2].order_type,
        OrderType::StopMarket {
            trigger_price: 40500.0
        }
    );
    assert!(placed[2].reduce_only);

    let position = mgr.position("BTCUSDT").unwrap();
    assert_eq!(position.direction, Signal::Long);
    assert_eq!(position.entry_price, 42000.0);
    assert_eq!(position.take_profit, Some(43500.0));
    assert_eq!(position.stop_loss, Some(40500.0));
    assert!(position.oco.as_ref().unwrap().active);
}

#[test]
fn unverified_entry_is_closed_defensively() {
    let exchange = Arc::new(MockExchange::new());
    exchange.state.lock().unwrap().fill_market_entries = false;
    let mut mgr = manager(Arc::clone(&exchange));

    let err = mgr
        .open_position("BTCUSDT", Signal::Long, 500.0, 0.35)
        .unwrap_err();
    assert!(matches!(err, TradeError::VerifyTimeout { .. }));

    // Entry, then a reduce-only market exit. No bracket legs.
    let placed = exchange.placed_orders();
    assert_eq!(placed.len(), 2);
    assert_eq!(placed[1].side, OrderSide::Sell);
    assert_eq!(placed[1].order_type, OrderType::Market);
    assert!(placed[1].reduce_only);

    assert!(mgr.position("BTCUSDT").is_none());
    assert!(exchange.get_open_orders("BTCUSDT").unwrap().is_empty());
}

#[test]
fn stop_rejection_cancels_tp_and_flattens() {
    let exchange = Arc::new(MockExchange::new());
    {
        let mut state = exchange.state.lock().unwrap();
        state.fill_price = 42000.0;
        state.reject_stop_orders = true;
    }
    let mut mgr = manager(Arc::clone(&exchange));

    let err = mgr
        .open_position("BTCUSDT", Signal::Long, 500.0, 0.35)
        .unwrap_err();
    assert!(matches!(err, TradeError::BracketFailed { .. }));

    // The orphaned take-profit leg was cancelled.
    assert_eq!(exchange.cancelled_orders(), vec!["ord-2".to_string()]);
    // The defensive close flattened the exchange-side position.
    assert!(exchange.get_positions(Some("BTCUSDT")).unwrap().is_empty());
    assert!(mgr.position("BTCUSDT").is_none());
}

#[test]
fn take_profit_fill_cancels_stop_exactly_once() {
    let exchange = Arc::new(MockExchange::new());
    exchange.state.lock().unwrap().fill_price = 42000.0;
    let mut mgr = manager(Arc::clone(&exchange));
    mgr.open_position("BTCUSDT", Signal::Long, 500.0, 0.35).unwrap();

    // ord-1 entry, ord-2 tp, ord-3 sl.
    exchange.fill_order("ord-2");

    let outcomes = mgr.monitor();
    assert_eq!(outcomes, vec![("BTCUSDT".to_string(), OcoOutcome::TookProfit)]);
    assert_eq!(exchange.cancelled_orders(), vec!["ord-3".to_string()]);
    assert!(mgr.position("BTCUSDT").is_none());

    // Second sweep is a no-op: nothing tracked, nothing cancelled again.
    assert!(mgr.monitor().is_empty());
    assert_eq!(exchange.cancelled_orders().len(), 1);
}

#[test]
fn stop_fill_cancels_take_profit() {
    let exchange = Arc::new(MockExchange::new());
    exchange.state.lock().unwrap().fill_price = 42000.0;
    let mut mgr = manager(Arc::clone(&exchange));
    mgr.open_position("BTCUSDT", Signal::Long, 500.0, 0.35).unwrap();

    exchange.fill_order("ord-3");

    let outcomes = mgr.monitor();
    assert_eq!(outcomes, vec![("BTCUSDT".to_string(), OcoOutcome::Stopped)]);
    assert_eq!(exchange.cancelled_orders(), vec!["ord-2".to_string()]);
    assert!(mgr.position("BTCUSDT").is_none());
}

#[test]
fn repeat_signal_refreshes_bracket_at_latest_close() {
    let exchange = Arc::new(MockExchange::new());
    exchange.state.lock().unwrap().fill_price = 42000.0;
    let mut mgr = manager(Arc::clone(&exchange));

    mgr.handle_signal(&snapshot("BTCUSDT", 500.0, 42000.0), Signal::Long)
        .unwrap();
    // Market has trended well past the fill; the refreshed bracket must
    // recenter on the latest close, not the stale 42000 entry.
    mgr.handle_signal(&snapshot("BTCUSDT", 600.0, 43000.0), Signal::Long)
        .unwrap();

    // Old legs cancelled, fresh pair placed, no second entry.
    assert_eq!(
        exchange.cancelled_orders(),
        vec!["ord-2".to_string(), "ord-3".to_string()]
    );
    let placed = exchange.placed_orders();
    assert_eq!(placed.len(), 5);
    assert_eq!(placed[3].order_type, OrderType::Limit { price: 44800.0 });
    assert_eq!(
        placed[4].order_type,
        OrderType::StopMarket {
            trigger_price: 41200.0
        }
    );

    let position = mgr.position("BTCUSDT").unwrap();
    assert_eq!(position.direction, Signal::Long);
    assert_eq!(position.entry_price, 43000.0);
    assert_eq!(position.take_profit, Some(44800.0));
    assert_eq!(position.stop_loss, Some(41200.0));
    let oco = position.oco.as_ref().unwrap();
    assert_eq!(oco.tp_order_id, "ord-4");
    assert_eq!(oco.sl_order_id, "ord-5");
}

#[test]
fn vanished_bracket_keeps_position_tracked() {
    let exchange = Arc::new(MockExchange::new());
    exchange.state.lock().unwrap().fill_price = 42000.0;
    let mut mgr = manager(Arc::clone(&exchange));
    mgr.open_position("BTCUSDT", Signal::Long, 500.0, 0.35).unwrap();

    // Both legs disappear without a fill (cancelled out-of-band).
    exchange.state.lock().unwrap().open_orders.clear();

    let outcomes = mgr.monitor();
    assert_eq!(outcomes, vec![("BTCUSDT".to_string(), OcoOutcome::Vanished)]);
    // The position is still on the book, just unprotected.
    let position = mgr.position("BTCUSDT").unwrap();
    assert!(position.oco.is_none());

    // The next same-direction signal re-arms the bracket.
    mgr.handle_signal(&snapshot("BTCUSDT", 500.0, 42000.0), Signal::Long)
        .unwrap();
    let position = mgr.position("BTCUSDT").unwrap();
    assert!(position.oco.as_ref().unwrap().active);
    assert_eq!(position.take_profit, Some(43500.0));
}

#[test]
fn reversal_closes_then_reopens() {
    let exchange = Arc::new(MockExchange::new());
    exchange.state.lock().unwrap().fill_price = 42000.0;
    let mut mgr = manager(Arc::clone(&exchange));

    mgr.open_position("BTCUSDT", Signal::Long, 500.0, 0.35).unwrap();
    mgr.handle_signal(&snapshot("BTCUSDT", 500.0, 42000.0), Signal::Short)
        .unwrap();

    // Long bracket cancelled before the flip.
    assert_eq!(
        exchange.cancelled_orders(),
        vec!["ord-2".to_string(), "ord-3".to_string()]
    );

    let placed = exchange.placed_orders();
    // long entry, tp, sl, reduce-only close, short entry, tp, sl
    assert_eq!(placed.len(), 7);
    assert_eq!(placed[3].side, OrderSide::Sell);
    assert!(placed[3].reduce_only);
    assert_eq!(placed[4].side, OrderSide::Sell);
    assert!(!placed[4].reduce_only);

    let position = mgr.position("BTCUSDT").unwrap();
    assert_eq!(position.direction, Signal::Short);
    // Short bracket: TP below, SL above.
    assert_eq!(position.take_profit, Some(40500.0));
    assert_eq!(position.stop_loss, Some(43500.0));
}

#[test]
fn reconcile_adopts_live_positions() {
    use pivotbot_core::exchange::OrderRequest;

    let exchange = Arc::new(MockExchange::new());
    exchange.state.lock().unwrap().fill_price = 40000.0;

    // Seed a braced long and a bare short by driving the fake directly.
    exchange
        .place_order(&OrderRequest {
            symbol: "BTCUSDT".into(),
            side: OrderSide::Buy,
            order_type: OrderType::Market,
            qty: "0.5".into(),
            reduce_only: false,
        })
        .unwrap();
    exchange
        .place_order(&OrderRequest {
            symbol: "BTCUSDT".into(),
            side: OrderSide::Sell,
            order_type: OrderType::Limit { price: 41500.0 },
            qty: "0.5".into(),
            reduce_only: true,
        })
        .unwrap();
    exchange
        .place_order(&OrderRequest {
            symbol: "BTCUSDT".into(),
            side: OrderSide::Sell,
            order_type: OrderType::StopMarket {
                trigger_price: 38500.0
            },
            qty: "0.5".into(),
            reduce_only: true,
        })
        .unwrap();
    exchange
        .place_order(&OrderRequest {
            symbol: "ETHUSDT".into(),
            side: OrderSide::Sell,
            order_type: OrderType::Market,
            qty: "2.0".into(),
            reduce_only: false,
        })
        .unwrap();

    let mut mgr = manager(Arc::clone(&exchange));
    mgr.reconcile().unwrap();

    let btc = mgr.position("BTCUSDT").unwrap();
    assert_eq!(btc.direction, Signal::Long);
    assert_eq!(btc.quantity, 0.5);
    assert_eq!(btc.take_profit, Some(41500.0));
    assert_eq!(btc.stop_loss, Some(38500.0));
    let oco = btc.oco.as_ref().unwrap();
    assert_eq!(oco.tp_order_id, "ord-2");
    assert_eq!(oco.sl_order_id, "ord-3");

    let eth = mgr.position("ETHUSDT").unwrap();
    assert_eq!(eth.direction, Signal::Short);
    assert!(eth.oco.is_none());
}

#[test]
fn reconcile_rejects_mismatched_bracket_size() {
    use pivotbot_core::exchange::OrderRequest;

    let exchange = Arc::new(MockExchange::new());
    exchange.state.lock().unwrap().fill_price = 40000.0;
    exchange
        .place_order(&OrderRequest {
            symbol: "BTCUSDT".into(),
            side: OrderSide::Buy,
            order_type: OrderType::Market,
            qty: "0.5".into(),
            reduce_only: false,
        })
        .unwrap();
    // Leg sized >5% away from the position: stale, must not be adopted.
    exchange
        .place_order(&OrderRequest {
            symbol: "BTCUSDT".into(),
            side: OrderSide::Sell,
            order_type: OrderType::Limit { price: 41500.0 },
            qty: "0.3".into(),
            reduce_only: true,
        })
        .unwrap();

    let mut mgr = manager(Arc::clone(&exchange));
    mgr.reconcile().unwrap();
    assert!(mgr.position("BTCUSDT").unwrap().oco.is_none());
}
