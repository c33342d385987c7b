//! OCO bracket plumbing: placing the TP/SL pair and watching its legs.
//!
//! The venue has no native one-cancels-other for this account mode, so the
//! bracket is two reduce-only orders (a take-profit limit and a stop-market)
//! and the monitor cancels the survivor when either leg fills.

use log::{info, warn};

use crate::domain::{OcoPair, Position};
use crate::exchange::{
    Exchange, ExchangeError, OrderRequest, OrderStatus, OrderType,
};

use super::levels::BracketLevels;

/// What the monitor concluded about an OCO pair this pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OcoOutcome {
    /// Both legs still resting.
    StillOpen,
    /// Take-profit filled; stop leg cancelled.
    TookProfit,
    /// Stop filled; take-profit leg cancelled.
    Stopped,
    /// Both legs gone without a fill (cancelled externally).
    Vanished,
}

/// Place the protective pair for a verified position. The stop leg is placed
/// only after the take-profit leg is acknowledged; if the stop is rejected
/// the take-profit is cancelled so no half-bracket is left resting.
pub fn place_bracket(
    exchange: &dyn Exchange,
    position: &Position,
    qty: &str,
    levels: BracketLevels,
) -> Result<OcoPair, ExchangeError> {
    let exit_side = position.direction.exit_side();

    let tp_ack = exchange.place_order(&OrderRequest {
        symbol: position.symbol.clone(),
        side: exit_side,
        order_type: OrderType::Limit {
            price: levels.take_profit,
        },
        qty: qty.to_string(),
        reduce_only: true,
    })?;

    let sl_request = OrderRequest {
        symbol: position.symbol.clone(),
        side: exit_side,
        order_type: OrderType::StopMarket {
            trigger_price: levels.stop_loss,
        },
        qty: qty.to_string(),
        reduce_only: true,
    };
    let sl_ack = match exchange.place_order(&sl_request) {
        Ok(ack) => ack,
        Err(err) => {
            warn!(
                "{}: stop leg rejected ({err}), cancelling take-profit {}",
                position.symbol, tp_ack.order_id
            );
            if let Err(cancel_err) = exchange.cancel_order(&position.symbol, &tp_ack.order_id) {
                warn!(
                    "{}: failed to cancel orphaned take-profit {}: {cancel_err}",
                    position.symbol, tp_ack.order_id
                );
            }
            return Err(err);
        }
    };

    info!(
        "{}: bracket placed tp={} @ {} / sl={} @ {}",
        position.symbol, tp_ack.order_id, levels.take_profit, sl_ack.order_id, levels.stop_loss
    );
    Ok(OcoPair {
        symbol: position.symbol.clone(),
        tp_order_id: tp_ack.order_id,
        sl_order_id: sl_ack.order_id,
        active: true,
    })
}

/// Resolve an order's status, falling back to history once it has left the
/// open set. `NotFound` means neither query knows the id.
pub fn order_status(
    exchange: &dyn Exchange,
    symbol: &str,
    order_id: &str,
) -> Result<OrderStatus, ExchangeError> {
    if let Some(open) = exchange.find_open_order(symbol, order_id)? {
        return Ok(open.status);
    }
    Ok(exchange
        .order_history_status(symbol, order_id)?
        .unwrap_or(OrderStatus::NotFound))
}

/// Inspect an active pair and cancel the surviving leg if the other filled.
/// Marks the pair inactive on any terminal outcome, so a second call after
/// a fill is a no-op.
pub fn check_and_cancel(
    exchange: &dyn Exchange,
    oco: &mut OcoPair,
) -> Result<OcoOutcome, ExchangeError> {
    if !oco.active {
        return Ok(OcoOutcome::StillOpen);
    }

    let tp_status = order_status(exchange, &oco.symbol, &oco.tp_order_id)?;
    if tp_status == OrderStatus::Filled {
        info!("{}: take-profit {} filled", oco.symbol, oco.tp_order_id);
        cancel_leg(exchange, &oco.symbol, &oco.sl_order_id);
        oco.active = false;
        return Ok(OcoOutcome::TookProfit);
    }

    // A triggered stop is already a market order in flight; treat it as the
    // stop having taken the position.
    let sl_status = order_status(exchange, &oco.symbol, &oco.sl_order_id)?;
    if sl_status == OrderStatus::Filled || sl_status == OrderStatus::Triggered {
        info!("{}: stop-loss {} filled", oco.symbol, oco.sl_order_id);
        cancel_leg(exchange, &oco.symbol, &oco.tp_order_id);
        oco.active = false;
        return Ok(OcoOutcome::Stopped);
    }

    if tp_status == OrderStatus::NotFound && sl_status == OrderStatus::NotFound {
        warn!("{}: both bracket legs vanished without a fill", oco.symbol);
        oco.active = false;
        return Ok(OcoOutcome::Vanished);
    }

    Ok(OcoOutcome::StillOpen)
}

/// Cancel both legs of a pair, tolerating already-gone orders. Used when a
/// position is being closed deliberately.
pub fn cancel_pair(exchange: &dyn Exchange, oco: &mut OcoPair) {
    if oco.active {
        cancel_leg(exchange, &oco.symbol, &oco.tp_order_id);
        cancel_leg(exchange, &oco.symbol, &oco.sl_order_id);
        oco.active = false;
    }
}

fn cancel_leg(exchange: &dyn Exchange, symbol: &str, order_id: &str) {
    if let Err(err) = exchange.cancel_order(symbol, order_id) {
        // Already filled or cancelled legs reject the cancel; nothing to do.
        warn!("{symbol}: cancel of bracket leg {order_id} failed: {err}");
    }
}
