//! Position lifecycle: entry, verification, bracket upkeep, reconciliation.
//!
//! One `PositionManager` owns the in-memory book (at most one position per
//! symbol) and every order the bot places. The hard rule throughout: never
//! leave a verified position without its protective bracket. Any failure
//! between entry fill and bracket acknowledgement triggers a defensive
//! market close.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use log::{error, info, warn};
use thiserror::Error;

use crate::clock::{RetryPolicy, Sleeper, SystemSleeper};
use crate::config::{ConfigError, Settings};
use crate::domain::{OcoPair, Position, Signal};
use crate::exchange::{
    Exchange, ExchangeError, OpenOrder, OrderKind, OrderRequest, OrderType, PositionInfo,
};
use crate::features::Snapshot;
use crate::sizing::{format_quantity, position_size};

use super::bracket::{self, OcoOutcome};
use super::levels::calculate_levels;

/// Relative quantity mismatch tolerated when matching exchange-side state
/// (fees and fill rounding nudge the reported size).
pub const QTY_TOLERANCE: f64 = 0.05;

/// Grace period between entry submission and the first verification probe.
const VERIFY_GRACE: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum TradeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Exchange(#[from] ExchangeError),

    #[error("{symbol}: position did not appear within the verification window")]
    VerifyTimeout { symbol: String },

    #[error("{symbol}: bracket placement failed: {source}")]
    BracketFailed {
        symbol: String,
        source: ExchangeError,
    },
}

pub struct PositionManager {
    exchange: Arc<dyn Exchange>,
    settings: Settings,
    sleeper: Box<dyn Sleeper>,
    verify_policy: RetryPolicy,
    verify_grace: Duration,
    positions: HashMap<String, Position>,
}

impl PositionManager {
    pub fn new(exchange: Arc<dyn Exchange>, settings: Settings) -> Self {
        Self::with_sleeper(
            exchange,
            settings,
            Box::new(SystemSleeper),
            RetryPolicy::new(10, Duration::from_millis(500)),
            VERIFY_GRACE,
        )
    }

    /// Construct with an injected sleeper and poll policy, for tests.
    pub fn with_sleeper(
        exchange: Arc<dyn Exchange>,
        settings: Settings,
        sleeper: Box<dyn Sleeper>,
        verify_policy: RetryPolicy,
        verify_grace: Duration,
    ) -> Self {
        Self {
            exchange,
            settings,
            sleeper,
            verify_policy,
            verify_grace,
            positions: HashMap::new(),
        }
    }

    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    pub fn position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    /// Push configured leverage for every traded symbol. Rejections are
    /// logged and skipped so one symbol cannot block startup.
    pub fn apply_leverage(&self) {
        for symbol in &self.settings.symbols {
            let leverage = self.settings.leverage_for(symbol);
            if let Err(err) = self.exchange.set_leverage(symbol, leverage) {
                warn!("{symbol}: set_leverage({leverage}) failed: {err}");
            }
        }
    }

    /// Act on one symbol's signal. Same-direction repeat refreshes the
    /// bracket at the latest volatility; an opposite signal closes and
    /// re-enters.
    pub fn handle_signal(&mut self, snapshot: &Snapshot, signal: Signal) -> Result<(), TradeError> {
        let symbol = snapshot.symbol.clone();
        if let Some(existing) = self.positions.get(&symbol) {
            if existing.direction == signal {
                info!("{symbol}: repeat {signal} signal, refreshing bracket");
                return self.refresh_bracket(&symbol, snapshot.close, snapshot.atr);
            }
            info!("{symbol}: reversal signal, closing {} first", existing.direction);
            self.close_position(&symbol, "reversal")?;
        }
        self.open_position(&symbol, signal, snapshot.atr, snapshot.pct_atr)
    }

    /// Enter a new position: size, market entry, verify the fill appeared,
    /// then arm the bracket. Verification or bracket failure closes the
    /// exposure before the error propagates.
    pub fn open_position(
        &mut self,
        symbol: &str,
        direction: Signal,
        atr_value: f64,
        pct_atr: f64,
    ) -> Result<(), TradeError> {
        let quantity = position_size(symbol, atr_value, &self.settings)?;
        if quantity <= 0.0 {
            warn!("{symbol}: computed quantity rounds to zero (atr {atr_value}), skipping entry");
            return Ok(());
        }
        let precision = self.settings.qty_precision(symbol)?;
        let qty_str = format_quantity(quantity, precision);

        let entry_side = direction.entry_side();
        let ack = self.exchange.place_order(&OrderRequest {
            symbol: symbol.to_string(),
            side: entry_side,
            order_type: OrderType::Market,
            qty: qty_str.clone(),
            reduce_only: false,
        })?;
        info!("{symbol}: {direction} entry {} for {qty_str} submitted", ack.order_id);

        let Some(live) = self.verify_entry(symbol, direction, quantity) else {
            error!("{symbol}: entry never verified, closing defensively");
            self.defensive_close(symbol, direction, &qty_str);
            return Err(TradeError::VerifyTimeout {
                symbol: symbol.to_string(),
            });
        };

        let levels = calculate_levels(
            direction,
            live.avg_price,
            atr_value,
            self.settings.price_precision(symbol),
        );
        let mut position = Position {
            symbol: symbol.to_string(),
            direction,
            entry_price: live.avg_price,
            quantity: live.size,
            take_profit: Some(levels.take_profit),
            stop_loss: Some(levels.stop_loss),
            pct_atr: Some(pct_atr),
            entry_order_id: Some(ack.order_id),
            oco: None,
            opened_at: Utc::now(),
        };

        match bracket::place_bracket(self.exchange.as_ref(), &position, &qty_str, levels) {
            Ok(pair) => {
                position.oco = Some(pair);
                self.positions.insert(symbol.to_string(), position);
                Ok(())
            }
            Err(source) => {
                error!("{symbol}: bracket failed ({source}), closing defensively");
                self.defensive_close(symbol, direction, &qty_str);
                Err(TradeError::BracketFailed {
                    symbol: symbol.to_string(),
                    source,
                })
            }
        }
    }

    /// Poll until the exchange reports a position matching the entry we just
    /// sent: right side, size within tolerance of the requested quantity.
    fn verify_entry(
        &self,
        symbol: &str,
        direction: Signal,
        quantity: f64,
    ) -> Option<PositionInfo> {
        self.sleeper.sleep(self.verify_grace);
        let entry_side = direction.entry_side();
        self.verify_policy.poll(self.sleeper.as_ref(), |attempt| {
            match self.exchange.get_positions(Some(symbol)) {
                Ok(rows) => rows.into_iter().find(|row| {
                    row.side == entry_side && within_tolerance(row.size, quantity, QTY_TOLERANCE)
                }),
                Err(err) => {
                    warn!("{symbol}: verify probe {attempt} failed: {err}");
                    None
                }
            }
        })
    }

    /// Replace the protective pair, re-anchored on the latest close at the
    /// latest ATR so the bracket trails a trending market. The tracked entry
    /// price moves to the new anchor; the quantity tracks the live size.
    fn refresh_bracket(
        &mut self,
        symbol: &str,
        close: f64,
        atr_value: f64,
    ) -> Result<(), TradeError> {
        let Some(position) = self.positions.get_mut(symbol) else {
            return Ok(());
        };
        if let Some(oco) = position.oco.as_mut() {
            bracket::cancel_pair(self.exchange.as_ref(), oco);
        }

        // Re-read the live size; the original fill may differ from what we
        // tracked after fees.
        let live = self
            .exchange
            .get_positions(Some(symbol))?
            .into_iter()
            .find(|row| row.side == position.direction.entry_side());
        if let Some(live) = live {
            position.quantity = live.size;
        }
        position.entry_price = close;

        let precision = self.settings.qty_precision(symbol)?;
        let qty_str = format_quantity(position.quantity, precision);
        let levels = calculate_levels(
            position.direction,
            close,
            atr_value,
            self.settings.price_precision(symbol),
        );
        let pair = bracket::place_bracket(self.exchange.as_ref(), position, &qty_str, levels)
            .map_err(|source| TradeError::BracketFailed {
                symbol: symbol.to_string(),
                source,
            })?;
        position.take_profit = Some(levels.take_profit);
        position.stop_loss = Some(levels.stop_loss);
        position.oco = Some(pair);
        Ok(())
    }

    /// Deliberately flatten one symbol: cancel the bracket, market out of
    /// whatever size the exchange still reports, drop the book entry.
    pub fn close_position(&mut self, symbol: &str, reason: &str) -> Result<(), TradeError> {
        let Some(mut position) = self.positions.remove(symbol) else {
            return Ok(());
        };
        info!("{symbol}: closing {} position ({reason})", position.direction);
        if let Some(oco) = position.oco.as_mut() {
            bracket::cancel_pair(self.exchange.as_ref(), oco);
        }

        let live = self
            .exchange
            .get_positions(Some(symbol))?
            .into_iter()
            .find(|row| row.side == position.direction.entry_side());
        let Some(live) = live else {
            info!("{symbol}: already flat on the exchange");
            return Ok(());
        };
        let precision = self.settings.qty_precision(symbol)?;
        let qty_str = format_quantity(live.size, precision);
        self.exchange.place_order(&OrderRequest {
            symbol: symbol.to_string(),
            side: position.direction.exit_side(),
            order_type: OrderType::Market,
            qty: qty_str,
            reduce_only: true,
        })?;
        Ok(())
    }

    /// Best-effort market exit after a failed entry flow. Errors are logged,
    /// not propagated — the caller is already surfacing the primary failure.
    fn defensive_close(&self, symbol: &str, direction: Signal, qty_str: &str) {
        let request = OrderRequest {
            symbol: symbol.to_string(),
            side: direction.exit_side(),
            order_type: OrderType::Market,
            qty: qty_str.to_string(),
            reduce_only: true,
        };
        if let Err(err) = self.exchange.place_order(&request) {
            error!("{symbol}: defensive close failed, exposure may remain: {err}");
        }
    }

    /// Sweep every tracked bracket: cancel the survivor of any filled leg
    /// and retire completed positions. A pair whose legs both vanished
    /// without a fill leaves its position tracked but unprotected.
    /// Per-symbol failures are logged and do not stop the sweep.
    pub fn monitor(&mut self) -> Vec<(String, OcoOutcome)> {
        let symbols: Vec<String> = self.positions.keys().cloned().collect();
        let mut outcomes = Vec::new();
        for symbol in symbols {
            let Some(position) = self.positions.get_mut(&symbol) else {
                continue;
            };
            let Some(oco) = position.oco.as_mut() else {
                continue;
            };
            match bracket::check_and_cancel(self.exchange.as_ref(), oco) {
                Ok(OcoOutcome::StillOpen) => {}
                Ok(OcoOutcome::Vanished) => {
                    // The position itself may still be live; keep it tracked
                    // unprotected so the next signal can re-arm it, same as
                    // the startup-adoption path.
                    warn!("{symbol}: bracket vanished without a fill, position kept unprotected");
                    position.oco = None;
                    outcomes.push((symbol, OcoOutcome::Vanished));
                }
                Ok(outcome) => {
                    info!("{symbol}: position closed by bracket ({outcome:?})");
                    self.positions.remove(&symbol);
                    outcomes.push((symbol, outcome));
                }
                Err(err) => {
                    error!("{symbol}: bracket monitor failed: {err}");
                }
            }
        }
        outcomes
    }

    /// Rebuild the book from exchange state after a restart. Each live
    /// position is adopted; its bracket is reconstructed from resting
    /// reduce-only exit orders whose size matches within tolerance. A
    /// position with no matching pair is adopted unprotected and flagged.
    pub fn reconcile(&mut self) -> Result<(), TradeError> {
        self.positions.clear();
        let live = self.exchange.get_positions(None)?;
        for row in live {
            let direction = match row.side {
                s if s == Signal::Long.entry_side() => Signal::Long,
                _ => Signal::Short,
            };
            let orders = self.exchange.get_open_orders(&row.symbol)?;
            let oco = match_bracket(&row, direction, &orders);
            if oco.is_none() {
                warn!(
                    "{}: adopted {direction} position of {} without a bracket",
                    row.symbol, row.size
                );
            } else {
                info!("{}: adopted {direction} position of {} with bracket", row.symbol, row.size);
            }
            let (take_profit, stop_loss) = oco
                .as_ref()
                .map(|found| (found.take_profit, found.stop_loss))
                .unwrap_or((row.take_profit, row.stop_loss));
            self.positions.insert(
                row.symbol.clone(),
                Position {
                    symbol: row.symbol.clone(),
                    direction,
                    entry_price: row.avg_price,
                    quantity: row.size,
                    take_profit,
                    stop_loss,
                    pct_atr: None,
                    entry_order_id: None,
                    oco: oco.map(|found| found.pair),
                    opened_at: Utc::now(),
                },
            );
        }
        Ok(())
    }
}

struct MatchedBracket {
    pair: OcoPair,
    take_profit: Option<f64>,
    stop_loss: Option<f64>,
}

/// Pair up resting reduce-only exit orders with a live position: the limit
/// leg is the take-profit, the trigger leg the stop. Sizes must match the
/// position within tolerance.
fn match_bracket(
    row: &PositionInfo,
    direction: Signal,
    orders: &[OpenOrder],
) -> Option<MatchedBracket> {
    let exit_side = direction.exit_side();
    let candidates: Vec<&OpenOrder> = orders
        .iter()
        .filter(|o| {
            o.reduce_only
                && o.side == exit_side
                && within_tolerance(o.qty, row.size, QTY_TOLERANCE)
        })
        .collect();
    let tp = candidates
        .iter()
        .find(|o| o.kind == OrderKind::Limit && o.trigger_price.is_none())?;
    let sl = candidates.iter().find(|o| o.trigger_price.is_some())?;
    Some(MatchedBracket {
        pair: OcoPair {
            symbol: row.symbol.clone(),
            tp_order_id: tp.order_id.clone(),
            sl_order_id: sl.order_id.clone(),
            active: true,
        },
        take_profit: tp.price,
        stop_loss: sl.trigger_price,
    })
}

fn within_tolerance(actual: f64, expected: f64, tolerance: f64) -> bool {
    (actual - expected).abs() <= expected.abs() * tolerance
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::OrderStatus;

    #[test]
    fn tolerance_is_relative() {
        assert!(within_tolerance(0.0096, 0.01, QTY_TOLERANCE));
        assert!(within_tolerance(0.0104, 0.01, QTY_TOLERANCE));
        assert!(!within_tolerance(0.0094, 0.01, QTY_TOLERANCE));
    }

    fn open_order(
        id: &str,
        side: crate::domain::OrderSide,
        kind: OrderKind,
        qty: f64,
        price: Option<f64>,
        trigger: Option<f64>,
        reduce_only: bool,
    ) -> OpenOrder {
        OpenOrder {
            order_id: id.into(),
            symbol: "BTCUSDT".into(),
            side,
            kind,
            qty,
            price,
            trigger_price: trigger,
            reduce_only,
            status: OrderStatus::New,
        }
    }

    #[test]
    fn bracket_matching_pairs_limit_and_trigger() {
        use crate::domain::OrderSide;
        let row = PositionInfo {
            symbol: "BTCUSDT".into(),
            side: OrderSide::Buy,
            size: 0.01,
            avg_price: 42000.0,
            take_profit: None,
            stop_loss: None,
        };
        let orders = vec![
            open_order("tp", OrderSide::Sell, OrderKind::Limit, 0.01, Some(43260.0), None, true),
            open_order("sl", OrderSide::Sell, OrderKind::Market, 0.01, None, Some(40740.0), true),
            // Entry-side order must not be swept into the bracket.
            open_order("x", OrderSide::Buy, OrderKind::Limit, 0.01, Some(41000.0), None, false),
        ];
        let matched = match_bracket(&row, Signal::Long, &orders).unwrap();
        assert_eq!(matched.pair.tp_order_id, "tp");
        assert_eq!(matched.pair.sl_order_id, "sl");
        assert_eq!(matched.take_profit, Some(43260.0));
        assert_eq!(matched.stop_loss, Some(40740.0));
    }

    #[test]
    fn bracket_matching_rejects_size_mismatch() {
        use crate::domain::OrderSide;
        let row = PositionInfo {
            symbol: "BTCUSDT".into(),
            side: OrderSide::Buy,
            size: 0.02,
            avg_price: 42000.0,
            take_profit: None,
            stop_loss: None,
        };
        let orders = vec![
            open_order("tp", OrderSide::Sell, OrderKind::Limit, 0.01, Some(43260.0), None, true),
            open_order("sl", OrderSide::Sell, OrderKind::Market, 0.01, None, Some(40740.0), true),
        ];
        assert!(match_bracket(&row, Signal::Long, &orders).is_none());
    }
}
