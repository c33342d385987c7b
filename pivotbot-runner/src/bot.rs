//! Trading bot orchestration — wires together data fetch, feature
//! computation, signal composition, and the position manager.
//!
//! One cycle walks the configured universe symbol by symbol. Failures are
//! isolated per symbol: a bad fetch or a rejected order for one market never
//! stops the sweep for the rest.

use std::sync::Arc;
use std::time::Instant;

use log::{error, info};
use thiserror::Error;

use pivotbot_core::config::{ConfigError, Settings};
use pivotbot_core::exchange::{Exchange, ExchangeError};
use pivotbot_core::features::FeatureFrame;
use pivotbot_core::positions::{PositionManager, TradeError};
use pivotbot_core::signals::compose;

use crate::report::{CycleReport, SymbolOutcome, SymbolScan};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("exchange error: {0}")]
    Exchange(#[from] ExchangeError),
    #[error("trade error: {0}")]
    Trade(#[from] TradeError),
    #[error("no candles returned for symbol '{0}'")]
    EmptyHistory(String),
}

pub struct TradingBot {
    exchange: Arc<dyn Exchange>,
    settings: Settings,
    manager: PositionManager,
}

impl TradingBot {
    pub fn new(exchange: Arc<dyn Exchange>, settings: Settings) -> Self {
        let manager = PositionManager::new(Arc::clone(&exchange), settings.clone());
        Self {
            exchange,
            settings,
            manager,
        }
    }

    pub fn manager(&self) -> &PositionManager {
        &self.manager
    }

    /// Startup sequence: push leverage, then adopt whatever the exchange
    /// already holds. Must run before the first cycle so a restart never
    /// double-enters a symbol.
    pub fn bootstrap(&mut self) -> Result<(), RunError> {
        info!("bootstrap: applying leverage for {} symbols", self.settings.symbols.len());
        self.manager.apply_leverage();
        self.manager.reconcile()?;
        let adopted = self.manager.positions().count();
        info!("bootstrap: reconciled, {adopted} live position(s) adopted");
        Ok(())
    }

    /// One full trading cycle: sweep brackets, then evaluate and act on
    /// every symbol in the universe.
    pub fn run_once(&mut self) -> CycleReport {
        let started = Instant::now();
        let mut outcomes = Vec::new();
        let mut errors = Vec::new();

        for (symbol, outcome) in self.manager.monitor() {
            info!("{symbol}: bracket resolved ({outcome:?})");
        }

        let symbols = self.settings.symbols.clone();
        for symbol in &symbols {
            match self.process_symbol(symbol) {
                Ok(outcome) => outcomes.push(outcome),
                Err(err) => {
                    error!("{symbol}: cycle failed: {err}");
                    errors.push(format!("{symbol}: {err}"));
                }
            }
        }

        CycleReport {
            success: errors.is_empty(),
            elapsed_secs: started.elapsed().as_secs_f64(),
            symbols_processed: symbols.len(),
            outcomes,
            errors,
        }
    }

    fn process_symbol(&mut self, symbol: &str) -> Result<SymbolOutcome, RunError> {
        let snapshot = self.evaluate_symbol(symbol)?;
        let signal = compose(&snapshot, &self.settings);

        let action = match signal {
            Some(sig) => {
                let had_position = self.manager.position(symbol).is_some();
                self.manager.handle_signal(&snapshot, sig)?;
                if had_position {
                    "position updated".to_string()
                } else {
                    format!("opened {sig}")
                }
            }
            None => "no signal".to_string(),
        };

        Ok(SymbolOutcome {
            symbol: symbol.to_string(),
            signal,
            action,
        })
    }

    /// Evaluate the whole universe without trading.
    pub fn scan(&self) -> (Vec<SymbolScan>, Vec<String>) {
        let mut scans = Vec::new();
        let mut errors = Vec::new();
        for symbol in &self.settings.symbols {
            match self.evaluate_symbol(symbol) {
                Ok(snapshot) => {
                    let signal = compose(&snapshot, &self.settings);
                    scans.push(SymbolScan { snapshot, signal });
                }
                Err(err) => errors.push(format!("{symbol}: {err}")),
            }
        }
        (scans, errors)
    }

    fn evaluate_symbol(&self, symbol: &str) -> Result<pivotbot_core::features::Snapshot, RunError> {
        let bars = self.exchange.fetch_ohlcv(
            symbol,
            &self.settings.interval,
            self.settings.candle_limit,
        )?;
        let frame = FeatureFrame::compute(symbol, bars, &self.settings)?;
        frame
            .latest()
            .ok_or_else(|| RunError::EmptyHistory(symbol.to_string()))
    }
}
