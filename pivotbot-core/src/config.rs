//! Settings: symbol universe, per-symbol tables, and risk parameters.
//!
//! Defaults reproduce the production configuration; a TOML file can override
//! any field. Per-symbol lookups that have no safe fallback (volatility
//! ranges, quantity precision) return `ConfigError` instead of defaulting —
//! a wrong precision on a derivatives exchange means rejected orders.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Structured configuration errors. Fatal for the affected symbol's cycle,
/// never for the whole batch.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("no z-range registered for symbol '{symbol}'")]
    MissingZRange { symbol: String },

    #[error("no %ATR range registered for symbol '{symbol}'")]
    MissingAtrRange { symbol: String },

    #[error("no quantity rounding precision registered for symbol '{symbol}'")]
    MissingPrecision { symbol: String },

    #[error("failed to read config file: {0}")]
    Io(String),

    #[error("failed to parse config file: {0}")]
    Parse(String),
}

/// Per-symbol risk override.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SymbolRisk {
    pub risk: f64,
    pub leverage: u32,
}

/// Full bot configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Symbols traded each cycle.
    pub symbols: Vec<String>,
    /// Candle interval in exchange notation ("15" = 15 minutes).
    pub interval: String,
    /// Candles fetched per symbol per cycle.
    pub candle_limit: u32,
    /// Admissible %ATR band (low, high) per symbol for signal filters.
    pub atr_ranges: HashMap<String, (f64, f64)>,
    /// Volatility clamp band (pct_min, pct_max) per symbol for the z series.
    pub z_ranges: HashMap<String, (f64, f64)>,
    /// ATR multiplier used as the z floor.
    pub z_atr_multiplier: f64,
    /// Quantity rounding precision per symbol (negative = round to tens).
    pub qty_precision: HashMap<String, i32>,
    /// Price rounding precision per symbol for TP/SL levels.
    pub price_precision: HashMap<String, i32>,
    /// Price precision fallback for symbols missing from the table.
    pub default_price_precision: i32,
    /// Risk budget in USDT for symbols without an explicit override.
    pub default_risk: f64,
    /// Leverage for symbols without an explicit override.
    pub default_leverage: u32,
    /// Per-symbol risk/leverage overrides.
    pub symbol_risk: HashMap<String, SymbolRisk>,
    /// Symbols eligible for long entries on the 2x breakout column.
    pub long_symbols: Vec<String>,
    /// Symbols eligible for short entries on the 2x breakdown column;
    /// others fall back to the 3x reversal column.
    pub short_symbols: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        let symbols: Vec<String> = ["BTCUSDT", "ETHUSDT", "SOLUSDT", "XRPUSDT", "DOGEUSDT"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let atr_ranges = HashMap::from([
            ("BTCUSDT".to_string(), (0.14, 0.57)),
            ("ETHUSDT".to_string(), (0.28, 0.87)),
            ("SOLUSDT".to_string(), (0.36, 1.03)),
            ("XRPUSDT".to_string(), (0.3, 1.25)),
            ("DOGEUSDT".to_string(), (0.4, 1.17)),
        ]);

        // z clamp bands: 25th-75th percentile of historical %ATR per symbol.
        let z_ranges = HashMap::from([
            ("BTCUSDT".to_string(), (0.188, 0.369)),
            ("ETHUSDT".to_string(), (0.356, 0.620)),
            ("SOLUSDT".to_string(), (0.446, 0.733)),
            ("XRPUSDT".to_string(), (0.391, 0.763)),
            ("DOGEUSDT".to_string(), (0.495, 0.833)),
        ]);

        let qty_precision = HashMap::from([
            ("BTCUSDT".to_string(), 3),
            ("ETHUSDT".to_string(), 2),
            ("BNBUSDT".to_string(), 2),
            ("SOLUSDT".to_string(), 1),
            ("1000PEPEUSDT".to_string(), -2),
            ("ARBUSDT".to_string(), 1),
            ("SUIUSDT".to_string(), -1),
            ("DOGEUSDT".to_string(), 0),
            ("XRPUSDT".to_string(), 0),
            ("OPUSDT".to_string(), 1),
        ]);

        let price_precision = HashMap::from([
            ("BTCUSDT".to_string(), 2),
            ("ETHUSDT".to_string(), 2),
            ("BNBUSDT".to_string(), 2),
            ("SOLUSDT".to_string(), 3),
            ("1000PEPEUSDT".to_string(), 7),
            ("ARBUSDT".to_string(), 4),
            ("SUIUSDT".to_string(), 5),
            ("DOGEUSDT".to_string(), 5),
            ("XRPUSDT".to_string(), 4),
            ("OPUSDT".to_string(), 4),
        ]);

        let symbol_risk: HashMap<String, SymbolRisk> = symbols
            .iter()
            .map(|s| {
                (
                    s.clone(),
                    SymbolRisk {
                        risk: 20.0,
                        leverage: 25,
                    },
                )
            })
            .collect();

        Self {
            long_symbols: symbols.clone(),
            short_symbols: symbols.clone(),
            symbols,
            interval: "15".to_string(),
            candle_limit: 250,
            atr_ranges,
            z_ranges,
            z_atr_multiplier: 1.0,
            qty_precision,
            price_precision,
            default_price_precision: 3,
            default_risk: 40.0,
            default_leverage: 25,
            symbol_risk,
        }
    }
}

impl Settings {
    /// Load settings from a TOML file; missing fields keep their defaults.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        toml::from_str(&raw).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn z_range(&self, symbol: &str) -> Result<(f64, f64), ConfigError> {
        self.z_ranges
            .get(symbol)
            .copied()
            .ok_or_else(|| ConfigError::MissingZRange {
                symbol: symbol.to_string(),
            })
    }

    pub fn atr_range(&self, symbol: &str) -> Result<(f64, f64), ConfigError> {
        self.atr_ranges
            .get(symbol)
            .copied()
            .ok_or_else(|| ConfigError::MissingAtrRange {
                symbol: symbol.to_string(),
            })
    }

    pub fn qty_precision(&self, symbol: &str) -> Result<i32, ConfigError> {
        self.qty_precision
            .get(symbol)
            .copied()
            .ok_or_else(|| ConfigError::MissingPrecision {
                symbol: symbol.to_string(),
            })
    }

    /// Price precision falls back to a default — an over-precise TP price is
    /// merely sub-optimal, unlike a wrong quantity step.
    pub fn price_precision(&self, symbol: &str) -> i32 {
        self.price_precision
            .get(symbol)
            .copied()
            .unwrap_or(self.default_price_precision)
    }

    pub fn risk_for(&self, symbol: &str) -> f64 {
        self.symbol_risk
            .get(symbol)
            .map(|s| s.risk)
            .unwrap_or(self.default_risk)
    }

    pub fn leverage_for(&self, symbol: &str) -> u32 {
        self.symbol_risk
            .get(symbol)
            .map(|s| s.leverage)
            .unwrap_or(self.default_leverage)
    }

    pub fn allows_long(&self, symbol: &str) -> bool {
        self.long_symbols.iter().any(|s| s == symbol)
    }

    pub fn allows_short_2x(&self, symbol: &str) -> bool {
        self.short_symbols.iter().any(|s| s == symbol)
    }
}
