//! PivotBot Runner — cycle orchestration on top of `pivotbot-core`.
//!
//! This crate builds on the core to provide:
//! - The `TradingBot` cycle loop (fetch, features, signal, manage)
//! - Startup bootstrap (leverage + reconciliation)
//! - JSON-serializable cycle reports for the CLI

pub mod bot;
pub mod report;

pub use bot::{RunError, TradingBot};
pub use report::{CycleReport, SymbolOutcome, SymbolScan};
