//! Cycle reporting types, serialized as JSON by the CLI.

use serde::{Deserialize, Serialize};

use pivotbot_core::domain::Signal;
use pivotbot_core::features::Snapshot;

/// What the bot did for one symbol this cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolOutcome {
    pub symbol: String,
    pub signal: Option<Signal>,
    /// Human-readable action taken ("opened long", "bracket refreshed", ...).
    pub action: String,
}

/// Summary of one full trading cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleReport {
    pub success: bool,
    pub elapsed_secs: f64,
    pub symbols_processed: usize,
    pub outcomes: Vec<SymbolOutcome>,
    pub errors: Vec<String>,
}

impl CycleReport {
    pub fn signal_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.signal.is_some()).count()
    }
}

/// One symbol's evaluated state, for the read-only scan command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolScan {
    pub snapshot: Snapshot,
    pub signal: Option<Signal>,
}
