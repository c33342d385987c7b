//! Position lifecycle management: sizing-to-bracket flow, OCO emulation,
//! and restart reconciliation.

pub mod bracket;
pub mod levels;
pub mod manager;

pub use bracket::OcoOutcome;
pub use levels::{calculate_levels, BracketLevels};
pub use manager::{PositionManager, TradeError, QTY_TOLERANCE};
