//! PivotBot Core — indicators, structure detection, signals, and position
//! lifecycle for the automated futures agent.
//!
//! This crate contains everything below the cycle runner:
//! - Domain types (bars, signals, positions, OCO pairs)
//! - Indicator layer (ATR, RSI, Donchian channels, SMA trend, envelope)
//! - ATR-adaptive zigzag pivots, structure labels, and entry flags
//! - Signal composition over the per-symbol allow-lists
//! - Risk-based sizing and bracket level calculation
//! - Position manager: entry verification, OCO emulation, reconciliation
//! - The `Exchange` trait and its Bybit v5 implementation

pub mod clock;
pub mod config;
pub mod domain;
pub mod exchange;
pub mod features;
pub mod indicators;
pub mod positions;
pub mod signals;
pub mod sizing;
pub mod structure;
