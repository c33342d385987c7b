//! Signal composer: structure flags in, directional signal out.
//!
//! Stateless and O(1) — reads only the latest snapshot. Long takes priority;
//! the short trigger is evaluated only when the long check fails.

use crate::config::Settings;
use crate::domain::Signal;
use crate::features::Snapshot;

/// Evaluate the entry signal for one symbol's latest snapshot.
pub fn compose(snapshot: &Snapshot, settings: &Settings) -> Option<Signal> {
    if check_long_entry(snapshot, settings) {
        Some(Signal::Long)
    } else if check_short_entry(snapshot, settings) {
        Some(Signal::Short)
    } else {
        None
    }
}

fn check_long_entry(snapshot: &Snapshot, settings: &Settings) -> bool {
    settings.allows_long(&snapshot.symbol) && snapshot.breakout_2x
}

fn check_short_entry(snapshot: &Snapshot, settings: &Settings) -> bool {
    // Allow-listed symbols short on the 2x breakdown; the rest fall back to
    // the 3x reversal column.
    if settings.allows_short_2x(&snapshot.symbol) {
        snapshot.breakdown_2x
    } else {
        snapshot.go_down_3x
    }
}
