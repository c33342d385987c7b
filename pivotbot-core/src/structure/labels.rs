//! Structure labels from forward-filled pivot series.
//!
//! Each newly filled pivot is compared with the previous filled value of the
//! same type under strict `<` / `>`; ties and undefined values carry the
//! prior label forward. Before any comparison is possible the label defaults
//! to the extreme (HH for highs, LL for lows).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HighStructure {
    HigherHigh,
    LowerHigh,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LowStructure {
    LowerLow,
    HigherLow,
}

pub fn high_structure(filled: &[f64]) -> Vec<HighStructure> {
    let mut out = vec![HighStructure::HigherHigh; filled.len()];
    let mut current = HighStructure::HigherHigh;
    for i in 1..filled.len() {
        if filled[i] > filled[i - 1] {
            current = HighStructure::HigherHigh;
        } else if filled[i] < filled[i - 1] {
            current = HighStructure::LowerHigh;
        }
        out[i] = current;
    }
    out
}

pub fn low_structure(filled: &[f64]) -> Vec<LowStructure> {
    let mut out = vec![LowStructure::LowerLow; filled.len()];
    let mut current = LowStructure::LowerLow;
    for i in 1..filled.len() {
        if filled[i] > filled[i - 1] {
            current = LowStructure::HigherLow;
        } else if filled[i] < filled[i - 1] {
            current = LowStructure::LowerLow;
        }
        out[i] = current;
    }
    out
}
