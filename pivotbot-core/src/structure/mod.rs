//! Zigzag structure detection: pivot state machine, structure labels, and
//! the per-bar signal flags composed from them.

pub mod flags;
pub mod labels;
pub mod zigzag;

pub use flags::{structure_flags, FilterContext, StructureFlags};
pub use labels::{high_structure, low_structure, HighStructure, LowStructure};
pub use zigzag::{detect, Direction, PivotKind, StepOutcome, ZigzagSeries, ZigzagState};
