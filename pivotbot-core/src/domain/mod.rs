//! Domain types: bars, signals, positions, OCO pairs.

pub mod bar;
pub mod position;
pub mod signal;

pub use bar::Bar;
pub use position::{OcoPair, OrderSide, Position};
pub use signal::Signal;
