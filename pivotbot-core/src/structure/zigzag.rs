//! ATR-adaptive zigzag pivot detection.
//!
//! An explicit state machine driven bar-by-bar over closes, thresholded by
//! the current bar's z value times a sensitivity multiplier. Pivots are
//! recorded at their origin index (where the extreme printed), confirmation
//! is flagged at the bar where price reversed far enough. Two parallel runs
//! (multiplier 2 and 3) feed the signal flags.

use serde::{Deserialize, Serialize};

/// Zigzag trend state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    NoDirection,
    TrendingUp,
    TrendingDown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PivotKind {
    High,
    Low,
}

/// What a single transition produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StepOutcome {
    /// No pivot activity this bar.
    None,
    /// First qualifying deviation set the trend direction; the origin bar is
    /// retroactively marked as the opposite-type pivot, without a
    /// confirmation flag.
    DirectionSet {
        kind: PivotKind,
        origin_index: usize,
        price: f64,
    },
    /// The running candidate reversed by at least the threshold and is now a
    /// confirmed pivot.
    Confirmed {
        kind: PivotKind,
        origin_index: usize,
        price: f64,
        bars_ago: usize,
    },
}

/// Incremental zigzag state: current direction plus the running pivot
/// candidate. `step` is a pure transition function over (state, bar),
/// testable without any tabular representation.
#[derive(Debug, Clone)]
pub struct ZigzagState {
    direction: Direction,
    candidate_price: f64,
    candidate_index: usize,
}

impl ZigzagState {
    /// Seed the candidate at the first bar.
    pub fn new(first_close: f64) -> Self {
        Self {
            direction: Direction::NoDirection,
            candidate_price: first_close,
            candidate_index: 0,
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Advance one bar. `threshold` is z[index] × multiplier; a NaN threshold
    /// compares false and leaves the state untouched.
    pub fn step(&mut self, index: usize, close: f64, threshold: f64) -> StepOutcome {
        match self.direction {
            Direction::NoDirection => {
                if close >= self.candidate_price + threshold {
                    // Price ran up from the origin bar, so the origin was a low.
                    self.direction = Direction::TrendingUp;
                    StepOutcome::DirectionSet {
                        kind: PivotKind::Low,
                        origin_index: self.candidate_index,
                        price: self.candidate_price,
                    }
                } else if close <= self.candidate_price - threshold {
                    self.direction = Direction::TrendingDown;
                    StepOutcome::DirectionSet {
                        kind: PivotKind::High,
                        origin_index: self.candidate_index,
                        price: self.candidate_price,
                    }
                } else {
                    StepOutcome::None
                }
            }
            Direction::TrendingUp => {
                if close <= self.candidate_price - threshold {
                    let outcome = StepOutcome::Confirmed {
                        kind: PivotKind::High,
                        origin_index: self.candidate_index,
                        price: self.candidate_price,
                        bars_ago: index - self.candidate_index,
                    };
                    self.direction = Direction::TrendingDown;
                    self.candidate_price = close;
                    self.candidate_index = index;
                    outcome
                } else if close > self.candidate_price {
                    self.candidate_price = close;
                    self.candidate_index = index;
                    StepOutcome::None
                } else {
                    StepOutcome::None
                }
            }
            Direction::TrendingDown => {
                if close >= self.candidate_price + threshold {
                    let outcome = StepOutcome::Confirmed {
                        kind: PivotKind::Low,
                        origin_index: self.candidate_index,
                        price: self.candidate_price,
                        bars_ago: index - self.candidate_index,
                    };
                    self.direction = Direction::TrendingUp;
                    self.candidate_price = close;
                    self.candidate_index = index;
                    outcome
                } else if close < self.candidate_price {
                    self.candidate_price = close;
                    self.candidate_index = index;
                    StepOutcome::None
                } else {
                    StepOutcome::None
                }
            }
        }
    }
}

/// Per-bar zigzag output for one (symbol, multiplier) run.
///
/// Raw series hold values only at origin/confirmation indices; `*_filled`
/// variants carry the last known value forward so every later bar sees the
/// latest confirmed pivot and its age.
#[derive(Debug, Clone)]
pub struct ZigzagSeries {
    pub multiplier: f64,
    /// Pivot price at its origin index, NaN elsewhere.
    pub high_pivot: Vec<f64>,
    pub low_pivot: Vec<f64>,
    /// z value at the pivot's origin bar.
    pub high_pivot_z: Vec<f64>,
    pub low_pivot_z: Vec<f64>,
    /// True at the bar where the pivot confirmed.
    pub high_confirmed: Vec<bool>,
    pub low_confirmed: Vec<bool>,
    /// Bars between origin and confirmation, at the confirmation bar.
    pub bars_ago: Vec<Option<usize>>,
    pub high_pivot_filled: Vec<f64>,
    pub low_pivot_filled: Vec<f64>,
    pub high_pivot_z_filled: Vec<f64>,
    pub low_pivot_z_filled: Vec<f64>,
    /// True once any pivot of the type has confirmed at or before the bar.
    pub high_confirm_seen: Vec<bool>,
    pub low_confirm_seen: Vec<bool>,
    /// Age of the latest confirmation, incremented per bar since.
    pub bars_ago_filled: Vec<Option<usize>>,
}

/// Run the zigzag state machine over a close/z series pair.
///
/// `closes` and `z` must be the same length; thresholds use the current
/// bar's z, pivot-z annotations use the origin bar's z.
pub fn detect(closes: &[f64], z: &[f64], multiplier: f64) -> ZigzagSeries {
    assert_eq!(closes.len(), z.len(), "closes and z must be aligned");
    let n = closes.len();

    let mut series = ZigzagSeries {
        multiplier,
        high_pivot: vec![f64::NAN; n],
        low_pivot: vec![f64::NAN; n],
        high_pivot_z: vec![f64::NAN; n],
        low_pivot_z: vec![f64::NAN; n],
        high_confirmed: vec![false; n],
        low_confirmed: vec![false; n],
        bars_ago: vec![None; n],
        high_pivot_filled: vec![f64::NAN; n],
        low_pivot_filled: vec![f64::NAN; n],
        high_pivot_z_filled: vec![f64::NAN; n],
        low_pivot_z_filled: vec![f64::NAN; n],
        high_confirm_seen: vec![false; n],
        low_confirm_seen: vec![false; n],
        bars_ago_filled: vec![None; n],
    };

    if n == 0 {
        return series;
    }

    let mut state = ZigzagState::new(closes[0]);

    for i in 1..n {
        let threshold = z[i] * multiplier;
        match state.step(i, closes[i], threshold) {
            StepOutcome::None => {}
            StepOutcome::DirectionSet {
                kind,
                origin_index,
                price,
            } => {
                let (pivot, pivot_z) = match kind {
                    PivotKind::High => (&mut series.high_pivot, &mut series.high_pivot_z),
                    PivotKind::Low => (&mut series.low_pivot, &mut series.low_pivot_z),
                };
                pivot[origin_index] = price;
                pivot_z[origin_index] = z[origin_index];
            }
            StepOutcome::Confirmed {
                kind,
                origin_index,
                price,
                bars_ago,
            } => {
                match kind {
                    PivotKind::High => {
                        series.high_pivot[origin_index] = price;
                        series.high_pivot_z[origin_index] = z[origin_index];
                        series.high_confirmed[i] = true;
                    }
                    PivotKind::Low => {
                        series.low_pivot[origin_index] = price;
                        series.low_pivot_z[origin_index] = z[origin_index];
                        series.low_confirmed[i] = true;
                    }
                }
                series.bars_ago[i] = Some(bars_ago);
            }
        }
    }

    // Explicit last-known-value passes (pivot values were written
    // retroactively at their origin indices, so filling runs after the scan).
    forward_fill(&series.high_pivot, &mut series.high_pivot_filled);
    forward_fill(&series.low_pivot, &mut series.low_pivot_filled);
    forward_fill(&series.high_pivot_z, &mut series.high_pivot_z_filled);
    forward_fill(&series.low_pivot_z, &mut series.low_pivot_z_filled);

    let mut seen = false;
    for i in 0..n {
        seen |= series.high_confirmed[i];
        series.high_confirm_seen[i] = seen;
    }
    let mut seen = false;
    for i in 0..n {
        seen |= series.low_confirmed[i];
        series.low_confirm_seen[i] = seen;
    }

    let mut last: Option<(usize, usize)> = None; // (bars_ago at anchor, anchor index)
    for i in 0..n {
        if let Some(v) = series.bars_ago[i] {
            last = Some((v, i));
        }
        series.bars_ago_filled[i] = last.map(|(v, at)| v + (i - at));
    }

    series
}

fn forward_fill(raw: &[f64], filled: &mut [f64]) {
    let mut last = f64::NAN;
    for (i, &v) in raw.iter().enumerate() {
        if !v.is_nan() {
            last = v;
        }
        filled[i] = last;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // z = 1.0 everywhere keeps thresholds readable: flip distance = multiplier.
    fn run(closes: &[f64], multiplier: f64) -> ZigzagSeries {
        let z = vec![1.0; closes.len()];
        detect(closes, &z, multiplier)
    }

    #[test]
    fn direction_set_marks_opposite_type_pivot() {
        // Rise of 2.0 from bar 0 with multiplier 2 sets TrendingUp and marks
        // bar 0 as a low pivot, unconfirmed.
        let series = run(&[100.0, 101.0, 102.0, 103.0], 2.0);
        assert_eq!(series.low_pivot[0], 100.0);
        assert!(series.high_pivot.iter().all(|v| v.is_nan()));
        assert!(series.low_confirmed.iter().all(|&c| !c));
    }

    #[test]
    fn reversal_confirms_high_pivot_at_origin() {
        // Up to 105 at bar 3, then a 3-point drop confirms the high at bar 3
        // with the confirmation flag at bar 4.
        let series = run(&[100.0, 103.0, 104.0, 105.0, 102.0], 2.0);
        assert_eq!(series.high_pivot[3], 105.0);
        assert!(series.high_confirmed[4]);
        assert_eq!(series.bars_ago[4], Some(1));
        // Filled series sees the pivot from its origin onward.
        assert!(series.high_pivot_filled[2].is_nan());
        assert_eq!(series.high_pivot_filled[3], 105.0);
        assert_eq!(series.high_pivot_filled[4], 105.0);
    }

    #[test]
    fn candidate_advances_without_confirmation() {
        let mut state = ZigzagState::new(100.0);
        assert_eq!(
            state.step(1, 103.0, 2.0),
            StepOutcome::DirectionSet {
                kind: PivotKind::Low,
                origin_index: 0,
                price: 100.0
            }
        );
        assert_eq!(state.step(2, 104.0, 2.0), StepOutcome::None);
        assert_eq!(state.step(3, 106.0, 2.0), StepOutcome::None);
        // Pullback smaller than threshold: still no pivot.
        assert_eq!(state.step(4, 105.0, 2.0), StepOutcome::None);
        // Full reversal confirms the high at bar 3.
        assert_eq!(
            state.step(5, 103.0, 2.0),
            StepOutcome::Confirmed {
                kind: PivotKind::High,
                origin_index: 3,
                price: 106.0,
                bars_ago: 2
            }
        );
        assert_eq!(state.direction(), Direction::TrendingDown);
    }

    #[test]
    fn confirmed_pivot_origins_strictly_increase() {
        let closes = [
            100.0, 104.0, 103.0, 108.0, 104.0, 110.0, 105.0, 99.0, 104.0, 98.0, 105.0,
        ];
        let series = run(&closes, 2.0);
        let mut origins: Vec<usize> = Vec::new();
        for i in 0..closes.len() {
            if !series.high_pivot[i].is_nan() || !series.low_pivot[i].is_nan() {
                origins.push(i);
            }
        }
        for w in origins.windows(2) {
            assert!(w[0] < w[1]);
        }
    }

    #[test]
    fn bars_ago_filled_increments() {
        let series = run(&[100.0, 103.0, 104.0, 105.0, 102.0, 102.5, 102.4], 2.0);
        // Confirmation at bar 4 (bars_ago 1), then ages by one per bar.
        assert_eq!(series.bars_ago_filled[3], None);
        assert_eq!(series.bars_ago_filled[4], Some(1));
        assert_eq!(series.bars_ago_filled[5], Some(2));
        assert_eq!(series.bars_ago_filled[6], Some(3));
    }

    #[test]
    fn nan_threshold_freezes_state() {
        let closes = [100.0, 103.0, 104.0];
        let z = [1.0, f64::NAN, f64::NAN];
        let series = detect(&closes, &z, 2.0);
        assert!(series.low_pivot.iter().all(|v| v.is_nan()));
        assert!(series.high_pivot.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn down_then_up_roundtrip() {
        // Fall sets TrendingDown marking bar 0 as the high, rally confirms
        // the low.
        let series = run(&[100.0, 97.0, 95.0, 99.0], 2.0);
        assert_eq!(series.high_pivot[0], 100.0);
        assert_eq!(series.low_pivot[2], 95.0);
        assert!(series.low_confirmed[3]);
        assert!(series.low_confirm_seen[3]);
        assert!(!series.low_confirm_seen[2]);
    }
}
