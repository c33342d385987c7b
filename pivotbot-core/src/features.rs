//! Per-symbol feature frame: every derived series for a bar history, plus a
//! snapshot of the latest row for signal evaluation and trade sizing.
//!
//! `FeatureFrame::compute` is a pure function of (bars, symbol, settings);
//! no hidden state survives between cycles.

use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, Settings};
use crate::domain::Bar;
use crate::indicators::{
    atr, donchian, nadaraya_watson, rsi, sma, sma_trend, z_series, DonchianSeries, EnvelopeSeries,
    Trend,
};
use crate::structure::{
    high_structure, low_structure, structure_flags, FilterContext, HighStructure, LowStructure,
    StructureFlags, ZigzagSeries,
};

pub const RSI_WINDOW: usize = 14;
pub const ATR_WINDOW: usize = 14;
pub const DONCHIAN_WINDOWS: [usize; 2] = [20, 50];
pub const SMA_SHORT: usize = 50;
pub const SMA_LONG: usize = 200;
pub const NW_BANDWIDTH: f64 = 8.0;
pub const NW_MULTIPLIER: f64 = 3.0;
pub const NW_WINDOW: usize = 50;

/// One zigzag run with its labels and composed flags.
#[derive(Debug, Clone)]
pub struct StructureFamily {
    pub zigzag: ZigzagSeries,
    pub high_labels: Vec<HighStructure>,
    pub low_labels: Vec<LowStructure>,
    pub flags: StructureFlags,
}

#[derive(Debug, Clone)]
pub struct FeatureFrame {
    pub symbol: String,
    pub bars: Vec<Bar>,
    pub rsi: Vec<f64>,
    pub atr: Vec<f64>,
    pub pct_atr: Vec<f64>,
    pub z: Vec<f64>,
    pub pct_z: Vec<f64>,
    pub donchian_20: DonchianSeries,
    pub donchian_50: DonchianSeries,
    pub sma_50: Vec<f64>,
    pub sma_200: Vec<f64>,
    pub trend: Vec<Trend>,
    pub envelope: EnvelopeSeries,
    /// Multiplier-2 run: trend filter + secondary breakout enabled.
    pub family_2x: StructureFamily,
    /// Multiplier-3 run: no trend filter, no secondary breakout.
    pub family_3x: StructureFamily,
}

/// The latest row of a frame — all the signal composer and the position
/// manager ever read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub symbol: String,
    pub close: f64,
    pub atr: f64,
    pub pct_atr: f64,
    pub rsi: f64,
    pub trend: Trend,
    pub go_up_2x: bool,
    pub go_down_2x: bool,
    pub breakout_2x: bool,
    pub breakdown_2x: bool,
    pub go_up_3x: bool,
    pub go_down_3x: bool,
    pub breakout_3x: bool,
    pub breakdown_3x: bool,
}

impl FeatureFrame {
    pub fn compute(
        symbol: &str,
        bars: Vec<Bar>,
        settings: &Settings,
    ) -> Result<Self, ConfigError> {
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();

        let atr_series = atr(&bars, ATR_WINDOW);
        let pct_atr: Vec<f64> = atr_series
            .iter()
            .zip(closes.iter())
            .map(|(&a, &c)| a / c * 100.0)
            .collect();

        let z = z_series(&bars, &atr_series, symbol, settings)?;
        let pct_z: Vec<f64> = z
            .iter()
            .zip(closes.iter())
            .map(|(&zv, &c)| zv / c * 100.0)
            .collect();

        let rsi_series = rsi(&bars, RSI_WINDOW);
        let donchian_20 = donchian(&bars, DONCHIAN_WINDOWS[0]);
        let donchian_50 = donchian(&bars, DONCHIAN_WINDOWS[1]);
        let sma_50 = sma(&bars, SMA_SHORT);
        let sma_200 = sma(&bars, SMA_LONG);
        let trend = sma_trend(&bars, SMA_SHORT, SMA_LONG);
        let envelope = nadaraya_watson(&bars, NW_BANDWIDTH, NW_MULTIPLIER, NW_WINDOW);

        let atr_range = settings.atr_range(symbol)?;

        let family_2x = build_family(
            &closes, &z, 2.0, &pct_atr, &envelope, &trend, atr_range, true, true,
        );
        let family_3x = build_family(
            &closes, &z, 3.0, &pct_atr, &envelope, &trend, atr_range, false, false,
        );

        Ok(Self {
            symbol: symbol.to_string(),
            bars,
            rsi: rsi_series,
            atr: atr_series,
            pct_atr,
            z,
            pct_z,
            donchian_20,
            donchian_50,
            sma_50,
            sma_200,
            trend,
            envelope,
            family_2x,
            family_3x,
        })
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn snapshot(&self, i: usize) -> Snapshot {
        Snapshot {
            symbol: self.symbol.clone(),
            close: self.bars[i].close,
            atr: self.atr[i],
            pct_atr: self.pct_atr[i],
            rsi: self.rsi[i],
            trend: self.trend[i],
            go_up_2x: self.family_2x.flags.go_up[i],
            go_down_2x: self.family_2x.flags.go_down[i],
            breakout_2x: self.family_2x.flags.breakout[i],
            breakdown_2x: self.family_2x.flags.breakdown[i],
            go_up_3x: self.family_3x.flags.go_up[i],
            go_down_3x: self.family_3x.flags.go_down[i],
            breakout_3x: self.family_3x.flags.breakout[i],
            breakdown_3x: self.family_3x.flags.breakdown[i],
        }
    }

    /// Snapshot of the newest bar, if any bars exist.
    pub fn latest(&self) -> Option<Snapshot> {
        if self.is_empty() {
            None
        } else {
            Some(self.snapshot(self.len() - 1))
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn build_family(
    closes: &[f64],
    z: &[f64],
    multiplier: f64,
    pct_atr: &[f64],
    envelope: &EnvelopeSeries,
    trend: &[Trend],
    atr_range: (f64, f64),
    trend_filtered: bool,
    with_secondary: bool,
) -> StructureFamily {
    let zigzag = crate::structure::detect(closes, z, multiplier);
    let high_labels = high_structure(&zigzag.high_pivot_filled);
    let low_labels = low_structure(&zigzag.low_pivot_filled);
    let ctx = FilterContext {
        closes,
        pct_atr,
        nw_upper: &envelope.upper,
        nw_lower: &envelope.lower,
        trend,
        atr_range,
    };
    let flags = structure_flags(
        &zigzag,
        &high_labels,
        &low_labels,
        &ctx,
        trend_filtered,
        with_secondary,
    );
    StructureFamily {
        zigzag,
        high_labels,
        low_labels,
        flags,
    }
}
