//! Nadaraya-Watson kernel envelope.
//!
//! Gaussian-weighted average of trailing closes (weight by lag: exp(-k²/2h²)),
//! band half-width = multiplier × mean absolute deviation of the trailing
//! window from the smoothed series. The deviation window reads previously
//! smoothed values, so bands stay undefined until 2·(window−1) bars exist.
//!
//! O(window) per bar; fine at a few hundred bars per cycle.

use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct EnvelopeSeries {
    pub smooth: Vec<f64>,
    pub upper: Vec<f64>,
    pub lower: Vec<f64>,
}

pub fn nadaraya_watson(
    bars: &[Bar],
    bandwidth: f64,
    multiplier: f64,
    window_size: usize,
) -> EnvelopeSeries {
    let n = bars.len();
    let mut smooth = vec![f64::NAN; n];
    let mut upper = vec![f64::NAN; n];
    let mut lower = vec![f64::NAN; n];

    if window_size == 0 || n == 0 {
        return EnvelopeSeries {
            smooth,
            upper,
            lower,
        };
    }

    // weight for a bar `k` lags back
    let weights: Vec<f64> = (0..window_size)
        .map(|k| (-((k * k) as f64) / (bandwidth * bandwidth * 2.0)).exp())
        .collect();
    let weight_sum: f64 = weights.iter().sum();

    for i in 0..n {
        if i + 1 < window_size {
            continue;
        }

        let mut acc = 0.0;
        let mut valid = true;
        for (k, w) in weights.iter().enumerate() {
            let close = bars[i - k].close;
            if close.is_nan() {
                valid = false;
                break;
            }
            acc += close * w;
        }
        if !valid {
            continue;
        }
        smooth[i] = acc / weight_sum;

        // Mean absolute deviation over the trailing window against the
        // smoothed series; any undefined smooth value poisons the mean.
        let start = i + 1 - window_size;
        let mut dev_sum = 0.0;
        let mut dev_valid = true;
        for j in start..=i {
            if smooth[j].is_nan() || bars[j].close.is_nan() {
                dev_valid = false;
                break;
            }
            dev_sum += (bars[j].close - smooth[j]).abs();
        }
        if dev_valid {
            let mae = dev_sum / window_size as f64 * multiplier;
            upper[i] = smooth[i] + mae;
            lower[i] = smooth[i] - mae;
        }
    }

    EnvelopeSeries {
        smooth,
        upper,
        lower,
    }
}
