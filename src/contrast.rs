//! Intensity transfer functions.
//!
//! Every mapping sends the input's `[min, max]` onto itself, so the output
//! never leaves the range of the buffer it was computed from. Non-finite
//! samples pass through untouched.

use crate::error::{PipelineError, PipelineResult};

use ndarray::Array3;

/// Bins used for histogram equalization.
pub const EQUALIZATION_BINS: usize = 256;
/// Gain of the logarithmic curve, `ln(1 + K t) / ln(1 + K)`.
pub const LOG_GAIN: f32 = 255.0;
pub const MAX_EXPONENTIAL_STRENGTH: f32 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ContrastMethod {
    /// Stretch the `[low, high]` percentile window over the full range.
    LinearStretch {
        low_percentile: f32,
        high_percentile: f32,
    },
    HistogramEqualization,
    /// Expands dark intensities.
    Logarithmic,
    /// Expands bright intensities, `(e^(k t) - 1) / (e^k - 1)`.
    Exponential { strength: f32 },
}

impl Default for ContrastMethod {
    fn default() -> Self {
        ContrastMethod::LinearStretch {
            low_percentile: 2.0,
            high_percentile: 98.0,
        }
    }
}

impl ContrastMethod {
    pub fn name(&self) -> &'static str {
        match self {
            ContrastMethod::LinearStretch { .. } => "LinearStretch",
            ContrastMethod::HistogramEqualization => "HistogramEqualization",
            ContrastMethod::Logarithmic => "Logarithmic",
            ContrastMethod::Exponential { .. } => "Exponential",
        }
    }

    pub fn validate(&self) -> PipelineResult<()> {
        match *self {
            ContrastMethod::LinearStretch {
                low_percentile,
                high_percentile,
            } => {
                let in_range = |p: f32| (0.0..=100.0).contains(&p);
                if !in_range(low_percentile) || !in_range(high_percentile) {
                    return Err(PipelineError::invalid(
                        self.name(),
                        "percentiles must lie in [0, 100]",
                    ));
                }
                if low_percentile >= high_percentile {
                    return Err(PipelineError::invalid(
                        self.name(),
                        format!("low percentile {low_percentile} must be below high {high_percentile}"),
                    ));
                }
                Ok(())
            }
            ContrastMethod::Exponential { strength } => {
                if !(strength > 0.0 && strength <= MAX_EXPONENTIAL_STRENGTH) {
                    return Err(PipelineError::invalid(
                        self.name(),
                        format!("strength {strength} outside (0, {MAX_EXPONENTIAL_STRENGTH}]"),
                    ));
                }
                Ok(())
            }
            ContrastMethod::HistogramEqualization | ContrastMethod::Logarithmic => Ok(()),
        }
    }

    /// Apply the curve to `data`, whose observed range is `range`.
    pub(crate) fn apply(&self, data: &Array3<f32>, range: (f32, f32)) -> Array3<f32> {
        let (min, max) = range;
        let span = max - min;
        if span <= 0.0 {
            return data.clone();
        }
        let normalized = |v: f32| (v - min) / span;
        let denormalized = |t: f32| t.clamp(0.0, 1.0).mul_add(span, min);

        match *self {
            ContrastMethod::LinearStretch {
                low_percentile,
                high_percentile,
            } => {
                let Some((lo, hi)) = percentile_window(data, low_percentile, high_percentile) else {
                    return data.clone();
                };
                if hi <= lo {
                    return data.clone();
                }
                map_finite(data, |v| denormalized((v - lo) / (hi - lo)))
            }
            ContrastMethod::HistogramEqualization => {
                let cdf = cumulative_histogram(data, range);
                let total = cdf[EQUALIZATION_BINS - 1];
                let first = cdf.iter().copied().find(|&c| c > 0).unwrap_or(0);
                if total <= first {
                    return data.clone();
                }
                let denominator = (total - first) as f32;
                map_finite(data, |v| {
                    let bin = equalization_bin(normalized(v));
                    denormalized((cdf[bin] - first) as f32 / denominator)
                })
            }
            ContrastMethod::Logarithmic => {
                let scale = 1.0 / LOG_GAIN.ln_1p();
                map_finite(data, |v| {
                    denormalized((normalized(v).max(0.0) * LOG_GAIN).ln_1p() * scale)
                })
            }
            ContrastMethod::Exponential { strength } => {
                let scale = 1.0 / strength.exp_m1();
                map_finite(data, |v| denormalized((strength * normalized(v)).exp_m1() * scale))
            }
        }
    }
}

fn map_finite<F: Fn(f32) -> f32>(data: &Array3<f32>, f: F) -> Array3<f32> {
    data.mapv(|v| if v.is_finite() { f(v) } else { v })
}

#[inline]
fn equalization_bin(t: f32) -> usize {
    ((t * EQUALIZATION_BINS as f32) as usize).min(EQUALIZATION_BINS - 1)
}

fn cumulative_histogram(data: &Array3<f32>, (min, max): (f32, f32)) -> Vec<u64> {
    let span = max - min;
    let mut counts = vec![0u64; EQUALIZATION_BINS];
    for &v in data.iter().filter(|v| v.is_finite()) {
        counts[equalization_bin((v - min) / span)] += 1;
    }
    let mut running = 0u64;
    for c in &mut counts {
        running += *c;
        *c = running;
    }
    counts
}

/// Sample values at the two percentiles (nearest rank).
fn percentile_window(data: &Array3<f32>, low: f32, high: f32) -> Option<(f32, f32)> {
    let mut values: Vec<f32> = data.iter().copied().filter(|v| v.is_finite()).collect();
    if values.is_empty() {
        return None;
    }
    let last = values.len() - 1;
    let rank = |p: f32| ((p / 100.0) * last as f32).round() as usize;
    let (lo_rank, hi_rank) = (rank(low), rank(high));
    let lo = *values.select_nth_unstable_by(lo_rank, f32::total_cmp).1;
    let hi = *values.select_nth_unstable_by(hi_rank, f32::total_cmp).1;
    Some((lo, hi))
}

/// Brightness/contrast on normalized intensity:
/// `t' = clamp(t * contrast + brightness, 0, 1)`.
pub(crate) fn brightness_contrast(
    data: &Array3<f32>,
    (min, max): (f32, f32),
    brightness: f32,
    contrast: f32,
) -> Array3<f32> {
    let span = max - min;
    if span <= 0.0 {
        return data.clone();
    }
    map_finite(data, |v| {
        let t = ((v - min) / span).mul_add(contrast, brightness);
        t.clamp(0.0, 1.0).mul_add(span, min)
    })
}
