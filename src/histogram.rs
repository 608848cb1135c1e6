use crate::error::{PipelineError, PipelineResult};
use crate::volume::Volume;

use rayon::prelude::*;

/// One histogram bin covering `[lower, upper)`; the last bin is closed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistogramBin {
    pub lower: f32,
    pub upper: f32,
    pub count: u64,
}

/// Bin the finite samples of `volume` over its current intensity range.
///
/// Always recomputed from the buffer; nothing is cached. The maximum lands in
/// the last bin and a constant buffer puts every sample in the first one.
pub fn histogram(volume: &Volume, bin_count: usize) -> PipelineResult<Vec<HistogramBin>> {
    if bin_count == 0 {
        return Err(PipelineError::invalid("Histogram", "bin count must be positive"));
    }
    let (min, max) = volume.intensity_range();
    let span = max - min;
    let bin_width = span / bin_count as f32;

    let counts = volume
        .data()
        .par_iter()
        .filter(|v| v.is_finite())
        .fold(
            || vec![0u64; bin_count],
            |mut counts, &v| {
                let bin = if span > 0.0 {
                    (((v - min) / span * bin_count as f32) as usize).min(bin_count - 1)
                } else {
                    0
                };
                counts[bin] += 1;
                counts
            },
        )
        .reduce(
            || vec![0u64; bin_count],
            |mut a, b| {
                for (x, y) in a.iter_mut().zip(b) {
                    *x += y;
                }
                a
            },
        );

    Ok(counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| HistogramBin {
            lower: min + bin_width * i as f32,
            upper: if i + 1 == bin_count {
                max
            } else {
                min + bin_width * (i + 1) as f32
            },
            count,
        })
        .collect())
}
