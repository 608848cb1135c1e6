//! Image quality metrics over regions of interest.

use crate::volume::Volume;

use ndarray::s;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum MetricError {
    #[error("Region {0:?} contains no samples")]
    EmptyRegion(Roi),

    #[error("{metric} is undefined: {reason}")]
    UndefinedMetric {
        metric: &'static str,
        reason: &'static str,
    },
}

pub type MetricResult<T> = Result<T, MetricError>;

/// Axis-aligned box used only for measurement. Regions are clipped to the
/// buffer before sampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Roi {
    pub x: usize,
    pub y: usize,
    pub z: usize,
    pub width: usize,
    pub height: usize,
    pub depth: usize,
}

impl Roi {
    /// Rectangle on the first slice.
    pub fn rect(x: usize, y: usize, width: usize, height: usize) -> Self {
        Self {
            x,
            y,
            z: 0,
            width,
            height,
            depth: 1,
        }
    }

    pub fn cuboid(origin: (usize, usize, usize), size: (usize, usize, usize)) -> Self {
        Self {
            x: origin.0,
            y: origin.1,
            z: origin.2,
            width: size.0,
            height: size.1,
            depth: size.2,
        }
    }

    /// The whole buffer.
    pub fn full(volume: &Volume) -> Self {
        let (depth, height, width) = volume.dim();
        Self::cuboid((0, 0, 0), (width, height, depth))
    }
}

/// Summary of the finite samples inside a region.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionStats {
    pub count: usize,
    pub mean: f64,
    /// Population standard deviation
    pub std_dev: f64,
    pub min: f32,
    pub max: f32,
}

pub fn region_stats(volume: &Volume, roi: &Roi) -> MetricResult<RegionStats> {
    let (depth, height, width) = volume.dim();
    let z_end = roi.z.saturating_add(roi.depth).min(depth);
    let y_end = roi.y.saturating_add(roi.height).min(height);
    let x_end = roi.x.saturating_add(roi.width).min(width);
    if roi.z >= z_end || roi.y >= y_end || roi.x >= x_end {
        return Err(MetricError::EmptyRegion(*roi));
    }

    let region = volume
        .data()
        .slice(s![roi.z..z_end, roi.y..y_end, roi.x..x_end]);

    let mut count = 0usize;
    let mut sum = 0f64;
    let mut min = f32::INFINITY;
    let mut max = f32::NEG_INFINITY;
    for &v in region.iter().filter(|v| v.is_finite()) {
        count += 1;
        sum += v as f64;
        min = min.min(v);
        max = max.max(v);
    }
    if count == 0 {
        return Err(MetricError::EmptyRegion(*roi));
    }
    let mean = sum / count as f64;

    let variance_sum: f64 = region
        .iter()
        .filter(|v| v.is_finite())
        .map(|&v| {
            let diff = v as f64 - mean;
            diff * diff
        })
        .sum();

    Ok(RegionStats {
        count,
        mean,
        std_dev: (variance_sum / count as f64).sqrt(),
        min,
        max,
    })
}

fn checked_ratio(metric: &'static str, numerator: f64, std_dev: f64) -> MetricResult<f64> {
    if std_dev == 0.0 {
        return Err(MetricError::UndefinedMetric {
            metric,
            reason: "standard deviation is zero",
        });
    }
    let ratio = numerator / std_dev;
    if !ratio.is_finite() {
        return Err(MetricError::UndefinedMetric {
            metric,
            reason: "result is not finite",
        });
    }
    Ok(ratio)
}

/// SNR = mean(roi) / stddev(roi).
pub fn compute_snr(volume: &Volume, roi: &Roi) -> MetricResult<f64> {
    let stats = region_stats(volume, roi)?;
    checked_ratio("SNR", stats.mean, stats.std_dev)
}

/// CNR = |mean(a) - mean(b)| / stddev(b), treating `roi_b` as background.
pub fn compute_cnr(volume: &Volume, roi_a: &Roi, roi_b: &Roi) -> MetricResult<f64> {
    compute_cnr_with_background(volume, roi_a, roi_b, roi_b)
}

/// CNR = |mean(a) - mean(b)| / stddev(background).
pub fn compute_cnr_with_background(
    volume: &Volume,
    roi_a: &Roi,
    roi_b: &Roi,
    background: &Roi,
) -> MetricResult<f64> {
    let a = region_stats(volume, roi_a)?;
    let b = region_stats(volume, roi_b)?;
    let noise = region_stats(volume, background)?;
    checked_ratio("CNR", (a.mean - b.mean).abs(), noise.std_dev)
}
