//! Spatial denoising filters.
//!
//! Every filter works on one axial plane at a time with coordinates clamped
//! at the edges. Volumes are processed plane by plane in parallel.

use ndarray::{Array2, Array3, ArrayView2, Axis, Zip};
use rayon::prelude::*;

/// Largest accepted Gaussian sigma, in samples.
pub const MAX_GAUSSIAN_SIGMA: f32 = 50.0;
/// Largest accepted median window side.
pub const MAX_MEDIAN_WINDOW: usize = 31;
pub const MAX_PATCH_RADIUS: usize = 5;
pub const MAX_SEARCH_RADIUS: usize = 20;

/// Non-local means parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NlMeansParams {
    /// Patch side is `2 * patch_radius + 1`
    pub patch_radius: usize,
    /// Search window side is `2 * search_radius + 1`
    pub search_radius: usize,
    /// Filtering strength; `None` uses 10% of the buffer's intensity range
    pub h: Option<f32>,
}

impl Default for NlMeansParams {
    fn default() -> Self {
        Self {
            patch_radius: 1,
            search_radius: 5,
            h: None,
        }
    }
}

impl NlMeansParams {
    /// Relative strength used when `h` is not given.
    pub const DEFAULT_RELATIVE_H: f32 = 0.1;

    pub(crate) fn strength_for_range(&self, range: (f32, f32)) -> f32 {
        self.h
            .unwrap_or((range.1 - range.0) * Self::DEFAULT_RELATIVE_H)
    }
}

/// Apply `filter` to every axial plane of `data`.
pub(crate) fn map_planes<F>(data: &Array3<f32>, filter: F) -> Array3<f32>
where
    F: Fn(ArrayView2<f32>) -> Array2<f32> + Sync,
{
    let mut output = Array3::<f32>::zeros(data.raw_dim());
    Zip::from(output.outer_iter_mut())
        .and(data.outer_iter())
        .par_for_each(|mut out_plane, in_plane| out_plane.assign(&filter(in_plane)));
    output
}

#[inline]
fn clamped(index: usize, offset: isize, len: usize) -> usize {
    (index as isize + offset).clamp(0, len as isize - 1) as usize
}

/// Median of the `window x window` neighbourhood of every sample.
/// `window` must be odd; a window of 1 returns the input unchanged.
pub(crate) fn median_filter(plane: ArrayView2<f32>, window: usize) -> Array2<f32> {
    if window <= 1 {
        return plane.to_owned();
    }
    let (rows, cols) = plane.dim();
    let half = (window / 2) as isize;
    let mut output = Array2::<f32>::zeros((rows, cols));

    output
        .axis_iter_mut(Axis(0))
        .into_par_iter()
        .enumerate()
        .for_each(|(r, mut row)| {
            let mut neighbourhood = Vec::with_capacity(window * window);
            for (c, out) in row.iter_mut().enumerate() {
                neighbourhood.clear();
                for dr in -half..=half {
                    let rr = clamped(r, dr, rows);
                    for dc in -half..=half {
                        neighbourhood.push(plane[[rr, clamped(c, dc, cols)]]);
                    }
                }
                let mid = neighbourhood.len() / 2;
                let (_, median, _) = neighbourhood.select_nth_unstable_by(mid, f32::total_cmp);
                *out = *median;
            }
        });

    output
}

/// Normalized Gaussian kernel with radius `ceil(3 * sigma)`.
pub(crate) fn gaussian_kernel(sigma: f32) -> Vec<f32> {
    let radius = (3.0 * sigma).ceil() as usize;
    let mut kernel: Vec<f32> = (0..=2 * radius)
        .map(|i| {
            let x = i as f32 - radius as f32;
            (-0.5 * (x / sigma).powi(2)).exp()
        })
        .collect();
    let sum: f32 = kernel.iter().sum();
    for k in &mut kernel {
        *k /= sum;
    }
    kernel
}

fn convolve_axis(data: ArrayView2<f32>, kernel: &[f32], axis: Axis) -> Array2<f32> {
    let radius = (kernel.len() / 2) as isize;
    let mut output = Array2::<f32>::zeros(data.raw_dim());
    Zip::from(output.lanes_mut(axis))
        .and(data.lanes(axis))
        .for_each(|mut out_lane, in_lane| {
            let len = in_lane.len();
            for (i, out) in out_lane.iter_mut().enumerate() {
                *out = kernel
                    .iter()
                    .enumerate()
                    .map(|(k, w)| in_lane[clamped(i, k as isize - radius, len)] * w)
                    .sum();
            }
        });
    output
}

/// Separable Gaussian blur. `sigma == 0` returns the input unchanged.
pub(crate) fn gaussian_blur(plane: ArrayView2<f32>, sigma: f32) -> Array2<f32> {
    if sigma <= 0.0 {
        return plane.to_owned();
    }
    let kernel = gaussian_kernel(sigma);
    let horizontal = convolve_axis(plane, &kernel, Axis(1));
    convolve_axis(horizontal.view(), &kernel, Axis(0))
}

/// Mean squared difference between the patches centred on `p` and `q`.
#[inline]
fn patch_distance(
    plane: &ArrayView2<f32>,
    p: (usize, usize),
    q: (usize, usize),
    patch_radius: isize,
) -> f32 {
    let (rows, cols) = plane.dim();
    let mut sum = 0.0f32;
    let mut count = 0u32;
    for dr in -patch_radius..=patch_radius {
        let pr = clamped(p.0, dr, rows);
        let qr = clamped(q.0, dr, rows);
        for dc in -patch_radius..=patch_radius {
            let diff = plane[[pr, clamped(p.1, dc, cols)]] - plane[[qr, clamped(q.1, dc, cols)]];
            sum += diff * diff;
            count += 1;
        }
    }
    sum / count as f32
}

/// Non-local means denoising.
///
/// Each output sample is the average of the samples in its search window,
/// weighted by `exp(-d2 / h^2)` where `d2` is the mean squared difference
/// between the patch around the sample and the patch around the candidate.
///
/// Cost is O(N * W^2 * P) for N samples, a search window of side W and P
/// samples per patch. This is by far the most expensive filter; rows are
/// processed in parallel.
pub(crate) fn non_local_means(
    plane: ArrayView2<f32>,
    patch_radius: usize,
    search_radius: usize,
    h: f32,
) -> Array2<f32> {
    if h <= 0.0 || !h.is_finite() {
        return plane.to_owned();
    }
    let (rows, cols) = plane.dim();
    // f64 keeps 1 / h^2 finite for any positive f32 strength.
    let inv_h2 = 1.0 / (h as f64 * h as f64);
    let patch_radius = patch_radius as isize;
    let mut output = Array2::<f32>::zeros((rows, cols));

    output
        .axis_iter_mut(Axis(0))
        .into_par_iter()
        .enumerate()
        .for_each(|(r, mut row)| {
            let r_lo = r.saturating_sub(search_radius);
            let r_hi = (r + search_radius).min(rows - 1);
            for (c, out) in row.iter_mut().enumerate() {
                let c_lo = c.saturating_sub(search_radius);
                let c_hi = (c + search_radius).min(cols - 1);
                let mut weighted = 0.0f64;
                let mut total = 0.0f64;
                for qr in r_lo..=r_hi {
                    for qc in c_lo..=c_hi {
                        let d2 = patch_distance(&plane, (r, c), (qr, qc), patch_radius);
                        let w = if d2 == 0.0 {
                            1.0
                        } else {
                            (-(d2 as f64) * inv_h2).exp()
                        };
                        weighted += w * plane[[qr, qc]] as f64;
                        total += w;
                    }
                }
                // The centre patch always contributes weight 1, so total > 0.
                *out = (weighted / total) as f32;
            }
        });

    output
}
