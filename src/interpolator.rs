use crate::enums::Interpolation;

use ndarray::{Array2, Array3, ArrayView1, ArrayView2, ArrayView3, Axis, Zip};

/// One-dimensional kernel family used by the separable passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kernel1d {
    Nearest,
    Linear,
    Cubic,
}

impl Kernel1d {
    fn in_plane(interpolation: Interpolation) -> Self {
        match interpolation {
            Interpolation::Nearest => Kernel1d::Nearest,
            Interpolation::Linear | Interpolation::Bilinear => Kernel1d::Linear,
            Interpolation::Cubic => Kernel1d::Cubic,
        }
    }
}

pub(crate) struct Interpolator;

impl Interpolator {
    /// Dimensions `(depth, height, width)` the volume takes when every axis
    /// is resampled to the smallest of the three spacings.
    pub(crate) fn get_isotropic_dimensions(
        spacing: (f32, f32, f32),
        original_dim: (usize, usize, usize),
    ) -> (usize, usize, usize) {
        let (x_spacing, y_spacing, z_spacing) = spacing;
        let min_spacing = x_spacing.min(y_spacing).min(z_spacing);
        let inv_min_spacing = 1.0 / min_spacing; // Multiply instead of divide

        // original_dim is (depth, height, width) corresponding to (z, y, x)
        let scaled = |len: usize, spacing: f32| {
            ((len as f32 * spacing * inv_min_spacing).round() as usize).max(1)
        };

        (
            scaled(original_dim.0, z_spacing),
            scaled(original_dim.1, y_spacing),
            scaled(original_dim.2, x_spacing),
        )
    }

    /// Source coordinate of destination sample `dst` under the half-pixel
    /// convention, clamped to `[0, src_len - 1]`.
    #[inline]
    pub(crate) fn source_coordinate(dst: usize, scale: f64, src_len: usize) -> f32 {
        let src = (dst as f64 + 0.5) / scale - 0.5;
        src.clamp(0.0, (src_len - 1) as f64) as f32
    }

    /// Index of the source sample whose extent contains the centre of `dst`.
    /// A centre falling exactly on a boundary goes to the higher index.
    #[inline]
    pub(crate) fn nearest_index(dst: usize, scale: f64, src_len: usize) -> usize {
        let centre = (dst as f64 + 0.5) / scale;
        (centre.floor().max(0.0) as usize).min(src_len - 1)
    }

    #[inline]
    pub(crate) fn bilinear_interpolate(slice: &ArrayView2<f32>, y: f32, x: f32) -> f32 {
        let (height, width) = slice.dim();

        let y0 = y.floor() as usize;
        let x0 = x.floor() as usize;
        let y1 = (y0 + 1).min(height - 1);
        let x1 = (x0 + 1).min(width - 1);

        let dy = y - y0 as f32;
        let dx = x - x0 as f32;
        let one_minus_dx = 1.0 - dx;
        let one_minus_dy = 1.0 - dy;

        let v00 = slice[[y0, x0]];
        let v01 = slice[[y0, x1]];
        let v10 = slice[[y1, x0]];
        let v11 = slice[[y1, x1]];

        let v0 = v00.mul_add(one_minus_dx, v01 * dx);
        let v1 = v10.mul_add(one_minus_dx, v11 * dx);

        v0.mul_add(one_minus_dy, v1 * dy)
    }

    /// Catmull-Rom weights (a = -0.5) for the samples at offsets -1, 0, 1, 2.
    #[inline]
    fn cubic_weights(t: f32) -> [f32; 4] {
        let t2 = t * t;
        let t3 = t2 * t;
        [
            0.5 * (-t3 + 2.0 * t2 - t),
            0.5 * (3.0 * t3 - 5.0 * t2 + 2.0),
            0.5 * (-3.0 * t3 + 4.0 * t2 + t),
            0.5 * (t3 - t2),
        ]
    }

    fn sample_lane(lane: &ArrayView1<f32>, dst: usize, scale: f64, kernel: Kernel1d) -> f32 {
        let len = lane.len();
        match kernel {
            Kernel1d::Nearest => lane[Self::nearest_index(dst, scale, len)],
            Kernel1d::Linear => {
                let x = Self::source_coordinate(dst, scale, len);
                let x0 = x.floor() as usize;
                let x1 = (x0 + 1).min(len - 1);
                let t = x - x0 as f32;
                lane[x0].mul_add(1.0 - t, lane[x1] * t)
            }
            Kernel1d::Cubic => {
                let x = Self::source_coordinate(dst, scale, len);
                let x0 = x.floor() as isize;
                let weights = Self::cubic_weights(x - x0 as f32);
                let last = len as isize - 1;
                weights
                    .iter()
                    .enumerate()
                    .map(|(k, w)| {
                        let idx = (x0 + k as isize - 1).clamp(0, last) as usize;
                        lane[idx] * w
                    })
                    .sum()
            }
        }
    }

    /// Resample one axis of `data` to `new_len` samples. Every other axis is
    /// left untouched. Equal lengths return a plain copy.
    fn resample_axis(
        data: ArrayView3<f32>,
        axis: Axis,
        new_len: usize,
        kernel: Kernel1d,
    ) -> Array3<f32> {
        let old_len = data.len_of(axis);
        if old_len == new_len {
            return data.to_owned();
        }
        let mut shape = data.raw_dim();
        shape[axis.index()] = new_len;
        let mut output = Array3::<f32>::zeros(shape);
        let scale = new_len as f64 / old_len as f64;

        Zip::from(output.lanes_mut(axis))
            .and(data.lanes(axis))
            .par_for_each(|mut out_lane, in_lane| {
                for (dst, value) in out_lane.iter_mut().enumerate() {
                    *value = Self::sample_lane(&in_lane, dst, scale, kernel);
                }
            });

        output
    }

    /// Direct 2x2 blend of every destination sample of one plane.
    fn resize_plane_bilinear(plane: ArrayView2<f32>, out_height: usize, out_width: usize) -> Array2<f32> {
        let (height, width) = plane.dim();
        if (height, width) == (out_height, out_width) {
            return plane.to_owned();
        }
        let scale_y = out_height as f64 / height as f64;
        let scale_x = out_width as f64 / width as f64;

        Array2::from_shape_fn((out_height, out_width), |(y, x)| {
            let src_y = Self::source_coordinate(y, scale_y, height);
            let src_x = Self::source_coordinate(x, scale_x, width);
            Self::bilinear_interpolate(&plane, src_y, src_x)
        })
    }

    /// Resample the in-plane axes of every slice to `(out_height, out_width)`.
    pub(crate) fn resize_in_plane(
        data: ArrayView3<f32>,
        out_height: usize,
        out_width: usize,
        interpolation: Interpolation,
    ) -> Array3<f32> {
        if interpolation == Interpolation::Bilinear {
            let depth = data.len_of(Axis(0));
            let mut output = Array3::<f32>::zeros((depth, out_height, out_width));
            Zip::from(output.outer_iter_mut())
                .and(data.outer_iter())
                .par_for_each(|mut out_plane, in_plane| {
                    out_plane.assign(&Self::resize_plane_bilinear(in_plane, out_height, out_width));
                });
            return output;
        }

        let kernel = Kernel1d::in_plane(interpolation);
        let along_x = Self::resample_axis(data, Axis(2), out_width, kernel);
        Self::resample_axis(along_x.view(), Axis(1), out_height, kernel)
    }

    /// Resample all three axes to `dims`. Through-plane the bilinear kernel
    /// degrades to its one-dimensional form.
    pub(crate) fn resize_volume(
        data: ArrayView3<f32>,
        dims: (usize, usize, usize),
        interpolation: Interpolation,
    ) -> Array3<f32> {
        let in_plane = Self::resize_in_plane(data, dims.1, dims.2, interpolation);
        Self::resample_axis(
            in_plane.view(),
            Axis(0),
            dims.0,
            Kernel1d::in_plane(interpolation),
        )
    }

    /// Resize a single plane, used for aspect-corrected display slices.
    pub(crate) fn resize_plane(
        plane: ArrayView2<f32>,
        out_height: usize,
        out_width: usize,
        interpolation: Interpolation,
    ) -> Array2<f32> {
        let stacked = plane.insert_axis(Axis(0));
        Self::resize_in_plane(stacked, out_height, out_width, interpolation).index_axis_move(Axis(0), 0)
    }
}
