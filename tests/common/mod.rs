//! Synthetic scans shared by the integration tests.
#![allow(dead_code)]

use ndarray::{Array2, Array3};
use scanview::{Roi, Volume};

/// Side length of the square plateau in [`gradient_with_plateau`].
pub const PLATEAU: (usize, usize) = (96, 160);
pub const PLATEAU_VALUE: f32 = 200.0;

/// 256x256 horizontal ramp with a flat square in the middle.
pub fn gradient_with_plateau() -> Volume {
    let (lo, hi) = PLATEAU;
    let data = Array2::from_shape_fn((256, 256), |(y, x)| {
        if (lo..hi).contains(&y) && (lo..hi).contains(&x) {
            PLATEAU_VALUE
        } else {
            50.0 + 0.5 * x as f32
        }
    });
    Volume::from_slice(data, (1.0, 1.0)).expect("valid plane")
}

/// Region well inside the plateau, clear of its edges.
pub fn plateau_roi() -> Roi {
    let (lo, hi) = PLATEAU;
    let margin = 8;
    Roi::rect(lo + margin, lo + margin, hi - lo - 2 * margin, hi - lo - 2 * margin)
}

/// Planar buffer holding `0, 1, 2, ...` in row-major order.
pub fn counting_plane(rows: usize, cols: usize) -> Volume {
    let data = Array2::from_shape_fn((rows, cols), |(r, c)| (r * cols + c) as f32);
    Volume::from_slice(data, (1.0, 1.0)).expect("valid plane")
}

/// Small anisotropic volume whose samples encode their own coordinates.
pub fn coordinate_volume() -> Volume {
    let data = Array3::from_shape_fn((4, 6, 8), |(z, y, x)| (z * 100 + y * 10 + x) as f32);
    Volume::new(data, (0.5, 0.5, 1.0)).expect("valid volume")
}

/// Largest absolute difference between two buffers of equal shape.
pub fn max_abs_diff(a: &Volume, b: &Volume) -> f32 {
    assert_eq!(a.dim(), b.dim(), "buffers differ in shape");
    a.data()
        .iter()
        .zip(b.data().iter())
        .map(|(x, y)| (x - y).abs())
        .fold(0.0, f32::max)
}
