use crate::display::DisplaySettings;
use crate::enums::Interpolation;
use crate::enums::Orientation;
use crate::error::{PipelineError, PipelineResult};
use crate::interpolator::Interpolator;

use image::GrayImage;
use image::ImageBuffer;
use ndarray::Array2;
use ndarray::Array3;
use ndarray::ArrayView2;
use ndarray::s;
use rayon::prelude::*;

/// Immutable grid of intensity samples, stored as `(depth, height, width)`.
///
/// A 2D image is a planar volume with a depth of one. Transforms never
/// mutate a volume in place: they return a new one.
#[derive(Debug, Clone, PartialEq)]
pub struct Volume {
    data: Array3<f32>,
    spacing: (f32, f32, f32),
    planar: bool,
    range: (f32, f32),
}

impl Volume {
    /// Create a volumetric buffer. `spacing` is `(x, y, z)` in millimetres.
    pub fn new(data: Array3<f32>, spacing: (f32, f32, f32)) -> PipelineResult<Self> {
        Self::build(data, spacing, false)
    }

    /// Create a planar (2D) buffer from a single `(height, width)` image.
    pub fn from_slice(data: Array2<f32>, spacing: (f32, f32)) -> PipelineResult<Self> {
        let data = data.insert_axis(ndarray::Axis(0));
        Self::build(data, (spacing.0, spacing.1, 1.0), true)
    }

    fn build(data: Array3<f32>, spacing: (f32, f32, f32), planar: bool) -> PipelineResult<Self> {
        if data.is_empty() {
            return Err(PipelineError::invalid("Volume", "buffer has no samples"));
        }
        let (x, y, z) = spacing;
        if [x, y, z].iter().any(|s| !s.is_finite() || *s <= 0.0) {
            return Err(PipelineError::invalid(
                "Volume",
                format!("spacing must be positive, got {spacing:?}"),
            ));
        }
        let range = Self::observed_range(&data);
        Ok(Self {
            data,
            spacing,
            planar,
            range,
        })
    }

    /// Successor buffer with the same geometry and new samples.
    pub(crate) fn derive(&self, data: Array3<f32>) -> Self {
        debug_assert_eq!(data.dim(), self.data.dim());
        let range = Self::observed_range(&data);
        Self {
            data,
            spacing: self.spacing,
            planar: self.planar,
            range,
        }
    }

    /// Successor buffer after a resampling step.
    pub(crate) fn resampled(&self, data: Array3<f32>, spacing: (f32, f32, f32)) -> Self {
        let range = Self::observed_range(&data);
        Self {
            data,
            spacing,
            planar: self.planar,
            range,
        }
    }

    fn observed_range(data: &Array3<f32>) -> (f32, f32) {
        let (min, max) = data
            .par_iter()
            .filter(|v| v.is_finite())
            .fold(
                || (f32::INFINITY, f32::NEG_INFINITY),
                |(lo, hi), &v| (lo.min(v), hi.max(v)),
            )
            .reduce(
                || (f32::INFINITY, f32::NEG_INFINITY),
                |a, b| (a.0.min(b.0), a.1.max(b.1)),
            );
        if min > max { (0.0, 0.0) } else { (min, max) }
    }

    /// Get the dimensions of the volume (depth, height, width)
    pub fn dim(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    pub fn width(&self) -> usize {
        self.data.dim().2
    }

    pub fn height(&self) -> usize {
        self.data.dim().1
    }

    pub fn depth(&self) -> usize {
        self.data.dim().0
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn is_planar(&self) -> bool {
        self.planar
    }

    pub fn kind(&self) -> &'static str {
        if self.planar { "planar" } else { "volumetric" }
    }

    /// Get a reference to the underlying data
    pub fn data(&self) -> &Array3<f32> {
        &self.data
    }

    /// Voxel spacing `(x, y, z)`.
    pub fn spacing(&self) -> (f32, f32, f32) {
        self.spacing
    }

    /// Smallest and largest finite sample.
    pub fn intensity_range(&self) -> (f32, f32) {
        self.range
    }

    /// Dimensions `(depth, height, width)` after resampling to isotropic spacing.
    pub fn interpolated_dim(&self) -> (usize, usize, usize) {
        Interpolator::get_isotropic_dimensions(self.spacing, self.data.dim())
    }

    /// Number of slices available in `orientation`.
    pub fn slice_count(&self, orientation: Orientation) -> usize {
        self.data.len_of(ndarray::Axis(orientation.axis()))
    }

    pub fn get_slice_from_axis(
        &self,
        index: usize,
        orientation: Orientation,
    ) -> Option<ArrayView2<'_, f32>> {
        if !self.is_valid_index(index, orientation) {
            return None;
        }
        let slice_result = match orientation {
            Orientation::Axial => self.data.slice(s![index, .., ..]),
            Orientation::Coronal => self.data.slice(s![.., index, ..]),
            Orientation::Sagittal => self.data.slice(s![.., .., index]),
        };
        Some(slice_result)
    }

    fn get_output_dimensions(&self, orientation: Orientation) -> (usize, usize) {
        let interpolated_dim = self.interpolated_dim();
        // Always return (width, height) - standard image convention
        match orientation {
            Orientation::Axial => {
                // Looking down Z-axis: X is width, Y is height
                (interpolated_dim.2, interpolated_dim.1)
            }
            Orientation::Coronal => {
                // Looking down Y-axis: X is width, Z is height
                (interpolated_dim.2, interpolated_dim.0)
            }
            Orientation::Sagittal => {
                // Looking down X-axis: Y is width, Z is height
                (interpolated_dim.1, interpolated_dim.0)
            }
        }
    }

    /// Display-ready 8-bit image of a slice: rotated by 180 degrees,
    /// normalized to the slice's own range, then adjusted by `display`.
    pub fn get_image_from_axis(
        &self,
        index: usize,
        orientation: Orientation,
        display: &DisplaySettings,
    ) -> Option<GrayImage> {
        let slice = self.get_slice_from_axis(index, orientation)?;
        Self::slice_to_image(slice, display)
    }

    /// Like [`Volume::get_image_from_axis`], with coronal and sagittal slices
    /// bilinearly stretched to the physical aspect ratio.
    pub fn get_isotropic_image_from_axis(
        &self,
        index: usize,
        orientation: Orientation,
        display: &DisplaySettings,
    ) -> Option<GrayImage> {
        let slice = self.get_slice_from_axis(index, orientation)?;
        // Axial doesn't need interpolation (already isotropic in-plane)
        if matches!(orientation, Orientation::Axial) {
            return Self::slice_to_image(slice, display);
        }
        let (width, height) = self.get_output_dimensions(orientation);
        let stretched = Interpolator::resize_plane(slice, height, width, Interpolation::Bilinear);
        Self::slice_to_image(stretched.view(), display)
    }

    fn slice_to_image(slice: ArrayView2<'_, f32>, display: &DisplaySettings) -> Option<GrayImage> {
        let (height, width) = slice.dim();
        let rotated = slice.slice(s![..;-1, ..;-1]);
        let (min, max) = rotated.iter().filter(|v| v.is_finite()).fold(
            (f32::INFINITY, f32::NEG_INFINITY),
            |(lo, hi), &v| (lo.min(v), hi.max(v)),
        );
        let span = max - min;
        let standard = rotated.as_standard_layout();
        let pixel_data: Vec<u8> = standard
            .as_slice()?
            .par_iter()
            .map(|&v| {
                let normalized = if span > 0.0 && v.is_finite() {
                    (v - min) / span * 255.0
                } else {
                    0.0
                };
                display.adjust(normalized)
            })
            .collect();
        ImageBuffer::from_raw(width as u32, height as u32, pixel_data)
    }

    fn is_valid_index(&self, index: usize, orientation: Orientation) -> bool {
        index < self.slice_count(orientation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn ramp_volume() -> Volume {
        let data = Array3::from_shape_fn((3, 4, 5), |(z, y, x)| (z * 100 + y * 10 + x) as f32);
        Volume::new(data, (1.0, 1.0, 2.0)).unwrap()
    }

    #[test]
    fn rejects_empty_and_bad_spacing() {
        assert!(Volume::new(Array3::zeros((0, 4, 4)), (1.0, 1.0, 1.0)).is_err());
        assert!(Volume::new(Array3::zeros((1, 4, 4)), (1.0, 0.0, 1.0)).is_err());
        assert!(Volume::new(Array3::zeros((1, 4, 4)), (1.0, f32::NAN, 1.0)).is_err());
    }

    #[test]
    fn planar_buffer_has_unit_depth() {
        let v = Volume::from_slice(array![[1.0, 2.0], [3.0, 4.0]], (0.5, 0.5)).unwrap();
        assert!(v.is_planar());
        assert_eq!(v.dim(), (1, 2, 2));
        assert_eq!(v.intensity_range(), (1.0, 4.0));
    }

    #[test]
    fn slices_follow_orientation_axes() {
        let v = ramp_volume();
        let axial = v.get_slice_from_axis(1, Orientation::Axial).unwrap();
        assert_eq!(axial.dim(), (4, 5));
        assert_eq!(axial[[2, 3]], 123.0);
        let coronal = v.get_slice_from_axis(2, Orientation::Coronal).unwrap();
        assert_eq!(coronal.dim(), (3, 5));
        let sagittal = v.get_slice_from_axis(4, Orientation::Sagittal).unwrap();
        assert_eq!(sagittal.dim(), (3, 4));
        assert!(v.get_slice_from_axis(5, Orientation::Sagittal).is_none());
    }

    #[test]
    fn display_image_is_rotated_and_normalized() {
        let v = Volume::from_slice(array![[0.0, 1.0], [2.0, 4.0]], (1.0, 1.0)).unwrap();
        let image = v
            .get_image_from_axis(0, Orientation::Axial, &DisplaySettings::default())
            .unwrap();
        assert_eq!(image.dimensions(), (2, 2));
        // The largest sample lands top-left after the 180 degree rotation.
        assert_eq!(image.get_pixel(0, 0).0[0], 255);
        assert_eq!(image.get_pixel(1, 1).0[0], 0);
    }

    #[test]
    fn constant_slice_renders_black() {
        let v = Volume::from_slice(Array2::from_elem((3, 3), 7.0), (1.0, 1.0)).unwrap();
        let image = v
            .get_image_from_axis(0, Orientation::Axial, &DisplaySettings::default())
            .unwrap();
        assert!(image.pixels().all(|p| p.0[0] == 0));
    }

    #[test]
    fn isotropic_image_stretches_through_plane() {
        let v = ramp_volume();
        let image = v
            .get_isotropic_image_from_axis(0, Orientation::Coronal, &DisplaySettings::default())
            .unwrap();
        // Depth 3 at 2mm becomes 6 rows at 1mm.
        assert_eq!(image.dimensions(), (5, 6));
    }
}
