use crate::error::{PipelineError, PipelineResult};

use image::GrayImage;

/// Viewport zoom limits.
pub const MIN_DISPLAY_ZOOM: f32 = 0.1;
pub const MAX_DISPLAY_ZOOM: f32 = 8.0;

/// Per-view display adjustments. These only affect rendered 8-bit slices,
/// never the processed buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplaySettings {
    /// Offset added after normalization to 0..255
    pub brightness: f32,
    /// Multiplier applied after normalization to 0..255
    pub contrast: f32,
    pub zoom: f32,
    /// Pan offset in viewport pixels
    pub pan: (f32, f32),
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            brightness: 0.0,
            contrast: 1.0,
            zoom: 1.0,
            pan: (0.0, 0.0),
        }
    }
}

impl DisplaySettings {
    pub fn validate(&self) -> PipelineResult<()> {
        if !(-255.0..=255.0).contains(&self.brightness) {
            return Err(PipelineError::invalid(
                "DisplaySettings",
                format!("brightness {} outside [-255, 255]", self.brightness),
            ));
        }
        if !(self.contrast > 0.0 && self.contrast <= 10.0) {
            return Err(PipelineError::invalid(
                "DisplaySettings",
                format!("contrast {} outside (0, 10]", self.contrast),
            ));
        }
        if !(MIN_DISPLAY_ZOOM..=MAX_DISPLAY_ZOOM).contains(&self.zoom) {
            return Err(PipelineError::invalid(
                "DisplaySettings",
                format!("zoom {} outside [{MIN_DISPLAY_ZOOM}, {MAX_DISPLAY_ZOOM}]", self.zoom),
            ));
        }
        if !(self.pan.0.is_finite() && self.pan.1.is_finite()) {
            return Err(PipelineError::invalid("DisplaySettings", "pan must be finite"));
        }
        Ok(())
    }

    /// Map a normalized 0..255 intensity to a display byte.
    #[inline]
    pub(crate) fn adjust(&self, normalized: f32) -> u8 {
        normalized
            .mul_add(self.contrast, self.brightness)
            .clamp(0.0, 255.0) as u8
    }

    pub fn view_transform(&self) -> ViewTransform {
        ViewTransform {
            zoom: self.zoom,
            pan: self.pan,
        }
    }
}

/// Geometry handed to the viewport along with a rendered slice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewTransform {
    pub zoom: f32,
    pub pan: (f32, f32),
}

/// Sink for finished slices. Implemented by whatever draws the viewport.
pub trait Viewport {
    fn present(&mut self, image: &GrayImage, view: &ViewTransform);
}
