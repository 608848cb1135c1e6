//! Color and opacity transfer functions for volume rendering.
//!
//! The renderer itself lives outside this crate; it receives a
//! [`TransferFunction`] alongside the processed volume.

/// Piecewise-linear transfer function over intensity.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferFunction {
    /// `(intensity, [r, g, b])`, sorted by intensity
    color_points: Vec<(f32, [f32; 3])>,
    /// `(intensity, opacity)`, sorted by intensity
    opacity_points: Vec<(f32, f32)>,
}

impl TransferFunction {
    /// Default ramp for a buffer whose intensities span `[min, max]`: black
    /// and transparent at the minimum, warm tones at a quarter and half of the
    /// maximum, opaque white at the maximum.
    pub fn for_range(min: f32, max: f32) -> Self {
        let mut color_points = vec![
            (min, [0.0, 0.0, 0.0]),
            (max * 0.25, [0.85, 0.55, 0.3]),
            (max * 0.5, [0.95, 0.85, 0.7]),
            (max, [1.0, 1.0, 1.0]),
        ];
        let mut opacity_points = vec![(min, 0.0), (max * 0.25, 0.1), (max * 0.5, 0.4), (max, 1.0)];
        color_points.sort_by(|a, b| a.0.total_cmp(&b.0));
        opacity_points.sort_by(|a, b| a.0.total_cmp(&b.0));
        Self {
            color_points,
            opacity_points,
        }
    }

    pub fn color_points(&self) -> &[(f32, [f32; 3])] {
        &self.color_points
    }

    pub fn opacity_points(&self) -> &[(f32, f32)] {
        &self.opacity_points
    }

    pub fn color_at(&self, value: f32) -> [f32; 3] {
        let mut rgb = [0.0; 3];
        for (channel, out) in rgb.iter_mut().enumerate() {
            *out = interpolate(&self.color_points, value, |p| p[channel]);
        }
        rgb
    }

    pub fn opacity_at(&self, value: f32) -> f32 {
        interpolate(&self.opacity_points, value, |p| *p)
    }
}

/// Linear interpolation between control points, constant beyond the ends.
fn interpolate<T>(points: &[(f32, T)], value: f32, channel: impl Fn(&T) -> f32) -> f32 {
    let Some(first) = points.first() else {
        return 0.0;
    };
    if value <= first.0 {
        return channel(&first.1);
    }
    for pair in points.windows(2) {
        let (x0, y0) = (pair[0].0, &pair[0].1);
        let (x1, y1) = (pair[1].0, &pair[1].1);
        if value <= x1 {
            let span = x1 - x0;
            if span <= 0.0 {
                return channel(y1);
            }
            let t = (value - x0) / span;
            return channel(y0) + (channel(y1) - channel(y0)) * t;
        }
    }
    points.last().map(|p| channel(&p.1)).unwrap_or(0.0)
}
