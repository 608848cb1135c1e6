//! Parameterized, pure buffer transforms.
//!
//! A [`Transform`] is a command object: it names an operation and carries its
//! parameters. Constructors validate the parameters; [`Transform::apply`]
//! validates again (variants are public) and then produces a new [`Volume`].

use crate::contrast::{self, ContrastMethod};
use crate::enums::Interpolation;
use crate::error::{PipelineError, PipelineResult};
use crate::filters::{
    self, MAX_GAUSSIAN_SIGMA, MAX_MEDIAN_WINDOW, MAX_PATCH_RADIUS, MAX_SEARCH_RADIUS,
    NlMeansParams,
};
use crate::interpolator::Interpolator;
use crate::noise::{self, MAX_POISSON_SCALE};
use crate::volume::Volume;

use web_time::Instant;

pub const MIN_ZOOM: f32 = 1.0;
pub const MAX_ZOOM: f32 = 8.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transform {
    /// In-plane resample by `factor`; depth is unchanged.
    Zoom {
        factor: f32,
        interpolation: Interpolation,
    },
    /// Resample a volume to isotropic voxel spacing.
    Reslice { interpolation: Interpolation },
    GaussianNoise { sigma: f32, seed: u64 },
    PoissonNoise { scale: f32, seed: u64 },
    SaltAndPepper { fraction: f32, seed: u64 },
    Median { window: usize },
    GaussianBlur { sigma: f32 },
    NonLocalMeans(NlMeansParams),
    Contrast(ContrastMethod),
    /// Normalized brightness offset and contrast multiplier.
    BrightnessContrast { brightness: f32, contrast: f32 },
}

impl Transform {
    pub fn zoom(factor: f32, interpolation: Interpolation) -> PipelineResult<Self> {
        Self::checked(Transform::Zoom {
            factor,
            interpolation,
        })
    }

    pub fn reslice(interpolation: Interpolation) -> Self {
        Transform::Reslice { interpolation }
    }

    pub fn gaussian_noise(sigma: f32, seed: u64) -> PipelineResult<Self> {
        Self::checked(Transform::GaussianNoise { sigma, seed })
    }

    pub fn poisson_noise(scale: f32, seed: u64) -> PipelineResult<Self> {
        Self::checked(Transform::PoissonNoise { scale, seed })
    }

    pub fn salt_and_pepper(fraction: f32, seed: u64) -> PipelineResult<Self> {
        Self::checked(Transform::SaltAndPepper { fraction, seed })
    }

    pub fn median(window: usize) -> PipelineResult<Self> {
        Self::checked(Transform::Median { window })
    }

    pub fn gaussian_blur(sigma: f32) -> PipelineResult<Self> {
        Self::checked(Transform::GaussianBlur { sigma })
    }

    pub fn non_local_means(params: NlMeansParams) -> PipelineResult<Self> {
        Self::checked(Transform::NonLocalMeans(params))
    }

    pub fn contrast(method: ContrastMethod) -> PipelineResult<Self> {
        Self::checked(Transform::Contrast(method))
    }

    pub fn brightness_contrast(brightness: f32, contrast: f32) -> PipelineResult<Self> {
        Self::checked(Transform::BrightnessContrast {
            brightness,
            contrast,
        })
    }

    fn checked(self) -> PipelineResult<Self> {
        self.validate()?;
        Ok(self)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Transform::Zoom { .. } => "Zoom",
            Transform::Reslice { .. } => "Reslice",
            Transform::GaussianNoise { .. } => "GaussianNoise",
            Transform::PoissonNoise { .. } => "PoissonNoise",
            Transform::SaltAndPepper { .. } => "SaltAndPepper",
            Transform::Median { .. } => "Median",
            Transform::GaussianBlur { .. } => "GaussianBlur",
            Transform::NonLocalMeans(_) => "NonLocalMeans",
            Transform::Contrast(_) => "Contrast",
            Transform::BrightnessContrast { .. } => "BrightnessContrast",
        }
    }

    /// Operations worth moving off the interactive thread.
    pub fn is_long_running(&self) -> bool {
        matches!(
            self,
            Transform::NonLocalMeans(_)
                | Transform::Reslice { .. }
                | Transform::Zoom {
                    interpolation: Interpolation::Cubic,
                    ..
                }
        )
    }

    /// Check parameters against their valid domain.
    pub fn validate(&self) -> PipelineResult<()> {
        let name = self.name();
        match *self {
            Transform::Zoom { factor, .. } => {
                if !(MIN_ZOOM..=MAX_ZOOM).contains(&factor) {
                    return Err(PipelineError::invalid(
                        name,
                        format!("zoom factor {factor} outside [{MIN_ZOOM}, {MAX_ZOOM}]"),
                    ));
                }
            }
            Transform::Reslice { .. } => {}
            Transform::GaussianNoise { sigma, .. } => {
                if !(sigma.is_finite() && sigma >= 0.0) {
                    return Err(PipelineError::invalid(
                        name,
                        format!("sigma must be finite and non-negative, got {sigma}"),
                    ));
                }
            }
            Transform::PoissonNoise { scale, .. } => {
                if !(scale > 0.0 && scale <= MAX_POISSON_SCALE) {
                    return Err(PipelineError::invalid(
                        name,
                        format!("scale {scale} outside (0, {MAX_POISSON_SCALE}]"),
                    ));
                }
            }
            Transform::SaltAndPepper { fraction, .. } => {
                if !(0.0..=1.0).contains(&fraction) {
                    return Err(PipelineError::invalid(
                        name,
                        format!("fraction {fraction} outside [0, 1]"),
                    ));
                }
            }
            Transform::Median { window } => {
                if window == 0 || window % 2 == 0 || window > MAX_MEDIAN_WINDOW {
                    return Err(PipelineError::invalid(
                        name,
                        format!("window must be odd and in [1, {MAX_MEDIAN_WINDOW}], got {window}"),
                    ));
                }
            }
            Transform::GaussianBlur { sigma } => {
                if !(0.0..=MAX_GAUSSIAN_SIGMA).contains(&sigma) {
                    return Err(PipelineError::invalid(
                        name,
                        format!("sigma {sigma} outside [0, {MAX_GAUSSIAN_SIGMA}]"),
                    ));
                }
            }
            Transform::NonLocalMeans(params) => {
                if params.patch_radius > MAX_PATCH_RADIUS {
                    return Err(PipelineError::invalid(
                        name,
                        format!("patch radius {} above {MAX_PATCH_RADIUS}", params.patch_radius),
                    ));
                }
                if params.search_radius == 0 || params.search_radius > MAX_SEARCH_RADIUS {
                    return Err(PipelineError::invalid(
                        name,
                        format!(
                            "search radius must be in [1, {MAX_SEARCH_RADIUS}], got {}",
                            params.search_radius
                        ),
                    ));
                }
                if let Some(h) = params.h {
                    if !(h.is_finite() && h > 0.0) {
                        return Err(PipelineError::invalid(
                            name,
                            format!("filtering strength must be positive, got {h}"),
                        ));
                    }
                }
            }
            Transform::Contrast(method) => method.validate()?,
            Transform::BrightnessContrast {
                brightness,
                contrast,
            } => {
                if !(-1.0..=1.0).contains(&brightness) {
                    return Err(PipelineError::invalid(
                        name,
                        format!("brightness {brightness} outside [-1, 1]"),
                    ));
                }
                if !(contrast > 0.0 && contrast <= 10.0) {
                    return Err(PipelineError::invalid(
                        name,
                        format!("contrast {contrast} outside (0, 10]"),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Produce a new buffer. The input is never modified.
    pub fn apply(&self, volume: &Volume) -> PipelineResult<Volume> {
        self.validate()?;
        log::debug!("Applying {:?} to {:?} buffer {:?}", self, volume.kind(), volume.dim());
        let start = Instant::now();
        let data = volume.data();

        let result = match *self {
            Transform::Zoom {
                factor,
                interpolation,
            } => {
                let (_, height, width) = volume.dim();
                let out_height = ((height as f32 * factor).round() as usize).max(1);
                let out_width = ((width as f32 * factor).round() as usize).max(1);
                let resized = Interpolator::resize_in_plane(data.view(), out_height, out_width, interpolation);
                let (sx, sy, sz) = volume.spacing();
                let spacing = (
                    sx * width as f32 / out_width as f32,
                    sy * height as f32 / out_height as f32,
                    sz,
                );
                volume.resampled(resized, spacing)
            }
            Transform::Reslice { interpolation } => {
                if volume.is_planar() {
                    return Err(PipelineError::DimensionMismatch {
                        transform: self.name(),
                        expected: "volumetric",
                        actual: volume.kind(),
                    });
                }
                let dims = volume.interpolated_dim();
                let (sx, sy, sz) = volume.spacing();
                let iso = sx.min(sy).min(sz);
                let resized = Interpolator::resize_volume(data.view(), dims, interpolation);
                volume.resampled(resized, (iso, iso, iso))
            }
            Transform::GaussianNoise { sigma, seed } => {
                volume.derive(noise::add_gaussian_noise(data, sigma, seed))
            }
            Transform::PoissonNoise { scale, seed } => {
                volume.derive(noise::add_poisson_noise(data, scale, seed))
            }
            Transform::SaltAndPepper { fraction, seed } => volume.derive(noise::add_salt_and_pepper(
                data,
                fraction,
                volume.intensity_range(),
                seed,
            )),
            Transform::Median { window } => {
                volume.derive(filters::map_planes(data, |plane| filters::median_filter(plane, window)))
            }
            Transform::GaussianBlur { sigma } => {
                volume.derive(filters::map_planes(data, |plane| filters::gaussian_blur(plane, sigma)))
            }
            Transform::NonLocalMeans(params) => {
                let h = params.strength_for_range(volume.intensity_range());
                volume.derive(filters::map_planes(data, |plane| {
                    filters::non_local_means(plane, params.patch_radius, params.search_radius, h)
                }))
            }
            Transform::Contrast(method) => volume.derive(method.apply(data, volume.intensity_range())),
            Transform::BrightnessContrast {
                brightness,
                contrast,
            } => volume.derive(contrast::brightness_contrast(
                data,
                volume.intensity_range(),
                brightness,
                contrast,
            )),
        };

        log::info!(
            "{} produced {:?} buffer in {:.1} ms",
            self.name(),
            result.dim(),
            start.elapsed().as_secs_f64() * 1000.0
        );
        Ok(result)
    }
}
