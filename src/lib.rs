//! # scanview
//!
//! Image-processing core of an interactive viewer for medical scans.
//!
//! A scan is loaded into a [`Volume`], either a planar image (PNG, JPEG,
//! TIFF, a single DICOM file) or a volumetric stack (a DICOM series or a
//! NIfTI file, optionally gzip compressed). Every operation is a
//! [`Transform`] that produces a new buffer and leaves its input untouched:
//!  - Zoom and isotropic reslicing with nearest, linear, bilinear or cubic
//!    interpolation
//!  - Synthetic Gaussian, Poisson and salt-and-pepper noise
//!  - Median, Gaussian and non-local-means filtering
//!  - Contrast enhancement
//!
//! Transforms are recorded in a [`PipelineHistory`] that supports undo,
//! redo and reset. A [`ViewerSession`] owns the history together with the
//! display settings and the slice cursor for the three medical axes
//! (Axial, Coronal, Sagittal), and can run slow transforms on the tokio
//! blocking pool. Quality metrics (SNR, CNR) and intensity histograms are
//! computed over regions of interest.
//!
//! Heavy per-voxel work runs in parallel using rayon.
//!
//! # Examples
//!
//! ## Denoising a scan and measuring the result
//!
//! ```no_run
//! # use scanview::{Transform, VolumeLoader, Orientation, DisplaySettings, Roi, compute_snr};
//! let volume = VolumeLoader::load_from_path("scan.nii.gz")
//!     .expect("should have loaded the scan");
//! let denoised = Transform::median(3)
//!     .and_then(|median| median.apply(&volume))
//!     .expect("median window is valid");
//! let snr = compute_snr(&denoised, &Roi::rect(10, 10, 32, 32));
//! println!("SNR: {snr:?}");
//! let image = denoised
//!     .get_image_from_axis(denoised.depth() / 2, Orientation::Axial, &DisplaySettings::default())
//!     .expect("should have returned image at center of volume");
//! image.save("result.png").expect("should have written the image");
//! ```

pub mod contrast;
pub mod display;
pub mod enums;
pub mod error;
pub mod filters;
pub mod histogram;
mod interpolator;
pub mod metrics;
pub mod noise;
pub mod pipeline;
pub mod session;
pub mod transfer;
pub mod transform;
pub mod volume;
pub mod volume_loader;

pub use contrast::ContrastMethod;
pub use display::{DisplaySettings, ViewTransform, Viewport};
pub use enums::{Interpolation, Orientation, SortBy};
pub use error::{PipelineError, PipelineResult};
pub use filters::NlMeansParams;
pub use histogram::{HistogramBin, histogram};
pub use metrics::{
    MetricError, RegionStats, Roi, compute_cnr, compute_cnr_with_background, compute_snr,
    region_stats,
};
pub use pipeline::PipelineHistory;
pub use session::{
    Command, PendingLoad, PendingTransform, SessionError, SliceCursor, ViewerSession,
};
pub use transfer::TransferFunction;
pub use transform::Transform;
pub use volume::Volume;
pub use volume_loader::{SourceFormat, VolumeLoader, VolumeLoaderError};
