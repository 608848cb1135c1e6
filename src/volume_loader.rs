use crate::{enums::SortBy, error::PipelineError, volume::Volume};

use dicom::{
    object::{FileDicomObject, InMemDicomObject, open_file},
    pixeldata::{ConvertOptions, PixelDecoder, VoiLutOption},
};
use dicom_dictionary_std::tags;
use flate2::read::GzDecoder;
use image::DynamicImage;
use ndarray::{Array2, Array3, s};
use nifti::{InMemNiftiObject, NiftiObject, ReaderOptions};
use nifti::volume::ndarray::IntoNdArray;
use std::io::Cursor;
use std::{fs, path::Path};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VolumeLoaderError {
    #[error("No valid DICOM images found")]
    NoValidImages,

    #[error("Inconsistent image dimensions")]
    InconsistentDimensions,

    #[error("Missing spacing information")]
    MissingSpacing,

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Corrupt file: {0}")]
    CorruptFile(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("DICOM error: {0}")]
    Dicom(#[from] dicom::object::ReadError),
}

impl From<PipelineError> for VolumeLoaderError {
    fn from(err: PipelineError) -> Self {
        VolumeLoaderError::CorruptFile(err.to_string())
    }
}

impl From<image::ImageError> for VolumeLoaderError {
    fn from(err: image::ImageError) -> Self {
        match err {
            image::ImageError::Unsupported(e) => VolumeLoaderError::UnsupportedFormat(e.to_string()),
            image::ImageError::IoError(e) => VolumeLoaderError::Io(e),
            other => VolumeLoaderError::CorruptFile(other.to_string()),
        }
    }
}

/// File formats the loader understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    /// NIfTI-1, optionally gzip compressed
    Nifti,
    /// A single DICOM file
    Dicom,
    /// PNG, JPEG, TIFF, BMP and other 2D images
    Raster,
}

impl SourceFormat {
    /// Guess the format from the file name.
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?.to_ascii_lowercase();
        if name.ends_with(".nii") || name.ends_with(".nii.gz") {
            return Some(SourceFormat::Nifti);
        }
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "dcm" => Some(SourceFormat::Dicom),
            "png" | "jpg" | "jpeg" | "tif" | "tiff" | "bmp" | "pgm" => Some(SourceFormat::Raster),
            _ => None,
        }
    }

    /// Guess the format from magic bytes.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if is_gzip(bytes) {
            return Some(SourceFormat::Nifti);
        }
        if bytes.len() >= 348 && matches!(&bytes[344..348], b"n+1\0" | b"ni1\0") {
            return Some(SourceFormat::Nifti);
        }
        if bytes.len() >= 132 && &bytes[128..132] == b"DICM" {
            return Some(SourceFormat::Dicom);
        }
        image::guess_format(bytes).ok().map(|_| SourceFormat::Raster)
    }
}

/// Check if bytes are gzip compressed
fn is_gzip(bytes: &[u8]) -> bool {
    bytes.len() >= 2 && bytes[0] == 0x1f && bytes[1] == 0x8b
}

pub struct VolumeLoader;

impl VolumeLoader {
    /// Load a file or a directory of DICOM slices.
    ///
    /// The format is taken from the file name, falling back to the content.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Volume, VolumeLoaderError> {
        let path = path.as_ref();
        if path.is_dir() {
            return Self::load_from_directory(path, SortBy::default());
        }
        log::info!("Loading {}", path.display());
        match SourceFormat::from_path(path) {
            Some(SourceFormat::Nifti) => {
                let object = ReaderOptions::new()
                    .read_file(path)
                    .map_err(|e| VolumeLoaderError::CorruptFile(format!("{}: {e}", path.display())))?;
                Self::nifti_to_volume(object)
            }
            Some(SourceFormat::Dicom) => Self::load_from_file_paths(&[path], SortBy::None),
            Some(SourceFormat::Raster) => Self::raster_to_volume(image::open(path)?),
            None => {
                let bytes = fs::read(path)?;
                Self::load_from_bytes(&bytes, None)
            }
        }
    }

    /// Load from an in-memory byte stream. Without a `format` hint the
    /// content is sniffed.
    pub fn load_from_bytes(
        bytes: &[u8],
        format: Option<SourceFormat>,
    ) -> Result<Volume, VolumeLoaderError> {
        let format = format
            .or_else(|| SourceFormat::sniff(bytes))
            .ok_or_else(|| VolumeLoaderError::UnsupportedFormat("unrecognized content".into()))?;
        log::debug!("Decoding {} bytes as {:?}", bytes.len(), format);

        match format {
            SourceFormat::Nifti => {
                let object = if is_gzip(bytes) {
                    InMemNiftiObject::from_reader(GzDecoder::new(Cursor::new(bytes)))
                } else {
                    InMemNiftiObject::from_reader(Cursor::new(bytes))
                }
                .map_err(|e| VolumeLoaderError::CorruptFile(format!("NIfTI: {e}")))?;
                Self::nifti_to_volume(object)
            }
            SourceFormat::Dicom => {
                // Skip the 128 byte preamble; the reader expects the magic code.
                let body = bytes
                    .get(128..)
                    .ok_or_else(|| VolumeLoaderError::CorruptFile("truncated DICOM preamble".into()))?;
                let object = dicom::object::from_reader(body)?;
                Self::load_from_dicom_objects(&[object], SortBy::None)
            }
            SourceFormat::Raster => Self::raster_to_volume(image::load_from_memory(bytes)?),
        }
    }

    /// Grey-level samples at the image's native bit depth. Colour images are
    /// reduced to luma first.
    fn raster_to_volume(image: DynamicImage) -> Result<Volume, VolumeLoaderError> {
        let (width, height) = (image.width(), image.height());
        let samples: Vec<f32> = match image {
            DynamicImage::ImageLuma16(_)
            | DynamicImage::ImageLumaA16(_)
            | DynamicImage::ImageRgb16(_)
            | DynamicImage::ImageRgba16(_) => {
                image.into_luma16().into_raw().into_iter().map(f32::from).collect()
            }
            DynamicImage::ImageRgb32F(_) | DynamicImage::ImageRgba32F(_) => {
                image.to_luma32f().into_raw()
            }
            _ => image.into_luma8().into_raw().into_iter().map(f32::from).collect(),
        };
        let data = Array2::from_shape_vec((height as usize, width as usize), samples)
            .map_err(|e| VolumeLoaderError::CorruptFile(e.to_string()))?;
        Ok(Volume::from_slice(data, (1.0, 1.0))?)
    }

    fn nifti_to_volume(object: InMemNiftiObject) -> Result<Volume, VolumeLoaderError> {
        let pixdim = object.header().pixdim;
        let array = object
            .into_volume()
            .into_ndarray::<f32>()
            .map_err(|e| VolumeLoaderError::CorruptFile(format!("NIfTI volume: {e}")))?;

        // nifti-rs indexes voxels as [x, y, z, (t, ...)]; extra dimensions
        // are reduced to their first entry.
        let shape = array.shape().to_vec();
        if shape.len() < 2 {
            return Err(VolumeLoaderError::CorruptFile(format!(
                "expected at least 2 dimensions, got {}",
                shape.len()
            )));
        }
        let (nx, ny) = (shape[0], shape[1]);
        let nz = shape.get(2).copied().unwrap_or(1);
        let mut index = vec![0usize; shape.len()];
        let data = Array3::from_shape_fn((nz, ny, nx), |(z, y, x)| {
            index[0] = x;
            index[1] = y;
            if index.len() > 2 {
                index[2] = z;
            }
            array[index.as_slice()]
        });

        let spacing_or_unit = |d: f32| {
            if d.is_finite() && d > 0.0 {
                d
            } else {
                log::warn!("Invalid NIfTI pixdim {d}, assuming 1.0");
                1.0
            }
        };
        let spacing = (
            spacing_or_unit(pixdim[1]),
            spacing_or_unit(pixdim[2]),
            spacing_or_unit(pixdim[3]),
        );
        log::info!("Decoded NIfTI volume {:?} with spacing {:?}", (nz, ny, nx), spacing);

        if shape.len() == 2 {
            let plane = data.index_axis_move(ndarray::Axis(0), 0);
            return Ok(Volume::from_slice(plane, (spacing.0, spacing.1))?);
        }
        Ok(Volume::new(data, spacing)?)
    }

    /// Load a volume from DICOM objects
    ///
    /// # Arguments
    ///
    /// * `dicom_objects` - Slice of DICOM file objects
    /// * `sort_by` - Method to sort the slices
    ///
    /// # Errors
    ///
    /// Returns error if no valid images found or dimensions are inconsistent
    pub fn load_from_dicom_objects(
        dicom_objects: &[FileDicomObject<InMemDicomObject>],
        sort_by: SortBy,
    ) -> Result<Volume, VolumeLoaderError> {
        let mut images_with_order: Vec<_> = dicom_objects
            .iter()
            .filter_map(|dicom_object| Self::extract_image_with_order(dicom_object, &sort_by))
            .collect();

        if images_with_order.is_empty() {
            return Err(VolumeLoaderError::NoValidImages);
        }

        Self::sort_images(&mut images_with_order, sort_by);

        let images: Vec<_> = images_with_order
            .into_iter()
            .map(|(_, image)| image)
            .collect();

        Self::validate_dimensions(&images)?;

        let (x_spacing, y_spacing) =
            Self::get_pixel_spacing(dicom_objects).ok_or(VolumeLoaderError::MissingSpacing)?;

        if images.len() == 1 {
            let image = images.into_iter().next().ok_or(VolumeLoaderError::NoValidImages)?;
            return Ok(Volume::from_slice(image, (x_spacing, y_spacing))?);
        }

        let z_spacing =
            Self::get_slice_thickness(dicom_objects).ok_or(VolumeLoaderError::MissingSpacing)?;
        let volume_array = Self::build_volume_array(&images);
        log::info!(
            "Assembled {} DICOM slices into {:?}",
            images.len(),
            volume_array.dim()
        );
        Ok(Volume::new(volume_array, (x_spacing, y_spacing, z_spacing))?)
    }

    /// Load a volume from file paths
    pub fn load_from_file_paths(
        paths: &[impl AsRef<Path>],
        sort_by: SortBy,
    ) -> Result<Volume, VolumeLoaderError> {
        let objects: Result<Vec<_>, _> =
            paths.iter().map(|path| open_file(path.as_ref())).collect();

        Self::load_from_dicom_objects(&objects?, sort_by)
    }

    /// Load a volume from a directory containing .dcm files
    pub fn load_from_directory(
        path: impl AsRef<Path>,
        sort_by: SortBy,
    ) -> Result<Volume, VolumeLoaderError> {
        let paths: Vec<_> = fs::read_dir(path.as_ref())?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension()
                    .and_then(|s| s.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("dcm"))
            })
            .collect();

        if paths.is_empty() {
            return Err(VolumeLoaderError::NoValidImages);
        }

        log::info!("Found {} DICOM files in {}", paths.len(), path.as_ref().display());
        Self::load_from_file_paths(&paths, sort_by)
    }

    fn extract_image_with_order(
        dicom_object: &FileDicomObject<InMemDicomObject>,
        sort_by: &SortBy,
    ) -> Option<(Option<f32>, Array2<f32>)> {
        let order = Self::get_sort_order(dicom_object, sort_by)?;
        let image_2d = Self::decode_image(dicom_object)?;
        Some((order, image_2d))
    }

    fn get_sort_order(
        dicom_object: &FileDicomObject<InMemDicomObject>,
        sort_by: &SortBy,
    ) -> Option<Option<f32>> {
        match sort_by {
            SortBy::ImagePositionPatient => {
                let pos = dicom_object
                    .element(tags::IMAGE_POSITION_PATIENT)
                    .ok()?
                    .to_multi_float32()
                    .ok()?;
                Some(pos.get(2).copied())
            }
            SortBy::TablePosition => {
                let pos = dicom_object
                    .element(tags::TABLE_POSITION)
                    .ok()?
                    .to_float32()
                    .ok();
                Some(pos)
            }
            SortBy::InstanceNumber => {
                let num = dicom_object
                    .element(tags::INSTANCE_NUMBER)
                    .ok()?
                    .to_int::<i32>()
                    .ok()
                    .map(|n| n as f32);
                Some(num)
            }
            SortBy::None => Some(Some(0.0)),
        }
    }

    fn decode_image(dicom_object: &FileDicomObject<InMemDicomObject>) -> Option<Array2<f32>> {
        let pixel_data = dicom_object.decode_pixel_data().ok()?;
        let options = ConvertOptions::new().with_voi_lut(VoiLutOption::First);
        pixel_data
            .to_ndarray_with_options::<u16>(&options)
            .ok()
            .map(|arr| arr.slice_move(s![0, .., .., 0]).mapv(f32::from))
    }

    fn sort_images(images_with_order: &mut [(Option<f32>, Array2<f32>)], sort_by: SortBy) {
        if !matches!(sort_by, SortBy::None) {
            images_with_order
                .sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        }

        if matches!(sort_by, SortBy::ImagePositionPatient) {
            images_with_order.reverse();
        }
    }

    fn validate_dimensions(images: &[Array2<f32>]) -> Result<(), VolumeLoaderError> {
        let first_dim = images[0].dim();
        if images.iter().any(|img| img.dim() != first_dim) {
            return Err(VolumeLoaderError::InconsistentDimensions);
        }
        Ok(())
    }

    fn build_volume_array(images: &[Array2<f32>]) -> Array3<f32> {
        let (height, width) = images[0].dim();
        let depth = images.len();
        let mut volume = Array3::<f32>::zeros((depth, height, width));

        for (i, image) in images.iter().enumerate() {
            volume.slice_mut(s![i, .., ..]).assign(image);
        }

        volume
    }

    /// `(x, y)` spacing; PixelSpacing stores the row spacing first.
    fn get_pixel_spacing(dicom_objects: &[FileDicomObject<InMemDicomObject>]) -> Option<(f32, f32)> {
        dicom_objects.iter().find_map(|dicom_object| {
            let pixel_spacing = dicom_object
                .element(tags::PIXEL_SPACING)
                .ok()?
                .to_multi_float32()
                .ok()?;
            Some((*pixel_spacing.get(1)?, *pixel_spacing.first()?))
        })
    }

    fn get_slice_thickness(dicom_objects: &[FileDicomObject<InMemDicomObject>]) -> Option<f32> {
        dicom_objects.iter().find_map(|dicom_object| {
            dicom_object
                .element(tags::SLICE_THICKNESS)
                .ok()?
                .to_float32()
                .ok()
        })
    }
}
