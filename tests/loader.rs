use std::fs;
use std::io::{Cursor, Write};

use flate2::{Compression, write::GzEncoder};

use image::{DynamicImage, ImageBuffer, ImageFormat, Luma};
use scanview::{SourceFormat, VolumeLoader, VolumeLoaderError};

fn ramp_u16(width: u32, height: u32) -> ImageBuffer<Luma<u16>, Vec<u16>> {
    ImageBuffer::from_fn(width, height, |x, y| Luma([((y * width + x) * 100) as u16]))
}

#[test]
fn sixteen_bit_png_round_trips_through_the_filesystem() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ramp.png");
    ramp_u16(4, 3).save(&path).unwrap();

    let volume = VolumeLoader::load_from_path(&path).unwrap();
    assert!(volume.is_planar());
    assert_eq!(volume.dim(), (1, 3, 4));
    assert_eq!(volume.spacing(), (1.0, 1.0, 1.0));
    assert_eq!(volume.data()[[0, 2, 3]], 1100.0);
    assert_eq!(volume.intensity_range(), (0.0, 1100.0));
}

#[test]
fn raster_bytes_are_sniffed() {
    let mut bytes = Vec::new();
    DynamicImage::ImageLuma16(ramp_u16(5, 2))
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    assert_eq!(SourceFormat::sniff(&bytes), Some(SourceFormat::Raster));

    let volume = VolumeLoader::load_from_bytes(&bytes, None).unwrap();
    assert_eq!(volume.dim(), (1, 2, 5));
    assert_eq!(volume.data()[[0, 1, 0]], 500.0);
}

#[test]
fn extensionless_file_falls_back_to_content() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scan");
    ramp_u16(3, 3).save_with_format(&path, ImageFormat::Png).unwrap();

    let volume = VolumeLoader::load_from_path(&path).unwrap();
    assert_eq!(volume.dim(), (1, 3, 3));
}

#[test]
fn unknown_file_is_unsupported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.txt");
    fs::write(&path, "not a scan").unwrap();

    assert!(matches!(
        VolumeLoader::load_from_path(&path),
        Err(VolumeLoaderError::UnsupportedFormat(_))
    ));
}

#[test]
fn truncated_png_is_reported_not_panicked() {
    let mut bytes = Vec::new();
    DynamicImage::ImageLuma16(ramp_u16(16, 16))
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes.truncate(bytes.len() / 2);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.png");
    fs::write(&path, &bytes).unwrap();

    let err = VolumeLoader::load_from_path(&path).unwrap_err();
    assert!(
        matches!(
            err,
            VolumeLoaderError::CorruptFile(_) | VolumeLoaderError::Io(_)
        ),
        "unexpected error {err:?}"
    );
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = VolumeLoader::load_from_path(dir.path().join("absent.png")).unwrap_err();
    assert!(matches!(err, VolumeLoaderError::Io(_)), "unexpected error {err:?}");
}

#[test]
fn eight_bit_png_keeps_native_values() {
    let image = ImageBuffer::from_fn(4, 2, |x, y| Luma([(10 + y * 4 + x) as u8]));
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gray8.png");
    image.save(&path).unwrap();

    let volume = VolumeLoader::load_from_path(&path).unwrap();
    assert_eq!(volume.data()[[0, 0, 0]], 10.0);
    assert_eq!(volume.intensity_range(), (10.0, 17.0));
}

#[test]
fn rgb_png_is_reduced_to_eight_bit_luma() {
    let image: ImageBuffer<image::Rgb<u8>, Vec<u8>> =
        ImageBuffer::from_pixel(3, 3, image::Rgb([40, 40, 40]));
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(image)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();

    let volume = VolumeLoader::load_from_bytes(&bytes, None).unwrap();
    assert_eq!(volume.intensity_range(), (40.0, 40.0));
}

/// Single-file NIfTI-1 with float32 voxels stored x fastest.
fn nifti_bytes(dims: &[usize], pixdim: [f32; 3], voxel: impl Fn(&[usize]) -> f32) -> Vec<u8> {
    let mut header = vec![0u8; 352];
    header[0..4].copy_from_slice(&348i32.to_le_bytes());
    let mut dim = [1i16; 8];
    dim[0] = dims.len() as i16;
    for (slot, &n) in dim[1..].iter_mut().zip(dims) {
        *slot = n as i16;
    }
    for (i, d) in dim.iter().enumerate() {
        header[40 + 2 * i..42 + 2 * i].copy_from_slice(&d.to_le_bytes());
    }
    header[70..72].copy_from_slice(&16i16.to_le_bytes());
    header[72..74].copy_from_slice(&32i16.to_le_bytes());
    let pix = [1.0, pixdim[0], pixdim[1], pixdim[2], 1.0, 1.0, 1.0, 1.0];
    for (i, p) in pix.iter().enumerate() {
        header[76 + 4 * i..80 + 4 * i].copy_from_slice(&f32::to_le_bytes(*p));
    }
    header[108..112].copy_from_slice(&352f32.to_le_bytes());
    header[112..116].copy_from_slice(&1f32.to_le_bytes());
    header[344..348].copy_from_slice(b"n+1\0");

    let total: usize = dims.iter().product();
    let mut index = vec![0usize; dims.len()];
    for linear in 0..total {
        let mut rest = linear;
        for (axis, &n) in dims.iter().enumerate() {
            index[axis] = rest % n;
            rest /= n;
        }
        header.extend_from_slice(&voxel(&index).to_le_bytes());
    }
    header
}

fn gzip(bytes: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes).unwrap();
    encoder.finish().unwrap()
}

fn coordinate_code(index: &[usize]) -> f32 {
    index
        .iter()
        .zip([1.0, 10.0, 100.0, 1000.0])
        .map(|(&i, weight)| i as f32 * weight)
        .sum()
}

#[test]
fn nifti_volume_is_reordered_to_depth_height_width() {
    let bytes = nifti_bytes(&[4, 3, 2], [0.5, 0.75, 2.0], coordinate_code);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("brain.nii");
    fs::write(&path, &bytes).unwrap();

    let volume = VolumeLoader::load_from_path(&path).unwrap();
    assert!(!volume.is_planar());
    assert_eq!(volume.dim(), (2, 3, 4));
    assert_eq!(volume.spacing(), (0.5, 0.75, 2.0));
    for z in 0..2 {
        for y in 0..3 {
            for x in 0..4 {
                assert_eq!(volume.data()[[z, y, x]], coordinate_code(&[x, y, z]));
            }
        }
    }
}

#[test]
fn gzipped_nifti_loads_from_bytes_and_path() {
    let compressed = gzip(&nifti_bytes(&[3, 2, 2], [1.0, 1.0, 3.0], coordinate_code));
    assert_eq!(SourceFormat::sniff(&compressed), Some(SourceFormat::Nifti));

    let from_bytes = VolumeLoader::load_from_bytes(&compressed, None).unwrap();
    assert_eq!(from_bytes.dim(), (2, 2, 3));
    assert_eq!(from_bytes.data()[[1, 1, 2]], 112.0);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("brain.nii.gz");
    fs::write(&path, &compressed).unwrap();
    let from_path = VolumeLoader::load_from_path(&path).unwrap();
    assert_eq!(from_path, from_bytes);
}

#[test]
fn two_dimensional_nifti_is_planar() {
    let bytes = nifti_bytes(&[3, 2], [0.4, 0.6, 1.0], coordinate_code);
    let volume = VolumeLoader::load_from_bytes(&bytes, Some(SourceFormat::Nifti)).unwrap();
    assert!(volume.is_planar());
    assert_eq!(volume.dim(), (1, 2, 3));
    assert_eq!(volume.spacing(), (0.4, 0.6, 1.0));
    assert_eq!(volume.data()[[0, 1, 2]], 12.0);
}

#[test]
fn four_dimensional_nifti_keeps_first_frame() {
    let bytes = nifti_bytes(&[2, 2, 2, 3], [1.0, 1.0, 1.0], coordinate_code);
    let volume = VolumeLoader::load_from_bytes(&bytes, None).unwrap();
    assert_eq!(volume.dim(), (2, 2, 2));
    assert_eq!(volume.intensity_range(), (0.0, 111.0));
}

#[test]
fn non_positive_pixdim_falls_back_to_unit_spacing() {
    let bytes = nifti_bytes(&[2, 2, 2], [0.0, -1.0, 2.5], coordinate_code);
    let volume = VolumeLoader::load_from_bytes(&bytes, None).unwrap();
    assert_eq!(volume.spacing(), (1.0, 1.0, 2.5));
}
