use std::{env, error::Error, path::PathBuf};

use scanview::{
    Command, ContrastMethod, NlMeansParams, Orientation, Roi, Transform, TransferFunction,
    ViewerSession, VolumeLoader, compute_snr, histogram,
};

/// Central quarter of the axial plane on the middle slice.
fn center_roi(dim: (usize, usize, usize)) -> Roi {
    let (depth, height, width) = dim;
    Roi::cuboid(
        (width / 4, height / 4, depth / 2),
        ((width / 2).max(1), (height / 2).max(1), 1),
    )
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let path = env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("dicom"));
    let volume = VolumeLoader::load_from_path(&path)?;
    log::info!(
        "Loaded {} buffer {:?} with spacing {:?}",
        volume.kind(),
        volume.dim(),
        volume.spacing()
    );

    let roi = center_roi(volume.dim());
    let mut session = ViewerSession::new(volume);

    session.dispatch(Command::Apply(Transform::gaussian_noise(10.0, 42)?))?;
    let noisy_snr = compute_snr(session.current(), &roi);

    let pending = session.spawn_transform(Transform::non_local_means(NlMeansParams::default())?)?;
    session.finish(pending).await?;
    session.dispatch(Command::Apply(Transform::contrast(ContrastMethod::default())?))?;
    let denoised_snr = compute_snr(session.current(), &roi);

    match (noisy_snr, denoised_snr) {
        (Ok(before), Ok(after)) => log::info!("SNR {before:.2} -> {after:.2}"),
        (before, after) => log::warn!("SNR undefined: {before:?} -> {after:?}"),
    }

    let bins = histogram(session.current(), 16)?;
    if let Some(peak) = bins.iter().max_by_key(|bin| bin.count) {
        log::info!(
            "Histogram peak [{:.1}, {:.1}) holds {} samples",
            peak.lower,
            peak.upper,
            peak.count
        );
    }

    let (min, max) = session.current().intensity_range();
    let transfer = TransferFunction::for_range(min, max);
    log::debug!("Opacity ramp {:?}", transfer.opacity_points());

    let image = session
        .render(Orientation::Axial)
        .ok_or("middle axial slice is out of range")?;
    image.save("result.png")?;
    log::info!("Wrote result.png after {:?}", session.history().transforms());
    Ok(())
}
