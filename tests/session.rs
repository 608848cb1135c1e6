mod common;

use std::sync::Arc;

use common::{coordinate_volume, counting_plane};
use image::GrayImage;
use scanview::{
    Command, DisplaySettings, Interpolation, NlMeansParams, Orientation, PipelineError,
    SessionError, Transform, ViewTransform, ViewerSession, Viewport,
};

#[derive(Default)]
struct RecordingViewport {
    frames: Vec<((u32, u32), ViewTransform)>,
}

impl Viewport for RecordingViewport {
    fn present(&mut self, image: &GrayImage, view: &ViewTransform) {
        self.frames.push((image.dimensions(), *view));
    }
}

#[tokio::test]
async fn background_result_is_committed() {
    let mut session = ViewerSession::new(counting_plane(12, 12));
    let pending = session
        .spawn_transform(Transform::non_local_means(NlMeansParams::default()).unwrap())
        .unwrap();
    assert!(session.finish(pending).await.unwrap());
    assert_eq!(session.history().len(), 1);
    assert!(session.history().can_undo());
}

#[tokio::test]
async fn superseded_request_is_discarded() {
    let mut session = ViewerSession::new(counting_plane(12, 12));
    let first = session.spawn_transform(Transform::median(3).unwrap()).unwrap();
    let second = session
        .spawn_transform(Transform::gaussian_blur(1.0).unwrap())
        .unwrap();

    assert!(!session.finish(first).await.unwrap());
    assert!(session.finish(second).await.unwrap());
    assert_eq!(
        session.history().transforms(),
        vec![Transform::gaussian_blur(1.0).unwrap()]
    );
}

#[tokio::test]
async fn buffer_change_supersedes_pending_work() {
    let mut session = ViewerSession::new(counting_plane(12, 12));
    let pending = session.spawn_transform(Transform::median(5).unwrap()).unwrap();
    session
        .dispatch(Command::Apply(Transform::gaussian_blur(0.5).unwrap()))
        .unwrap();
    let after_apply = Arc::clone(session.current());

    assert!(!session.finish(pending).await.unwrap());
    assert!(Arc::ptr_eq(session.current(), &after_apply));
}

#[tokio::test]
async fn failed_background_transform_leaves_buffer() {
    let mut session = ViewerSession::new(counting_plane(8, 8));
    let before = Arc::clone(session.current());
    let pending = session
        .spawn_transform(Transform::reslice(Interpolation::Linear))
        .unwrap();
    let err = session.finish(pending).await.unwrap_err();
    assert!(matches!(
        err,
        SessionError::Pipeline(PipelineError::DimensionMismatch { .. })
    ));
    assert!(Arc::ptr_eq(session.current(), &before));
    assert!(session.history().is_empty());
}

#[tokio::test]
async fn background_load_replaces_buffer() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("slice.png");
    GrayImage::from_fn(5, 3, |x, y| image::Luma([(x + y * 5) as u8])).save(&path).unwrap();

    let mut session = ViewerSession::new(coordinate_volume());
    session
        .dispatch(Command::Apply(Transform::median(3).unwrap()))
        .unwrap();
    let pending = session.spawn_load(&path).unwrap();
    assert_eq!(pending.path(), path.as_path());
    assert!(session.finish_load(pending).await.unwrap());

    assert_eq!(session.current().dim(), (1, 3, 5));
    assert!(session.history().is_empty());
    assert_eq!(session.cursor().get(Orientation::Sagittal), 2);
}

#[tokio::test]
async fn only_latest_load_is_committed() {
    let dir = tempfile::tempdir().unwrap();
    let first_path = dir.path().join("first.png");
    let second_path = dir.path().join("second.png");
    GrayImage::from_pixel(4, 4, image::Luma([1])).save(&first_path).unwrap();
    GrayImage::from_pixel(6, 2, image::Luma([2])).save(&second_path).unwrap();

    let mut session = ViewerSession::new(counting_plane(3, 3));
    let first = session.spawn_load(&first_path).unwrap();
    let second = session.spawn_load(&second_path).unwrap();
    assert!(!session.finish_load(first).await.unwrap());
    assert!(session.finish_load(second).await.unwrap());
    assert_eq!(session.current().dim(), (1, 2, 6));
}

#[tokio::test]
async fn failed_load_leaves_session_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = ViewerSession::new(counting_plane(3, 3));
    let before = Arc::clone(session.current());
    let pending = session.spawn_load(dir.path().join("absent.png")).unwrap();
    assert!(matches!(
        session.finish_load(pending).await,
        Err(SessionError::Load(_))
    ));
    assert!(Arc::ptr_eq(session.current(), &before));
}

#[test]
fn failed_command_leaves_session_unchanged() {
    let mut session = ViewerSession::new(coordinate_volume());
    session
        .dispatch(Command::Apply(Transform::median(3).unwrap()))
        .unwrap();
    let before = Arc::clone(session.current());

    let rejected = session.dispatch(Command::Apply(Transform::Median { window: 4 }));
    assert!(matches!(rejected, Err(SessionError::Pipeline(_))));
    assert!(Arc::ptr_eq(session.current(), &before));
    assert_eq!(session.history().len(), 1);

    let bad_display = DisplaySettings {
        contrast: 0.0,
        ..Default::default()
    };
    assert!(
        session
            .dispatch(Command::SetDisplay {
                orientation: Orientation::Sagittal,
                settings: bad_display,
            })
            .is_err()
    );
    assert_eq!(*session.display(Orientation::Sagittal), DisplaySettings::default());
}

#[test]
fn undo_redo_and_reset_through_commands() {
    let mut session = ViewerSession::new(coordinate_volume());
    assert!(matches!(
        session.dispatch(Command::Undo),
        Err(SessionError::NothingToUndo)
    ));
    session
        .dispatch(Command::Apply(Transform::zoom(2.0, Interpolation::Nearest).unwrap()))
        .unwrap();
    assert_eq!(session.current().dim(), (4, 12, 16));

    session.dispatch(Command::Undo).unwrap();
    assert_eq!(session.current().dim(), (4, 6, 8));
    session.dispatch(Command::Redo).unwrap();
    assert_eq!(session.current().dim(), (4, 12, 16));
    assert!(matches!(
        session.dispatch(Command::Redo),
        Err(SessionError::NothingToRedo)
    ));

    session.dispatch(Command::Reset).unwrap();
    assert!(Arc::ptr_eq(session.current(), session.history().original()));
}

#[test]
fn cine_playback_wraps_around() {
    let mut session = ViewerSession::new(coordinate_volume());
    session
        .dispatch(Command::SetSlice {
            orientation: Orientation::Axial,
            index: 3,
        })
        .unwrap();
    session.dispatch(Command::StepSlice(Orientation::Axial)).unwrap();
    assert_eq!(session.cursor().get(Orientation::Axial), 0);
    assert!(matches!(
        session.dispatch(Command::SetSlice {
            orientation: Orientation::Axial,
            index: 4,
        }),
        Err(SessionError::SliceOutOfRange { count: 4, .. })
    ));
}

#[test]
fn present_hands_slices_to_the_viewport() {
    let mut session = ViewerSession::new(coordinate_volume());
    let settings = DisplaySettings {
        zoom: 2.0,
        pan: (5.0, -3.0),
        ..Default::default()
    };
    session
        .dispatch(Command::SetDisplay {
            orientation: Orientation::Coronal,
            settings,
        })
        .unwrap();

    let mut viewport = RecordingViewport::default();
    for orientation in Orientation::ALL {
        session.present(&mut viewport, orientation).unwrap();
    }
    let sizes: Vec<_> = viewport.frames.iter().map(|(size, _)| *size).collect();
    assert_eq!(sizes, vec![(8, 6), (8, 4), (6, 4)]);
    let views: Vec<_> = viewport.frames.iter().map(|(_, view)| *view).collect();
    let neutral = DisplaySettings::default().view_transform();
    assert_eq!(views, vec![neutral, settings.view_transform(), neutral]);
}

#[test]
fn replay_at_zoom_reapplies_history() {
    let mut session = ViewerSession::new(counting_plane(6, 6));
    session
        .dispatch(Command::Apply(Transform::gaussian_blur(1.0).unwrap()))
        .unwrap();
    session.replay_at_zoom(2.0, Interpolation::Cubic).unwrap();
    assert_eq!(session.current().dim(), (1, 12, 12));
    assert_eq!(
        session.history().transforms(),
        vec![Transform::gaussian_blur(1.0).unwrap()]
    );
}
