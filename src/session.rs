//! Viewer session: the single owner of the displayed buffer.
//!
//! A front end translates its events into [`Command`]s and hands them to
//! [`ViewerSession::dispatch`]. The session keeps the pipeline history, the
//! display settings and the slice cursor, and renders slices on request.

use crate::display::{DisplaySettings, Viewport};
use crate::enums::{Interpolation, Orientation};
use crate::error::PipelineError;
use crate::pipeline::PipelineHistory;
use crate::transform::Transform;
use crate::volume::Volume;
use crate::volume_loader::{VolumeLoader, VolumeLoaderError};

use image::GrayImage;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Load(#[from] VolumeLoaderError),

    #[error("Nothing to undo")]
    NothingToUndo,

    #[error("Nothing to redo")]
    NothingToRedo,

    #[error("Slice {index} out of range for {orientation:?} ({count} slices)")]
    SliceOutOfRange {
        orientation: Orientation,
        index: usize,
        count: usize,
    },

    #[error("Position ({u}, {v}) lies outside the displayed slice")]
    PositionOutOfRange { u: f32, v: f32 },

    #[error("No async runtime available for background processing")]
    NoRuntime,

    #[error("Background transform failed: {0}")]
    TaskFailed(String),
}

/// Current slice index per orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SliceCursor {
    indices: [usize; 3],
}

impl SliceCursor {
    /// Middle slice of every orientation.
    pub fn centered(volume: &Volume) -> Self {
        let (depth, height, width) = volume.dim();
        Self {
            indices: [depth / 2, height / 2, width / 2],
        }
    }

    pub fn get(&self, orientation: Orientation) -> usize {
        self.indices[orientation.axis()]
    }

    fn set(&mut self, orientation: Orientation, index: usize) {
        self.indices[orientation.axis()] = index;
    }

    fn clamp_to(&mut self, volume: &Volume) {
        for orientation in Orientation::ALL {
            let last = volume.slice_count(orientation) - 1;
            let index = self.get(orientation).min(last);
            self.set(orientation, index);
        }
    }
}

/// Operations a front end may request.
#[derive(Debug, Clone)]
pub enum Command {
    /// Replace the buffer and discard the history.
    Load(Volume),
    Apply(Transform),
    Undo,
    Redo,
    Reset,
    SetSlice {
        orientation: Orientation,
        index: usize,
    },
    /// Cine playback: advance one slice, wrapping after the last.
    StepSlice(Orientation),
    /// Crosshair click at normalized `(u, v)` in the displayed slice of
    /// `orientation`; moves the other two orientations to that point.
    Locate {
        orientation: Orientation,
        u: f32,
        v: f32,
    },
    /// Display adjustments for the view of one orientation.
    SetDisplay {
        orientation: Orientation,
        settings: DisplaySettings,
    },
}

/// A transform running on the blocking pool.
#[derive(Debug)]
pub struct PendingTransform {
    ticket: u64,
    transform: Transform,
    handle: JoinHandle<Result<Volume, PipelineError>>,
}

impl PendingTransform {
    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// A file being decoded on the blocking pool.
#[derive(Debug)]
pub struct PendingLoad {
    ticket: u64,
    path: PathBuf,
    handle: JoinHandle<Result<Volume, VolumeLoaderError>>,
}

impl PendingLoad {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

#[derive(Debug)]
pub struct ViewerSession {
    history: PipelineHistory,
    /// One per view, indexed by [`Orientation::axis`].
    displays: [DisplaySettings; 3],
    cursor: SliceCursor,
    /// Bumped whenever the buffer is replaced or a background request is
    /// issued; results carrying an older ticket are discarded.
    generation: u64,
    /// Only the most recent load request is committed.
    load_generation: u64,
}

impl ViewerSession {
    pub fn new(volume: Volume) -> Self {
        let cursor = SliceCursor::centered(&volume);
        Self {
            history: PipelineHistory::new(volume),
            displays: [DisplaySettings::default(); 3],
            cursor,
            generation: 0,
            load_generation: 0,
        }
    }

    pub fn current(&self) -> &Arc<Volume> {
        self.history.current()
    }

    pub fn history(&self) -> &PipelineHistory {
        &self.history
    }

    /// Display settings of the view showing `orientation`.
    pub fn display(&self, orientation: Orientation) -> &DisplaySettings {
        &self.displays[orientation.axis()]
    }

    pub fn cursor(&self) -> &SliceCursor {
        &self.cursor
    }

    /// Execute one command. A failed command leaves the session unchanged.
    pub fn dispatch(&mut self, command: Command) -> Result<(), SessionError> {
        match command {
            Command::Load(volume) => {
                log::info!("Loading {:?} buffer into session", volume.dim());
                self.cursor = SliceCursor::centered(&volume);
                self.history = PipelineHistory::new(volume);
                self.generation += 1;
            }
            Command::Apply(transform) => {
                log::info!("Applying {}", transform.name());
                self.history.apply(transform)?;
                self.buffer_replaced();
            }
            Command::Undo => {
                let undone = self.history.undo().ok_or(SessionError::NothingToUndo)?;
                log::info!("Undid {}", undone.name());
                self.buffer_replaced();
            }
            Command::Redo => {
                let redone = self.history.redo().ok_or(SessionError::NothingToRedo)?;
                log::info!("Redid {}", redone.name());
                self.buffer_replaced();
            }
            Command::Reset => {
                log::info!("Resetting to the loaded buffer");
                self.history.reset();
                self.buffer_replaced();
            }
            Command::SetSlice { orientation, index } => {
                let count = self.current().slice_count(orientation);
                if index >= count {
                    return Err(SessionError::SliceOutOfRange {
                        orientation,
                        index,
                        count,
                    });
                }
                self.cursor.set(orientation, index);
            }
            Command::StepSlice(orientation) => {
                let count = self.current().slice_count(orientation);
                let next = (self.cursor.get(orientation) + 1) % count;
                self.cursor.set(orientation, next);
            }
            Command::Locate { orientation, u, v } => self.locate(orientation, u, v)?,
            Command::SetDisplay {
                orientation,
                settings,
            } => {
                settings.validate()?;
                self.displays[orientation.axis()] = settings;
            }
        }
        Ok(())
    }

    fn buffer_replaced(&mut self) {
        self.generation += 1;
        let current = Arc::clone(self.history.current());
        self.cursor.clamp_to(&current);
    }

    fn locate(&mut self, orientation: Orientation, u: f32, v: f32) -> Result<(), SessionError> {
        if !((0.0..=1.0).contains(&u) && (0.0..=1.0).contains(&v)) {
            return Err(SessionError::PositionOutOfRange { u, v });
        }
        let (row_orientation, col_orientation) = match orientation {
            Orientation::Axial => (Orientation::Coronal, Orientation::Sagittal),
            Orientation::Coronal => (Orientation::Axial, Orientation::Sagittal),
            Orientation::Sagittal => (Orientation::Axial, Orientation::Coronal),
        };
        let volume = Arc::clone(self.current());
        // Displayed slices are rotated by 180 degrees.
        let to_index = |t: f32, target: Orientation| {
            let count = volume.slice_count(target);
            let displayed = ((t * count as f32) as usize).min(count - 1);
            count - 1 - displayed
        };
        self.cursor.set(row_orientation, to_index(v, row_orientation));
        self.cursor.set(col_orientation, to_index(u, col_orientation));
        Ok(())
    }

    /// Display image of the cursor slice in `orientation`.
    pub fn render(&self, orientation: Orientation) -> Option<GrayImage> {
        self.current()
            .get_image_from_axis(self.cursor.get(orientation), orientation, self.display(orientation))
    }

    /// Like [`ViewerSession::render`], corrected to the physical aspect ratio.
    pub fn render_isotropic(&self, orientation: Orientation) -> Option<GrayImage> {
        self.current()
            .get_isotropic_image_from_axis(
                self.cursor.get(orientation),
                orientation,
                self.display(orientation),
            )
    }

    /// Render and hand the slice to `viewport`.
    pub fn present(&self, viewport: &mut impl Viewport, orientation: Orientation) -> Result<(), SessionError> {
        let index = self.cursor.get(orientation);
        let image = self.render(orientation).ok_or(SessionError::SliceOutOfRange {
            orientation,
            index,
            count: self.current().slice_count(orientation),
        })?;
        viewport.present(&image, &self.display(orientation).view_transform());
        Ok(())
    }

    /// Re-run the recorded transforms on the loaded buffer zoomed by `factor`.
    pub fn replay_at_zoom(&mut self, factor: f32, interpolation: Interpolation) -> Result<(), SessionError> {
        let zoom = Transform::zoom(factor, interpolation)?;
        let base = zoom.apply(self.history.original())?;
        let transforms = self.history.transforms();
        log::info!("Replaying {} transforms at {factor}x", transforms.len());
        self.history = PipelineHistory::replay(base, &transforms)?;
        self.buffer_replaced();
        Ok(())
    }

    /// Start `transform` on the blocking pool against the current buffer.
    ///
    /// Must be called from within a tokio runtime. Issuing another request,
    /// or changing the buffer, supersedes this one.
    pub fn spawn_transform(&mut self, transform: Transform) -> Result<PendingTransform, SessionError> {
        transform.validate()?;
        let runtime = Handle::try_current().map_err(|_| SessionError::NoRuntime)?;
        self.generation += 1;
        let source = Arc::clone(self.current());
        log::debug!("Spawning {} as request {}", transform.name(), self.generation);
        let handle = runtime.spawn_blocking(move || transform.apply(&source));
        Ok(PendingTransform {
            ticket: self.generation,
            transform,
            handle,
        })
    }

    /// Wait for a background transform and commit it if it is still the
    /// latest request. Returns `false` when the result was discarded.
    pub async fn finish(&mut self, pending: PendingTransform) -> Result<bool, SessionError> {
        let PendingTransform {
            ticket,
            transform,
            handle,
        } = pending;
        let result = handle
            .await
            .map_err(|e| SessionError::TaskFailed(e.to_string()))?;
        if ticket != self.generation {
            log::warn!("Discarding superseded {} result", transform.name());
            return Ok(false);
        }
        let volume = result?;
        self.history.push(transform, Arc::new(volume));
        self.buffer_replaced();
        Ok(true)
    }

    /// Start decoding `path` on the blocking pool. A later call supersedes
    /// this one.
    pub fn spawn_load(&mut self, path: impl Into<PathBuf>) -> Result<PendingLoad, SessionError> {
        let runtime = Handle::try_current().map_err(|_| SessionError::NoRuntime)?;
        let path = path.into();
        self.load_generation += 1;
        log::debug!("Spawning load of {} as request {}", path.display(), self.load_generation);
        let source = path.clone();
        let handle = runtime.spawn_blocking(move || VolumeLoader::load_from_path(source));
        Ok(PendingLoad {
            ticket: self.load_generation,
            path,
            handle,
        })
    }

    /// Wait for a background load and replace the buffer with it, unless a
    /// newer load was requested. Returns `false` when the result was
    /// discarded. A failed load leaves the session unchanged.
    pub async fn finish_load(&mut self, pending: PendingLoad) -> Result<bool, SessionError> {
        let PendingLoad {
            ticket,
            path,
            handle,
        } = pending;
        let result = handle
            .await
            .map_err(|e| SessionError::TaskFailed(e.to_string()))?;
        if ticket != self.load_generation {
            log::warn!("Discarding superseded load of {}", path.display());
            return Ok(false);
        }
        self.dispatch(Command::Load(result?))?;
        Ok(true)
    }
}
