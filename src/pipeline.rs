use crate::error::PipelineResult;
use crate::transform::Transform;
use crate::volume::Volume;

use std::sync::Arc;

/// Apply a single transform, returning a new buffer.
pub fn apply(volume: &Volume, transform: &Transform) -> PipelineResult<Volume> {
    transform.apply(volume)
}

/// Apply transforms in order. Stops at the first failure.
pub fn apply_all<'a>(
    volume: &Volume,
    transforms: impl IntoIterator<Item = &'a Transform>,
) -> PipelineResult<Volume> {
    let mut current = volume.clone();
    for transform in transforms {
        current = transform.apply(&current)?;
    }
    Ok(current)
}

#[derive(Debug, Clone)]
struct Step {
    transform: Transform,
    result: Arc<Volume>,
}

/// Ordered record of the transforms applied to a loaded buffer.
///
/// Every intermediate buffer is kept, so stepping back or forward never
/// recomputes anything.
#[derive(Debug, Clone)]
pub struct PipelineHistory {
    original: Arc<Volume>,
    applied: Vec<Step>,
    undone: Vec<Step>,
}

impl PipelineHistory {
    pub fn new(original: Volume) -> Self {
        Self::from_shared(Arc::new(original))
    }

    pub fn from_shared(original: Arc<Volume>) -> Self {
        Self {
            original,
            applied: Vec::new(),
            undone: Vec::new(),
        }
    }

    /// Rebuild a history by applying `transforms` to `original`.
    pub fn replay(original: Volume, transforms: &[Transform]) -> PipelineResult<Self> {
        let mut history = Self::new(original);
        for transform in transforms {
            history.apply(*transform)?;
        }
        Ok(history)
    }

    pub fn original(&self) -> &Arc<Volume> {
        &self.original
    }

    /// Buffer after the last applied transform.
    pub fn current(&self) -> &Arc<Volume> {
        self.applied
            .last()
            .map(|step| &step.result)
            .unwrap_or(&self.original)
    }

    pub fn transforms(&self) -> Vec<Transform> {
        self.applied.iter().map(|step| step.transform).collect()
    }

    pub fn len(&self) -> usize {
        self.applied.len()
    }

    pub fn is_empty(&self) -> bool {
        self.applied.is_empty()
    }

    pub fn can_undo(&self) -> bool {
        !self.applied.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.undone.is_empty()
    }

    /// Apply `transform` to the current buffer. On failure nothing changes.
    pub fn apply(&mut self, transform: Transform) -> PipelineResult<&Arc<Volume>> {
        let result = transform.apply(self.current())?;
        self.push(transform, Arc::new(result));
        Ok(self.current())
    }

    /// Record a result computed elsewhere (e.g. on a worker thread).
    pub(crate) fn push(&mut self, transform: Transform, result: Arc<Volume>) {
        self.undone.clear();
        self.applied.push(Step { transform, result });
    }

    /// Step back one transform. Returns the transform that was undone.
    pub fn undo(&mut self) -> Option<Transform> {
        let step = self.applied.pop()?;
        let transform = step.transform;
        self.undone.push(step);
        Some(transform)
    }

    /// Re-apply the most recently undone transform.
    pub fn redo(&mut self) -> Option<Transform> {
        let step = self.undone.pop()?;
        let transform = step.transform;
        self.applied.push(step);
        Some(transform)
    }

    /// Drop every applied transform and return to the loaded buffer.
    pub fn reset(&mut self) {
        self.applied.clear();
        self.undone.clear();
    }
}
