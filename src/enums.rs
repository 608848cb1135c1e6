#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Orientation {
    Axial,
    Coronal,
    Sagittal,
}

impl Orientation {
    pub const ALL: [Orientation; 3] = [Self::Axial, Self::Coronal, Self::Sagittal];

    /// Volume axis (in `(depth, height, width)` order) indexed by this orientation.
    pub fn axis(self) -> usize {
        match self {
            Orientation::Axial => 0,
            Orientation::Coronal => 1,
            Orientation::Sagittal => 2,
        }
    }
}

/// Interpolation kernel used when resampling.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Interpolation {
    /// Source sample containing the destination sample centre.
    #[default]
    Nearest,
    /// Separable two-sample kernel applied along each axis in turn.
    Linear,
    /// Direct 2x2 in-plane blend.
    Bilinear,
    /// Catmull-Rom, four samples per axis.
    Cubic,
}

#[derive(Debug, Default, Clone, Copy)]
pub enum SortBy {
    #[default]
    ImagePositionPatient,
    TablePosition,
    InstanceNumber,
    None,
}
