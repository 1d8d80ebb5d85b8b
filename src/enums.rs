use std::fmt;

/// Anatomical plane, named after the axis it holds fixed in a (Z, Y, X)
/// volume.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Orientation {
    /// Fixes Z.
    Axial,
    /// Fixes Y.
    Coronal,
    /// Fixes X.
    Sagittal,
}

impl Orientation {
    pub const ALL: [Orientation; 3] = [
        Orientation::Axial,
        Orientation::Coronal,
        Orientation::Sagittal,
    ];

    /// Index of the array axis this plane holds fixed.
    pub fn axis(self) -> usize {
        match self {
            Orientation::Axial => 0,
            Orientation::Coronal => 1,
            Orientation::Sagittal => 2,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Orientation::Axial => "Axial",
            Orientation::Coronal => "Coronal",
            Orientation::Sagittal => "Sagittal",
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Resampling used when a plane is resized for display.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Interpolation {
    /// Area averaging. Each output pixel is the coverage-weighted mean of the
    /// source pixels it overlaps.
    #[default]
    Area,
    Bilinear,
    /// Nearest neighbour.
    None,
}
