use crate::enums::Orientation;
use crate::interpolator::Interpolator;
use crate::plane::PlaneView;

use ndarray::{Array3, ArrayView2, Axis};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VolumeError {
    #[error("{orientation} index {index} is out of bounds for size {size}")]
    IndexOutOfBounds {
        orientation: Orientation,
        index: i64,
        size: usize,
    },
}

/// An assembled, normalized (Z, Y, X) volume.
///
/// A volume never changes after it is built; loading again produces a new
/// one.
#[derive(Debug, Clone, PartialEq)]
pub struct Volume {
    data: Array3<u8>,
    spacing: Option<(f32, f32, f32)>,
}

/// Index of the plane shown for each orientation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cursor {
    pub axial: usize,
    pub coronal: usize,
    pub sagittal: usize,
}

impl Cursor {
    /// The middle of every axis.
    pub fn centered(dim: (usize, usize, usize)) -> Self {
        Self {
            axial: dim.0 / 2,
            coronal: dim.1 / 2,
            sagittal: dim.2 / 2,
        }
    }

    pub fn get(&self, orientation: Orientation) -> usize {
        match orientation {
            Orientation::Axial => self.axial,
            Orientation::Coronal => self.coronal,
            Orientation::Sagittal => self.sagittal,
        }
    }

    pub fn set(&mut self, orientation: Orientation, index: usize) {
        match orientation {
            Orientation::Axial => self.axial = index,
            Orientation::Coronal => self.coronal = index,
            Orientation::Sagittal => self.sagittal = index,
        }
    }
}

impl Volume {
    pub fn new(data: Array3<u8>, spacing: Option<(f32, f32, f32)>) -> Self {
        Self { data, spacing }
    }

    /// Get the dimensions of the volume (depth, height, width)
    pub fn dim(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    /// Get a reference to the underlying data
    pub fn data(&self) -> &Array3<u8> {
        &self.data
    }

    pub fn into_data(self) -> Array3<u8> {
        self.data
    }

    /// Row spacing, column spacing and slice thickness in mm.
    pub fn spacing(&self) -> Option<(f32, f32, f32)> {
        self.spacing
    }

    /// Number of planes available for `orientation`.
    pub fn len_along(&self, orientation: Orientation) -> usize {
        self.data.len_of(Axis(orientation.axis()))
    }

    pub fn get_slice_from_axis(
        &self,
        index: usize,
        orientation: Orientation,
    ) -> Result<ArrayView2<'_, u8>, VolumeError> {
        let size = self.len_along(orientation);
        if index >= size {
            return Err(VolumeError::IndexOutOfBounds {
                orientation,
                index: index as i64,
                size,
            });
        }
        Ok(self.data.index_axis(Axis(orientation.axis()), index))
    }

    /// Copy out the plane at `index`. The result has this volume's shape with
    /// the fixed axis removed.
    ///
    /// # Errors
    ///
    /// Returns error if `index` is not below the size of that axis
    pub fn plane(&self, orientation: Orientation, index: usize) -> Result<PlaneView, VolumeError> {
        let slice = self.get_slice_from_axis(index, orientation)?;
        Ok(PlaneView::new(slice.to_owned(), orientation, index))
    }

    /// Like [`Volume::plane`], for callers that hold signed indices.
    pub fn plane_signed(
        &self,
        orientation: Orientation,
        index: i64,
    ) -> Result<PlaneView, VolumeError> {
        match usize::try_from(index) {
            Ok(index) => self.plane(orientation, index),
            Err(_) => Err(VolumeError::IndexOutOfBounds {
                orientation,
                index,
                size: self.len_along(orientation),
            }),
        }
    }

    /// Axial, coronal and sagittal planes through `cursor`.
    pub fn orthogonal_planes(&self, cursor: &Cursor) -> Result<[PlaneView; 3], VolumeError> {
        Ok([
            self.plane(Orientation::Axial, cursor.axial)?,
            self.plane(Orientation::Coronal, cursor.coronal)?,
            self.plane(Orientation::Sagittal, cursor.sagittal)?,
        ])
    }

    /// Display shape (rows, columns) of a plane with physical aspect ratio
    /// restored. Falls back to the native plane shape without spacing.
    pub fn isotropic_shape(&self, orientation: Orientation) -> (usize, usize) {
        let (depth, height, width) = self.dim();
        let (z, y, x) = match self.spacing {
            Some(spacing) => Interpolator::get_isotropic_dimensions(spacing, self.dim()),
            None => (depth, height, width),
        };
        match orientation {
            Orientation::Axial => (y, x),
            Orientation::Coronal => (z, x),
            Orientation::Sagittal => (z, y),
        }
    }
}
