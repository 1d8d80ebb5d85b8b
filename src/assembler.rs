use crate::{slice_reader::SliceRecord, volume::Volume, volume_loader::VolumeLoaderError};

use ndarray::{Array2, Array3, ArrayView3, Zip, s};
use tracing::debug;

/// Guards the min-max division when every voxel has the same value.
pub const DEFAULT_EPSILON: f64 = 1e-5;

/// Stacks ordered slices and compresses their range to `u8`.
#[derive(Debug, Clone, Copy)]
pub struct VolumeAssembler {
    epsilon: f64,
}

impl Default for VolumeAssembler {
    fn default() -> Self {
        Self::new(DEFAULT_EPSILON)
    }
}

impl VolumeAssembler {
    pub fn new(epsilon: f64) -> Self {
        Self { epsilon }
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Stack already ordered records and normalize them into a [`Volume`].
    ///
    /// Spacing is taken from the first record that carries it.
    pub fn assemble(&self, records: &[SliceRecord]) -> Result<Volume, VolumeLoaderError> {
        let images: Vec<_> = records.iter().map(|record| &record.pixels).collect();
        let stacked = Self::stack(&images)?;
        let spacing = records.iter().find_map(|record| record.spacing);
        Ok(Volume::new(self.normalize(stacked.view()), spacing))
    }

    /// Stack 2D images along a new leading axis.
    ///
    /// # Errors
    ///
    /// Returns error if there are no images or they differ in shape
    pub fn stack(images: &[&Array2<i32>]) -> Result<Array3<i32>, VolumeLoaderError> {
        let first = images
            .first()
            .ok_or(VolumeLoaderError::InsufficientSlices { found: 0 })?;
        let expected = first.dim();

        if let Some((index, image)) = images
            .iter()
            .enumerate()
            .find(|(_, image)| image.dim() != expected)
        {
            return Err(VolumeLoaderError::ShapeMismatch {
                index,
                expected,
                found: image.dim(),
            });
        }

        let (height, width) = expected;
        let mut volume = Array3::<i32>::zeros((images.len(), height, width));
        for (i, image) in images.iter().enumerate() {
            volume.slice_mut(s![i, .., ..]).assign(*image);
        }
        Ok(volume)
    }

    /// Global min-max normalization to `[0, 255]`.
    ///
    /// `(v - min) / (max - min + epsilon) * 255`, truncated. Min and max are
    /// taken over the whole array, never per slice.
    pub fn normalize<T>(&self, data: ArrayView3<'_, T>) -> Array3<u8>
    where
        T: Copy + Into<f64> + Send + Sync,
    {
        let Some((min, max)) = Self::min_max(&data) else {
            return Array3::zeros(data.dim());
        };
        let scale = 255.0 / (max - min + self.epsilon);
        debug!(min, max, "normalizing volume");

        Zip::from(&data).par_map_collect(|&value| {
            let value: f64 = value.into();
            ((value - min) * scale).clamp(0.0, 255.0) as u8
        })
    }

    fn min_max<T>(data: &ArrayView3<'_, T>) -> Option<(f64, f64)>
    where
        T: Copy + Into<f64>,
    {
        data.iter().fold(None, |acc, &value| {
            let value: f64 = value.into();
            match acc {
                None => Some((value, value)),
                Some((min, max)) => Some((min.min(value), max.max(value))),
            }
        })
    }
}
