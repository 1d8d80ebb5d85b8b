//! Planes cut from a volume and their display-only resized copies.
//!
//! A [`PlaneView`] holds voxel values exactly as they are in the volume. A
//! [`DisplayImage`] is what comes out of resizing one for the screen; it is a
//! separate type so resampled pixels are never mistaken for volume data.

use crate::enums::{Interpolation, Orientation};
use crate::interpolator::Interpolator;

use image::{GrayImage, ImageBuffer};
use ndarray::Array2;

#[derive(Debug, Clone, PartialEq)]
pub struct PlaneView {
    data: Array2<u8>,
    orientation: Orientation,
    index: usize,
}

impl PlaneView {
    pub(crate) fn new(data: Array2<u8>, orientation: Orientation, index: usize) -> Self {
        Self {
            data,
            orientation,
            index,
        }
    }

    pub fn data(&self) -> &Array2<u8> {
        &self.data
    }

    pub fn into_data(self) -> Array2<u8> {
        self.data
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// (rows, columns)
    pub fn dim(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// Caption in the form "Coronal 12".
    pub fn title(&self) -> String {
        format!("{} {}", self.orientation, self.index)
    }

    /// Resize to `target` (rows, columns) for display.
    pub fn resize(&self, target: (usize, usize), interpolation: Interpolation) -> DisplayImage {
        DisplayImage {
            data: Interpolator::resample(&self.data.view(), target, interpolation),
            orientation: self.orientation,
            index: self.index,
            source_dim: self.dim(),
        }
    }

    pub fn to_image(&self) -> Option<GrayImage> {
        array_to_image(&self.data)
    }
}

/// A resampled plane, for display only.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayImage {
    data: Array2<u8>,
    orientation: Orientation,
    index: usize,
    source_dim: (usize, usize),
}

impl DisplayImage {
    pub fn data(&self) -> &Array2<u8> {
        &self.data
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn dim(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// Shape of the plane before resizing.
    pub fn source_dim(&self) -> (usize, usize) {
        self.source_dim
    }

    pub fn to_image(&self) -> Option<GrayImage> {
        array_to_image(&self.data)
    }
}

/// Largest row count and largest column count among `views`.
pub fn common_shape(views: &[PlaneView]) -> (usize, usize) {
    views.iter().fold((0, 0), |(rows, columns), view| {
        let (h, w) = view.dim();
        (rows.max(h), columns.max(w))
    })
}

/// Resize every view to one shape so they can be shown side by side.
/// Without a `target` the [`common_shape`] of the views is used.
pub fn reconcile(
    views: &[PlaneView],
    target: Option<(usize, usize)>,
    interpolation: Interpolation,
) -> Vec<DisplayImage> {
    let target = target.unwrap_or_else(|| common_shape(views));
    views
        .iter()
        .map(|view| view.resize(target, interpolation))
        .collect()
}

fn array_to_image(data: &Array2<u8>) -> Option<GrayImage> {
    let (height, width) = data.dim();
    let pixel_data: Vec<u8> = data.iter().copied().collect();
    ImageBuffer::from_raw(width as u32, height as u32, pixel_data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::volume::{Cursor, Volume};
    use ndarray::Array3;

    fn volume() -> Volume {
        let data = Array3::from_shape_fn((10, 64, 48), |(z, y, x)| ((z + y + x) % 256) as u8);
        Volume::new(data, None)
    }

    #[test]
    fn reconcile_brings_planes_to_common_shape() {
        let volume = volume();
        let planes = volume.orthogonal_planes(&Cursor::centered(volume.dim())).unwrap();
        assert_eq!(common_shape(&planes), (64, 48));

        let images = reconcile(&planes, None, Interpolation::Area);
        assert_eq!(images.len(), 3);
        for (image, plane) in images.iter().zip(&planes) {
            assert_eq!(image.dim(), (64, 48));
            assert_eq!(image.source_dim(), plane.dim());
            assert_eq!(image.orientation(), plane.orientation());
        }
        // Canonical plane data is untouched.
        assert_eq!(planes[1].dim(), (10, 48));
    }

    #[test]
    fn explicit_target_wins() {
        let volume = volume();
        let plane = volume.plane(Orientation::Sagittal, 3).unwrap();
        let images = reconcile(&[plane], Some((32, 32)), Interpolation::Bilinear);
        assert_eq!(images[0].dim(), (32, 32));
    }

    #[test]
    fn image_conversion_keeps_row_major_layout() {
        let volume = volume();
        let plane = volume.plane(Orientation::Coronal, 5).unwrap();
        let image = plane.to_image().unwrap();
        assert_eq!(image.dimensions(), (48, 10));
        assert_eq!(image.get_pixel(7, 2).0[0], plane.data()[[2, 7]]);
        assert_eq!(plane.title(), "Coronal 5");
    }
}
