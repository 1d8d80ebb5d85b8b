use dicom::{
    object::{FileDicomObject, InMemDicomObject, ReadError, open_file},
    pixeldata::{ConvertOptions, ModalityLutOption, PixelDecoder, VoiLutOption},
};
use dicom_dictionary_std::tags;
use ndarray::{Array2, s};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// A slice file could not be turned into a [`SliceRecord`].
#[derive(Debug, Error)]
pub enum SliceReadError {
    #[error("could not read DICOM file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: Box<ReadError>,
    },

    #[error("could not decode pixel data of {path}: {source}")]
    PixelData {
        path: PathBuf,
        #[source]
        source: Box<dicom::pixeldata::Error>,
    },

    #[error("{path} holds no image frame")]
    EmptyFrame { path: PathBuf },
}

/// What a slice can be ordered by.
///
/// A spatial position wins over a sequence index when a file carries both.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OrderingKey {
    /// Image Position (Patient), x/y/z in mm.
    SpatialPosition(f64, f64, f64),
    /// Instance Number.
    SequenceIndex(i64),
    Unusable,
}

impl OrderingKey {
    pub fn is_usable(&self) -> bool {
        !matches!(self, OrderingKey::Unusable)
    }
}

/// One decoded 2D slice plus the metadata needed to place it in a stack.
#[derive(Debug, Clone)]
pub struct SliceRecord {
    /// Stored values, signed or not, before any LUT.
    pub pixels: Array2<i32>,
    pub ordering_key: OrderingKey,
    /// Row spacing, column spacing and slice thickness in mm, when present.
    pub spacing: Option<(f32, f32, f32)>,
    pub path: Option<PathBuf>,
}

impl SliceRecord {
    pub fn new(pixels: Array2<i32>, ordering_key: OrderingKey) -> Self {
        Self {
            pixels,
            ordering_key,
            spacing: None,
            path: None,
        }
    }

    pub fn with_spacing(mut self, spacing: (f32, f32, f32)) -> Self {
        self.spacing = Some(spacing);
        self
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// (rows, columns)
    pub fn dim(&self) -> (usize, usize) {
        self.pixels.dim()
    }
}

pub struct SliceReader;

impl SliceReader {
    /// Read one slice file.
    ///
    /// Records without position or instance number are still returned, with
    /// [`OrderingKey::Unusable`], so that callers can count them.
    ///
    /// # Errors
    ///
    /// Returns error if the file is not DICOM or its pixel data cannot be
    /// decoded
    pub fn read(path: impl AsRef<Path>) -> Result<SliceRecord, SliceReadError> {
        let path = path.as_ref();
        let dicom_object = open_file(path).map_err(|source| SliceReadError::Open {
            path: path.to_path_buf(),
            source: Box::new(source),
        })?;

        Ok(Self::from_dicom_object(&dicom_object, path)?.with_path(path))
    }

    /// Build a record from an already opened object. `path` is only used in
    /// error messages.
    pub fn from_dicom_object(
        dicom_object: &FileDicomObject<InMemDicomObject>,
        path: &Path,
    ) -> Result<SliceRecord, SliceReadError> {
        let pixels = Self::decode_image(dicom_object, path)?;
        let mut record = SliceRecord::new(pixels, Self::ordering_key(dicom_object));
        record.spacing = Self::spacing(dicom_object);
        Ok(record)
    }

    pub fn ordering_key(dicom_object: &InMemDicomObject) -> OrderingKey {
        let position = dicom_object
            .element(tags::IMAGE_POSITION_PATIENT)
            .ok()
            .and_then(|element| element.to_multi_float64().ok())
            .filter(|pos| pos.len() >= 3 && pos.iter().all(|v| v.is_finite()));
        if let Some(pos) = position {
            return OrderingKey::SpatialPosition(pos[0], pos[1], pos[2]);
        }

        dicom_object
            .element(tags::INSTANCE_NUMBER)
            .ok()
            .and_then(|element| element.to_int::<i64>().ok())
            .map_or(OrderingKey::Unusable, OrderingKey::SequenceIndex)
    }

    fn spacing(dicom_object: &InMemDicomObject) -> Option<(f32, f32, f32)> {
        let pixel_spacing = dicom_object
            .element(tags::PIXEL_SPACING)
            .ok()?
            .to_multi_float32()
            .ok()?;

        let slice_thickness = dicom_object
            .element(tags::SLICE_THICKNESS)
            .ok()?
            .to_float32()
            .ok()?;

        match pixel_spacing.as_slice() {
            [row, column, ..] => Some((*row, *column, slice_thickness)),
            _ => None,
        }
    }

    // Raw stored values of the first frame and first sample, no LUTs.
    fn decode_image(
        dicom_object: &FileDicomObject<InMemDicomObject>,
        path: &Path,
    ) -> Result<Array2<i32>, SliceReadError> {
        let pixel_error = |source| SliceReadError::PixelData {
            path: path.to_path_buf(),
            source: Box::new(source),
        };

        let pixel_data = dicom_object.decode_pixel_data().map_err(pixel_error)?;
        let options = ConvertOptions::new()
            .with_modality_lut(ModalityLutOption::None)
            .with_voi_lut(VoiLutOption::Identity);
        let frames = pixel_data
            .to_ndarray_with_options::<i32>(&options)
            .map_err(pixel_error)?;

        if frames.is_empty() {
            return Err(SliceReadError::EmptyFrame {
                path: path.to_path_buf(),
            });
        }
        Ok(frames.slice_move(s![0, .., .., 0]))
    }
}
