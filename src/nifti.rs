//! NIfTI-1 export and import.
//!
//! Volumes are held as (Z, Y, X) while NIfTI indexes (X, Y, Z) with X
//! varying fastest on disk. Export is therefore a pure axis reversal; no
//! voxel is resampled. Files are written with an identity affine and are
//! gzip compressed when the path ends in `.gz`.

use crate::{
    assembler::VolumeAssembler,
    registry::{CatalogRegistrar, ConversionRecord},
    volume::Volume,
};

use ::nifti::{InMemNiftiObject, NiftiHeader, NiftiObject, NiftiType, ReaderOptions};
use flate2::{Compression, write::GzEncoder};
use ndarray::{Array3, ArrayView3, ShapeBuilder};
use std::{
    fs::{self, File},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::{debug, info};

pub const HEADER_SIZE: usize = 348;
// Header plus the four-byte extension flag.
const VOX_OFFSET: usize = 352;
const MAGIC: &[u8; 4] = b"n+1\0";

#[derive(Debug, Error)]
pub enum NiftiError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid NIfTI file: {0}")]
    InvalidNifti(String),

    #[error("NIfTI read error: {0}")]
    Nifti(#[from] ::nifti::NiftiError),

    #[error("unsupported NIfTI data type {0}")]
    UnsupportedDataType(i16),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    U8,
    I8,
    I16,
    U16,
    I32,
    F32,
    F64,
}

impl DataType {
    pub fn code(self) -> i16 {
        match self {
            DataType::U8 => 2,
            DataType::I16 => 4,
            DataType::I32 => 8,
            DataType::F32 => 16,
            DataType::F64 => 64,
            DataType::I8 => 256,
            DataType::U16 => 512,
        }
    }

}

/// A decoded NIfTI volume in file axis order (X, Y, Z).
#[derive(Debug, Clone)]
pub struct NiftiImage {
    data: Array3<f64>,
    datatype: DataType,
    pixdim: [f32; 3],
    scaled: bool,
}

impl NiftiImage {
    /// Voxel values with `scl_slope`/`scl_inter` applied, (X, Y, Z).
    pub fn data(&self) -> &Array3<f64> {
        &self.data
    }

    pub fn dim(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    pub fn datatype(&self) -> DataType {
        self.datatype
    }

    /// Voxel size along X, Y and Z.
    pub fn pixdim(&self) -> [f32; 3] {
        self.pixdim
    }

    /// Reverse back to (Z, Y, X). Unscaled `uint8` data is taken as is,
    /// anything else goes through the same min-max normalization as a DICOM
    /// stack.
    pub fn into_volume(self) -> Volume {
        let [x, y, z] = self.pixdim;
        let spacing = (x > 0.0 && y > 0.0 && z > 0.0).then_some((y, x, z));
        let zyx = self.data.view().reversed_axes();

        let data = if self.datatype == DataType::U8 && !self.scaled {
            zyx.mapv(|v| v as u8)
        } else {
            VolumeAssembler::default().normalize(zyx)
        };
        Volume::new(data.as_standard_layout().into_owned(), spacing)
    }
}

pub struct FormatConverter;

impl FormatConverter {
    /// The volume seen in NIfTI axis order (X, Y, Z). No copy is made.
    pub fn reorient(volume: &Volume) -> ArrayView3<'_, u8> {
        volume.data().view().reversed_axes()
    }

    /// `<output_dir>/<source folder name>.nii.gz`, creating `output_dir`.
    pub fn default_output_path(
        source_folder: impl AsRef<Path>,
        output_dir: impl AsRef<Path>,
    ) -> io::Result<PathBuf> {
        let output_dir = output_dir.as_ref();
        fs::create_dir_all(output_dir)?;
        let name = source_folder
            .as_ref()
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "volume".to_owned());
        Ok(output_dir.join(format!("{name}.nii.gz")))
    }

    /// Serialize a volume as a single-file NIfTI-1 image.
    ///
    /// # Errors
    ///
    /// Returns error if an axis is longer than the format can describe
    pub fn encode(volume: &Volume) -> Result<Vec<u8>, NiftiError> {
        let xyz = Self::reorient(volume);
        let (nx, ny, nz) = xyz.dim();
        let header = Self::header((nx, ny, nz))?;

        let mut buffer = Vec::with_capacity(VOX_OFFSET + xyz.len());
        buffer.extend_from_slice(&header);
        buffer.extend_from_slice(&[0u8; 4]);
        // X fastest, then Y, then Z.
        buffer.extend(xyz.t().iter().copied());
        Ok(buffer)
    }

    /// Write `volume` to `path`, gzip compressed when the name ends in `.gz`.
    pub fn write(volume: &Volume, path: impl AsRef<Path>) -> Result<(), NiftiError> {
        let path = path.as_ref();
        let bytes = Self::encode(volume)?;
        let writer = BufWriter::new(File::create(path)?);

        if path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("gz")) {
            let mut encoder = GzEncoder::new(writer, Compression::default());
            encoder.write_all(&bytes)?;
            encoder.finish()?.flush()?;
        } else {
            let mut writer = writer;
            writer.write_all(&bytes)?;
            writer.flush()?;
        }
        debug!(path = %path.display(), bytes = bytes.len(), "wrote NIfTI");
        Ok(())
    }

    /// Export a volume loaded from `source_folder` and describe the result.
    /// The record is also handed to `registrar` when one is given.
    pub fn convert(
        volume: &Volume,
        source_folder: impl AsRef<Path>,
        output_path: impl AsRef<Path>,
        annotation: Option<String>,
        registrar: Option<&mut dyn CatalogRegistrar>,
    ) -> Result<ConversionRecord, NiftiError> {
        let output_path = output_path.as_ref();
        Self::write(volume, output_path)?;

        let record = ConversionRecord {
            source_folder: source_folder.as_ref().to_string_lossy().into_owned(),
            output_path: output_path.to_string_lossy().into_owned(),
            annotation,
        };
        info!(output = %record.output_path, dim = ?volume.dim(), "converted volume to NIfTI");

        if let Some(registrar) = registrar {
            registrar.register(record.clone());
        }
        Ok(record)
    }

    fn header((nx, ny, nz): (usize, usize, usize)) -> Result<[u8; HEADER_SIZE], NiftiError> {
        let to_dim = |n: usize| {
            i16::try_from(n).map_err(|_| {
                NiftiError::InvalidNifti(format!("axis length {n} exceeds {}", i16::MAX))
            })
        };
        let dims: [i16; 8] = [3, to_dim(nx)?, to_dim(ny)?, to_dim(nz)?, 1, 1, 1, 1];

        let mut header = [0u8; HEADER_SIZE];
        let mut put = |offset: usize, bytes: &[u8]| {
            header[offset..offset + bytes.len()].copy_from_slice(bytes);
        };

        put(0, &(HEADER_SIZE as i32).to_le_bytes());
        for (i, dim) in dims.iter().enumerate() {
            put(40 + i * 2, &dim.to_le_bytes());
        }
        put(70, &DataType::U8.code().to_le_bytes());
        put(72, &8i16.to_le_bytes());
        for i in 0..8 {
            put(76 + i * 4, &1.0f32.to_le_bytes());
        }
        put(108, &(VOX_OFFSET as f32).to_le_bytes());
        put(112, &1.0f32.to_le_bytes());
        put(116, &0.0f32.to_le_bytes());
        // millimetres, seconds
        put(123, &[2 | 8]);
        put(124, &255.0f32.to_le_bytes());
        put(128, &0.0f32.to_le_bytes());
        put(148, b"dicom-stack");

        // Identity transform through both qform (null rotation, zero offset)
        // and sform.
        put(252, &1i16.to_le_bytes());
        put(254, &1i16.to_le_bytes());
        for (row, offset) in [280, 296, 312].into_iter().enumerate() {
            for col in 0..4 {
                let value = if row == col { 1.0f32 } else { 0.0 };
                put(offset + col * 4, &value.to_le_bytes());
            }
        }
        put(344, MAGIC);

        Ok(header)
    }
}

/// Read a `.nii` or `.nii.gz` file. Compression is detected from the
/// extension.
pub fn read_nifti(path: impl AsRef<Path>) -> Result<NiftiImage, NiftiError> {
    let path = path.as_ref();
    let layout = Layout::check(&NiftiHeader::from_file(path)?)?;
    let object = ReaderOptions::new().read_file(path)?;
    debug!(path = %path.display(), "read NIfTI");
    layout.decode(object)
}

/// Decode an uncompressed single-file NIfTI-1 image held in memory.
pub fn decode_nifti(bytes: &[u8]) -> Result<NiftiImage, NiftiError> {
    let layout = Layout::check(&NiftiHeader::from_reader(bytes)?)?;
    layout.decode(InMemNiftiObject::from_reader(bytes)?)
}

/// What a header promises, checked before any voxel is read.
struct Layout {
    datatype: DataType,
    shape: (usize, usize, usize),
}

impl Layout {
    fn check(header: &NiftiHeader) -> Result<Self, NiftiError> {
        let invalid = |reason: &str| NiftiError::InvalidNifti(reason.to_owned());

        let datatype = match header.data_type() {
            Ok(NiftiType::Uint8) => DataType::U8,
            Ok(NiftiType::Int8) => DataType::I8,
            Ok(NiftiType::Int16) => DataType::I16,
            Ok(NiftiType::Uint16) => DataType::U16,
            Ok(NiftiType::Int32) => DataType::I32,
            Ok(NiftiType::Float32) => DataType::F32,
            Ok(NiftiType::Float64) => DataType::F64,
            _ => return Err(NiftiError::UnsupportedDataType(header.datatype)),
        };

        if !(header.vox_offset.is_finite() && header.vox_offset >= VOX_OFFSET as f32) {
            return Err(invalid("voxel offset points into the header"));
        }

        let dims: Vec<i64> = header.dim.iter().map(|&d| d as i64).collect();
        let ndim = dims[0];
        if !(1..=7).contains(&ndim) {
            return Err(invalid("dimension count must be between 1 and 7"));
        }
        let ndim = ndim as usize;
        if ndim > 3 && dims[4..=ndim].iter().any(|&d| d > 1) {
            return Err(invalid("only single 3D volumes are supported"));
        }
        let axis = |i: usize| -> Result<usize, NiftiError> {
            if i > ndim {
                return Ok(1);
            }
            usize::try_from(dims[i])
                .ok()
                .filter(|&n| n > 0)
                .ok_or_else(|| invalid("axis lengths must be positive"))
        };

        Ok(Layout {
            datatype,
            shape: (axis(1)?, axis(2)?, axis(3)?),
        })
    }

    fn decode(self, object: InMemNiftiObject) -> Result<NiftiImage, NiftiError> {
        let header = object.header();
        let (slope, intercept) = (header.scl_slope, header.scl_inter);
        let scaled = slope != 0.0 && slope.is_finite() && (slope != 1.0 || intercept != 0.0);
        let pixdim = [header.pixdim[1], header.pixdim[2], header.pixdim[3]];

        // Scaling is applied while casting; values stay X fastest.
        let values = object.into_volume().into_nifti_typed_data::<f64>()?;
        let data = Array3::from_shape_vec(self.shape.f(), values)
            .map_err(|err| NiftiError::InvalidNifti(err.to_string()))?;

        Ok(NiftiImage {
            data,
            datatype: self.datatype,
            pixdim,
            scaled,
        })
    }
}
