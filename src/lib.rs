//! # dicom-stack
//!
//! This crate turns an unordered folder of 2D DICOM slices into a 3D volume
//! and offers the operations a study viewer needs on top of it.
//!
//! Slices are read in parallel using rayon, ordered by Image Position
//! (Patient) or, if no slice carries one, by Instance Number, stacked and
//! normalized to 8 bits. The volume can then be cut in the three medical
//! axes:
//!  - Axial
//!  - Coronal
//!  - Sagittal
//!
//! Planes keep the exact voxel values of the volume. For side by side
//! display they can be resized to a common shape with area averaging. Other
//! consumers are a sparse point sampler for 3D scatter views and a NIfTI-1
//! exporter that hands its result to an explicit artifact registry.
//!
//! Slices are assumed to come from the same series and acquisition. Only
//! the first frame and first sample of each file is used.
//!
//! # Examples
//!
//! ## Loading a folder and saving the middle coronal plane
//!
//! ```no_run
//! # use dicom_stack::{LoadOptions, Orientation, VolumeLoader};
//! let loaded = VolumeLoader::load_from_directory("dicom", &LoadOptions::default())
//!     .expect("should have loaded files from directory");
//! let volume = loaded.volume;
//! let plane = volume
//!     .plane(Orientation::Coronal, volume.dim().1 / 2)
//!     .expect("should have returned plane at center of volume");
//! plane
//!     .to_image()
//!     .expect("plane should fit an image buffer")
//!     .save("coronal.png")
//!     .expect("should have written image");
//! ```
//!
//! ## Loading in the background
//!
//! ```no_run
//! # use dicom_stack::{LoadOptions, LoadWorker, Session};
//! let worker = LoadWorker::new().expect("should have started worker");
//! let handle = worker.submit("dicom", LoadOptions::default());
//! let mut session = Session::new();
//! session
//!     .apply(handle.blocking_wait())
//!     .expect("should have loaded files from directory");
//! ```

pub mod assembler;
pub mod enums;
mod interpolator;
pub mod nifti;
pub mod patient;
pub mod plane;
pub mod point_cloud;
pub mod registry;
pub mod session;
pub mod slice_orderer;
pub mod slice_reader;
pub mod volume;
pub mod volume_loader;
pub mod worker;

pub use assembler::VolumeAssembler;
pub use enums::{Interpolation, Orientation};
pub use crate::nifti::{FormatConverter, NiftiError, NiftiImage, read_nifti};
pub use patient::PatientInfo;
pub use plane::{DisplayImage, PlaneView, reconcile};
pub use point_cloud::{SparsePoint, SparsePointSampler, SparsePointSet};
pub use registry::{ArtifactRegistry, CatalogRegistrar, ConversionRecord};
pub use session::{Session, SessionError};
pub use slice_orderer::{SliceOrderer, SortBy};
pub use slice_reader::{OrderingKey, SliceReadError, SliceReader, SliceRecord};
pub use volume::{Cursor, Volume, VolumeError};
pub use volume_loader::{LoadOptions, LoadReport, LoadedVolume, VolumeLoader, VolumeLoaderError};
pub use worker::{CancellationToken, LoadHandle, LoadWorker};
