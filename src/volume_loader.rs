use crate::{
    assembler::{DEFAULT_EPSILON, VolumeAssembler},
    slice_orderer::SliceOrderer,
    slice_reader::{SliceReadError, SliceRecord, SliceReader},
    volume::Volume,
    worker::CancellationToken,
};

use dicom::object::{FileDicomObject, InMemDicomObject};
use rayon::prelude::*;
use std::{
    fs, io,
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;
use tracing::{info, warn};
use walkdir::WalkDir;
use web_time::Instant;

#[derive(Debug, Error)]
pub enum VolumeLoaderError {
    #[error("Not enough usable slices: found {found}, need at least 2")]
    InsufficientSlices { found: usize },

    #[error(
        "Inconsistent ordering keys: {spatial} slices have a position, \
         {sequence} only an instance number"
    )]
    InconsistentOrderingKeys { spatial: usize, sequence: usize },

    #[error("Slice {index} has shape {found:?}, expected {expected:?}")]
    ShapeMismatch {
        index: usize,
        expected: (usize, usize),
        found: (usize, usize),
    },

    #[error("Load was cancelled")]
    Cancelled,

    #[error("Load worker stopped before delivering a result")]
    WorkerGone,

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// How a series is discovered and assembled.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// File extension of slice files, compared case-insensitively.
    pub extension: String,
    /// Descend into sub-directories.
    pub recursive: bool,
    pub epsilon: f64,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            extension: "dcm".to_owned(),
            recursive: true,
            epsilon: DEFAULT_EPSILON,
        }
    }
}

impl LoadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    fn matches(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|s| s.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(&self.extension))
    }
}

/// What happened to the files of one load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub files_found: usize,
    /// Files that could not be read or decoded.
    pub files_skipped: usize,
    /// Readable files with neither position nor instance number.
    pub files_unusable: usize,
    pub slices_used: usize,
    pub elapsed: Duration,
}

#[derive(Debug, Clone)]
pub struct LoadedVolume {
    pub volume: Volume,
    pub report: LoadReport,
}

pub struct VolumeLoader;

impl VolumeLoader {
    /// Load a volume from a directory containing slice files
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be read, fewer than two usable
    /// slices are found, ordering keys are mixed or shapes differ
    pub fn load_from_directory(
        path: impl AsRef<Path>,
        options: &LoadOptions,
    ) -> Result<LoadedVolume, VolumeLoaderError> {
        Self::load_from_directory_cancellable(path, options, &CancellationToken::new())
    }

    pub fn load_from_directory_cancellable(
        path: impl AsRef<Path>,
        options: &LoadOptions,
        cancel: &CancellationToken,
    ) -> Result<LoadedVolume, VolumeLoaderError> {
        let path = path.as_ref();
        let started = Instant::now();
        let paths = Self::discover(path, options)?;
        info!(dir = %path.display(), files = paths.len(), "discovered slice files");

        let mut loaded = Self::load_paths(&paths, options, cancel)?;
        loaded.report.elapsed = started.elapsed();
        Ok(loaded)
    }

    /// Load a volume from file paths
    pub fn load_from_file_paths(
        paths: &[impl AsRef<Path> + Sync],
        options: &LoadOptions,
    ) -> Result<LoadedVolume, VolumeLoaderError> {
        let started = Instant::now();
        let mut loaded = Self::load_paths(paths, options, &CancellationToken::new())?;
        loaded.report.elapsed = started.elapsed();
        Ok(loaded)
    }

    /// Load a volume from already opened DICOM objects
    pub fn load_from_dicom_objects(
        dicom_objects: &[FileDicomObject<InMemDicomObject>],
        options: &LoadOptions,
    ) -> Result<LoadedVolume, VolumeLoaderError> {
        let started = Instant::now();
        let results: Vec<_> = dicom_objects
            .iter()
            .enumerate()
            .map(|(i, dicom_object)| {
                SliceReader::from_dicom_object(dicom_object, Path::new(&format!("object #{i}")))
            })
            .collect();

        let mut loaded = Self::collect_and_assemble(results, options, &CancellationToken::new())?;
        loaded.report.elapsed = started.elapsed();
        Ok(loaded)
    }

    /// Order and assemble records that were read elsewhere.
    pub fn load_from_records(
        records: Vec<SliceRecord>,
        options: &LoadOptions,
    ) -> Result<LoadedVolume, VolumeLoaderError> {
        let started = Instant::now();
        let results = records.into_iter().map(Ok).collect();
        let mut loaded = Self::collect_and_assemble(results, options, &CancellationToken::new())?;
        loaded.report.elapsed = started.elapsed();
        Ok(loaded)
    }

    /// Slice files under `path`, sorted by name.
    pub fn discover(path: &Path, options: &LoadOptions) -> Result<Vec<PathBuf>, VolumeLoaderError> {
        if !fs::metadata(path)?.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::NotADirectory,
                format!("{} is not a directory", path.display()),
            )
            .into());
        }

        let max_depth = if options.recursive { usize::MAX } else { 1 };
        Ok(WalkDir::new(path)
            .max_depth(max_depth)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(err) => {
                    warn!(%err, "skipping unreadable directory entry");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file() && options.matches(entry.path()))
            .map(|entry| entry.into_path())
            .collect())
    }

    fn load_paths(
        paths: &[impl AsRef<Path> + Sync],
        options: &LoadOptions,
        cancel: &CancellationToken,
    ) -> Result<LoadedVolume, VolumeLoaderError> {
        let results: Vec<_> = paths
            .par_iter()
            .map(|path| {
                if cancel.is_cancelled() {
                    return None;
                }
                Some(SliceReader::read(path))
            })
            .collect();

        if cancel.is_cancelled() {
            return Err(VolumeLoaderError::Cancelled);
        }
        let results = results.into_iter().flatten().collect();
        Self::collect_and_assemble(results, options, cancel)
    }

    fn collect_and_assemble(
        results: Vec<Result<SliceRecord, SliceReadError>>,
        options: &LoadOptions,
        cancel: &CancellationToken,
    ) -> Result<LoadedVolume, VolumeLoaderError> {
        let files_found = results.len();
        let mut records = Vec::with_capacity(files_found);
        let mut files_skipped = 0;
        for result in results {
            match result {
                Ok(record) => records.push(record),
                Err(err) => {
                    warn!(%err, "skipping slice");
                    files_skipped += 1;
                }
            }
        }

        let files_unusable = records
            .iter()
            .filter(|record| !record.ordering_key.is_usable())
            .count();
        if files_unusable > 0 {
            warn!(files_unusable, "slices without position or instance number left out");
        }

        let ordered = SliceOrderer::order(records)?;
        if cancel.is_cancelled() {
            return Err(VolumeLoaderError::Cancelled);
        }

        let volume = VolumeAssembler::new(options.epsilon).assemble(&ordered)?;
        let report = LoadReport {
            files_found,
            files_skipped,
            files_unusable,
            slices_used: ordered.len(),
            elapsed: Duration::ZERO,
        };
        info!(
            dim = ?volume.dim(),
            skipped = files_skipped,
            unusable = files_unusable,
            "assembled volume"
        );
        Ok(LoadedVolume { volume, report })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slice_reader::OrderingKey;
    use ndarray::Array2;

    #[test]
    fn records_are_ordered_and_reported() {
        let record = |value: i32, key: OrderingKey| {
            SliceRecord::new(Array2::from_elem((4, 4), value), key)
        };
        let records = vec![
            record(30, OrderingKey::SpatialPosition(0.0, 0.0, 3.0)),
            record(10, OrderingKey::SpatialPosition(0.0, 0.0, 1.0)),
            record(99, OrderingKey::Unusable),
            record(20, OrderingKey::SpatialPosition(0.0, 0.0, 2.0)),
        ];
        let LoadedVolume { volume, report } =
            VolumeLoader::load_from_records(records, &LoadOptions::default()).unwrap();

        assert_eq!(volume.dim(), (3, 4, 4));
        assert_eq!(volume.data()[[0, 0, 0]], 0);
        assert_eq!(volume.data()[[1, 0, 0]], 127);
        assert_eq!(volume.data()[[2, 0, 0]], 254);
        assert_eq!(report.files_found, 4);
        assert_eq!(report.files_unusable, 1);
        assert_eq!(report.slices_used, 3);
    }

    #[test]
    fn single_slice_is_insufficient() {
        let records = vec![SliceRecord::new(
            Array2::zeros((8, 8)),
            OrderingKey::SequenceIndex(1),
        )];
        assert!(matches!(
            VolumeLoader::load_from_records(records, &LoadOptions::default()),
            Err(VolumeLoaderError::InsufficientSlices { found: 1 })
        ));
    }

    #[test]
    fn mixed_shapes_do_not_stack() {
        let records = vec![
            SliceRecord::new(Array2::zeros((64, 64)), OrderingKey::SequenceIndex(1)),
            SliceRecord::new(Array2::zeros((32, 32)), OrderingKey::SequenceIndex(2)),
        ];
        assert!(matches!(
            VolumeLoader::load_from_records(records, &LoadOptions::default()),
            Err(VolumeLoaderError::ShapeMismatch { index: 1, .. })
        ));
    }

    #[test]
    fn missing_directory_is_io_error() {
        assert!(matches!(
            VolumeLoader::load_from_directory("/no/such/series", &LoadOptions::default()),
            Err(VolumeLoaderError::Io(_))
        ));
    }

    #[test]
    fn empty_directory_has_no_slices() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), "not a slice").unwrap();
        assert!(matches!(
            VolumeLoader::load_from_directory(dir.path(), &LoadOptions::default()),
            Err(VolumeLoaderError::InsufficientSlices { found: 0 })
        ));
    }

    #[test]
    fn discovery_filters_by_extension_and_depth() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("series").join("part2");
        std::fs::create_dir_all(&nested).unwrap();
        for name in ["b.dcm", "a.DCM", "skip.txt"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        std::fs::write(nested.join("c.dcm"), b"x").unwrap();

        let found = VolumeLoader::discover(dir.path(), &LoadOptions::default()).unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.DCM", "b.dcm", "c.dcm"]);

        let shallow = LoadOptions::default().with_recursive(false);
        assert_eq!(VolumeLoader::discover(dir.path(), &shallow).unwrap().len(), 2);
    }

    #[test]
    fn unreadable_files_are_skipped_and_counted() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["1.dcm", "2.dcm", "3.dcm"] {
            std::fs::write(dir.path().join(name), b"definitely not DICOM").unwrap();
        }
        let paths = VolumeLoader::discover(dir.path(), &LoadOptions::default()).unwrap();
        let results: Vec<_> = paths.iter().map(SliceReader::read).collect();
        assert!(results.iter().all(Result::is_err));

        assert!(matches!(
            VolumeLoader::load_from_file_paths(&paths, &LoadOptions::default()),
            Err(VolumeLoaderError::InsufficientSlices { found: 0 })
        ));
    }

    #[test]
    fn cancelled_load_stops() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("1.dcm"), b"x").unwrap();
        let token = CancellationToken::new();
        token.cancel();
        let options = LoadOptions::default();
        assert!(matches!(
            VolumeLoader::load_from_directory_cancellable(dir.path(), &options, &token),
            Err(VolumeLoaderError::Cancelled)
        ));
    }
}
