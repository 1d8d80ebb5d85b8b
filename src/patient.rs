use crate::{
    slice_reader::SliceReadError,
    volume_loader::{LoadOptions, VolumeLoader, VolumeLoaderError},
};

use dicom::{
    core::Tag,
    object::{InMemDicomObject, open_file},
};
use dicom_dictionary_std::tags;
use std::path::Path;
use tracing::warn;

/// Demographics attached to a converted study. Missing attributes are
/// empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatientInfo {
    pub patient_id: String,
    pub name: String,
    pub age: String,
    pub sex: String,
    pub study_date: String,
}

impl PatientInfo {
    pub fn from_object(dicom_object: &InMemDicomObject) -> Self {
        let text = |tag: Tag| {
            dicom_object
                .element(tag)
                .ok()
                .and_then(|element| element.to_str().ok())
                .map(|value| value.trim_end_matches(['\0', ' ']).to_string())
                .unwrap_or_default()
        };

        Self {
            patient_id: text(tags::PATIENT_ID),
            name: text(tags::PATIENT_NAME),
            age: text(tags::PATIENT_AGE),
            sex: text(tags::PATIENT_SEX),
            study_date: text(tags::STUDY_DATE),
        }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SliceReadError> {
        let path = path.as_ref();
        let dicom_object = open_file(path).map_err(|source| SliceReadError::Open {
            path: path.to_path_buf(),
            source: Box::new(source),
        })?;
        Ok(Self::from_object(&dicom_object))
    }

    /// Demographics of the first readable slice file under `dir`, in
    /// discovery order. `None` when there is no such file.
    pub fn from_directory(
        dir: impl AsRef<Path>,
        options: &LoadOptions,
    ) -> Result<Option<Self>, VolumeLoaderError> {
        for path in VolumeLoader::discover(dir.as_ref(), options)? {
            match Self::from_file(&path) {
                Ok(info) => return Ok(Some(info)),
                Err(err) => warn!(%err, "no patient data"),
            }
        }
        Ok(None)
    }
}
