use crate::{
    enums::Orientation,
    plane::PlaneView,
    point_cloud::{SparsePointSampler, SparsePointSet},
    volume::{Cursor, Volume, VolumeError},
    volume_loader::{LoadReport, LoadedVolume, VolumeLoaderError},
};

use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("No volume has been loaded")]
    NoVolume,

    #[error(transparent)]
    Volume(#[from] VolumeError),
}

/// The volume currently being viewed and the plane shown per orientation.
///
/// Owned by one caller. A failed load never replaces what is on screen.
#[derive(Debug, Default)]
pub struct Session {
    volume: Option<Volume>,
    report: Option<LoadReport>,
    cursor: Cursor,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the outcome of a load.
    ///
    /// On success the cursor moves to the middle of every axis. On failure
    /// the previous volume and cursor stay as they were and the error is
    /// handed back.
    pub fn apply(
        &mut self,
        result: Result<LoadedVolume, VolumeLoaderError>,
    ) -> Result<(), VolumeLoaderError> {
        match result {
            Ok(LoadedVolume { volume, report }) => {
                self.cursor = Cursor::centered(volume.dim());
                info!(dim = ?volume.dim(), "session volume replaced");
                self.volume = Some(volume);
                self.report = Some(report);
                Ok(())
            }
            Err(err) => {
                warn!(%err, kept_previous = self.volume.is_some(), "load failed");
                Err(err)
            }
        }
    }

    pub fn volume(&self) -> Option<&Volume> {
        self.volume.as_ref()
    }

    /// Report of the load that produced the current volume.
    pub fn report(&self) -> Option<&LoadReport> {
        self.report.as_ref()
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    fn loaded(&self) -> Result<&Volume, SessionError> {
        self.volume.as_ref().ok_or(SessionError::NoVolume)
    }

    /// Move one orientation to `index` and return the plane now shown.
    /// The cursor is left alone when the index is out of range.
    pub fn set_index(
        &mut self,
        orientation: Orientation,
        index: i64,
    ) -> Result<PlaneView, SessionError> {
        let plane = self.loaded()?.plane_signed(orientation, index)?;
        self.cursor.set(orientation, plane.index());
        Ok(plane)
    }

    pub fn view(&self, orientation: Orientation) -> Result<PlaneView, SessionError> {
        Ok(self
            .loaded()?
            .plane(orientation, self.cursor.get(orientation))?)
    }

    pub fn orthogonal_views(&self) -> Result<[PlaneView; 3], SessionError> {
        Ok(self.loaded()?.orthogonal_planes(&self.cursor)?)
    }

    pub fn point_cloud(
        &self,
        sampler: &SparsePointSampler,
    ) -> Result<SparsePointSet, SessionError> {
        Ok(sampler.sample(self.loaded()?))
    }
}
