use crate::{
    slice_reader::{OrderingKey, SliceRecord},
    volume_loader::VolumeLoaderError,
};
use tracing::debug;

/// Which key a batch ends up sorted by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortBy {
    ImagePositionPatient,
    InstanceNumber,
}

pub struct SliceOrderer;

impl SliceOrderer {
    /// Put a batch of slices into through-plane order.
    ///
    /// Records with [`OrderingKey::Unusable`] are dropped first. The rest
    /// must agree on one key kind: all positions (sorted by z) or all
    /// instance numbers. Sorting is stable, so equal keys keep input order.
    ///
    /// # Errors
    ///
    /// Returns error if fewer than two usable records remain or the batch
    /// mixes positions and instance numbers
    pub fn order(records: Vec<SliceRecord>) -> Result<Vec<SliceRecord>, VolumeLoaderError> {
        let mut usable: Vec<_> = records
            .into_iter()
            .filter(|record| record.ordering_key.is_usable())
            .collect();

        if usable.len() < 2 {
            return Err(VolumeLoaderError::InsufficientSlices {
                found: usable.len(),
            });
        }

        let sort_by = Self::common_key(&usable)?;
        debug!(slices = usable.len(), ?sort_by, "ordering slices");

        match sort_by {
            SortBy::ImagePositionPatient => {
                usable.sort_by(|a, b| Self::through_plane(a).total_cmp(&Self::through_plane(b)));
            }
            SortBy::InstanceNumber => usable.sort_by_key(Self::sequence_index),
        }
        Ok(usable)
    }

    /// The key kind shared by every record of the batch.
    pub fn common_key(records: &[SliceRecord]) -> Result<SortBy, VolumeLoaderError> {
        let (spatial, sequence) =
            records
                .iter()
                .fold((0, 0), |(spatial, sequence), record| match record.ordering_key {
                    OrderingKey::SpatialPosition(..) => (spatial + 1, sequence),
                    OrderingKey::SequenceIndex(_) => (spatial, sequence + 1),
                    OrderingKey::Unusable => (spatial, sequence),
                });

        match (spatial, sequence) {
            (s, 0) if s > 0 => Ok(SortBy::ImagePositionPatient),
            (0, q) if q > 0 => Ok(SortBy::InstanceNumber),
            (0, 0) => Err(VolumeLoaderError::InsufficientSlices { found: 0 }),
            _ => Err(VolumeLoaderError::InconsistentOrderingKeys { spatial, sequence }),
        }
    }

    fn through_plane(record: &SliceRecord) -> f64 {
        match record.ordering_key {
            OrderingKey::SpatialPosition(_, _, z) => z,
            _ => f64::NAN,
        }
    }

    fn sequence_index(record: &SliceRecord) -> i64 {
        match record.ordering_key {
            OrderingKey::SequenceIndex(n) => n,
            _ => i64::MAX,
        }
    }
}
