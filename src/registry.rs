use tracing::info;

/// What a conversion hands to the patient catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionRecord {
    pub source_folder: String,
    pub output_path: String,
    pub annotation: Option<String>,
}

/// Receives conversion records. Implemented by whatever keeps the catalog;
/// the core only ever inserts.
pub trait CatalogRegistrar {
    fn register(&mut self, record: ConversionRecord);
}

/// In-memory catalog of produced artifacts, passed around explicitly.
#[derive(Debug, Default)]
pub struct ArtifactRegistry {
    records: Vec<ConversionRecord>,
}

impl ArtifactRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records in insertion order.
    pub fn records(&self) -> &[ConversionRecord] {
        &self.records
    }

    /// Most recent artifact produced from `source_folder`.
    pub fn latest_for(&self, source_folder: &str) -> Option<&ConversionRecord> {
        self.records
            .iter()
            .rev()
            .find(|record| record.source_folder == source_folder)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl CatalogRegistrar for ArtifactRegistry {
    fn register(&mut self, record: ConversionRecord) {
        info!(
            source = %record.source_folder,
            output = %record.output_path,
            "registered artifact"
        );
        self.records.push(record);
    }
}
