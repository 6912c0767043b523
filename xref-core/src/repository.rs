//! Narrow interfaces over the identifier store and the gene source.
//!
//! The sync core depends on these traits only; concrete implementations live
//! in [`crate::store`].

use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::types::{
    ExternalAccession, Gene, IdentifierRecord, NamespaceKey, RecordKey, SourcePipeline, Species,
    SubjectId,
};

/// Persistence of cross-reference identifier records.
pub trait IdentifierRepository {
    /// All stored records in `namespace_key` owned by `pipeline` whose
    /// subject belongs to `species`.
    fn fetch_existing(
        &self,
        namespace_key: NamespaceKey,
        pipeline: &SourcePipeline,
        species: Species,
    ) -> Result<Vec<IdentifierRecord>, StoreError>;

    /// Accessions linked to `subject` in the `external` namespace, regardless
    /// of the pipeline that loaded them.
    fn fetch_external_accessions(
        &self,
        subject: SubjectId,
        external: NamespaceKey,
    ) -> Result<Vec<ExternalAccession>, StoreError>;

    /// Insert a batch. Records equal to an already stored one are skipped
    /// silently. Returns the number of rows actually inserted.
    fn insert_records(&mut self, records: &[IdentifierRecord]) -> Result<usize, StoreError>;

    /// Delete a batch, by record key when present, else by identity tuple.
    /// Returns the number of rows deleted.
    fn delete_records(&mut self, records: &[IdentifierRecord]) -> Result<usize, StoreError>;

    /// Set `modified_at = at` on every row in `keys`. Returns rows touched.
    fn touch_modified(&mut self, keys: &[RecordKey], at: DateTime<Utc>)
        -> Result<usize, StoreError>;

    /// One-line description of the backing store for the run banner.
    fn describe(&self) -> String;
}

/// Source of the authoritative active gene list.
pub trait GeneRepository {
    /// Active genes of `species`; splices and alleles are excluded.
    fn active_genes(&self, species: Species) -> Result<Vec<Gene>, StoreError>;
}
