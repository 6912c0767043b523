//! File-backed and in-memory implementations of the repository traits.
//!
//! The JSON store keeps a single document at `<data_dir>/xref-store.json`:
//!
//! ```text
//! { "next_key": 4, "genes": [ … ], "records": [ … ] }
//! ```
//!
//! Every mutating batch is applied to a copy of the document, written to
//! `xref-store.json.tmp`, renamed over the live file and only then committed
//! in memory, so a batch either lands completely or not at all.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{store_io, StoreError};
use crate::repository::{GeneRepository, IdentifierRepository};
use crate::types::{
    ExternalAccession, Gene, GeneKind, IdentifierRecord, NamespaceKey, RecordKey, SourcePipeline,
    Species, SubjectId,
};

pub const STORE_FILE: &str = "xref-store.json";

type IdentityKey = (SubjectId, NamespaceKey, String, String);

fn identity_key(record: &IdentifierRecord) -> IdentityKey {
    (
        record.subject_id,
        record.namespace_key,
        record.accession_id.clone(),
        record.source_pipeline.0.clone(),
    )
}

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

/// On-disk store payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreData {
    pub next_key: u64,
    #[serde(default)]
    pub genes: Vec<Gene>,
    #[serde(default)]
    pub records: Vec<IdentifierRecord>,
}

impl Default for StoreData {
    fn default() -> Self {
        Self {
            next_key: 1,
            genes: Vec::new(),
            records: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// Identifier store held entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    data: StoreData,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_data(data: StoreData) -> Self {
        Self { data }
    }

    pub fn data(&self) -> &StoreData {
        &self.data
    }

    pub fn records(&self) -> &[IdentifierRecord] {
        &self.data.records
    }

    pub fn genes(&self) -> &[Gene] {
        &self.data.genes
    }

    pub fn add_gene(&mut self, gene: Gene) {
        self.data.genes.push(gene);
    }

    /// Snapshot of the gene table usable as a [`GeneRepository`].
    pub fn gene_table(&self) -> GeneTable {
        GeneTable::new(self.data.genes.clone())
    }

    /// Look up a stored record by identity.
    pub fn find(&self, probe: &IdentifierRecord) -> Option<&IdentifierRecord> {
        self.data.records.iter().find(|r| *r == probe)
    }

    fn subjects_of(&self, species: Species) -> HashSet<SubjectId> {
        self.data
            .genes
            .iter()
            .filter(|g| g.species == species)
            .map(|g| g.subject_id)
            .collect()
    }
}

impl IdentifierRepository for MemoryStore {
    fn fetch_existing(
        &self,
        namespace_key: NamespaceKey,
        pipeline: &SourcePipeline,
        species: Species,
    ) -> Result<Vec<IdentifierRecord>, StoreError> {
        let subjects = self.subjects_of(species);
        Ok(self
            .data
            .records
            .iter()
            .filter(|r| {
                r.namespace_key == namespace_key
                    && r.source_pipeline == *pipeline
                    && subjects.contains(&r.subject_id)
            })
            .cloned()
            .collect())
    }

    fn fetch_external_accessions(
        &self,
        subject: SubjectId,
        external: NamespaceKey,
    ) -> Result<Vec<ExternalAccession>, StoreError> {
        Ok(self
            .data
            .records
            .iter()
            .filter(|r| r.subject_id == subject && r.namespace_key == external)
            .map(|r| ExternalAccession {
                subject_id: r.subject_id,
                accession_id: r.accession_id.clone(),
            })
            .collect())
    }

    fn insert_records(&mut self, records: &[IdentifierRecord]) -> Result<usize, StoreError> {
        let mut stored: HashSet<IdentityKey> = self.data.records.iter().map(identity_key).collect();
        let mut inserted = 0;
        for record in records {
            if !stored.insert(identity_key(record)) {
                tracing::debug!("skipping duplicate: {}", record.dump("|"));
                continue;
            }
            let key = RecordKey(self.data.next_key);
            self.data.next_key += 1;
            self.data.records.push(record.clone().with_record_key(key));
            inserted += 1;
        }
        Ok(inserted)
    }

    fn delete_records(&mut self, records: &[IdentifierRecord]) -> Result<usize, StoreError> {
        let by_key: HashSet<RecordKey> = records.iter().filter_map(|r| r.record_key).collect();
        let by_identity: HashSet<IdentityKey> = records
            .iter()
            .filter(|r| r.record_key.is_none())
            .map(identity_key)
            .collect();

        let before = self.data.records.len();
        self.data.records.retain(|row| {
            let keyed = row.record_key.is_some_and(|k| by_key.contains(&k));
            !(keyed || by_identity.contains(&identity_key(row)))
        });
        Ok(before - self.data.records.len())
    }

    fn touch_modified(
        &mut self,
        keys: &[RecordKey],
        at: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        let keys: HashSet<RecordKey> = keys.iter().copied().collect();
        let mut touched = 0;
        for row in &mut self.data.records {
            if row.record_key.is_some_and(|k| keys.contains(&k)) {
                row.modified_at = at;
                touched += 1;
            }
        }
        Ok(touched)
    }

    fn describe(&self) -> String {
        format!(
            "in-memory store ({} records, {} genes)",
            self.data.records.len(),
            self.data.genes.len()
        )
    }
}

// ---------------------------------------------------------------------------
// JsonStore
// ---------------------------------------------------------------------------

/// `<data_dir>/xref-store.json`. Pure, no I/O.
pub fn store_path(data_dir: &Path) -> PathBuf {
    data_dir.join(STORE_FILE)
}

/// Identifier store persisted as a JSON document.
#[derive(Debug)]
pub struct JsonStore {
    path: PathBuf,
    inner: MemoryStore,
}

impl JsonStore {
    /// Open the store under `data_dir`. Fails with [`StoreError::NotFound`]
    /// when it has not been initialised.
    pub fn open(data_dir: &Path) -> Result<Self, StoreError> {
        let path = store_path(data_dir);
        if !path.exists() {
            return Err(StoreError::NotFound { path });
        }
        let contents = std::fs::read_to_string(&path).map_err(|e| store_io(&path, e))?;
        let data: StoreData = serde_json::from_str(&contents).map_err(|e| StoreError::Parse {
            path: path.clone(),
            source: e,
        })?;
        Ok(Self {
            path,
            inner: MemoryStore::from_data(data),
        })
    }

    /// Create an empty store under `data_dir` if none exists, then open it.
    pub fn init(data_dir: &Path) -> Result<Self, StoreError> {
        let path = store_path(data_dir);
        if !path.exists() {
            save(&path, &StoreData::default())?;
            tracing::info!("created empty store: {}", path.display());
        }
        Self::open(data_dir)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn memory(&self) -> &MemoryStore {
        &self.inner
    }

    pub fn gene_table(&self) -> GeneTable {
        self.inner.gene_table()
    }

    /// Apply `op` to a copy, persist it, then commit.
    fn apply<T>(
        &mut self,
        op: impl FnOnce(&mut MemoryStore) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut staged = self.inner.clone();
        let out = op(&mut staged)?;
        save(&self.path, staged.data())?;
        self.inner = staged;
        Ok(out)
    }
}

impl IdentifierRepository for JsonStore {
    fn fetch_existing(
        &self,
        namespace_key: NamespaceKey,
        pipeline: &SourcePipeline,
        species: Species,
    ) -> Result<Vec<IdentifierRecord>, StoreError> {
        self.inner.fetch_existing(namespace_key, pipeline, species)
    }

    fn fetch_external_accessions(
        &self,
        subject: SubjectId,
        external: NamespaceKey,
    ) -> Result<Vec<ExternalAccession>, StoreError> {
        self.inner.fetch_external_accessions(subject, external)
    }

    fn insert_records(&mut self, records: &[IdentifierRecord]) -> Result<usize, StoreError> {
        self.apply(|s| s.insert_records(records))
    }

    fn delete_records(&mut self, records: &[IdentifierRecord]) -> Result<usize, StoreError> {
        self.apply(|s| s.delete_records(records))
    }

    fn touch_modified(
        &mut self,
        keys: &[RecordKey],
        at: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        self.apply(|s| s.touch_modified(keys, at))
    }

    fn describe(&self) -> String {
        format!(
            "json store {} ({} records, {} genes)",
            self.path.display(),
            self.inner.records().len(),
            self.inner.genes().len()
        )
    }
}

/// Atomic write: `<path>.tmp` then rename.
fn save(path: &Path, data: &StoreData) -> Result<(), StoreError> {
    let Some(dir) = path.parent() else {
        return Err(store_io(path, std::io::Error::other("invalid store path")));
    };
    std::fs::create_dir_all(dir).map_err(|e| store_io(dir, e))?;

    let json = serde_json::to_string_pretty(data)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, &json).map_err(|e| store_io(&tmp, e))?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(store_io(path, e));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// GeneTable
// ---------------------------------------------------------------------------

/// Read-only gene list.
#[derive(Debug, Clone, Default)]
pub struct GeneTable {
    genes: Vec<Gene>,
}

impl GeneTable {
    pub fn new(genes: Vec<Gene>) -> Self {
        Self { genes }
    }
}

impl GeneRepository for GeneTable {
    fn active_genes(&self, species: Species) -> Result<Vec<Gene>, StoreError> {
        Ok(self
            .genes
            .iter()
            .filter(|g| g.species == species && g.active && g.kind == GeneKind::Gene)
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn gene(id: u64, species: Species) -> Gene {
        Gene {
            subject_id: SubjectId(id),
            symbol: format!("G{id}"),
            species,
            kind: GeneKind::Gene,
            active: true,
        }
    }

    fn record(subject: u64, ns: u32, acc: &str, pipeline: &str) -> IdentifierRecord {
        IdentifierRecord::new(
            SubjectId(subject),
            NamespaceKey(ns),
            acc,
            SourcePipeline::from(pipeline),
            Utc::now(),
        )
    }

    #[test]
    fn insert_assigns_keys_and_skips_duplicates() {
        let mut store = MemoryStore::new();
        let batch = vec![
            record(1, 150, "ENSRNOG001", "RatGTEx"),
            record(1, 150, "ENSRNOG001", "RatGTEx"),
            record(2, 150, "ENSRNOG002", "RatGTEx"),
        ];
        assert_eq!(store.insert_records(&batch).unwrap(), 2);
        assert_eq!(store.insert_records(&batch[..1]).unwrap(), 0);
        let keys: Vec<_> = store.records().iter().map(|r| r.record_key).collect();
        assert_eq!(keys, vec![Some(RecordKey(1)), Some(RecordKey(2))]);
    }

    #[test]
    fn fetch_existing_scopes_by_species_namespace_and_pipeline() {
        let mut store = MemoryStore::new();
        store.add_gene(gene(1, Species::Rat));
        store.add_gene(gene(2, Species::Mouse));
        store
            .insert_records(&[
                record(1, 150, "ENSRNOG001", "RatGTEx"),
                record(1, 150, "ENSRNOG001", "Other"),
                record(1, 20, "ENSRNOG001", "Ensembl"),
                record(2, 150, "ENSMUSG002", "RatGTEx"),
            ])
            .unwrap();

        let found = store
            .fetch_existing(NamespaceKey(150), &SourcePipeline::from("RatGTEx"), Species::Rat)
            .unwrap();
        assert_eq!(found, vec![record(1, 150, "ENSRNOG001", "RatGTEx")]);
        assert!(found[0].record_key.is_some());
    }

    #[test]
    fn external_accessions_ignore_pipeline() {
        let mut store = MemoryStore::new();
        store
            .insert_records(&[
                record(1, 20, "ENSRNOG001", "Ensembl"),
                record(1, 20, "ENSRNOG009", "Manual"),
                record(2, 20, "ENSRNOG002", "Ensembl"),
            ])
            .unwrap();
        let accs = store
            .fetch_external_accessions(SubjectId(1), NamespaceKey::ENSEMBL_GENES)
            .unwrap();
        let ids: Vec<_> = accs.iter().map(|a| a.accession_id.as_str()).collect();
        assert_eq!(ids, vec!["ENSRNOG001", "ENSRNOG009"]);
    }

    #[test]
    fn delete_by_key_or_identity() {
        let mut store = MemoryStore::new();
        store
            .insert_records(&[
                record(1, 150, "A", "P"),
                record(2, 150, "B", "P"),
                record(3, 150, "C", "P"),
            ])
            .unwrap();
        let keyed = store.find(&record(1, 150, "A", "P")).cloned().unwrap();
        let unkeyed = record(3, 150, "C", "P");
        assert_eq!(store.delete_records(&[keyed, unkeyed]).unwrap(), 2);
        assert_eq!(store.records(), &[record(2, 150, "B", "P")]);
    }

    #[test]
    fn touch_updates_only_listed_keys() {
        let mut store = MemoryStore::new();
        store
            .insert_records(&[record(1, 150, "A", "P"), record(2, 150, "B", "P")])
            .unwrap();
        let later = Utc::now() + chrono::Duration::hours(1);
        assert_eq!(store.touch_modified(&[RecordKey(2)], later).unwrap(), 1);
        assert_ne!(store.records()[0].modified_at, later);
        assert_eq!(store.records()[1].modified_at, later);
    }

    #[test]
    fn gene_table_filters_inactive_splices_and_alleles() {
        let mut splice = gene(2, Species::Rat);
        splice.kind = GeneKind::Splice;
        let mut allele = gene(3, Species::Rat);
        allele.kind = GeneKind::Allele;
        let mut retired = gene(4, Species::Rat);
        retired.active = false;
        let table = GeneTable::new(vec![
            gene(1, Species::Rat),
            splice,
            allele,
            retired,
            gene(5, Species::Mouse),
        ]);
        let active = table.active_genes(Species::Rat).unwrap();
        assert_eq!(active, vec![gene(1, Species::Rat)]);
    }

    #[test]
    fn json_store_open_missing_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let err = JsonStore::open(tmp.path()).unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[test]
    fn json_store_persists_each_batch() {
        let tmp = TempDir::new().unwrap();
        let mut store = JsonStore::init(tmp.path()).unwrap();
        store.insert_records(&[record(1, 150, "A", "P")]).unwrap();

        let reopened = JsonStore::open(tmp.path()).unwrap();
        assert_eq!(reopened.memory().records().len(), 1);
        assert_eq!(reopened.memory().data().next_key, 2);
        assert!(!store_path(tmp.path()).with_extension("json.tmp").exists());
    }

    #[test]
    fn json_store_init_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let mut store = JsonStore::init(tmp.path()).unwrap();
        store.insert_records(&[record(1, 150, "A", "P")]).unwrap();
        let again = JsonStore::init(tmp.path()).unwrap();
        assert_eq!(again.memory().records().len(), 1);
    }
}
