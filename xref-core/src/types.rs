//! Domain types for cross-reference synchronization.
//!
//! [`IdentifierRecord`] equality and hashing are defined over the identity
//! tuple `(subject_id, namespace_key, accession_id, source_pipeline)` only.
//! Store-assigned keys and timestamps never take part in comparisons.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Identifier of the biological entity (gene) owning a cross-reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(pub u64);

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<u64> for SubjectId {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

/// Key of an external identifier system (e.g. Ensembl genes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NamespaceKey(pub u32);

impl NamespaceKey {
    /// Ensembl gene identifiers.
    pub const ENSEMBL_GENES: NamespaceKey = NamespaceKey(20);
}

impl fmt::Display for NamespaceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<u32> for NamespaceKey {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Store-assigned primary key of a persisted record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordKey(pub u64);

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Tag of the import pipeline owning a record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourcePipeline(pub String);

impl fmt::Display for SourcePipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for SourcePipeline {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SourcePipeline {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Species
// ---------------------------------------------------------------------------

/// Species known to the annotation database, keyed by species type key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Species {
    Human,
    Mouse,
    Rat,
    Chinchilla,
    Bonobo,
    Dog,
    Squirrel,
    Pig,
}

impl Species {
    pub fn all() -> &'static [Species] {
        &[
            Species::Human,
            Species::Mouse,
            Species::Rat,
            Species::Chinchilla,
            Species::Bonobo,
            Species::Dog,
            Species::Squirrel,
            Species::Pig,
        ]
    }

    /// Numeric species type key.
    pub fn key(self) -> u32 {
        match self {
            Species::Human => 1,
            Species::Mouse => 2,
            Species::Rat => 3,
            Species::Chinchilla => 4,
            Species::Bonobo => 5,
            Species::Dog => 6,
            Species::Squirrel => 7,
            Species::Pig => 9,
        }
    }

    pub fn from_key(key: u32) -> Option<Species> {
        Species::all().iter().copied().find(|s| s.key() == key)
    }

    /// Capitalized common name, as used in report lines and subsystem names.
    pub fn common_name(self) -> &'static str {
        match self {
            Species::Human => "Human",
            Species::Mouse => "Mouse",
            Species::Rat => "Rat",
            Species::Chinchilla => "Chinchilla",
            Species::Bonobo => "Bonobo",
            Species::Dog => "Dog",
            Species::Squirrel => "Squirrel",
            Species::Pig => "Pig",
        }
    }
}

impl fmt::Display for Species {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.common_name())
    }
}

impl FromStr for Species {
    type Err = String;

    /// Accepts a common name (any case) or a numeric species type key.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(key) = s.parse::<u32>() {
            return Species::from_key(key).ok_or_else(|| format!("unknown species type key {key}"));
        }
        Species::all()
            .iter()
            .copied()
            .find(|sp| sp.common_name().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                let known: Vec<_> = Species::all().iter().map(|sp| sp.common_name()).collect();
                format!("unknown species '{s}'; expected one of: {}", known.join(", "))
            })
    }
}

// ---------------------------------------------------------------------------
// Genes and external accessions
// ---------------------------------------------------------------------------

/// Kind of a gene row; only plain genes take part in synchronization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeneKind {
    #[default]
    Gene,
    Splice,
    Allele,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gene {
    pub subject_id: SubjectId,
    pub symbol: String,
    pub species: Species,
    #[serde(default)]
    pub kind: GeneKind,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

/// An accession linked to a gene in the authoritative annotation source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalAccession {
    pub subject_id: SubjectId,
    pub accession_id: String,
}

// ---------------------------------------------------------------------------
// IdentifierRecord
// ---------------------------------------------------------------------------

/// One external cross-reference mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentifierRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_key: Option<RecordKey>,
    pub subject_id: SubjectId,
    pub namespace_key: NamespaceKey,
    pub accession_id: String,
    pub source_pipeline: SourcePipeline,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl IdentifierRecord {
    /// Build a fresh, not yet persisted record stamped with `now`.
    pub fn new(
        subject_id: SubjectId,
        namespace_key: NamespaceKey,
        accession_id: impl Into<String>,
        source_pipeline: SourcePipeline,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            record_key: None,
            subject_id,
            namespace_key,
            accession_id: accession_id.into(),
            source_pipeline,
            created_at: now,
            modified_at: now,
        }
    }

    pub fn with_record_key(mut self, key: RecordKey) -> Self {
        self.record_key = Some(key);
        self
    }

    /// Borrowed view of the fields that define equality.
    pub fn identity(&self) -> (SubjectId, NamespaceKey, &str, &str) {
        (
            self.subject_id,
            self.namespace_key,
            self.accession_id.as_str(),
            self.source_pipeline.0.as_str(),
        )
    }

    /// Stable single-line rendering for audit logs.
    ///
    /// Field order: record key, subject, namespace, accession, pipeline,
    /// created, modified. A missing record key renders as an empty field.
    pub fn dump(&self, delimiter: &str) -> String {
        let key = self.record_key.map(|k| k.to_string()).unwrap_or_default();
        [
            key,
            self.subject_id.to_string(),
            self.namespace_key.to_string(),
            self.accession_id.clone(),
            self.source_pipeline.0.clone(),
            self.created_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.modified_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        ]
        .join(delimiter)
    }
}

impl PartialEq for IdentifierRecord {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for IdentifierRecord {}

impl Hash for IdentifierRecord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use chrono::{Duration, TimeZone};

    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn record(subject: u64, acc: &str, pipeline: &str) -> IdentifierRecord {
        IdentifierRecord::new(
            SubjectId(subject),
            NamespaceKey(150),
            acc,
            SourcePipeline::from(pipeline),
            at(0),
        )
    }

    #[test]
    fn equality_ignores_key_and_timestamps() {
        let a = record(1, "ENSRNOG001", "RatGTEx");
        let mut b = record(1, "ENSRNOG001", "RatGTEx").with_record_key(RecordKey(42));
        b.modified_at = at(0) + Duration::days(3);
        assert_eq!(a, b);

        let set: HashSet<_> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn equality_is_case_sensitive() {
        assert_ne!(record(1, "ENSRNOG001", "RatGTEx"), record(1, "ensrnog001", "RatGTEx"));
        assert_ne!(record(1, "ENSRNOG001", "RatGTEx"), record(1, "ENSRNOG001", "ratgtex"));
    }

    #[test]
    fn pipeline_and_namespace_distinguish() {
        let a = record(1, "ENSRNOG001", "RatGTEx");
        assert_ne!(a, record(1, "ENSRNOG001", "Ensembl"));
        let mut other_ns = a.clone();
        other_ns.namespace_key = NamespaceKey::ENSEMBL_GENES;
        assert_ne!(a, other_ns);
    }

    #[test]
    fn dump_has_stable_field_order() {
        let r = record(7, "ENSRNOG007", "RatGTEx").with_record_key(RecordKey(3));
        assert_eq!(
            r.dump("|"),
            "3|7|150|ENSRNOG007|RatGTEx|2023-11-14T22:13:20Z|2023-11-14T22:13:20Z"
        );
        let fresh = record(7, "ENSRNOG007", "RatGTEx");
        assert!(fresh.dump("|").starts_with("|7|150|"));
    }

    #[test]
    fn species_parse_by_name_and_key() {
        assert_eq!("rat".parse::<Species>().unwrap(), Species::Rat);
        assert_eq!("RAT".parse::<Species>().unwrap(), Species::Rat);
        assert_eq!("3".parse::<Species>().unwrap(), Species::Rat);
        assert_eq!(Species::Pig.key(), 9);
        assert!("unicorn".parse::<Species>().unwrap_err().contains("unknown species"));
        assert!("8".parse::<Species>().is_err());
    }

    #[test]
    fn gene_yaml_defaults() {
        let gene: Gene = serde_yaml::from_str("subject_id: 5\nsymbol: A2m\nspecies: rat\n").unwrap();
        assert_eq!(gene.kind, GeneKind::Gene);
        assert!(gene.active);
    }
}
