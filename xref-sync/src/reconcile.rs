//! Three-way reconciliation of stored versus incoming identifier records.
//!
//! [`reconcile`] is a pure function: given the records currently stored for a
//! scope and the records freshly derived from the annotation source, it splits
//! them into records to insert, records to delete and records that are
//! already up to date. Comparison uses [`IdentifierRecord`] equality, i.e.
//! the `(subject, namespace, accession, pipeline)` tuple.

use std::collections::HashSet;

use thiserror::Error;

use xref_core::IdentifierRecord;

/// Result of diffing `existing` against `incoming`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    /// Present in `incoming`, absent from `existing`.
    pub to_insert: Vec<IdentifierRecord>,
    /// Present in `existing`, absent from `incoming`.
    pub to_delete: Vec<IdentifierRecord>,
    /// Present on both sides; taken from `existing` so record keys survive.
    pub matching: Vec<IdentifierRecord>,
}

/// Broken cardinality or disjointness guarantee. Only reachable when record
/// equality and hashing disagree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("{side}: expected {expected} records, partitions hold {actual}")]
    Cardinality {
        side: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("record {record} appears in both {first} and {second}")]
    Overlap {
        record: String,
        first: &'static str,
        second: &'static str,
    },
}

impl Reconciliation {
    /// No inserts and no deletes: the store already matches the source.
    pub fn is_noop(&self) -> bool {
        self.to_insert.is_empty() && self.to_delete.is_empty()
    }

    /// Verify the partition against the stored row count and the
    /// de-duplicated incoming size.
    pub fn check_invariants(
        &self,
        existing_len: usize,
        incoming_unique: usize,
    ) -> Result<(), InvariantViolation> {
        let existing_parts = self.to_delete.len() + self.matching.len();
        if existing_parts != existing_len {
            return Err(InvariantViolation::Cardinality {
                side: "existing",
                expected: existing_len,
                actual: existing_parts,
            });
        }
        let incoming_parts = self.to_insert.len() + unique_count(&self.matching);
        if incoming_parts != incoming_unique {
            return Err(InvariantViolation::Cardinality {
                side: "incoming",
                expected: incoming_unique,
                actual: incoming_parts,
            });
        }

        let parts: [(&'static str, &[IdentifierRecord]); 3] = [
            ("to_insert", self.to_insert.as_slice()),
            ("to_delete", self.to_delete.as_slice()),
            ("matching", self.matching.as_slice()),
        ];
        for (i, (first, left)) in parts.iter().enumerate() {
            let left: HashSet<&IdentifierRecord> = left.iter().collect();
            for (second, right) in &parts[i + 1..] {
                if let Some(shared) = right.iter().find(|r| left.contains(r)) {
                    return Err(InvariantViolation::Overlap {
                        record: shared.dump("|"),
                        first: *first,
                        second: *second,
                    });
                }
            }
        }
        Ok(())
    }
}

/// Collapse records equal by identity, keeping the first occurrence.
pub fn dedup(records: Vec<IdentifierRecord>) -> Vec<IdentifierRecord> {
    let mut seen = HashSet::with_capacity(records.len());
    let mut unique = Vec::with_capacity(records.len());
    for record in records {
        if !seen.contains(&record) {
            seen.insert(record.clone());
            unique.push(record);
        }
    }
    unique
}

/// Number of distinct records by identity.
pub fn unique_count(records: &[IdentifierRecord]) -> usize {
    records.iter().collect::<HashSet<_>>().len()
}

/// Split `existing` and `incoming` into insert / delete / matching sets.
///
/// Only `incoming` is de-duplicated. Every stored row lands in `to_delete` or
/// `matching`, so duplicate rows already in the store are all deleted or all
/// touched. Output order follows the respective input.
pub fn reconcile(
    existing: Vec<IdentifierRecord>,
    incoming: Vec<IdentifierRecord>,
) -> Reconciliation {
    let incoming = dedup(incoming);

    let stored: HashSet<&IdentifierRecord> = existing.iter().collect();
    let to_insert: Vec<IdentifierRecord> = incoming
        .iter()
        .filter(|r| !stored.contains(r))
        .cloned()
        .collect();
    drop(stored);

    let fresh: HashSet<&IdentifierRecord> = incoming.iter().collect();
    let (matching, to_delete): (Vec<_>, Vec<_>) =
        existing.into_iter().partition(|r| fresh.contains(r));

    Reconciliation {
        to_insert,
        to_delete,
        matching,
    }
}
