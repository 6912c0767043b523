//! Per-species run summary and its text / JSON-lines renderings.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use xref_core::{NamespaceKey, SourcePipeline, Species};

use crate::error::{io_err, SyncError};
use crate::orchestrator::RunScope;

/// Outcome of one species run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSummary {
    pub species: Species,
    pub source_pipeline: SourcePipeline,
    pub namespace_key: NamespaceKey,
    pub inserted: usize,
    pub deleted: usize,
    pub unchanged: usize,
    pub total_before: usize,
    pub total_after: usize,
    pub delta: i64,
    pub elapsed_ms: u64,
}

impl SyncSummary {
    /// `total_after` is the resulting identifier count:
    /// `total_before + inserted - deleted`.
    pub fn new(
        scope: &RunScope,
        total_before: usize,
        inserted: usize,
        deleted: usize,
        unchanged: usize,
        elapsed: Duration,
    ) -> Self {
        let total_after = (total_before + inserted).saturating_sub(deleted);
        Self {
            species: scope.species,
            source_pipeline: scope.source_pipeline.clone(),
            namespace_key: scope.namespace_key,
            inserted,
            deleted,
            unchanged,
            total_before,
            total_after,
            delta: total_after as i64 - total_before as i64,
            elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Metrics subsystem name, e.g. `RatGTExRat`.
    pub fn subsystem(&self) -> String {
        format!("{}{}", self.source_pipeline, self.species.common_name())
    }

    /// `Rat RatGTEx ids total:      1,234     difference:  +2`
    pub fn total_line(&self) -> String {
        let diff = if self.delta != 0 {
            format!("     difference: {}", format_signed(self.delta))
        } else {
            "     no changes".to_string()
        };
        format!(
            "{} {} ids total:      {}{}",
            self.species,
            self.source_pipeline,
            format_thousands(self.total_after),
            diff
        )
    }
}

/// `1234567` → `1,234,567`
pub fn format_thousands(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Signed count with a leading space: ` +2`, ` -1,000`.
pub fn format_signed(n: i64) -> String {
    let sign = if n < 0 { '-' } else { '+' };
    format!(" {sign}{}", format_thousands(n.unsigned_abs() as usize))
}

/// `850 ms`, `42 sec`, `3 min 07 sec`, `1 hr 00 min 05 sec`.
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    if secs == 0 {
        return format!("{} ms", elapsed.as_millis());
    }
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{h} hr {m:02} min {s:02} sec")
    } else if m > 0 {
        format!("{m} min {s:02} sec")
    } else {
        format!("{s} sec")
    }
}

// ---------------------------------------------------------------------------
// Summary log
// ---------------------------------------------------------------------------

/// One line of the JSON-lines summary log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryRecord {
    pub logged_at: DateTime<Utc>,
    pub subsystem: String,
    pub summary: SyncSummary,
}

/// Append `summary` to the JSON-lines file at `path`.
pub fn append_summary_log(path: &Path, summary: &SyncSummary) -> Result<(), SyncError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
    }
    let record = SummaryRecord {
        logged_at: Utc::now(),
        subsystem: summary.subsystem(),
        summary: summary.clone(),
    };
    let mut line = serde_json::to_string(&record)?;
    line.push('\n');
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| io_err(path, e))?;
    file.write_all(line.as_bytes()).map_err(|e| io_err(path, e))?;
    Ok(())
}
