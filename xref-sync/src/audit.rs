//! Audit sinks for inserted / deleted records.
//!
//! Sinks are fire-and-forget: [`AuditSink::emit`] cannot fail, and a sink
//! that hits an I/O problem logs a warning and keeps going.

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use xref_core::{config::RotationSettings, IdentifierRecord};

use crate::error::{io_err, SyncError};

/// Field delimiter used for audit lines.
pub const AUDIT_DELIMITER: &str = "|";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuditKind {
    Inserted,
    Deleted,
}

impl AuditKind {
    /// Log target and file stem.
    pub fn name(self) -> &'static str {
        match self {
            AuditKind::Inserted => "inserted",
            AuditKind::Deleted => "deleted",
        }
    }
}

impl fmt::Display for AuditKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AuditEvent<'a> {
    pub kind: AuditKind,
    pub record: &'a IdentifierRecord,
}

/// Receiver of audit events.
pub trait AuditSink {
    fn emit(&self, event: AuditEvent<'_>);

    /// Push buffered lines to their destination.
    fn flush(&self) {}
}

impl<T: AuditSink + ?Sized> AuditSink for &T {
    fn emit(&self, event: AuditEvent<'_>) {
        (**self).emit(event)
    }

    fn flush(&self) {
        (**self).flush()
    }
}

impl<T: AuditSink + ?Sized> AuditSink for Box<T> {
    fn emit(&self, event: AuditEvent<'_>) {
        (**self).emit(event)
    }

    fn flush(&self) {
        (**self).flush()
    }
}

// ---------------------------------------------------------------------------
// LogAuditSink
// ---------------------------------------------------------------------------

/// Writes each event at debug level under the `inserted` / `deleted` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogAuditSink;

impl AuditSink for LogAuditSink {
    fn emit(&self, event: AuditEvent<'_>) {
        tracing::debug!(target: event.kind.name(), "{}", event.record.dump(AUDIT_DELIMITER));
    }
}

// ---------------------------------------------------------------------------
// FileAuditSink
// ---------------------------------------------------------------------------

/// Appends events to `<dir>/inserted.log` and `<dir>/deleted.log`.
///
/// Each log is checked against the [`RotationSettings`] once, when the sink
/// opens it; a run never rotates a file it is writing to.
#[derive(Debug)]
pub struct FileAuditSink {
    dir: PathBuf,
    inserted: Mutex<BufWriter<File>>,
    deleted: Mutex<BufWriter<File>>,
}

impl FileAuditSink {
    /// Open both logs under `dir`, rotating any that grew past the limit.
    pub fn open(dir: &Path, rotation: &RotationSettings) -> Result<Self, SyncError> {
        fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
        Ok(Self {
            dir: dir.to_path_buf(),
            inserted: Mutex::new(open_log(&log_path(dir, AuditKind::Inserted), rotation)?),
            deleted: Mutex::new(open_log(&log_path(dir, AuditKind::Deleted), rotation)?),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn writer(&self, kind: AuditKind) -> &Mutex<BufWriter<File>> {
        match kind {
            AuditKind::Inserted => &self.inserted,
            AuditKind::Deleted => &self.deleted,
        }
    }
}

impl AuditSink for FileAuditSink {
    fn emit(&self, event: AuditEvent<'_>) {
        let Ok(mut out) = self.writer(event.kind).lock() else {
            tracing::warn!("{} audit log lock poisoned; dropping event", event.kind);
            return;
        };
        if let Err(err) = writeln!(out, "{}", event.record.dump(AUDIT_DELIMITER)) {
            tracing::warn!("{} audit write failed: {err}", event.kind);
        }
    }

    fn flush(&self) {
        for kind in [AuditKind::Inserted, AuditKind::Deleted] {
            if let Ok(mut out) = self.writer(kind).lock() {
                if let Err(err) = out.flush() {
                    tracing::warn!("{kind} audit flush failed: {err}");
                }
            }
        }
    }
}

/// `<dir>/<kind>.log`
pub fn log_path(dir: &Path, kind: AuditKind) -> PathBuf {
    dir.join(format!("{}.log", kind.name()))
}

/// `<log>.<n>`, e.g. `deleted.log.2`.
pub fn rotated_path(log: &Path, n: usize) -> PathBuf {
    let mut name = log.as_os_str().to_os_string();
    name.push(format!(".{n}"));
    PathBuf::from(name)
}

fn open_log(path: &Path, rotation: &RotationSettings) -> Result<BufWriter<File>, SyncError> {
    match rotate(path, rotation) {
        Ok(true) => tracing::info!("audit log rotated: {}", path.display()),
        Ok(false) => {}
        Err(err) => tracing::warn!("audit log rotation failed for {}: {err}", path.display()),
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| io_err(path, e))?;
    Ok(BufWriter::new(file))
}

/// Move a full log into the numbered chain. Gaps in the chain are fine; the
/// live file is recreated by the append-mode open that follows.
fn rotate(path: &Path, rotation: &RotationSettings) -> io::Result<bool> {
    let len = match fs::metadata(path) {
        Ok(meta) => meta.len(),
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(err) => return Err(err),
    };
    if len < rotation.max_bytes {
        return Ok(false);
    }
    if rotation.keep == 0 {
        fs::remove_file(path)?;
        return Ok(true);
    }

    missing_ok(fs::remove_file(rotated_path(path, rotation.keep)))?;
    for n in (1..rotation.keep).rev() {
        missing_ok(fs::rename(rotated_path(path, n), rotated_path(path, n + 1)))?;
    }
    fs::rename(path, rotated_path(path, 1))?;
    Ok(true)
}

fn missing_ok(result: io::Result<()>) -> io::Result<()> {
    match result {
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}
