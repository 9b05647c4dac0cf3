//! Bulk import of candidate rosters and raw answers.
//!
//! Every source (workbook, zip archive, pre-parsed records) is first turned
//! into a [`RowBatch`] of canonical fields, then reconciled against the store
//! in a single transaction by [`import_batch`].

mod answers;
mod archive;
pub mod audit;
mod batch;
pub mod normalize;
pub mod reconcile;
pub mod row;
mod workbook;

pub use answers::merge_answer;
pub use archive::{read_archive, read_archive_from, records_to_batch};
pub use audit::{ImportRun, ImportSource, SourceKind};
pub use batch::{import_batch, ImportSummary};
pub use reconcile::{reconcile_candidate, reconcile_question, CandidateAttrs, Outcome};
pub use row::{Cell, Row, RowBatch};
pub use workbook::read_workbook;

use crate::error::ImportError;
use chrono::Utc;
use rusqlite::Connection;
use std::path::Path;

fn run_and_record(
    conn: &Connection,
    source: ImportSource,
    batch: Result<RowBatch, ImportError>,
) -> Result<ImportSummary, ImportError> {
    let started_at = Utc::now();
    log::info!("import started: {} {}", source.kind.as_str(), source.name);
    let result = batch.and_then(|b| import_batch(conn, &b));
    if let Err(e) = &result {
        log::warn!("import failed: {} {}: {}", source.kind.as_str(), source.name, e);
    }
    if let Err(e) = audit::record_run(conn, &source, started_at, &result) {
        log::warn!("could not record import run: {}", e);
    }
    result
}

fn file_source(kind: SourceKind, path: &Path) -> Result<ImportSource, ImportError> {
    let bytes = std::fs::read(path)?;
    Ok(ImportSource {
        kind,
        name: path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string_lossy().to_string()),
        sha256: Some(audit::fingerprint(&bytes)),
    })
}

pub fn import_workbook_file(conn: &Connection, path: &Path) -> Result<ImportSummary, ImportError> {
    let source = file_source(SourceKind::Workbook, path)?;
    run_and_record(conn, source, read_workbook(path))
}

pub fn import_archive_file(conn: &Connection, path: &Path) -> Result<ImportSummary, ImportError> {
    let source = file_source(SourceKind::Archive, path)?;
    run_and_record(conn, source, read_archive(path))
}

pub fn import_records(
    conn: &Connection,
    name: &str,
    records: &[serde_json::Value],
) -> Result<ImportSummary, ImportError> {
    let payload = serde_json::to_vec(records)?;
    let source = ImportSource {
        kind: SourceKind::Records,
        name: name.to_string(),
        sha256: Some(audit::fingerprint(&payload)),
    };
    run_and_record(conn, source, records_to_batch(records))
}
