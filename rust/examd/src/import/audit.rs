use super::batch::ImportSummary;
use crate::error::ImportError;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::Serialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Workbook,
    Archive,
    Records,
}

impl SourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::Workbook => "workbook",
            SourceKind::Archive => "archive",
            SourceKind::Records => "records",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ImportSource {
    pub kind: SourceKind,
    pub name: String,
    pub sha256: Option<String>,
}

pub fn fingerprint(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRun {
    pub id: String,
    pub source_kind: String,
    pub source_name: String,
    pub sha256: Option<String>,
    pub started_at: String,
    pub finished_at: String,
    pub ok: bool,
    pub summary: ImportSummary,
    pub error: Option<String>,
}

/// Written after the batch transaction has committed or rolled back, so a
/// failed import still leaves a trace.
pub fn record_run(
    conn: &Connection,
    source: &ImportSource,
    started_at: DateTime<Utc>,
    result: &Result<ImportSummary, ImportError>,
) -> rusqlite::Result<String> {
    let id = Uuid::new_v4().to_string();
    let empty = ImportSummary::default();
    let (ok, summary, error) = match result {
        Ok(s) => (true, s, None),
        Err(e) => (false, &empty, Some(e.to_string())),
    };
    conn.execute(
        "INSERT INTO import_runs(
            id, source_kind, source_name, sha256, started_at, finished_at, ok,
            rows_seen, rows_skipped, candidates_created, candidates_updated,
            questions_created, answers_created, answers_updated, error)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        rusqlite::params![
            id,
            source.kind.as_str(),
            source.name,
            source.sha256,
            started_at.to_rfc3339(),
            Utc::now().to_rfc3339(),
            ok as i64,
            summary.rows_seen as i64,
            summary.rows_skipped as i64,
            summary.candidates_created as i64,
            summary.candidates_updated as i64,
            summary.questions_created as i64,
            summary.answers_created as i64,
            summary.answers_updated as i64,
            error,
        ],
    )?;
    Ok(id)
}

pub fn list_runs(conn: &Connection, limit: i64) -> rusqlite::Result<Vec<ImportRun>> {
    let mut stmt = conn.prepare(
        "SELECT id, source_kind, source_name, sha256, started_at, finished_at, ok,
                rows_seen, rows_skipped, candidates_created, candidates_updated,
                questions_created, answers_created, answers_updated, error
         FROM import_runs
         ORDER BY started_at DESC, rowid DESC
         LIMIT ?",
    )?;
    let rows = stmt
        .query_map([limit], |r| {
            let count = |i: usize| -> rusqlite::Result<usize> { Ok(r.get::<_, i64>(i)? as usize) };
            Ok(ImportRun {
                id: r.get(0)?,
                source_kind: r.get(1)?,
                source_name: r.get(2)?,
                sha256: r.get(3)?,
                started_at: r.get(4)?,
                finished_at: r.get(5)?,
                ok: r.get::<_, i64>(6)? != 0,
                summary: ImportSummary {
                    rows_seen: count(7)?,
                    rows_skipped: count(8)?,
                    candidates_created: count(9)?,
                    candidates_updated: count(10)?,
                    questions_created: count(11)?,
                    answers_created: count(12)?,
                    answers_updated: count(13)?,
                },
                error: r.get(14)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_lower_hex_sha256() {
        assert_eq!(
            fingerprint(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
