use crate::import::{self, audit, ImportSummary};
use crate::ipc::helpers::{optional_str, required_str, with_conn, HandlerErr};
use crate::ipc::types::{AppState, Request};
use rusqlite::Connection;
use serde_json::{json, Value};
use std::path::PathBuf;

const HISTORY_DEFAULT_LIMIT: i64 = 50;

fn summary_json(summary: &ImportSummary) -> Value {
    json!({
        "summary": summary,
        "message": summary.message(),
    })
}

fn existing_file(params: &Value) -> Result<PathBuf, HandlerErr> {
    let path = PathBuf::from(required_str(params, "path")?);
    if !path.is_file() {
        return Err(HandlerErr {
            code: "source_unreadable",
            message: format!("no such file: {}", path.to_string_lossy()),
            details: None,
        });
    }
    Ok(path)
}

fn import_workbook(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let path = existing_file(params)?;
    let summary = import::import_workbook_file(conn, &path)?;
    Ok(summary_json(&summary))
}

fn import_archive(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let path = existing_file(params)?;
    let summary = import::import_archive_file(conn, &path)?;
    Ok(summary_json(&summary))
}

fn import_records(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let Some(records) = params.get("records").and_then(|v| v.as_array()) else {
        return Err(HandlerErr::bad_params("params.records must be an array"));
    };
    let name = optional_str(params, "name").unwrap_or_else(|| "records".to_string());
    let summary = import::import_records(conn, &name, records)?;
    Ok(summary_json(&summary))
}

fn import_history(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let limit = params
        .get("limit")
        .and_then(|v| v.as_i64())
        .filter(|n| *n > 0)
        .unwrap_or(HISTORY_DEFAULT_LIMIT);
    let runs = audit::list_runs(conn, limit)?;
    Ok(json!({ "runs": runs }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "import.workbook" => Some(with_conn(state, req, import_workbook)),
        "import.archive" => Some(with_conn(state, req, import_archive)),
        "import.records" => Some(with_conn(state, req, import_records)),
        "import.history" => Some(with_conn(state, req, import_history)),
        _ => None,
    }
}
