use crate::ipc::helpers::{optional_str, required_str, with_conn, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::roster::{self, CandidateFilter};
use rusqlite::Connection;
use serde_json::{json, Value};

fn candidates_list(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let filter = CandidateFilter {
        trade: optional_str(params, "trade"),
        district: optional_str(params, "district"),
        state: optional_str(params, "state"),
        search: optional_str(params, "search"),
    };
    let rows = roster::list_candidates(conn, &filter)?;
    Ok(json!({ "candidates": rows }))
}

fn candidates_open(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let id = required_str(params, "candidateId")?;
    let Some(detail) = roster::candidate_detail(conn, &id)? else {
        return Err(HandlerErr::new("not_found", format!("candidate not found: {}", id)));
    };
    serde_json::to_value(detail).map_err(|e| HandlerErr::new("internal", e.to_string()))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "candidates.list" => Some(with_conn(state, req, candidates_list)),
        "candidates.open" => Some(with_conn(state, req, candidates_open)),
        _ => None,
    }
}
