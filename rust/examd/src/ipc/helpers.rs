use super::error::err;
use super::types::{AppState, Request};
use crate::error::{GradingError, ImportError};
use rusqlite::Connection;

pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        HandlerErr {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn bad_params(message: impl Into<String>) -> Self {
        HandlerErr::new("bad_params", message)
    }

    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}

impl From<rusqlite::Error> for HandlerErr {
    fn from(e: rusqlite::Error) -> Self {
        HandlerErr::new("db_error", e.to_string())
    }
}

impl From<ImportError> for HandlerErr {
    fn from(e: ImportError) -> Self {
        HandlerErr {
            code: e.code(),
            message: e.to_string(),
            details: e.details(),
        }
    }
}

impl From<GradingError> for HandlerErr {
    fn from(e: GradingError) -> Self {
        HandlerErr::new(e.code(), e.to_string())
    }
}

pub fn db_conn<'a>(state: &'a AppState, req: &Request) -> Result<&'a Connection, serde_json::Value> {
    state
        .db
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

pub fn required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing params.{}", key)))
}

pub fn optional_str(params: &serde_json::Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub fn required_non_negative(params: &serde_json::Value, key: &str) -> Result<i64, HandlerErr> {
    match params.get(key).and_then(|v| v.as_i64()) {
        Some(n) if n >= 0 => Ok(n),
        Some(n) => Err(HandlerErr::bad_params(format!(
            "params.{} must be non-negative, got {}",
            key, n
        ))),
        None => Err(HandlerErr::bad_params(format!(
            "params.{} must be an integer",
            key
        ))),
    }
}

/// Runs `f` against the open workspace and wraps the outcome in a response.
pub fn with_conn<F>(state: &AppState, req: &Request, f: F) -> serde_json::Value
where
    F: FnOnce(&Connection, &serde_json::Value) -> Result<serde_json::Value, HandlerErr>,
{
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    match f(conn, &req.params) {
        Ok(result) => super::error::ok(&req.id, result),
        Err(e) => e.response(&req.id),
    }
}
