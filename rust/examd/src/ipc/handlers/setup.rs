use crate::ipc::helpers::{required_non_negative, required_str, with_conn, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::model::{self, ExamConfig, Section};
use rusqlite::Connection;
use serde_json::{json, Value};

fn trades_list(conn: &Connection, _params: &Value) -> Result<Value, HandlerErr> {
    Ok(json!({ "trades": model::list_trades(conn)? }))
}

fn trades_upsert(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let code = required_str(params, "code")?;
    let label = params
        .get("label")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(&code)
        .to_string();
    // Keep the stored spelling when the code differs only in case.
    let code = model::canonical_trade_code(conn, &code)?.unwrap_or(code);
    model::upsert_trade(conn, &code, &label)?;
    Ok(json!({ "code": code, "label": label }))
}

fn exam_config_list(conn: &Connection, _params: &Value) -> Result<Value, HandlerErr> {
    Ok(json!({ "configs": model::list_exam_configs(conn)? }))
}

fn exam_config_upsert(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let trade = required_str(params, "tradeCode")?;
    let exam_type = required_str(params, "examType")?;
    let Some(section) = Section::parse(&exam_type) else {
        return Err(HandlerErr::bad_params(format!(
            "examType must be primary or secondary, got {:?}",
            exam_type
        )));
    };
    let Some(trade_code) = model::canonical_trade_code(conn, &trade)? else {
        return Err(HandlerErr::new("not_found", format!("unknown trade: {}", trade)));
    };
    let cfg = ExamConfig {
        trade_code,
        exam_type: section.as_str().to_string(),
        theory_max: required_non_negative(params, "theoryMax")?,
        practical_max: required_non_negative(params, "practicalMax")?,
        viva_max: required_non_negative(params, "vivaMax")?,
    };
    model::upsert_exam_config(conn, &cfg)?;
    serde_json::to_value(cfg).map_err(|e| HandlerErr::new("internal", e.to_string()))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "trades.list" => Some(with_conn(state, req, trades_list)),
        "trades.upsert" => Some(with_conn(state, req, trades_upsert)),
        "examConfig.list" => Some(with_conn(state, req, exam_config_list)),
        "examConfig.upsert" => Some(with_conn(state, req, exam_config_upsert)),
        _ => None,
    }
}
