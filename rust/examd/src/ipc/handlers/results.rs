use crate::config::ReportLayout;
use crate::ipc::helpers::{optional_str, with_conn, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::results;
use serde_json::{json, Value};

fn parse_layout(raw: &str) -> Result<ReportLayout, HandlerErr> {
    ReportLayout::parse(raw).ok_or_else(|| {
        HandlerErr::bad_params(format!("layout must be flat or statements, got {:?}", raw))
    })
}

fn handle_export(state: &mut AppState, req: &Request) -> Value {
    let cfg = state.config.clone();
    with_conn(state, req, |conn, params| {
        let requested = match optional_str(params, "layout") {
            Some(raw) => Some(parse_layout(&raw)?),
            None => None,
        };
        let layout = results::resolve_layout(conn, &cfg, requested)
            .map_err(|e| HandlerErr::new("db_error", format!("{e:#}")))?;
        let workbook = results::build_results(conn, &cfg, layout)?;
        serde_json::to_value(workbook).map_err(|e| HandlerErr::new("internal", e.to_string()))
    })
}

fn handle_set_layout(state: &mut AppState, req: &Request) -> Value {
    with_conn(state, req, |conn, params| {
        let raw = optional_str(params, "layout")
            .ok_or_else(|| HandlerErr::bad_params("missing params.layout"))?;
        let layout = parse_layout(&raw)?;
        results::store_layout(conn, layout)
            .map_err(|e| HandlerErr::new("db_error", format!("{e:#}")))?;
        Ok(json!({ "layout": layout.as_str() }))
    })
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "results.export" => Some(handle_export(state, req)),
        "results.setLayout" => Some(handle_set_layout(state, req)),
        _ => None,
    }
}
