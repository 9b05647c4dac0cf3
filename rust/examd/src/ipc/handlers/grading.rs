use crate::calc::{self, AutoMarkPolicy};
use crate::grading::{self, Component, GradingSubmission, MarkInput};
use crate::ipc::error::ok;
use crate::ipc::helpers::{db_conn, optional_str, required_str, with_conn, HandlerErr};
use crate::ipc::types::{AppState, Request};
use serde_json::{json, Value};

fn policy(state: &AppState) -> AutoMarkPolicy {
    AutoMarkPolicy {
        zero_counts_as_ungraded: state.config.auto_mark.zero_counts_as_ungraded,
    }
}

/// `marks` is keyed by answer id; the form-style `marks_<id>` key is accepted
/// too. `components` is keyed by `viva_1`, `viva_2`, `practical_1`,
/// `practical_2`.
fn parse_submission(params: &Value) -> Result<(GradingSubmission, Vec<String>), HandlerErr> {
    let mut submission = GradingSubmission::default();
    let mut unknown = Vec::new();

    if let Some(marks) = params.get("marks") {
        let Some(obj) = marks.as_object() else {
            return Err(HandlerErr::bad_params("params.marks must be an object"));
        };
        for (key, value) in obj {
            let answer_id = key.strip_prefix("marks_").unwrap_or(key);
            submission
                .marks
                .push((answer_id.to_string(), MarkInput::from_json(value)));
        }
    }
    if let Some(components) = params.get("components") {
        let Some(obj) = components.as_object() else {
            return Err(HandlerErr::bad_params("params.components must be an object"));
        };
        for (key, value) in obj {
            match Component::parse(key) {
                Some(c) => submission.components.push((c, MarkInput::from_json(value))),
                None => unknown.push(key.clone()),
            }
        }
    }
    match params.get("checked") {
        None | Some(Value::Null) => {}
        Some(Value::Bool(b)) => submission.checked = Some(*b),
        Some(_) => return Err(HandlerErr::bad_params("params.checked must be a boolean")),
    }
    Ok((submission, unknown))
}

fn handle_open(state: &mut AppState, req: &Request) -> Value {
    let policy = policy(state);
    with_conn(state, req, |conn, params| {
        let id = required_str(params, "candidateId")?;
        let view = grading::grading_view(conn, &id, policy)?;
        serde_json::to_value(view).map_err(|e| HandlerErr::new("internal", e.to_string()))
    })
}

fn handle_submit(state: &mut AppState, req: &Request) -> Value {
    with_conn(state, req, |conn, params| {
        let id = required_str(params, "candidateId")?;
        let (submission, unknown) = parse_submission(params)?;
        let mut outcome = grading::submit_grades(conn, &id, &submission)?;
        for key in unknown {
            outcome.fields.push(grading::FieldResult {
                field: key,
                status: grading::FieldStatus::Rejected,
                reason: Some("unknown component".to_string()),
            });
            outcome.rejected += 1;
        }
        serde_json::to_value(outcome).map_err(|e| HandlerErr::new("internal", e.to_string()))
    })
}

fn handle_auto_mark(state: &mut AppState, req: &Request) -> Value {
    let policy = policy(state);
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let candidate = optional_str(&req.params, "candidateId");
    match calc::auto_mark(conn, candidate.as_deref(), policy) {
        Ok(marked) => ok(&req.id, json!({ "marked": marked })),
        Err(e) => HandlerErr::from(e).response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "grading.open" => Some(handle_open(state, req)),
        "grading.submit" => Some(handle_submit(state, req)),
        "grading.autoMark" => Some(handle_auto_mark(state, req)),
        _ => None,
    }
}
