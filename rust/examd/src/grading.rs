//! Manual grading: the per-candidate view and the submission that stores
//! answer marks, viva/practical components and the checked flag.

use crate::calc::{self, AutoMarkPolicy};
use crate::error::GradingError;
use crate::model::{self, AnswerView, Candidate, Section};
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use serde_json::Value;

/// Raw value of one submitted form field.
#[derive(Debug, Clone, PartialEq)]
pub enum MarkInput {
    Blank,
    Text(String),
    Number(f64),
    Other(String),
}

impl MarkInput {
    pub fn from_json(v: &Value) -> Self {
        match v {
            Value::Null => MarkInput::Blank,
            Value::String(s) if s.trim().is_empty() => MarkInput::Blank,
            Value::String(s) => MarkInput::Text(s.trim().to_string()),
            Value::Number(n) => match n.as_f64() {
                Some(f) => MarkInput::Number(f),
                None => MarkInput::Other(n.to_string()),
            },
            other => MarkInput::Other(other.to_string()),
        }
    }

    /// `Ok(None)` for a blank field, `Ok(Some(n))` for an integer.
    pub fn parse(&self) -> Result<Option<i64>, String> {
        match self {
            MarkInput::Blank => Ok(None),
            MarkInput::Text(s) => s
                .parse::<i64>()
                .map(Some)
                .map_err(|_| format!("{:?} is not a whole number", s)),
            MarkInput::Number(f) => {
                if f.fract() == 0.0 && f.is_finite() {
                    Ok(Some(*f as i64))
                } else {
                    Err(format!("{} is not a whole number", f))
                }
            }
            MarkInput::Other(raw) => Err(format!("{} is not a whole number", raw)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    Viva1,
    Viva2,
    Practical1,
    Practical2,
}

impl Component {
    pub const ALL: [Component; 4] = [
        Component::Viva1,
        Component::Viva2,
        Component::Practical1,
        Component::Practical2,
    ];

    pub fn column(self) -> &'static str {
        match self {
            Component::Viva1 => "viva_1",
            Component::Viva2 => "viva_2",
            Component::Practical1 => "practical_1",
            Component::Practical2 => "practical_2",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Component::ALL.into_iter().find(|c| c.column() == s)
    }

    pub fn section(self) -> Section {
        match self {
            Component::Viva1 | Component::Practical1 => Section::Primary,
            Component::Viva2 | Component::Practical2 => Section::Secondary,
        }
    }

    fn current(self, c: &Candidate) -> i64 {
        match self {
            Component::Viva1 => c.viva_1,
            Component::Viva2 => c.viva_2,
            Component::Practical1 => c.practical_1,
            Component::Practical2 => c.practical_2,
        }
    }

    /// Configured ceiling for this component, if the trade has one for the
    /// matching section.
    fn ceiling(self, conn: &Connection, trade: &str) -> rusqlite::Result<Option<i64>> {
        let Some(cfg) = model::exam_config_for(conn, trade, self.section())? else {
            return Ok(None);
        };
        let max = match self {
            Component::Viva1 | Component::Viva2 => cfg.viva_max,
            Component::Practical1 | Component::Practical2 => cfg.practical_max,
        };
        Ok((max > 0).then_some(max))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldStatus {
    Updated,
    Cleared,
    Unchanged,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldResult {
    pub field: String,
    pub status: FieldStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl FieldResult {
    fn new(field: String, status: FieldStatus) -> Self {
        FieldResult {
            field,
            status,
            reason: None,
        }
    }

    fn rejected(field: String, reason: impl Into<String>) -> Self {
        FieldResult {
            field,
            status: FieldStatus::Rejected,
            reason: Some(reason.into()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct GradingSubmission {
    /// `(answer id, value)` pairs.
    pub marks: Vec<(String, MarkInput)>,
    pub components: Vec<(Component, MarkInput)>,
    pub checked: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradingOutcome {
    pub fields: Vec<FieldResult>,
    pub updated: usize,
    pub cleared: usize,
    pub unchanged: usize,
    pub rejected: usize,
}

impl GradingOutcome {
    fn push(&mut self, r: FieldResult) {
        match r.status {
            FieldStatus::Updated => self.updated += 1,
            FieldStatus::Cleared => self.cleared += 1,
            FieldStatus::Unchanged => self.unchanged += 1,
            FieldStatus::Rejected => self.rejected += 1,
        }
        self.fields.push(r);
    }
}

pub fn mark_field_name(answer_id: &str) -> String {
    format!("marks_{}", answer_id)
}

fn submit_mark(
    conn: &Connection,
    candidate_id: &str,
    answer_id: &str,
    input: &MarkInput,
    now: &str,
) -> rusqlite::Result<FieldResult> {
    let field = mark_field_name(answer_id);
    let current: Option<(Option<i64>, i64)> = conn
        .query_row(
            "SELECT a.marks_obt, q.max_marks
             FROM answers a
             JOIN questions q ON q.id = a.question_id
             WHERE a.id = ? AND a.candidate_id = ?",
            (answer_id, candidate_id),
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .optional()?;
    let Some((stored, max_marks)) = current else {
        return Ok(FieldResult::rejected(field, "no such answer for this candidate"));
    };

    let value = match input.parse() {
        Ok(v) => v,
        Err(reason) => return Ok(FieldResult::rejected(field, reason)),
    };
    if let Some(v) = value {
        if v < 0 || v > max_marks {
            return Ok(FieldResult::rejected(
                field,
                format!("{} is outside 0..={}", v, max_marks),
            ));
        }
    }
    if value == stored {
        return Ok(FieldResult::new(field, FieldStatus::Unchanged));
    }

    conn.execute(
        "UPDATE answers SET marks_obt = ?, updated_at = ? WHERE id = ?",
        (value, now, answer_id),
    )?;
    let status = if value.is_none() {
        FieldStatus::Cleared
    } else {
        FieldStatus::Updated
    };
    Ok(FieldResult::new(field, status))
}

fn submit_component(
    conn: &Connection,
    candidate: &Candidate,
    component: Component,
    input: &MarkInput,
    now: &str,
) -> rusqlite::Result<FieldResult> {
    let field = component.column().to_string();
    let value = match input.parse() {
        // Components are never null; a blank field leaves the stored value.
        Ok(None) => return Ok(FieldResult::new(field, FieldStatus::Unchanged)),
        Ok(Some(v)) => v,
        Err(reason) => return Ok(FieldResult::rejected(field, reason)),
    };
    if value < 0 {
        return Ok(FieldResult::rejected(field, format!("{} is negative", value)));
    }
    if let Some(max) = component.ceiling(conn, &candidate.trade)? {
        if value > max {
            return Ok(FieldResult::rejected(
                field,
                format!("{} exceeds the configured maximum {}", value, max),
            ));
        }
    }
    if value == component.current(candidate) {
        return Ok(FieldResult::new(field, FieldStatus::Unchanged));
    }
    conn.execute(
        &format!(
            "UPDATE candidates SET {} = ?, updated_at = ? WHERE id = ?",
            component.column()
        ),
        (value, now, &candidate.id),
    )?;
    Ok(FieldResult::new(field, FieldStatus::Updated))
}

/// Applies every acceptable field of `submission` in one transaction and
/// reports the fate of each field. Rejected fields never abort the rest.
pub fn submit_grades(
    conn: &Connection,
    candidate_id: &str,
    submission: &GradingSubmission,
) -> Result<GradingOutcome, GradingError> {
    let Some(candidate) = model::get_candidate(conn, candidate_id)? else {
        return Err(GradingError::CandidateNotFound(candidate_id.to_string()));
    };

    let tx = conn.unchecked_transaction()?;
    let now = chrono::Utc::now().to_rfc3339();
    let mut outcome = GradingOutcome::default();

    for (answer_id, input) in &submission.marks {
        outcome.push(submit_mark(&tx, candidate_id, answer_id, input, &now)?);
    }
    for (component, input) in &submission.components {
        outcome.push(submit_component(&tx, &candidate, *component, input, &now)?);
    }
    if let Some(checked) = submission.checked {
        let field = "checked".to_string();
        if checked == candidate.checked {
            outcome.push(FieldResult::new(field, FieldStatus::Unchanged));
        } else {
            tx.execute(
                "UPDATE candidates SET checked = ?, updated_at = ? WHERE id = ?",
                (checked as i64, &now, candidate_id),
            )?;
            outcome.push(FieldResult::new(field, FieldStatus::Updated));
        }
    }

    tx.commit()?;
    log::info!(
        "grading {}: {} updated, {} cleared, {} rejected",
        candidate.army_no,
        outcome.updated,
        outcome.cleared,
        outcome.rejected
    );
    Ok(outcome)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionSheet {
    pub section: Section,
    pub answers: Vec<AnswerView>,
    pub obtained: i64,
    pub maximum: i64,
}

fn section_sheet(section: Section, all: &[AnswerView]) -> SectionSheet {
    let answers: Vec<AnswerView> = all
        .iter()
        .filter(|a| a.section() == Some(section))
        .cloned()
        .collect();
    SectionSheet {
        section,
        obtained: answers.iter().filter_map(|a| a.marks_obt).sum(),
        maximum: answers.iter().map(|a| a.max_marks).sum(),
        answers,
    }
}

/// Answers split by section, without side effects.
pub fn split_answers(
    conn: &Connection,
    candidate_id: &str,
) -> rusqlite::Result<(SectionSheet, SectionSheet)> {
    let all = model::candidate_answers(conn, candidate_id)?;
    Ok((
        section_sheet(Section::Primary, &all),
        section_sheet(Section::Secondary, &all),
    ))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradingView {
    pub candidate: Candidate,
    pub auto_marked: usize,
    pub primary: SectionSheet,
    pub secondary: SectionSheet,
}

/// Runs the auto-marker for the candidate, then loads the grading sheet.
pub fn grading_view(
    conn: &Connection,
    candidate_id: &str,
    policy: AutoMarkPolicy,
) -> Result<GradingView, GradingError> {
    let Some(candidate) = model::get_candidate(conn, candidate_id)? else {
        return Err(GradingError::CandidateNotFound(candidate_id.to_string()));
    };
    let auto_marked = calc::auto_mark(conn, Some(candidate_id), policy)?;
    let (primary, secondary) = split_answers(conn, candidate_id)?;
    Ok(GradingView {
        candidate,
        auto_marked,
        primary,
        secondary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn mark_input_parses_blanks_and_integers() {
        assert_eq!(MarkInput::from_json(&json!(null)).parse(), Ok(None));
        assert_eq!(MarkInput::from_json(&json!("  ")).parse(), Ok(None));
        assert_eq!(MarkInput::from_json(&json!(" 7 ")).parse(), Ok(Some(7)));
        assert_eq!(MarkInput::from_json(&json!(4)).parse(), Ok(Some(4)));
        assert_eq!(MarkInput::from_json(&json!(4.0)).parse(), Ok(Some(4)));
    }

    #[test]
    fn mark_input_rejects_non_integers() {
        assert!(MarkInput::from_json(&json!("abc")).parse().is_err());
        assert!(MarkInput::from_json(&json!(2.5)).parse().is_err());
        assert!(MarkInput::from_json(&json!(true)).parse().is_err());
    }

    #[test]
    fn components_map_to_sections() {
        assert_eq!(Component::parse("viva_2"), Some(Component::Viva2));
        assert_eq!(Component::Practical1.section(), Section::Primary);
        assert_eq!(Component::Viva2.section(), Section::Secondary);
        assert_eq!(Component::parse("viva_3"), None);
    }
}
