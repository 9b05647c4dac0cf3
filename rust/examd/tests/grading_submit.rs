use examd::calc::AutoMarkPolicy;
use examd::db;
use examd::error::GradingError;
use examd::grading::{self, Component, FieldStatus, GradingSubmission, MarkInput};
use examd::import::{import_batch, records_to_batch};
use examd::model::{self, ExamConfig, Section};
use rusqlite::Connection;
use serde_json::json;

struct Fixture {
    conn: Connection,
    candidate_id: String,
    primary_answer: String,
    secondary_answer: String,
}

fn fixture() -> Fixture {
    let conn = db::open_in_memory().expect("open in-memory db");
    let records = vec![
        json!({
            "army_no": "A1", "trade": "TTC", "exam_type": "primary", "question": "P1",
            "answer": "b", "correct_answer": "b", "max_marks": 5
        }),
        json!({
            "army_no": "A1", "trade": "TTC", "exam_type": "secondary", "question": "S1",
            "answer": "long answer", "max_marks": 10, "marks_obt": 4
        }),
    ];
    import_batch(&conn, &records_to_batch(&records).expect("batch")).expect("import");

    let candidate_id: String = conn
        .query_row("SELECT id FROM candidates WHERE army_no = 'A1'", [], |r| r.get(0))
        .expect("candidate id");
    let answer_for = |question: &str| -> String {
        conn.query_row(
            "SELECT a.id FROM answers a JOIN questions q ON q.id = a.question_id
             WHERE q.question = ?",
            [question],
            |r| r.get(0),
        )
        .expect("answer id")
    };
    let primary_answer = answer_for("P1");
    let secondary_answer = answer_for("S1");
    Fixture {
        conn,
        candidate_id,
        primary_answer,
        secondary_answer,
    }
}

fn status_of(outcome: &grading::GradingOutcome, field: &str) -> FieldStatus {
    outcome
        .fields
        .iter()
        .find(|f| f.field == field)
        .unwrap_or_else(|| panic!("no result for {field}"))
        .status
}

fn stored_marks(conn: &Connection, answer_id: &str) -> Option<i64> {
    conn.query_row(
        "SELECT marks_obt FROM answers WHERE id = ?",
        [answer_id],
        |r| r.get(0),
    )
    .expect("marks")
}

#[test]
fn grading_view_auto_marks_and_splits_sections() {
    let f = fixture();
    let view = grading::grading_view(&f.conn, &f.candidate_id, AutoMarkPolicy::default())
        .expect("grading view");
    assert_eq!(view.auto_marked, 1);
    assert_eq!(view.primary.answers.len(), 1);
    assert_eq!(view.primary.obtained, 5);
    assert_eq!(view.primary.maximum, 5);
    assert_eq!(view.secondary.answers.len(), 1);
    assert_eq!(view.secondary.obtained, 4);
    assert_eq!(view.secondary.maximum, 10);
}

#[test]
fn submission_reports_every_field() {
    let f = fixture();
    let submission = GradingSubmission {
        marks: vec![
            (f.primary_answer.clone(), MarkInput::Text("3".into())),
            (f.secondary_answer.clone(), MarkInput::Blank),
            ("missing".into(), MarkInput::Number(1.0)),
        ],
        components: vec![(Component::Viva1, MarkInput::Number(6.0))],
        checked: Some(true),
    };
    let outcome =
        grading::submit_grades(&f.conn, &f.candidate_id, &submission).expect("submit");

    let primary_field = grading::mark_field_name(&f.primary_answer);
    let secondary_field = grading::mark_field_name(&f.secondary_answer);
    assert_eq!(status_of(&outcome, &primary_field), FieldStatus::Updated);
    assert_eq!(status_of(&outcome, &secondary_field), FieldStatus::Cleared);
    assert_eq!(status_of(&outcome, "marks_missing"), FieldStatus::Rejected);
    assert_eq!(status_of(&outcome, "viva_1"), FieldStatus::Updated);
    assert_eq!(status_of(&outcome, "checked"), FieldStatus::Updated);
    assert_eq!(outcome.updated, 3);
    assert_eq!(outcome.cleared, 1);
    assert_eq!(outcome.rejected, 1);

    assert_eq!(stored_marks(&f.conn, &f.primary_answer), Some(3));
    assert_eq!(stored_marks(&f.conn, &f.secondary_answer), None);
    let c = model::get_candidate(&f.conn, &f.candidate_id)
        .expect("query")
        .expect("candidate");
    assert_eq!(c.viva_1, 6);
    assert!(c.checked);
}

#[test]
fn invalid_marks_are_rejected_and_left_unchanged() {
    let f = fixture();
    let submission = GradingSubmission {
        marks: vec![
            (f.secondary_answer.clone(), MarkInput::Text("11".into())),
            (f.primary_answer.clone(), MarkInput::Text("abc".into())),
        ],
        ..Default::default()
    };
    let outcome =
        grading::submit_grades(&f.conn, &f.candidate_id, &submission).expect("submit");
    assert_eq!(outcome.rejected, 2);
    assert!(outcome.fields.iter().all(|r| r.reason.is_some()));
    assert_eq!(stored_marks(&f.conn, &f.secondary_answer), Some(4));
    assert_eq!(stored_marks(&f.conn, &f.primary_answer), None);
}

#[test]
fn same_value_is_reported_unchanged() {
    let f = fixture();
    let submission = GradingSubmission {
        marks: vec![(f.secondary_answer.clone(), MarkInput::Number(4.0))],
        checked: Some(false),
        ..Default::default()
    };
    let outcome =
        grading::submit_grades(&f.conn, &f.candidate_id, &submission).expect("submit");
    assert_eq!(outcome.unchanged, 2);
    assert_eq!(outcome.updated, 0);
}

#[test]
fn components_respect_configured_maxima() {
    let f = fixture();
    model::upsert_trade(&f.conn, "TTC", "TTC").expect("trade");
    model::upsert_exam_config(
        &f.conn,
        &ExamConfig {
            trade_code: "TTC".into(),
            exam_type: Section::Secondary.as_str().into(),
            theory_max: 50,
            practical_max: 30,
            viva_max: 20,
        },
    )
    .expect("config");

    let submission = GradingSubmission {
        components: vec![
            (Component::Viva2, MarkInput::Number(21.0)),
            (Component::Practical2, MarkInput::Number(30.0)),
            (Component::Practical1, MarkInput::Number(-1.0)),
            // No primary config: only the non-negative rule applies.
            (Component::Viva1, MarkInput::Number(80.0)),
        ],
        ..Default::default()
    };
    let outcome =
        grading::submit_grades(&f.conn, &f.candidate_id, &submission).expect("submit");
    assert_eq!(status_of(&outcome, "viva_2"), FieldStatus::Rejected);
    assert_eq!(status_of(&outcome, "practical_2"), FieldStatus::Updated);
    assert_eq!(status_of(&outcome, "practical_1"), FieldStatus::Rejected);
    assert_eq!(status_of(&outcome, "viva_1"), FieldStatus::Updated);
}

#[test]
fn unknown_candidate_is_an_error() {
    let f = fixture();
    let err = grading::submit_grades(&f.conn, "nope", &GradingSubmission::default())
        .expect_err("unknown candidate");
    assert!(matches!(err, GradingError::CandidateNotFound(_)));
}
