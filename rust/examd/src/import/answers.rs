use super::reconcile::Outcome;
use crate::model::{Answer, Question};
use rusqlite::{Connection, OptionalExtension};
use uuid::Uuid;

/// Finds or creates the answer for (candidate, question).
///
/// `marks = None` carries no information: it leaves an existing mark in
/// place, so re-importing raw answers does not wipe grading. The row is only
/// written when the text or the effective mark differs.
pub fn merge_answer(
    conn: &Connection,
    candidate_id: &str,
    question: &Question,
    text: Option<&str>,
    marks: Option<i64>,
) -> rusqlite::Result<(Answer, Outcome)> {
    let text = text.map(str::trim).filter(|t| !t.is_empty()).map(str::to_string);

    let existing: Option<(String, Option<String>, Option<i64>)> = conn
        .query_row(
            "SELECT id, answer, marks_obt FROM answers WHERE candidate_id = ? AND question_id = ?",
            (candidate_id, &question.id),
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
        )
        .optional()?;

    let now = chrono::Utc::now().to_rfc3339();

    let Some((id, stored_text, stored_marks)) = existing else {
        let answer = Answer {
            id: Uuid::new_v4().to_string(),
            candidate_id: candidate_id.to_string(),
            question_id: question.id.clone(),
            answer: text,
            marks_obt: marks,
        };
        conn.execute(
            "INSERT INTO answers(id, candidate_id, question_id, answer, marks_obt, updated_at)
             VALUES(?, ?, ?, ?, ?, ?)",
            (
                &answer.id,
                &answer.candidate_id,
                &answer.question_id,
                &answer.answer,
                answer.marks_obt,
                &now,
            ),
        )?;
        return Ok((answer, Outcome::Created));
    };

    let marks = marks.or(stored_marks);
    let answer = Answer {
        id,
        candidate_id: candidate_id.to_string(),
        question_id: question.id.clone(),
        answer: text,
        marks_obt: marks,
    };
    if answer.answer == stored_text && answer.marks_obt == stored_marks {
        return Ok((answer, Outcome::Unchanged));
    }

    conn.execute(
        "UPDATE answers SET answer = ?, marks_obt = ?, updated_at = ? WHERE id = ?",
        (&answer.answer, answer.marks_obt, &now, &answer.id),
    )?;
    Ok((answer, Outcome::Updated))
}
