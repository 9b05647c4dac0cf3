use super::answers::merge_answer;
use super::normalize::missing_required;
use super::reconcile::{self, CandidateAttrs, Outcome};
use super::row::{cell, Row, RowBatch};
use crate::error::{ImportError, RowError};
use crate::model::{self, Question, Section};
use rusqlite::Connection;
use serde::Serialize;
use std::collections::HashSet;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub rows_seen: usize,
    pub rows_skipped: usize,
    pub candidates_created: usize,
    pub candidates_updated: usize,
    pub questions_created: usize,
    pub answers_created: usize,
    pub answers_updated: usize,
}

impl ImportSummary {
    pub fn message(&self) -> String {
        format!(
            "Import complete. Candidates: +{} / updated {}. Questions: +{}. Answers: +{} / updated {}.",
            self.candidates_created,
            self.candidates_updated,
            self.questions_created,
            self.answers_created,
            self.answers_updated
        )
    }
}

/// Per-batch bookkeeping. Sets rather than counters so that a candidate or
/// question touched by many rows is counted once.
struct Tally {
    questions_before: HashSet<String>,
    questions_created: HashSet<String>,
    candidates_created: HashSet<String>,
    candidates_updated: HashSet<String>,
    answers_created: usize,
    answers_updated: usize,
    rows_skipped: usize,
    unknown_trades: HashSet<String>,
}

fn existing_question_ids(conn: &Connection) -> rusqlite::Result<HashSet<String>> {
    let mut stmt = conn.prepare("SELECT id FROM questions")?;
    let ids = stmt
        .query_map([], |r| r.get::<_, String>(0))?
        .collect::<Result<HashSet<_>, _>>()?;
    Ok(ids)
}

/// Imports a whole batch in one transaction. Any row failure rolls back
/// every change made by the batch.
pub fn import_batch(conn: &Connection, batch: &RowBatch) -> Result<ImportSummary, ImportError> {
    let missing = missing_required(&batch.columns);
    if !missing.is_empty() {
        return Err(ImportError::MissingColumns { columns: missing });
    }

    let tx = conn.unchecked_transaction()?;
    let mut tally = Tally {
        questions_before: existing_question_ids(&tx)?,
        questions_created: HashSet::new(),
        candidates_created: HashSet::new(),
        candidates_updated: HashSet::new(),
        answers_created: 0,
        answers_updated: 0,
        rows_skipped: 0,
        unknown_trades: HashSet::new(),
    };

    for (i, row) in batch.rows.iter().enumerate() {
        // Dropping `tx` on the error path rolls the batch back.
        import_row(&tx, row, &mut tally)
            .map_err(|source| ImportError::ImportFailed { row: i + 1, source })?;
    }
    tx.commit()?;

    let summary = ImportSummary {
        rows_seen: batch.rows.len(),
        rows_skipped: tally.rows_skipped,
        candidates_created: tally.candidates_created.len(),
        candidates_updated: tally
            .candidates_updated
            .difference(&tally.candidates_created)
            .count(),
        questions_created: tally.questions_created.len(),
        answers_created: tally.answers_created,
        answers_updated: tally.answers_updated,
    };
    log::info!("{}", summary.message());
    Ok(summary)
}

fn import_row(conn: &Connection, row: &Row, tally: &mut Tally) -> Result<(), RowError> {
    let Some(army_no) = cell(row, "army_no").text() else {
        tally.rows_skipped += 1;
        log::debug!("row without army_no skipped");
        return Ok(());
    };

    let attrs = CandidateAttrs::from_row(row)?;
    if let Some(trade) = &attrs.trade {
        if !tally.unknown_trades.contains(trade)
            && model::canonical_trade_code(conn, trade)?.is_none()
        {
            log::warn!("trade {:?} is not in the trade list", trade);
            tally.unknown_trades.insert(trade.clone());
        }
    }
    let (candidate, outcome) = reconcile::reconcile_candidate(conn, &army_no, &attrs)?;
    match outcome {
        Outcome::Created => {
            tally.candidates_created.insert(candidate.id.clone());
        }
        Outcome::Updated => {
            tally.candidates_updated.insert(candidate.id.clone());
        }
        Outcome::Unchanged => {}
    }

    // Roster-only rows carry no question reference.
    let Some(question) = resolve_question(conn, row)? else {
        return Ok(());
    };
    if !tally.questions_before.contains(&question.id) {
        tally.questions_created.insert(question.id.clone());
    }

    let marks = cell(row, "marks_obt").int("marks_obt")?;
    if let Some(m) = marks {
        if m < 0 || m > question.max_marks {
            return Err(RowError::MarksOutOfRange {
                marks: m,
                max_marks: question.max_marks,
            });
        }
    }

    let text = cell(row, "answer").text();
    let (_, outcome) = merge_answer(conn, &candidate.id, &question, text.as_deref(), marks)?;
    match outcome {
        Outcome::Created => tally.answers_created += 1,
        Outcome::Updated => tally.answers_updated += 1,
        Outcome::Unchanged => {}
    }
    Ok(())
}

/// A `question_id` naming an existing question is used as is; anything else
/// is reconciled by section, text and part.
fn resolve_question(conn: &Connection, row: &Row) -> Result<Option<Question>, RowError> {
    let reference = cell(row, "question_id").text();
    let text = cell(row, "question").text();

    if let Some(r) = &reference {
        if let Some(q) = model::get_question(conn, r)? {
            return Ok(Some(q));
        }
    }
    let Some(text) = text else {
        return match reference {
            Some(r) => Err(RowError::UnmatchedQuestion(r)),
            None => Ok(None),
        };
    };

    let raw_section = cell(row, "exam_type").text().unwrap_or_default();
    let section =
        Section::parse(&raw_section).ok_or(RowError::InvalidSection(raw_section.clone()))?;
    let max_marks = cell(row, "max_marks").int("max_marks")?;
    if let Some(m) = max_marks.filter(|m| *m < 0) {
        return Err(RowError::InvalidValue {
            column: "max_marks".to_string(),
            value: m.to_string(),
        });
    }
    let part = reconcile::normalize_part(cell(row, "part").text().as_deref())?;
    let correct = cell(row, "correct_answer").text();

    let q = reconcile::reconcile_question(
        conn,
        section,
        &text,
        correct.as_deref(),
        max_marks,
        part.as_deref(),
    )?;
    Ok(Some(q))
}
