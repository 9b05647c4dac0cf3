use super::row::{cell, Row};
use crate::error::RowError;
use crate::model::{self, Candidate, Question, Section};
use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Created,
    Updated,
    Unchanged,
}

impl Outcome {
    pub fn created(self) -> bool {
        self == Outcome::Created
    }
}

/// Candidate attributes carried by one import row. `None` means the cell was
/// blank, which never erases a stored value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidateAttrs {
    pub s_no: Option<i64>,
    pub name: Option<String>,
    pub photo: Option<String>,
    pub fathers_name: Option<String>,
    pub dob: Option<NaiveDate>,
    pub trade: Option<String>,
    pub rank: Option<String>,
    pub center: Option<String>,
    pub adhaar_no: Option<String>,
    pub name_of_qualification: Option<String>,
    pub duration_of_qualification: Option<String>,
    pub credits: Option<i64>,
    pub nsqf_level: Option<i64>,
    pub training_center: Option<String>,
    pub district: Option<String>,
    pub state: Option<String>,
    pub viva_1: Option<i64>,
    pub viva_2: Option<i64>,
    pub practical_1: Option<i64>,
    pub practical_2: Option<i64>,
}

impl CandidateAttrs {
    pub fn from_row(row: &Row) -> Result<Self, RowError> {
        let text = |f: &str| cell(row, f).text();
        let int = |f: &str| cell(row, f).int(f);
        Ok(Self {
            s_no: int("s_no")?,
            name: text("name"),
            photo: text("photo"),
            fathers_name: text("fathers_name"),
            dob: cell(row, "dob").date("dob")?,
            trade: text("trade"),
            rank: text("rank"),
            center: text("center"),
            adhaar_no: text("adhaar_no"),
            name_of_qualification: text("name_of_qualification"),
            duration_of_qualification: text("duration_of_qualification"),
            credits: int("credits")?,
            nsqf_level: int("nsqf_level")?,
            training_center: text("training_center"),
            district: text("district"),
            state: text("state"),
            viva_1: non_negative("viva_1", int("viva_1")?)?,
            viva_2: non_negative("viva_2", int("viva_2")?)?,
            practical_1: non_negative("practical_1", int("practical_1")?)?,
            practical_2: non_negative("practical_2", int("practical_2")?)?,
        })
    }
}

fn non_negative(column: &str, v: Option<i64>) -> Result<Option<i64>, RowError> {
    match v {
        Some(n) if n < 0 => Err(RowError::InvalidValue {
            column: column.to_string(),
            value: n.to_string(),
        }),
        other => Ok(other),
    }
}

fn merge_text(slot: &mut String, incoming: &Option<String>) -> bool {
    match incoming {
        Some(v) if slot != v => {
            *slot = v.clone();
            true
        }
        _ => false,
    }
}

fn merge_int(slot: &mut i64, incoming: Option<i64>) -> bool {
    match incoming {
        Some(v) if *slot != v => {
            *slot = v;
            true
        }
        _ => false,
    }
}

fn merge_opt<T: PartialEq + Clone>(slot: &mut Option<T>, incoming: &Option<T>) -> bool {
    match incoming {
        Some(v) if slot.as_ref() != Some(v) => {
            *slot = Some(v.clone());
            true
        }
        _ => false,
    }
}

fn apply_attrs(c: &mut Candidate, a: &CandidateAttrs) -> bool {
    let dob = a.dob.map(|d| d.format("%Y-%m-%d").to_string());
    // Every merge must run; `|` does not short-circuit.
    merge_opt(&mut c.s_no, &a.s_no)
        | merge_text(&mut c.name, &a.name)
        | merge_text(&mut c.photo, &a.photo)
        | merge_text(&mut c.fathers_name, &a.fathers_name)
        | merge_opt(&mut c.dob, &dob)
        | merge_text(&mut c.trade, &a.trade)
        | merge_text(&mut c.rank, &a.rank)
        | merge_text(&mut c.center, &a.center)
        | merge_text(&mut c.adhaar_no, &a.adhaar_no)
        | merge_text(&mut c.name_of_qualification, &a.name_of_qualification)
        | merge_text(&mut c.duration_of_qualification, &a.duration_of_qualification)
        | merge_int(&mut c.credits, a.credits)
        | merge_int(&mut c.nsqf_level, a.nsqf_level)
        | merge_text(&mut c.training_center, &a.training_center)
        | merge_text(&mut c.district, &a.district)
        | merge_text(&mut c.state, &a.state)
        | merge_int(&mut c.viva_1, a.viva_1)
        | merge_int(&mut c.viva_2, a.viva_2)
        | merge_int(&mut c.practical_1, a.practical_1)
        | merge_int(&mut c.practical_2, a.practical_2)
}

fn write_candidate(conn: &Connection, c: &Candidate, insert: bool) -> rusqlite::Result<()> {
    let sql = if insert {
        "INSERT INTO candidates(
            s_no, name, photo, fathers_name, dob, trade, rank, center, adhaar_no,
            name_of_qualification, duration_of_qualification, credits, nsqf_level,
            training_center, district, state, viva_1, viva_2, practical_1, practical_2,
            checked, updated_at, id, army_no)
         VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24)"
    } else {
        "UPDATE candidates SET
            s_no = ?1, name = ?2, photo = ?3, fathers_name = ?4, dob = ?5, trade = ?6,
            rank = ?7, center = ?8, adhaar_no = ?9, name_of_qualification = ?10,
            duration_of_qualification = ?11, credits = ?12, nsqf_level = ?13,
            training_center = ?14, district = ?15, state = ?16, viva_1 = ?17, viva_2 = ?18,
            practical_1 = ?19, practical_2 = ?20, checked = ?21, updated_at = ?22
         WHERE id = ?23 AND army_no = ?24"
    };
    let now = chrono::Utc::now().to_rfc3339();
    conn.execute(
        sql,
        rusqlite::params![
            c.s_no,
            c.name,
            c.photo,
            c.fathers_name,
            c.dob,
            c.trade,
            c.rank,
            c.center,
            c.adhaar_no,
            c.name_of_qualification,
            c.duration_of_qualification,
            c.credits,
            c.nsqf_level,
            c.training_center,
            c.district,
            c.state,
            c.viva_1,
            c.viva_2,
            c.practical_1,
            c.practical_2,
            c.checked as i64,
            now,
            c.id,
            c.army_no,
        ],
    )?;
    Ok(())
}

/// Finds a candidate by army number or creates it. Existing candidates only
/// take incoming values that are present and different.
pub fn reconcile_candidate(
    conn: &Connection,
    army_no: &str,
    attrs: &CandidateAttrs,
) -> rusqlite::Result<(Candidate, Outcome)> {
    let army_no = army_no.trim();
    if let Some(mut existing) = model::get_candidate_by_army_no(conn, army_no)? {
        if apply_attrs(&mut existing, attrs) {
            write_candidate(conn, &existing, false)?;
            log::debug!("candidate {} updated", army_no);
            return Ok((existing, Outcome::Updated));
        }
        return Ok((existing, Outcome::Unchanged));
    }

    let mut created = Candidate {
        id: Uuid::new_v4().to_string(),
        army_no: army_no.to_string(),
        s_no: None,
        name: String::new(),
        photo: String::new(),
        fathers_name: String::new(),
        dob: None,
        trade: String::new(),
        rank: String::new(),
        center: String::new(),
        adhaar_no: String::new(),
        name_of_qualification: String::new(),
        duration_of_qualification: String::new(),
        credits: 0,
        nsqf_level: 0,
        training_center: String::new(),
        district: String::new(),
        state: String::new(),
        viva_1: 0,
        viva_2: 0,
        practical_1: 0,
        practical_2: 0,
        checked: false,
    };
    apply_attrs(&mut created, attrs);
    write_candidate(conn, &created, true)?;
    log::debug!("candidate {} created", army_no);
    Ok((created, Outcome::Created))
}

/// Correct-answer cells sometimes carry a literal "null".
pub fn normalize_correct_answer(raw: Option<&str>) -> Option<String> {
    let t = raw?.trim();
    if t.is_empty() || t.eq_ignore_ascii_case("null") {
        None
    } else {
        Some(t.to_string())
    }
}

/// Part labels are single letters A-F; `"(b)"` and `" b "` read as `B`.
pub fn normalize_part(raw: Option<&str>) -> Result<Option<String>, RowError> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let t = raw
        .trim()
        .trim_start_matches('(')
        .trim_end_matches(')')
        .trim()
        .to_ascii_uppercase();
    if t.is_empty() {
        return Ok(None);
    }
    match t.as_str() {
        "A" | "B" | "C" | "D" | "E" | "F" => Ok(Some(t)),
        _ => Err(RowError::InvalidValue {
            column: "part".to_string(),
            value: raw.to_string(),
        }),
    }
}

fn find_question(
    conn: &Connection,
    section: Section,
    text: &str,
    part: &str,
) -> rusqlite::Result<Option<Question>> {
    conn.query_row(
        &format!(
            "SELECT {} FROM questions WHERE exam_type = ? AND question = ? AND part = ?",
            model::QUESTION_COLUMNS
        ),
        (section.as_str(), text, part),
        model::question_from_row,
    )
    .optional()
}

fn highest_stored_mark(conn: &Connection, question_id: &str) -> rusqlite::Result<Option<i64>> {
    conn.query_row(
        "SELECT MAX(marks_obt) FROM answers WHERE question_id = ?",
        [question_id],
        |r| r.get(0),
    )
}

fn parted_questions(conn: &Connection, section: Section, text: &str) -> rusqlite::Result<Vec<Question>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM questions WHERE exam_type = ? AND question = ? AND part <> ''",
        model::QUESTION_COLUMNS
    ))?;
    let rows = stmt
        .query_map((section.as_str(), text), model::question_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Finds or creates the question identified by (section, text, part) and
/// then overwrites its correct answer and max marks with the incoming ones.
/// A missing `max_marks` keeps the stored maximum (0 for a new question).
/// Lowering the maximum below a mark already stored for the question fails
/// with [`RowError::MarksOutOfRange`].
///
/// Matching when the identity is incomplete:
/// - a row without a part matches the part-less question, or the only
///   parted question with the same text;
/// - a row with a part that has no exact match refines the part-less
///   question in place, provided no parted sibling exists yet.
pub fn reconcile_question(
    conn: &Connection,
    section: Section,
    text: &str,
    correct_answer: Option<&str>,
    max_marks: Option<i64>,
    part: Option<&str>,
) -> Result<Question, RowError> {
    let text = text.trim();
    let correct = normalize_correct_answer(correct_answer);
    let part = part.map(str::trim).filter(|p| !p.is_empty());

    let found = match part {
        Some(p) => match find_question(conn, section, text, p)? {
            Some(q) => Some(q),
            None if parted_questions(conn, section, text)?.is_empty() => {
                find_question(conn, section, text, "")?
            }
            None => None,
        },
        None => match find_question(conn, section, text, "")? {
            Some(q) => Some(q),
            None => {
                let mut parted = parted_questions(conn, section, text)?;
                if parted.len() == 1 {
                    parted.pop()
                } else {
                    None
                }
            }
        },
    };

    let Some(mut q) = found else {
        let q = Question {
            id: Uuid::new_v4().to_string(),
            exam_type: section.as_str().to_string(),
            question: text.to_string(),
            part: part.map(str::to_string),
            correct_answer: correct,
            max_marks: max_marks.unwrap_or(0),
        };
        conn.execute(
            "INSERT INTO questions(id, exam_type, question, part, correct_answer, max_marks)
             VALUES(?, ?, ?, ?, ?, ?)",
            (
                &q.id,
                &q.exam_type,
                &q.question,
                q.part.as_deref().unwrap_or(""),
                &q.correct_answer,
                q.max_marks,
            ),
        )?;
        log::debug!("question created: {} {:?}", section.as_str(), q.part);
        return Ok(q);
    };

    // Last write wins for the answer key and marks; part only moves forward.
    let new_part = part.map(str::to_string).or_else(|| q.part.clone());
    let max_marks = max_marks.unwrap_or(q.max_marks);
    if max_marks < q.max_marks {
        if let Some(highest) = highest_stored_mark(conn, &q.id)? {
            if highest > max_marks {
                return Err(RowError::MarksOutOfRange {
                    marks: highest,
                    max_marks,
                });
            }
        }
    }
    if q.correct_answer != correct || q.max_marks != max_marks || q.part != new_part {
        q.correct_answer = correct;
        q.max_marks = max_marks;
        q.part = new_part;
        conn.execute(
            "UPDATE questions SET correct_answer = ?, max_marks = ?, part = ? WHERE id = ?",
            (
                &q.correct_answer,
                q.max_marks,
                q.part.as_deref().unwrap_or(""),
                &q.id,
            ),
        )?;
    }
    Ok(q)
}
