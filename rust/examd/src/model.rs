use rusqlite::{Connection, OptionalExtension, Row};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    Primary,
    Secondary,
}

impl Section {
    pub const ALL: [Section; 2] = [Section::Primary, Section::Secondary];

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "primary" => Some(Section::Primary),
            "secondary" => Some(Section::Secondary),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Section::Primary => "primary",
            Section::Secondary => "secondary",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Section::Primary => "Primary",
            Section::Secondary => "Secondary",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub id: String,
    pub army_no: String,
    pub s_no: Option<i64>,
    pub name: String,
    pub photo: String,
    pub fathers_name: String,
    pub dob: Option<String>,
    pub trade: String,
    pub rank: String,
    pub center: String,
    pub adhaar_no: String,
    pub name_of_qualification: String,
    pub duration_of_qualification: String,
    pub credits: i64,
    pub nsqf_level: i64,
    pub training_center: String,
    pub district: String,
    pub state: String,
    pub viva_1: i64,
    pub viva_2: i64,
    pub practical_1: i64,
    pub practical_2: i64,
    pub checked: bool,
}

impl Candidate {
    pub fn viva_total(&self) -> i64 {
        self.viva_1 + self.viva_2
    }

    pub fn practical_total(&self) -> i64 {
        self.practical_1 + self.practical_2
    }

    /// Viva and practical components that belong to one exam section:
    /// the `_1` pair goes with primary, the `_2` pair with secondary.
    pub fn section_components(&self, section: Section) -> (i64, i64) {
        match section {
            Section::Primary => (self.viva_1, self.practical_1),
            Section::Secondary => (self.viva_2, self.practical_2),
        }
    }
}

pub const CANDIDATE_COLUMNS: &str = "id, army_no, s_no, name, photo, fathers_name, dob, trade, rank, center,
     adhaar_no, name_of_qualification, duration_of_qualification, credits, nsqf_level,
     training_center, district, state, viva_1, viva_2, practical_1, practical_2, checked";

pub fn candidate_from_row(r: &Row<'_>) -> rusqlite::Result<Candidate> {
    Ok(Candidate {
        id: r.get(0)?,
        army_no: r.get(1)?,
        s_no: r.get(2)?,
        name: r.get(3)?,
        photo: r.get(4)?,
        fathers_name: r.get(5)?,
        dob: r.get(6)?,
        trade: r.get(7)?,
        rank: r.get(8)?,
        center: r.get(9)?,
        adhaar_no: r.get(10)?,
        name_of_qualification: r.get(11)?,
        duration_of_qualification: r.get(12)?,
        credits: r.get(13)?,
        nsqf_level: r.get(14)?,
        training_center: r.get(15)?,
        district: r.get(16)?,
        state: r.get(17)?,
        viva_1: r.get(18)?,
        viva_2: r.get(19)?,
        practical_1: r.get(20)?,
        practical_2: r.get(21)?,
        checked: r.get::<_, i64>(22)? != 0,
    })
}

pub fn get_candidate(conn: &Connection, id: &str) -> rusqlite::Result<Option<Candidate>> {
    conn.query_row(
        &format!("SELECT {} FROM candidates WHERE id = ?", CANDIDATE_COLUMNS),
        [id],
        candidate_from_row,
    )
    .optional()
}

pub fn get_candidate_by_army_no(
    conn: &Connection,
    army_no: &str,
) -> rusqlite::Result<Option<Candidate>> {
    conn.query_row(
        &format!("SELECT {} FROM candidates WHERE army_no = ?", CANDIDATE_COLUMNS),
        [army_no],
        candidate_from_row,
    )
    .optional()
}

pub fn list_candidates(conn: &Connection) -> rusqlite::Result<Vec<Candidate>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM candidates ORDER BY army_no",
        CANDIDATE_COLUMNS
    ))?;
    let rows = stmt
        .query_map([], candidate_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: String,
    pub exam_type: String,
    pub question: String,
    pub part: Option<String>,
    pub correct_answer: Option<String>,
    pub max_marks: i64,
}

pub const QUESTION_COLUMNS: &str = "id, exam_type, question, part, correct_answer, max_marks";

pub fn question_from_row(r: &Row<'_>) -> rusqlite::Result<Question> {
    let part: String = r.get(3)?;
    Ok(Question {
        id: r.get(0)?,
        exam_type: r.get(1)?,
        question: r.get(2)?,
        part: if part.is_empty() { None } else { Some(part) },
        correct_answer: r.get(4)?,
        max_marks: r.get(5)?,
    })
}

pub fn get_question(conn: &Connection, id: &str) -> rusqlite::Result<Option<Question>> {
    conn.query_row(
        &format!("SELECT {} FROM questions WHERE id = ?", QUESTION_COLUMNS),
        [id],
        question_from_row,
    )
    .optional()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    pub id: String,
    pub candidate_id: String,
    pub question_id: String,
    pub answer: Option<String>,
    pub marks_obt: Option<i64>,
}

/// An answer joined with the question it responds to.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerView {
    pub answer_id: String,
    pub question_id: String,
    pub exam_type: String,
    pub question: String,
    pub part: Option<String>,
    pub correct_answer: Option<String>,
    pub max_marks: i64,
    pub answer: Option<String>,
    pub marks_obt: Option<i64>,
}

impl AnswerView {
    pub fn section(&self) -> Option<Section> {
        Section::parse(&self.exam_type)
    }
}

pub fn candidate_answers(conn: &Connection, candidate_id: &str) -> rusqlite::Result<Vec<AnswerView>> {
    let mut stmt = conn.prepare(
        "SELECT a.id, q.id, q.exam_type, q.question, q.part, q.correct_answer, q.max_marks,
                a.answer, a.marks_obt
         FROM answers a
         JOIN questions q ON q.id = a.question_id
         WHERE a.candidate_id = ?
         ORDER BY q.rowid",
    )?;
    let rows = stmt
        .query_map([candidate_id], |r| {
            let part: String = r.get(4)?;
            Ok(AnswerView {
                answer_id: r.get(0)?,
                question_id: r.get(1)?,
                exam_type: r.get(2)?,
                question: r.get(3)?,
                part: if part.is_empty() { None } else { Some(part) },
                correct_answer: r.get(5)?,
                max_marks: r.get(6)?,
                answer: r.get(7)?,
                marks_obt: r.get(8)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamConfig {
    pub trade_code: String,
    pub exam_type: String,
    pub theory_max: i64,
    pub practical_max: i64,
    pub viva_max: i64,
}

impl ExamConfig {
    pub fn denominator(&self) -> i64 {
        self.theory_max + self.practical_max + self.viva_max
    }
}

/// Trade codes are matched ignoring case and surrounding whitespace.
pub fn exam_config_for(
    conn: &Connection,
    trade: &str,
    section: Section,
) -> rusqlite::Result<Option<ExamConfig>> {
    let trade = trade.trim();
    if trade.is_empty() {
        return Ok(None);
    }
    conn.query_row(
        "SELECT trade_code, exam_type, theory_max, practical_max, viva_max
         FROM exam_configs
         WHERE lower(trim(trade_code)) = lower(?) AND lower(exam_type) = ?",
        (trade, section.as_str()),
        |r| {
            Ok(ExamConfig {
                trade_code: r.get(0)?,
                exam_type: r.get(1)?,
                theory_max: r.get(2)?,
                practical_max: r.get(3)?,
                viva_max: r.get(4)?,
            })
        },
    )
    .optional()
}

pub fn list_exam_configs(conn: &Connection) -> rusqlite::Result<Vec<ExamConfig>> {
    let mut stmt = conn.prepare(
        "SELECT trade_code, exam_type, theory_max, practical_max, viva_max
         FROM exam_configs
         ORDER BY trade_code, exam_type",
    )?;
    let rows = stmt
        .query_map([], |r| {
            Ok(ExamConfig {
                trade_code: r.get(0)?,
                exam_type: r.get(1)?,
                theory_max: r.get(2)?,
                practical_max: r.get(3)?,
                viva_max: r.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn upsert_exam_config(conn: &Connection, cfg: &ExamConfig) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO exam_configs(id, trade_code, exam_type, theory_max, practical_max, viva_max)
         VALUES(?, ?, ?, ?, ?, ?)
         ON CONFLICT(trade_code, exam_type) DO UPDATE SET
           theory_max = excluded.theory_max,
           practical_max = excluded.practical_max,
           viva_max = excluded.viva_max",
        (
            uuid::Uuid::new_v4().to_string(),
            &cfg.trade_code,
            &cfg.exam_type,
            cfg.theory_max,
            cfg.practical_max,
            cfg.viva_max,
        ),
    )?;
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Trade {
    pub code: String,
    pub label: String,
}

pub fn list_trades(conn: &Connection) -> rusqlite::Result<Vec<Trade>> {
    let mut stmt = conn.prepare("SELECT code, label FROM trades ORDER BY sort_order, code")?;
    let rows = stmt
        .query_map([], |r| {
            Ok(Trade {
                code: r.get(0)?,
                label: r.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Stored spelling of a trade code, matched ignoring case.
pub fn canonical_trade_code(conn: &Connection, code: &str) -> rusqlite::Result<Option<String>> {
    conn.query_row(
        "SELECT code FROM trades WHERE lower(code) = lower(?)",
        [code.trim()],
        |r| r.get(0),
    )
    .optional()
}

/// New trades are appended after the existing ones; known codes only get
/// their label refreshed.
pub fn upsert_trade(conn: &Connection, code: &str, label: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO trades(code, label, sort_order)
         VALUES(?, ?, (SELECT COALESCE(MAX(sort_order) + 1, 0) FROM trades))
         ON CONFLICT(code) DO UPDATE SET label = excluded.label",
        (code.trim(), label.trim()),
    )?;
    Ok(())
}
