//! Tabular results handed to the report builder. Only values and header
//! text live here; cell styling belongs to the consumer.

use crate::calc::{self, SectionResult};
use crate::config::{ReportLayout, WorkspaceConfig};
use crate::db;
use crate::model::{self, Candidate, Section};
use rusqlite::Connection;
use serde::Serialize;
use serde_json::{json, Value};

const FLAT_HEADERS: [&str; 24] = [
    "s_no",
    "name",
    "fathers_name",
    "dob",
    "trade",
    "army_no",
    "adhaar_no",
    "name_of_qualification",
    "duration_of_qualification",
    "credits",
    "nsqf_level",
    "training_center",
    "district",
    "state",
    "viva_1",
    "viva_2",
    "practical_1",
    "practical_2",
    "exam_type",
    "question",
    "answer",
    "correct_answer",
    "max_marks",
    "marks_obt",
];

const IDENTITY_HEADERS: [&str; 8] = [
    "S No",
    "Army No",
    "Rank",
    "Name",
    "Father's Name",
    "Date of Birth",
    "Trade",
    "Center",
];

const SECTION_HEADERS: [&str; 5] = ["Theory", "Practical", "Viva", "Total", "Percentage"];

/// A header cell spanning `span` columns above the regular header row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeaderGroup {
    pub label: String,
    pub span: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Sheet {
    pub name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub header_groups: Vec<HeaderGroup>,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultsWorkbook {
    pub layout: ReportLayout,
    pub sheets: Vec<Sheet>,
}

const LAYOUT_SETTING: &str = "results.layout";

/// An explicit request wins, then the layout stored in the workspace, then
/// the config file.
pub fn resolve_layout(
    conn: &Connection,
    cfg: &WorkspaceConfig,
    requested: Option<ReportLayout>,
) -> anyhow::Result<ReportLayout> {
    if let Some(layout) = requested {
        return Ok(layout);
    }
    let stored = db::settings_get_json(conn, LAYOUT_SETTING)?
        .and_then(|v| v.as_str().and_then(ReportLayout::parse));
    Ok(stored.unwrap_or(cfg.report.layout))
}

pub fn store_layout(conn: &Connection, layout: ReportLayout) -> anyhow::Result<()> {
    db::settings_set_json(conn, LAYOUT_SETTING, &json!(layout.as_str()))
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

pub fn build_results(
    conn: &Connection,
    cfg: &WorkspaceConfig,
    layout: ReportLayout,
) -> rusqlite::Result<ResultsWorkbook> {
    let sheets = match layout {
        ReportLayout::Flat => vec![flat_sheet(conn)?],
        ReportLayout::Statements => statement_sheets(conn, cfg)?,
    };
    Ok(ResultsWorkbook { layout, sheets })
}

fn flat_sheet(conn: &Connection) -> rusqlite::Result<Sheet> {
    let mut stmt = conn.prepare(
        "SELECT c.s_no, c.name, c.fathers_name, c.dob, c.trade, c.army_no, c.adhaar_no,
                c.name_of_qualification, c.duration_of_qualification, c.credits, c.nsqf_level,
                c.training_center, c.district, c.state, c.viva_1, c.viva_2,
                c.practical_1, c.practical_2,
                q.exam_type, q.question, a.answer, q.correct_answer, q.max_marks, a.marks_obt
         FROM answers a
         JOIN candidates c ON c.id = a.candidate_id
         JOIN questions q ON q.id = a.question_id
         ORDER BY c.army_no, q.rowid",
    )?;
    let rows = stmt
        .query_map([], |r| {
            let mut row = Vec::with_capacity(FLAT_HEADERS.len());
            for i in 0..FLAT_HEADERS.len() {
                let v = match r.get_ref(i)? {
                    rusqlite::types::ValueRef::Null => Value::Null,
                    rusqlite::types::ValueRef::Integer(n) => json!(n),
                    rusqlite::types::ValueRef::Real(f) => json!(f),
                    rusqlite::types::ValueRef::Text(t) => {
                        json!(String::from_utf8_lossy(t).to_string())
                    }
                    rusqlite::types::ValueRef::Blob(_) => Value::Null,
                };
                row.push(v);
            }
            Ok(row)
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Sheet {
        name: "Results".to_string(),
        header_groups: Vec::new(),
        headers: strings(&FLAT_HEADERS),
        rows,
    })
}

fn identity_cells(c: &Candidate, cfg: &WorkspaceConfig) -> Vec<Value> {
    let center = cfg.center_label(&c.center).unwrap_or(&c.center);
    vec![
        json!(c.s_no),
        json!(c.army_no),
        json!(c.rank),
        json!(c.name),
        json!(c.fathers_name),
        json!(c.dob),
        json!(c.trade),
        json!(center),
    ]
}

fn section_cells(r: &SectionResult) -> Vec<Value> {
    vec![
        json!(r.theory),
        json!(r.practical),
        json!(r.viva),
        json!(r.total),
        json!(r.percentage),
    ]
}

fn statement_sheets(conn: &Connection, cfg: &WorkspaceConfig) -> rusqlite::Result<Vec<Sheet>> {
    let candidates = model::list_candidates(conn)?;

    let mut section_rows: [Vec<Vec<Value>>; 2] = [Vec::new(), Vec::new()];
    let mut combined_rows = Vec::with_capacity(candidates.len());
    for c in &candidates {
        let totals = calc::candidate_totals(conn, c)?;
        for (i, section) in Section::ALL.iter().enumerate() {
            let result = match section {
                Section::Primary => &totals.primary,
                Section::Secondary => &totals.secondary,
            };
            let mut row = identity_cells(c, cfg);
            row.extend(section_cells(result));
            section_rows[i].push(row);
        }
        let mut row = identity_cells(c, cfg);
        row.extend(section_cells(&totals.primary));
        row.extend(section_cells(&totals.secondary));
        row.push(json!(totals.grand_total));
        combined_rows.push(row);
    }

    let mut sheets = Vec::with_capacity(3);
    for (section, rows) in Section::ALL.iter().zip(section_rows) {
        let mut headers = strings(&IDENTITY_HEADERS);
        headers.extend(strings(&SECTION_HEADERS));
        sheets.push(Sheet {
            name: format!("{} Statement", section.title()),
            header_groups: Vec::new(),
            headers,
            rows,
        });
    }

    let mut headers = strings(&IDENTITY_HEADERS);
    headers.extend(strings(&SECTION_HEADERS));
    headers.extend(strings(&SECTION_HEADERS));
    headers.push("Grand Total".to_string());
    sheets.push(Sheet {
        name: "Combined Results".to_string(),
        header_groups: vec![
            HeaderGroup {
                label: String::new(),
                span: IDENTITY_HEADERS.len(),
            },
            HeaderGroup {
                label: Section::Primary.title().to_string(),
                span: SECTION_HEADERS.len(),
            },
            HeaderGroup {
                label: Section::Secondary.title().to_string(),
                span: SECTION_HEADERS.len(),
            },
            HeaderGroup {
                label: String::new(),
                span: 1,
            },
        ],
        headers,
        rows: combined_rows,
    });
    Ok(sheets)
}
