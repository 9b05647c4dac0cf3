use crate::calc::{self, CandidateTotals};
use crate::grading::{self, SectionSheet};
use crate::model::{self, Candidate, CANDIDATE_COLUMNS};
use rusqlite::Connection;
use serde::Serialize;

#[derive(Debug, Clone, Default)]
pub struct CandidateFilter {
    pub trade: Option<String>,
    pub district: Option<String>,
    pub state: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateRow {
    pub id: String,
    pub army_no: String,
    pub name: String,
    pub trade: String,
    pub total_primary: i64,
    pub total_secondary: i64,
    pub grand_total: i64,
    pub checked: bool,
}

fn non_empty(v: &Option<String>) -> Option<&str> {
    v.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// `%` and `_` in a search term match literally, escaped with a backslash.
fn like_pattern(term: &str) -> String {
    let mut out = String::with_capacity(term.len() + 2);
    out.push('%');
    for ch in term.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('%');
    out
}

pub fn list_candidates(
    conn: &Connection,
    filter: &CandidateFilter,
) -> rusqlite::Result<Vec<CandidateRow>> {
    let mut sql = format!("SELECT {} FROM candidates WHERE 1 = 1", CANDIDATE_COLUMNS);
    let mut args: Vec<String> = Vec::new();
    for (column, value) in [
        ("trade", &filter.trade),
        ("district", &filter.district),
        ("state", &filter.state),
    ] {
        if let Some(v) = non_empty(value) {
            sql.push_str(&format!(" AND lower(trim({})) = lower(?)", column));
            args.push(v.to_string());
        }
    }
    if let Some(q) = non_empty(&filter.search) {
        let searched = ["army_no", "name", "fathers_name", "district", "state", "trade"];
        let clauses: Vec<String> = searched
            .iter()
            .map(|c| format!("{} LIKE ? ESCAPE '\\'", c))
            .collect();
        sql.push_str(&format!(" AND ({})", clauses.join(" OR ")));
        let pattern = like_pattern(q);
        args.extend(searched.iter().map(|_| pattern.clone()));
    }
    sql.push_str(" ORDER BY army_no");

    let candidates: Vec<Candidate> = {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(rusqlite::params_from_iter(args.iter()), model::candidate_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows
    };

    let mut out = Vec::with_capacity(candidates.len());
    for c in candidates {
        let total_primary = calc::total_for_section(conn, &c.id, model::Section::Primary)?;
        let total_secondary = calc::total_for_section(conn, &c.id, model::Section::Secondary)?;
        out.push(CandidateRow {
            grand_total: calc::grand_total_of(&c, total_primary, total_secondary),
            total_primary,
            total_secondary,
            id: c.id,
            army_no: c.army_no,
            name: c.name,
            trade: c.trade,
            checked: c.checked,
        });
    }
    Ok(out)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateDetail {
    pub candidate: Candidate,
    pub primary: SectionSheet,
    pub secondary: SectionSheet,
    pub viva_total: i64,
    pub practical_total: i64,
    pub totals: CandidateTotals,
}

pub fn candidate_detail(conn: &Connection, id: &str) -> rusqlite::Result<Option<CandidateDetail>> {
    let Some(candidate) = model::get_candidate(conn, id)? else {
        return Ok(None);
    };
    let (primary, secondary) = grading::split_answers(conn, id)?;
    let totals = calc::candidate_totals(conn, &candidate)?;
    Ok(Some(CandidateDetail {
        viva_total: candidate.viva_total(),
        practical_total: candidate.practical_total(),
        candidate,
        primary,
        secondary,
        totals,
    }))
}
