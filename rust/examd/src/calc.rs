use crate::model::{self, Candidate, ExamConfig, Section};
use rusqlite::Connection;
use serde::Serialize;

/// Two-decimal rounding used for displayed percentages.
pub fn round_2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Sum of obtained marks for one section; ungraded answers count as 0.
pub fn total_for_section(
    conn: &Connection,
    candidate_id: &str,
    section: Section,
) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COALESCE(SUM(COALESCE(a.marks_obt, 0)), 0)
         FROM answers a
         JOIN questions q ON q.id = a.question_id
         WHERE a.candidate_id = ? AND lower(q.exam_type) = ?",
        (candidate_id, section.as_str()),
        |r| r.get(0),
    )
}

/// Grand total from already-computed section totals.
pub fn grand_total_of(candidate: &Candidate, primary: i64, secondary: i64) -> i64 {
    primary + secondary + candidate.viva_total() + candidate.practical_total()
}

pub fn grand_total(conn: &Connection, candidate: &Candidate) -> rusqlite::Result<i64> {
    let primary = total_for_section(conn, &candidate.id, Section::Primary)?;
    let secondary = total_for_section(conn, &candidate.id, Section::Secondary)?;
    Ok(grand_total_of(candidate, primary, secondary))
}

/// `obtained` as a percentage of the configured maxima. No config, or
/// maxima summing to zero, gives 0.
pub fn percentage_of(obtained: i64, cfg: Option<&ExamConfig>) -> f64 {
    let Some(cfg) = cfg else {
        return 0.0;
    };
    let denom = cfg.denominator();
    if denom <= 0 {
        return 0.0;
    }
    100.0 * (obtained as f64) / (denom as f64)
}

/// Section theory plus the section's own viva and practical component,
/// against the candidate's trade config for that section.
pub fn percentage(
    conn: &Connection,
    candidate: &Candidate,
    section: Section,
) -> rusqlite::Result<f64> {
    let cfg = model::exam_config_for(conn, &candidate.trade, section)?;
    let theory = total_for_section(conn, &candidate.id, section)?;
    let (viva, practical) = candidate.section_components(section);
    Ok(percentage_of(theory + viva + practical, cfg.as_ref()))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionResult {
    pub theory: i64,
    pub practical: i64,
    pub viva: i64,
    pub total: i64,
    pub percentage: f64,
    pub configured: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateTotals {
    pub total_primary: i64,
    pub total_secondary: i64,
    pub viva_total: i64,
    pub practical_total: i64,
    pub grand_total: i64,
    pub primary: SectionResult,
    pub secondary: SectionResult,
}

pub fn section_result(
    conn: &Connection,
    candidate: &Candidate,
    section: Section,
) -> rusqlite::Result<SectionResult> {
    let cfg = model::exam_config_for(conn, &candidate.trade, section)?;
    let theory = total_for_section(conn, &candidate.id, section)?;
    let (viva, practical) = candidate.section_components(section);
    let total = theory + viva + practical;
    Ok(SectionResult {
        theory,
        practical,
        viva,
        total,
        percentage: round_2(percentage_of(total, cfg.as_ref())),
        configured: cfg.is_some(),
    })
}

pub fn candidate_totals(conn: &Connection, candidate: &Candidate) -> rusqlite::Result<CandidateTotals> {
    let primary = section_result(conn, candidate, Section::Primary)?;
    let secondary = section_result(conn, candidate, Section::Secondary)?;
    Ok(CandidateTotals {
        total_primary: primary.theory,
        total_secondary: secondary.theory,
        viva_total: candidate.viva_total(),
        practical_total: candidate.practical_total(),
        grand_total: grand_total_of(candidate, primary.theory, secondary.theory),
        primary,
        secondary,
    })
}

/// Accepted answers from a comma-separated key, trimmed and lower-cased.
pub fn accepted_tokens(correct_answer: &str) -> Vec<String> {
    correct_answer
        .split(',')
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

pub fn answer_matches(answer: &str, correct_answer: &str) -> bool {
    let given = answer.trim().to_lowercase();
    if given.is_empty() {
        return false;
    }
    accepted_tokens(correct_answer).iter().any(|t| *t == given)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AutoMarkPolicy {
    /// Treat a stored 0 like an ungraded answer (older workspaces).
    pub zero_counts_as_ungraded: bool,
}

/// Awards full marks to ungraded answers that exactly match one of the
/// question's accepted tokens. Never lowers a mark and never touches a
/// graded answer. Returns how many answers were marked.
pub fn auto_mark(
    conn: &Connection,
    candidate_id: Option<&str>,
    policy: AutoMarkPolicy,
) -> rusqlite::Result<usize> {
    let grade_filter = if policy.zero_counts_as_ungraded {
        "(a.marks_obt IS NULL OR a.marks_obt = 0)"
    } else {
        "a.marks_obt IS NULL"
    };
    let sql = format!(
        "SELECT a.id, a.answer, q.correct_answer, q.max_marks
         FROM answers a
         JOIN questions q ON q.id = a.question_id
         WHERE {} AND a.answer IS NOT NULL AND q.correct_answer IS NOT NULL
           AND (?1 IS NULL OR a.candidate_id = ?1)",
        grade_filter
    );

    let tx = conn.unchecked_transaction()?;
    let matches: Vec<(String, i64)> = {
        let mut stmt = tx.prepare(&sql)?;
        let rows = stmt
            .query_map([candidate_id], |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, String>(2)?,
                    r.get::<_, i64>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter()
            .filter(|(_, answer, correct, _)| answer_matches(answer, correct))
            .map(|(id, _, _, max)| (id, max))
            .collect()
    };

    let now = chrono::Utc::now().to_rfc3339();
    for (id, max_marks) in &matches {
        tx.execute(
            "UPDATE answers SET marks_obt = ?, updated_at = ? WHERE id = ?",
            (max_marks, &now, id),
        )?;
    }
    tx.commit()?;

    if !matches.is_empty() {
        log::info!("auto-marked {} answers", matches.len());
    }
    Ok(matches.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(theory: i64, practical: i64, viva: i64) -> ExamConfig {
        ExamConfig {
            trade_code: "TTC".into(),
            exam_type: "primary".into(),
            theory_max: theory,
            practical_max: practical,
            viva_max: viva,
        }
    }

    #[test]
    fn percentage_guards_missing_config_and_zero_denominator() {
        assert_eq!(percentage_of(40, None), 0.0);
        assert_eq!(percentage_of(40, Some(&cfg(0, 0, 0))), 0.0);
        assert_eq!(percentage_of(75, Some(&cfg(50, 30, 20))), 75.0);
    }

    #[test]
    fn tokens_split_on_commas_ignoring_case_and_space() {
        assert_eq!(accepted_tokens(" B, c ,,D"), vec!["b", "c", "d"]);
        assert!(answer_matches(" b ", "b,c"));
        assert!(answer_matches("C", "b,c"));
        assert!(!answer_matches("bc", "b,c"));
        assert!(!answer_matches("", "b,c"));
    }

    #[test]
    fn round_2_keeps_two_decimals() {
        assert_eq!(round_2(66.66666), 66.67);
        assert_eq!(round_2(10.0), 10.0);
    }
}
