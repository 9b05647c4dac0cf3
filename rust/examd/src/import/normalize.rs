use super::row::{Cell, Row};
use crate::error::ImportError;
use std::collections::{BTreeSet, HashMap};

pub const REQUIRED_FIELDS: [&str; 4] = ["army_no", "exam_type", "question", "answer"];

/// Accepted spellings per canonical field, most preferred first. Labels are
/// matched after [`normalize_label`].
const ALIASES: &[(&str, &[&str])] = &[
    (
        "army_no",
        &[
            "army_no",
            "army_number",
            "armyno",
            "armynumber",
            "identifier",
            "enrollment_no",
            "enrolment_no",
        ],
    ),
    ("s_no", &["s_no", "sl_no", "serial_no", "sr_no"]),
    ("name", &["name", "candidate_name"]),
    ("fathers_name", &["fathers_name", "father's_name", "father_name"]),
    ("dob", &["dob", "date_of_birth", "birth_date"]),
    ("trade", &["trade", "category"]),
    ("center", &["center", "centre", "exam_center", "exam_centre"]),
    ("training_center", &["training_center", "training_centre"]),
    ("adhaar_no", &["adhaar_no", "aadhaar_no", "aadhar_no"]),
    ("exam_type", &["exam_type", "examtype", "section", "paper"]),
    ("question", &["question", "question_text", "qtext"]),
    (
        "question_id",
        &["question_id", "qid", "question_no", "question_number", "q_no"],
    ),
    ("answer", &["answer", "response", "candidate_answer"]),
    ("correct_answer", &["correct_answer", "answer_key", "correct"]),
    ("max_marks", &["max_marks", "maximum_marks", "max_mark"]),
    ("marks_obt", &["marks_obt", "marks_obtained", "marks"]),
    ("part", &["part", "question_part"]),
];

/// Lower-cases and trims a header label and turns spaces and periods into
/// single underscores: `"S. No."` becomes `s_no`.
pub fn normalize_label(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.trim().to_lowercase().chars() {
        let ch = if ch == ' ' || ch == '.' { '_' } else { ch };
        if ch == '_' && out.ends_with('_') {
            continue;
        }
        out.push(ch);
    }
    out.trim_matches('_').to_string()
}

/// Canonical field for a normalised label and the label's rank among that
/// field's aliases. Unknown labels map to themselves with the lowest rank.
fn resolve_alias(label: &str) -> (String, usize) {
    for (field, aliases) in ALIASES {
        if let Some(rank) = aliases.iter().position(|a| *a == label) {
            return (field.to_string(), rank);
        }
    }
    (label.to_string(), usize::MAX)
}

pub fn canonical_field(raw_label: &str) -> String {
    resolve_alias(&normalize_label(raw_label)).0
}

/// Required fields absent from `columns`. A `question_id` reference stands
/// in for question text.
pub fn missing_required<S: AsRef<str>>(columns: &[S]) -> Vec<String> {
    let present: BTreeSet<&str> = columns.iter().map(|c| c.as_ref()).collect();
    REQUIRED_FIELDS
        .iter()
        .filter(|f| {
            if **f == "question" && present.contains("question_id") {
                return false;
            }
            !present.contains(**f)
        })
        .map(|f| f.to_string())
        .collect()
}

/// Column positions resolved from a header row.
#[derive(Debug, Clone)]
pub struct HeaderMap {
    fields: Vec<(usize, String)>,
}

impl HeaderMap {
    pub fn columns(&self) -> Vec<String> {
        self.fields.iter().map(|(_, f)| f.clone()).collect()
    }

    pub fn row(&self, cells: &[Cell]) -> Row {
        self.fields
            .iter()
            .map(|(idx, field)| (field.clone(), cells.get(*idx).cloned().unwrap_or(Cell::Empty)))
            .collect()
    }
}

/// Resolves every header label once. When two labels land on the same
/// field the better-ranked alias wins, then the leftmost column.
/// Fails before any row is read if a required column is missing.
pub fn resolve_headers<S: AsRef<str>>(labels: &[S]) -> Result<HeaderMap, ImportError> {
    let mut best: HashMap<String, (usize, usize)> = HashMap::new();
    for (idx, raw) in labels.iter().enumerate() {
        let label = normalize_label(raw.as_ref());
        if label.is_empty() {
            continue;
        }
        let (field, rank) = resolve_alias(&label);
        match best.get(&field) {
            Some((prev_rank, _)) if *prev_rank <= rank => {}
            _ => {
                best.insert(field, (rank, idx));
            }
        }
    }

    let mut fields: Vec<(usize, String)> = best
        .into_iter()
        .map(|(field, (_, idx))| (idx, field))
        .collect();
    fields.sort();

    let columns: Vec<&str> = fields.iter().map(|(_, f)| f.as_str()).collect();
    let missing = missing_required(&columns);
    if !missing.is_empty() {
        return Err(ImportError::MissingColumns { columns: missing });
    }
    Ok(HeaderMap { fields })
}

/// Keyed records (archive JSON, parsed documents) go through the same label
/// and alias resolution as a header row.
pub fn normalize_record<I>(record: I) -> Row
where
    I: IntoIterator<Item = (String, Cell)>,
{
    let mut ranked: HashMap<String, (usize, Cell)> = HashMap::new();
    for (key, value) in record {
        let label = normalize_label(&key);
        if label.is_empty() {
            continue;
        }
        let (field, rank) = resolve_alias(&label);
        match ranked.get(&field) {
            Some((prev_rank, _)) if *prev_rank <= rank => {}
            _ => {
                ranked.insert(field, (rank, value));
            }
        }
    }
    ranked
        .into_iter()
        .map(|(field, (_, value))| (field, value))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_trimmed_lowered_and_underscored() {
        assert_eq!(normalize_label("  Army No "), "army_no");
        assert_eq!(normalize_label("S. No."), "s_no");
        assert_eq!(normalize_label("Name of Qualification"), "name_of_qualification");
        assert_eq!(normalize_label("Viva 1"), "viva_1");
    }

    #[test]
    fn aliases_resolve_to_canonical_fields() {
        assert_eq!(canonical_field("Army Number"), "army_no");
        assert_eq!(canonical_field("Date of Birth"), "dob");
        assert_eq!(canonical_field("Category"), "trade");
        assert_eq!(canonical_field("District"), "district");
    }

    #[test]
    fn missing_columns_are_all_named() {
        let err = resolve_headers(&["Army No", "Name", "Question"]).unwrap_err();
        match err {
            ImportError::MissingColumns { columns } => {
                assert_eq!(columns, vec!["exam_type".to_string(), "answer".to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn unknown_columns_pass_through() {
        let headers =
            resolve_headers(&["army_no", "exam_type", "question", "answer", "Batch Code"]).unwrap();
        assert!(headers.columns().contains(&"batch_code".to_string()));
        let row = headers.row(&[
            Cell::Text("A1".into()),
            Cell::Text("primary".into()),
            Cell::Text("Q1".into()),
            Cell::Text("b".into()),
            Cell::Text("B-7".into()),
        ]);
        assert_eq!(row.get("batch_code"), Some(&Cell::Text("B-7".into())));
    }

    #[test]
    fn preferred_alias_wins_over_column_order() {
        let headers =
            resolve_headers(&["identifier", "army_no", "exam_type", "question", "answer"]).unwrap();
        let row = headers.row(&[
            Cell::Text("ENR-9".into()),
            Cell::Text("A1".into()),
            Cell::Text("primary".into()),
            Cell::Text("Q1".into()),
            Cell::Text("b".into()),
        ]);
        assert_eq!(row.get("army_no"), Some(&Cell::Text("A1".into())));
    }

    #[test]
    fn question_id_satisfies_question_requirement() {
        assert!(missing_required(&["army_no", "exam_type", "question_id", "answer"]).is_empty());
    }

    #[test]
    fn records_resolve_aliases() {
        let row = normalize_record(vec![
            ("Army Number".to_string(), Cell::Text("A9".into())),
            ("qid".to_string(), Cell::Int(4)),
        ]);
        assert_eq!(row.get("army_no"), Some(&Cell::Text("A9".into())));
        assert_eq!(row.get("question_id"), Some(&Cell::Int(4)));
    }
}
