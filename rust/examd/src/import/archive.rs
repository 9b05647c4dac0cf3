use super::normalize::normalize_record;
use super::row::{Cell, Row, RowBatch};
use crate::error::ImportError;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;
use zip::ZipArchive;

const CANDIDATES_KEY: &str = "candidates";
const ANSWERS_KEY: &str = "answers";

/// Reads every `*.json` entry of a zip archive. Each entry holds
/// `{"candidates": [{..., "answers": [...]}]}`; scalar fields on the document
/// and the candidate are inherited by each of its answers.
pub fn read_archive(path: &Path) -> Result<RowBatch, ImportError> {
    let file = File::open(path)?;
    read_archive_from(file)
}

pub fn read_archive_from<R: Read + Seek>(reader: R) -> Result<RowBatch, ImportError> {
    let mut archive = ZipArchive::new(reader)?;
    let mut rows: Vec<Row> = Vec::new();
    let mut json_entries = 0usize;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        if entry.is_dir() || !entry.name().to_ascii_lowercase().ends_with(".json") {
            continue;
        }
        let name = entry.name().to_string();
        let mut text = String::new();
        entry.read_to_string(&mut text)?;
        let doc: Value = serde_json::from_str(&text)
            .map_err(|e| ImportError::Source(format!("{}: {}", name, e)))?;
        collect_document(&name, &doc, &mut rows)?;
        json_entries += 1;
    }

    if json_entries == 0 {
        return Err(ImportError::Source("archive contains no .json entries".to_string()));
    }
    log::debug!("read_archive: {} entries, {} rows", json_entries, rows.len());
    Ok(batch_from_rows(rows))
}

fn scalars(obj: &Map<String, Value>, skip: &str) -> Vec<(String, Cell)> {
    obj.iter()
        .filter(|(k, v)| k.as_str() != skip && !v.is_array() && !v.is_object())
        .map(|(k, v)| (k.clone(), Cell::from_json(v)))
        .collect()
}

fn collect_document(name: &str, doc: &Value, rows: &mut Vec<Row>) -> Result<(), ImportError> {
    let Some(obj) = doc.as_object() else {
        return Err(ImportError::Source(format!("{}: expected a JSON object", name)));
    };
    let Some(candidates) = obj.get(CANDIDATES_KEY).and_then(|v| v.as_array()) else {
        return Err(ImportError::Source(format!(
            "{}: missing \"{}\" list",
            name, CANDIDATES_KEY
        )));
    };
    let doc_fields = normalize_record(scalars(obj, CANDIDATES_KEY));

    for (ci, cand) in candidates.iter().enumerate() {
        let Some(cand_obj) = cand.as_object() else {
            return Err(ImportError::Source(format!(
                "{}: candidate #{} is not an object",
                name,
                ci + 1
            )));
        };
        let mut base = doc_fields.clone();
        base.extend(normalize_record(scalars(cand_obj, ANSWERS_KEY)));

        let answers = cand_obj
            .get(ANSWERS_KEY)
            .and_then(|v| v.as_array())
            .map(|v| v.as_slice())
            .unwrap_or(&[]);
        if answers.is_empty() {
            rows.push(base);
            continue;
        }
        for ans in answers {
            let Some(ans_obj) = ans.as_object() else {
                return Err(ImportError::Source(format!(
                    "{}: answer of candidate #{} is not an object",
                    name,
                    ci + 1
                )));
            };
            let mut row = base.clone();
            row.extend(normalize_record(scalars(ans_obj, "")));
            rows.push(row);
        }
    }
    Ok(())
}

/// JSON records from an external document parser, one object per row.
pub fn records_to_batch(records: &[Value]) -> Result<RowBatch, ImportError> {
    let mut rows = Vec::with_capacity(records.len());
    for (i, rec) in records.iter().enumerate() {
        let Some(obj) = rec.as_object() else {
            return Err(ImportError::Source(format!("record #{} is not an object", i + 1)));
        };
        rows.push(normalize_record(scalars(obj, "")));
    }
    Ok(batch_from_rows(rows))
}

/// Keyed sources have no header row; their columns are every field any row
/// carries.
fn batch_from_rows(rows: Vec<Row>) -> RowBatch {
    let columns: BTreeSet<String> = rows.iter().flat_map(|r| r.keys().cloned()).collect();
    RowBatch {
        columns: columns.into_iter().collect(),
        rows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn answers_inherit_document_and_candidate_fields() {
        let doc = json!({
            "exam_type": "primary",
            "candidates": [{
                "Army Number": "A1",
                "name": "Ravi",
                "answers": [
                    { "question": "Q1", "answer": "b" },
                    { "question": "Q2", "answer": "c", "exam_type": "secondary" }
                ]
            }]
        });
        let mut rows = Vec::new();
        collect_document("a.json", &doc, &mut rows).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("army_no"), Some(&Cell::Text("A1".into())));
        assert_eq!(rows[0].get("exam_type"), Some(&Cell::Text("primary".into())));
        assert_eq!(rows[1].get("exam_type"), Some(&Cell::Text("secondary".into())));
    }

    #[test]
    fn candidate_without_answers_becomes_roster_row() {
        let doc = json!({ "candidates": [{ "army_no": "A2" }] });
        let mut rows = Vec::new();
        collect_document("a.json", &doc, &mut rows).unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].get("question").is_none());
    }

    #[test]
    fn missing_candidates_list_is_a_source_error() {
        let mut rows = Vec::new();
        let err = collect_document("a.json", &json!({ "rows": [] }), &mut rows).unwrap_err();
        assert!(matches!(err, ImportError::Source(_)));
    }

    #[test]
    fn record_columns_are_the_union_of_keys() {
        let batch = records_to_batch(&[
            json!({ "army_no": "A1", "question": "Q1" }),
            json!({ "army_no": "A2", "answer": "x", "exam_type": "primary" }),
        ])
        .unwrap();
        assert_eq!(
            batch.columns,
            vec!["answer", "army_no", "exam_type", "question"]
        );
    }
}
