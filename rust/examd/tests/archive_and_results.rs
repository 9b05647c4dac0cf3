use examd::config::{LookupEntry, ReportLayout, WorkspaceConfig};
use examd::db;
use examd::error::ImportError;
use examd::import;
use examd::model::{self, ExamConfig, Section};
use examd::results;
use serde_json::json;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use zip::write::FileOptions;

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn write_archive(path: &Path, entries: &[(&str, serde_json::Value)]) {
    let file = std::fs::File::create(path).expect("create archive");
    let mut zip = zip::ZipWriter::new(file);
    for (name, doc) in entries {
        zip.start_file(*name, FileOptions::default())
            .expect("start entry");
        zip.write_all(doc.to_string().as_bytes())
            .expect("write entry");
    }
    zip.finish().expect("finish archive");
}

#[test]
fn archive_import_reads_every_json_entry() {
    let dir = temp_dir("examd-archive");
    let archive = dir.join("answers.zip");
    write_archive(
        &archive,
        &[
            (
                "center-1.json",
                json!({
                    "exam_type": "primary",
                    "candidates": [{
                        "Army Number": "A1",
                        "name": "Ravi",
                        "category": "TTC",
                        "answers": [
                            { "question": "Q1", "answer": "b", "correct_answer": "b", "max_marks": 2 },
                            { "question": "Q2", "answer": "a", "max_marks": 3 }
                        ]
                    }]
                }),
            ),
            (
                "center-2.json",
                json!({
                    "exam_type": "secondary",
                    "candidates": [{ "army_no": "A2", "answers": [{ "question": "S1", "answer": "x" }] }]
                }),
            ),
            ("README.txt", json!("ignored")),
        ],
    );

    let conn = db::open_db(&dir).expect("open workspace db");
    let summary = import::import_archive_file(&conn, &archive).expect("archive import");
    assert_eq!(summary.candidates_created, 2);
    assert_eq!(summary.questions_created, 3);
    assert_eq!(summary.answers_created, 3);

    let a1 = model::get_candidate_by_army_no(&conn, "A1")
        .expect("query")
        .expect("candidate");
    assert_eq!(a1.trade, "TTC");

    let runs = import::audit::list_runs(&conn, 5).expect("history");
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].source_kind, "archive");
    assert_eq!(runs[0].source_name, "answers.zip");
}

#[test]
fn archive_without_json_entries_is_unreadable() {
    let dir = temp_dir("examd-archive-empty");
    let archive = dir.join("empty.zip");
    let file = std::fs::File::create(&archive).expect("create archive");
    let mut zip = zip::ZipWriter::new(file);
    zip.start_file("notes.txt", FileOptions::default())
        .expect("start entry");
    zip.write_all(b"nothing here").expect("write entry");
    zip.finish().expect("finish archive");

    let conn = db::open_in_memory().expect("db");
    let err = import::import_archive_file(&conn, &archive).expect_err("no json entries");
    assert!(matches!(err, ImportError::Source(_)));
    assert_eq!(err.code(), "source_unreadable");
}

fn seeded() -> rusqlite::Connection {
    let conn = db::open_in_memory().expect("db");
    let records = vec![
        json!({
            "army_no": "B2", "name": "Second", "trade": "TTC", "center": "C1",
            "exam_type": "primary", "question": "P1", "answer": "x",
            "max_marks": 40, "marks_obt": 30, "viva_1": 10, "practical_1": 10
        }),
        json!({
            "army_no": "A1", "name": "First", "trade": "TTC", "center": "C9",
            "exam_type": "secondary", "question": "S1", "answer": "y",
            "max_marks": 40, "marks_obt": 20
        }),
    ];
    import::import_batch(&conn, &import::records_to_batch(&records).expect("batch"))
        .expect("import");
    model::upsert_trade(&conn, "TTC", "TTC").expect("trade");
    for section in Section::ALL {
        model::upsert_exam_config(
            &conn,
            &ExamConfig {
                trade_code: "TTC".into(),
                exam_type: section.as_str().into(),
                theory_max: 40,
                practical_max: 30,
                viva_max: 30,
            },
        )
        .expect("config");
    }
    conn
}

#[test]
fn flat_layout_lists_answers_by_army_no() {
    let conn = seeded();
    let wb = results::build_results(&conn, &WorkspaceConfig::default(), ReportLayout::Flat)
        .expect("results");
    assert_eq!(wb.sheets.len(), 1);
    let sheet = &wb.sheets[0];
    assert_eq!(sheet.name, "Results");
    assert_eq!(sheet.headers.len(), 24);
    assert_eq!(sheet.headers[5], "army_no");
    assert_eq!(sheet.rows.len(), 2);
    assert_eq!(sheet.rows[0][5], json!("A1"));
    assert_eq!(sheet.rows[1][5], json!("B2"));
    assert_eq!(sheet.rows[1][23], json!(30));
}

#[test]
fn statements_layout_has_three_sheets_with_percentages() {
    let conn = seeded();
    let cfg = WorkspaceConfig {
        centers: vec![LookupEntry {
            code: "C1".into(),
            label: "Central School".into(),
        }],
        ..WorkspaceConfig::default()
    };
    let wb = results::build_results(&conn, &cfg, ReportLayout::Statements).expect("results");
    let names: Vec<&str> = wb.sheets.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["Primary Statement", "Secondary Statement", "Combined Results"]
    );

    let primary = &wb.sheets[0];
    let b2 = primary
        .rows
        .iter()
        .find(|r| r[1] == json!("B2"))
        .expect("B2 row");
    assert_eq!(b2[7], json!("Central School"));
    // 30 theory + 10 practical + 10 viva over 100.
    assert_eq!(b2[11], json!(50));
    assert_eq!(b2[12], json!(50.0));

    let combined = &wb.sheets[2];
    let spans: usize = combined.header_groups.iter().map(|g| g.span).sum();
    assert_eq!(spans, combined.headers.len());
    let a1 = combined
        .rows
        .iter()
        .find(|r| r[1] == json!("A1"))
        .expect("A1 row");
    assert_eq!(a1[7], json!("C9"));
    assert_eq!(a1.last(), Some(&json!(20)));
}

#[test]
fn stored_layout_overrides_config_but_not_requests() {
    let conn = db::open_in_memory().expect("db");
    let cfg = WorkspaceConfig::default();
    assert_eq!(
        results::resolve_layout(&conn, &cfg, None).expect("layout"),
        ReportLayout::Statements
    );
    results::store_layout(&conn, ReportLayout::Flat).expect("store");
    assert_eq!(
        results::resolve_layout(&conn, &cfg, None).expect("layout"),
        ReportLayout::Flat
    );
    assert_eq!(
        results::resolve_layout(&conn, &cfg, Some(ReportLayout::Statements)).expect("layout"),
        ReportLayout::Statements
    );
}
