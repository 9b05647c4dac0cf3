use examd::db;
use examd::import::{import_batch, records_to_batch};
use examd::roster::{self, CandidateFilter};
use rusqlite::Connection;
use serde_json::json;

fn seeded() -> Connection {
    let conn = db::open_in_memory().expect("open in-memory db");
    let records = vec![
        json!({
            "army_no": "A_1", "name": "Ravi", "trade": "TTC", "exam_type": "primary",
            "question": "P1", "answer": "b", "max_marks": 10, "marks_obt": 6,
            "viva_1": 3, "practical_1": 4
        }),
        json!({
            "army_no": "A_1", "exam_type": "secondary",
            "question": "S1", "answer": "c", "max_marks": 10, "marks_obt": 5
        }),
        json!({
            "army_no": "AX1", "name": "Sita 100%", "trade": "TTC", "exam_type": "primary",
            "question": "P1", "answer": "a", "max_marks": 10
        }),
        json!({
            "army_no": "B2", "name": "Mohan", "trade": "TTC", "exam_type": "primary",
            "question": "P1", "answer": "a", "max_marks": 10
        }),
    ];
    import_batch(&conn, &records_to_batch(&records).expect("batch")).expect("import");
    conn
}

fn search(conn: &Connection, term: &str) -> Vec<String> {
    let filter = CandidateFilter {
        search: Some(term.to_string()),
        ..Default::default()
    };
    roster::list_candidates(conn, &filter)
        .expect("list candidates")
        .into_iter()
        .map(|r| r.army_no)
        .collect()
}

#[test]
fn wildcards_in_a_search_term_match_literally() {
    let conn = seeded();
    assert_eq!(search(&conn, "A_1"), vec!["A_1"]);
    assert_eq!(search(&conn, "100%"), vec!["AX1"]);
    assert_eq!(search(&conn, "%"), vec!["AX1"]);
    // Ordered by army_no: 'X' sorts before '_'.
    assert_eq!(search(&conn, "a"), vec!["AX1", "A_1", "B2"]);
}

#[test]
fn listed_totals_match_the_candidate_detail() {
    let conn = seeded();
    let rows = roster::list_candidates(&conn, &CandidateFilter::default()).expect("list");
    let ravi = rows.iter().find(|r| r.army_no == "A_1").expect("A_1 row");
    assert_eq!(ravi.total_primary, 6);
    assert_eq!(ravi.total_secondary, 5);
    assert_eq!(ravi.grand_total, 6 + 5 + 3 + 4);

    let detail = roster::candidate_detail(&conn, &ravi.id)
        .expect("detail")
        .expect("candidate");
    assert_eq!(detail.totals.grand_total, ravi.grand_total);
}
