use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

pub const DB_FILE: &str = "examd.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE);
    let conn = Connection::open(db_path)?;
    init_schema(&conn)?;
    Ok(conn)
}

/// In-memory database with the full schema. Used by tests and dry runs.
pub fn open_in_memory() -> anyhow::Result<Connection> {
    let conn = Connection::open_in_memory()?;
    init_schema(&conn)?;
    Ok(conn)
}

fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS trades(
            code TEXT PRIMARY KEY,
            label TEXT NOT NULL,
            sort_order INTEGER NOT NULL DEFAULT 0
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS exam_configs(
            id TEXT PRIMARY KEY,
            trade_code TEXT NOT NULL,
            exam_type TEXT NOT NULL,
            theory_max INTEGER NOT NULL DEFAULT 0,
            practical_max INTEGER NOT NULL DEFAULT 0,
            viva_max INTEGER NOT NULL DEFAULT 0,
            FOREIGN KEY(trade_code) REFERENCES trades(code) ON DELETE CASCADE
        )",
        [],
    )?;
    conn.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_exam_configs_trade_type
         ON exam_configs(trade_code, exam_type)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS candidates(
            id TEXT PRIMARY KEY,
            army_no TEXT NOT NULL,
            s_no INTEGER,
            name TEXT NOT NULL DEFAULT '',
            photo TEXT NOT NULL DEFAULT '',
            fathers_name TEXT NOT NULL DEFAULT '',
            dob TEXT,
            trade TEXT NOT NULL DEFAULT '',
            rank TEXT NOT NULL DEFAULT '',
            adhaar_no TEXT NOT NULL DEFAULT '',
            name_of_qualification TEXT NOT NULL DEFAULT '',
            duration_of_qualification TEXT NOT NULL DEFAULT '',
            credits INTEGER NOT NULL DEFAULT 0,
            nsqf_level INTEGER NOT NULL DEFAULT 0,
            training_center TEXT NOT NULL DEFAULT '',
            district TEXT NOT NULL DEFAULT '',
            state TEXT NOT NULL DEFAULT '',
            viva_1 INTEGER NOT NULL DEFAULT 0,
            viva_2 INTEGER NOT NULL DEFAULT 0,
            practical_1 INTEGER NOT NULL DEFAULT 0,
            practical_2 INTEGER NOT NULL DEFAULT 0,
            updated_at TEXT
        )",
        [],
    )?;
    // Workspaces created before grading/centers existed lack these columns.
    ensure_candidates_center(conn)?;
    ensure_candidates_checked(conn)?;
    conn.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_candidates_army_no ON candidates(army_no)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_candidates_trade ON candidates(trade)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS questions(
            id TEXT PRIMARY KEY,
            exam_type TEXT NOT NULL,
            question TEXT NOT NULL,
            correct_answer TEXT,
            max_marks INTEGER NOT NULL DEFAULT 0
        )",
        [],
    )?;
    ensure_questions_part(conn)?;
    conn.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_questions_identity
         ON questions(exam_type, question, part)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS answers(
            id TEXT PRIMARY KEY,
            candidate_id TEXT NOT NULL,
            question_id TEXT NOT NULL,
            answer TEXT,
            marks_obt INTEGER CHECK(marks_obt IS NULL OR marks_obt >= 0),
            updated_at TEXT,
            FOREIGN KEY(candidate_id) REFERENCES candidates(id) ON DELETE CASCADE,
            FOREIGN KEY(question_id) REFERENCES questions(id) ON DELETE CASCADE
        )",
        [],
    )?;
    conn.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_answers_candidate_question
         ON answers(candidate_id, question_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_answers_question ON answers(question_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS import_runs(
            id TEXT PRIMARY KEY,
            source_kind TEXT NOT NULL,
            source_name TEXT NOT NULL,
            sha256 TEXT,
            started_at TEXT NOT NULL,
            finished_at TEXT NOT NULL,
            ok INTEGER NOT NULL,
            rows_seen INTEGER NOT NULL DEFAULT 0,
            rows_skipped INTEGER NOT NULL DEFAULT 0,
            candidates_created INTEGER NOT NULL DEFAULT 0,
            candidates_updated INTEGER NOT NULL DEFAULT 0,
            questions_created INTEGER NOT NULL DEFAULT 0,
            answers_created INTEGER NOT NULL DEFAULT 0,
            answers_updated INTEGER NOT NULL DEFAULT 0,
            error TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;

    Ok(())
}

fn ensure_candidates_center(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "candidates", "center")? {
        return Ok(());
    }
    conn.execute(
        "ALTER TABLE candidates ADD COLUMN center TEXT NOT NULL DEFAULT ''",
        [],
    )?;
    Ok(())
}

fn ensure_candidates_checked(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "candidates", "checked")? {
        return Ok(());
    }
    conn.execute(
        "ALTER TABLE candidates ADD COLUMN checked INTEGER NOT NULL DEFAULT 0",
        [],
    )?;
    Ok(())
}

fn ensure_questions_part(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "questions", "part")? {
        return Ok(());
    }
    conn.execute(
        "ALTER TABLE questions ADD COLUMN part TEXT NOT NULL DEFAULT ''",
        [],
    )?;
    Ok(())
}

pub fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}

pub fn settings_get_json(conn: &Connection, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value_json FROM settings WHERE key = ?",
            [key],
            |r| r.get(0),
        )
        .optional()?;
    match raw {
        Some(s) => Ok(Some(serde_json::from_str(&s)?)),
        None => Ok(None),
    }
}

pub fn settings_set_json(conn: &Connection, key: &str, value: &serde_json::Value) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value_json) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
        (key, serde_json::to_string(value)?),
    )?;
    Ok(())
}

pub fn count_rows(conn: &Connection, table: &str) -> rusqlite::Result<i64> {
    conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| {
        r.get(0)
    })
}
