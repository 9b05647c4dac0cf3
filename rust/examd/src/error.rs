use thiserror::Error;

/// Failure of a single import row. Always surfaced wrapped in
/// [`ImportError::ImportFailed`] with the 1-based data row number.
#[derive(Debug, Error)]
pub enum RowError {
    #[error("exam_type must be primary or secondary, got {0:?}")]
    InvalidSection(String),

    #[error("invalid value {value:?} in column {column}")]
    InvalidValue { column: String, value: String },

    #[error("marks_obt {marks} outside 0..={max_marks}")]
    MarksOutOfRange { marks: i64, max_marks: i64 },

    #[error("question reference {0:?} matches no question and carries no text")]
    UnmatchedQuestion(String),

    #[error("storage error: {0}")]
    Persistence(#[from] rusqlite::Error),
}

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("missing required columns: {}", .columns.join(", "))]
    MissingColumns { columns: Vec<String> },

    #[error("import failed at row {row}: {source}")]
    ImportFailed {
        row: usize,
        #[source]
        source: RowError,
    },

    #[error("storage error: {0}")]
    Persistence(#[from] rusqlite::Error),

    #[error("could not read import source: {0}")]
    Source(String),
}

/// Grading failures that abort a whole submission. Per-field problems are
/// reported as rejected field results instead.
#[derive(Debug, Error)]
pub enum GradingError {
    #[error("candidate not found: {0}")]
    CandidateNotFound(String),

    #[error("storage error: {0}")]
    Persistence(#[from] rusqlite::Error),
}

impl GradingError {
    pub fn code(&self) -> &'static str {
        match self {
            GradingError::CandidateNotFound(_) => "not_found",
            GradingError::Persistence(_) => "db_error",
        }
    }
}

impl ImportError {
    pub fn code(&self) -> &'static str {
        match self {
            ImportError::MissingColumns { .. } => "missing_columns",
            ImportError::ImportFailed { .. } => "import_failed",
            ImportError::Persistence(_) => "db_error",
            ImportError::Source(_) => "source_unreadable",
        }
    }

    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            ImportError::MissingColumns { columns } => {
                Some(serde_json::json!({ "columns": columns }))
            }
            ImportError::ImportFailed { row, .. } => Some(serde_json::json!({ "row": row })),
            _ => None,
        }
    }
}

impl From<calamine::Error> for ImportError {
    fn from(e: calamine::Error) -> Self {
        ImportError::Source(e.to_string())
    }
}

impl From<zip::result::ZipError> for ImportError {
    fn from(e: zip::result::ZipError) -> Self {
        ImportError::Source(e.to_string())
    }
}

impl From<std::io::Error> for ImportError {
    fn from(e: std::io::Error) -> Self {
        ImportError::Source(e.to_string())
    }
}

impl From<serde_json::Error> for ImportError {
    fn from(e: serde_json::Error) -> Self {
        ImportError::Source(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_columns_message_names_every_column() {
        let e = ImportError::MissingColumns {
            columns: vec!["exam_type".into(), "answer".into()],
        };
        assert_eq!(e.to_string(), "missing required columns: exam_type, answer");
        assert_eq!(e.code(), "missing_columns");
    }

    #[test]
    fn import_failed_keeps_row_and_cause() {
        let e = ImportError::ImportFailed {
            row: 3,
            source: RowError::InvalidSection("tertiary".into()),
        };
        assert!(e.to_string().contains("row 3"));
        assert!(e.to_string().contains("tertiary"));
        assert_eq!(e.details(), Some(serde_json::json!({ "row": 3 })));
    }
}
