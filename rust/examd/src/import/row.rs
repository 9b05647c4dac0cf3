use crate::error::RowError;
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// One cell of an import row, independent of where it came from
/// (spreadsheet, archive JSON, parsed document).
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Date(NaiveDate),
}

const DATE_FORMATS: [&str; 5] = ["%Y-%m-%d", "%d-%m-%Y", "%d/%m/%Y", "%d.%m.%Y", "%Y/%m/%d"];

impl Cell {
    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Trimmed text form. Blank cells yield `None`; whole floats print
    /// without a fraction so numeric identifiers survive spreadsheets.
    pub fn text(&self) -> Option<String> {
        let s = match self {
            Cell::Empty => return None,
            Cell::Text(s) => s.trim().to_string(),
            Cell::Int(i) => i.to_string(),
            Cell::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => (*f as i64).to_string(),
            Cell::Float(f) => f.to_string(),
            Cell::Bool(b) => b.to_string(),
            Cell::Date(d) => d.format("%Y-%m-%d").to_string(),
        };
        if s.is_empty() {
            None
        } else {
            Some(s)
        }
    }

    pub fn int(&self, column: &str) -> Result<Option<i64>, RowError> {
        let bad = || RowError::InvalidValue {
            column: column.to_string(),
            value: self.text().unwrap_or_default(),
        };
        match self {
            Cell::Empty => Ok(None),
            Cell::Int(i) => Ok(Some(*i)),
            Cell::Float(f) if f.fract() == 0.0 => Ok(Some(*f as i64)),
            Cell::Text(s) => {
                let t = s.trim();
                if t.is_empty() {
                    return Ok(None);
                }
                if let Ok(v) = t.parse::<i64>() {
                    return Ok(Some(v));
                }
                match t.parse::<f64>() {
                    Ok(f) if f.fract() == 0.0 => Ok(Some(f as i64)),
                    _ => Err(bad()),
                }
            }
            _ => Err(bad()),
        }
    }

    pub fn date(&self, column: &str) -> Result<Option<NaiveDate>, RowError> {
        match self {
            Cell::Empty => Ok(None),
            Cell::Date(d) => Ok(Some(*d)),
            Cell::Text(s) => {
                let t = s.trim();
                if t.is_empty() {
                    return Ok(None);
                }
                // Timestamps keep only their date part.
                let head = t.get(..10).unwrap_or(t);
                for candidate in [t, head] {
                    for fmt in DATE_FORMATS {
                        if let Ok(d) = NaiveDate::parse_from_str(candidate, fmt) {
                            return Ok(Some(d));
                        }
                    }
                }
                Err(RowError::InvalidValue {
                    column: column.to_string(),
                    value: t.to_string(),
                })
            }
            other => Err(RowError::InvalidValue {
                column: column.to_string(),
                value: other.text().unwrap_or_default(),
            }),
        }
    }

    /// Excel stores dates as days since 1899-12-30.
    pub fn from_excel_serial(serial: f64) -> Cell {
        let Some(epoch) = NaiveDate::from_ymd_opt(1899, 12, 30) else {
            return Cell::Float(serial);
        };
        match epoch.checked_add_signed(chrono::Duration::days(serial.floor() as i64)) {
            Some(d) => Cell::Date(d),
            None => Cell::Float(serial),
        }
    }

    pub fn from_json(v: &serde_json::Value) -> Cell {
        match v {
            serde_json::Value::Null => Cell::Empty,
            serde_json::Value::Bool(b) => Cell::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Cell::Int(i),
                None => Cell::Float(n.as_f64().unwrap_or_default()),
            },
            serde_json::Value::String(s) => Cell::Text(s.clone()),
            other => Cell::Text(other.to_string()),
        }
    }
}

/// A row keyed by canonical field name.
pub type Row = BTreeMap<String, Cell>;

#[derive(Debug, Clone, Default)]
pub struct RowBatch {
    /// Canonical field names present in the source header.
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

pub fn cell<'a>(row: &'a Row, field: &str) -> &'a Cell {
    static EMPTY: Cell = Cell::Empty;
    row.get(field).unwrap_or(&EMPTY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_identifiers_read_as_plain_text() {
        assert_eq!(Cell::Float(1234567.0).text().as_deref(), Some("1234567"));
        assert_eq!(Cell::Text("  A1 ".into()).text().as_deref(), Some("A1"));
        assert_eq!(Cell::Text("   ".into()).text(), None);
    }

    #[test]
    fn int_accepts_whole_numbers_only() {
        assert_eq!(Cell::Text("12".into()).int("credits").unwrap(), Some(12));
        assert_eq!(Cell::Text("12.0".into()).int("credits").unwrap(), Some(12));
        assert_eq!(Cell::Float(4.0).int("credits").unwrap(), Some(4));
        assert_eq!(Cell::Text(" ".into()).int("credits").unwrap(), None);
        assert!(Cell::Text("twelve".into()).int("credits").is_err());
        assert!(Cell::Float(2.5).int("credits").is_err());
    }

    #[test]
    fn dates_parse_common_layouts_and_excel_serials() {
        let d = NaiveDate::from_ymd_opt(1999, 3, 14).unwrap();
        assert_eq!(Cell::Text("1999-03-14".into()).date("dob").unwrap(), Some(d));
        assert_eq!(Cell::Text("14/03/1999".into()).date("dob").unwrap(), Some(d));
        assert_eq!(
            Cell::Text("1999-03-14T00:00:00".into()).date("dob").unwrap(),
            Some(d)
        );
        assert_eq!(Cell::from_excel_serial(36233.0), Cell::Date(d));
        assert!(Cell::Text("soon".into()).date("dob").is_err());
    }
}
