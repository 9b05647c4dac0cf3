use super::normalize::resolve_headers;
use super::row::{Cell, RowBatch};
use crate::error::ImportError;
use calamine::{open_workbook_auto, DataType, Reader};
use std::path::Path;

fn cell_from_calamine(c: &DataType) -> Cell {
    match c {
        DataType::Empty => Cell::Empty,
        DataType::String(s) => Cell::Text(s.clone()),
        DataType::Int(i) => Cell::Int(*i),
        DataType::Float(f) => Cell::Float(*f),
        DataType::Bool(b) => Cell::Bool(*b),
        DataType::DateTime(serial) => Cell::from_excel_serial(*serial),
        // Formula errors (#N/A, #REF!, ...) read as blank.
        _ => Cell::Empty,
    }
}

/// Reads the first worksheet; the first row is the header.
pub fn read_workbook(path: &Path) -> Result<RowBatch, ImportError> {
    let mut workbook = open_workbook_auto(path)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| ImportError::Source("workbook has no worksheets".to_string()))??;

    let mut rows = range.rows();
    let header = rows
        .next()
        .ok_or_else(|| ImportError::Source("worksheet is empty".to_string()))?;
    let labels: Vec<String> = header
        .iter()
        .map(|c| cell_from_calamine(c).text().unwrap_or_default())
        .collect();
    log::debug!("read_workbook: header: {:?}", labels);
    let headers = resolve_headers(&labels)?;

    let mut out = Vec::new();
    for r in rows {
        let cells: Vec<Cell> = r.iter().map(cell_from_calamine).collect();
        if cells.iter().all(Cell::is_blank) {
            continue;
        }
        out.push(headers.row(&cells));
    }

    Ok(RowBatch {
        columns: headers.columns(),
        rows: out,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use calamine::CellErrorType;
    use chrono::NaiveDate;

    #[test]
    fn calamine_cells_map_to_import_cells() {
        let d = NaiveDate::from_ymd_opt(1999, 3, 14).expect("date");
        assert_eq!(cell_from_calamine(&DataType::DateTime(36233.0)), Cell::Date(d));
        assert_eq!(cell_from_calamine(&DataType::Float(5.0)), Cell::Float(5.0));
        assert_eq!(
            cell_from_calamine(&DataType::String("b".into())),
            Cell::Text("b".into())
        );
        assert_eq!(cell_from_calamine(&DataType::Error(CellErrorType::NA)), Cell::Empty);
        assert_eq!(cell_from_calamine(&DataType::Empty), Cell::Empty);
    }
}
