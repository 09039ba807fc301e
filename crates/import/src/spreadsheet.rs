use calamine::{open_workbook_auto_from_rs, Reader};
use std::io::Cursor;

use crate::error::ImportError;
use crate::util::trim_cell;

/// Reads the first worksheet of an xlsx/xls/ods workbook into a grid of cells.
/// Date cells surface as serial numbers and are decoded by the row mapper.
pub fn read_spreadsheet(bytes: &[u8]) -> Result<Vec<Vec<String>>, ImportError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(ImportError::NoDataRows)??;

    Ok(range
        .rows()
        .map(|row| row.iter().map(|cell| trim_cell(&cell.to_string())).collect())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corrupt_workbook_is_a_spreadsheet_error() {
        let result = read_spreadsheet(b"PK\x03\x04 definitely not a workbook");
        assert!(matches!(result, Err(ImportError::Spreadsheet(_))));
    }
}
