//! Spreadsheet (.xlsx / .xls) point tables

use calamine::{open_workbook_auto, Data, Range, Reader};
use csv::StringRecord;
use std::path::Path;
use tracing::debug;

use super::deserialize_records;
use crate::error::{PointMapError, Result};
use crate::row::RawSignalRow;

/// Read a point table from a workbook. Uses the first sheet unless `sheet`
/// names one; the first used row is the header.
pub fn read_path(path: &Path, sheet: Option<&str>) -> Result<Vec<(usize, RawSignalRow)>> {
    let mut workbook = open_workbook_auto(path)?;

    let sheet_name = match sheet {
        Some(name) => name.to_string(),
        None => workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| PointMapError::EmptyPointTable {
                path: path.to_path_buf(),
            })?,
    };

    let range = workbook.worksheet_range(&sheet_name)?;
    debug!(
        "Sheet '{}' of {:?}: {} x {} cells",
        sheet_name,
        path,
        range.height(),
        range.width()
    );

    read_range(&range)
}

pub(crate) fn read_range(range: &Range<Data>) -> Result<Vec<(usize, RawSignalRow)>> {
    let mut rows = range.rows();
    let headers: StringRecord = match rows.next() {
        Some(header_row) => header_row.iter().map(cell_text).collect(),
        None => return Ok(Vec::new()),
    };

    let records = rows.map(|row| Ok(row.iter().map(cell_text).collect::<StringRecord>()));
    deserialize_records(&headers, records)
}

/// Cell as the text a user would have typed. Whole floats lose their `.0`
/// so `40001.0` reads as register `40001`.
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Float(f) if f.is_finite() && f.fract() == 0.0 => format!("{}", *f as i64),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::Error(e) => e.to_string(),
        Data::DateTime(dt) => dt.as_f64().to_string(),
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    fn sheet(cells: &[&[Data]]) -> Range<Data> {
        let height = cells.len() as u32;
        let width = cells.iter().map(|r| r.len()).max().unwrap_or(0) as u32;
        let mut range = Range::new((0, 0), (height - 1, width - 1));
        for (r, row) in cells.iter().enumerate() {
            for (c, cell) in row.iter().enumerate() {
                range.set_value((r as u32, c as u32), cell.clone());
            }
        }
        range
    }

    fn text(s: &str) -> Data {
        Data::String(s.to_string())
    }

    #[test]
    fn test_numeric_cells_become_integer_text() {
        let range = sheet(&[
            &[
                text("设备名称"),
                text("设备类型"),
                text("波特率"),
                text("寄存器地址"),
                text("操作类型"),
                text("数据标签名"),
                text("读取周期"),
            ],
            &[
                text("M1"),
                text("rtu"),
                Data::Float(9600.0),
                Data::Float(40001.0),
                text("read"),
                text("Ua"),
                Data::Int(1000),
            ],
        ]);

        let rows = read_range(&range).unwrap();
        let (index, row) = &rows[0];
        assert_eq!(*index, 0);
        assert_eq!(row.baud, "9600");
        assert_eq!(row.register, "40001");
        assert_eq!(row.period, "1000");
    }

    #[test]
    fn test_empty_cells_and_trailing_rows() {
        let range = sheet(&[
            &[
                text("device"),
                text("type"),
                text("register"),
                text("op"),
                text("tag"),
            ],
            &[text("D1"), text("tcp"), Data::Float(3.0), text("write"), text("DO1")],
            &[Data::Empty, Data::Empty, Data::Empty, Data::Empty, Data::Empty],
        ]);

        let rows = read_range(&range).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].1.register, "3");
    }
}
