//! Signal point table loading
//!
//! Reads a CSV or spreadsheet point table into [`SignalRow`]s. Both formats
//! are funnelled through `csv::StringRecord` so header aliases and row
//! deserialization behave identically.

use csv::StringRecord;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{PointMapError, Result};
use crate::row::{check_headers, RawSignalRow, SignalRow};

pub mod csv_table;
#[cfg(feature = "xlsx")]
pub mod xlsx_table;

/// Default file names searched when no input is given, in priority order
pub const DEFAULT_CANDIDATES: &[&str] = &["信号点表.csv", "信号点表.xlsx"];

/// Supported point table formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Csv,
    #[cfg(feature = "xlsx")]
    Spreadsheet,
}

impl TableFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match ext.as_deref() {
            Some("csv") => Ok(Self::Csv),
            #[cfg(feature = "xlsx")]
            Some("xlsx") | Some("xls") => Ok(Self::Spreadsheet),
            _ => Err(PointMapError::UnsupportedFormat {
                path: path.to_path_buf(),
            }),
        }
    }
}

/// Rows read from one point table, split into accepted and rejected
#[derive(Debug)]
pub struct PointTable {
    pub path: PathBuf,
    pub rows: Vec<SignalRow>,
    /// Boundary validation failures, in row order
    pub rejected: Vec<PointMapError>,
}

impl PointTable {
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }

    /// Accepted rows, or the first rejection if any row was rejected
    pub fn into_rows(self) -> Result<Vec<SignalRow>> {
        match self.rejected.into_iter().next() {
            Some(err) => Err(err),
            None => Ok(self.rows),
        }
    }
}

/// Pick the first existing candidate
pub fn detect_input(candidates: &[PathBuf]) -> Result<PathBuf> {
    candidates
        .iter()
        .find(|p| p.is_file())
        .cloned()
        .ok_or_else(|| PointMapError::MissingInputFile {
            candidates: candidates.to_vec(),
        })
}

/// Read and validate a point table. `sheet` only applies to spreadsheets
/// (first sheet when `None`).
pub fn read_table(path: impl AsRef<Path>, sheet: Option<&str>) -> Result<PointTable> {
    let path = path.as_ref();
    info!("Reading signal point table: {:?}", path);

    let raw = match TableFormat::from_path(path)? {
        TableFormat::Csv => {
            if sheet.is_some() {
                warn!("Sheet selection ignored for CSV input {:?}", path);
            }
            csv_table::read_path(path)?
        },
        #[cfg(feature = "xlsx")]
        TableFormat::Spreadsheet => xlsx_table::read_path(path, sheet)?,
    };

    if raw.is_empty() {
        return Err(PointMapError::EmptyPointTable {
            path: path.to_path_buf(),
        });
    }

    let (rows, rejected) = validate_rows(raw);
    info!(
        "Point table {:?}: {} rows accepted, {} rejected",
        path,
        rows.len(),
        rejected.len()
    );

    Ok(PointTable {
        path: path.to_path_buf(),
        rows,
        rejected,
    })
}

/// Validate every raw row, collecting all failures instead of stopping at the first
pub fn validate_rows(
    raw: impl IntoIterator<Item = (usize, RawSignalRow)>,
) -> (Vec<SignalRow>, Vec<PointMapError>) {
    let mut rows = Vec::new();
    let mut rejected = Vec::new();

    for (index, row) in raw {
        match row.validate(index) {
            Ok(row) => rows.push(row),
            Err(e) => {
                warn!("{}", e);
                rejected.push(e);
            },
        }
    }

    (rows, rejected)
}

/// Deserialize records against a header row. Records with only empty cells
/// (trailing spreadsheet rows) are skipped but still count towards the index.
pub(crate) fn deserialize_records<I>(
    headers: &StringRecord,
    records: I,
) -> Result<Vec<(usize, RawSignalRow)>>
where
    I: IntoIterator<Item = Result<StringRecord>>,
{
    // Excel-exported CSV may carry a UTF-8 BOM on the first header
    let headers: StringRecord = headers
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim())
        .collect();
    let names: Vec<&str> = headers.iter().collect();
    check_headers(names.iter().copied())?;

    let mut rows = Vec::new();
    for (index, record) in records.into_iter().enumerate() {
        let record = record?;
        if record.iter().all(|field| field.trim().is_empty()) {
            debug!("Skipping blank row {}", index);
            continue;
        }

        let row: RawSignalRow = record.deserialize(Some(&headers))?;
        rows.push((index, row));
    }
    Ok(rows)
}
