//! CSV point tables

use csv::{ReaderBuilder, Trim};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::debug;

use super::deserialize_records;
use crate::error::{PointMapError, Result};
use crate::row::RawSignalRow;

/// Read a CSV point table from disk
pub fn read_path(path: &Path) -> Result<Vec<(usize, RawSignalRow)>> {
    let file = File::open(path)?;
    let rows = read(file)?;
    debug!("Loaded {} rows from CSV: {:?}", rows.len(), path);
    Ok(rows)
}

/// Read a CSV point table from any reader. The first record is the header.
pub fn read<R: Read>(reader: R) -> Result<Vec<(usize, RawSignalRow)>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .flexible(true) // short rows read as trailing empty cells
        .from_reader(reader);

    let headers = reader.headers()?.clone();
    deserialize_records(
        &headers,
        reader.records().map(|r| r.map_err(PointMapError::from)),
    )
}
