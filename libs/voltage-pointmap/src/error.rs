//! Error handling for point table mapping
//!
//! Two layers: [`AddressError`] is produced by the pure address resolver and
//! knows nothing about rows or files; [`PointMapError`] wraps it with the
//! offending row and covers the input/output boundary.

use std::path::PathBuf;
use thiserror::Error;

use crate::address::RegisterClass;
use crate::row::OperationKind;

/// Register address resolution errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    /// Leading digit is not one of 0, 1, 3, 4
    #[error("Unsupported register address class '{class}' in address {address}")]
    UnsupportedAddressClass { address: String, class: char },

    /// Write requested on a read-only register class
    #[error("{class} does not support {operation} operations: {address}")]
    UnsupportedOperation {
        address: String,
        class: RegisterClass,
        operation: OperationKind,
    },

    /// Empty, non-numeric or longer than 5 digits
    #[error("Invalid register address '{address}': {reason}")]
    InvalidRegisterAddress { address: String, reason: String },
}

/// Point mapping error type
#[derive(Error, Debug)]
pub enum PointMapError {
    /// A row failed address resolution during assembly
    #[error("Failed to process row {row} (device '{device}'): {source}")]
    RowProcessing {
        row: usize,
        device: String,
        #[source]
        source: AddressError,
    },

    /// A row was rejected at the input boundary
    #[error("Invalid row {row}: {field}: {reason}")]
    InvalidRow {
        row: usize,
        field: &'static str,
        reason: String,
    },

    #[error("Missing required column: {column}")]
    MissingColumn { column: &'static str },

    /// Rows of one device disagree on transport parameters (strict mode only)
    #[error(
        "Transport conflict for device '{device}' at row {row}: {field} is '{found}', first row has '{first}'"
    )]
    TransportConflict {
        device: String,
        row: usize,
        field: &'static str,
        first: String,
        found: String,
    },

    #[error("Signal point table not found (looked for: {})", display_paths(.candidates))]
    MissingInputFile { candidates: Vec<PathBuf> },

    #[error("Signal point table has no data rows: {path:?}")]
    EmptyPointTable { path: PathBuf },

    #[error("Unsupported point table format: {path:?}")]
    UnsupportedFormat { path: PathBuf },

    #[error("Configuration file not found: {path:?}")]
    ConfigNotFound { path: PathBuf },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[cfg(feature = "xlsx")]
    #[error("Spreadsheet error: {0}")]
    Spreadsheet(#[from] calamine::Error),
}

/// Result type alias for point mapping
pub type Result<T> = std::result::Result<T, PointMapError>;

impl PointMapError {
    pub fn invalid_row(row: usize, field: &'static str, reason: impl Into<String>) -> Self {
        PointMapError::InvalidRow {
            row,
            field,
            reason: reason.into(),
        }
    }

    /// Input row index the error refers to, if any
    pub fn row(&self) -> Option<usize> {
        match self {
            PointMapError::RowProcessing { row, .. }
            | PointMapError::InvalidRow { row, .. }
            | PointMapError::TransportConflict { row, .. } => Some(*row),
            _ => None,
        }
    }
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
