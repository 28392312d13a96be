//! Signal point table to Modbus device configuration
//!
//! Turns the rows of a signal point table (one row per device register) into
//! the `devices` section of a Modbus poller configuration:
//!
//! ```text
//! point table -> RawSignalRow -> SignalRow -> address::resolve -> DeviceAssembler -> merge -> config.yaml
//! ```
//!
//! The core (`address`, `assembler`, `merger`) is pure and in-memory; file
//! access lives in `table` (input) and `emitter` / [`ConfigDocument::load`]
//! (output).

pub mod address;
pub mod assembler;
pub mod emitter;
pub mod error;
pub mod merger;
pub mod model;
pub mod row;
pub mod table;

pub use address::{resolve, FunctionCode, RegisterClass, ResolvedAddress};
pub use assembler::{assemble, AssemblyOptions, Defaults, DeviceAssembler};
pub use error::{AddressError, PointMapError, Result};
pub use merger::merge;
pub use model::{ConfigDocument, Device, ReadPoint, Transport, WritePoint};
pub use row::{DeviceKind, OperationKind, RawSignalRow, SignalRow, TransportFields};
pub use table::{detect_input, read_table, PointTable};

/// Assemble `rows` and merge them into `existing`.
///
/// Nothing is returned unless every row resolves, so callers can persist the
/// result without risking a partial device list.
pub fn build_document(
    existing: &ConfigDocument,
    rows: &[SignalRow],
    options: AssemblyOptions,
) -> Result<ConfigDocument> {
    let devices = DeviceAssembler::new(options).assemble(rows)?;
    Ok(merge(existing, devices))
}
