//! Device assembly
//!
//! Groups validated rows by device name (first-seen order), resolves each
//! device's transport from its first row and turns every row into a read or
//! write point through the address resolver.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::address;
use crate::error::{PointMapError, Result};
use crate::model::{Device, ReadPoint, Transport, WritePoint};
use crate::row::{OperationKind, SignalRow, TransportFields};

/// Values used when a row leaves an optional cell empty
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Defaults {
    pub baud: u32,
    pub slave: u8,
    pub tcp_port: u16,
    pub unit: u8,
    pub period_ms: u32,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            baud: 9600,
            slave: 1,
            tcp_port: 502,
            unit: 1,
            period_ms: 500,
        }
    }
}

/// Assembly behaviour switches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssemblyOptions {
    pub defaults: Defaults,
    /// Reject rows whose transport disagrees with the device's first row
    /// instead of only warning
    pub strict_transport: bool,
}

/// Builds [`Device`] entries from validated rows
#[derive(Debug, Clone, Default)]
pub struct DeviceAssembler {
    options: AssemblyOptions,
}

impl DeviceAssembler {
    pub fn new(options: AssemblyOptions) -> Self {
        Self { options }
    }

    /// Assemble devices in the order their names first appear.
    ///
    /// Stops at the first row that fails to resolve; no partial device list
    /// is returned.
    pub fn assemble(&self, rows: &[SignalRow]) -> Result<Vec<Device>> {
        let groups = group_by_device(rows);
        info!(
            "Assembling {} devices from {} rows",
            groups.len(),
            rows.len()
        );

        groups
            .into_iter()
            .map(|(name, group)| self.assemble_device(name, &group))
            .collect()
    }

    fn assemble_device(&self, name: &str, rows: &[&SignalRow]) -> Result<Device> {
        // group_by_device never yields an empty group
        let first = rows[0];
        self.check_transport(name, first, &rows[1..])?;

        let mut device = Device::new(name, self.resolve_transport(name, &first.transport));

        for row in rows {
            let resolved = address::resolve(&row.register, row.operation).map_err(|source| {
                PointMapError::RowProcessing {
                    row: row.index,
                    device: name.to_string(),
                    source,
                }
            })?;

            match row.operation {
                OperationKind::Read => device.reads.push(ReadPoint {
                    fc: resolved.function_code,
                    addr: resolved.offset,
                    tag: row.tag.clone(),
                    period_ms: row.period_ms.unwrap_or(self.options.defaults.period_ms),
                }),
                OperationKind::Write => {
                    if row.period_ms.is_some() {
                        debug!(
                            "Row {}: read period ignored on write point '{}'",
                            row.index, row.tag
                        );
                    }
                    device.writes.push(WritePoint {
                        fc: resolved.function_code,
                        addr: resolved.offset,
                        tag: row.tag.clone(),
                    });
                },
            }
        }

        debug!(
            "Device '{}' ({}): {} read, {} write",
            device.name,
            device.kind(),
            device.reads.len(),
            device.writes.len()
        );
        Ok(device)
    }

    fn resolve_transport(&self, name: &str, fields: &TransportFields) -> Transport {
        let defaults = &self.options.defaults;
        match fields {
            TransportFields::Rtu { port, baud, slave } => {
                if port.is_empty() {
                    warn!("Device '{}': serial port is empty", name);
                }
                Transport::Rtu {
                    port: port.clone(),
                    baud: baud.unwrap_or(defaults.baud),
                    slave: slave.unwrap_or(defaults.slave),
                }
            },
            TransportFields::Tcp { ip, port, unit } => {
                if ip.is_empty() {
                    warn!("Device '{}': IP address is empty", name);
                }
                Transport::Tcp {
                    address: format!("{}:{}", ip, port.unwrap_or(defaults.tcp_port)),
                    unit: unit.unwrap_or(defaults.unit),
                }
            },
        }
    }

    /// The first row wins; later rows are only compared against it
    fn check_transport(&self, name: &str, first: &SignalRow, rest: &[&SignalRow]) -> Result<()> {
        for row in rest {
            if let Some((field, ours, theirs)) = first.transport.first_difference(&row.transport) {
                if self.options.strict_transport {
                    return Err(PointMapError::TransportConflict {
                        device: name.to_string(),
                        row: row.index,
                        field,
                        first: ours,
                        found: theirs,
                    });
                }
                warn!(
                    "Device '{}': row {} has {} '{}', keeping '{}' from row {}",
                    name, row.index, field, theirs, ours, first.index
                );
            }
        }
        Ok(())
    }
}

/// Assemble with default options
pub fn assemble(rows: &[SignalRow]) -> Result<Vec<Device>> {
    DeviceAssembler::default().assemble(rows)
}

/// Stable grouping: groups in first-seen order, rows in input order
fn group_by_device(rows: &[SignalRow]) -> Vec<(&str, Vec<&SignalRow>)> {
    let mut slots: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<(&str, Vec<&SignalRow>)> = Vec::new();

    for row in rows {
        let slot = *slots.entry(row.device.as_str()).or_insert_with(|| {
            groups.push((row.device.as_str(), Vec::new()));
            groups.len() - 1
        });
        groups[slot].1.push(row);
    }

    groups
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::address::FunctionCode;
    use crate::error::AddressError;
    use tracing_test::traced_test;

    fn rtu(index: usize, device: &str, register: &str, op: OperationKind) -> SignalRow {
        SignalRow {
            index,
            device: device.to_string(),
            transport: TransportFields::Rtu {
                port: "COM1".to_string(),
                baud: None,
                slave: None,
            },
            register: register.to_string(),
            operation: op,
            tag: format!("T{}", index),
            period_ms: None,
        }
    }

    #[test]
    fn test_first_seen_device_order() {
        let rows = vec![
            rtu(0, "B", "40001", OperationKind::Read),
            rtu(1, "A", "40002", OperationKind::Read),
            rtu(2, "B", "40003", OperationKind::Read),
            rtu(3, "A", "40004", OperationKind::Read),
        ];

        let devices = assemble(&rows).unwrap();
        let names: Vec<_> = devices.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["B", "A"]);

        let b_addrs: Vec<_> = devices[0].reads.iter().map(|p| p.addr).collect();
        assert_eq!(b_addrs, [1, 3]);
        let a_tags: Vec<_> = devices[1].reads.iter().map(|p| p.tag.as_str()).collect();
        assert_eq!(a_tags, ["T1", "T3"]);
    }

    #[test]
    fn test_rtu_defaults() {
        let devices = assemble(&[rtu(0, "M1", "30001", OperationKind::Read)]).unwrap();

        assert_eq!(
            devices[0].transport,
            Transport::Rtu {
                port: "COM1".to_string(),
                baud: 9600,
                slave: 1
            }
        );
        assert_eq!(devices[0].reads[0].period_ms, 500);
        assert_eq!(devices[0].reads[0].fc, FunctionCode::ReadInputRegisters);
    }

    #[test]
    fn test_tcp_defaults() {
        let row = SignalRow {
            transport: TransportFields::Tcp {
                ip: "192.168.1.10".to_string(),
                port: None,
                unit: None,
            },
            ..rtu(0, "PLC", "00001", OperationKind::Write)
        };

        let devices = assemble(&[row]).unwrap();
        assert_eq!(
            devices[0].transport,
            Transport::Tcp {
                address: "192.168.1.10:502".to_string(),
                unit: 1
            }
        );
        assert_eq!(devices[0].writes[0].fc, FunctionCode::WriteSingleCoil);
        assert!(devices[0].reads.is_empty());
    }

    #[test]
    fn test_custom_defaults() {
        let assembler = DeviceAssembler::new(AssemblyOptions {
            defaults: Defaults {
                baud: 115200,
                slave: 9,
                period_ms: 2000,
                ..Defaults::default()
            },
            strict_transport: false,
        });

        let devices = assembler
            .assemble(&[rtu(0, "M1", "40001", OperationKind::Read)])
            .unwrap();
        assert_eq!(
            devices[0].transport,
            Transport::Rtu {
                port: "COM1".to_string(),
                baud: 115200,
                slave: 9
            }
        );
        assert_eq!(devices[0].reads[0].period_ms, 2000);
    }

    #[test]
    fn test_failed_row_aborts_with_index() {
        let rows = vec![
            rtu(0, "M1", "40001", OperationKind::Read),
            rtu(1, "M2", "40001", OperationKind::Read),
            rtu(2, "M2", "10005", OperationKind::Write),
            rtu(3, "M3", "40001", OperationKind::Read),
        ];

        match assemble(&rows).unwrap_err() {
            PointMapError::RowProcessing { row, device, source } => {
                assert_eq!(row, 2);
                assert_eq!(device, "M2");
                assert!(matches!(source, AddressError::UnsupportedOperation { .. }));
            },
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_assembly_is_deterministic() {
        let rows: Vec<_> = (0..20)
            .map(|i| {
                let device = format!("D{}", i % 3);
                let op = if i % 2 == 0 {
                    OperationKind::Read
                } else {
                    OperationKind::Write
                };
                rtu(i, &device, &format!("4{:04}", i), op)
            })
            .collect();

        let first = serde_yaml::to_string(&assemble(&rows).unwrap()).unwrap();
        let second = serde_yaml::to_string(&assemble(&rows).unwrap()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    #[traced_test]
    fn test_transport_conflict_warns_and_keeps_first_row() {
        let mut second = rtu(1, "M1", "40002", OperationKind::Read);
        second.transport = TransportFields::Rtu {
            port: "COM2".to_string(),
            baud: None,
            slave: None,
        };
        let rows = vec![rtu(0, "M1", "40001", OperationKind::Read), second];

        let devices = assemble(&rows).unwrap();
        assert!(matches!(
            &devices[0].transport,
            Transport::Rtu { port, .. } if port == "COM1"
        ));
        assert!(logs_contain("row 1 has port 'COM2', keeping 'COM1'"));
    }

    #[test]
    fn test_transport_conflict_strict() {
        let mut second = rtu(5, "M1", "40002", OperationKind::Read);
        second.transport = TransportFields::Rtu {
            port: "COM1".to_string(),
            baud: Some(19200),
            slave: None,
        };
        let rows = vec![rtu(0, "M1", "40001", OperationKind::Read), second];

        let assembler = DeviceAssembler::new(AssemblyOptions {
            strict_transport: true,
            ..AssemblyOptions::default()
        });

        match assembler.assemble(&rows).unwrap_err() {
            PointMapError::TransportConflict {
                device,
                row,
                field,
                found,
                ..
            } => {
                assert_eq!(device, "M1");
                assert_eq!(row, 5);
                assert_eq!(field, "baud");
                assert_eq!(found, "19200");
            },
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_empty_input() {
        assert!(assemble(&[]).unwrap().is_empty());
    }
}
