//! Signal point table row schema
//!
//! [`RawSignalRow`] mirrors the sheet columns as plain text (every cell is
//! optional, missing columns read as empty). [`RawSignalRow::validate`] turns
//! it into a typed [`SignalRow`], which is the only row shape the resolver
//! and assembler accept.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{PointMapError, Result};

/// Operation intent of a point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Read,
    Write,
}

impl FromStr for OperationKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let t = s.trim();
        if t.eq_ignore_ascii_case("read") {
            Ok(Self::Read)
        } else if t.eq_ignore_ascii_case("write") {
            Ok(Self::Write)
        } else {
            Err(format!("unknown operation '{}', expected read or write", t))
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => f.write_str("read"),
            Self::Write => f.write_str("write"),
        }
    }
}

/// Device transport type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    Rtu,
    Tcp,
}

impl FromStr for DeviceKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let t = s.trim();
        if t.eq_ignore_ascii_case("rtu") {
            Ok(Self::Rtu)
        } else if t.eq_ignore_ascii_case("tcp") {
            Ok(Self::Tcp)
        } else {
            Err(format!("unknown device type '{}', expected rtu or tcp", t))
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rtu => f.write_str("rtu"),
            Self::Tcp => f.write_str("tcp"),
        }
    }
}

/// A sheet column: canonical header plus accepted English aliases
#[derive(Debug, Clone, Copy)]
pub struct Column {
    pub header: &'static str,
    pub aliases: &'static [&'static str],
}

impl Column {
    pub fn matches(&self, header: &str) -> bool {
        let header = header.trim();
        self.header == header || self.aliases.contains(&header)
    }
}

pub const DEVICE_NAME: Column = Column {
    header: "设备名称",
    aliases: &["device", "device_name"],
};
pub const DEVICE_TYPE: Column = Column {
    header: "设备类型",
    aliases: &["type", "device_type"],
};
pub const REGISTER_ADDRESS: Column = Column {
    header: "寄存器地址",
    aliases: &["register", "register_address"],
};
pub const OPERATION: Column = Column {
    header: "操作类型",
    aliases: &["operation", "op"],
};
pub const DATA_TAG: Column = Column {
    header: "数据标签名",
    aliases: &["tag"],
};

/// Columns a point table must carry; the rest are optional
pub const REQUIRED_COLUMNS: &[Column] =
    &[DEVICE_NAME, DEVICE_TYPE, REGISTER_ADDRESS, OPERATION, DATA_TAG];

/// Check a header row for every required column
pub fn check_headers<'a>(headers: impl IntoIterator<Item = &'a str> + Clone) -> Result<()> {
    for column in REQUIRED_COLUMNS {
        if !headers.clone().into_iter().any(|h| column.matches(h)) {
            return Err(PointMapError::MissingColumn {
                column: column.header,
            });
        }
    }
    Ok(())
}

/// One sheet row as text, keyed by header
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RawSignalRow {
    #[serde(rename = "设备名称", alias = "device", alias = "device_name")]
    pub device: String,

    #[serde(rename = "设备类型", alias = "type", alias = "device_type")]
    pub device_type: String,

    #[serde(rename = "COM端口", alias = "com_port", alias = "serial_port")]
    pub com_port: String,

    #[serde(rename = "波特率", alias = "baud")]
    pub baud: String,

    /// Slave id; Chinese sheets also put the TCP unit id here
    #[serde(rename = "从站地址", alias = "slave", alias = "slave_id")]
    pub slave: String,

    #[serde(rename = "unit", alias = "unit_id")]
    pub unit: String,

    #[serde(rename = "IP地址", alias = "ip")]
    pub ip: String,

    /// Shared port column: serial port for RTU rows, TCP port for TCP rows
    #[serde(rename = "端口", alias = "port")]
    pub port: String,

    #[serde(rename = "tcp_port")]
    pub tcp_port: String,

    #[serde(rename = "寄存器地址", alias = "register", alias = "register_address")]
    pub register: String,

    #[serde(rename = "操作类型", alias = "operation", alias = "op")]
    pub operation: String,

    #[serde(rename = "数据标签名", alias = "tag")]
    pub tag: String,

    #[serde(rename = "读取周期", alias = "period", alias = "period_ms")]
    pub period: String,
}

/// Transport parameters as entered on a row; `None` means the cell was empty
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportFields {
    Rtu {
        port: String,
        baud: Option<u32>,
        slave: Option<u8>,
    },
    Tcp {
        ip: String,
        port: Option<u16>,
        unit: Option<u8>,
    },
}

impl TransportFields {
    pub fn kind(&self) -> DeviceKind {
        match self {
            Self::Rtu { .. } => DeviceKind::Rtu,
            Self::Tcp { .. } => DeviceKind::Tcp,
        }
    }

    /// First field that differs from `other`, as (field, ours, theirs)
    pub fn first_difference(&self, other: &Self) -> Option<(&'static str, String, String)> {
        fn show<T: fmt::Display>(v: &Option<T>) -> String {
            v.as_ref().map(|v| v.to_string()).unwrap_or_default()
        }

        match (self, other) {
            (
                Self::Rtu { port, baud, slave },
                Self::Rtu {
                    port: p2,
                    baud: b2,
                    slave: s2,
                },
            ) => {
                if port != p2 {
                    Some(("port", port.clone(), p2.clone()))
                } else if baud != b2 {
                    Some(("baud", show(baud), show(b2)))
                } else if slave != s2 {
                    Some(("slave", show(slave), show(s2)))
                } else {
                    None
                }
            },
            (
                Self::Tcp { ip, port, unit },
                Self::Tcp {
                    ip: i2,
                    port: p2,
                    unit: u2,
                },
            ) => {
                if ip != i2 {
                    Some(("ip", ip.clone(), i2.clone()))
                } else if port != p2 {
                    Some(("port", show(port), show(p2)))
                } else if unit != u2 {
                    Some(("unit", show(unit), show(u2)))
                } else {
                    None
                }
            },
            _ => Some(("type", self.kind().to_string(), other.kind().to_string())),
        }
    }
}

/// A validated point table row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalRow {
    /// 0-based position among the table's data rows
    pub index: usize,
    pub device: String,
    pub transport: TransportFields,
    /// Register address as entered, resolved later
    pub register: String,
    pub operation: OperationKind,
    pub tag: String,
    pub period_ms: Option<u32>,
}

impl RawSignalRow {
    /// Validate a raw row found at `index` into a typed [`SignalRow`]
    pub fn validate(self, index: usize) -> Result<SignalRow> {
        let device = required(&self.device, index, "device name")?;
        let kind: DeviceKind = self
            .device_type
            .parse()
            .map_err(|e: String| PointMapError::invalid_row(index, "device type", e))?;

        let transport = match kind {
            DeviceKind::Rtu => TransportFields::Rtu {
                port: first_filled(&self.com_port, &self.port).to_string(),
                baud: parse_optional(&self.baud, index, "baud")?,
                slave: parse_optional(first_filled(&self.slave, &self.unit), index, "slave")?,
            },
            DeviceKind::Tcp => TransportFields::Tcp {
                ip: self.ip.trim().to_string(),
                port: parse_optional(first_filled(&self.tcp_port, &self.port), index, "port")?,
                unit: parse_optional(first_filled(&self.unit, &self.slave), index, "unit")?,
            },
        };

        let operation: OperationKind = self
            .operation
            .parse()
            .map_err(|e: String| PointMapError::invalid_row(index, "operation", e))?;

        let register = required(&self.register, index, "register address")?;
        let tag = required(&self.tag, index, "data tag")?;

        let period_ms: Option<u32> = parse_optional(&self.period, index, "read period")?;
        if period_ms == Some(0) {
            return Err(PointMapError::invalid_row(
                index,
                "read period",
                "period must be greater than 0",
            ));
        }

        Ok(SignalRow {
            index,
            device,
            transport,
            register,
            operation,
            tag,
            period_ms,
        })
    }
}

/// The type-specific cell, or the shared one when it is empty
fn first_filled<'a>(preferred: &'a str, fallback: &'a str) -> &'a str {
    let preferred = preferred.trim();
    if preferred.is_empty() {
        fallback.trim()
    } else {
        preferred
    }
}

fn required(value: &str, index: usize, field: &'static str) -> Result<String> {
    let t = value.trim();
    if t.is_empty() {
        Err(PointMapError::invalid_row(index, field, "value is empty"))
    } else {
        Ok(t.to_string())
    }
}

/// Parse an optional integer cell. Empty -> `None`; integral decimals such as
/// `9600.0` (spreadsheet exports) are accepted.
fn parse_optional<T>(value: &str, index: usize, field: &'static str) -> Result<Option<T>>
where
    T: FromStr + TryFrom<u64>,
{
    let t = value.trim();
    if t.is_empty() {
        return Ok(None);
    }

    if let Ok(v) = t.parse::<T>() {
        return Ok(Some(v));
    }

    let whole = t
        .parse::<f64>()
        .ok()
        .filter(|f| f.is_finite() && *f >= 0.0 && f.fract() == 0.0)
        .ok_or_else(|| {
            PointMapError::invalid_row(index, field, format!("'{}' is not a whole number", t))
        })?;

    T::try_from(whole as u64)
        .map(Some)
        .map_err(|_| PointMapError::invalid_row(index, field, format!("'{}' is out of range", t)))
}
