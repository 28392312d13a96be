//! Device configuration document model
//!
//! Shape of the poller's `config.yaml`:
//!
//! ```yaml
//! global:
//!   poll_interval: 100
//! devices:
//!   - name: D1
//!     type: tcp
//!     address: 10.0.0.5:502
//!     unit: 1
//!     read:
//!       - { fc: 3, addr: 3, tag: Temp, period_ms: 1000 }
//!     write:
//!       - { fc: 5, addr: 7, tag: Relay }
//! ```

use serde::{Deserialize, Deserializer, Serialize};
use serde_yaml::Mapping;
use std::path::Path;
use tracing::debug;

use crate::address::FunctionCode;
use crate::error::{PointMapError, Result};
use crate::row::DeviceKind;

/// Resolved read point; always carries a poll period
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadPoint {
    pub fc: FunctionCode,
    pub addr: u16,
    pub tag: String,
    pub period_ms: u32,
}

/// Resolved write point; never carries a period
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WritePoint {
    pub fc: FunctionCode,
    pub addr: u16,
    pub tag: String,
}

/// Resolved transport parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Transport {
    Rtu { port: String, baud: u32, slave: u8 },
    /// `address` is `"<ip>:<port>"`
    Tcp { address: String, unit: u8 },
}

impl Transport {
    pub fn kind(&self) -> DeviceKind {
        match self {
            Self::Rtu { .. } => DeviceKind::Rtu,
            Self::Tcp { .. } => DeviceKind::Tcp,
        }
    }
}

/// One device block in the configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub name: String,

    #[serde(flatten)]
    pub transport: Transport,

    #[serde(
        rename = "read",
        default,
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "null_as_default"
    )]
    pub reads: Vec<ReadPoint>,

    #[serde(
        rename = "write",
        default,
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "null_as_default"
    )]
    pub writes: Vec<WritePoint>,
}

impl Device {
    pub fn new(name: impl Into<String>, transport: Transport) -> Self {
        Self {
            name: name.into(),
            transport,
            reads: Vec::new(),
            writes: Vec::new(),
        }
    }

    pub fn kind(&self) -> DeviceKind {
        self.transport.kind()
    }

    pub fn point_count(&self) -> usize {
        self.reads.len() + self.writes.len()
    }
}

/// The whole configuration document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigDocument {
    /// Poller-wide settings, carried through untouched
    #[serde(default, deserialize_with = "null_as_default")]
    pub global: Mapping,

    #[serde(default, deserialize_with = "null_as_default")]
    pub devices: Vec<Device>,
}

impl ConfigDocument {
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Load an existing configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(PointMapError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path)?;
        let doc = Self::from_yaml_str(&content)?;
        debug!(
            "Loaded config {:?}: {} global keys, {} devices",
            path,
            doc.global.len(),
            doc.devices.len()
        );
        Ok(doc)
    }

    pub fn device(&self, name: &str) -> Option<&Device> {
        self.devices.iter().find(|d| d.name == name)
    }
}

/// Treat an explicit `null` (e.g. `devices:` with nothing under it) as empty
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
