//! Configuration merge
//!
//! The device list is rebuilt from the point table on every run; only the
//! `global` section of the existing document survives.

use tracing::info;

use crate::model::{ConfigDocument, Device};

/// Build a new document from `existing` with its device list replaced.
///
/// `global` is copied verbatim (key order included). Devices present in
/// `existing` but absent from `devices` are dropped.
pub fn merge(existing: &ConfigDocument, devices: Vec<Device>) -> ConfigDocument {
    info!(
        "Replacing {} existing devices with {} assembled devices",
        existing.devices.len(),
        devices.len()
    );

    ConfigDocument {
        global: existing.global.clone(),
        devices,
    }
}
