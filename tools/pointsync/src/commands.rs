//! `sync` and `validate` command handlers

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use voltage_pointmap::{
    build_document, detect_input, emitter, read_table, ConfigDocument, Device, DeviceAssembler,
    PointTable, Transport,
};

use crate::settings::Settings;

/// Explicit `--input` wins over auto-detection
pub fn resolve_input(settings: &Settings, explicit: Option<&Path>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => Ok(detect_input(&settings.input_candidates)?),
    }
}

/// Rebuild the device list of the config from the point table
pub fn handle_sync(settings: &Settings, input: Option<&Path>, dry_run: bool) -> Result<()> {
    let input = resolve_input(settings, input)?;
    let config_path = &settings.config_path;

    println!(
        "{} Config: {}, Point table: {}",
        "-".bright_cyan(),
        config_path.display().to_string().bright_yellow(),
        input.display().to_string().bright_yellow()
    );

    let existing = ConfigDocument::load(config_path)
        .with_context(|| format!("Failed to read config {}", config_path.display()))?;

    let table = load_table(settings, &input)?;
    if !table.is_clean() {
        print_rejections(&table);
        anyhow::bail!(
            "{} rows rejected in {}, config not modified",
            table.rejected.len(),
            input.display()
        );
    }

    let doc = build_document(&existing, &table.rows, settings.assembly_options())
        .context("Failed to assemble devices, config not modified")?;

    print_devices(&doc.devices);

    if dry_run {
        info!("Dry run, {} left untouched", config_path.display());
        println!();
        print!("{}", emitter::render(&doc)?);
        return Ok(());
    }

    emitter::persist(&doc, config_path)
        .with_context(|| format!("Failed to write config {}", config_path.display()))?;

    println!(
        "{} Config updated: {} ({} devices)",
        "OK".green(),
        config_path.display(),
        doc.devices.len()
    );
    Ok(())
}

/// Check the point table without touching the config.
///
/// Returns `false` when any row is rejected or fails to resolve.
pub fn handle_validate(settings: &Settings, input: Option<&Path>) -> Result<bool> {
    let input = resolve_input(settings, input)?;
    print!(
        "{} Validating {}... ",
        "-".bright_cyan(),
        input.display().to_string().bright_yellow()
    );

    let table = load_table(settings, &input)?;
    let assembled = DeviceAssembler::new(settings.assembly_options()).assemble(&table.rows);

    if table.is_clean() {
        if let Ok(devices) = &assembled {
            println!("{} Valid", "OK".green());
            print_devices(devices);
            return Ok(true);
        }
    }

    println!("{} Invalid", "FAIL".red());
    print_rejections(&table);
    if let Err(e) = assembled {
        eprintln!("   {} {}", "ERROR".red(), e);
    }
    Ok(false)
}

fn load_table(settings: &Settings, input: &Path) -> Result<PointTable> {
    let table = read_table(input, settings.sheet.as_deref())
        .with_context(|| format!("Failed to read point table {}", input.display()))?;
    debug!(
        "{} rows accepted, {} rejected",
        table.rows.len(),
        table.rejected.len()
    );
    Ok(table)
}

fn print_rejections(table: &PointTable) {
    for error in &table.rejected {
        eprintln!("   {} {}", "ERROR".red(), error);
    }
}

fn print_devices(devices: &[Device]) {
    for device in devices {
        let endpoint = match &device.transport {
            Transport::Rtu { port, baud, slave } => format!("{} @ {} baud, slave {}", port, baud, slave),
            Transport::Tcp { address, unit } => format!("{}, unit {}", address, unit),
        };
        println!(
            "   {} {} [{}] {}: {} read, {} write",
            "*".bright_cyan(),
            device.name.bright_yellow(),
            device.kind(),
            endpoint,
            device.reads.len(),
            device.writes.len()
        );
    }
}
