//! Configuration document output
//!
//! [`render`] lays the document out the way operators maintain `config.yaml`
//! by hand: two-space indented lists, one blank line after each device.
//! Scalars go through `serde_yaml` so anything that needs quoting is quoted
//! and the text always parses back to the same document.

use serde::Serialize;
use serde_yaml::Value;
use std::fmt::Write as _;
use std::io::Write as _;
use std::path::Path;
use tracing::info;

use crate::error::Result;
use crate::model::{ConfigDocument, Device, Transport};

/// Render a document as YAML text
pub fn render(doc: &ConfigDocument) -> Result<String> {
    let mut out = String::new();

    if doc.global.is_empty() {
        out.push_str("global: {}\n");
    } else {
        out.push_str("global:\n");
        for (key, value) in &doc.global {
            let key = scalar(key)?;
            match value {
                Value::Mapping(_) | Value::Sequence(_) | Value::Tagged(_) => {
                    let _ = writeln!(out, "  {}:", key);
                    out.push_str(&indent(&serde_yaml::to_string(value)?, 4));
                },
                _ => {
                    let _ = writeln!(out, "  {}: {}", key, scalar(value)?);
                },
            }
        }
    }

    out.push('\n');

    if doc.devices.is_empty() {
        out.push_str("devices: []\n");
        return Ok(out);
    }

    out.push_str("devices:\n");
    for device in &doc.devices {
        render_device(&mut out, device)?;
        out.push('\n');
    }

    Ok(out)
}

fn render_device(out: &mut String, device: &Device) -> Result<()> {
    let _ = writeln!(out, "  - name: {}", scalar(&device.name)?);
    let _ = writeln!(out, "    type: {}", device.kind());

    match &device.transport {
        Transport::Rtu { port, baud, slave } => {
            let _ = writeln!(out, "    port: {}", scalar(port)?);
            let _ = writeln!(out, "    baud: {}", baud);
            let _ = writeln!(out, "    slave: {}", slave);
        },
        Transport::Tcp { address, unit } => {
            let _ = writeln!(out, "    address: {}", scalar(address)?);
            let _ = writeln!(out, "    unit: {}", unit);
        },
    }

    if !device.reads.is_empty() {
        out.push_str("    read:\n");
        for point in &device.reads {
            let _ = writeln!(out, "      - fc: {}", point.fc.code());
            let _ = writeln!(out, "        addr: {}", point.addr);
            let _ = writeln!(out, "        tag: {}", scalar(&point.tag)?);
            let _ = writeln!(out, "        period_ms: {}", point.period_ms);
        }
    }

    if !device.writes.is_empty() {
        out.push_str("    write:\n");
        for point in &device.writes {
            let _ = writeln!(out, "      - fc: {}", point.fc.code());
            let _ = writeln!(out, "        addr: {}", point.addr);
            let _ = writeln!(out, "        tag: {}", scalar(&point.tag)?);
        }
    }

    Ok(())
}

/// Single-line YAML form of a scalar, quoted when needed
fn scalar<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let text = serde_yaml::to_string(value)?;
    let text = text.trim_end_matches('\n');
    if !text.contains('\n') {
        return Ok(text.to_string());
    }

    // Block scalars are indented for the top level and break under a nested key
    match serde_yaml::to_value(value)? {
        Value::String(s) => Ok(double_quoted(&s)),
        _ => Ok(text.to_string()),
    }
}

fn double_quoted(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() || c == '\u{2028}' || c == '\u{2029}' => {
                let _ = write!(out, "\\u{:04X}", c as u32);
            },
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn indent(text: &str, width: usize) -> String {
    let pad = " ".repeat(width);
    text.lines()
        .map(|line| format!("{}{}\n", pad, line))
        .collect()
}

/// Write the document over `path` atomically.
///
/// The text goes to a temp file next to `path` first and is renamed into
/// place, so a failure never leaves a half-written config behind.
pub fn persist(doc: &ConfigDocument, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let text = render(doc)?;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(text.as_bytes())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;

    info!(
        "Wrote {} devices to {:?} ({} bytes)",
        doc.devices.len(),
        path,
        text.len()
    );
    Ok(())
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::address::FunctionCode;
    use crate::model::{ReadPoint, WritePoint};
    use std::fs;
    use tempfile::TempDir;

    fn sample() -> ConfigDocument {
        let mut doc = ConfigDocument::from_yaml_str(
            "global:\n  poll_interval: 100\n  log_level: info\n  redis:\n    host: 127.0.0.1\n    port: 6379\n",
        )
        .unwrap();

        let mut m1 = Device::new(
            "M1",
            Transport::Rtu {
                port: "COM3".to_string(),
                baud: 9600,
                slave: 2,
            },
        );
        m1.reads.push(ReadPoint {
            fc: FunctionCode::ReadInputRegisters,
            addr: 1,
            tag: "A相电压".to_string(),
            period_ms: 500,
        });

        let mut d1 = Device::new(
            "D1",
            Transport::Tcp {
                address: "10.0.0.5:502".to_string(),
                unit: 1,
            },
        );
        d1.writes.push(WritePoint {
            fc: FunctionCode::WriteSingleCoil,
            addr: 7,
            tag: "Relay: main".to_string(),
        });

        doc.devices = vec![m1, d1];
        doc
    }

    #[test]
    fn test_render_layout() {
        let text = render(&sample()).unwrap();

        assert!(text.starts_with("global:\n  poll_interval: 100\n  log_level: info\n"));
        assert!(text.contains("  redis:\n    host: 127.0.0.1\n    port: 6379\n"));
        assert!(text.contains("\ndevices:\n  - name: M1\n    type: rtu\n    port: COM3\n"));
        assert!(text.contains(
            "    read:\n      - fc: 4\n        addr: 1\n        tag: A相电压\n        period_ms: 500\n"
        ));
        assert!(text.contains("  - name: D1\n    type: tcp\n"));
        // D1 has no read points
        let d1 = &text[text.find("  - name: D1").unwrap()..];
        assert!(!d1.contains("read:"));
        assert!(!d1.contains("period_ms"));
    }

    #[test]
    fn test_render_parses_back() {
        let doc = sample();
        let back = ConfigDocument::from_yaml_str(&render(&doc).unwrap()).unwrap();

        assert_eq!(back, doc);
        // tag containing ": " had to be quoted to survive
        assert_eq!(back.devices[1].writes[0].tag, "Relay: main");
    }

    #[test]
    fn test_multiline_values_parse_back() {
        let mut doc = sample();
        doc.global
            .insert("banner".into(), Value::String("line1\nline2".to_string()));
        doc.global.insert(
            "site".into(),
            serde_yaml::from_str("name: \"North\\nyard\"\nrack: 2").unwrap(),
        );
        doc.devices[1].writes[0].tag = "Relay\nmain \"A\" \\".to_string();

        let text = render(&doc).unwrap();
        assert!(text.contains("  banner: \"line1\\nline2\"\n"));
        assert!(text.contains("        tag: \"Relay\\nmain \\\"A\\\" \\\\\"\n"));

        let back = ConfigDocument::from_yaml_str(&text).unwrap();
        assert_eq!(back, doc);
        assert_eq!(back.global["banner"], "line1\nline2");
        assert_eq!(back.global["site"]["name"], "North\nyard");
    }

    #[test]
    fn test_render_empty_sections() {
        let text = render(&ConfigDocument::default()).unwrap();
        assert_eq!(text, "global: {}\n\ndevices: []\n");

        let back = ConfigDocument::from_yaml_str(&text).unwrap();
        assert_eq!(back, ConfigDocument::default());
    }

    #[test]
    fn test_persist_replaces_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "global:\n  poll_interval: 1\n").unwrap();

        persist(&sample(), &path).unwrap();

        let written = fs::read_to_string(&path).unwrap();
        assert_eq!(written, render(&sample()).unwrap());
        // no temp files left behind
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
