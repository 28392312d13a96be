//! Tool settings
//!
//! Priority (highest to lowest):
//! 1. Command line flags
//! 2. Environment variables (`POINTSYNC_`, nested keys split on `__`)
//! 3. Settings file (`pointsync.yaml`, or `--settings <file>`)
//! 4. Built-in defaults

use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use voltage_pointmap::table::DEFAULT_CANDIDATES;
use voltage_pointmap::{AssemblyOptions, Defaults};

pub const DEFAULT_SETTINGS_FILE: &str = "pointsync.yaml";
const ENV_PREFIX: &str = "POINTSYNC_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Poller configuration rewritten by `sync`
    pub config_path: PathBuf,
    /// Point table files tried in order when `--input` is not given
    pub input_candidates: Vec<PathBuf>,
    /// Worksheet to read from spreadsheet tables (first sheet if unset)
    pub sheet: Option<String>,
    /// Fail on rows whose transport disagrees with the device's first row
    pub strict_transport: bool,
    /// Fallbacks for empty cells
    pub defaults: Defaults,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from("config.yaml"),
            input_candidates: DEFAULT_CANDIDATES.iter().map(PathBuf::from).collect(),
            sheet: None,
            strict_transport: false,
            defaults: Defaults::default(),
        }
    }
}

impl Settings {
    /// Load settings from defaults, the settings file and the environment.
    ///
    /// An explicitly named settings file must exist; the default one is optional.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let figment = match file {
            Some(path) => {
                if !path.is_file() {
                    anyhow::bail!("Settings file not found: {}", path.display());
                }
                Self::figment(path)
            },
            None => Self::figment(Path::new(DEFAULT_SETTINGS_FILE)),
        };

        figment.extract().context("Failed to load pointsync settings")
    }

    fn figment(file: &Path) -> Figment {
        Figment::from(Serialized::defaults(Settings::default()))
            .merge(Yaml::file(file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    pub fn assembly_options(&self) -> AssemblyOptions {
        AssemblyOptions {
            defaults: self.defaults,
            strict_transport: self.strict_transport,
        }
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_builtin_defaults() {
        Jail::expect_with(|_jail| {
            let settings = Settings::load(None).unwrap();
            assert_eq!(settings, Settings::default());
            assert_eq!(settings.config_path, PathBuf::from("config.yaml"));
            assert_eq!(
                settings.input_candidates,
                vec![PathBuf::from("信号点表.csv"), PathBuf::from("信号点表.xlsx")]
            );
            assert_eq!(settings.defaults.period_ms, 500);
            Ok(())
        });
    }

    #[test]
    fn test_file_then_env_override() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "pointsync.yaml",
                r#"
config_path: conf/poller.yaml
sheet: Points
defaults:
  baud: 19200
"#,
            )?;
            jail.set_env("POINTSYNC_DEFAULTS__PERIOD_MS", "1000");
            jail.set_env("POINTSYNC_STRICT_TRANSPORT", "true");

            let settings = Settings::load(None).unwrap();
            assert_eq!(settings.config_path, PathBuf::from("conf/poller.yaml"));
            assert_eq!(settings.sheet.as_deref(), Some("Points"));
            assert_eq!(settings.defaults.baud, 19200);
            assert_eq!(settings.defaults.period_ms, 1000);
            // untouched defaults survive partial overrides
            assert_eq!(settings.defaults.tcp_port, 502);

            let options = settings.assembly_options();
            assert!(options.strict_transport);
            assert_eq!(options.defaults.baud, 19200);
            Ok(())
        });
    }

    #[test]
    fn test_explicit_settings_file_must_exist() {
        Jail::expect_with(|_jail| {
            assert!(Settings::load(Some(Path::new("missing.yaml"))).is_err());
            Ok(())
        });
    }
}
