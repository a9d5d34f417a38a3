//! Configuration loading and types

use std::path::{Path, PathBuf};
use std::time::Duration;

use eyre::WrapErr;
use fleetcheck_core::ReportFormat;
use serde::{Deserialize, Serialize};

/// Environment variable pointing at an explicit config file
pub const CONFIG_ENV: &str = "FLEETCHECK_CONFIG";

/// Top-level configuration for fleetcheck
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_format: LogFormat,
    #[serde(default)]
    pub ssh: SshConfig,
    #[serde(default)]
    pub report: ReportConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::default(),
            ssh: SshConfig::default(),
            report: ReportConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Remote session settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SshConfig {
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

impl SshConfig {
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReportConfig {
    /// Report format used when `--report-format` is not given
    #[serde(default = "default_report_format")]
    pub format: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            format: default_report_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_report_format() -> String {
    "html".to_string()
}

impl Config {
    /// Load configuration from file
    ///
    /// # Errors
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &Path) -> eyre::Result<Self> {
        let content = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .wrap_err_with(|| format!("invalid config {}", path.display()))?;
        config.report_format()?;
        Ok(config)
    }

    /// Load from `FLEETCHECK_CONFIG` or the default paths, or use defaults
    ///
    /// # Errors
    /// Returns error if a config file exists but cannot be loaded
    pub fn load_default() -> eyre::Result<Self> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Self::load(Path::new(&path));
        }

        for path in search_paths() {
            if path.exists() {
                return Self::load(&path);
            }
        }

        tracing::debug!("no config file found, using defaults");
        Ok(Config::default())
    }

    /// Default report format from the `[report]` section
    ///
    /// # Errors
    /// Returns error if the configured format is unknown
    pub fn report_format(&self) -> eyre::Result<ReportFormat> {
        self.report.format.parse().map_err(|e: String| eyre::eyre!(e))
    }
}

fn search_paths() -> Vec<PathBuf> {
    let mut paths = vec![
        PathBuf::from("fleetcheck.toml"),
        PathBuf::from("/etc/fleetcheck/fleetcheck.toml"),
    ];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("fleetcheck/fleetcheck.toml"));
    }
    paths
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config: Config = toml::from_str("").unwrap();

        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, LogFormat::Text);
        assert_eq!(config.ssh.connect_timeout(), Duration::from_secs(10));
        assert_eq!(config.report_format().unwrap(), ReportFormat::Html);
    }

    #[test]
    fn test_default_matches_empty_file() {
        let config = Config::default();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.report.format, "html");
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fleetcheck.toml");
        std::fs::write(
            &path,
            r#"
log_level = "debug"
log_format = "json"

[ssh]
connect_timeout_secs = 3

[report]
format = "csv"
"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.ssh.connect_timeout_secs, 3);
        assert_eq!(config.report_format().unwrap(), ReportFormat::Csv);
    }

    #[test]
    fn test_unknown_report_format_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fleetcheck.toml");
        std::fs::write(&path, "[report]\nformat = \"pdf\"\n").unwrap();

        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(Config::load(Path::new("/nonexistent/fleetcheck.toml")).is_err());
    }

    #[test]
    fn test_search_paths_start_in_working_directory() {
        let paths = search_paths();
        assert_eq!(paths[0], PathBuf::from("fleetcheck.toml"));
        assert_eq!(paths[1], PathBuf::from("/etc/fleetcheck/fleetcheck.toml"));
    }
}
