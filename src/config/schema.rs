//! Bootstrap configuration schema.
//!
//! Only the sections the host itself reads are typed here. Plugin sections
//! stay opaque and are decoded by the plugins that own them.

use serde::{Deserialize, Serialize};

/// Sections the host reads before any plugin loads.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct HostConfig {
    /// Application identity.
    pub application: ApplicationConfig,

    /// Log output settings.
    pub logging: LoggingConfig,
}

/// Application identity reported to plugins and logs.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ApplicationConfig {
    /// Service name.
    pub name: String,

    /// Service version.
    pub version: String,

    /// Host name override. Falls back to the `HOSTNAME` environment variable.
    pub host: Option<String>,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: "plughost".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            host: None,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (e.g. "info" or "plughost=debug,tower_http=info").
    pub level: String,

    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Log line format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Multi-line human readable output.
    #[default]
    Pretty,
    /// Single-line human readable output.
    Compact,
    /// One JSON object per line.
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn test_defaults_when_sections_missing() {
        let config: HostConfig = Config::parse("[http]\naddr = \"127.0.0.1:0\"")
            .unwrap()
            .scan()
            .unwrap();
        assert_eq!(config, HostConfig::default());
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn test_partial_sections() {
        let config: HostConfig = Config::parse(
            r#"
            [application]
            name = "orders"

            [logging]
            format = "json"
            "#,
        )
        .unwrap()
        .scan()
        .unwrap();
        assert_eq!(config.application.name, "orders");
        assert_eq!(config.application.version, env!("CARGO_PKG_VERSION"));
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, LogFormat::Json);
    }
}
