//! Configuration loading from disk.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::schema::HostConfig;
use crate::config::source::Config;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading and decoding.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file or directory could not be read.
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The document is not valid TOML.
    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// A section could not be decoded into its typed structure.
    #[error("invalid value at `{key}`: {source}")]
    Decode {
        key: String,
        #[source]
        source: toml::de::Error,
    },

    /// Semantic validation failed.
    #[error("validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file or a directory of them.
///
/// Directory entries are read in file name order and deep-merged, so a later
/// file overrides keys set by an earlier one.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let io_err = |source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    };

    let root = if path.is_dir() {
        let mut files: Vec<PathBuf> = fs::read_dir(path)
            .map_err(io_err)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "toml"))
            .collect();
        files.sort();

        let mut merged = toml::Table::new();
        for file in files {
            tracing::debug!(file = %file.display(), "Reading config file");
            merge_tables(&mut merged, read_table(&file)?);
        }
        merged
    } else {
        read_table(path)?
    };

    let config = Config::from_table(root);
    let host: HostConfig = config.scan()?;
    validate_config(&host).map_err(ConfigError::Validation)?;

    Ok(config)
}

fn read_table(path: &Path) -> Result<toml::Table, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(toml::from_str(&content)?)
}

/// Recursively merge `overlay` into `base`. Tables merge, everything else is
/// replaced.
pub fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("plughost-config-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_load_single_file() {
        let dir = scratch_dir();
        let file = dir.join("host.toml");
        fs::write(&file, "[application]\nname = \"orders\"\n\n[cache]\nttl_secs = 5\n").unwrap();

        let config = load_config(&file).unwrap();
        assert!(config.value("cache").is_present());
        let host: HostConfig = config.scan().unwrap();
        assert_eq!(host.application.name, "orders");

        fs::remove_dir_all(dir).unwrap_or_default();
    }

    #[test]
    fn test_load_directory_merges_in_name_order() {
        let dir = scratch_dir();
        fs::write(dir.join("10-base.toml"), "[http]\naddr = \"0.0.0.0:80\"\ntimeout_secs = 5\n").unwrap();
        fs::write(dir.join("20-local.toml"), "[http]\naddr = \"127.0.0.1:0\"\n").unwrap();
        fs::write(dir.join("notes.txt"), "not toml").unwrap();

        let config = load_config(&dir).unwrap();
        let http = config.value("http");
        let table = http.raw().and_then(|v| v.as_table()).unwrap();
        assert_eq!(table["addr"].as_str(), Some("127.0.0.1:0"));
        assert_eq!(table["timeout_secs"].as_integer(), Some(5));

        fs::remove_dir_all(dir).unwrap_or_default();
    }

    #[test]
    fn test_validation_failure() {
        let dir = scratch_dir();
        let file = dir.join("bad.toml");
        fs::write(&file, "[application]\nname = \"\"\n").unwrap();

        let err = load_config(&file).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(ref e) if e.len() == 1));
        assert!(err.to_string().contains("application.name"));

        fs::remove_dir_all(dir).unwrap_or_default();
    }

    #[test]
    fn test_missing_file() {
        let err = load_config(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
