// SPDX-License-Identifier: GPL-3.0-only

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use storage_contracts::StorageError;
use storage_types::DesiredVolumeSpec;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse {path:?}: {reason}")]
    Parse { path: PathBuf, reason: String },
    #[error(transparent)]
    Invalid(#[from] StorageError),
    #[error("volume {volume} is declared more than once")]
    Duplicate { volume: String },
    #[error("no volume named '{name}' in the configuration")]
    UnknownVolume { name: String },
}

impl ConfigError {
    /// EX_NOINPUT for an unreadable file, EX_CONFIG otherwise
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Read { .. } => 66,
            _ => 78,
        }
    }
}

/// Declared volumes, converged in file order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VolumeConfig {
    #[serde(default)]
    pub volumes: Vec<DesiredVolumeSpec>,
}

impl VolumeConfig {
    /// Read, parse and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config: VolumeConfig = toml::from_str(&raw).map_err(|error| ConfigError::Parse {
            path: path.to_path_buf(),
            reason: error.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for spec in &self.volumes {
            storage_lvm::validate(spec)?;
            if !seen.insert((spec.group.as_str(), spec.name.as_str())) {
                return Err(ConfigError::Duplicate {
                    volume: spec.display_name(),
                });
            }
        }
        Ok(())
    }

    /// Volumes to work on: all of them, or the one matching `name` given as
    /// either `name` or `group/name`.
    pub fn select(&self, name: Option<&str>) -> Result<Vec<&DesiredVolumeSpec>, ConfigError> {
        let Some(name) = name else {
            return Ok(self.volumes.iter().collect());
        };

        let selected: Vec<_> = self
            .volumes
            .iter()
            .filter(|spec| spec.name == name || spec.display_name() == name)
            .collect();

        if selected.is_empty() {
            return Err(ConfigError::UnknownVolume {
                name: name.to_string(),
            });
        }
        Ok(selected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> Result<VolumeConfig, ConfigError> {
        let config: VolumeConfig = toml::from_str(raw).map_err(|error| ConfigError::Parse {
            path: PathBuf::from("inline.toml"),
            reason: error.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    #[test]
    fn loads_bundled_example() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("resources/volumes.example.toml");
        let config = VolumeConfig::load(&path).unwrap();

        assert_eq!(config.volumes.len(), 3);
        assert_eq!(config.volumes[0].display_name(), "vg_data/postgres");
        assert_eq!(config.volumes[1].stripe_size.as_deref(), Some("64"));
        assert_eq!(config.volumes[1].physical_volumes.0.len(), 2);
        assert!(config.volumes[2].contiguous);
    }

    #[test]
    fn rejects_duplicate_volumes() {
        let raw = r#"
            [[volumes]]
            group = "vg0"
            name = "data"
            size = "1G"

            [[volumes]]
            group = "vg0"
            name = "data"
            size = "2G"
        "#;
        let error = parse(raw).unwrap_err();
        assert!(matches!(error, ConfigError::Duplicate { ref volume } if volume == "vg0/data"));
        assert_eq!(error.exit_code(), 78);
    }

    #[test]
    fn same_name_in_other_group_is_distinct() {
        let raw = r#"
            [[volumes]]
            group = "vg0"
            name = "data"
            size = "1G"

            [[volumes]]
            group = "vg1"
            name = "data"
            size = "1G"
        "#;
        assert_eq!(parse(raw).unwrap().volumes.len(), 2);
    }

    #[test]
    fn invalid_volume_is_a_configuration_error() {
        let raw = r#"
            [[volumes]]
            group = "vg0"
            name = "data"
            size = "12Q"
        "#;
        assert!(matches!(parse(raw), Err(ConfigError::Invalid(_))));

        let unknown_key = r#"
            [[volumes]]
            group = "vg0"
            name = "data"
            size = "1G"
            color = "blue"
        "#;
        assert!(matches!(parse(unknown_key), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn missing_file_is_reported_as_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let error = VolumeConfig::load(&dir.path().join("absent.toml")).unwrap_err();
        assert_eq!(error.exit_code(), 66);
    }

    #[test]
    fn selects_by_name_or_qualified_name() {
        let mut config = VolumeConfig::default();
        config.volumes.push(DesiredVolumeSpec::new("vg0", "data", "1G"));
        config.volumes.push(DesiredVolumeSpec::new("vg1", "logs", "1G"));

        assert_eq!(config.select(None).unwrap().len(), 2);
        assert_eq!(config.select(Some("logs")).unwrap()[0].group, "vg1");
        assert_eq!(config.select(Some("vg0/data")).unwrap()[0].name, "data");
        assert!(matches!(
            config.select(Some("home")),
            Err(ConfigError::UnknownVolume { .. })
        ));
    }
}
