//! # Plux Configuration
//!
//! Project level settings for plugin discovery and loading.
//!
//! The configuration is looked up in the working directory, first in a
//! dedicated `plux.toml`, `plux.yaml`, `plux.yml` or `plux.config.json` file, then in
//! the `[package.metadata.plux]` table of `Cargo.toml`. When neither exists the
//! defaults apply. Keys that are not known are reported with a warning and
//! otherwise ignored.
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::build::index::IndexFormat;
use crate::core::listener::ListenerErrorPolicy;
use crate::runtime::conflict::ConflictPolicy;
use crate::runtime::filter::{ExclusionRule, MatchingPluginFilter};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("error reading config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("error parsing {format} config file {path}: {message}")]
    Parse {
        path: PathBuf,
        format: &'static str,
        message: String,
    },

    #[error("invalid plux configuration in {path}: {source}")]
    Invalid {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("unsupported config file format: {0}")]
    UnsupportedFormat(PathBuf),

    #[error("invalid exclusion pattern: {0}")]
    Pattern(#[from] glob::PatternError),
}

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// JSON format (.json)
    Json,
    /// YAML format (.yaml, .yml) - requires "yaml-config" feature
    #[cfg(feature = "yaml-config")]
    Yaml,
    /// TOML format (.toml) - requires "toml-config" feature
    #[cfg(feature = "toml-config")]
    Toml,
}

impl ConfigFormat {
    pub fn name(&self) -> &'static str {
        match self {
            ConfigFormat::Json => "JSON",
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => "YAML",
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => "TOML",
        }
    }

    /// Determine format from file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| match ext.to_lowercase().as_str() {
                "json" => Some(ConfigFormat::Json),
                #[cfg(feature = "yaml-config")]
                "yaml" | "yml" => Some(ConfigFormat::Yaml),
                #[cfg(feature = "toml-config")]
                "toml" => Some(ConfigFormat::Toml),
                _ => None,
            })
    }

    /// Parse text in this format into a generic value tree
    pub fn parse(&self, text: &str) -> Result<Value, String> {
        match self {
            ConfigFormat::Json => serde_json::from_str(text).map_err(|e| e.to_string()),
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => serde_yaml::from_str(text).map_err(|e| e.to_string()),
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => toml::from_str(text).map_err(|e| e.to_string()),
        }
    }
}

const KNOWN_KEYS: &[&str] = &[
    "include",
    "exclude",
    "entrypoint_static_file",
    "output_format",
    "exclusions",
    "listener_errors",
    "conflicts",
];

/// Configuration object with default values for everything.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluxConfig {
    /// Module patterns to scan; empty means every registered module
    pub include: Vec<String>,
    /// Module patterns to leave out of scanning
    pub exclude: Vec<String>,
    /// Path, relative to the working directory, of the generated index file
    pub entrypoint_static_file: String,
    pub output_format: IndexFormat,
    /// Plugins to exclude from loading at run time
    pub exclusions: Vec<ExclusionRule>,
    pub listener_errors: ListenerErrorPolicy,
    pub conflicts: ConflictPolicy,
}

impl Default for PluxConfig {
    fn default() -> Self {
        Self {
            include: Vec::new(),
            exclude: Vec::new(),
            entrypoint_static_file: "plux.json".to_string(),
            output_format: IndexFormat::Json,
            exclusions: Vec::new(),
            listener_errors: ListenerErrorPolicy::default(),
            conflicts: ConflictPolicy::default(),
        }
    }
}

/// Values given on the command line, applied on top of a file configuration.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub entrypoint_static_file: Option<String>,
    pub output_format: Option<IndexFormat>,
    pub listener_errors: Option<ListenerErrorPolicy>,
    pub conflicts: Option<ConflictPolicy>,
}

impl PluxConfig {
    /// New configuration with the overrides applied. List values are merged
    /// with the existing lists, scalar values replace existing ones.
    pub fn merge(&self, overrides: &ConfigOverrides) -> PluxConfig {
        PluxConfig {
            include: union(&self.include, &overrides.include),
            exclude: union(&self.exclude, &overrides.exclude),
            entrypoint_static_file: overrides
                .entrypoint_static_file
                .clone()
                .unwrap_or_else(|| self.entrypoint_static_file.clone()),
            output_format: overrides.output_format.unwrap_or(self.output_format),
            exclusions: self.exclusions.clone(),
            listener_errors: overrides.listener_errors.unwrap_or(self.listener_errors),
            conflicts: overrides.conflicts.unwrap_or(self.conflicts),
        }
    }

    /// Build the run-time filter described by `exclusions`.
    pub fn exclusion_filter(&self) -> Result<MatchingPluginFilter, ConfigError> {
        Ok(MatchingPluginFilter::from_rules(&self.exclusions)?)
    }

    /// Interpret a value tree as a configuration. Unknown keys are ignored
    /// with a warning.
    pub fn from_value(value: Value, origin: &Path) -> Result<Self, ConfigError> {
        let value = match value {
            Value::Object(mut map) => {
                map.retain(|key, _| {
                    let known = KNOWN_KEYS.contains(&key.as_str());
                    if !known {
                        log::warn!("ignoring unknown key {} in plux configuration of {}", key, origin.display());
                    }
                    known
                });
                Value::Object(map)
            }
            Value::Null => Value::Object(Default::default()),
            other => other,
        };
        serde_json::from_value(value).map_err(|source| ConfigError::Invalid {
            path: origin.to_path_buf(),
            source,
        })
    }
}

fn union(base: &[String], extra: &[String]) -> Vec<String> {
    let mut result = base.to_vec();
    for item in extra {
        if !result.contains(item) {
            result.push(item.clone());
        }
    }
    result
}

fn read_value(path: &Path, format: ConfigFormat) -> Result<Value, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    format.parse(&text).map_err(|message| ConfigError::Parse {
        path: path.to_path_buf(),
        format: format.name(),
        message,
    })
}

/// Read a dedicated configuration file; the format follows the extension.
pub fn read_config_file(path: &Path) -> Result<PluxConfig, ConfigError> {
    let format = ConfigFormat::from_path(path).ok_or_else(|| ConfigError::UnsupportedFormat(path.to_path_buf()))?;
    let value = read_value(path, format)?;
    PluxConfig::from_value(value, path)
}

/// Candidate dedicated config files, in lookup order, for the enabled formats.
fn candidate_files() -> Vec<&'static str> {
    let mut files = Vec::new();
    #[cfg(feature = "toml-config")]
    files.push("plux.toml");
    #[cfg(feature = "yaml-config")]
    files.extend(["plux.yaml", "plux.yml"]);
    files.push("plux.config.json");
    files
}

/// Find and read the configuration for a working directory.
pub fn read_config_from_workdir(workdir: &Path) -> Result<PluxConfig, ConfigError> {
    for name in candidate_files() {
        let path = workdir.join(name);
        if path.is_file() {
            log::debug!("reading plux configuration from {}", path.display());
            return read_config_file(&path);
        }
    }

    #[cfg(feature = "toml-config")]
    {
        let manifest = workdir.join("Cargo.toml");
        if manifest.is_file() {
            let value = read_value(&manifest, ConfigFormat::Toml)?;
            if let Some(section) = value.pointer("/package/metadata/plux") {
                log::debug!("reading plux configuration from [package.metadata.plux] in {}", manifest.display());
                return PluxConfig::from_value(section.clone(), &manifest);
            }
        }
    }

    Ok(PluxConfig::default())
}
