//! The plugin index file.
//!
//! At build time every discovered plugin is written into an index file that
//! maps namespaces to `name=reference` entries. The index is later turned into
//! package metadata, and [`read_index`] reads it back.
use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::entrypoint::{EntryPointDict, discover_entry_points};
use crate::core::error::PluginError;
use crate::core::finder::PluginFinder;
use crate::runtime::metadata::parse_entry_points_text;

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("error discovering plugins: {0}")]
    Discovery(#[from] PluginError),

    #[error("I/O error writing plugin index: {0}")]
    Io(#[from] io::Error),

    #[error("invalid JSON plugin index: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid INI plugin index: {0}")]
    Ini(String),

    #[error("invalid entry '{entry}' in namespace {namespace}, expected 'name=value'")]
    InvalidEntry { namespace: String, entry: String },

    #[error("unknown plugin index format '{0}', expected 'json' or 'ini'")]
    UnknownFormat(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexFormat {
    #[default]
    Json,
    Ini,
}

impl IndexFormat {
    /// Format implied by a file name: `.ini`, `.txt` and `.cfg` files are INI,
    /// everything else JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("ini" | "txt" | "cfg") => IndexFormat::Ini,
            _ => IndexFormat::Json,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IndexFormat::Json => "json",
            IndexFormat::Ini => "ini",
        }
    }
}

impl FromStr for IndexFormat {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(IndexFormat::Json),
            "ini" => Ok(IndexFormat::Ini),
            other => Err(IndexError::UnknownFormat(other.to_string())),
        }
    }
}

impl fmt::Display for IndexFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Discovers plugins through a finder and writes them as an index.
pub struct PluginIndexBuilder<'a> {
    finder: &'a dyn PluginFinder,
}

impl<'a> PluginIndexBuilder<'a> {
    pub fn new(finder: &'a dyn PluginFinder) -> Self {
        Self { finder }
    }

    /// Discover entry points, sorted within each namespace.
    pub fn build(&self) -> Result<EntryPointDict, IndexError> {
        let mut dict = discover_entry_points(self.finder)?;
        for entries in dict.values_mut() {
            entries.sort();
        }
        Ok(dict)
    }

    /// Discover entry points and write them in the given format. Nothing is
    /// written if discovery fails. Returns what was written.
    pub fn write<W: io::Write>(&self, writer: &mut W, format: IndexFormat) -> Result<EntryPointDict, IndexError> {
        let dict = self.build()?;
        write_index(writer, &dict, format)?;
        Ok(dict)
    }
}

/// Render a whole index into memory.
pub fn render_index(dict: &EntryPointDict, format: IndexFormat) -> Result<Vec<u8>, IndexError> {
    let mut buffer = Vec::new();
    write_index(&mut buffer, dict, format)?;
    Ok(buffer)
}

/// Write an already built index.
pub fn write_index<W: io::Write>(writer: &mut W, dict: &EntryPointDict, format: IndexFormat) -> Result<(), IndexError> {
    match format {
        IndexFormat::Json => {
            serde_json::to_writer_pretty(&mut *writer, dict)?;
            writer.write_all(b"\n")?;
        }
        IndexFormat::Ini => {
            for (namespace, entries) in to_nested_dict(dict)? {
                writeln!(writer, "[{}]", namespace)?;
                for (name, value) in entries {
                    writeln!(writer, "{} = {}", name, value)?;
                }
                writeln!(writer)?;
            }
        }
    }
    Ok(())
}

/// Namespace to `name -> value`, both levels sorted.
pub fn to_nested_dict(dict: &EntryPointDict) -> Result<BTreeMap<&str, BTreeMap<&str, &str>>, IndexError> {
    let mut nested = BTreeMap::new();
    for (namespace, entries) in dict {
        let section: &mut BTreeMap<&str, &str> = nested.entry(namespace.as_str()).or_default();
        for entry in entries {
            let (name, value) = entry.split_once('=').ok_or_else(|| IndexError::InvalidEntry {
                namespace: namespace.clone(),
                entry: entry.clone(),
            })?;
            section.insert(name.trim(), value.trim());
        }
    }
    Ok(nested)
}

/// Parse an index file written in either format.
pub fn read_index(text: &str, format: IndexFormat) -> Result<EntryPointDict, IndexError> {
    match format {
        IndexFormat::Json => Ok(serde_json::from_str(text)?),
        IndexFormat::Ini => {
            let mut dict = EntryPointDict::new();
            for ep in parse_entry_points_text(text).map_err(IndexError::Ini)? {
                dict.entry(ep.group.clone()).or_default().push(ep.to_string());
            }
            Ok(dict)
        }
    }
}
