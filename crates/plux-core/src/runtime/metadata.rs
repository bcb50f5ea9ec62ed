//! Entry points as advertised by installed package metadata.
//!
//! Metadata comes in two textual shapes: the INI-like `entry_points.txt`
//! format (`[group]` headers followed by `name = value` lines) and the JSON
//! plugin index written at build time. An [`EntryPointsResolver`] turns one or
//! more such sources into a `group -> [EntryPoint]` index.
use std::collections::{BTreeMap, HashSet};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use crate::build::index::{IndexFormat, read_index};
use crate::core::entrypoint::{EntryPoint, entry_points_from_dict};
use crate::core::error::{PluginError, PluginResult};

/// Entry points grouped by namespace, in the order they were found.
pub type EntryPointIndex = BTreeMap<String, Vec<EntryPoint>>;

/// Something that builds an entry point index.
pub trait EntryPointsResolver: Send + Sync {
    fn get_entry_points(&self) -> PluginResult<EntryPointIndex>;
}

impl<T: EntryPointsResolver + ?Sized> EntryPointsResolver for Arc<T> {
    fn get_entry_points(&self) -> PluginResult<EntryPointIndex> {
        (**self).get_entry_points()
    }
}

/// Resolver over entry points known up front.
#[derive(Debug, Clone, Default)]
pub struct StaticEntryPointsResolver {
    entry_points: Vec<EntryPoint>,
}

impl StaticEntryPointsResolver {
    pub fn new(entry_points: impl IntoIterator<Item = EntryPoint>) -> Self {
        Self {
            entry_points: entry_points.into_iter().collect(),
        }
    }

    /// Add a single entry point, builder style.
    pub fn with(mut self, group: &str, name: &str, value: &str) -> Self {
        self.entry_points.push(EntryPoint::new(name, value, group));
        self
    }
}

impl EntryPointsResolver for StaticEntryPointsResolver {
    fn get_entry_points(&self) -> PluginResult<EntryPointIndex> {
        Ok(build_entry_point_index(resolve_entry_points(self.entry_points.iter().cloned())))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum MetadataSource {
    File(PathBuf),
    Directory(PathBuf),
}

/// Reads entry points from metadata files on disk.
///
/// Files ending in `.json` are read as plugin index files, anything else as
/// `entry_points.txt`. Directories are searched for
/// `*.dist-info/entry_points.txt` and `*.egg-info/entry_points.txt`.
#[derive(Debug, Clone, Default)]
pub struct MetadataFileResolver {
    sources: Vec<MetadataSource>,
}

impl MetadataFileResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.sources.push(MetadataSource::File(path.into()));
        self
    }

    pub fn with_directory(mut self, path: impl Into<PathBuf>) -> Self {
        self.sources.push(MetadataSource::Directory(path.into()));
        self
    }

    fn read_file(path: &Path) -> PluginResult<Vec<EntryPoint>> {
        let text = fs::read_to_string(path).map_err(|e| metadata_error(path, e))?;
        let format = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => IndexFormat::Json,
            _ => IndexFormat::Ini,
        };
        let dict = read_index(&text, format).map_err(|e| metadata_error(path, e))?;
        entry_points_from_dict(&dict).map_err(|e| metadata_error(path, e))
    }

    fn scan_directory(dir: &Path) -> PluginResult<Vec<PathBuf>> {
        let mut files = Vec::new();
        for kind in ["*.dist-info", "*.egg-info"] {
            let pattern = dir.join(kind).join("entry_points.txt");
            let pattern = pattern.to_string_lossy();
            let paths = glob::glob(&pattern).map_err(|e| metadata_error(dir, e))?;
            // unreadable directory entries are skipped
            files.extend(paths.filter_map(Result::ok));
        }
        Ok(files)
    }
}

impl EntryPointsResolver for MetadataFileResolver {
    fn get_entry_points(&self) -> PluginResult<EntryPointIndex> {
        let mut entry_points = Vec::new();
        for source in &self.sources {
            match source {
                MetadataSource::File(path) => entry_points.extend(Self::read_file(path)?),
                MetadataSource::Directory(dir) => {
                    for file in Self::scan_directory(dir)? {
                        log::debug!("reading entry points from {}", file.display());
                        entry_points.extend(Self::read_file(&file)?);
                    }
                }
            }
        }
        Ok(build_entry_point_index(resolve_entry_points(entry_points)))
    }
}

fn metadata_error(path: &Path, error: impl std::fmt::Display) -> PluginError {
    PluginError::Metadata {
        location: path.display().to_string(),
        message: error.to_string(),
    }
}

/// Memoizes the index of another resolver for the lifetime of the cache.
///
/// The wrapped resolver is asked at most once, also under concurrent access.
/// A failed attempt is not cached.
pub struct EntryPointsCache {
    resolver: Box<dyn EntryPointsResolver>,
    index: OnceLock<EntryPointIndex>,
    lock: Mutex<()>,
}

impl EntryPointsCache {
    pub fn new(resolver: impl EntryPointsResolver + 'static) -> Self {
        Self {
            resolver: Box::new(resolver),
            index: OnceLock::new(),
            lock: Mutex::new(()),
        }
    }

    pub fn is_populated(&self) -> bool {
        self.index.get().is_some()
    }
}

impl EntryPointsResolver for EntryPointsCache {
    fn get_entry_points(&self) -> PluginResult<EntryPointIndex> {
        if let Some(index) = self.index.get() {
            return Ok(index.clone());
        }
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(index) = self.index.get() {
            return Ok(index.clone());
        }
        let index = self.resolver.get_entry_points()?;
        Ok(self.index.get_or_init(|| index).clone())
    }
}

/// Drop repeated `(name, value, group)` triples, keeping the first occurrence.
pub fn resolve_entry_points(entry_points: impl IntoIterator<Item = EntryPoint>) -> Vec<EntryPoint> {
    let mut seen = HashSet::new();
    entry_points
        .into_iter()
        .filter(|ep| seen.insert(ep.clone()))
        .collect()
}

/// Group entry points by namespace. Within a group only the first entry point
/// with a given name is kept.
pub fn build_entry_point_index(entry_points: impl IntoIterator<Item = EntryPoint>) -> EntryPointIndex {
    let mut index = EntryPointIndex::new();
    let mut names: HashSet<(String, String)> = HashSet::new();
    for ep in entry_points {
        if !names.insert((ep.group.clone(), ep.name.clone())) {
            log::debug!("ignoring duplicate entry point {} in {}", ep, ep.group);
            continue;
        }
        index.entry(ep.group.clone()).or_default().push(ep);
    }
    index
}

/// Parse the contents of an `entry_points.txt` file.
///
/// Blank lines and lines starting with `#` or `;` are ignored. Lines outside
/// of a `[group]` section, or without a `=`, are errors.
pub fn parse_entry_points_text(text: &str) -> Result<Vec<EntryPoint>, String> {
    let mut result = Vec::new();
    let mut group: Option<&str> = None;

    for (lineno, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if let Some(section) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            group = Some(section.trim());
            continue;
        }
        let Some(current) = group else {
            return Err(format!("line {}: entry point outside of a section", lineno + 1));
        };
        let ep = EntryPoint::parse(current, line).map_err(|e| format!("line {}: {}", lineno + 1, e))?;
        result.push(ep);
    }

    Ok(result)
}

/// Serialize an index in `entry_points.txt` format, groups sorted by name.
pub fn serialize_entry_points_text(index: &EntryPointIndex) -> String {
    let mut buffer = String::new();
    // BTreeMap iteration is already sorted by group
    for (group, entry_points) in index {
        let _ = writeln!(buffer, "[{}]", group);
        for ep in entry_points {
            let _ = writeln!(buffer, "{} = {}", ep.name, ep.value);
        }
        buffer.push('\n');
    }
    buffer
}
