//! Conversion between plugin specifications and entry points.
//!
//! An entry point is the `(name, value, group)` triple under which a plugin is
//! advertised in package metadata: the group is the plugin namespace and the
//! value is the `module.path:member` reference of the binding that declares
//! the plugin.
use std::collections::{BTreeMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::error::{PluginError, PluginResult, ResolutionError};
use crate::core::finder::PluginFinder;
use crate::core::spec::PluginSpec;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntryPoint {
    pub name: String,
    pub value: String,
    pub group: String,
}

impl EntryPoint {
    pub fn new(name: impl Into<String>, value: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            group: group.into(),
        }
    }

    /// Split the value into its module path and member name.
    pub fn module_and_member(&self) -> Result<(&str, &str), ResolutionError> {
        split_reference(&self.value)
    }

    /// Parse a `name=value` line of an [`EntryPointDict`].
    pub fn parse(group: &str, line: &str) -> Result<Self, ResolutionError> {
        let (name, value) = line.split_once('=').ok_or_else(|| ResolutionError::InvalidReference {
            reference: line.to_string(),
        })?;
        let (name, value) = (name.trim(), value.trim());
        if name.is_empty() || value.is_empty() {
            return Err(ResolutionError::InvalidReference {
                reference: line.to_string(),
            });
        }
        Ok(EntryPoint::new(name, value, group))
    }
}

impl fmt::Display for EntryPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)
    }
}

/// Namespace to list of `name=value` strings, in discovery order.
pub type EntryPointDict = BTreeMap<String, Vec<String>>;

/// Split a `module.path:member` reference.
pub fn split_reference(reference: &str) -> Result<(&str, &str), ResolutionError> {
    match reference.split_once(':') {
        Some((module, member)) if !module.trim().is_empty() && !member.trim().is_empty() => {
            Ok((module.trim(), member.trim()))
        }
        _ => Err(ResolutionError::InvalidReference {
            reference: reference.to_string(),
        }),
    }
}

/// Entry point of a specification, taken from the binding it was declared by.
pub fn spec_to_entry_point(spec: &PluginSpec) -> PluginResult<EntryPoint> {
    let value = spec.origin().ok_or_else(|| ResolutionError::Unbound {
        namespace: spec.namespace().to_string(),
        name: spec.name().to_string(),
    })?;
    Ok(EntryPoint::new(spec.name(), value, spec.namespace()))
}

/// Group entry points by namespace. Two entry points with the same name in one
/// group are a conflict.
pub fn to_entry_point_dict<'a>(entry_points: impl IntoIterator<Item = &'a EntryPoint>) -> PluginResult<EntryPointDict> {
    let mut result = EntryPointDict::new();
    let mut seen: HashSet<(&str, &str)> = HashSet::new();

    for ep in entry_points {
        if !seen.insert((ep.group.as_str(), ep.name.as_str())) {
            return Err(PluginError::Conflict {
                namespace: ep.group.clone(),
                name: ep.name.clone(),
            });
        }
        result.entry(ep.group.clone()).or_default().push(ep.to_string());
    }

    Ok(result)
}

/// Run the finder and turn its specifications into an [`EntryPointDict`].
pub fn discover_entry_points(finder: &dyn PluginFinder) -> PluginResult<EntryPointDict> {
    let entry_points = finder
        .find_plugins()?
        .iter()
        .map(spec_to_entry_point)
        .collect::<PluginResult<Vec<_>>>()?;
    to_entry_point_dict(&entry_points)
}

/// Flatten an [`EntryPointDict`] back into entry points.
pub fn entry_points_from_dict(dict: &EntryPointDict) -> Result<Vec<EntryPoint>, ResolutionError> {
    let mut result = Vec::new();
    for (group, lines) in dict {
        for line in lines {
            result.push(EntryPoint::parse(group, line)?);
        }
    }
    Ok(result)
}
