use std::fmt;
use std::sync::{PoisonError, RwLock};

use glob::{Pattern, PatternError};
use serde::{Deserialize, Serialize};

use crate::core::spec::PluginSpec;

/// Predicate deciding whether a specification is excluded from a manager's
/// index. `true` means the specification is suppressed.
pub trait PluginFilter: Send + Sync {
    fn is_filtered(&self, spec: &PluginSpec) -> bool;
}

impl<F> PluginFilter for F
where
    F: Fn(&PluginSpec) -> bool + Send + Sync,
{
    fn is_filtered(&self, spec: &PluginSpec) -> bool {
        self(spec)
    }
}

/// Serializable form of a matcher, as found in configuration files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExclusionRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

/// Matches specifications by shell-style patterns over their namespace, name
/// and entry point value. Every pattern that is set must match; a matcher
/// without patterns matches everything.
#[derive(Debug, Clone, Default)]
pub struct PluginSpecMatcher {
    namespace: Option<Pattern>,
    name: Option<Pattern>,
    value: Option<Pattern>,
}

impl PluginSpecMatcher {
    pub fn new(namespace: Option<&str>, name: Option<&str>, value: Option<&str>) -> Result<Self, PatternError> {
        Ok(Self {
            namespace: compile(namespace)?,
            name: compile(name)?,
            value: compile(value)?,
        })
    }

    pub fn from_rule(rule: &ExclusionRule) -> Result<Self, PatternError> {
        Self::new(rule.namespace.as_deref(), rule.name.as_deref(), rule.value.as_deref())
    }

    pub fn matches(&self, spec: &PluginSpec) -> bool {
        if let Some(pattern) = &self.namespace {
            if !pattern.matches(spec.namespace()) {
                return false;
            }
        }
        if let Some(pattern) = &self.name {
            if !pattern.matches(spec.name()) {
                return false;
            }
        }
        if let Some(pattern) = &self.value {
            // a specification without an entry point value cannot match a value pattern
            match spec.origin() {
                Some(origin) if pattern.matches(origin) => {}
                _ => return false,
            }
        }
        true
    }
}

fn compile(pattern: Option<&str>) -> Result<Option<Pattern>, PatternError> {
    match pattern {
        Some(p) if !p.is_empty() => Pattern::new(p).map(Some),
        _ => Ok(None),
    }
}

impl fmt::Display for PluginSpecMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |p: &Option<Pattern>| p.as_ref().map(|p| p.as_str().to_string()).unwrap_or_else(|| "*".to_string());
        write!(
            f,
            "PluginSpecMatcher(namespace={}, name={}, value={})",
            show(&self.namespace),
            show(&self.name),
            show(&self.value)
        )
    }
}

/// Filter excluding every specification that matches one of its rules.
///
/// Rules can be added while the filter is shared; managers that already built
/// their index are not affected.
#[derive(Debug, Default)]
pub struct MatchingPluginFilter {
    exclusions: RwLock<Vec<PluginSpecMatcher>>,
}

impl MatchingPluginFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a filter from configured rules.
    pub fn from_rules<'a>(rules: impl IntoIterator<Item = &'a ExclusionRule>) -> Result<Self, PatternError> {
        let filter = Self::new();
        for rule in rules {
            filter.add_matcher(PluginSpecMatcher::from_rule(rule)?);
        }
        Ok(filter)
    }

    /// Exclude plugins matching all of the given patterns, for example
    /// `add_exclusion(Some("some.namespace.*"), None, None)` or
    /// `add_exclusion(None, None, Some("my.package.*"))`.
    pub fn add_exclusion(&self, namespace: Option<&str>, name: Option<&str>, value: Option<&str>) -> Result<(), PatternError> {
        self.add_matcher(PluginSpecMatcher::new(namespace, name, value)?);
        Ok(())
    }

    pub fn add_matcher(&self, matcher: PluginSpecMatcher) {
        self.exclusions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(matcher);
    }

    pub fn len(&self) -> usize {
        self.exclusions.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PluginFilter for MatchingPluginFilter {
    fn is_filtered(&self, spec: &PluginSpec) -> bool {
        let exclusions = self.exclusions.read().unwrap_or_else(PoisonError::into_inner);
        for matcher in exclusions.iter() {
            if matcher.matches(spec) {
                log::debug!("filter rule {} matched {}", matcher, spec);
                return true;
            }
        }
        false
    }
}
