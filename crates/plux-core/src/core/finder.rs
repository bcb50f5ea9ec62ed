use std::sync::Arc;

use crate::core::entrypoint::EntryPoint;
use crate::core::error::{PluginError, PluginResult};
use crate::core::spec::PluginSpec;

/// Callback notified whenever a finder fails to resolve a candidate.
///
/// Arguments are the namespace the candidate was registered under, the entry
/// point describing the candidate and the failure. Returning an error aborts
/// the search and surfaces the error from [`PluginFinder::find_plugins`].
pub type ResolveExceptionCallback = Arc<dyn Fn(&str, &EntryPoint, &PluginError) -> PluginResult<()> + Send + Sync>;

/// Finds plugin specifications, either by scanning declared modules or by
/// reading installed metadata.
///
/// Only successfully resolved specifications are returned. Per-candidate
/// failures are reported through a finder's resolve-exception callback, if it
/// has one.
pub trait PluginFinder: Send + Sync {
    fn find_plugins(&self) -> PluginResult<Vec<PluginSpec>>;
}

impl<F> PluginFinder for F
where
    F: Fn() -> PluginResult<Vec<PluginSpec>> + Send + Sync,
{
    fn find_plugins(&self) -> PluginResult<Vec<PluginSpec>> {
        self()
    }
}

/// Finder over a fixed list of specifications.
#[derive(Debug, Clone, Default)]
pub struct StaticPluginFinder {
    specs: Vec<PluginSpec>,
}

impl StaticPluginFinder {
    pub fn new(specs: impl IntoIterator<Item = PluginSpec>) -> Self {
        Self {
            specs: specs.into_iter().collect(),
        }
    }
}

impl PluginFinder for StaticPluginFinder {
    fn find_plugins(&self) -> PluginResult<Vec<PluginSpec>> {
        Ok(self.specs.clone())
    }
}
