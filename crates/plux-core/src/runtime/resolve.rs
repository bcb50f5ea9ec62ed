use std::fmt;
use std::sync::Arc;

use crate::core::entrypoint::EntryPoint;
use crate::core::error::{PluginError, PluginResult};
use crate::core::finder::{PluginFinder, ResolveExceptionCallback};
use crate::core::module::ObjectLoader;
use crate::core::resolve::{DefaultSpecResolver, PluginSpecResolver};
use crate::core::spec::PluginSpec;
use crate::runtime::metadata::EntryPointsResolver;

/// Finder resolving the entry points registered for one namespace in
/// package metadata.
///
/// Each entry point value is loaded through an [`ObjectLoader`] and resolved
/// into a specification. Failing entry points are skipped and reported to the
/// resolve-exception callback.
pub struct MetadataPluginFinder {
    namespace: String,
    entry_points: Arc<dyn EntryPointsResolver>,
    loader: Arc<dyn ObjectLoader>,
    resolver: Arc<dyn PluginSpecResolver>,
    on_resolve_exception: Option<ResolveExceptionCallback>,
}

impl MetadataPluginFinder {
    pub fn new(namespace: impl Into<String>, entry_points: Arc<dyn EntryPointsResolver>, loader: Arc<dyn ObjectLoader>) -> Self {
        Self {
            namespace: namespace.into(),
            entry_points,
            loader,
            resolver: Arc::new(DefaultSpecResolver),
            on_resolve_exception: None,
        }
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn PluginSpecResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn on_resolve_exception(mut self, callback: ResolveExceptionCallback) -> Self {
        self.on_resolve_exception = Some(callback);
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn to_plugin_spec(&self, entry_point: &EntryPoint) -> PluginResult<PluginSpec> {
        let source = self.loader.load_object(&entry_point.value)?;
        let spec = self.resolver.resolve(&source)?;
        Ok(spec)
    }
}

impl PluginFinder for MetadataPluginFinder {
    fn find_plugins(&self) -> PluginResult<Vec<PluginSpec>> {
        let index = self.entry_points.get_entry_points()?;
        let Some(entry_points) = index.get(&self.namespace) else {
            log::debug!("no entry points found in namespace {}", self.namespace);
            return Ok(Vec::new());
        };

        let mut specs = Vec::with_capacity(entry_points.len());
        for ep in entry_points {
            match self.to_plugin_spec(ep) {
                Ok(spec) => specs.push(spec),
                Err(e) => {
                    log::debug!("error resolving plugin {}.{}: {}", self.namespace, ep.name, e);
                    report(self.on_resolve_exception.as_ref(), &self.namespace, ep, &e)?;
                }
            }
        }
        Ok(specs)
    }
}

pub(crate) fn report(
    callback: Option<&ResolveExceptionCallback>,
    namespace: &str,
    entry_point: &EntryPoint,
    error: &PluginError,
) -> PluginResult<()> {
    match callback {
        Some(callback) => callback(namespace, entry_point, error),
        None => Ok(()),
    }
}

impl fmt::Debug for MetadataPluginFinder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetadataPluginFinder")
            .field("namespace", &self.namespace)
            .field("has_callback", &self.on_resolve_exception.is_some())
            .finish_non_exhaustive()
    }
}
