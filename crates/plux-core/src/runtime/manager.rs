use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use crate::core::args::LoadArgs;
use crate::core::entrypoint::EntryPoint;
use crate::core::error::{PluginError, PluginResult};
use crate::core::finder::{PluginFinder, ResolveExceptionCallback};
use crate::core::listener::{CompositeListener, ListenerErrorPolicy, PluginLifecycleListener};
use crate::core::module::ObjectLoader;
use crate::core::plugin::{LoadOutcome, LoadValue};
use crate::core::spec::PluginSpec;
use crate::runtime::conflict::ConflictPolicy;
use crate::runtime::container::PluginContainer;
use crate::runtime::filter::PluginFilter;
use crate::runtime::metadata::EntryPointsResolver;
use crate::runtime::resolve::MetadataPluginFinder;

/// Containers of one namespace, in discovery order.
#[derive(Default)]
struct PluginIndex {
    containers: Vec<Arc<PluginContainer>>,
    by_name: HashMap<String, usize>,
}

impl PluginIndex {
    fn get(&self, name: &str) -> Option<&Arc<PluginContainer>> {
        self.by_name.get(name).map(|&i| &self.containers[i])
    }

    fn insert(&mut self, container: PluginContainer, policy: ConflictPolicy) -> PluginResult<()> {
        let name = container.name().to_string();
        let existing = self.by_name.get(&name).copied();
        match (existing, policy) {
            (None, _) => {
                self.by_name.insert(name, self.containers.len());
                self.containers.push(Arc::new(container));
            }
            (Some(_), ConflictPolicy::FirstWins) => {
                log::debug!("ignoring duplicate plugin {}", container.spec());
            }
            (Some(i), ConflictPolicy::LastWins) => {
                log::debug!("{} replaces {}", container.spec(), self.containers[i].spec());
                self.containers[i] = Arc::new(container);
            }
            (Some(_), ConflictPolicy::Error) => {
                return Err(PluginError::Conflict {
                    namespace: container.spec().namespace().to_string(),
                    name,
                });
            }
        }
        Ok(())
    }
}

enum FinderSource {
    Finder(Box<dyn PluginFinder>),
    Metadata {
        entry_points: Arc<dyn EntryPointsResolver>,
        loader: Arc<dyn ObjectLoader>,
    },
}

/// Builder for [`PluginManager`].
pub struct PluginManagerBuilder {
    namespace: String,
    source: FinderSource,
    listeners: Vec<Arc<dyn PluginLifecycleListener>>,
    filters: Vec<Arc<dyn PluginFilter>>,
    global_filter: Option<Arc<dyn PluginFilter>>,
    load_args: LoadArgs,
    listener_errors: ListenerErrorPolicy,
    conflicts: ConflictPolicy,
}

impl PluginManagerBuilder {
    fn new(namespace: String, source: FinderSource) -> Self {
        Self {
            namespace,
            source,
            listeners: Vec::new(),
            filters: Vec::new(),
            global_filter: None,
            load_args: LoadArgs::default(),
            listener_errors: ListenerErrorPolicy::default(),
            conflicts: ConflictPolicy::default(),
        }
    }

    pub fn listener(mut self, listener: Arc<dyn PluginLifecycleListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Add a manager-local filter
    pub fn filter(mut self, filter: Arc<dyn PluginFilter>) -> Self {
        self.filters.push(filter);
        self
    }

    /// Filter shared between managers; evaluated before the local filters
    pub fn global_filter(mut self, filter: Arc<dyn PluginFilter>) -> Self {
        self.global_filter = Some(filter);
        self
    }

    /// Default arguments passed to every `load`
    pub fn load_args(mut self, args: LoadArgs) -> Self {
        self.load_args = args;
        self
    }

    pub fn listener_error_policy(mut self, policy: ListenerErrorPolicy) -> Self {
        self.listener_errors = policy;
        self
    }

    pub fn conflict_policy(mut self, policy: ConflictPolicy) -> Self {
        self.conflicts = policy;
        self
    }

    pub fn build(self) -> PluginManager {
        let listeners = Arc::new(CompositeListener::with_listeners(self.listener_errors, self.listeners));

        let finder: Box<dyn PluginFinder> = match self.source {
            FinderSource::Finder(finder) => finder,
            FinderSource::Metadata { entry_points, loader } => {
                let notify = listeners.clone();
                let callback: ResolveExceptionCallback =
                    Arc::new(move |namespace: &str, entry_point: &EntryPoint, error: &PluginError| {
                        notify.on_resolve_exception(namespace, entry_point, error)
                    });
                Box::new(
                    MetadataPluginFinder::new(self.namespace.clone(), entry_points, loader).on_resolve_exception(callback),
                )
            }
        };

        PluginManager {
            namespace: self.namespace,
            finder,
            listeners,
            filters: self.filters,
            global_filter: self.global_filter,
            load_args: self.load_args,
            conflicts: self.conflicts,
            index: OnceLock::new(),
            init_mutex: Mutex::new(()),
        }
    }
}

/// Manages the plugins of one namespace found by a [`PluginFinder`].
///
/// The index is built on first use: the finder is asked once, every returned
/// specification is announced to the listeners, specifications of other
/// namespaces and filtered ones are dropped, and a [`PluginContainer`] is
/// created for each survivor. A plugin then moves through three states:
///
/// - resolved: the specification is in the index
/// - initialized: the factory of the specification was invoked
/// - loaded: [`Plugin::load`](crate::core::Plugin::load) returned successfully
///
/// or ends up disabled, by a listener veto or [`PluginManager::disable`].
pub struct PluginManager {
    namespace: String,
    finder: Box<dyn PluginFinder>,
    listeners: Arc<CompositeListener>,
    filters: Vec<Arc<dyn PluginFilter>>,
    global_filter: Option<Arc<dyn PluginFilter>>,
    load_args: LoadArgs,
    conflicts: ConflictPolicy,
    index: OnceLock<PluginIndex>,
    init_mutex: Mutex<()>,
}

impl PluginManager {
    /// Manager over the given finder, with default settings.
    pub fn new(namespace: impl Into<String>, finder: impl PluginFinder + 'static) -> Self {
        Self::builder(namespace, finder).build()
    }

    pub fn builder(namespace: impl Into<String>, finder: impl PluginFinder + 'static) -> PluginManagerBuilder {
        PluginManagerBuilder::new(namespace.into(), FinderSource::Finder(Box::new(finder)))
    }

    /// Builder for a manager reading its plugins from package metadata. Entry
    /// points that fail to resolve are reported to the manager's listeners.
    pub fn with_metadata(
        namespace: impl Into<String>,
        entry_points: Arc<dyn EntryPointsResolver>,
        loader: Arc<dyn ObjectLoader>,
    ) -> PluginManagerBuilder {
        PluginManagerBuilder::new(namespace.into(), FinderSource::Metadata { entry_points, loader })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Attach another listener. It observes subsequent events only.
    pub fn add_listener(&self, listener: Arc<dyn PluginLifecycleListener>) {
        self.listeners.add_listener(listener);
    }

    /// Load the named plugin with the manager's default arguments.
    ///
    /// Loading is idempotent: once loaded, the cached value is returned without
    /// calling the plugin again.
    pub fn load(&self, name: &str) -> PluginResult<LoadOutcome> {
        self.load_with(name, None)
    }

    /// Load the named plugin, adding call-site arguments to the defaults.
    pub fn load_with(&self, name: &str, args: Option<&LoadArgs>) -> PluginResult<LoadOutcome> {
        let container = self.require_plugin(name)?;
        self.load_container(&container, args)
    }

    /// Load every plugin in discovery order and return the loaded values.
    ///
    /// Skipped plugins contribute nothing. With `propagate_exceptions` unset,
    /// failing plugins are logged and left out; otherwise the first failure is
    /// returned and later plugins are not touched.
    pub fn load_all(&self, propagate_exceptions: bool) -> PluginResult<Vec<LoadValue>> {
        let index = self.index()?;
        let mut values = Vec::new();

        for container in &index.containers {
            match self.load_container(container, None) {
                Ok(LoadOutcome::Loaded(value)) => values.push(value),
                Ok(LoadOutcome::Skipped) => {}
                Err(e) if propagate_exceptions => return Err(e),
                Err(e) if e.is_disabled() => log::debug!("{}", e),
                Err(e) => log::error!("exception while loading plugin {}:{}: {}", self.namespace, container.name(), e),
            }
        }

        Ok(values)
    }

    pub fn list_plugin_specs(&self) -> PluginResult<Vec<PluginSpec>> {
        Ok(self.index()?.containers.iter().map(|c| c.spec().clone()).collect())
    }

    pub fn list_names(&self) -> PluginResult<Vec<String>> {
        Ok(self.index()?.containers.iter().map(|c| c.name().to_string()).collect())
    }

    pub fn list_containers(&self) -> PluginResult<Vec<Arc<PluginContainer>>> {
        Ok(self.index()?.containers.clone())
    }

    pub fn get_container(&self, name: &str) -> PluginResult<Arc<PluginContainer>> {
        self.require_plugin(name)
    }

    pub fn exists(&self, name: &str) -> PluginResult<bool> {
        Ok(self.index()?.get(name).is_some())
    }

    pub fn is_loaded(&self, name: &str) -> PluginResult<bool> {
        Ok(self.require_plugin(name)?.is_loaded())
    }

    /// Disable a plugin that is not loaded yet. Returns `false`, and changes
    /// nothing, if the plugin is already loaded.
    pub fn disable(&self, name: &str, reason: Option<&str>) -> PluginResult<bool> {
        let container = self.require_plugin(name)?;
        let disabled = container.disable(reason.map(str::to_string));
        if disabled {
            log::debug!("disabled plugin {}:{}", self.namespace, name);
        }
        Ok(disabled)
    }

    fn require_plugin(&self, name: &str) -> PluginResult<Arc<PluginContainer>> {
        self.index()?
            .get(name)
            .cloned()
            .ok_or_else(|| PluginError::NotFound {
                namespace: self.namespace.clone(),
                name: name.to_string(),
            })
    }

    fn index(&self) -> PluginResult<&PluginIndex> {
        if let Some(index) = self.index.get() {
            return Ok(index);
        }
        let _guard = self.init_mutex.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(index) = self.index.get() {
            return Ok(index);
        }
        let index = self.init_plugin_index()?;
        Ok(self.index.get_or_init(|| index))
    }

    fn init_plugin_index(&self) -> PluginResult<PluginIndex> {
        let mut index = PluginIndex::default();

        for spec in self.finder.find_plugins()? {
            let veto = match self.listeners.on_resolve_after(&spec) {
                Ok(()) => None,
                Err(PluginError::Disabled { reason, .. }) => Some(reason),
                Err(e) => return Err(e),
            };

            if spec.namespace() != self.namespace {
                continue;
            }

            if self.is_filtered(&spec) {
                log::debug!("plugin {} filtered", spec);
                continue;
            }

            let container = match veto {
                Some(reason) => PluginContainer::new_disabled(spec, reason),
                None => PluginContainer::new(spec),
            };
            index.insert(container, self.conflicts)?;
        }

        log::debug!("indexed {} plugins in namespace {}", index.containers.len(), self.namespace);
        Ok(index)
    }

    fn is_filtered(&self, spec: &PluginSpec) -> bool {
        if let Some(global) = &self.global_filter {
            if global.is_filtered(spec) {
                return true;
            }
        }
        self.filters.iter().any(|f| f.is_filtered(spec))
    }

    fn disabled_error(&self, container: &PluginContainer, reason: Option<String>) -> PluginError {
        PluginError::Disabled {
            namespace: self.namespace.clone(),
            name: container.name().to_string(),
            reason,
        }
    }

    fn load_container(&self, container: &PluginContainer, call_args: Option<&LoadArgs>) -> PluginResult<LoadOutcome> {
        let mut slot = container.transition();
        let spec = container.spec();

        {
            let status = container.status();
            if status.disabled {
                return Err(self.disabled_error(container, status.disabled_reason.clone()));
            }
            if status.loaded {
                if let Some(value) = &status.load_value {
                    return Ok(LoadOutcome::Loaded(value.clone()));
                }
            }
            if let Some(e) = &status.init_error {
                return Err(e.clone());
            }
        }

        if slot.is_none() {
            log::debug!("instantiating plugin {}", spec);
            match spec.factory().create() {
                Ok(plugin) => {
                    let plugin = &**slot.insert(plugin);
                    container.status().initialized = true;
                    if let Err(e) = self.listeners.on_init_after(spec, plugin) {
                        let mut status = container.status();
                        match &e {
                            PluginError::Disabled { reason, .. } => {
                                status.disabled = true;
                                status.disabled_reason = reason.clone();
                            }
                            _ => status.init_error = Some(e.clone()),
                        }
                        return Err(e);
                    }
                }
                Err(source) => {
                    let error = PluginError::Initialization {
                        namespace: self.namespace.clone(),
                        name: spec.name().to_string(),
                        source: Arc::from(source),
                    };
                    container.status().init_error = Some(error.clone());
                    self.report_listener_error("on_init_exception", spec, self.listeners.on_init_exception(spec, &error));
                    return Err(error);
                }
            }
        }

        let Some(plugin) = slot.as_mut() else {
            return Err(PluginError::Internal(format!("plugin {} has no instance", spec.qualified_name())));
        };

        if !plugin.should_load() {
            log::debug!("load condition for plugin {} was false, skipping", spec.qualified_name());
            return Ok(LoadOutcome::Skipped);
        }

        let args = LoadArgs::merged(&self.load_args, call_args);

        if let Err(e) = self.listeners.on_load_before(spec, &**plugin, &args) {
            if let PluginError::Disabled { reason, .. } = &e {
                let mut status = container.status();
                status.disabled = true;
                status.disabled_reason = reason.clone();
            }
            return Err(e);
        }

        log::debug!("loading plugin {}:{}", self.namespace, spec.name());
        match plugin.load(&args) {
            Ok(value) => {
                {
                    let mut status = container.status();
                    status.load_value = Some(value.clone());
                    status.loaded = true;
                    status.load_error = None;
                }
                self.listeners.on_load_after(spec, &**plugin, &value)?;
                Ok(LoadOutcome::Loaded(value))
            }
            Err(source) => {
                let error = PluginError::Load {
                    namespace: self.namespace.clone(),
                    name: spec.name().to_string(),
                    source: Arc::from(source),
                };
                container.status().load_error = Some(error.clone());
                self.report_listener_error("on_load_exception", spec, self.listeners.on_load_exception(spec, &**plugin, &error));
                Err(error)
            }
        }
    }

    // The plugin's own failure is what the caller gets back.
    fn report_listener_error(&self, hook: &str, spec: &PluginSpec, result: PluginResult<()>) {
        if let Err(e) = result {
            log::error!("error while calling {} for plugin {}: {}", hook, spec, e);
        }
    }
}

impl fmt::Debug for PluginManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginManager")
            .field("namespace", &self.namespace)
            .field("listeners", &self.listeners.len())
            .field("indexed", &self.index.get().map(|i| i.containers.len()))
            .finish_non_exhaustive()
    }
}
