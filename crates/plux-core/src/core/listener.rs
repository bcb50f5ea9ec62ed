use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::core::args::LoadArgs;
use crate::core::entrypoint::EntryPoint;
use crate::core::error::{PluginError, PluginResult};
use crate::core::plugin::{LoadValue, Plugin};
use crate::core::spec::PluginSpec;

/// Result returned by every listener hook.
///
/// Returning [`PluginError::Disabled`] vetoes the plugin the event is about.
pub type ListenerResult = PluginResult<()>;

/// Listener that can be attached to a plugin manager to react to plugin
/// lifecycle events. Every hook has an empty default implementation.
pub trait PluginLifecycleListener: Send + Sync {
    fn on_resolve_exception(&self, _namespace: &str, _entry_point: &EntryPoint, _error: &PluginError) -> ListenerResult {
        Ok(())
    }

    fn on_resolve_after(&self, _spec: &PluginSpec) -> ListenerResult {
        Ok(())
    }

    fn on_init_exception(&self, _spec: &PluginSpec, _error: &PluginError) -> ListenerResult {
        Ok(())
    }

    fn on_init_after(&self, _spec: &PluginSpec, _plugin: &dyn Plugin) -> ListenerResult {
        Ok(())
    }

    fn on_load_before(&self, _spec: &PluginSpec, _plugin: &dyn Plugin, _args: &LoadArgs) -> ListenerResult {
        Ok(())
    }

    fn on_load_after(&self, _spec: &PluginSpec, _plugin: &dyn Plugin, _result: &LoadValue) -> ListenerResult {
        Ok(())
    }

    fn on_load_exception(&self, _spec: &PluginSpec, _plugin: &dyn Plugin, _error: &PluginError) -> ListenerResult {
        Ok(())
    }
}

/// What happens when a listener hook returns an error other than a veto.
///
/// An error from `on_init_after` is recorded as the container's
/// initialization error, so later loads return it without loading the
/// plugin. Errors from `on_init_exception` and `on_load_exception` are only
/// logged: the caller always gets the plugin's own failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListenerErrorPolicy {
    /// Abort the enclosing lifecycle operation with the listener's error
    #[default]
    Propagate,
    /// Log the error and keep notifying the remaining listeners
    Log,
}

/// Ordered set of listeners, each invoked for every event.
///
/// Listeners added later only observe subsequent events.
pub struct CompositeListener {
    listeners: RwLock<Vec<Arc<dyn PluginLifecycleListener>>>,
    policy: ListenerErrorPolicy,
}

impl CompositeListener {
    pub fn new(policy: ListenerErrorPolicy) -> Self {
        Self {
            listeners: RwLock::new(Vec::new()),
            policy,
        }
    }

    pub fn with_listeners(policy: ListenerErrorPolicy, initial: impl IntoIterator<Item = Arc<dyn PluginLifecycleListener>>) -> Self {
        Self {
            listeners: RwLock::new(initial.into_iter().collect()),
            policy,
        }
    }

    pub fn add_listener(&self, listener: Arc<dyn PluginLifecycleListener>) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    pub fn policy(&self) -> ListenerErrorPolicy {
        self.policy
    }

    pub fn len(&self) -> usize {
        self.listeners.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // Snapshot so a listener may add listeners without deadlocking.
    fn snapshot(&self) -> Vec<Arc<dyn PluginLifecycleListener>> {
        self.listeners.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn dispatch<F>(&self, hook: &'static str, mut call: F) -> ListenerResult
    where
        F: FnMut(&dyn PluginLifecycleListener) -> ListenerResult,
    {
        for listener in self.snapshot() {
            match call(listener.as_ref()) {
                Ok(()) => {}
                Err(e) if e.is_disabled() => return Err(e),
                Err(e) => match self.policy {
                    ListenerErrorPolicy::Propagate => return Err(e),
                    ListenerErrorPolicy::Log => {
                        log::error!("error while calling {}: {}", hook, e);
                    }
                },
            }
        }
        Ok(())
    }
}

impl Default for CompositeListener {
    fn default() -> Self {
        Self::new(ListenerErrorPolicy::default())
    }
}

impl PluginLifecycleListener for CompositeListener {
    fn on_resolve_exception(&self, namespace: &str, entry_point: &EntryPoint, error: &PluginError) -> ListenerResult {
        self.dispatch("on_resolve_exception", |l| l.on_resolve_exception(namespace, entry_point, error))
    }

    fn on_resolve_after(&self, spec: &PluginSpec) -> ListenerResult {
        self.dispatch("on_resolve_after", |l| l.on_resolve_after(spec))
    }

    fn on_init_exception(&self, spec: &PluginSpec, error: &PluginError) -> ListenerResult {
        self.dispatch("on_init_exception", |l| l.on_init_exception(spec, error))
    }

    fn on_init_after(&self, spec: &PluginSpec, plugin: &dyn Plugin) -> ListenerResult {
        self.dispatch("on_init_after", |l| l.on_init_after(spec, plugin))
    }

    fn on_load_before(&self, spec: &PluginSpec, plugin: &dyn Plugin, args: &LoadArgs) -> ListenerResult {
        self.dispatch("on_load_before", |l| l.on_load_before(spec, plugin, args))
    }

    fn on_load_after(&self, spec: &PluginSpec, plugin: &dyn Plugin, result: &LoadValue) -> ListenerResult {
        self.dispatch("on_load_after", |l| l.on_load_after(spec, plugin, result))
    }

    fn on_load_exception(&self, spec: &PluginSpec, plugin: &dyn Plugin, error: &PluginError) -> ListenerResult {
        self.dispatch("on_load_exception", |l| l.on_load_exception(spec, plugin, error))
    }
}

/// Listener that writes every lifecycle event to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingListener;

impl PluginLifecycleListener for LoggingListener {
    fn on_resolve_exception(&self, namespace: &str, entry_point: &EntryPoint, error: &PluginError) -> ListenerResult {
        log::warn!("error resolving entry point {} = {} in {}: {}", entry_point.name, entry_point.value, namespace, error);
        Ok(())
    }

    fn on_resolve_after(&self, spec: &PluginSpec) -> ListenerResult {
        log::debug!("resolved {}", spec);
        Ok(())
    }

    fn on_init_exception(&self, spec: &PluginSpec, error: &PluginError) -> ListenerResult {
        log::error!("error instantiating plugin {}: {}", spec.qualified_name(), error);
        Ok(())
    }

    fn on_init_after(&self, spec: &PluginSpec, _plugin: &dyn Plugin) -> ListenerResult {
        log::debug!("instantiated plugin {}", spec.qualified_name());
        Ok(())
    }

    fn on_load_before(&self, spec: &PluginSpec, _plugin: &dyn Plugin, args: &LoadArgs) -> ListenerResult {
        log::debug!("loading plugin {} with {:?}", spec.qualified_name(), args);
        Ok(())
    }

    fn on_load_after(&self, spec: &PluginSpec, _plugin: &dyn Plugin, _result: &LoadValue) -> ListenerResult {
        log::info!("loaded plugin {}", spec.qualified_name());
        Ok(())
    }

    fn on_load_exception(&self, spec: &PluginSpec, _plugin: &dyn Plugin, error: &PluginError) -> ListenerResult {
        log::error!("error loading plugin {}: {}", spec.qualified_name(), error);
        Ok(())
    }
}
