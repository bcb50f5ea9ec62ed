use std::any::{Any, type_name};
use std::fmt;
use std::sync::Arc;

use crate::core::args::LoadArgs;
use crate::core::error::BoxError;

/// Upcast helper so a `&dyn Plugin` can be downcast to its concrete type.
pub trait AsAny {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Core trait that all plugins must implement.
///
/// A plugin holds no lifecycle bookkeeping. The manager that owns it decides
/// when to call [`should_load`](Plugin::should_load) and [`load`](Plugin::load),
/// and a plugin and its manager agree informally on the arguments passed in
/// [`LoadArgs`].
pub trait Plugin: AsAny + Send + Sync {
    /// Whether the plugin wants to be loaded right now. Returning `false` skips
    /// the plugin for this call without marking it loaded.
    fn should_load(&self) -> bool {
        true
    }

    /// Called by the manager when it loads the plugin. The returned value is
    /// cached and handed back to every later caller.
    fn load(&mut self, args: &LoadArgs) -> Result<LoadValue, BoxError> {
        let _ = args;
        Ok(LoadValue::unit())
    }
}

/// Downcast a plugin instance to its concrete type.
pub fn downcast_ref<T: Plugin + 'static>(plugin: &dyn Plugin) -> Option<&T> {
    plugin.as_any().downcast_ref::<T>()
}

/// A concrete plugin type that can be discovered as a "class".
///
/// A type with an empty `NAMESPACE` or `NAME` is abstract: it is a valid plugin
/// implementation but resolving it into a specification fails.
pub trait PluginType: Plugin + Sized + 'static {
    const NAMESPACE: &'static str = "";
    const NAME: &'static str = "";

    fn type_name() -> &'static str {
        type_name::<Self>()
    }
}

/// Shared, type-erased result of [`Plugin::load`].
#[derive(Clone)]
pub struct LoadValue(Arc<dyn Any + Send + Sync>);

impl LoadValue {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        LoadValue(Arc::new(value))
    }

    /// The empty result, returned by plugins whose `load` produces nothing.
    pub fn unit() -> Self {
        LoadValue::new(())
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }

    pub fn is<T: Any>(&self) -> bool {
        self.0.is::<T>()
    }

    pub fn is_unit(&self) -> bool {
        self.is::<()>()
    }

    /// Whether both values are the same cached object.
    pub fn ptr_eq(&self, other: &LoadValue) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for LoadValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(s) = self.downcast_ref::<String>() {
            f.debug_tuple("LoadValue").field(s).finish()
        } else if let Some(s) = self.downcast_ref::<&'static str>() {
            f.debug_tuple("LoadValue").field(s).finish()
        } else if let Some(v) = self.downcast_ref::<serde_json::Value>() {
            f.debug_tuple("LoadValue").field(v).finish()
        } else if self.is_unit() {
            f.write_str("LoadValue(())")
        } else {
            f.write_str("LoadValue(<opaque>)")
        }
    }
}

/// Outcome of a single `load` call.
#[derive(Debug, Clone)]
pub enum LoadOutcome {
    /// The plugin is loaded; the value is the cached load result.
    Loaded(LoadValue),
    /// `should_load()` returned false; nothing was loaded.
    Skipped,
}

impl LoadOutcome {
    pub fn is_loaded(&self) -> bool {
        matches!(self, LoadOutcome::Loaded(_))
    }

    pub fn value(&self) -> Option<&LoadValue> {
        match self {
            LoadOutcome::Loaded(value) => Some(value),
            LoadOutcome::Skipped => None,
        }
    }

    pub fn into_value(self) -> Option<LoadValue> {
        match self {
            LoadOutcome::Loaded(value) => Some(value),
            LoadOutcome::Skipped => None,
        }
    }
}
