//! Function plugins.
//!
//! A plain function can be exposed as a discoverable plugin by wrapping it with
//! the [`plugin`] builder. The wrapper, a [`PluginFunction`], carries the
//! function together with its attached [`PluginSpec`]; the specification's
//! factory produces a [`FunctionPlugin`] that can call the function.
//!
//! ```
//! use plux_core::core::function::plugin;
//!
//! fn greet() -> &'static str {
//!     "hello"
//! }
//!
//! let greeter = plugin("demo.greeters").wrap(greet);
//! assert_eq!(greeter.spec().name(), "greet");
//! ```
use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::core::args::LoadArgs;
use crate::core::error::BoxError;
use crate::core::plugin::{LoadValue, Plugin};
use crate::core::spec::{PluginFactory, PluginSpec};

type CallFn = dyn Fn() -> LoadValue + Send + Sync;
type LoadFn = dyn Fn(&LoadArgs) -> Result<LoadValue, BoxError> + Send + Sync;
type ConditionFn = dyn Fn() -> bool + Send + Sync;

/// Load condition of a function plugin
#[derive(Clone, Default)]
pub enum ShouldLoad {
    #[default]
    Always,
    Flag(bool),
    Condition(Arc<ConditionFn>),
}

impl ShouldLoad {
    pub fn evaluate(&self) -> bool {
        match self {
            ShouldLoad::Always => true,
            ShouldLoad::Flag(flag) => *flag,
            ShouldLoad::Condition(condition) => condition(),
        }
    }
}

impl fmt::Debug for ShouldLoad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShouldLoad::Always => f.write_str("Always"),
            ShouldLoad::Flag(flag) => f.debug_tuple("Flag").field(flag).finish(),
            ShouldLoad::Condition(_) => f.write_str("Condition(..)"),
        }
    }
}

/// Plugin instance created from a [`PluginFunction`].
pub struct FunctionPlugin {
    namespace: String,
    name: String,
    func: Arc<CallFn>,
    should_load: ShouldLoad,
    load: Option<Arc<LoadFn>>,
}

impl FunctionPlugin {
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Call the wrapped function
    pub fn call(&self) -> LoadValue {
        (self.func)()
    }
}

impl Plugin for FunctionPlugin {
    fn should_load(&self) -> bool {
        self.should_load.evaluate()
    }

    fn load(&mut self, args: &LoadArgs) -> Result<LoadValue, BoxError> {
        match &self.load {
            Some(load) => load(args),
            None => Ok(LoadValue::unit()),
        }
    }
}

impl fmt::Debug for FunctionPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionPlugin")
            .field("namespace", &self.namespace)
            .field("name", &self.name)
            .field("should_load", &self.should_load)
            .finish_non_exhaustive()
    }
}

/// A function together with the plugin specification attached to it.
#[derive(Clone)]
pub struct PluginFunction {
    function_name: String,
    spec: PluginSpec,
    func: Arc<CallFn>,
}

impl PluginFunction {
    /// The attached specification
    pub fn spec(&self) -> &PluginSpec {
        &self.spec
    }

    pub fn function_name(&self) -> &str {
        &self.function_name
    }

    /// Call the wrapped function directly, without going through a plugin instance.
    pub fn call(&self) -> LoadValue {
        (self.func)()
    }

    pub(crate) fn bind(mut self, reference: &str) -> Self {
        self.spec = self.spec.with_origin(reference);
        self
    }
}

impl fmt::Debug for PluginFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginFunction")
            .field("function_name", &self.function_name)
            .field("spec", &self.spec)
            .finish()
    }
}

/// Start exposing a function as a plugin in the given namespace.
pub fn plugin(namespace: impl Into<String>) -> FunctionPluginBuilder {
    FunctionPluginBuilder {
        namespace: namespace.into(),
        name: None,
        should_load: ShouldLoad::Always,
        load: None,
    }
}

/// Builder returned by [`plugin`].
pub struct FunctionPluginBuilder {
    namespace: String,
    name: Option<String>,
    should_load: ShouldLoad,
    load: Option<Arc<LoadFn>>,
}

impl FunctionPluginBuilder {
    /// Plugin name; defaults to the name of the wrapped function item
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn should_load(mut self, flag: bool) -> Self {
        self.should_load = ShouldLoad::Flag(flag);
        self
    }

    /// Evaluate the load condition every time the plugin is about to load
    pub fn should_load_when<F>(mut self, condition: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        self.should_load = ShouldLoad::Condition(Arc::new(condition));
        self
    }

    /// Custom load function; without one, loading yields the unit value
    pub fn load<F, R>(mut self, load: F) -> Self
    where
        F: Fn(&LoadArgs) -> Result<R, BoxError> + Send + Sync + 'static,
        R: Any + Send + Sync,
    {
        self.load = Some(Arc::new(move |args: &LoadArgs| load(args).map(LoadValue::new)));
        self
    }

    /// Attach the specification to `func`.
    pub fn wrap<F, R>(self, func: F) -> PluginFunction
    where
        F: Fn() -> R + Send + Sync + 'static,
        R: Any + Send + Sync,
    {
        let function_name = function_item_name::<F>();
        let name = self.name.unwrap_or_else(|| function_name.clone());
        let func: Arc<CallFn> = Arc::new(move || LoadValue::new(func()));

        let namespace = self.namespace;
        let factory = {
            let namespace = namespace.clone();
            let name = name.clone();
            let func = func.clone();
            let should_load = self.should_load;
            let load = self.load;
            PluginFactory::new(std::any::type_name::<F>(), move || {
                Ok(Box::new(FunctionPlugin {
                    namespace: namespace.clone(),
                    name: name.clone(),
                    func: func.clone(),
                    should_load: should_load.clone(),
                    load: load.clone(),
                }) as Box<dyn Plugin>)
            })
        };

        PluginFunction {
            function_name,
            spec: PluginSpec::new(namespace, name, factory),
            func,
        }
    }
}

/// Last path segment of a function item's type name. Closures have no usable
/// name and yield an empty string.
fn function_item_name<F>() -> String {
    let full = std::any::type_name::<F>();
    let last = full.rsplit("::").next().unwrap_or(full);
    if last.contains('{') {
        String::new()
    } else {
        last.to_string()
    }
}
