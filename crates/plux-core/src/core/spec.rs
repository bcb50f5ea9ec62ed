use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::core::error::BoxError;
use crate::core::function::PluginFunction;
use crate::core::plugin::{Plugin, PluginType};

type FactoryFn = dyn Fn() -> Result<Box<dyn Plugin>, BoxError> + Send + Sync;

/// Zero-argument callable producing a plugin instance.
///
/// Clones share the same callable, and factory identity is what makes two
/// specifications equal.
#[derive(Clone)]
pub struct PluginFactory {
    create: Arc<FactoryFn>,
    description: Arc<str>,
}

impl PluginFactory {
    /// Wrap a fallible constructor
    pub fn new<F>(description: impl Into<String>, create: F) -> Self
    where
        F: Fn() -> Result<Box<dyn Plugin>, BoxError> + Send + Sync + 'static,
    {
        Self {
            create: Arc::new(create),
            description: Arc::from(description.into()),
        }
    }

    /// Factory for a `Default`-constructible plugin type
    pub fn of<T: Plugin + Default + 'static>() -> Self {
        Self::new(std::any::type_name::<T>(), || Ok(Box::new(T::default()) as Box<dyn Plugin>))
    }

    /// Invoke the factory
    pub fn create(&self) -> Result<Box<dyn Plugin>, BoxError> {
        (self.create)()
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Whether both factories share the same callable.
    pub fn same_as(&self, other: &PluginFactory) -> bool {
        Arc::ptr_eq(&self.create, &other.create)
    }
}

impl fmt::Debug for PluginFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PluginFactory").field(&self.description).finish()
    }
}

/// Describes a plugin through a namespace, its unique name within that
/// namespace, and the factory that instantiates it.
///
/// `origin` is the `module.path:member` reference of the module binding the
/// specification was discovered from. It becomes the entry point value when
/// the specification is written into a plugin index.
#[derive(Clone)]
pub struct PluginSpec {
    namespace: String,
    name: String,
    factory: PluginFactory,
    origin: Option<String>,
}

impl PluginSpec {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, factory: PluginFactory) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            factory,
            origin: None,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn factory(&self) -> &PluginFactory {
        &self.factory
    }

    pub fn origin(&self) -> Option<&str> {
        self.origin.as_deref()
    }

    /// Copy of this specification bound to the given reference. An origin that
    /// is already set is kept.
    pub fn with_origin(&self, reference: impl Into<String>) -> Self {
        let mut spec = self.clone();
        if spec.origin.is_none() {
            spec.origin = Some(reference.into());
        }
        spec
    }

    /// `namespace:name`
    pub fn qualified_name(&self) -> String {
        format!("{}:{}", self.namespace, self.name)
    }
}

impl PartialEq for PluginSpec {
    fn eq(&self, other: &Self) -> bool {
        self.namespace == other.namespace
            && self.name == other.name
            && self.factory.same_as(&other.factory)
    }
}

impl fmt::Display for PluginSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PluginSpec({}.{} = {})", self.namespace, self.name, self.factory.description())
    }
}

impl fmt::Debug for PluginSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginSpec")
            .field("namespace", &self.namespace)
            .field("name", &self.name)
            .field("factory", &self.factory)
            .field("origin", &self.origin)
            .finish()
    }
}

/// A concrete plugin type offered for discovery, the equivalent of exposing a
/// plugin class in a module.
#[derive(Clone)]
pub struct PluginClass {
    type_name: &'static str,
    namespace: &'static str,
    name: &'static str,
    factory: PluginFactory,
    origin: Option<String>,
}

impl PluginClass {
    /// Class for a `Default`-constructible plugin type
    pub fn of<T: PluginType + Default>() -> Self {
        Self::with_factory::<T>(PluginFactory::of::<T>())
    }

    /// Class whose instances are built by a custom constructor
    pub fn new<T, F>(create: F) -> Self
    where
        T: PluginType,
        F: Fn() -> Result<T, BoxError> + Send + Sync + 'static,
    {
        let factory = PluginFactory::new(T::type_name(), move || {
            create().map(|plugin| Box::new(plugin) as Box<dyn Plugin>)
        });
        Self::with_factory::<T>(factory)
    }

    fn with_factory<T: PluginType>(factory: PluginFactory) -> Self {
        Self {
            type_name: T::type_name(),
            namespace: T::NAMESPACE,
            name: T::NAME,
            factory,
            origin: None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn namespace(&self) -> &'static str {
        self.namespace
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn factory(&self) -> &PluginFactory {
        &self.factory
    }

    pub fn origin(&self) -> Option<&str> {
        self.origin.as_deref()
    }
}

impl fmt::Debug for PluginClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginClass")
            .field("type_name", &self.type_name)
            .field("namespace", &self.namespace)
            .field("name", &self.name)
            .field("origin", &self.origin)
            .finish()
    }
}

/// Anything a module can declare as a binding. A resolver accepts the first
/// three shapes and rejects `Value`.
#[derive(Clone)]
pub enum PluginSource {
    Spec(PluginSpec),
    Class(PluginClass),
    Function(PluginFunction),
    /// A binding that is not plugin-shaped
    Value(Arc<dyn Any + Send + Sync>),
}

impl PluginSource {
    pub fn spec(spec: PluginSpec) -> Self {
        PluginSource::Spec(spec)
    }

    pub fn class<T: PluginType + Default>() -> Self {
        PluginSource::Class(PluginClass::of::<T>())
    }

    pub fn value<T: Any + Send + Sync>(value: T) -> Self {
        PluginSource::Value(Arc::new(value))
    }

    /// Attach the reference of the module binding holding this source.
    pub fn bind(self, reference: &str) -> Self {
        match self {
            PluginSource::Spec(spec) => PluginSource::Spec(spec.with_origin(reference)),
            PluginSource::Class(mut class) => {
                class.origin.get_or_insert_with(|| reference.to_string());
                PluginSource::Class(class)
            }
            PluginSource::Function(function) => PluginSource::Function(function.bind(reference)),
            value @ PluginSource::Value(_) => value,
        }
    }

    /// Short human-readable description, used in resolution errors.
    pub fn describe(&self) -> String {
        match self {
            PluginSource::Spec(spec) => spec.to_string(),
            PluginSource::Class(class) => format!("class {}", class.type_name),
            PluginSource::Function(function) => format!("function {}", function.function_name()),
            PluginSource::Value(value) => {
                if let Some(s) = value.downcast_ref::<&'static str>() {
                    format!("value {:?}", s)
                } else if let Some(s) = value.downcast_ref::<String>() {
                    format!("value {:?}", s)
                } else {
                    "opaque value".to_string()
                }
            }
        }
    }
}

impl fmt::Debug for PluginSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PluginSource::Spec(spec) => f.debug_tuple("Spec").field(spec).finish(),
            PluginSource::Class(class) => f.debug_tuple("Class").field(class).finish(),
            PluginSource::Function(function) => f.debug_tuple("Function").field(function).finish(),
            PluginSource::Value(_) => f.write_str("Value(<opaque>)"),
        }
    }
}

impl From<PluginSpec> for PluginSource {
    fn from(spec: PluginSpec) -> Self {
        PluginSource::Spec(spec)
    }
}

impl From<PluginClass> for PluginSource {
    fn from(class: PluginClass) -> Self {
        PluginSource::Class(class)
    }
}

impl From<PluginFunction> for PluginSource {
    fn from(function: PluginFunction) -> Self {
        PluginSource::Function(function)
    }
}
