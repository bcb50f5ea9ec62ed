//! Declared modules and the registry that imports them.
//!
//! Plugins are never found by reflecting over arbitrary types. Instead a crate
//! declares [`Module`]s, each a dot-segmented path with an ordered list of
//! named bindings, and registers them in a [`ModuleRegistry`]. The registry
//! plays the role of an import system: it resolves `module.path:member`
//! references through the [`ObjectLoader`] trait.
use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::core::entrypoint::split_reference;
use crate::core::error::{BoxError, ResolutionError};
use crate::core::spec::PluginSource;

/// A named collection of bindings.
#[derive(Clone, Debug)]
pub struct Module {
    path: String,
    members: Vec<(String, PluginSource)>,
}

impl Module {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            members: Vec::new(),
        }
    }

    /// Declare a binding, builder style.
    pub fn with(mut self, name: impl Into<String>, source: impl Into<PluginSource>) -> Self {
        self.add(name, source);
        self
    }

    /// Declare a binding. The source is bound to the `path:name` reference of
    /// this module; a redeclared name replaces the previous binding in place.
    pub fn add(&mut self, name: impl Into<String>, source: impl Into<PluginSource>) {
        let name = name.into();
        let source = source.into().bind(&format!("{}:{}", self.path, name));
        match self.members.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = source,
            None => self.members.push((name, source)),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Path of the enclosing package, if any.
    pub fn package(&self) -> Option<&str> {
        self.path.rsplit_once('.').map(|(parent, _)| parent)
    }

    pub fn get(&self, name: &str) -> Option<&PluginSource> {
        self.members.iter().find(|(n, _)| n == name).map(|(_, s)| s)
    }

    /// Bindings in declaration order.
    pub fn members(&self) -> impl Iterator<Item = (&str, &PluginSource)> {
        self.members.iter().map(|(n, s)| (n.as_str(), s))
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

type ModuleLoaderFn = dyn Fn() -> Result<Module, BoxError> + Send + Sync;

enum ModuleEntry {
    Loaded(Arc<Module>),
    Lazy {
        loader: Arc<ModuleLoaderFn>,
        cell: OnceLock<Result<Arc<Module>, ResolutionError>>,
    },
}

/// Registry of importable modules, in registration order.
#[derive(Default)]
pub struct ModuleRegistry {
    entries: Vec<(String, ModuleEntry)>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module; a module with the same path is replaced.
    pub fn register(&mut self, module: Module) -> &mut Self {
        let path = module.path().to_string();
        self.insert(path, ModuleEntry::Loaded(Arc::new(module)));
        self
    }

    /// Register a module that is only built when first imported. The loader
    /// runs at most once; its outcome, success or failure, is remembered.
    pub fn register_lazy<F>(&mut self, path: impl Into<String>, loader: F) -> &mut Self
    where
        F: Fn() -> Result<Module, BoxError> + Send + Sync + 'static,
    {
        self.insert(
            path.into(),
            ModuleEntry::Lazy {
                loader: Arc::new(loader),
                cell: OnceLock::new(),
            },
        );
        self
    }

    fn insert(&mut self, path: String, entry: ModuleEntry) {
        match self.entries.iter_mut().find(|(p, _)| *p == path) {
            Some((_, existing)) => *existing = entry,
            None => self.entries.push((path, entry)),
        }
    }

    /// Paths of all registered modules, in registration order.
    pub fn module_paths(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(p, _)| p.as_str())
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.iter().any(|(p, _)| p == path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Import a module by path.
    pub fn load_module(&self, path: &str) -> Result<Arc<Module>, ResolutionError> {
        let (_, entry) = self
            .entries
            .iter()
            .find(|(p, _)| p == path)
            .ok_or_else(|| ResolutionError::ModuleNotFound { module: path.to_string() })?;

        match entry {
            ModuleEntry::Loaded(module) => Ok(module.clone()),
            ModuleEntry::Lazy { loader, cell } => cell
                .get_or_init(|| {
                    log::debug!("importing module {}", path);
                    match loader() {
                        Ok(module) if module.path() == path => Ok(Arc::new(module)),
                        Ok(module) => Err(ResolutionError::ModuleLoad {
                            module: path.to_string(),
                            message: format!("loader produced module '{}'", module.path()),
                        }),
                        Err(e) => Err(ResolutionError::ModuleLoad {
                            module: path.to_string(),
                            message: e.to_string(),
                        }),
                    }
                })
                .clone(),
        }
    }
}

impl fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleRegistry")
            .field("modules", &self.module_paths().collect::<Vec<_>>())
            .finish()
    }
}

/// Resolves a `module.path:member` reference into the object it names.
pub trait ObjectLoader: Send + Sync {
    fn load_object(&self, reference: &str) -> Result<PluginSource, ResolutionError>;
}

impl ObjectLoader for ModuleRegistry {
    fn load_object(&self, reference: &str) -> Result<PluginSource, ResolutionError> {
        let (module_path, member) = split_reference(reference)?;
        let module = self.load_module(module_path)?;
        module
            .get(member)
            .cloned()
            .ok_or_else(|| ResolutionError::MemberNotFound {
                module: module_path.to_string(),
                member: member.to_string(),
            })
    }
}

impl<T: ObjectLoader + ?Sized> ObjectLoader for Arc<T> {
    fn load_object(&self, reference: &str) -> Result<PluginSource, ResolutionError> {
        (**self).load_object(reference)
    }
}
