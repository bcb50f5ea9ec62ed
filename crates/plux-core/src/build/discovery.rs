use std::fmt;
use std::sync::Arc;

use glob::{Pattern, PatternError};

use crate::core::entrypoint::EntryPoint;
use crate::core::error::{PluginError, PluginResult};
use crate::core::finder::{PluginFinder, ResolveExceptionCallback};
use crate::core::module::{Module, ModuleRegistry};
use crate::core::resolve::{DefaultSpecResolver, PluginSpecResolver};
use crate::core::spec::PluginSpec;
use crate::runtime::resolve::report;

/// Scans the declared members of a set of modules for plugin specifications.
///
/// Every member is run through a [`PluginSpecResolver`]; members that do not
/// resolve are expected (not every binding is a plugin) and are dropped
/// silently unless a resolve-exception callback is installed. Results keep
/// module order, then member order, and are not deduplicated.
pub struct ModuleScanningPluginFinder {
    modules: Vec<Arc<Module>>,
    resolver: Arc<dyn PluginSpecResolver>,
    on_resolve_exception: Option<ResolveExceptionCallback>,
}

impl ModuleScanningPluginFinder {
    pub fn new(modules: impl IntoIterator<Item = Arc<Module>>) -> Self {
        Self {
            modules: modules.into_iter().collect(),
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
}

impl PluginFinder for ModuleScanningPluginFinder {
    fn find_plugins(&self) -> PluginResult<Vec<PluginSpec>> {
        let mut plugins = Vec::new();

        for module in &self.modules {
            log::debug!("scanning module {}", module.path());
            for (member, source) in module.members() {
                match self.resolver.resolve(source) {
                    Ok(spec) => {
                        log::debug!("found plugin spec in {}:{} {}", module.path(), member, spec);
                        plugins.push(spec);
                    }
                    Err(e) => {
                        let Some(callback) = &self.on_resolve_exception else {
                            continue;
                        };
                        let error = PluginError::from(e);
                        let reference = format!("{}:{}", module.path(), member);
                        let ep = EntryPoint::new(member, reference, module.path());
                        callback(module.path(), &ep, &error)?;
                    }
                }
            }
        }

        Ok(plugins)
    }
}

impl fmt::Debug for ModuleScanningPluginFinder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleScanningPluginFinder")
            .field("modules", &self.modules.iter().map(|m| m.path()).collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// Selects modules of a [`ModuleRegistry`] by include and exclude patterns and
/// scans them with a [`ModuleScanningPluginFinder`].
///
/// A module is selected when its path, or the path of any package enclosing
/// it, matches an include pattern (no include patterns selects everything) and
/// neither matches an exclude pattern.
pub struct PackagePathPluginFinder {
    registry: Arc<ModuleRegistry>,
    include: Vec<Pattern>,
    exclude: Vec<Pattern>,
    on_resolve_exception: Option<ResolveExceptionCallback>,
}

impl PackagePathPluginFinder {
    pub fn new(registry: Arc<ModuleRegistry>) -> Self {
        Self {
            registry,
            include: Vec::new(),
            exclude: Vec::new(),
            on_resolve_exception: None,
        }
    }

    pub fn include<S: AsRef<str>>(mut self, patterns: impl IntoIterator<Item = S>) -> Result<Self, PatternError> {
        for p in patterns {
            self.include.push(Pattern::new(p.as_ref())?);
        }
        Ok(self)
    }

    pub fn exclude<S: AsRef<str>>(mut self, patterns: impl IntoIterator<Item = S>) -> Result<Self, PatternError> {
        for p in patterns {
            self.exclude.push(Pattern::new(p.as_ref())?);
        }
        Ok(self)
    }

    pub fn on_resolve_exception(mut self, callback: ResolveExceptionCallback) -> Self {
        self.on_resolve_exception = Some(callback);
        self
    }

    /// Paths of the selected modules, in registration order.
    pub fn list_module_names(&self) -> Vec<String> {
        self.registry
            .module_paths()
            .filter(|path| self.is_selected(path))
            .map(str::to_string)
            .collect()
    }

    fn is_selected(&self, path: &str) -> bool {
        let included = self.include.is_empty() || self.include.iter().any(|p| matches_path_or_ancestor(p, path));
        included && !self.exclude.iter().any(|p| matches_path_or_ancestor(p, path))
    }

    /// Import the selected modules. Modules that fail to import are logged
    /// and skipped.
    pub fn load_modules(&self) -> PluginResult<Vec<Arc<Module>>> {
        let mut modules = Vec::new();
        for path in self.list_module_names() {
            match self.registry.load_module(&path) {
                Ok(module) => modules.push(module),
                Err(e) => {
                    log::error!("error importing module {}: {}", path, e);
                    let ep = EntryPoint::new(path.as_str(), path.as_str(), path.as_str());
                    report(self.on_resolve_exception.as_ref(), &path, &ep, &PluginError::from(e))?;
                }
            }
        }
        Ok(modules)
    }
}

impl PluginFinder for PackagePathPluginFinder {
    fn find_plugins(&self) -> PluginResult<Vec<PluginSpec>> {
        let mut scanner = ModuleScanningPluginFinder::new(self.load_modules()?);
        if let Some(callback) = &self.on_resolve_exception {
            scanner = scanner.on_resolve_exception(callback.clone());
        }
        scanner.find_plugins()
    }
}

impl fmt::Debug for PackagePathPluginFinder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PackagePathPluginFinder")
            .field("include", &self.include.iter().map(Pattern::as_str).collect::<Vec<_>>())
            .field("exclude", &self.exclude.iter().map(Pattern::as_str).collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

fn matches_path_or_ancestor(pattern: &Pattern, path: &str) -> bool {
    let mut current = path;
    loop {
        if pattern.matches(current) {
            return true;
        }
        match current.rsplit_once('.') {
            Some((parent, _)) => current = parent,
            None => return false,
        }
    }
}
