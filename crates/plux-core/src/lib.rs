//! Plux: plugin discovery and lifecycle management.
//!
//! Plugins are declared in [`Module`](core::Module)s, discovered at build time
//! by scanning those modules ([`build`]), advertised through entry points, and
//! found again at run time by a [`PluginManager`] that instantiates, loads and
//! caches them per namespace ([`runtime`]).
pub mod build;
pub mod config;
pub mod core;
pub mod error;
pub mod runtime;

pub use crate::core::{
    EntryPoint, LoadArgs, LoadOutcome, LoadValue, Module, ModuleRegistry, Plugin, PluginError, PluginFinder,
    PluginLifecycleListener, PluginSource, PluginSpec, PluginType, plugin,
};
pub use build::{PackagePathPluginFinder, PluginIndexBuilder};
pub use config::PluxConfig;
pub use error::{Error, Result};
pub use runtime::{PluginContainer, PluginManager};

#[cfg(test)]
mod tests;
