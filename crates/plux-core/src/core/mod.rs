//! # Plux Core Model
//!
//! The building blocks every other part of the crate works with.
//!
//! ## Key Submodules and Responsibilities:
//!
//! - **[`plugin`](mod@plugin)**: The [`Plugin`] trait, plugin "classes" ([`PluginType`]) and
//!   the type-erased [`LoadValue`] a plugin produces when loaded.
//! - **[`spec`]**: [`PluginSpec`], the immutable `(namespace, name, factory)`
//!   descriptor, and [`PluginSource`], the shapes a module binding can take.
//! - **[`function`]**: Exposing plain functions as plugins through the
//!   [`plugin`](function::plugin) builder.
//! - **[`resolve`]**: Turning a [`PluginSource`] into a [`PluginSpec`].
//! - **[`finder`]**: The [`PluginFinder`] capability.
//! - **[`listener`]**: Lifecycle listeners and their composition.
//! - **[`entrypoint`]**: Entry points and their dictionary form.
//! - **[`module`]**: Declared modules and the [`ModuleRegistry`] import system.
//! - **[`error`]**: [`PluginError`] and [`ResolutionError`].
pub mod args;
pub mod entrypoint;
pub mod error;
pub mod finder;
pub mod function;
pub mod listener;
pub mod module;
pub mod plugin;
pub mod resolve;
pub mod spec;

pub use args::LoadArgs;
pub use entrypoint::{EntryPoint, EntryPointDict, discover_entry_points, spec_to_entry_point, to_entry_point_dict};
pub use error::{BoxError, PluginError, PluginResult, ResolutionError};
pub use finder::{PluginFinder, ResolveExceptionCallback, StaticPluginFinder};
pub use function::{FunctionPlugin, PluginFunction, plugin};
pub use listener::{CompositeListener, ListenerErrorPolicy, LoggingListener, PluginLifecycleListener};
pub use module::{Module, ModuleRegistry, ObjectLoader};
pub use plugin::{LoadOutcome, LoadValue, Plugin, PluginType};
pub use resolve::{DefaultSpecResolver, PluginSpecResolver};
pub use spec::{PluginClass, PluginFactory, PluginSource, PluginSpec};
