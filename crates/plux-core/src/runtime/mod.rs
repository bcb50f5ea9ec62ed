//! # Plux Runtime
//!
//! Everything needed to find, filter and load plugins in a running program.
//!
//! - **[`manager`]**: [`PluginManager`], orchestrating finder, filters,
//!   containers and listeners for one namespace.
//! - **[`container`]**: [`PluginContainer`], the per-plugin lifecycle record.
//! - **[`filter`]**: [`PluginFilter`] and the pattern based [`MatchingPluginFilter`].
//! - **[`conflict`]**: [`ConflictPolicy`] for duplicate plugin names.
//! - **[`metadata`]**: Entry point resolvers reading package metadata.
//! - **[`resolve`]**: [`MetadataPluginFinder`], resolving entry points into
//!   specifications.
pub mod conflict;
pub mod container;
pub mod filter;
pub mod manager;
pub mod metadata;
pub mod resolve;

pub use conflict::ConflictPolicy;
pub use container::{LifecycleState, PluginContainer};
pub use filter::{ExclusionRule, MatchingPluginFilter, PluginFilter, PluginSpecMatcher};
pub use manager::{PluginManager, PluginManagerBuilder};
pub use metadata::{
    EntryPointIndex, EntryPointsCache, EntryPointsResolver, MetadataFileResolver, StaticEntryPointsResolver,
    build_entry_point_index, parse_entry_points_text, resolve_entry_points, serialize_entry_points_text,
};
pub use resolve::MetadataPluginFinder;

#[cfg(test)]
mod tests;
