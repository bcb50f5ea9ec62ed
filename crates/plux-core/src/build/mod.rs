//! # Plux Build Tools
//!
//! Build-time discovery of plugins by scanning declared modules, and the plugin
//! index file the discovered plugins are written into.
pub mod discovery;
pub mod index;

pub use discovery::{ModuleScanningPluginFinder, PackagePathPluginFinder};
pub use index::{IndexError, IndexFormat, PluginIndexBuilder, read_index, render_index, write_index};
