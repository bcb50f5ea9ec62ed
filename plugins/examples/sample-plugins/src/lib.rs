//! Sample plugin catalogue.
//!
//! The modules declared here are what the `plux` binary scans and loads. They
//! cover every shape a module binding can take: plugin types, function
//! plugins, explicit specifications, plain values, and a module that fails to
//! import.
use log::debug;
use serde_json::Value;

use plux_core::core::{BoxError, LoadArgs, LoadValue, Module, ModuleRegistry, Plugin, PluginClass, PluginFactory,
    PluginSource, PluginSpec, PluginType, plugin};

/// Namespace of the demo plugins
pub const DEMO_NAMESPACE: &str = "plux.demo";

/// Namespace of the tool plugins
pub const TOOLS_NAMESPACE: &str = "plux.tools";

// --- sample_plugins.greeters ---

/// Loads to `"hello-loaded"`, or `"<greeting>-loaded"` when a `greeting`
/// keyword argument is given.
#[derive(Debug, Default)]
pub struct HelloPlugin;

impl Plugin for HelloPlugin {
    fn load(&mut self, args: &LoadArgs) -> Result<LoadValue, BoxError> {
        let greeting = args.get_kwarg("greeting").and_then(Value::as_str).unwrap_or("hello");
        debug!("HelloPlugin loading with greeting {}", greeting);
        Ok(LoadValue::new(format!("{}-loaded", greeting)))
    }
}

impl PluginType for HelloPlugin {
    const NAMESPACE: &'static str = DEMO_NAMESPACE;
    const NAME: &'static str = "hello";
}

/// Base type for greeters. Declares no identity, so it is never discovered.
#[derive(Debug, Default)]
pub struct BaseGreeter;

impl Plugin for BaseGreeter {}

impl PluginType for BaseGreeter {}

/// Echoes its load arguments back as JSON.
#[derive(Debug, Default)]
pub struct EchoPlugin {
    calls: usize,
}

impl Plugin for EchoPlugin {
    fn load(&mut self, args: &LoadArgs) -> Result<LoadValue, BoxError> {
        self.calls += 1;
        Ok(LoadValue::new(serde_json::to_value(args)?))
    }
}

fn greeters() -> Module {
    let echo = PluginSpec::new(DEMO_NAMESPACE, "echo", PluginFactory::of::<EchoPlugin>());
    Module::new("sample_plugins.greeters")
        .with("HelloPlugin", PluginClass::of::<HelloPlugin>())
        .with("BaseGreeter", PluginClass::of::<BaseGreeter>())
        .with("echo", echo)
        .with("GREETING", PluginSource::value("hello"))
}

// --- sample_plugins.functions ---

fn shout() -> String {
    "HELLO".to_string()
}

fn nightly() -> &'static str {
    "nightly features"
}

fn functions() -> Module {
    Module::new("sample_plugins.functions")
        .with(
            "shout",
            plugin(DEMO_NAMESPACE)
                .load(|args: &LoadArgs| {
                    let text = args.get(0).and_then(Value::as_str).unwrap_or("hello");
                    Ok(text.to_uppercase())
                })
                .wrap(shout),
        )
        .with("nightly", plugin(DEMO_NAMESPACE).should_load(false).wrap(nightly))
        .with("anonymous", plugin(DEMO_NAMESPACE).wrap(|| 0u8))
}

// --- sample_plugins.tools ---

/// Tool plugin whose load always fails.
#[derive(Debug, Default)]
pub struct LintPlugin;

impl Plugin for LintPlugin {
    fn load(&mut self, _args: &LoadArgs) -> Result<LoadValue, BoxError> {
        Err("no lint configuration found".into())
    }
}

impl PluginType for LintPlugin {
    const NAMESPACE: &'static str = TOOLS_NAMESPACE;
    const NAME: &'static str = "lint";
}

fn format_tool() -> &'static str {
    "formatted"
}

fn tools() -> Module {
    Module::new("sample_plugins.tools")
        .with("LintPlugin", PluginClass::of::<LintPlugin>())
        .with("format", plugin(TOOLS_NAMESPACE).name("fmt").wrap(format_tool))
        .with("VERSION", PluginSource::value(env!("CARGO_PKG_VERSION")))
}

/// Every sample module, in declaration order. `sample_plugins.broken` fails
/// to import.
pub fn catalog() -> ModuleRegistry {
    let mut registry = ModuleRegistry::new();
    registry
        .register(greeters())
        .register(functions())
        .register_lazy("sample_plugins.tools", || Ok(tools()))
        .register_lazy("sample_plugins.broken", || Err("missing native dependency 'libfoo'".into()));
    registry
}
