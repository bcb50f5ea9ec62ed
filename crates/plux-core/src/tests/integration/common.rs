#![cfg(test)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::core::args::LoadArgs;
use crate::core::entrypoint::EntryPoint;
use crate::core::error::{BoxError, PluginError, PluginResult};
use crate::core::listener::PluginLifecycleListener;
use crate::core::module::{Module, ModuleRegistry};
use crate::core::plugin::{LoadValue, Plugin, PluginType};
use crate::core::spec::{PluginClass, PluginFactory, PluginSource, PluginSpec};
use crate::core::function::plugin;

// ===== MOCK PLUGINS =====

/// How a [`TestPlugin`] behaves when managed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behaviour {
    /// `load` returns the given string
    Load(&'static str),
    /// `should_load` returns false
    Skip,
    /// the factory fails
    FailInit,
    /// `load` fails
    FailLoad,
}

/// Invocation counters shared between a test and the plugins it creates
#[derive(Debug, Clone, Default)]
pub struct Counters {
    pub inits: Arc<AtomicUsize>,
    pub loads: Arc<AtomicUsize>,
    pub last_args: Arc<Mutex<Option<LoadArgs>>>,
}

impl Counters {
    pub fn inits(&self) -> usize {
        self.inits.load(Ordering::SeqCst)
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn last_args(&self) -> Option<LoadArgs> {
        self.last_args.lock().unwrap().clone()
    }
}

pub struct TestPlugin {
    behaviour: Behaviour,
    counters: Counters,
}

impl Plugin for TestPlugin {
    fn should_load(&self) -> bool {
        self.behaviour != Behaviour::Skip
    }

    fn load(&mut self, args: &LoadArgs) -> Result<LoadValue, BoxError> {
        self.counters.loads.fetch_add(1, Ordering::SeqCst);
        *self.counters.last_args.lock().unwrap() = Some(args.clone());
        match self.behaviour {
            Behaviour::Load(value) => Ok(LoadValue::new(value.to_string())),
            Behaviour::FailLoad => Err("load failed".into()),
            _ => Ok(LoadValue::unit()),
        }
    }
}

/// A specification whose plugin behaves as described. It is not bound to a module.
pub fn test_spec(namespace: &str, name: &str, behaviour: Behaviour, counters: &Counters) -> PluginSpec {
    let counters = counters.clone();
    let factory = PluginFactory::new(format!("TestPlugin({})", name), move || {
        counters.inits.fetch_add(1, Ordering::SeqCst);
        if behaviour == Behaviour::FailInit {
            return Err("factory failed".into());
        }
        Ok(Box::new(TestPlugin {
            behaviour,
            counters: counters.clone(),
        }) as Box<dyn Plugin>)
    });
    PluginSpec::new(namespace, name, factory)
}

/// The two-plugin "demo" namespace: `a` loads "A-loaded", `b` does not want to load.
pub fn demo_specs(counters: &Counters) -> Vec<PluginSpec> {
    vec![
        test_spec("demo", "a", Behaviour::Load("A-loaded"), counters),
        test_spec("demo", "b", Behaviour::Skip, counters),
    ]
}

#[derive(Debug, Default)]
pub struct GreeterPlugin;

impl Plugin for GreeterPlugin {
    fn load(&mut self, _args: &LoadArgs) -> Result<LoadValue, BoxError> {
        Ok(LoadValue::new("hello".to_string()))
    }
}

impl PluginType for GreeterPlugin {
    const NAMESPACE: &'static str = "test.greeters";
    const NAME: &'static str = "greeter";
}

/// A valid plugin type without identity
#[derive(Debug, Default)]
pub struct AbstractGreeter;

impl Plugin for AbstractGreeter {}

impl PluginType for AbstractGreeter {}

fn shout() -> String {
    "HELLO".to_string()
}

/// Registry with a module of each kind used across the tests.
pub fn test_registry() -> ModuleRegistry {
    let counters = Counters::default();
    let mut registry = ModuleRegistry::new();
    registry
        .register(
            Module::new("tests.greeters")
                .with("GreeterPlugin", PluginClass::of::<GreeterPlugin>())
                .with("AbstractGreeter", PluginClass::of::<AbstractGreeter>())
                .with("VERSION", PluginSource::value("1.0"))
                .with("shout", plugin("test.greeters").load(|_| Ok("HELLO")).wrap(shout)),
        )
        .register(
            Module::new("tests.greeters.extra")
                .with("farewell", test_spec("test.greeters", "farewell", Behaviour::Load("bye"), &counters)),
        )
        .register(Module::new("tests.other").with("unrelated", test_spec("test.other", "x", Behaviour::Skip, &counters)))
        .register_lazy("tests.broken", || Err("import failed".into()));
    registry
}

// ===== RECORDING LISTENER =====

/// Records every event as `hook:namespace:name` and can veto or fail a hook
/// for one plugin name.
#[derive(Default)]
pub struct RecordingListener {
    events: Mutex<Vec<String>>,
    veto: Option<(&'static str, &'static str)>,
    fail: Option<(&'static str, &'static str)>,
}

impl RecordingListener {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Return `PluginError::Disabled` from `hook` for the named plugin
    pub fn vetoing(hook: &'static str, name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            veto: Some((hook, name)),
            ..Default::default()
        })
    }

    /// Return a generic error from `hook` for the named plugin
    pub fn failing(hook: &'static str, name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            fail: Some((hook, name)),
            ..Default::default()
        })
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, hook: &str) -> usize {
        let prefix = format!("{}:", hook);
        self.events().iter().filter(|e| e.starts_with(&prefix)).count()
    }

    fn record(&self, hook: &'static str, namespace: &str, name: &str) -> PluginResult<()> {
        self.events.lock().unwrap().push(format!("{}:{}:{}", hook, namespace, name));
        if self.veto.map(|(h, n)| h == hook && n == name).unwrap_or(false) {
            return Err(PluginError::disabled(namespace, name, format!("vetoed in {}", hook)));
        }
        if self.fail.map(|(h, n)| h == hook && n == name).unwrap_or(false) {
            return Err(PluginError::other(format!("listener failed in {}", hook)));
        }
        Ok(())
    }
}

impl PluginLifecycleListener for RecordingListener {
    fn on_resolve_exception(&self, namespace: &str, entry_point: &EntryPoint, _error: &PluginError) -> PluginResult<()> {
        self.record("resolve_exception", namespace, &entry_point.name)
    }

    fn on_resolve_after(&self, spec: &PluginSpec) -> PluginResult<()> {
        self.record("resolve_after", spec.namespace(), spec.name())
    }

    fn on_init_exception(&self, spec: &PluginSpec, _error: &PluginError) -> PluginResult<()> {
        self.record("init_exception", spec.namespace(), spec.name())
    }

    fn on_init_after(&self, spec: &PluginSpec, _plugin: &dyn Plugin) -> PluginResult<()> {
        self.record("init_after", spec.namespace(), spec.name())
    }

    fn on_load_before(&self, spec: &PluginSpec, _plugin: &dyn Plugin, _args: &LoadArgs) -> PluginResult<()> {
        self.record("load_before", spec.namespace(), spec.name())
    }

    fn on_load_after(&self, spec: &PluginSpec, _plugin: &dyn Plugin, _result: &LoadValue) -> PluginResult<()> {
        self.record("load_after", spec.namespace(), spec.name())
    }

    fn on_load_exception(&self, spec: &PluginSpec, _plugin: &dyn Plugin, _error: &PluginError) -> PluginResult<()> {
        self.record("load_exception", spec.namespace(), spec.name())
    }
}
