#![cfg(test)]

use std::sync::mpsc;
use std::sync::{Arc, Mutex, OnceLock, Weak};
use std::thread;
use std::time::Duration;

use serde_json::json;

use crate::core::args::LoadArgs;
use crate::core::error::PluginError;
use crate::core::finder::StaticPluginFinder;
use crate::core::listener::{ListenerErrorPolicy, ListenerResult, PluginLifecycleListener};
use crate::core::plugin::{LoadOutcome, LoadValue, Plugin};
use crate::core::spec::PluginSpec;
use crate::runtime::conflict::ConflictPolicy;
use crate::runtime::container::LifecycleState;
use crate::runtime::filter::MatchingPluginFilter;
use crate::runtime::manager::PluginManager;
use crate::tests::integration::common::{Behaviour, Counters, RecordingListener, test_spec};

fn manager_with(specs: Vec<PluginSpec>) -> PluginManager {
    PluginManager::new("demo", StaticPluginFinder::new(specs))
}

// --- Index ---

#[test]
fn test_listing_does_not_initialize() {
    let counters = Counters::default();
    let manager = manager_with(vec![
        test_spec("demo", "a", Behaviour::Load("A"), &counters),
        test_spec("demo", "b", Behaviour::Load("B"), &counters),
    ]);

    assert_eq!(manager.list_names().unwrap(), vec!["a", "b"]);
    assert_eq!(manager.list_plugin_specs().unwrap().len(), 2);
    let containers = manager.list_containers().unwrap();
    assert!(containers.iter().all(|c| c.state() == LifecycleState::Resolved));
    assert_eq!(counters.inits(), 0);
}

#[test]
fn test_other_namespaces_are_ignored() {
    let counters = Counters::default();
    let manager = manager_with(vec![
        test_spec("demo", "a", Behaviour::Load("A"), &counters),
        test_spec("other", "x", Behaviour::Load("X"), &counters),
    ]);

    assert_eq!(manager.list_names().unwrap(), vec!["a"]);
    assert!(!manager.exists("x").unwrap());
}

#[test]
fn test_unknown_plugin_is_not_found() {
    let manager = manager_with(vec![]);

    assert!(manager.load("nope").unwrap_err().is_not_found());
    assert!(manager.get_container("nope").unwrap_err().is_not_found());
    assert!(manager.is_loaded("nope").unwrap_err().is_not_found());
    assert!(!manager.exists("nope").unwrap());
}

#[test]
fn test_duplicates_first_wins_by_default() {
    let first = Counters::default();
    let second = Counters::default();
    let manager = manager_with(vec![
        test_spec("demo", "a", Behaviour::Load("first"), &first),
        test_spec("demo", "a", Behaviour::Load("second"), &second),
    ]);

    let value = manager.load("a").unwrap().into_value().unwrap();
    assert_eq!(value.downcast_ref::<String>().unwrap(), "first");
    assert_eq!(manager.list_names().unwrap().len(), 1);
}

#[test]
fn test_duplicates_last_wins() {
    let counters = Counters::default();
    let specs = vec![
        test_spec("demo", "a", Behaviour::Load("first"), &counters),
        test_spec("demo", "b", Behaviour::Load("B"), &counters),
        test_spec("demo", "a", Behaviour::Load("second"), &counters),
    ];
    let manager = PluginManager::builder("demo", StaticPluginFinder::new(specs))
        .conflict_policy(ConflictPolicy::LastWins)
        .build();

    assert_eq!(manager.list_names().unwrap(), vec!["a", "b"]);
    let value = manager.load("a").unwrap().into_value().unwrap();
    assert_eq!(value.downcast_ref::<String>().unwrap(), "second");
}

#[test]
fn test_duplicates_error_policy() {
    let counters = Counters::default();
    let specs = vec![
        test_spec("demo", "a", Behaviour::Load("first"), &counters),
        test_spec("demo", "a", Behaviour::Load("second"), &counters),
    ];
    let manager = PluginManager::builder("demo", StaticPluginFinder::new(specs))
        .conflict_policy(ConflictPolicy::Error)
        .build();

    assert!(matches!(manager.list_names().unwrap_err(), PluginError::Conflict { .. }));
}

#[test]
fn test_finder_runs_once() {
    use std::sync::atomic::{AtomicUsize, Ordering};

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let counters = Counters::default();
    let finder = move || {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok::<_, PluginError>(vec![test_spec("demo", "a", Behaviour::Load("A"), &counters)])
    };
    let manager = PluginManager::new("demo", finder);

    manager.list_names().unwrap();
    manager.load("a").unwrap();
    manager.exists("a").unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

// --- Load ---

#[test]
fn test_load_is_idempotent() {
    let counters = Counters::default();
    let manager = manager_with(vec![test_spec("demo", "a", Behaviour::Load("A"), &counters)]);

    let first = manager.load("a").unwrap().into_value().unwrap();
    let second = manager.load("a").unwrap().into_value().unwrap();

    assert!(first.ptr_eq(&second));
    assert_eq!(counters.inits(), 1);
    assert_eq!(counters.loads(), 1);
    assert_eq!(manager.get_container("a").unwrap().state(), LifecycleState::Loaded);
}

#[test]
fn test_should_load_false_skips_without_marking_loaded() {
    let counters = Counters::default();
    let listener = RecordingListener::new();
    let manager = PluginManager::builder("demo", StaticPluginFinder::new(vec![test_spec(
        "demo",
        "b",
        Behaviour::Skip,
        &counters,
    )]))
    .listener(listener.clone())
    .build();

    let outcome = manager.load("b").unwrap();

    assert!(matches!(outcome, LoadOutcome::Skipped));
    assert!(!manager.is_loaded("b").unwrap());
    assert_eq!(manager.get_container("b").unwrap().state(), LifecycleState::Initialized);
    assert_eq!(listener.count("load_before"), 0);
    assert_eq!(listener.count("load_after"), 0);
    assert_eq!(counters.loads(), 0);
}

#[test]
fn test_init_failure_is_sticky() {
    let counters = Counters::default();
    let listener = RecordingListener::new();
    let manager = PluginManager::builder("demo", StaticPluginFinder::new(vec![test_spec(
        "demo",
        "a",
        Behaviour::FailInit,
        &counters,
    )]))
    .listener(listener.clone())
    .build();

    let first = manager.load("a").unwrap_err();
    let second = manager.load("a").unwrap_err();

    assert!(matches!(first, PluginError::Initialization { .. }));
    assert!(matches!(second, PluginError::Initialization { .. }));
    assert_eq!(counters.inits(), 1, "the factory is not retried");
    assert_eq!(listener.count("init_exception"), 1);
    assert!(manager.get_container("a").unwrap().init_error().is_some());
}

#[test]
fn test_load_failure_is_reported_and_returned() {
    let counters = Counters::default();
    let listener = RecordingListener::new();
    let manager = PluginManager::builder("demo", StaticPluginFinder::new(vec![test_spec(
        "demo",
        "a",
        Behaviour::FailLoad,
        &counters,
    )]))
    .listener(listener.clone())
    .build();

    let err = manager.load("a").unwrap_err();

    assert!(matches!(err, PluginError::Load { .. }));
    assert_eq!(err.to_string(), "error loading plugin demo:a: load failed");
    assert_eq!(listener.events(), vec![
        "resolve_after:demo:a",
        "init_after:demo:a",
        "load_before:demo:a",
        "load_exception:demo:a",
    ]);
    assert!(!manager.is_loaded("a").unwrap());

    // an explicit retry calls the plugin again
    assert!(manager.load("a").is_err());
    assert_eq!(counters.loads(), 2);
}

#[test]
fn test_event_order_of_successful_load() {
    let counters = Counters::default();
    let listener = RecordingListener::new();
    let manager = PluginManager::builder("demo", StaticPluginFinder::new(vec![test_spec(
        "demo",
        "a",
        Behaviour::Load("A"),
        &counters,
    )]))
    .listener(listener.clone())
    .build();

    manager.load("a").unwrap();
    manager.load("a").unwrap();

    assert_eq!(listener.events(), vec![
        "resolve_after:demo:a",
        "init_after:demo:a",
        "load_before:demo:a",
        "load_after:demo:a",
    ]);
}

#[test]
fn test_load_args_merge_defaults_and_call_site() {
    let counters = Counters::default();
    let manager = PluginManager::builder("demo", StaticPluginFinder::new(vec![test_spec(
        "demo",
        "a",
        Behaviour::Load("A"),
        &counters,
    )]))
    .load_args(LoadArgs::new().arg("default").kwarg("mode", "fast").kwarg("level", 1))
    .build();

    let call = LoadArgs::new().arg("extra").kwarg("level", 2);
    manager.load_with("a", Some(&call)).unwrap();

    let args = counters.last_args().unwrap();
    assert_eq!(args.args, vec![json!("default"), json!("extra")]);
    assert_eq!(args.get_kwarg("mode"), Some(&json!("fast")));
    assert_eq!(args.get_kwarg("level"), Some(&json!(2)));
}

// --- Disable ---

#[test]
fn test_disable_before_load() {
    let counters = Counters::default();
    let manager = manager_with(vec![test_spec("demo", "a", Behaviour::Load("A"), &counters)]);

    assert!(manager.disable("a", Some("maintenance")).unwrap());

    let err = manager.load("a").unwrap_err();
    assert!(err.is_disabled());
    assert_eq!(err.disabled_reason(), Some("maintenance"));
    assert_eq!(err.to_string(), "plugin demo:a is disabled, reason: maintenance");
    assert_eq!(counters.inits(), 0);
    assert!(manager.exists("a").unwrap());
}

#[test]
fn test_disable_after_load_is_a_noop() {
    let counters = Counters::default();
    let manager = manager_with(vec![test_spec("demo", "a", Behaviour::Load("A"), &counters)]);

    manager.load("a").unwrap();
    assert!(!manager.disable("a", None).unwrap());
    assert!(manager.load("a").unwrap().is_loaded());
}

#[test]
fn test_disabled_plugins_are_left_out_of_load_all() {
    let counters = Counters::default();
    let manager = manager_with(vec![
        test_spec("demo", "a", Behaviour::Load("A"), &counters),
        test_spec("demo", "b", Behaviour::Load("B"), &counters),
    ]);
    manager.disable("b", None).unwrap();

    assert_eq!(manager.load_all(false).unwrap().len(), 1);
    assert!(manager.load_all(true).unwrap_err().is_disabled());
}

// --- Listeners ---

#[test]
fn test_resolve_after_sees_other_namespaces() {
    let counters = Counters::default();
    let listener = RecordingListener::new();
    let manager = PluginManager::builder("demo", StaticPluginFinder::new(vec![
        test_spec("demo", "a", Behaviour::Load("A"), &counters),
        test_spec("other", "x", Behaviour::Load("X"), &counters),
    ]))
    .listener(listener.clone())
    .build();

    manager.list_names().unwrap();
    assert_eq!(listener.events(), vec!["resolve_after:demo:a", "resolve_after:other:x"]);
}

#[test]
fn test_veto_in_resolve_after_disables_container() {
    let counters = Counters::default();
    let manager = PluginManager::builder("demo", StaticPluginFinder::new(vec![test_spec(
        "demo",
        "a",
        Behaviour::Load("A"),
        &counters,
    )]))
    .listener(RecordingListener::vetoing("resolve_after", "a"))
    .build();

    let container = manager.get_container("a").unwrap();
    assert_eq!(container.state(), LifecycleState::Disabled);
    assert_eq!(container.disabled_reason().as_deref(), Some("vetoed in resolve_after"));
    assert!(manager.load("a").unwrap_err().is_disabled());
    assert_eq!(counters.inits(), 0);
}

#[test]
fn test_veto_in_init_after_disables_container() {
    let counters = Counters::default();
    let manager = PluginManager::builder("demo", StaticPluginFinder::new(vec![test_spec(
        "demo",
        "a",
        Behaviour::Load("A"),
        &counters,
    )]))
    .listener(RecordingListener::vetoing("init_after", "a"))
    .build();

    assert!(manager.load("a").unwrap_err().is_disabled());
    assert!(manager.load("a").unwrap_err().is_disabled());
    assert_eq!(manager.get_container("a").unwrap().state(), LifecycleState::Disabled);
    assert_eq!(counters.inits(), 1);
    assert_eq!(counters.loads(), 0);
}

#[test]
fn test_veto_in_load_before_disables_container() {
    let counters = Counters::default();
    let listener = RecordingListener::vetoing("load_before", "a");
    let manager = PluginManager::builder("demo", StaticPluginFinder::new(vec![test_spec(
        "demo",
        "a",
        Behaviour::Load("A"),
        &counters,
    )]))
    .listener(listener.clone())
    .build();

    let err = manager.load("a").unwrap_err();
    assert_eq!(err.disabled_reason(), Some("vetoed in load_before"));
    assert_eq!(counters.loads(), 0);
    assert_eq!(listener.count("load_after"), 0);
    assert!(manager.get_container("a").unwrap().is_disabled());
}

#[test]
fn test_failing_listener_propagates_by_default() {
    let counters = Counters::default();
    let manager = PluginManager::builder("demo", StaticPluginFinder::new(vec![test_spec(
        "demo",
        "a",
        Behaviour::Load("A"),
        &counters,
    )]))
    .listener(RecordingListener::failing("load_before", "a"))
    .build();

    let err = manager.load("a").unwrap_err();
    assert_eq!(err.to_string(), "listener failed in load_before");
    assert!(!manager.get_container("a").unwrap().is_disabled());
    assert_eq!(counters.loads(), 0);
}

#[test]
fn test_failing_listener_is_logged_under_log_policy() {
    let counters = Counters::default();
    let after = RecordingListener::new();
    let manager = PluginManager::builder("demo", StaticPluginFinder::new(vec![test_spec(
        "demo",
        "a",
        Behaviour::Load("A"),
        &counters,
    )]))
    .listener(RecordingListener::failing("load_before", "a"))
    .listener(after.clone())
    .listener_error_policy(ListenerErrorPolicy::Log)
    .build();

    assert!(manager.load("a").unwrap().is_loaded());
    assert_eq!(after.count("load_before"), 1);
    assert_eq!(after.count("load_after"), 1);
}

// --- Filters ---

#[test]
fn test_filtered_plugins_are_not_indexed() {
    let counters = Counters::default();
    let filter = MatchingPluginFilter::new();
    filter.add_exclusion(None, Some("b*"), None).unwrap();
    let listener = RecordingListener::new();
    let manager = PluginManager::builder("demo", StaticPluginFinder::new(vec![
        test_spec("demo", "a", Behaviour::Load("A"), &counters),
        test_spec("demo", "beta", Behaviour::Load("B"), &counters),
    ]))
    .filter(Arc::new(filter))
    .listener(listener.clone())
    .build();

    assert_eq!(manager.list_names().unwrap(), vec!["a"]);
    assert!(manager.load("beta").unwrap_err().is_not_found());
    // the listener still saw the filtered specification
    assert_eq!(listener.count("resolve_after"), 2);
}

#[test]
fn test_global_filter_is_shared() {
    let counters = Counters::default();
    let global = Arc::new(MatchingPluginFilter::new());
    global.add_exclusion(Some("demo"), Some("a"), None).unwrap();

    let first = PluginManager::builder("demo", StaticPluginFinder::new(vec![test_spec(
        "demo",
        "a",
        Behaviour::Load("A"),
        &counters,
    )]))
    .global_filter(global.clone())
    .build();
    let second = PluginManager::builder("demo", StaticPluginFinder::new(vec![
        test_spec("demo", "a", Behaviour::Load("A"), &counters),
        test_spec("demo", "b", Behaviour::Load("B"), &counters),
    ]))
    .global_filter(global)
    .build();

    assert!(first.list_names().unwrap().is_empty());
    assert_eq!(second.list_names().unwrap(), vec!["b"]);
}

#[test]
fn test_closure_filter() {
    let counters = Counters::default();
    let manager = PluginManager::builder("demo", StaticPluginFinder::new(vec![
        test_spec("demo", "keep", Behaviour::Load("A"), &counters),
        test_spec("demo", "drop", Behaviour::Load("B"), &counters),
    ]))
    .filter(Arc::new(|spec: &PluginSpec| spec.name() == "drop"))
    .build();

    assert_eq!(manager.list_names().unwrap(), vec!["keep"]);
}

// --- Listeners reading container state ---

/// Reads the manager's view of the plugin it is notified about.
#[derive(Default)]
struct StateReadingListener {
    manager: OnceLock<Weak<PluginManager>>,
    seen: Mutex<Vec<String>>,
}

impl StateReadingListener {
    fn observe(&self, hook: &str, name: &str) -> ListenerResult {
        let Some(manager) = self.manager.get().and_then(Weak::upgrade) else {
            return Ok(());
        };
        let loaded = manager.is_loaded(name)?;
        let state = manager.get_container(name)?.state();
        self.seen.lock().unwrap().push(format!("{}:{}:{}", hook, loaded, state));
        Ok(())
    }
}

impl PluginLifecycleListener for StateReadingListener {
    fn on_init_after(&self, spec: &PluginSpec, _plugin: &dyn Plugin) -> ListenerResult {
        self.observe("init_after", spec.name())
    }

    fn on_load_after(&self, spec: &PluginSpec, _plugin: &dyn Plugin, _result: &LoadValue) -> ListenerResult {
        self.observe("load_after", spec.name())
    }

    fn on_load_exception(&self, spec: &PluginSpec, _plugin: &dyn Plugin, _error: &PluginError) -> ListenerResult {
        self.observe("load_exception", spec.name())
    }
}

fn load_in_background(manager: &Arc<PluginManager>, name: &'static str) -> Result<LoadOutcome, PluginError> {
    let (tx, rx) = mpsc::channel();
    let manager = manager.clone();
    thread::spawn(move || {
        let _ = tx.send(manager.load(name));
    });
    rx.recv_timeout(Duration::from_secs(5)).expect("load did not finish")
}

#[test]
fn test_listener_can_read_state_of_its_plugin() {
    let counters = Counters::default();
    let listener = Arc::new(StateReadingListener::default());
    let manager = Arc::new(
        PluginManager::builder("demo", StaticPluginFinder::new(vec![
            test_spec("demo", "a", Behaviour::Load("A"), &counters),
            test_spec("demo", "b", Behaviour::FailLoad, &counters),
        ]))
        .listener(listener.clone())
        .build(),
    );
    listener.manager.set(Arc::downgrade(&manager)).unwrap();

    assert!(load_in_background(&manager, "a").unwrap().is_loaded());
    assert!(load_in_background(&manager, "b").is_err());

    assert_eq!(*listener.seen.lock().unwrap(), vec![
        "init_after:false:initialized",
        "load_after:true:loaded",
        "init_after:false:initialized",
        "load_exception:false:initialized",
    ]);
}

// --- Listener failures around plugin failures ---

#[test]
fn test_failing_init_after_is_recorded_as_init_error() {
    let counters = Counters::default();
    let listener = RecordingListener::failing("init_after", "a");
    let manager = PluginManager::builder("demo", StaticPluginFinder::new(vec![test_spec(
        "demo",
        "a",
        Behaviour::Load("A"),
        &counters,
    )]))
    .listener(listener.clone())
    .build();

    let err = manager.load("a").unwrap_err();
    assert_eq!(err.to_string(), "listener failed in init_after");

    // the second call neither re-runs the factory nor loads the plugin
    let again = manager.load("a").unwrap_err();
    assert_eq!(again.to_string(), err.to_string());
    let container = manager.get_container("a").unwrap();
    assert!(container.init_error().is_some());
    assert!(!container.is_disabled());
    assert_eq!(counters.inits(), 1);
    assert_eq!(counters.loads(), 0);
    assert_eq!(listener.count("init_after"), 1);
    assert_eq!(listener.count("load_before"), 0);
}

#[test]
fn test_failing_exception_hooks_keep_the_plugin_error() {
    let counters = Counters::default();
    let manager = PluginManager::builder("demo", StaticPluginFinder::new(vec![
        test_spec("demo", "init", Behaviour::FailInit, &counters),
        test_spec("demo", "load", Behaviour::FailLoad, &counters),
    ]))
    .listener(RecordingListener::failing("init_exception", "init"))
    .listener(RecordingListener::failing("load_exception", "load"))
    .build();

    assert!(matches!(manager.load("init"), Err(PluginError::Initialization { .. })));
    assert!(matches!(manager.load("load"), Err(PluginError::Load { .. })));
    assert!(manager.get_container("load").unwrap().load_error().is_some());
}
