#![cfg(test)]

use crate::core::finder::StaticPluginFinder;
use crate::runtime::PluginManager;
use crate::tests::integration::common::{Behaviour, Counters, RecordingListener, demo_specs, test_spec};

#[test]
fn test_demo_namespace_load_all() {
    let counters = Counters::default();
    let manager = PluginManager::new("demo", StaticPluginFinder::new(demo_specs(&counters)));

    let values = manager.load_all(false).unwrap();
    let values: Vec<&String> = values.iter().filter_map(|v| v.downcast_ref::<String>()).collect();

    assert_eq!(values, vec!["A-loaded"]);
    assert!(manager.is_loaded("a").unwrap());
    assert!(!manager.is_loaded("b").unwrap());
    assert!(manager.exists("b").unwrap());
}

#[test]
fn test_load_all_skips_one_failure() {
    let counters = Counters::default();
    let listener = RecordingListener::new();
    let specs = vec![
        test_spec("demo", "one", Behaviour::Load("1"), &counters),
        test_spec("demo", "two", Behaviour::FailLoad, &counters),
        test_spec("demo", "three", Behaviour::Load("3"), &counters),
    ];
    let manager = PluginManager::builder("demo", StaticPluginFinder::new(specs))
        .listener(listener.clone())
        .build();

    let values = manager.load_all(false).unwrap();

    assert_eq!(values.len(), 2);
    assert_eq!(listener.count("load_exception"), 1);
    assert!(manager.get_container("two").unwrap().load_error().is_some());
}

#[test]
fn test_load_all_propagates_first_failure() {
    let counters = Counters::default();
    let after = Counters::default();
    let specs = vec![
        test_spec("demo", "one", Behaviour::Load("1"), &counters),
        test_spec("demo", "two", Behaviour::FailLoad, &counters),
        test_spec("demo", "three", Behaviour::Load("3"), &after),
    ];
    let manager = PluginManager::new("demo", StaticPluginFinder::new(specs));

    let err = manager.load_all(true).unwrap_err();

    assert!(matches!(err, crate::core::PluginError::Load { ref name, .. } if name == "two"));
    assert_eq!(after.inits(), 0, "plugins after the failure must not be touched");
    assert!(!manager.is_loaded("three").unwrap());
}

#[test]
fn test_load_all_returns_cached_values_on_second_call() {
    let counters = Counters::default();
    let manager = PluginManager::new("demo", StaticPluginFinder::new(demo_specs(&counters)));

    let first = manager.load_all(false).unwrap();
    let second = manager.load_all(false).unwrap();

    assert_eq!(first.len(), 1);
    assert!(first[0].ptr_eq(&second[0]));
    assert_eq!(counters.loads(), 1);
}
