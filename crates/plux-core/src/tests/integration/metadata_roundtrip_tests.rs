#![cfg(test)]

use std::fs;
use std::sync::Arc;

use tempfile::tempdir;

use crate::build::discovery::PackagePathPluginFinder;
use crate::build::index::{IndexFormat, PluginIndexBuilder};
use crate::runtime::PluginManager;
use crate::runtime::metadata::MetadataFileResolver;
use crate::tests::integration::common::{RecordingListener, test_registry};

#[test]
fn test_build_index_then_load_at_runtime() {
    let registry = Arc::new(test_registry());
    let finder = PackagePathPluginFinder::new(registry.clone());

    let dir = tempdir().unwrap();
    let index_path = dir.path().join("plux.json");
    let mut file = fs::File::create(&index_path).unwrap();
    let written = PluginIndexBuilder::new(&finder).write(&mut file, IndexFormat::Json).unwrap();
    drop(file);

    assert_eq!(
        written["test.greeters"],
        vec![
            "farewell=tests.greeters.extra:farewell".to_string(),
            "greeter=tests.greeters:GreeterPlugin".to_string(),
            "shout=tests.greeters:shout".to_string(),
        ]
    );

    let resolver = Arc::new(MetadataFileResolver::new().with_file(&index_path));
    let manager = PluginManager::with_metadata("test.greeters", resolver, registry).build();

    assert_eq!(manager.list_names().unwrap(), vec!["farewell", "greeter", "shout"]);

    let greeting = manager.load("greeter").unwrap().into_value().unwrap();
    assert_eq!(greeting.downcast_ref::<String>().map(String::as_str), Some("hello"));

    let shout = manager.load("shout").unwrap().into_value().unwrap();
    assert_eq!(shout.downcast_ref::<&str>(), Some(&"HELLO"));
}

#[test]
fn test_broken_entry_points_are_reported_to_listeners() {
    let registry = Arc::new(test_registry());
    let dir = tempdir().unwrap();
    let index_path = dir.path().join("entry_points.txt");
    fs::write(
        &index_path,
        "[test.greeters]\n\
         greeter = tests.greeters:GreeterPlugin\n\
         version = tests.greeters:VERSION\n\
         missing = tests.greeters:DoesNotExist\n\
         broken = tests.broken:Anything\n",
    )
    .unwrap();

    let listener = RecordingListener::new();
    let resolver = Arc::new(MetadataFileResolver::new().with_file(&index_path));
    let manager = PluginManager::with_metadata("test.greeters", resolver, registry)
        .listener(listener.clone())
        .build();

    assert_eq!(manager.list_names().unwrap(), vec!["greeter"]);
    assert_eq!(
        listener
            .events()
            .into_iter()
            .filter(|e| e.starts_with("resolve_exception"))
            .collect::<Vec<_>>(),
        vec![
            "resolve_exception:test.greeters:version",
            "resolve_exception:test.greeters:missing",
            "resolve_exception:test.greeters:broken",
        ]
    );
}

#[test]
fn test_missing_metadata_file_is_an_error() {
    let dir = tempdir().unwrap();
    let resolver = Arc::new(MetadataFileResolver::new().with_file(dir.path().join("nope.json")));
    let manager = PluginManager::with_metadata("test.greeters", resolver, Arc::new(test_registry())).build();

    let err = manager.list_names().unwrap_err();
    assert!(matches!(err, crate::core::PluginError::Metadata { .. }));
}
