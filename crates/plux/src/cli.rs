use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info, warn};
use plux_core::build::{IndexFormat, PackagePathPluginFinder, PluginIndexBuilder, read_index, render_index, write_index};
use plux_core::config::{ConfigError, ConfigOverrides, PluxConfig, read_config_file, read_config_from_workdir};
use plux_core::core::{EntryPointDict, LoadOutcome, LoadValue, LoggingListener};
use plux_core::runtime::{EntryPointsCache, EntryPointsResolver, MetadataFileResolver, PluginManager};
use plux_core::{Error, Result};
use plux_sample_plugins::catalog;

use crate::{CliArgs, Commands};

/// Execute the parsed command line.
pub fn run(args: CliArgs) -> Result<()> {
    let base = load_config(&args.workdir, args.config.as_deref())?;
    let workdir = args.workdir;

    match args.command {
        Commands::Entrypoints {
            include,
            exclude,
            output,
            format,
        } => {
            let config = base.merge(&ConfigOverrides {
                include,
                exclude,
                entrypoint_static_file: output.map(|p| p.to_string_lossy().into_owned()),
                output_format: format,
                ..Default::default()
            });
            entrypoints(&workdir, &config)
        }
        Commands::Discover {
            include,
            exclude,
            format,
        } => {
            let config = base.merge(&ConfigOverrides {
                include,
                exclude,
                output_format: format,
                ..Default::default()
            });
            discover(&config)
        }
        Commands::Show { index } => {
            let path = workdir.join(index.unwrap_or_else(|| PathBuf::from(&base.entrypoint_static_file)));
            show(&path)
        }
        Commands::Resolve {
            namespace,
            index,
            load,
        } => {
            let files = if index.is_empty() {
                vec![workdir.join(&base.entrypoint_static_file)]
            } else {
                index.iter().map(|p| workdir.join(p)).collect()
            };
            resolve(&base, &namespace, &files, load)
        }
    }
}

fn load_config(workdir: &Path, config: Option<&Path>) -> Result<PluxConfig> {
    let config = match config {
        Some(path) => read_config_file(&workdir.join(path))?,
        None => read_config_from_workdir(workdir)?,
    };
    debug!("effective configuration: {:?}", config);
    Ok(config)
}

fn finder(config: &PluxConfig) -> Result<PackagePathPluginFinder> {
    let finder = PackagePathPluginFinder::new(Arc::new(catalog()))
        .include(&config.include)
        .and_then(|f| f.exclude(&config.exclude))
        .map_err(ConfigError::from)?;
    debug!("scanning modules {:?}", finder.list_module_names());
    Ok(finder)
}

fn print_index(dict: &EntryPointDict, format: IndexFormat) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    write_index(&mut out, dict, format)?;
    out.flush().map_err(|e| Error::io(e, "flush", "<stdout>"))?;
    Ok(())
}

fn entrypoints(workdir: &Path, config: &PluxConfig) -> Result<()> {
    let finder = finder(config)?;
    // an existing index is only replaced once the new one is complete
    let dict = PluginIndexBuilder::new(&finder).build()?;
    let rendered = render_index(&dict, config.output_format)?;

    let path = workdir.join(&config.entrypoint_static_file);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::io(e, "create directory", parent))?;
    }
    fs::write(&path, rendered).map_err(|e| Error::io(e, "write", &path))?;
    let count: usize = dict.values().map(Vec::len).sum();
    info!("wrote {} entry points to {}", count, path.display());

    print_index(&dict, config.output_format)
}

fn discover(config: &PluxConfig) -> Result<()> {
    let finder = finder(config)?;
    let dict = plux_core::core::discover_entry_points(&finder)?;
    print_index(&dict, config.output_format)
}

fn show(path: &Path) -> Result<()> {
    if !path.is_file() {
        println!("no entry points to show");
        return Ok(());
    }
    let text = fs::read_to_string(path).map_err(|e| Error::io(e, "read", path))?;
    let format = IndexFormat::from_path(path);
    let dict = read_index(&text, format)?;
    if dict.is_empty() {
        println!("no entry points to show");
        return Ok(());
    }
    print_index(&dict, format)
}

fn resolve(config: &PluxConfig, namespace: &str, files: &[PathBuf], load: bool) -> Result<()> {
    let mut metadata = MetadataFileResolver::new();
    for file in files {
        metadata = if file.is_dir() {
            metadata.with_directory(file)
        } else {
            metadata.with_file(file)
        };
    }
    let entry_points: Arc<dyn EntryPointsResolver> = Arc::new(EntryPointsCache::new(metadata));

    let manager = PluginManager::with_metadata(namespace, entry_points, Arc::new(catalog()))
        .listener(Arc::new(LoggingListener))
        .filter(Arc::new(config.exclusion_filter()?))
        .listener_error_policy(config.listener_errors)
        .conflict_policy(config.conflicts)
        .build();

    let specs = manager.list_plugin_specs()?;
    if specs.is_empty() {
        println!("no plugins found in namespace {}", namespace);
        return Ok(());
    }
    for spec in &specs {
        println!("{} = {}", spec.qualified_name(), spec.origin().unwrap_or("<unbound>"));
    }

    if load {
        let mut failures = 0;
        for spec in &specs {
            match manager.load(spec.name()) {
                Ok(LoadOutcome::Loaded(value)) => println!("{}: loaded {}", spec.name(), describe(&value)),
                Ok(LoadOutcome::Skipped) => println!("{}: skipped", spec.name()),
                Err(e) => {
                    failures += 1;
                    println!("{}: failed: {}", spec.name(), e);
                }
            }
        }
        if failures > 0 {
            warn!("{} of {} plugins in {} failed to load", failures, specs.len(), namespace);
        }
    }

    Ok(())
}

fn describe(value: &LoadValue) -> String {
    if let Some(s) = value.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = value.downcast_ref::<&'static str>() {
        s.to_string()
    } else if let Some(v) = value.downcast_ref::<serde_json::Value>() {
        v.to_string()
    } else {
        format!("{:?}", value)
    }
}
