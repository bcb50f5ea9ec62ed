mod cli; // Command implementations

use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use plux_core::build::IndexFormat;
use tracing_subscriber::EnvFilter;

/// Plux: discover, index and load plugins
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Project directory holding the configuration and the index file
    #[arg(long, global = true, default_value = ".")]
    pub workdir: PathBuf,

    /// Configuration file to use instead of looking one up in the workdir
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log lifecycle details to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Discover plugins and write them to the index file
    Entrypoints {
        /// Module patterns to scan (repeatable)
        #[arg(long)]
        include: Vec<String>,
        /// Module patterns to leave out (repeatable)
        #[arg(long)]
        exclude: Vec<String>,
        /// Index file to write, relative to the workdir
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Index format
        #[arg(long)]
        format: Option<IndexFormat>,
    },
    /// Discover plugins and print them without writing anything
    Discover {
        #[arg(long)]
        include: Vec<String>,
        #[arg(long)]
        exclude: Vec<String>,
        #[arg(long)]
        format: Option<IndexFormat>,
    },
    /// Print the stored index file
    Show {
        /// Index file to read, relative to the workdir
        #[arg(long)]
        index: Option<PathBuf>,
    },
    /// Resolve the plugins of a namespace from index files, as a host would at run time
    Resolve {
        /// The namespace to resolve
        namespace: String,
        /// Index or entry_points.txt files to read (repeatable)
        #[arg(long)]
        index: Vec<PathBuf>,
        /// Also load every resolved plugin
        #[arg(long)]
        load: bool,
    },
}

fn init_logging(verbose: bool) {
    // -v wins over RUST_LOG
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    // `log` records are forwarded to the subscriber as well
    if let Err(e) = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(false)
        .try_init()
    {
        eprintln!("Failed to initialize logging: {}", e);
    }
}

fn main() -> ExitCode {
    let args = CliArgs::parse();
    init_logging(args.verbose);

    match cli::run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
