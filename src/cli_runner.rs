//! Command-line front end: turns parsed [`Args`] into a [`RunConfig`], opens
//! the source and target, and runs the split.
//!
//! Logs always go to stderr because stdout may carry the archive.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::cli::{self, Args, NamingMode};
use crate::config::{EntryNaming, RunConfig, Source};
use crate::error::{ConfigError, SplitError};
use crate::split::{self, SplitSummary};

/// Public entry for running the CLI.
pub fn run_cli_app() -> Result<(), Box<dyn std::error::Error>> {
    let args = cli::run()?;
    init_tracing(&args.log_level);

    let summary = run_with_args(&args)?;
    debug!(entries = summary.entries, bytes = summary.bytes, "done");
    Ok(())
}

/// Runs one split as described by `args`.
///
/// The configuration is validated before the source or target is touched.
pub fn run_with_args(args: &Args) -> Result<SplitSummary, SplitError> {
    let config = build_config(args)?;

    let source = open_source(&args.source)?;
    let target = open_target(&args.target)?;

    let mut builder = tar::Builder::new(target);
    split::split(&config, source, &mut builder)
}

/// Resolves the run configuration from the command line and environment.
pub fn build_config(args: &Args) -> Result<RunConfig, ConfigError> {
    let chunk_size = cli::chunk_size_from_opt_or_env(args.bytes)?;

    let mut naming = match args.naming {
        NamingMode::Index => EntryNaming::index(),
        NamingMode::Basename => EntryNaming::basename(base_name(args)),
    };
    if let Some(width) = args.suffix_length {
        naming = naming.with_width(usize::from(width));
    }

    RunConfig::builder()
        .chunk_size(chunk_size.bytes())
        .naming(naming)
        .short_write(args.short_write.into())
        .memory_limit(args.memory_limit.bytes())
        .build()
}

fn base_name(args: &Args) -> String {
    if let Some(name) = &args.base_name {
        return name.clone();
    }
    if is_stdio(&args.source) {
        return "stdin".to_string();
    }
    args.source
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn is_stdio(path: &Path) -> bool {
    path.as_os_str().is_empty() || path == Path::new("-")
}

fn open_source(path: &Path) -> Result<Source<'static>, SplitError> {
    if is_stdio(path) {
        debug!("reading from standard input");
        return Ok(Source::stdin());
    }
    debug!(path = %path.display(), "opening source");
    Source::open(path)
}

fn open_target(path: &Path) -> Result<Box<dyn Write>, SplitError> {
    if is_stdio(path) {
        debug!("writing to standard output");
        // Stdout is line-buffered; tar bodies are binary.
        return Ok(Box::new(BufWriter::new(io::stdout().lock())));
    }
    debug!(path = %path.display(), "creating target");
    let file = File::create(path).map_err(|e| SplitError::io(path, e))?;
    Ok(Box::new(BufWriter::new(file)))
}

fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}
