use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::config::{ShortWritePolicy, DEFAULT_CHUNK_SIZE};
use crate::size::{ByteSize, SizeError};

/// Environment variable consulted when `--bytes` is not given.
pub const CHUNK_SIZE_ENV: &str = "SPLITTAR_BYTES";

const LONG_ABOUT: &str = "Split a source file (or standard input if no source is provided) into \
SIZE chunks and write them as consecutive entries of a tar archive (or standard output if no \
target is given).

This command is intended to be used as a preprocessor to pipe tar archives to other commands.";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = LONG_ABOUT)]
pub struct Args {
    /// Source file to split. `-` reads standard input.
    #[arg(value_name = "FILE", default_value = "-")]
    pub source: PathBuf,

    /// Target tar file to write. `-` writes standard output.
    #[arg(value_name = "TAR_FILE", default_value = "-")]
    pub target: PathBuf,

    /// Put SIZE bytes per entry, e.g. 512K, 64M or 1g. Lowercase suffixes are powers of 1000,
    /// uppercase of 1024. Falls back to SPLITTAR_BYTES, then 64M.
    #[arg(short = 'b', long = "bytes", value_name = "SIZE")]
    pub bytes: Option<ByteSize>,

    /// Zero-pad entry indices to N digits. [default: 8 for index naming, 2 for basename naming]
    #[arg(short = 'a', long, value_name = "N", value_parser = clap::value_parser!(u8).range(1..=20))]
    pub suffix_length: Option<u8>,

    /// How entries are named inside the archive.
    #[arg(short = 'n', long, value_enum, default_value_t = NamingMode::Index)]
    pub naming: NamingMode,

    /// Base name used by `--naming basename`. Defaults to the source file name (`stdin` for standard input).
    #[arg(long, value_name = "NAME")]
    pub base_name: Option<String>,

    /// What to do when the archive accepts fewer bytes than a chunk holds.
    #[arg(long, value_enum, default_value_t = ShortWriteMode::Fail)]
    pub short_write: ShortWriteMode,

    /// `[ADVANCED]` Largest chunk kept in memory; bigger chunks are staged in a temp file.
    #[arg(long, value_name = "SIZE", default_value = "64M")]
    pub memory_limit: ByteSize,

    /// Log filter (error, warn, info, debug, trace). RUST_LOG takes precedence.
    #[arg(short = 'l', long, value_name = "LEVEL", default_value = "warn")]
    pub log_level: String,
}

/// Entry naming scheme.
#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
pub enum NamingMode {
    /// Bare zero-padded index: 00000000, 00000001, ...
    Index,
    /// Source name plus index: disk.img.00, disk.img.01, ...
    Basename,
}

/// Short-write handling.
#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
pub enum ShortWriteMode {
    /// Abort the run.
    Fail,
    /// Log a warning and continue.
    Warn,
}

impl From<ShortWriteMode> for ShortWritePolicy {
    fn from(mode: ShortWriteMode) -> Self {
        match mode {
            ShortWriteMode::Fail => ShortWritePolicy::Fail,
            ShortWriteMode::Warn => ShortWritePolicy::Warn,
        }
    }
}

/// Gets the chunk size from the command-line option, the `SPLITTAR_BYTES` environment variable, or the default.
///
/// Priority:
/// 1. `--bytes` command-line argument.
/// 2. `SPLITTAR_BYTES` environment variable.
/// 3. 64 MiB.
pub fn chunk_size_from_opt_or_env(bytes_opt: Option<ByteSize>) -> Result<ByteSize, SizeError> {
    if let Some(bytes) = bytes_opt {
        return Ok(bytes);
    }
    if let Ok(expr) = std::env::var(CHUNK_SIZE_ENV) {
        return expr.parse();
    }
    ByteSize::new(DEFAULT_CHUNK_SIZE).ok_or(SizeError::ZeroSize)
}

/// Parses command-line arguments using `clap`.
///
/// Usage errors and `--help` exit the process from inside clap.
pub fn run() -> Result<Args, Box<dyn std::error::Error>> {
    Ok(Args::parse())
}
