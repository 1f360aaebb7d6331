//! # splittar
//!
//! Splits one large byte stream into fixed-maximum-size chunks and writes
//! them as consecutive entries of a single tar stream, so a downstream
//! consumer can unpack them without an on-disk splitting step.
//!
//! ## Key Modules
//!
//! - [`size`]: Parses size expressions such as `64M` or `512k`.
//! - [`header`]: Synthesizes the per-run entry header template.
//! - [`split`]: The chunked read/write loop.
//! - [`sink`]: The boundary to the archive encoder (`tar::Builder`).
//! - [`config`]: Run parameters and sources.
//!
//! ## Examples
//!
//! ```
//! use splittar::{split, EntryNaming, RunConfig, Source};
//!
//! let config = RunConfig::builder()
//!     .chunk_size_expr("4")
//!     .naming(EntryNaming::basename("greeting.txt"))
//!     .build()?;
//!
//! let mut archive = tar::Builder::new(Vec::new());
//! let summary = split(&config, Source::owned(&b"hello world"[..]), &mut archive)?;
//! assert_eq!(summary.entries, 3);
//!
//! let bytes = archive.into_inner()?;
//! let mut reader = tar::Archive::new(&bytes[..]);
//! let names: Vec<String> = reader
//!     .entries()?
//!     .map(|e| e.unwrap().path().unwrap().display().to_string())
//!     .collect();
//! assert_eq!(names, ["greeting.txt.00", "greeting.txt.01", "greeting.txt.02"]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod buffer;
pub mod cli;
pub mod cli_runner;
pub mod config;
pub mod error;
pub mod header;
pub mod sink;
pub mod size;
pub mod split;

pub use config::{EntryNaming, RunConfig, ShortWritePolicy, Source};
pub use error::{ConfigError, SplitError};
pub use header::{ChunkHeader, Identity};
pub use sink::EntrySink;
pub use size::{parse_size, ByteSize, SizeError};
pub use split::{split, split_with_template, SplitSummary};
