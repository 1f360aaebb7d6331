//! Run configuration: chunk size, entry naming, short-write policy and the
//! source a run reads from.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use crate::error::{ConfigError, SplitError};
use crate::size::parse_size;

/// Chunks up to this size are kept in memory; larger ones spill to a temp file.
pub const DEFAULT_MEMORY_LIMIT: u64 = 64 * 1024 * 1024;

/// Default chunk size when nothing else is configured.
pub const DEFAULT_CHUNK_SIZE: u64 = 64 * 1024 * 1024;

/// Index width of `NNNNNNNN` names.
pub const DEFAULT_INDEX_WIDTH: usize = 8;

/// Index width of `<base>.NN` names.
pub const DEFAULT_BASENAME_WIDTH: usize = 2;

/// `u64::MAX` has 20 decimal digits.
pub const MAX_SUFFIX_WIDTH: usize = 20;

/// How chunk entries are named inside the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryNaming {
    /// `00000000`, `00000001`, ...
    Index { width: usize },
    /// `<base>.00`, `<base>.01`, ...
    Basename { base: String, width: usize },
}

impl EntryNaming {
    pub fn index() -> Self {
        EntryNaming::Index { width: DEFAULT_INDEX_WIDTH }
    }

    pub fn basename(base: impl Into<String>) -> Self {
        EntryNaming::Basename { base: base.into(), width: DEFAULT_BASENAME_WIDTH }
    }

    pub fn width(&self) -> usize {
        match self {
            EntryNaming::Index { width } | EntryNaming::Basename { width, .. } => *width,
        }
    }

    /// Replaces the zero-padding width, keeping the mode.
    pub fn with_width(self, width: usize) -> Self {
        match self {
            EntryNaming::Index { .. } => EntryNaming::Index { width },
            EntryNaming::Basename { base, .. } => EntryNaming::Basename { base, width },
        }
    }

    /// Name of the entry holding chunk number `index`.
    ///
    /// Indices wider than the configured width are printed in full.
    pub fn entry_name(&self, index: u64) -> String {
        match self {
            EntryNaming::Index { width } => format!("{index:0width$}"),
            EntryNaming::Basename { base, width } => format!("{base}.{index:0width$}"),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let width = self.width();
        if width == 0 || width > MAX_SUFFIX_WIDTH {
            return Err(ConfigError::SuffixWidth { width, max: MAX_SUFFIX_WIDTH });
        }
        if let EntryNaming::Basename { base, .. } = self {
            if base.is_empty() {
                return Err(ConfigError::MissingBaseName);
            }
        }
        Ok(())
    }
}

impl Default for EntryNaming {
    fn default() -> Self {
        EntryNaming::index()
    }
}

/// What to do when the archive reports a body byte count that differs from the chunk size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShortWritePolicy {
    /// Abort the run; a truncated entry breaks reassembly.
    #[default]
    Fail,
    /// Log a warning and keep going.
    Warn,
}

/// The resolved, immutable parameters of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    chunk_size: u64,
    naming: EntryNaming,
    short_write: ShortWritePolicy,
    memory_limit: u64,
}

impl RunConfig {
    pub fn builder() -> RunConfigBuilder {
        RunConfigBuilder::default()
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    pub fn naming(&self) -> &EntryNaming {
        &self.naming
    }

    pub fn short_write(&self) -> ShortWritePolicy {
        self.short_write
    }

    pub fn memory_limit(&self) -> u64 {
        self.memory_limit
    }

    /// Chunk size to use for a source of the given total length.
    ///
    /// A known source smaller than one chunk only needs a buffer that large.
    pub fn effective_chunk_size(&self, source_len: Option<u64>) -> u64 {
        match source_len {
            Some(len) if len < self.chunk_size => len.max(1),
            _ => self.chunk_size,
        }
    }
}

/// Validating builder for [`RunConfig`].
#[derive(Debug, Clone, Default)]
pub struct RunConfigBuilder {
    chunk_size: Option<u64>,
    size_expr: Option<String>,
    naming: EntryNaming,
    short_write: ShortWritePolicy,
    memory_limit: Option<u64>,
}

impl RunConfigBuilder {
    /// Sets the chunk size in bytes.
    pub fn chunk_size(mut self, bytes: u64) -> Self {
        self.chunk_size = Some(bytes);
        self.size_expr = None;
        self
    }

    /// Sets the chunk size from a size expression such as `"64M"`.
    pub fn chunk_size_expr(mut self, expr: impl Into<String>) -> Self {
        self.size_expr = Some(expr.into());
        self.chunk_size = None;
        self
    }

    pub fn naming(mut self, naming: EntryNaming) -> Self {
        self.naming = naming;
        self
    }

    pub fn short_write(mut self, policy: ShortWritePolicy) -> Self {
        self.short_write = policy;
        self
    }

    pub fn memory_limit(mut self, bytes: u64) -> Self {
        self.memory_limit = Some(bytes);
        self
    }

    pub fn build(self) -> Result<RunConfig, ConfigError> {
        let chunk_size = match (self.chunk_size, self.size_expr) {
            (Some(bytes), _) => bytes,
            (None, Some(expr)) => parse_size(&expr)?,
            (None, None) => DEFAULT_CHUNK_SIZE,
        };
        if chunk_size == 0 {
            return Err(ConfigError::ZeroChunkSize);
        }

        let memory_limit = self.memory_limit.unwrap_or(DEFAULT_MEMORY_LIMIT);
        if memory_limit == 0 {
            return Err(ConfigError::ZeroMemoryLimit);
        }

        self.naming.validate()?;

        Ok(RunConfig {
            chunk_size,
            naming: self.naming,
            short_write: self.short_write,
            memory_limit,
        })
    }
}

/// The reader behind a [`Source`].
enum SourceHandle<'a> {
    /// Owned by the run and closed when the run ends.
    Owned(Box<dyn Read + 'a>),
    /// Lent by the caller, who keeps it open after the run.
    Borrowed(&'a mut dyn Read),
}

/// The byte stream a run splits.
pub struct Source<'a> {
    handle: SourceHandle<'a>,
    name: Option<String>,
    len: Option<u64>,
}

impl<'a> Source<'a> {
    /// Takes ownership of `reader`; it is dropped (closed) when the run ends.
    pub fn owned(reader: impl Read + 'a) -> Self {
        Source { handle: SourceHandle::Owned(Box::new(reader)), name: None, len: None }
    }

    /// Reads from `reader` without closing it; the caller keeps using it afterwards.
    pub fn borrowed<R: Read>(reader: &'a mut R) -> Self {
        Source { handle: SourceHandle::Borrowed(reader), name: None, len: None }
    }

    /// Records the display name used by basename naming.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Records the total length, if the caller knows it.
    pub fn with_len(mut self, len: u64) -> Self {
        self.len = Some(len);
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn len(&self) -> Option<u64> {
        self.len
    }

    /// Whether the run closes this source when it ends.
    pub fn closes_on_finish(&self) -> bool {
        matches!(self.handle, SourceHandle::Owned(_))
    }

    /// Releases the source. Owned readers are dropped here; borrowed ones are left alone.
    pub(crate) fn close(self) {
        if let SourceHandle::Owned(reader) = self.handle {
            drop(reader);
        }
    }
}

impl Source<'static> {
    /// Standard input. The process keeps the descriptor open.
    pub fn stdin() -> Self {
        Source::owned(io::stdin().lock()).with_name("stdin")
    }

    /// Opens `path` for reading, recording its file name and, for regular files, its length.
    pub fn open(path: &Path) -> Result<Self, SplitError> {
        let file = File::open(path).map_err(|e| SplitError::io(path, e))?;
        let metadata = file.metadata().map_err(|e| SplitError::io(path, e))?;

        let mut source = Source::owned(file);
        if let Some(name) = path.file_name() {
            source = source.with_name(name.to_string_lossy());
        }
        // Pipes and devices report a length of zero.
        if metadata.is_file() {
            source = source.with_len(metadata.len());
        }
        Ok(source)
    }
}

impl Read for Source<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.handle {
            SourceHandle::Owned(reader) => reader.read(buf),
            SourceHandle::Borrowed(reader) => reader.read(buf),
        }
    }
}

impl std::fmt::Debug for Source<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Source")
            .field("name", &self.name)
            .field("len", &self.len)
            .field("closes_on_finish", &self.closes_on_finish())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::size::SizeError;
    use std::io::Write;

    #[test]
    fn index_names_are_zero_padded() {
        let naming = EntryNaming::index();
        assert_eq!(naming.entry_name(0), "00000000");
        assert_eq!(naming.entry_name(42), "00000042");
        assert_eq!(EntryNaming::Index { width: 3 }.entry_name(7), "007");
        assert_eq!(EntryNaming::Index { width: 2 }.entry_name(123), "123");
    }

    #[test]
    fn basename_names_carry_the_source_name() {
        let naming = EntryNaming::basename("disk.img");
        assert_eq!(naming.entry_name(0), "disk.img.00");
        assert_eq!(naming.clone().with_width(4).entry_name(11), "disk.img.0011");
        assert_eq!(naming.width(), 2);
    }

    #[test]
    fn builder_defaults() {
        let config = RunConfig::builder().build().unwrap();
        assert_eq!(config.chunk_size(), DEFAULT_CHUNK_SIZE);
        assert_eq!(config.memory_limit(), DEFAULT_MEMORY_LIMIT);
        assert_eq!(config.short_write(), ShortWritePolicy::Fail);
        assert_eq!(config.naming(), &EntryNaming::Index { width: 8 });
    }

    #[test]
    fn builder_parses_size_expressions() {
        let config = RunConfig::builder().chunk_size_expr("2M").build().unwrap();
        assert_eq!(config.chunk_size(), 2 * 1024 * 1024);

        let err = RunConfig::builder().chunk_size_expr("5x").build().unwrap_err();
        assert_eq!(err, ConfigError::InvalidSize(SizeError::UnknownSuffix('x')));

        let err = RunConfig::builder().chunk_size_expr("0").build().unwrap_err();
        assert_eq!(err, ConfigError::InvalidSize(SizeError::ZeroSize));

        let err = RunConfig::builder().chunk_size_expr("-4").build().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSize(SizeError::InvalidNumber(_))));
    }

    #[test]
    fn builder_rejects_bad_values() {
        assert_eq!(RunConfig::builder().chunk_size(0).build().unwrap_err(), ConfigError::ZeroChunkSize);
        assert_eq!(
            RunConfig::builder().chunk_size(1).memory_limit(0).build().unwrap_err(),
            ConfigError::ZeroMemoryLimit
        );
        assert_eq!(
            RunConfig::builder().naming(EntryNaming::Index { width: 0 }).build().unwrap_err(),
            ConfigError::SuffixWidth { width: 0, max: 20 }
        );
        assert_eq!(
            RunConfig::builder().naming(EntryNaming::basename("")).build().unwrap_err(),
            ConfigError::MissingBaseName
        );
    }

    #[test]
    fn later_chunk_size_wins() {
        let config = RunConfig::builder().chunk_size_expr("1K").chunk_size(10).build().unwrap();
        assert_eq!(config.chunk_size(), 10);
    }

    #[test]
    fn effective_chunk_size_collapses_to_known_length() {
        let config = RunConfig::builder().chunk_size(1024).build().unwrap();
        assert_eq!(config.effective_chunk_size(None), 1024);
        assert_eq!(config.effective_chunk_size(Some(4096)), 1024);
        assert_eq!(config.effective_chunk_size(Some(10)), 10);
        assert_eq!(config.effective_chunk_size(Some(0)), 1);
    }

    #[test]
    fn open_records_name_and_length() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"0123456789").unwrap();

        let source = Source::open(file.path()).unwrap();
        assert_eq!(source.len(), Some(10));
        assert_eq!(source.name(), file.path().file_name().and_then(|n| n.to_str()));
        assert!(source.closes_on_finish());
    }

    #[test]
    fn open_missing_path_names_the_path() {
        let err = Source::open(Path::new("/definitely/not/here.bin")).unwrap_err();
        assert!(matches!(err, SplitError::Io { .. }));
        assert!(err.to_string().contains("/definitely/not/here.bin"));
    }

    #[test]
    fn borrowed_source_does_not_close() {
        let mut data: &[u8] = b"abc";
        let source = Source::borrowed(&mut data);
        assert!(!source.closes_on_finish());
        assert_eq!(source.len(), None);
    }
}
