//! # Split Loop
//!
//! Reads the source chunk by chunk and writes every non-empty chunk as one
//! archive entry:
//!
//! 1. fill the chunk buffer until it is full or the source hits end-of-stream;
//! 2. stop if nothing was read, otherwise name the entry, set its size and
//!    hand header and body to the sink;
//! 3. repeat with the next index.
//!
//! The sink is finalized and the source released on every exit path.

use tracing::{debug, info, warn};

use crate::buffer::ChunkBuffer;
use crate::config::{RunConfig, ShortWritePolicy, Source};
use crate::error::SplitError;
use crate::header::ChunkHeader;
use crate::sink::EntrySink;

/// What a successful run wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SplitSummary {
    /// Number of entries appended to the archive.
    pub entries: u64,
    /// Total body bytes, equal to the number of bytes read from the source.
    pub bytes: u64,
}

/// Splits `source` into `sink` with a header template for the current user.
pub fn split<S>(config: &RunConfig, source: Source<'_>, sink: &mut S) -> Result<SplitSummary, SplitError>
where
    S: EntrySink + ?Sized,
{
    split_with_template(config, source, sink, ChunkHeader::synthesize())
}

/// Splits `source` into `sink`, stamping every entry from `template`.
pub fn split_with_template<S>(
    config: &RunConfig,
    mut source: Source<'_>,
    sink: &mut S,
    mut template: ChunkHeader,
) -> Result<SplitSummary, SplitError>
where
    S: EntrySink + ?Sized,
{
    debug!(?source, chunk_size = config.chunk_size(), "starting split");

    let result = run(config, &mut source, sink, &mut template);

    source.close();
    let closed = sink.finish().map_err(SplitError::Close);

    let summary = SplitError::compose(result, closed)?;
    info!(entries = summary.entries, bytes = summary.bytes, "split complete");
    Ok(summary)
}

fn run<S>(
    config: &RunConfig,
    source: &mut Source<'_>,
    sink: &mut S,
    template: &mut ChunkHeader,
) -> Result<SplitSummary, SplitError>
where
    S: EntrySink + ?Sized,
{
    let chunk_size = config.effective_chunk_size(source.len());
    let mut buffer = ChunkBuffer::new(chunk_size, config.memory_limit())?;
    let mut summary = SplitSummary::default();

    for index in 0u64.. {
        let filled = buffer.fill_from(source)?;
        if filled == 0 {
            debug!(index, "source exhausted");
            break;
        }

        flush(config, index, &mut buffer, template, sink)?;
        summary.entries += 1;
        summary.bytes += filled;
    }

    Ok(summary)
}

/// Writes the buffered chunk as entry `index`.
fn flush<S>(
    config: &RunConfig,
    index: u64,
    buffer: &mut ChunkBuffer,
    template: &mut ChunkHeader,
    sink: &mut S,
) -> Result<(), SplitError>
where
    S: EntrySink + ?Sized,
{
    let expected = buffer.len();
    template.prepare(config.naming().entry_name(index), expected);
    debug!(entry = %template.name, size = expected, "writing entry");

    let mut body = buffer.payload()?;
    let written = sink
        .append_entry(template, &mut *body)
        .map_err(|source| SplitError::TargetWrite { entry: template.name.clone(), source })?;

    if written != expected {
        match config.short_write() {
            ShortWritePolicy::Fail => {
                return Err(SplitError::ShortWrite { entry: template.name.clone(), expected, written });
            }
            ShortWritePolicy::Warn => {
                warn!(
                    entry = %template.name,
                    written,
                    expected,
                    "bytes written to archive do not equal expected count"
                );
            }
        }
    }
    Ok(())
}
