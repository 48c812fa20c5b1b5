//! The [`FormatStrategy`] trait every container parser implements.
//!
//! The default method bodies assume a constant bitrate and a raw byte slice.
//! The same arithmetic is exposed as free functions so the manager can apply
//! it to metadata whose format has no registered strategy.

use std::ops::Range;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::FormatError;
use crate::metadata::{AudioMetadata, ParseOutcome};
use crate::source::MediaSource;
use crate::Result;

/// Options for [`FormatStrategy::find_frame_boundary`].
#[derive(Debug, Clone, Copy, Default)]
pub struct BoundaryOptions<'a> {
    /// Width of the scan centred on the target. `None` uses the strategy default.
    pub search_range: Option<usize>,
    /// Previously parsed metadata for the file the buffer was read from.
    pub metadata: Option<&'a AudioMetadata>,
    /// Absolute file offset of `buffer[0]`.
    pub buffer_offset: u64,
}

/// A playable byte range produced by `create_segment`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Segment bytes, including any synthesized header.
    pub data: Bytes,
    /// Range of the source file the payload was copied from.
    pub source_range: Range<u64>,
    /// Length of the synthesized container header at the front of `data`.
    pub header_len: usize,
}

impl Segment {
    /// Wrap a raw slice with no synthesized header.
    pub fn raw(data: Bytes, source_range: Range<u64>) -> Self {
        Self {
            data,
            source_range,
            header_len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The payload without the synthesized header.
    pub fn payload(&self) -> Bytes {
        self.data.slice(self.header_len..)
    }
}

/// Capability set of a container parser.
///
/// Implementations must be safe to share across tasks (`Send + Sync`).
#[async_trait]
pub trait FormatStrategy: Send + Sync {
    /// Lowercase format tag used as the registry key (e.g. `"mp3"`).
    fn format(&self) -> &'static str;

    /// Human-readable parser name for diagnostics.
    fn name(&self) -> &'static str;

    /// File extensions, lowercase and without the dot, that map to this format.
    fn extensions(&self) -> &'static [&'static str] {
        &[]
    }

    /// Return `true` iff the header bytes unambiguously identify this format.
    ///
    /// Must not panic; a buffer too short to decide yields `false`.
    fn validate(&self, header: &[u8]) -> bool;

    /// Parse metadata, reading beyond `header` as needed.
    ///
    /// Failures are reported through [`ParseOutcome::Degraded`], never returned.
    async fn parse_metadata(&self, source: &dyn MediaSource, header: &[u8]) -> ParseOutcome;

    /// Nearest valid boundary to `target` in `buffer` coordinates.
    fn find_frame_boundary(
        &self,
        buffer: &[u8],
        target: usize,
        options: &BoundaryOptions<'_>,
    ) -> usize;

    /// Bytes in one decodable unit, if known.
    fn frame_size(&self, metadata: &AudioMetadata) -> Option<u32>;

    /// Convert a byte offset into seconds.
    fn time_from_position(&self, position: u64, metadata: &AudioMetadata) -> f64 {
        cbr_time_from_position(position, metadata)
    }

    /// Convert seconds into a byte offset.
    fn position_from_time(&self, secs: f64, metadata: &AudioMetadata) -> u64 {
        cbr_position_from_time(secs, metadata)
    }

    /// Produce a playable segment for `[start, end)`.
    async fn create_segment(
        &self,
        source: &dyn MediaSource,
        start: u64,
        end: u64,
        _metadata: &AudioMetadata,
    ) -> Result<Segment> {
        raw_segment(source, start, end).await
    }

    /// Degraded metadata for a parse that failed with `error`.
    fn fallback_metadata(&self, file_size: u64, error: FormatError) -> ParseOutcome {
        tracing::warn!(format = self.format(), error = %error, "metadata parse degraded");
        ParseOutcome::fallback(self.format(), file_size, error)
    }
}

/// Seconds at `position` assuming a constant bitrate. Zero when the bitrate is
/// unknown.
pub fn cbr_time_from_position(position: u64, metadata: &AudioMetadata) -> f64 {
    match metadata.bitrate {
        Some(bitrate) if bitrate > 0 => position as f64 * 8.0 / bitrate as f64,
        _ => 0.0,
    }
}

/// Byte offset at `secs` assuming a constant bitrate. Zero when the bitrate is
/// unknown.
pub fn cbr_position_from_time(secs: f64, metadata: &AudioMetadata) -> u64 {
    match metadata.bitrate {
        Some(bitrate) if bitrate > 0 && secs > 0.0 => (secs * bitrate as f64 / 8.0).floor() as u64,
        _ => 0,
    }
}

/// Copy `[start, end)` out of the source without touching the bytes.
pub async fn raw_segment(source: &dyn MediaSource, start: u64, end: u64) -> Result<Segment> {
    let data = source.read_range(start, end).await?;
    let end = start + data.len() as u64;
    Ok(Segment::raw(data, start..end))
}
