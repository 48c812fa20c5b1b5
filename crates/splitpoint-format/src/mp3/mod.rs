//! MPEG audio (MP3) strategy.
//!
//! Parsing proceeds in a fixed order:
//!
//! 1. Skip an ID3v2 tag at offset 0, if present
//! 2. Scan for the first valid frame header after the tag
//! 3. Decode that header and look for a Xing/Info/VBRI tag inside the frame
//! 4. Derive duration from the tag's frame count, else from the bitrate

mod header;
mod id3;
mod vbr;

pub use header::{
    encode_header, header_word, is_valid_frame_header, ChannelMode, FrameHeader, MpegLayer,
    MpegVersion, HEADER_LEN, SYNC_MASK,
};
pub use id3::{synchsafe, Id3Header, ID3V2_HEADER_LEN};
pub use vbr::{VbrInfo, VbrTagKind, VBRI_LEN, VBRI_OFFSET, VBR_PROBE_LEN};

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::FormatError;
use crate::limits::ParseLimits;
use crate::metadata::{AudioMetadata, FormatDetails, ParseOutcome};
use crate::source::MediaSource;
use crate::strategy::{
    cbr_position_from_time, cbr_time_from_position, BoundaryOptions, FormatStrategy,
};

/// MP3-specific metadata.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Mp3Details {
    pub id3: Option<Id3Header>,
    /// A Xing or VBRI tag marks the stream as variable bitrate.
    pub vbr: bool,
    pub vbr_info: Option<VbrInfo>,
    pub version: MpegVersion,
    pub layer: MpegLayer,
    pub channel_mode: ChannelMode,
    pub protected: bool,
    pub padding: bool,
    /// Size of the first frame in bytes.
    pub frame_size: u32,
    pub samples_per_frame: u32,
    /// Absolute offset of the first frame header.
    pub first_frame_offset: u64,
}

/// Scan `buf` for the first offset holding a valid frame header.
pub fn find_first_frame(buf: &[u8]) -> Option<(usize, FrameHeader)> {
    (0..buf.len().saturating_sub(HEADER_LEN - 1))
        .find_map(|pos| FrameHeader::read(buf, pos).map(|h| (pos, h)))
}

/// MP3 frame parser.
#[derive(Debug, Clone, Default)]
pub struct Mp3FrameParser {
    limits: ParseLimits,
}

impl Mp3FrameParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(limits: ParseLimits) -> Self {
        Self { limits }
    }

    async fn parse(
        &self,
        source: &dyn MediaSource,
        header: &[u8],
    ) -> Result<AudioMetadata, FormatError> {
        let file_size = source.size();
        let id3 = Id3Header::parse(header);
        let audio_base = id3.map(|t| t.total_size()).unwrap_or(0);

        // The tag may be larger than the header window (embedded artwork).
        let window = read_window(source, header, audio_base, self.limits.frame_search_window)
            .await?;

        let (pos, frame) = find_first_frame(&window).ok_or(FormatError::NoFrameSync {
            searched: window.len(),
        })?;
        let first_frame_offset = audio_base + pos as u64;

        let probe = match window.get(pos..pos + VBR_PROBE_LEN) {
            Some(bytes) => Bytes::copy_from_slice(bytes),
            None => {
                source
                    .read_range(first_frame_offset, first_frame_offset + VBR_PROBE_LEN as u64)
                    .await
                    .map_err(|e| FormatError::Read(e.to_string()))?
            }
        };
        let vbr_info = vbr::detect(&probe, &frame);

        tracing::debug!(
            offset = first_frame_offset,
            bitrate = frame.bitrate(),
            sample_rate = frame.sample_rate,
            vbr_tag = ?vbr_info.map(|v| v.kind),
            "found first MPEG frame"
        );

        let mut meta = AudioMetadata::new(self.format(), file_size);
        meta.bitrate = Some(frame.bitrate());
        meta.sample_rate = Some(frame.sample_rate);
        meta.channels = Some(frame.channels());

        let tagged_frames = vbr_info.and_then(|v| v.frames).filter(|&f| f > 0);
        if let Some(frames) = tagged_frames {
            meta.set_duration(
                frames as f64 * frame.samples_per_frame() as f64 / frame.sample_rate as f64,
            );
        } else if frame.bitrate() > 0 {
            let audio_bytes = file_size.saturating_sub(audio_base);
            meta.set_duration(audio_bytes as f64 * 8.0 / frame.bitrate() as f64);
        }

        meta.details = FormatDetails::Mp3(Mp3Details {
            id3,
            vbr: vbr_info.map(|v| v.is_vbr()).unwrap_or(false),
            vbr_info,
            version: frame.version,
            layer: frame.layer,
            channel_mode: frame.channel_mode,
            protected: frame.protected,
            padding: frame.padding,
            frame_size: frame.frame_size(),
            samples_per_frame: frame.samples_per_frame(),
            first_frame_offset,
        });

        Ok(meta)
    }
}

/// Bytes `[offset, offset + len)` of the file, served from `header` when it
/// already covers the range.
async fn read_window(
    source: &dyn MediaSource,
    header: &[u8],
    offset: u64,
    len: usize,
) -> Result<Bytes, FormatError> {
    let end = offset.saturating_add(len as u64);
    let whole_file = header.len() as u64 >= source.size();
    if end <= header.len() as u64 || whole_file {
        let start = (offset as usize).min(header.len());
        let stop = (end as usize).min(header.len());
        return Ok(Bytes::copy_from_slice(&header[start..stop]));
    }

    source
        .read_range(offset, end)
        .await
        .map_err(|e| FormatError::Read(e.to_string()))
}

/// Duration and file size for the VBR linear model, when it applies.
fn vbr_span(metadata: &AudioMetadata) -> Option<(f64, f64)> {
    if !metadata.is_vbr() || metadata.file_size == 0 {
        return None;
    }
    metadata
        .duration
        .filter(|d| *d > 0.0)
        .map(|d| (d, metadata.file_size as f64))
}

#[async_trait]
impl FormatStrategy for Mp3FrameParser {
    fn format(&self) -> &'static str {
        "mp3"
    }

    fn name(&self) -> &'static str {
        "Mp3FrameParser"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["mp3", "mpga", "mp2"]
    }

    /// An ID3v2 tag at offset 0, a frame header at offset 0, or two
    /// back-to-back frame headers anywhere in the header window.
    fn validate(&self, header: &[u8]) -> bool {
        if Id3Header::parse(header).is_some() {
            return true;
        }
        if FrameHeader::read(header, 0).is_some() {
            return true;
        }

        let mut pos = 0;
        while let Some((offset, frame)) = header.get(pos..).and_then(find_first_frame) {
            let at = pos + offset;
            let size = frame.frame_size() as usize;
            if size > HEADER_LEN && FrameHeader::read(header, at + size).is_some() {
                return true;
            }
            pos = at + 1;
        }
        false
    }

    async fn parse_metadata(&self, source: &dyn MediaSource, header: &[u8]) -> ParseOutcome {
        match self.parse(source, header).await {
            Ok(meta) => ParseOutcome::Complete(meta),
            Err(error) => self.fallback_metadata(source.size(), error),
        }
    }

    /// Closest valid frame header to `target` within `search_range / 2` on
    /// either side. Ties go to the earlier offset. Returns `target` when no
    /// header is found.
    fn find_frame_boundary(
        &self,
        buffer: &[u8],
        target: usize,
        options: &BoundaryOptions<'_>,
    ) -> usize {
        if buffer.len() < HEADER_LEN {
            return target;
        }

        let half = options
            .search_range
            .unwrap_or(self.limits.boundary_search_range)
            / 2;
        let start = target.saturating_sub(half);
        let end = target.saturating_add(half).min(buffer.len() - HEADER_LEN);

        let mut best: Option<(usize, usize)> = None;
        for pos in start..=end {
            if header_word(buffer, pos).is_some_and(is_valid_frame_header) {
                let distance = pos.abs_diff(target);
                if best.map_or(true, |(_, d)| distance < d) {
                    best = Some((pos, distance));
                }
            }
        }

        match best {
            Some((pos, _)) => pos,
            None => {
                tracing::debug!(offset = target, "no frame header near target");
                target
            }
        }
    }

    fn frame_size(&self, metadata: &AudioMetadata) -> Option<u32> {
        metadata.mp3().map(|d| d.frame_size)
    }

    /// VBR streams use a linear fraction of the tagged duration; this is an
    /// approximation, not a seek table.
    fn time_from_position(&self, position: u64, metadata: &AudioMetadata) -> f64 {
        match vbr_span(metadata) {
            Some((duration, size)) => position as f64 / size * duration,
            None => cbr_time_from_position(position, metadata),
        }
    }

    fn position_from_time(&self, secs: f64, metadata: &AudioMetadata) -> u64 {
        match vbr_span(metadata) {
            Some((duration, size)) if secs > 0.0 => {
                ((secs / duration * size).floor() as u64).min(metadata.file_size)
            }
            Some(_) => 0,
            None => cbr_position_from_time(secs, metadata),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;

    const CBR_128: u32 = 0xFFFB_9000;

    fn cbr_stream(frames: usize) -> Vec<u8> {
        let mut data = Vec::with_capacity(frames * 417);
        for _ in 0..frames {
            let mut frame = vec![0u8; 417];
            frame[..4].copy_from_slice(&CBR_128.to_be_bytes());
            data.extend_from_slice(&frame);
        }
        data
    }

    fn id3_tag(size: u32) -> Vec<u8> {
        let mut tag = vec![b'I', b'D', b'3', 3, 0, 0];
        tag.extend_from_slice(&[
            ((size >> 21) & 0x7F) as u8,
            ((size >> 14) & 0x7F) as u8,
            ((size >> 7) & 0x7F) as u8,
            (size & 0x7F) as u8,
        ]);
        tag.extend(std::iter::repeat(0u8).take(size as usize));
        tag
    }

    async fn parse(data: Vec<u8>) -> ParseOutcome {
        let source = MemorySource::new("song.mp3", data);
        let header = source.read_range(0, 65536).await.unwrap();
        Mp3FrameParser::new().parse_metadata(&source, &header).await
    }

    #[test]
    fn validate_accepts_id3_and_sync() {
        let parser = Mp3FrameParser::new();
        assert!(parser.validate(&id3_tag(16)));
        assert!(parser.validate(&cbr_stream(1)));
        assert!(!parser.validate(b"RIFF\x24\x00\x00\x00WAVEfmt "));
        assert!(!parser.validate(&[]));
    }

    #[test]
    fn validate_requires_two_frames_off_origin() {
        let parser = Mp3FrameParser::new();

        let mut lone = vec![0u8; 100];
        lone.extend_from_slice(&CBR_128.to_be_bytes());
        lone.extend(vec![0u8; 500]);
        assert!(!parser.validate(&lone));

        let mut paired = vec![0u8; 100];
        paired.extend(cbr_stream(2));
        assert!(parser.validate(&paired));
    }

    #[tokio::test]
    async fn parses_cbr_stream_after_id3() {
        let mut data = id3_tag(1000);
        data.extend(cbr_stream(100));
        let size = data.len() as u64;

        let outcome = parse(data).await;
        assert!(!outcome.is_degraded());
        let meta = outcome.metadata();
        let mp3 = meta.mp3().unwrap();

        assert_eq!(meta.bitrate, Some(128_000));
        assert_eq!(meta.sample_rate, Some(44100));
        assert_eq!(meta.channels, Some(2));
        assert_eq!(mp3.first_frame_offset, 1010);
        assert_eq!(mp3.frame_size, 417);
        assert!(!mp3.vbr);
        assert_eq!(mp3.id3.unwrap().size, 1000);

        let expected = (size - 1010) as f64 * 8.0 / 128_000.0;
        assert!((meta.duration.unwrap() - expected).abs() < 1e-9);
    }

    #[tokio::test]
    async fn id3_larger_than_header_window_is_read_past() {
        let mut data = id3_tag(70_000);
        data.extend(cbr_stream(4));

        let outcome = parse(data).await;
        let mp3 = outcome.metadata().mp3().unwrap();
        assert_eq!(mp3.first_frame_offset, 70_010);
    }

    #[tokio::test]
    async fn xing_frame_count_drives_duration() {
        let mut data = cbr_stream(10);
        let pos = 4 + 32;
        data[pos..pos + 4].copy_from_slice(b"Xing");
        data[pos + 4..pos + 8].copy_from_slice(&1u32.to_be_bytes());
        data[pos + 8..pos + 12].copy_from_slice(&1000u32.to_be_bytes());

        let meta = parse(data).await.into_metadata();
        assert!(meta.is_vbr());
        let expected = 1000.0 * 1152.0 / 44100.0;
        assert!((meta.duration.unwrap() - expected).abs() < 1e-9);
        assert_eq!(meta.estimated_duration, Some(26));
    }

    #[tokio::test]
    async fn no_sync_degrades() {
        let outcome = parse(vec![0u8; 4096]).await;
        assert!(outcome.is_degraded());
        assert_eq!(outcome.metadata().format(), "mp3");
        assert!(matches!(
            outcome.error(),
            Some(FormatError::NoFrameSync { searched: 4096 })
        ));
    }

    #[test]
    fn boundary_picks_nearest_header() {
        let parser = Mp3FrameParser::new();
        let data = cbr_stream(10);
        let options = BoundaryOptions::default();

        assert_eq!(parser.find_frame_boundary(&data, 1000, &options), 834);
        assert_eq!(parser.find_frame_boundary(&data, 1100, &options), 1251);
        assert_eq!(parser.find_frame_boundary(&data, 417, &options), 417);
    }

    #[test]
    fn boundary_tie_prefers_earlier_offset() {
        let parser = Mp3FrameParser::new();
        let mut data = vec![0u8; 64];
        data[10..14].copy_from_slice(&CBR_128.to_be_bytes());
        data[30..34].copy_from_slice(&CBR_128.to_be_bytes());
        let options = BoundaryOptions::default();
        assert_eq!(parser.find_frame_boundary(&data, 20, &options), 10);
    }

    #[test]
    fn boundary_respects_search_range() {
        let parser = Mp3FrameParser::new();
        let data = cbr_stream(10);
        let narrow = BoundaryOptions {
            search_range: Some(100),
            ..Default::default()
        };
        assert_eq!(parser.find_frame_boundary(&data, 1000, &narrow), 1000);
        assert_eq!(parser.find_frame_boundary(&[0xFF, 0xFB], 1, &narrow), 1);
    }

    #[test]
    fn vbr_time_is_linear_in_file_size() {
        let parser = Mp3FrameParser::new();
        let mut meta = AudioMetadata::new("mp3", 1_000_000);
        meta.bitrate = Some(128_000);
        meta.set_duration(100.0);
        meta.details = FormatDetails::Mp3(Mp3Details {
            id3: None,
            vbr: true,
            vbr_info: None,
            version: MpegVersion::Mpeg1,
            layer: MpegLayer::Layer3,
            channel_mode: ChannelMode::Stereo,
            protected: false,
            padding: false,
            frame_size: 417,
            samples_per_frame: 1152,
            first_frame_offset: 0,
        });

        assert!((parser.time_from_position(250_000, &meta) - 25.0).abs() < 1e-9);
        assert_eq!(parser.position_from_time(50.0, &meta), 500_000);
        assert_eq!(parser.position_from_time(500.0, &meta), 1_000_000);
    }

    #[test]
    fn cbr_time_uses_bitrate() {
        let parser = Mp3FrameParser::new();
        let mut meta = AudioMetadata::new("mp3", 1_000_000);
        meta.bitrate = Some(128_000);
        assert!((parser.time_from_position(160_000, &meta) - 10.0).abs() < 1e-9);
        assert_eq!(parser.position_from_time(10.0, &meta), 160_000);
    }
}
