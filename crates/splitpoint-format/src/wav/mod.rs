//! RIFF/WAVE strategy.
//!
//! Metadata comes from a bounded walk over the RIFF chunk list. The `data`
//! chunk's payload offset anchors every later time and byte computation, and
//! boundaries are whole sample blocks counted from that anchor.

mod chunk;
mod format;
mod writer;

pub use chunk::{
    next_chunk_offset, ChunkInfo, ChunkIter, FourCc, RiffChunk, CHUNK_HEADER_LEN,
    FIRST_CHUNK_OFFSET,
};
pub use format::{
    parse_list_info, FactChunk, WaveFormat, WAVE_FORMAT_EXTENSIBLE, WAVE_FORMAT_IEEE_FLOAT,
    WAVE_FORMAT_PCM,
};
pub use writer::{canonical_header, PcmSpec, CANONICAL_HEADER_LEN};

use std::collections::BTreeMap;

use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};

use crate::error::FormatError;
use crate::limits::ParseLimits;
use crate::metadata::{AudioMetadata, FormatDetails, ParseOutcome};
use crate::source::MediaSource;
use crate::strategy::{raw_segment, BoundaryOptions, FormatStrategy, Segment};
use crate::Result;

/// WAV-specific metadata.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct WavDetails {
    /// Every chunk seen during traversal, in file order.
    pub chunks: Vec<ChunkInfo>,
    /// Absolute offset of the first `data` payload byte.
    pub data_chunk_offset: Option<u64>,
    /// Payload size, clamped to the bytes present in the file.
    pub data_chunk_size: Option<u64>,
    pub audio_format: Option<u16>,
    pub block_align: Option<u16>,
    pub bits_per_sample: Option<u16>,
    pub byte_rate: Option<u32>,
    pub cb_size: Option<u16>,
    pub valid_bits_per_sample: Option<u16>,
    pub channel_mask: Option<u32>,
    pub fact: Option<FactChunk>,
    pub list_info: Option<BTreeMap<String, String>>,
}

impl WavDetails {
    /// Absolute offset one past the last payload byte.
    pub fn data_end(&self) -> Option<u64> {
        Some(self.data_chunk_offset? + self.data_chunk_size?)
    }
}

/// Bytes per second from the common fields, when all three are known.
fn bytes_per_second(metadata: &AudioMetadata) -> Option<u64> {
    let bits = metadata.wav()?.bits_per_sample?;
    let bps = metadata.sample_rate? as u64 * metadata.channels? as u64 * bits as u64 / 8;
    (bps > 0).then_some(bps)
}

fn pcm_spec(metadata: &AudioMetadata) -> Option<PcmSpec> {
    let wav = metadata.wav()?;
    Some(PcmSpec {
        audio_format: wav.audio_format?,
        channels: metadata.channels?,
        sample_rate: metadata.sample_rate?,
        bits_per_sample: wav.bits_per_sample?,
        block_align: wav.block_align.filter(|&b| b > 0)?,
    })
}

/// WAV chunk parser.
#[derive(Debug, Clone, Default)]
pub struct WavChunkParser {
    limits: ParseLimits,
}

impl WavChunkParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(limits: ParseLimits) -> Self {
        Self { limits }
    }

    /// The first `min(wav_scan_limit, size)` bytes, from `header` when it
    /// already holds them.
    async fn scan_buffer(
        &self,
        source: &dyn MediaSource,
        header: &[u8],
    ) -> std::result::Result<Bytes, FormatError> {
        let want = (self.limits.wav_scan_limit as u64).min(source.size()) as usize;
        if header.len() >= want {
            return Ok(Bytes::copy_from_slice(&header[..want]));
        }
        source
            .read_range(0, want as u64)
            .await
            .map_err(|e| FormatError::Read(e.to_string()))
    }

    /// Walk the chunk list. Returns metadata plus the reason it is partial,
    /// if it is.
    fn walk(&self, buf: &[u8], file_size: u64) -> (AudioMetadata, Option<FormatError>) {
        let mut details = WavDetails::default();
        let mut fmt = None;
        let mut fmt_error = None;

        let chunks = ChunkIter::new(buf, self.limits.wav_scan_limit, self.limits.chunk_payload_cap);
        for chunk in chunks {
            details.chunks.push(chunk.info());

            match chunk.id {
                FourCc::FMT => match WaveFormat::parse(chunk.data, chunk.size) {
                    Some(parsed) => fmt = Some(parsed),
                    None => {
                        fmt_error = Some(FormatError::Truncated {
                            need: 16,
                            have: chunk.data.len(),
                        })
                    }
                },
                FourCc::DATA => {
                    let offset = chunk.data_offset();
                    let present = file_size.saturating_sub(offset);
                    if chunk.size as u64 > present {
                        tracing::debug!(
                            declared = chunk.size,
                            present,
                            "data chunk overruns file, clamping"
                        );
                    }
                    details.data_chunk_offset = Some(offset);
                    details.data_chunk_size = Some((chunk.size as u64).min(present));
                }
                FourCc::FACT => details.fact = FactChunk::parse(chunk.data),
                FourCc::LIST => {
                    if let Some(info) = parse_list_info(chunk.data) {
                        details.list_info.get_or_insert_with(BTreeMap::new).extend(info);
                    }
                }
                _ => {}
            }
        }

        tracing::debug!(
            chunks = details.chunks.len(),
            data_offset = ?details.data_chunk_offset,
            "walked RIFF chunks"
        );

        let mut meta = AudioMetadata::new(self.format(), file_size);

        if let Some(fmt) = fmt {
            details.audio_format = Some(fmt.audio_format);
            details.block_align = Some(fmt.block_align);
            details.bits_per_sample = Some(fmt.bits_per_sample);
            details.byte_rate = Some(fmt.byte_rate);
            details.cb_size = fmt.cb_size;
            details.valid_bits_per_sample = fmt.valid_bits_per_sample;
            details.channel_mask = fmt.channel_mask;

            meta.sample_rate = Some(fmt.sample_rate);
            meta.channels = Some(fmt.channels);

            let bps = fmt.bytes_per_second();
            if bps > 0 {
                meta.bitrate = Some(u32::try_from(bps * 8).unwrap_or(u32::MAX));
                if let Some(size) = details.data_chunk_size {
                    meta.set_duration(size as f64 / bps as f64);
                }
            }
        }

        let error = match (&fmt, &details.data_chunk_offset) {
            (None, _) => Some(fmt_error.unwrap_or_else(|| FormatError::MissingChunk("fmt ".into()))),
            (Some(_), None) => Some(FormatError::MissingChunk("data".into())),
            _ => None,
        };

        meta.details = FormatDetails::Wav(details);
        (meta, error)
    }
}

#[async_trait]
impl FormatStrategy for WavChunkParser {
    fn format(&self) -> &'static str {
        "wav"
    }

    fn name(&self) -> &'static str {
        "WavChunkParser"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["wav", "wave"]
    }

    fn validate(&self, header: &[u8]) -> bool {
        header.len() >= FIRST_CHUNK_OFFSET
            && FourCc::read(header) == Some(FourCc::RIFF)
            && FourCc::read(&header[8..]) == Some(FourCc::WAVE)
    }

    async fn parse_metadata(&self, source: &dyn MediaSource, header: &[u8]) -> ParseOutcome {
        if !self.validate(header) {
            return self.fallback_metadata(
                source.size(),
                FormatError::InvalidSignature("RIFF/WAVE".into()),
            );
        }

        let buf = match self.scan_buffer(source, header).await {
            Ok(buf) => buf,
            Err(error) => return self.fallback_metadata(source.size(), error),
        };

        match self.walk(&buf, source.size()) {
            (metadata, None) => ParseOutcome::Complete(metadata),
            (metadata, Some(error)) => {
                tracing::warn!(format = "wav", error = %error, "metadata parse degraded");
                ParseOutcome::Degraded { metadata, error }
            }
        }
    }

    /// Round down to a whole sample block counted from the `data` payload.
    /// Positions before the payload, or without a known block size, are
    /// returned unchanged.
    ///
    /// Results are multiples of `block_align` relative to `data_chunk_offset`,
    /// matching [`position_from_time`](FormatStrategy::position_from_time).
    /// They are absolute multiples only when the payload itself starts on a
    /// block multiple, as with a 44-byte header and blocks of 1, 2 or 4 bytes.
    fn find_frame_boundary(
        &self,
        _buffer: &[u8],
        target: usize,
        options: &BoundaryOptions<'_>,
    ) -> usize {
        let wav = options.metadata.and_then(|m| m.wav());
        let block = match wav.and_then(|w| w.block_align) {
            Some(b) if b > 0 => b as u64,
            _ => return target,
        };
        let anchor = wav.and_then(|w| w.data_chunk_offset).unwrap_or(0);

        let absolute = options.buffer_offset + target as u64;
        if absolute < anchor {
            return target;
        }
        let aligned = anchor + (absolute - anchor) / block * block;
        aligned.saturating_sub(options.buffer_offset) as usize
    }

    fn frame_size(&self, metadata: &AudioMetadata) -> Option<u32> {
        metadata
            .wav()
            .and_then(|w| w.block_align)
            .filter(|&b| b > 0)
            .map(u32::from)
    }

    fn time_from_position(&self, position: u64, metadata: &AudioMetadata) -> f64 {
        let (Some(offset), Some(bps)) = (
            metadata.wav().and_then(|w| w.data_chunk_offset),
            bytes_per_second(metadata),
        ) else {
            return 0.0;
        };
        if position < offset {
            return 0.0;
        }
        (position - offset) as f64 / bps as f64
    }

    fn position_from_time(&self, secs: f64, metadata: &AudioMetadata) -> u64 {
        let offset = metadata.wav().and_then(|w| w.data_chunk_offset).unwrap_or(0);
        let bps = match bytes_per_second(metadata) {
            Some(bps) if secs > 0.0 => bps,
            _ => return offset,
        };
        let block = metadata
            .wav()
            .and_then(|w| w.block_align)
            .filter(|&b| b > 0)
            .unwrap_or(1) as u64;

        // saturating cast; clamp to the end of the payload
        let raw = (secs * bps as f64).floor() as u64;
        offset
            .saturating_add(raw / block * block)
            .min(metadata.audio_end().max(offset))
    }

    /// Slices inside the `data` payload get a fresh 44-byte header so they
    /// play on their own.
    async fn create_segment(
        &self,
        source: &dyn MediaSource,
        start: u64,
        end: u64,
        metadata: &AudioMetadata,
    ) -> Result<Segment> {
        let data_offset = metadata.wav().and_then(|w| w.data_chunk_offset);
        let spec = match (data_offset, pcm_spec(metadata)) {
            (Some(offset), Some(spec)) if start >= offset => spec,
            _ => return raw_segment(source, start, end).await,
        };

        let payload = source.read_range(start, end).await?;
        let data_len = u32::try_from(payload.len()).unwrap_or(u32::MAX);
        let header = canonical_header(&spec, data_len);

        let mut data = BytesMut::with_capacity(header.len() + payload.len());
        data.put_slice(&header);
        data.put_slice(&payload);

        tracing::debug!(start, end, payload = payload.len(), "synthesized WAV segment header");

        Ok(Segment {
            data: data.freeze(),
            source_range: start..start + payload.len() as u64,
            header_len: header.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;

    fn chunk(id: &[u8; 4], payload: &[u8]) -> Vec<u8> {
        let mut out = id.to_vec();
        out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        out.extend_from_slice(payload);
        if payload.len() % 2 == 1 {
            out.push(0);
        }
        out
    }

    fn fmt_payload(format: u16, channels: u16, rate: u32, bits: u16) -> Vec<u8> {
        let block_align = channels * bits / 8;
        let mut out = Vec::new();
        out.extend_from_slice(&format.to_le_bytes());
        out.extend_from_slice(&channels.to_le_bytes());
        out.extend_from_slice(&rate.to_le_bytes());
        out.extend_from_slice(&(rate * block_align as u32).to_le_bytes());
        out.extend_from_slice(&block_align.to_le_bytes());
        out.extend_from_slice(&bits.to_le_bytes());
        out
    }

    fn riff(chunks: &[Vec<u8>]) -> Vec<u8> {
        let body: Vec<u8> = chunks.concat();
        let mut out = b"RIFF".to_vec();
        out.extend_from_slice(&(body.len() as u32 + 4).to_le_bytes());
        out.extend_from_slice(b"WAVE");
        out.extend(body);
        out
    }

    async fn parse(data: Vec<u8>) -> ParseOutcome {
        let source = MemorySource::new("take.wav", data);
        let header = source.read_range(0, 65536).await.unwrap();
        WavChunkParser::new().parse_metadata(&source, &header).await
    }

    #[test]
    fn validate_checks_both_signatures() {
        let parser = WavChunkParser::new();
        assert!(parser.validate(b"RIFF\0\0\0\0WAVE"));
        assert!(!parser.validate(b"RIFF\0\0\0\0AVI "));
        assert!(!parser.validate(b"RIFF"));
        assert!(!parser.validate(&[0xFF, 0xFB, 0x90, 0x00]));
    }

    #[tokio::test]
    async fn parses_mono_pcm() {
        let data = riff(&[
            chunk(b"fmt ", &fmt_payload(1, 1, 44100, 16)),
            chunk(b"data", &vec![0u8; 882_000]),
        ]);
        let outcome = parse(data).await;
        assert!(!outcome.is_degraded());

        let meta = outcome.metadata();
        let wav = meta.wav().unwrap();
        assert_eq!(meta.channels, Some(1));
        assert_eq!(meta.sample_rate, Some(44100));
        assert_eq!(meta.bitrate, Some(705_600));
        assert_eq!(wav.bits_per_sample, Some(16));
        assert_eq!(wav.block_align, Some(2));
        assert_eq!(wav.data_chunk_offset, Some(44));
        assert_eq!(wav.data_chunk_size, Some(882_000));
        assert!((meta.duration.unwrap() - 10.0).abs() < 1e-9);
        assert_eq!(meta.audio_start(), 44);
    }

    #[tokio::test]
    async fn data_before_fmt_and_trailing_chunks() {
        let mut list = b"INFO".to_vec();
        list.extend(chunk(b"INAM", b"Demo\0"));
        let data = riff(&[
            chunk(b"data", &[0u8; 400]),
            chunk(b"fmt ", &fmt_payload(1, 2, 8000, 16)),
            chunk(b"fact", &100u32.to_le_bytes()),
            chunk(b"LIST", &list),
        ]);

        let meta = parse(data).await.into_metadata();
        let wav = meta.wav().unwrap();
        assert_eq!(wav.data_chunk_offset, Some(20));
        assert_eq!(wav.chunks.len(), 4);
        assert_eq!(wav.chunks[1].id, FourCc::FMT);
        assert_eq!(wav.fact, Some(FactChunk { sample_length: 100 }));
        assert_eq!(
            wav.list_info.as_ref().and_then(|i| i.get("INAM")).map(String::as_str),
            Some("Demo")
        );
        assert!((meta.duration.unwrap() - 400.0 / 32_000.0).abs() < 1e-12);
    }

    #[tokio::test]
    async fn missing_fmt_leaves_timing_unset() {
        let data = riff(&[chunk(b"data", &[0u8; 64])]);
        let outcome = parse(data).await;

        assert!(outcome.is_degraded());
        assert_eq!(
            outcome.error(),
            Some(&FormatError::MissingChunk("fmt ".into()))
        );
        let meta = outcome.metadata();
        assert_eq!(meta.duration, None);
        assert_eq!(meta.bitrate, None);
        assert_eq!(meta.wav().unwrap().data_chunk_offset, Some(20));
    }

    #[tokio::test]
    async fn missing_data_degrades() {
        let data = riff(&[chunk(b"fmt ", &fmt_payload(1, 2, 44100, 16))]);
        let outcome = parse(data).await;
        assert_eq!(
            outcome.error(),
            Some(&FormatError::MissingChunk("data".into()))
        );
        assert_eq!(outcome.metadata().sample_rate, Some(44100));
        assert_eq!(outcome.metadata().duration, None);
    }

    #[tokio::test]
    async fn bad_signature_degrades() {
        let outcome = parse(b"RIFX\0\0\0\0WAVEfmt ".to_vec()).await;
        assert!(matches!(
            outcome.error(),
            Some(FormatError::InvalidSignature(_))
        ));
    }

    #[tokio::test]
    async fn streamed_data_size_is_clamped() {
        let mut data = riff(&[chunk(b"fmt ", &fmt_payload(1, 1, 8000, 8))]);
        data.extend_from_slice(b"data");
        data.extend_from_slice(&u32::MAX.to_le_bytes());
        data.extend_from_slice(&[0u8; 8000]);

        let meta = parse(data).await.into_metadata();
        assert_eq!(meta.wav().unwrap().data_chunk_size, Some(8000));
        assert!((meta.duration.unwrap() - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn reparse_is_idempotent() {
        let data = riff(&[
            chunk(b"fmt ", &fmt_payload(1, 2, 48000, 24)),
            chunk(b"data", &[0u8; 600]),
        ]);
        let first = parse(data.clone()).await;
        let second = parse(data).await;
        assert_eq!(first, second);
    }

    fn stereo16(data_offset: u64) -> AudioMetadata {
        let mut meta = AudioMetadata::new("wav", 1_000_000);
        meta.sample_rate = Some(44100);
        meta.channels = Some(2);
        meta.details = FormatDetails::Wav(WavDetails {
            data_chunk_offset: Some(data_offset),
            data_chunk_size: Some(1_000_000 - data_offset),
            audio_format: Some(WAVE_FORMAT_PCM),
            block_align: Some(4),
            bits_per_sample: Some(16),
            ..Default::default()
        });
        meta
    }

    // payload at offset 0, so relative and absolute alignment coincide
    #[test]
    fn boundary_is_block_aligned() {
        let parser = WavChunkParser::new();
        let meta = stereo16(0);
        let options = BoundaryOptions {
            metadata: Some(&meta),
            ..Default::default()
        };
        for target in [0usize, 1, 3, 4, 1001, 4097] {
            let pos = parser.find_frame_boundary(&[], target, &options);
            assert_eq!(pos % 4, 0);
            assert!(pos <= target);
            assert!(target - pos < 4);
        }
    }

    #[test]
    fn boundary_counts_blocks_from_data_offset() {
        let parser = WavChunkParser::new();
        let meta = stereo16(46);
        let options = BoundaryOptions {
            metadata: Some(&meta),
            buffer_offset: 1000,
            ..Default::default()
        };
        // absolute 1003 -> 46 + 239 * 4 = 1002
        assert_eq!(parser.find_frame_boundary(&[], 3, &options), 2);

        let before = BoundaryOptions {
            metadata: Some(&meta),
            ..Default::default()
        };
        assert_eq!(parser.find_frame_boundary(&[], 30, &before), 30);
    }

    #[test]
    fn boundary_without_block_align_is_identity() {
        let parser = WavChunkParser::new();
        assert_eq!(
            parser.find_frame_boundary(&[], 1001, &BoundaryOptions::default()),
            1001
        );
    }

    #[test]
    fn time_conversions() {
        let parser = WavChunkParser::new();
        let meta = stereo16(44);

        assert_eq!(parser.time_from_position(10, &meta), 0.0);
        assert!((parser.time_from_position(44 + 176_400, &meta) - 1.0).abs() < 1e-12);

        assert_eq!(parser.position_from_time(1.0, &meta), 44 + 176_400);
        assert_eq!(parser.position_from_time(0.0, &meta), 44);
        // 0.00001 s = 1.764 bytes, floored to 0 blocks
        assert_eq!(parser.position_from_time(0.000_01, &meta), 44);

        for t in [0.5, 1.25, 3.333] {
            let pos = parser.position_from_time(t, &meta);
            assert_eq!((pos - 44) % 4, 0);
            let back = parser.time_from_position(pos, &meta);
            assert!(t - back >= 0.0 && t - back < 4.0 / 176_400.0);
        }
    }

    #[test]
    fn huge_time_clamps_to_payload_end() {
        let parser = WavChunkParser::new();
        let mut meta = AudioMetadata::new("wav", 44 + 80_000);
        meta.sample_rate = Some(8000);
        meta.channels = Some(1);
        meta.details = FormatDetails::Wav(WavDetails {
            data_chunk_offset: Some(44),
            data_chunk_size: Some(80_000),
            audio_format: Some(WAVE_FORMAT_PCM),
            block_align: Some(1),
            bits_per_sample: Some(8),
            ..Default::default()
        });

        assert_eq!(parser.position_from_time(1e18, &meta), 44 + 80_000);
        assert_eq!(parser.position_from_time(1e300, &meta), 44 + 80_000);
        assert_eq!(parser.position_from_time(f64::MAX, &meta), 44 + 80_000);
        assert_eq!(parser.position_from_time(5.0, &meta), 44 + 40_000);
    }

    #[test]
    fn boundary_is_block_relative_for_unaligned_payload() {
        // 24-bit stereo: 6-byte blocks after a 44-byte header
        let parser = WavChunkParser::new();
        let mut meta = stereo16(44);
        if let FormatDetails::Wav(wav) = &mut meta.details {
            wav.block_align = Some(6);
            wav.bits_per_sample = Some(24);
        }
        let options = BoundaryOptions {
            metadata: Some(&meta),
            ..Default::default()
        };
        for target in [44usize, 50, 1001, 4097] {
            let pos = parser.find_frame_boundary(&[], target, &options);
            assert_eq!((pos - 44) % 6, 0);
            assert!(pos <= target && target - pos < 6);
        }
        assert_eq!(parser.find_frame_boundary(&[], 50, &options), 50);
        assert_eq!(parser.find_frame_boundary(&[], 49, &options), 44);
    }

    #[test]
    fn conversions_without_fmt() {
        let parser = WavChunkParser::new();
        let mut meta = AudioMetadata::new("wav", 100);
        meta.details = FormatDetails::Wav(WavDetails {
            data_chunk_offset: Some(44),
            ..Default::default()
        });
        assert_eq!(parser.time_from_position(80, &meta), 0.0);
        assert_eq!(parser.position_from_time(2.0, &meta), 44);
        assert_eq!(parser.frame_size(&meta), None);
    }

    #[tokio::test]
    async fn segment_inside_data_gets_header() {
        let body: Vec<u8> = (0..176_400u32).map(|i| i as u8).collect();
        let mut file = canonical_header(
            &PcmSpec {
                audio_format: WAVE_FORMAT_PCM,
                channels: 2,
                sample_rate: 44100,
                bits_per_sample: 16,
                block_align: 4,
            },
            body.len() as u32,
        )
        .to_vec();
        file.extend_from_slice(&body);
        let source = MemorySource::new("take.wav", file);
        let meta = stereo16(44);

        let segment = WavChunkParser::new()
            .create_segment(&source, 44 + 400, 44 + 800, &meta)
            .await
            .unwrap();

        assert_eq!(segment.header_len, CANONICAL_HEADER_LEN);
        assert_eq!(segment.len(), CANONICAL_HEADER_LEN + 400);
        assert_eq!(&segment.data[0..4], b"RIFF");
        assert_eq!(&segment.data[40..44], &400u32.to_le_bytes());
        assert_eq!(&segment.payload()[..], &body[400..800]);
        assert_eq!(segment.source_range, 444..844);
    }

    #[tokio::test]
    async fn segment_from_file_start_is_raw() {
        let source = MemorySource::new("take.wav", vec![1u8; 500]);
        let segment = WavChunkParser::new()
            .create_segment(&source, 0, 200, &stereo16(44))
            .await
            .unwrap();
        assert_eq!(segment.header_len, 0);
        assert_eq!(segment.len(), 200);
    }
}
