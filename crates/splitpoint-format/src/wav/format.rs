//! Payload decoders for `fmt `, `fact` and `LIST/INFO` chunks.

use std::collections::BTreeMap;

use super::chunk::{next_chunk_offset, FourCc, CHUNK_HEADER_LEN};

/// WAVE_FORMAT_PCM
pub const WAVE_FORMAT_PCM: u16 = 0x0001;
/// WAVE_FORMAT_IEEE_FLOAT
pub const WAVE_FORMAT_IEEE_FLOAT: u16 = 0x0003;
/// WAVE_FORMAT_EXTENSIBLE
pub const WAVE_FORMAT_EXTENSIBLE: u16 = 0xFFFE;

fn le_u16(buf: &[u8], pos: usize) -> Option<u16> {
    let b = buf.get(pos..pos + 2)?;
    Some(u16::from_le_bytes([b[0], b[1]]))
}

fn le_u32(buf: &[u8], pos: usize) -> Option<u32> {
    let b = buf.get(pos..pos + 4)?;
    Some(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

/// Decoded `fmt ` chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaveFormat {
    pub audio_format: u16,
    pub channels: u16,
    pub sample_rate: u32,
    pub byte_rate: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
    /// Present when the chunk is at least 18 bytes.
    pub cb_size: Option<u16>,
    /// Present for WAVE_FORMAT_EXTENSIBLE chunks of at least 40 bytes.
    pub valid_bits_per_sample: Option<u16>,
    pub channel_mask: Option<u32>,
}

impl WaveFormat {
    /// Decode a `fmt ` payload. `declared_size` is the chunk's size field.
    pub fn parse(data: &[u8], declared_size: u32) -> Option<Self> {
        let mut fmt = Self {
            audio_format: le_u16(data, 0)?,
            channels: le_u16(data, 2)?,
            sample_rate: le_u32(data, 4)?,
            byte_rate: le_u32(data, 8)?,
            block_align: le_u16(data, 12)?,
            bits_per_sample: le_u16(data, 14)?,
            cb_size: None,
            valid_bits_per_sample: None,
            channel_mask: None,
        };

        if declared_size >= 18 {
            fmt.cb_size = le_u16(data, 16);
        }
        if fmt.audio_format == WAVE_FORMAT_EXTENSIBLE && declared_size >= 40 {
            fmt.valid_bits_per_sample = le_u16(data, 18);
            fmt.channel_mask = le_u32(data, 20);
        }

        Some(fmt)
    }

    /// Bytes of audio per second derived from rate, channels and bit depth.
    pub fn bytes_per_second(&self) -> u64 {
        self.sample_rate as u64 * self.channels as u64 * self.bits_per_sample as u64 / 8
    }
}

/// Decoded `fact` chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct FactChunk {
    /// Length of the stream in sample frames.
    pub sample_length: u32,
}

impl FactChunk {
    pub fn parse(data: &[u8]) -> Option<Self> {
        Some(Self {
            sample_length: le_u32(data, 0)?,
        })
    }
}

/// Decode the sub-chunks of a `LIST` payload of type `INFO`.
///
/// Returns `None` for other list types. Strings end at the first NUL or at
/// the end of the available bytes.
pub fn parse_list_info(data: &[u8]) -> Option<BTreeMap<String, String>> {
    if FourCc::read(data)? != FourCc::INFO {
        return None;
    }

    let mut entries = BTreeMap::new();
    let mut pos = 4u64;
    let len = data.len() as u64;

    while pos + CHUNK_HEADER_LEN as u64 <= len {
        let at = pos as usize;
        let id = FourCc::read(&data[at..])?;
        let size = le_u32(data, at + 4)?;

        let start = at + CHUNK_HEADER_LEN;
        let end = start.saturating_add(size as usize).min(data.len());
        let raw = &data[start..end];
        let text = raw.split(|&b| b == 0).next().unwrap_or_default();

        entries.insert(
            id.to_string(),
            String::from_utf8_lossy(text).trim().to_string(),
        );
        pos = next_chunk_offset(pos, size);
    }

    Some(entries)
}
