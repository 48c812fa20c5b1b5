//! Canonical 44-byte WAV header synthesis for extracted segments.

use bytes::{BufMut, Bytes, BytesMut};

use super::format::{WAVE_FORMAT_IEEE_FLOAT, WAVE_FORMAT_PCM};

/// Length of the header written by [`canonical_header`].
pub const CANONICAL_HEADER_LEN: usize = 44;

/// Stream parameters written into a synthesized header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmSpec {
    pub audio_format: u16,
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    pub block_align: u16,
}

impl PcmSpec {
    /// Format code for the output header. IEEE float stays float; every
    /// other source format is written as PCM.
    pub fn output_format(&self) -> u16 {
        if self.audio_format == WAVE_FORMAT_IEEE_FLOAT {
            WAVE_FORMAT_IEEE_FLOAT
        } else {
            WAVE_FORMAT_PCM
        }
    }

    pub fn byte_rate(&self) -> u32 {
        self.sample_rate.saturating_mul(self.block_align as u32)
    }
}

/// Build a `RIFF/WAVE/fmt /data` header describing `data_len` payload bytes.
pub fn canonical_header(spec: &PcmSpec, data_len: u32) -> Bytes {
    let mut buf = BytesMut::with_capacity(CANONICAL_HEADER_LEN);

    buf.put_slice(b"RIFF");
    buf.put_u32_le(data_len.saturating_add(CANONICAL_HEADER_LEN as u32 - 8));
    buf.put_slice(b"WAVE");

    buf.put_slice(b"fmt ");
    buf.put_u32_le(16);
    buf.put_u16_le(spec.output_format());
    buf.put_u16_le(spec.channels);
    buf.put_u32_le(spec.sample_rate);
    buf.put_u32_le(spec.byte_rate());
    buf.put_u16_le(spec.block_align);
    buf.put_u16_le(spec.bits_per_sample);

    buf.put_slice(b"data");
    buf.put_u32_le(data_len);

    buf.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(audio_format: u16) -> PcmSpec {
        PcmSpec {
            audio_format,
            channels: 2,
            sample_rate: 44100,
            bits_per_sample: 16,
            block_align: 4,
        }
    }

    fn u32_at(buf: &[u8], pos: usize) -> u32 {
        u32::from_le_bytes(buf[pos..pos + 4].try_into().unwrap())
    }

    #[test]
    fn writes_canonical_layout() {
        let header = canonical_header(&spec(WAVE_FORMAT_PCM), 1000);
        assert_eq!(header.len(), CANONICAL_HEADER_LEN);
        assert_eq!(&header[0..4], b"RIFF");
        assert_eq!(u32_at(&header, 4), 1036);
        assert_eq!(&header[8..16], b"WAVEfmt ");
        assert_eq!(u32_at(&header, 16), 16);
        assert_eq!(u32_at(&header, 28), 176_400);
        assert_eq!(&header[36..40], b"data");
        assert_eq!(u32_at(&header, 40), 1000);
    }

    #[test]
    fn float_stays_float_and_extensible_becomes_pcm() {
        let float = canonical_header(&spec(WAVE_FORMAT_IEEE_FLOAT), 0);
        assert_eq!(u16::from_le_bytes([float[20], float[21]]), 3);

        let ext = canonical_header(&spec(0xFFFE), 0);
        assert_eq!(u16::from_le_bytes([ext[20], ext[21]]), 1);
    }
}
