//! MPEG audio frame header decoding.
//!
//! ```text
//! AAAAAAAA AAABBCCD EEEEFFGH IIJJKLMM
//! A sync (11)  B version (2)  C layer (2)  D protection (1)
//! E bitrate index (4)  F sample-rate index (2)  G padding (1)  H private (1)
//! I channel mode (2)  J..M ignored
//! ```

/// Mask selecting the 11-bit frame sync.
pub const SYNC_MASK: u32 = 0xFFE0_0000;

/// Length of an MPEG audio frame header.
pub const HEADER_LEN: usize = 4;

/// Bitrates in kbps, indexed by `[mpeg1 ? 0 : 1][layer I/II/III][index]`.
/// Index 0 is free format; index 15 is rejected before lookup.
const BITRATE_KBPS: [[[u32; 16]; 3]; 2] = [
    [
        [0, 32, 64, 96, 128, 160, 192, 224, 256, 288, 320, 352, 384, 416, 448, 0],
        [0, 32, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 384, 0],
        [0, 32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 0],
    ],
    [
        [0, 32, 48, 56, 64, 80, 96, 112, 128, 144, 160, 176, 192, 224, 256, 0],
        [0, 8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160, 0],
        [0, 8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160, 0],
    ],
];

/// Sample rates in Hz, indexed by `[version][index]` for MPEG-1, 2, 2.5.
const SAMPLE_RATES: [[u32; 3]; 3] = [
    [44100, 48000, 32000],
    [22050, 24000, 16000],
    [11025, 12000, 8000],
];

/// MPEG audio version. Discriminants are the header bit values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum MpegVersion {
    Mpeg25 = 0,
    Mpeg2 = 2,
    Mpeg1 = 3,
}

impl MpegVersion {
    /// Decode the 2-bit version field. `0b01` is reserved.
    pub fn from_bits(bits: u8) -> Option<Self> {
        match bits & 0b11 {
            0b00 => Some(Self::Mpeg25),
            0b10 => Some(Self::Mpeg2),
            0b11 => Some(Self::Mpeg1),
            _ => None,
        }
    }

    /// The 2-bit header value.
    pub fn bits(self) -> u8 {
        self as u8
    }

    fn rate_row(self) -> usize {
        match self {
            Self::Mpeg1 => 0,
            Self::Mpeg2 => 1,
            Self::Mpeg25 => 2,
        }
    }
}

/// MPEG audio layer. Discriminants are the header bit values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum MpegLayer {
    Layer3 = 1,
    Layer2 = 2,
    Layer1 = 3,
}

impl MpegLayer {
    /// Decode the 2-bit layer field. `0b00` is reserved.
    pub fn from_bits(bits: u8) -> Option<Self> {
        match bits & 0b11 {
            0b01 => Some(Self::Layer3),
            0b10 => Some(Self::Layer2),
            0b11 => Some(Self::Layer1),
            _ => None,
        }
    }

    /// The 2-bit header value.
    pub fn bits(self) -> u8 {
        self as u8
    }

    fn table_column(self) -> usize {
        match self {
            Self::Layer1 => 0,
            Self::Layer2 => 1,
            Self::Layer3 => 2,
        }
    }
}

/// Channel mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum ChannelMode {
    Stereo,
    JointStereo,
    DualChannel,
    Mono,
}

impl ChannelMode {
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0b00 => Self::Stereo,
            0b01 => Self::JointStereo,
            0b10 => Self::DualChannel,
            _ => Self::Mono,
        }
    }

    pub fn channels(self) -> u16 {
        match self {
            Self::Mono => 1,
            _ => 2,
        }
    }
}

/// Check the frame-header validity predicate on a big-endian header word.
///
/// Rejects a missing sync, reserved version (1), reserved layer (0),
/// bitrate index 15 and sample-rate index 3.
pub fn is_valid_frame_header(word: u32) -> bool {
    if word & SYNC_MASK != SYNC_MASK {
        return false;
    }
    let version = (word >> 19) & 0b11;
    let layer = (word >> 17) & 0b11;
    let bitrate_index = (word >> 12) & 0xF;
    let sample_rate_index = (word >> 10) & 0b11;

    version != 1 && layer != 0 && bitrate_index != 0xF && sample_rate_index != 3
}

/// Read a big-endian header word at `pos`, if four bytes are available.
pub fn header_word(buf: &[u8], pos: usize) -> Option<u32> {
    let bytes = buf.get(pos..pos.checked_add(HEADER_LEN)?)?;
    Some(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Decoded MPEG audio frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub version: MpegVersion,
    pub layer: MpegLayer,
    /// A CRC follows the header (protection bit is 0).
    pub protected: bool,
    pub bitrate_index: u8,
    pub sample_rate_index: u8,
    pub padding: bool,
    pub channel_mode: ChannelMode,
    /// Bitrate in kbps from the lookup table. Zero for free-format streams.
    pub bitrate_kbps: u32,
    /// Sample rate in Hz.
    pub sample_rate: u32,
}

impl FrameHeader {
    /// Decode a header word, or `None` if it fails the validity predicate.
    pub fn parse(word: u32) -> Option<Self> {
        if !is_valid_frame_header(word) {
            return None;
        }

        let version = MpegVersion::from_bits(((word >> 19) & 0b11) as u8)?;
        let layer = MpegLayer::from_bits(((word >> 17) & 0b11) as u8)?;
        let protected = (word >> 16) & 1 == 0;
        let bitrate_index = ((word >> 12) & 0xF) as u8;
        let sample_rate_index = ((word >> 10) & 0b11) as u8;
        let padding = (word >> 9) & 1 == 1;
        let channel_mode = ChannelMode::from_bits(((word >> 6) & 0b11) as u8);

        let row = if version == MpegVersion::Mpeg1 { 0 } else { 1 };
        let bitrate_kbps = BITRATE_KBPS[row][layer.table_column()][bitrate_index as usize];
        let sample_rate = SAMPLE_RATES[version.rate_row()][sample_rate_index as usize];

        Some(Self {
            version,
            layer,
            protected,
            bitrate_index,
            sample_rate_index,
            padding,
            channel_mode,
            bitrate_kbps,
            sample_rate,
        })
    }

    /// Decode the header at `pos` in `buf`.
    pub fn read(buf: &[u8], pos: usize) -> Option<Self> {
        header_word(buf, pos).and_then(Self::parse)
    }

    /// Bitrate in bits per second.
    pub fn bitrate(&self) -> u32 {
        self.bitrate_kbps * 1000
    }

    pub fn channels(&self) -> u16 {
        self.channel_mode.channels()
    }

    /// Frame length in bytes, including the header and padding.
    pub fn frame_size(&self) -> u32 {
        let bitrate = self.bitrate() as u64;
        let rate = self.sample_rate as u64;
        let pad = self.padding as u32;

        match self.layer {
            MpegLayer::Layer3 => {
                let coefficient = if self.version == MpegVersion::Mpeg1 { 144 } else { 72 };
                (coefficient * bitrate / rate) as u32 + pad
            }
            MpegLayer::Layer2 => (144 * bitrate / rate) as u32 + pad,
            MpegLayer::Layer1 => (12 * bitrate / rate) as u32 * 4 + pad * 4,
        }
    }

    /// PCM samples decoded from one frame.
    pub fn samples_per_frame(&self) -> u32 {
        match (self.layer, self.version) {
            (MpegLayer::Layer1, _) => 384,
            (MpegLayer::Layer2, _) => 1152,
            (MpegLayer::Layer3, MpegVersion::Mpeg1) => 1152,
            (MpegLayer::Layer3, _) => 576,
        }
    }

    /// Bytes between the header and a Xing/Info tag.
    pub fn side_info_len(&self) -> usize {
        match self.channel_mode {
            ChannelMode::Mono => 17,
            _ => 32,
        }
    }
}

/// Build a header word from its fields. Used by tests and fixtures.
pub fn encode_header(
    version: u8,
    layer: u8,
    bitrate_index: u8,
    sample_rate_index: u8,
    padding: bool,
    channel_mode: u8,
) -> u32 {
    SYNC_MASK
        | ((version as u32 & 0b11) << 19)
        | ((layer as u32 & 0b11) << 17)
        | (1 << 16)
        | ((bitrate_index as u32 & 0xF) << 12)
        | ((sample_rate_index as u32 & 0b11) << 10)
        | ((padding as u32) << 9)
        | ((channel_mode as u32 & 0b11) << 6)
}
