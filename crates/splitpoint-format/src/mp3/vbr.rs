//! Xing/Info and VBRI tags carried in the first MPEG frame.
//!
//! Xing layout (big-endian, after the side information):
//! `"Xing"|"Info"`, flags (u32), frames (u32, flag bit 0), bytes (u32, flag bit 1).
//!
//! VBRI layout (32 bytes past the frame header, some muxers write it 32
//! bytes past the frame start):
//! `"VBRI"`, version (u16), delay (u16), quality (u16), bytes (u32), frames (u32),
//! then TOC fields up to a fixed 26 bytes.

use super::header::{FrameHeader, HEADER_LEN};

/// Offset of a VBRI tag from the start of the frame.
pub const VBRI_OFFSET: usize = HEADER_LEN + 32;

/// Positions probed for a VBRI tag, in order.
const VBRI_PROBE_OFFSETS: [usize; 2] = [32, VBRI_OFFSET];

/// Fixed length of the VBRI structure.
pub const VBRI_LEN: usize = 26;

/// Bytes read from the frame start to cover every tag position.
pub const VBR_PROBE_LEN: usize = VBRI_OFFSET + VBRI_LEN;

const XING_FRAMES_FLAG: u32 = 0x01;
const XING_BYTES_FLAG: u32 = 0x02;

/// Which tag was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum VbrTagKind {
    Xing,
    /// Same layout as Xing; written by LAME for CBR streams.
    Info,
    Vbri,
}

/// Payload of a Xing/Info/VBRI tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct VbrInfo {
    pub kind: VbrTagKind,
    /// Total audio frames in the stream.
    pub frames: Option<u32>,
    /// Total bytes of audio in the stream.
    pub bytes: Option<u32>,
    /// VBRI version, delay and quality.
    pub vbri_version: Option<u16>,
    pub vbri_delay: Option<u16>,
    pub vbri_quality: Option<u16>,
}

impl VbrInfo {
    /// Whether the tag marks a variable-bitrate stream.
    pub fn is_vbr(&self) -> bool {
        !matches!(self.kind, VbrTagKind::Info)
    }
}

fn be_u32(buf: &[u8], pos: usize) -> Option<u32> {
    let b = buf.get(pos..pos + 4)?;
    Some(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
}

fn be_u16(buf: &[u8], pos: usize) -> Option<u16> {
    let b = buf.get(pos..pos + 2)?;
    Some(u16::from_be_bytes([b[0], b[1]]))
}

/// Parse a Xing/Info tag. `frame` starts at the frame header.
pub fn parse_xing(frame: &[u8], header: &FrameHeader) -> Option<VbrInfo> {
    let pos = HEADER_LEN + header.side_info_len();
    let kind = match frame.get(pos..pos + 4)? {
        b"Xing" => VbrTagKind::Xing,
        b"Info" => VbrTagKind::Info,
        _ => return None,
    };

    let flags = be_u32(frame, pos + 4)?;
    let mut cursor = pos + 8;

    let frames = if flags & XING_FRAMES_FLAG != 0 {
        let value = be_u32(frame, cursor);
        cursor += 4;
        value
    } else {
        None
    };
    let bytes = if flags & XING_BYTES_FLAG != 0 {
        be_u32(frame, cursor)
    } else {
        None
    };

    Some(VbrInfo {
        kind,
        frames,
        bytes,
        vbri_version: None,
        vbri_delay: None,
        vbri_quality: None,
    })
}

/// Parse a VBRI tag. `frame` starts at the frame header.
pub fn parse_vbri(frame: &[u8]) -> Option<VbrInfo> {
    let tag = VBRI_PROBE_OFFSETS
        .iter()
        .filter_map(|&pos| frame.get(pos..pos + VBRI_LEN))
        .find(|tag| &tag[0..4] == b"VBRI")?;

    Some(VbrInfo {
        kind: VbrTagKind::Vbri,
        vbri_version: be_u16(tag, 4),
        vbri_delay: be_u16(tag, 6),
        vbri_quality: be_u16(tag, 8),
        bytes: be_u32(tag, 10),
        frames: be_u32(tag, 14),
    })
}

/// Look for a Xing/Info tag, then a VBRI tag.
pub fn detect(frame: &[u8], header: &FrameHeader) -> Option<VbrInfo> {
    parse_xing(frame, header).or_else(|| parse_vbri(frame))
}
