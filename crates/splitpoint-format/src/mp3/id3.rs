//! ID3v2 tag header.

/// Length of the fixed ID3v2 header (and of the optional footer).
pub const ID3V2_HEADER_LEN: usize = 10;

const FLAG_UNSYNCHRONISATION: u8 = 0x80;
const FLAG_EXTENDED_HEADER: u8 = 0x40;
const FLAG_FOOTER: u8 = 0x10;

/// Parsed ID3v2 header found at offset 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Id3Header {
    /// Major version (3 for ID3v2.3, 4 for ID3v2.4).
    pub major_version: u8,
    pub revision: u8,
    pub flags: u8,
    /// Tag size excluding the 10-byte header and footer.
    pub size: u32,
}

impl Id3Header {
    /// Parse the header at the start of `buf`.
    pub fn parse(buf: &[u8]) -> Option<Self> {
        let header = buf.get(..ID3V2_HEADER_LEN)?;
        if &header[0..3] != b"ID3" {
            return None;
        }

        Some(Self {
            major_version: header[3],
            revision: header[4],
            flags: header[5],
            size: synchsafe([header[6], header[7], header[8], header[9]]),
        })
    }

    pub fn has_extended_header(&self) -> bool {
        self.flags & FLAG_EXTENDED_HEADER != 0
    }

    pub fn has_footer(&self) -> bool {
        self.flags & FLAG_FOOTER != 0
    }

    pub fn is_unsynchronised(&self) -> bool {
        self.flags & FLAG_UNSYNCHRONISATION != 0
    }

    /// Bytes the tag occupies on disk; audio frames begin at this offset.
    pub fn total_size(&self) -> u64 {
        let footer = if self.has_footer() { ID3V2_HEADER_LEN } else { 0 };
        (ID3V2_HEADER_LEN + footer) as u64 + self.size as u64
    }
}

/// Decode a 28-bit synchsafe integer (7 bits per byte, top bit ignored).
pub fn synchsafe(bytes: [u8; 4]) -> u32 {
    bytes
        .iter()
        .fold(0u32, |acc, &b| (acc << 7) | (b & 0x7F) as u32)
}
