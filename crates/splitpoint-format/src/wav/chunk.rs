//! RIFF chunk traversal.

/// Offset of the first chunk after the `RIFF....WAVE` preamble.
pub const FIRST_CHUNK_OFFSET: usize = 12;

/// Length of a chunk header (id + size).
pub const CHUNK_HEADER_LEN: usize = 8;

/// Four-character chunk identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FourCc(pub [u8; 4]);

impl FourCc {
    pub const RIFF: Self = Self(*b"RIFF");
    pub const WAVE: Self = Self(*b"WAVE");
    pub const FMT: Self = Self(*b"fmt ");
    pub const DATA: Self = Self(*b"data");
    pub const FACT: Self = Self(*b"fact");
    pub const LIST: Self = Self(*b"LIST");
    pub const INFO: Self = Self(*b"INFO");

    /// Read a code from the first four bytes of `buf`.
    pub fn read(buf: &[u8]) -> Option<Self> {
        let b = buf.get(..4)?;
        Some(Self([b[0], b[1], b[2], b[3]]))
    }

    /// The code as text, or `"????"` if it is not UTF-8.
    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.0).unwrap_or("????")
    }
}

impl std::fmt::Display for FourCc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(feature = "serialize")]
impl serde::Serialize for FourCc {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[cfg(feature = "serialize")]
impl<'de> serde::Deserialize<'de> for FourCc {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = <String as serde::Deserialize>::deserialize(deserializer)?;
        let bytes: [u8; 4] = text
            .as_bytes()
            .try_into()
            .map_err(|_| serde::de::Error::custom(format!("expected 4 bytes, got {:?}", text)))?;
        Ok(Self(bytes))
    }
}

/// Position record kept in metadata for every chunk encountered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct ChunkInfo {
    pub id: FourCc,
    /// Declared payload size.
    pub size: u32,
    /// Absolute offset of the chunk header.
    pub offset: u64,
}

/// A chunk seen during traversal. `data` is capped and may be shorter than
/// `size` when the chunk is large or truncated.
#[derive(Debug, Clone, Copy)]
pub struct RiffChunk<'a> {
    pub id: FourCc,
    pub size: u32,
    pub offset: u64,
    pub data: &'a [u8],
}

impl RiffChunk<'_> {
    pub fn info(&self) -> ChunkInfo {
        ChunkInfo {
            id: self.id,
            size: self.size,
            offset: self.offset,
        }
    }

    /// Absolute offset of the first payload byte.
    pub fn data_offset(&self) -> u64 {
        self.offset + CHUNK_HEADER_LEN as u64
    }
}

/// Offset of the chunk following one at `offset` with payload `size`,
/// including the pad byte after odd-sized payloads.
pub fn next_chunk_offset(offset: u64, size: u32) -> u64 {
    offset + CHUNK_HEADER_LEN as u64 + size as u64 + (size & 1) as u64
}

/// Iterator over chunks in a buffer that starts at file offset 0.
///
/// Stops at the end of the buffer or once the walk passes `limit`.
pub struct ChunkIter<'a> {
    buf: &'a [u8],
    offset: u64,
    limit: u64,
    payload_cap: usize,
}

impl<'a> ChunkIter<'a> {
    pub fn new(buf: &'a [u8], limit: usize, payload_cap: usize) -> Self {
        Self::starting_at(buf, FIRST_CHUNK_OFFSET, limit, payload_cap)
    }

    pub fn starting_at(buf: &'a [u8], offset: usize, limit: usize, payload_cap: usize) -> Self {
        Self {
            buf,
            offset: offset as u64,
            limit: limit as u64,
            payload_cap,
        }
    }
}

impl<'a> Iterator for ChunkIter<'a> {
    type Item = RiffChunk<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let len = self.buf.len() as u64;
        if self.offset >= self.limit || self.offset + CHUNK_HEADER_LEN as u64 > len {
            return None;
        }

        let pos = self.offset as usize;
        let id = FourCc::read(&self.buf[pos..])?;
        let s = &self.buf[pos + 4..pos + 8];
        let size = u32::from_le_bytes([s[0], s[1], s[2], s[3]]);

        let data_start = pos + CHUNK_HEADER_LEN;
        let data_end = data_start
            .saturating_add((size as usize).min(self.payload_cap))
            .min(self.buf.len());

        let chunk = RiffChunk {
            id,
            size,
            offset: self.offset,
            data: &self.buf[data_start..data_end],
        };
        self.offset = next_chunk_offset(self.offset, size);

        Some(chunk)
    }
}
