//! Read-size bounds applied during parsing and boundary search.
//!
//! Every read the library issues is capped by one of these values, so the
//! memory and latency of a call stay bounded regardless of file size.

/// Default header window read before format detection (64 KiB).
pub const DEFAULT_HEADER_WINDOW: usize = 64 * 1024;

/// Default span scanned for the first MPEG frame after the ID3v2 tag (64 KiB).
pub const DEFAULT_FRAME_SEARCH_WINDOW: usize = 64 * 1024;

/// Default maximum number of bytes walked during RIFF chunk traversal (1 MiB).
///
/// Chunks located past this offset are never discovered.
pub const DEFAULT_WAV_SCAN_LIMIT: usize = 1024 * 1024;

/// Default cap on the in-memory payload kept per RIFF chunk.
pub const DEFAULT_CHUNK_PAYLOAD_CAP: usize = 1024;

/// Default radius of the window read around a split target (512 KiB).
pub const DEFAULT_SPLIT_WINDOW_RADIUS: u64 = 512 * 1024;

/// Default width of the frame-boundary scan centred on a target.
pub const DEFAULT_BOUNDARY_SEARCH_RANGE: usize = 8 * 1024;

/// Tunable read bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serialize", serde(default))]
pub struct ParseLimits {
    /// Bytes read from the start of the file for detection.
    pub header_window: usize,
    /// Bytes scanned for the first MPEG frame.
    pub frame_search_window: usize,
    /// Bytes walked during RIFF chunk traversal.
    pub wav_scan_limit: usize,
    /// Bytes of chunk payload retained per chunk.
    pub chunk_payload_cap: usize,
    /// Bytes read on each side of a split target.
    pub split_window_radius: u64,
    /// Width of the frame scan around a target inside the split window.
    pub boundary_search_range: usize,
}

impl Default for ParseLimits {
    fn default() -> Self {
        Self {
            header_window: DEFAULT_HEADER_WINDOW,
            frame_search_window: DEFAULT_FRAME_SEARCH_WINDOW,
            wav_scan_limit: DEFAULT_WAV_SCAN_LIMIT,
            chunk_payload_cap: DEFAULT_CHUNK_PAYLOAD_CAP,
            split_window_radius: DEFAULT_SPLIT_WINDOW_RADIUS,
            boundary_search_range: DEFAULT_BOUNDARY_SEARCH_RANGE,
        }
    }
}
