//! Parsed audio metadata.
//!
//! An [`AudioMetadata`] is produced once per file by a strategy and is
//! read-only afterwards. The manager only fills in the `strategy` and
//! `parser` tags.

use crate::error::FormatError;
use crate::mp3::Mp3Details;
use crate::wav::WavDetails;

/// Metadata common to every container plus format-specific details.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct AudioMetadata {
    format: String,
    /// Total file size in bytes.
    pub file_size: u64,
    /// Bits per second. `Some(0)` means the stream declared no usable bitrate.
    pub bitrate: Option<u32>,
    /// Sample rate in Hz.
    pub sample_rate: Option<u32>,
    /// Channel count.
    pub channels: Option<u16>,
    /// Duration in seconds. Not authoritative for seeking in VBR streams.
    pub duration: Option<f64>,
    /// Rounded duration for display.
    pub estimated_duration: Option<u64>,
    /// Format id of the strategy that produced this metadata.
    pub strategy: Option<String>,
    /// Name of the concrete parser that produced this metadata.
    pub parser: Option<String>,
    /// Container-specific fields.
    pub details: FormatDetails,
}

/// Container-specific metadata.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serialize", serde(tag = "kind", rename_all = "snake_case"))]
pub enum FormatDetails {
    Mp3(Mp3Details),
    Wav(WavDetails),
    /// Nothing beyond the common fields could be recovered.
    #[default]
    Unparsed,
}

impl AudioMetadata {
    /// Create empty metadata for the given format tag.
    pub fn new(format: impl Into<String>, file_size: u64) -> Self {
        Self {
            format: format.into().to_lowercase(),
            file_size,
            bitrate: None,
            sample_rate: None,
            channels: None,
            duration: None,
            estimated_duration: None,
            strategy: None,
            parser: None,
            details: FormatDetails::Unparsed,
        }
    }

    /// Format tag (`"mp3"`, `"wav"`, ...). Fixed at creation.
    pub fn format(&self) -> &str {
        &self.format
    }

    /// Set the duration and its rounded display value together.
    pub fn set_duration(&mut self, secs: f64) {
        self.duration = Some(secs);
        self.estimated_duration = Some(secs.round().max(0.0) as u64);
    }

    /// MP3 details, if this is parsed MP3 metadata.
    pub fn mp3(&self) -> Option<&Mp3Details> {
        match &self.details {
            FormatDetails::Mp3(d) => Some(d),
            _ => None,
        }
    }

    /// WAV details, if this is parsed WAV metadata.
    pub fn wav(&self) -> Option<&WavDetails> {
        match &self.details {
            FormatDetails::Wav(d) => Some(d),
            _ => None,
        }
    }

    /// Whether the stream carries a variable-bitrate tag.
    pub fn is_vbr(&self) -> bool {
        self.mp3().map(|d| d.vbr).unwrap_or(false)
    }

    /// Byte offset of the first audio payload byte.
    pub fn audio_start(&self) -> u64 {
        match &self.details {
            FormatDetails::Mp3(d) => d.first_frame_offset,
            FormatDetails::Wav(d) => d.data_chunk_offset.unwrap_or(0),
            FormatDetails::Unparsed => 0,
        }
    }

    /// Byte offset one past the last audio byte, never beyond the file.
    pub fn audio_end(&self) -> u64 {
        let end = match &self.details {
            FormatDetails::Wav(d) => d.data_end().unwrap_or(self.file_size),
            _ => self.file_size,
        };
        end.min(self.file_size)
    }
}

/// Result of `parse_metadata`: full metadata, or partial metadata plus the
/// reason parsing stopped.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serialize", serde(tag = "status", rename_all = "snake_case"))]
pub enum ParseOutcome {
    Complete(AudioMetadata),
    Degraded {
        metadata: AudioMetadata,
        error: FormatError,
    },
}

impl ParseOutcome {
    /// Degraded outcome carrying only the format tag.
    pub fn fallback(format: &str, file_size: u64, error: FormatError) -> Self {
        Self::Degraded {
            metadata: AudioMetadata::new(format, file_size),
            error,
        }
    }

    /// Metadata, complete or partial.
    pub fn metadata(&self) -> &AudioMetadata {
        match self {
            Self::Complete(m) => m,
            Self::Degraded { metadata, .. } => metadata,
        }
    }

    pub(crate) fn metadata_mut(&mut self) -> &mut AudioMetadata {
        match self {
            Self::Complete(m) => m,
            Self::Degraded { metadata, .. } => metadata,
        }
    }

    /// Consume the outcome, keeping only the metadata.
    pub fn into_metadata(self) -> AudioMetadata {
        match self {
            Self::Complete(m) => m,
            Self::Degraded { metadata, .. } => metadata,
        }
    }

    /// The reason parsing degraded, if it did.
    pub fn error(&self) -> Option<&FormatError> {
        match self {
            Self::Complete(_) => None,
            Self::Degraded { error, .. } => Some(error),
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }
}
