//! Splitpoint-Format: MP3/WAV container parsing and split-point computation
//!
//! This crate parses just enough of an audio container to cut a large file
//! into playable pieces without decoding it.
//!
//! # Modules
//!
//! - `source` - Async byte-range readers over memory and files
//! - `strategy` - The per-format contract and constant-bitrate defaults
//! - `mp3` - MPEG frame headers, ID3v2 skipping, Xing/Info/VBRI tags
//! - `wav` - RIFF chunk traversal, `fmt `/`fact`/`LIST` decoding, header synthesis
//! - `manager` - Strategy registry, detection, and delegation
//! - `plan` - Duration-based split plans over a parsed file
//!
//! # Architecture
//!
//! A caller resolves a file to metadata once:
//!
//! 1. Read a bounded header window from the start of the file
//! 2. Detect the format from content, falling back to the file extension
//! 3. Parse metadata, reading past the window where the format needs it
//!
//! Later operations take that metadata and read only small windows:
//! snapping a byte target to a frame or sample boundary, converting between
//! seconds and byte offsets, and producing a self-contained segment.

pub mod error;
pub mod limits;
pub mod manager;
pub mod metadata;
pub mod mp3;
pub mod plan;
pub mod source;
pub mod strategy;
pub mod wav;

pub use error::{Error, FormatError, Result};
pub use limits::ParseLimits;
pub use manager::FormatStrategyManager;
pub use metadata::{AudioMetadata, FormatDetails, ParseOutcome};
pub use mp3::{Mp3Details, Mp3FrameParser};
pub use plan::{PlannedSegment, SplitPlan, SplitPlanBuilder};
pub use source::{FileSource, MediaSource, MemorySource};
pub use strategy::{BoundaryOptions, FormatStrategy, Segment};
pub use wav::{WavChunkParser, WavDetails};
