//! Strategy registry and the entry points callers use.
//!
//! The [`FormatStrategyManager`] owns the registered strategies, resolves one
//! for a file by content and then by extension, and delegates every
//! operation to it. Operations other than [`parse_file`] and
//! [`create_segment`] never fail: with no matching strategy they fall back
//! to constant-bitrate arithmetic or return their input unchanged.
//!
//! [`parse_file`]: FormatStrategyManager::parse_file
//! [`create_segment`]: FormatStrategyManager::create_segment
//!
//! # Examples
//!
//! ```rust,ignore
//! use splitpoint_format::{FileSource, FormatStrategyManager, ParseLimits};
//!
//! let manager = FormatStrategyManager::with_defaults(ParseLimits::default());
//! let source = FileSource::open("podcast.mp3").await?;
//! let outcome = manager.parse_file(&source).await?;
//! let split = manager
//!     .find_best_split_point(&source, 10_000_000, outcome.metadata())
//!     .await;
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::Error;
use crate::limits::ParseLimits;
use crate::metadata::{AudioMetadata, ParseOutcome};
use crate::mp3::Mp3FrameParser;
use crate::source::MediaSource;
use crate::strategy::{
    cbr_position_from_time, cbr_time_from_position, raw_segment, BoundaryOptions,
    FormatStrategy, Segment,
};
use crate::wav::WavChunkParser;
use crate::Result;

/// Registry of format strategies, keyed by lowercase format tag.
///
/// Detection tries strategies in `order`; the most recently registered
/// format is tried first. Registration is expected at setup time only.
pub struct FormatStrategyManager {
    strategies: HashMap<String, Arc<dyn FormatStrategy>>,
    order: Vec<String>,
    limits: ParseLimits,
}

impl FormatStrategyManager {
    /// Create a manager with no strategies.
    pub fn new(limits: ParseLimits) -> Self {
        Self {
            strategies: HashMap::new(),
            order: Vec::new(),
            limits,
        }
    }

    /// Create a manager with the built-in strategies. WAV is tried before MP3.
    pub fn with_defaults(limits: ParseLimits) -> Self {
        let mut manager = Self::new(limits);
        manager.register_strategy(Arc::new(Mp3FrameParser::with_limits(limits)));
        manager.register_strategy(Arc::new(WavChunkParser::with_limits(limits)));
        manager
    }

    pub fn limits(&self) -> &ParseLimits {
        &self.limits
    }

    /// Register a strategy under its format tag and give it detection
    /// priority. Re-registering a tag replaces the previous strategy.
    pub fn register_strategy(&mut self, strategy: Arc<dyn FormatStrategy>) {
        let key = strategy.format().to_lowercase();
        self.order.retain(|k| k != &key);
        self.order.insert(0, key.clone());
        tracing::debug!(format = %key, parser = strategy.name(), "registered format strategy");
        self.strategies.insert(key, strategy);
    }

    /// Look up a strategy by format tag, case-insensitively.
    pub fn get_strategy(&self, format: &str) -> Option<Arc<dyn FormatStrategy>> {
        self.strategies.get(&format.to_lowercase()).cloned()
    }

    /// Registered format tags in detection order.
    pub fn supported_formats(&self) -> Vec<&str> {
        self.order.iter().map(String::as_str).collect()
    }

    fn ordered(&self) -> impl Iterator<Item = &Arc<dyn FormatStrategy>> {
        self.order.iter().filter_map(|k| self.strategies.get(k))
    }

    /// Resolve a strategy from header bytes, then from the extension of
    /// `filename`. `None` means the file cannot be handled.
    pub fn detect_strategy(
        &self,
        header: &[u8],
        filename: &str,
    ) -> Option<Arc<dyn FormatStrategy>> {
        if let Some(strategy) = self.ordered().find(|s| s.validate(header)) {
            tracing::debug!(format = strategy.format(), "detected format from content");
            return Some(strategy.clone());
        }

        let ext = filename.rsplit_once('.')?.1.to_lowercase();
        let by_ext = self
            .ordered()
            .find(|s| {
                s.format().eq_ignore_ascii_case(&ext) || s.extensions().iter().any(|e| *e == ext)
            })
            .cloned();
        match &by_ext {
            Some(strategy) => {
                tracing::debug!(format = strategy.format(), ext = %ext, "detected format from extension");
            }
            None => tracing::debug!(file = filename, "no strategy matched"),
        }
        by_ext
    }

    /// Read the header window, detect the format, and parse metadata.
    ///
    /// The returned metadata is tagged with the strategy's format and parser
    /// name. Strategy-level problems come back as
    /// [`ParseOutcome::Degraded`]; read failures and unrecognised files are
    /// errors.
    pub async fn parse_file(&self, source: &dyn MediaSource) -> Result<ParseOutcome> {
        let len = (self.limits.header_window as u64).min(source.size());
        let header = source.read_range(0, len).await.map_err(|e| {
            tracing::error!(file = source.name(), error = %e, "failed to read header window");
            e
        })?;

        let strategy = self.detect_strategy(&header, source.name()).ok_or_else(|| {
            tracing::error!(file = source.name(), "unsupported audio format");
            Error::unsupported(source.name())
        })?;

        let mut outcome = strategy.parse_metadata(source, &header).await;
        let meta = outcome.metadata_mut();
        meta.strategy = Some(strategy.format().to_ascii_lowercase());
        meta.parser = Some(strategy.name().to_string());

        tracing::info!(
            file = source.name(),
            format = strategy.format(),
            degraded = outcome.is_degraded(),
            duration = ?outcome.metadata().duration,
            "parsed audio metadata"
        );
        Ok(outcome)
    }

    /// Snap an absolute `target` offset to the nearest boundary the format
    /// allows. Returns `target` when no strategy matches or the window read
    /// fails.
    pub async fn find_best_split_point(
        &self,
        source: &dyn MediaSource,
        target: u64,
        metadata: &AudioMetadata,
    ) -> u64 {
        let Some(strategy) = self.get_strategy(metadata.format()) else {
            return target;
        };

        let radius = self.limits.split_window_radius;
        let window_start = target.saturating_sub(radius);
        let window_end = target.saturating_add(radius).min(source.size());

        let window = match source.read_range(window_start, window_end).await {
            Ok(window) => window,
            Err(e) => {
                tracing::warn!(offset = target, error = %e, "split window read failed, keeping target");
                return target;
            }
        };

        let options = BoundaryOptions {
            search_range: Some(self.limits.boundary_search_range),
            metadata: Some(metadata),
            buffer_offset: window_start,
        };
        let local = (target - window_start) as usize;
        let found = window_start + strategy.find_frame_boundary(&window, local, &options) as u64;

        tracing::debug!(offset = target, found, format = strategy.format(), "refined split point");
        found
    }

    /// Produce a playable segment for `[start, end)`.
    pub async fn create_segment(
        &self,
        source: &dyn MediaSource,
        start: u64,
        end: u64,
        metadata: &AudioMetadata,
    ) -> Result<Segment> {
        if start >= end {
            return Err(Error::InvalidRange { start, end });
        }
        match self.get_strategy(metadata.format()) {
            Some(strategy) => strategy.create_segment(source, start, end, metadata).await,
            None => raw_segment(source, start, end).await,
        }
    }

    pub fn time_from_position(&self, position: u64, metadata: &AudioMetadata) -> f64 {
        match self.get_strategy(metadata.format()) {
            Some(strategy) => strategy.time_from_position(position, metadata),
            None => cbr_time_from_position(position, metadata),
        }
    }

    pub fn position_from_time(&self, secs: f64, metadata: &AudioMetadata) -> u64 {
        match self.get_strategy(metadata.format()) {
            Some(strategy) => strategy.position_from_time(secs, metadata),
            None => cbr_position_from_time(secs, metadata),
        }
    }

    /// Size of one decodable unit, when the format and metadata define it.
    pub fn frame_size(&self, metadata: &AudioMetadata) -> Option<u32> {
        self.get_strategy(metadata.format())?.frame_size(metadata)
    }
}

impl Default for FormatStrategyManager {
    fn default() -> Self {
        Self::with_defaults(ParseLimits::default())
    }
}

impl std::fmt::Debug for FormatStrategyManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormatStrategyManager")
            .field("order", &self.order)
            .field("limits", &self.limits)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;
    use async_trait::async_trait;

    /// Accepts anything starting with `OggS`.
    struct StubOgg;

    #[async_trait]
    impl FormatStrategy for StubOgg {
        fn format(&self) -> &'static str {
            "OGG"
        }

        fn name(&self) -> &'static str {
            "StubOgg"
        }

        fn extensions(&self) -> &'static [&'static str] {
            &["oga"]
        }

        fn validate(&self, header: &[u8]) -> bool {
            header.starts_with(b"OggS")
        }

        async fn parse_metadata(&self, source: &dyn MediaSource, _header: &[u8]) -> ParseOutcome {
            ParseOutcome::Complete(AudioMetadata::new(self.format(), source.size()))
        }

        fn find_frame_boundary(
            &self,
            _buffer: &[u8],
            target: usize,
            _options: &BoundaryOptions<'_>,
        ) -> usize {
            target
        }

        fn frame_size(&self, _metadata: &AudioMetadata) -> Option<u32> {
            None
        }
    }

    #[test]
    fn default_order_is_wav_then_mp3() {
        let manager = FormatStrategyManager::default();
        assert_eq!(manager.supported_formats(), vec!["wav", "mp3"]);
    }

    #[test]
    fn registered_format_is_prepended() {
        let mut manager = FormatStrategyManager::default();
        manager.register_strategy(Arc::new(StubOgg));
        assert_eq!(manager.supported_formats(), vec!["ogg", "wav", "mp3"]);
        assert!(manager.get_strategy("Ogg").is_some());

        // re-registering moves to the front without duplicating
        manager.register_strategy(Arc::new(Mp3FrameParser::new()));
        assert_eq!(manager.supported_formats(), vec!["mp3", "ogg", "wav"]);
    }

    #[test]
    fn extension_fallback_is_case_insensitive() {
        let manager = FormatStrategyManager::default();
        let garbage = [0u8; 32];
        let strategy = manager.detect_strategy(&garbage, "Track.01.MP3").unwrap();
        assert_eq!(strategy.format(), "mp3");
        let strategy = manager.detect_strategy(&garbage, "take.wave").unwrap();
        assert_eq!(strategy.format(), "wav");
        assert!(manager.detect_strategy(&garbage, "notes.txt").is_none());
        assert!(manager.detect_strategy(&garbage, "README").is_none());
    }

    #[tokio::test]
    async fn unsupported_file_is_an_error() {
        let manager = FormatStrategyManager::default();
        let source = MemorySource::new("notes.txt", b"hello world".to_vec());
        let err = manager.parse_file(&source).await.unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat(name) if name == "notes.txt"));
    }

    #[tokio::test]
    async fn parse_file_tags_strategy_and_parser() {
        let mut manager = FormatStrategyManager::default();
        manager.register_strategy(Arc::new(StubOgg));
        let source = MemorySource::new("a.bin", b"OggS\0\0\0\0".to_vec());
        let outcome = manager.parse_file(&source).await.unwrap();
        let meta = outcome.metadata();
        assert_eq!(meta.format(), "ogg");
        assert_eq!(meta.strategy.as_deref(), Some("ogg"));
        assert_eq!(meta.strategy.as_deref(), Some(meta.format()));
        assert_eq!(meta.parser.as_deref(), Some("StubOgg"));
    }

    #[tokio::test]
    async fn unregistered_format_falls_back() {
        let manager = FormatStrategyManager::default();
        let source = MemorySource::new("a.flac", vec![3u8; 100]);
        let mut meta = AudioMetadata::new("flac", 100);
        meta.bitrate = Some(800);

        assert_eq!(manager.find_best_split_point(&source, 37, &meta).await, 37);
        assert!((manager.time_from_position(50, &meta) - 0.5).abs() < 1e-12);
        assert_eq!(manager.position_from_time(0.5, &meta), 50);
        assert_eq!(manager.frame_size(&meta), None);

        let segment = manager.create_segment(&source, 10, 20, &meta).await.unwrap();
        assert_eq!(segment.len(), 10);
    }

    #[tokio::test]
    async fn inverted_range_is_rejected() {
        let manager = FormatStrategyManager::default();
        let source = MemorySource::new("a.mp3", vec![0u8; 100]);
        let meta = AudioMetadata::new("mp3", 100);
        assert!(matches!(
            manager.create_segment(&source, 20, 20, &meta).await,
            Err(Error::InvalidRange { start: 20, end: 20 })
        ));
    }
}
