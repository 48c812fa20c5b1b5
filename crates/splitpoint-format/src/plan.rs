//! Split planning for large files.
//!
//! A [`SplitPlan`] cuts the audio payload of a file into contiguous byte
//! ranges of roughly equal duration, each ending on a boundary the format
//! allows. Times are measured from the first audio byte.

use crate::manager::FormatStrategyManager;
use crate::metadata::AudioMetadata;
use crate::source::MediaSource;

/// Default target duration per segment (10 minutes).
pub const DEFAULT_TARGET_DURATION_SECS: f64 = 600.0;

/// One planned byte range.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct PlannedSegment {
    /// Segment index (0-based).
    pub index: u32,
    /// First byte, absolute.
    pub start: u64,
    /// One past the last byte, absolute.
    pub end: u64,
    /// Start time in seconds from the first audio byte.
    pub start_time_secs: f64,
    pub duration_secs: f64,
}

impl PlannedSegment {
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }
}

/// Ordered, contiguous split plan covering `[audio_start, audio_end)`.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct SplitPlan {
    pub segments: Vec<PlannedSegment>,
    pub audio_start: u64,
    pub audio_end: u64,
    pub target_duration_secs: f64,
}

impl SplitPlan {
    pub fn builder() -> SplitPlanBuilder {
        SplitPlanBuilder::new()
    }

    pub fn segment_count(&self) -> u32 {
        self.segments.len() as u32
    }

    pub fn get_segment(&self, index: u32) -> Option<&PlannedSegment> {
        self.segments.get(index as usize)
    }

    /// Index of the segment playing at `time_secs`.
    pub fn find_segment_at_time(&self, time_secs: f64) -> Option<u32> {
        self.segments
            .iter()
            .find(|seg| {
                time_secs >= seg.start_time_secs
                    && time_secs < seg.start_time_secs + seg.duration_secs
            })
            .map(|seg| seg.index)
    }

    /// Sum of segment durations.
    pub fn duration_secs(&self) -> f64 {
        self.segments.iter().map(|s| s.duration_secs).sum()
    }
}

/// Builder for [`SplitPlan`].
#[derive(Debug, Clone)]
pub struct SplitPlanBuilder {
    target_duration_secs: f64,
    max_segment_bytes: Option<u64>,
}

impl Default for SplitPlanBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SplitPlanBuilder {
    pub fn new() -> Self {
        Self {
            target_duration_secs: DEFAULT_TARGET_DURATION_SECS,
            max_segment_bytes: None,
        }
    }

    /// Set target segment duration in seconds.
    pub fn target_duration(mut self, secs: f64) -> Self {
        self.target_duration_secs = secs;
        self
    }

    /// Cut earlier whenever a segment would exceed `bytes`. Zero disables the cap.
    pub fn max_segment_bytes(mut self, bytes: Option<u64>) -> Self {
        self.max_segment_bytes = bytes.filter(|&b| b > 0);
        self
    }

    /// Plan segments for a parsed file.
    ///
    /// Each cut is placed at `start_time + target_duration`, then snapped with
    /// [`FormatStrategyManager::find_best_split_point`]. A snapped point that
    /// does not advance, or that breaks the byte cap, is replaced by the
    /// unsnapped position. Without usable timing the whole payload becomes a
    /// single segment.
    pub async fn build(
        self,
        manager: &FormatStrategyManager,
        source: &dyn MediaSource,
        metadata: &AudioMetadata,
    ) -> SplitPlan {
        let audio_end = metadata.audio_end().min(source.size());
        let audio_start = metadata.audio_start().min(audio_end);

        let mut plan = SplitPlan {
            segments: Vec::new(),
            audio_start,
            audio_end,
            target_duration_secs: self.target_duration_secs,
        };

        let origin = manager.time_from_position(audio_start, metadata);
        let mut start = audio_start;

        while start < audio_end {
            let start_time = manager.time_from_position(start, metadata);

            let mut target = if self.target_duration_secs > 0.0 {
                manager.position_from_time(start_time + self.target_duration_secs, metadata)
            } else {
                audio_end
            };
            if target <= start {
                target = audio_end;
            }
            if let Some(cap) = self.max_segment_bytes {
                target = target.min(start.saturating_add(cap));
            }

            let end = if target >= audio_end {
                audio_end
            } else {
                let refined = manager.find_best_split_point(source, target, metadata).await;
                let advances = refined > start && refined < audio_end;
                let within_cap = self
                    .max_segment_bytes
                    .map_or(true, |cap| refined.saturating_sub(start) <= cap);
                if advances && within_cap {
                    refined
                } else {
                    tracing::debug!(
                        offset = target,
                        refined,
                        "split point rejected, using raw target"
                    );
                    target
                }
            };

            let end_time = manager.time_from_position(end, metadata);
            plan.segments.push(PlannedSegment {
                index: plan.segments.len() as u32,
                start,
                end,
                start_time_secs: (start_time - origin).max(0.0),
                duration_secs: (end_time - start_time).max(0.0),
            });
            start = end;
        }

        tracing::debug!(
            segments = plan.segments.len(),
            audio_start,
            audio_end,
            "built split plan"
        );
        plan
    }
}
