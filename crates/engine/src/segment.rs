//! Timer-reset segmentation and segment selection.
//!
//! Logs occasionally contain several back-to-back windows recorded under one
//! id: the venue timer reaches ~900 s, resets to ~0, and the logger keeps
//! appending. A large backward jump in `t_rel` therefore starts a new
//! segment, as does an implausibly large forward gap (stale logger resumed
//! mid-window). Only one segment per window is analyzed; the selector picks
//! the one that actually covered the window.

use tracing::debug;
use window_backtest_core::{SegmenterConfig, Tick};

use crate::report::SelectionConfidence;

/// A contiguous run of ticks between timer resets.
///
/// `start..=end` are indices into the window's tick sequence, in arrival
/// order. Segments never overlap and are ordered by first occurrence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    /// Index of the first tick in the run.
    pub start: usize,
    /// Index of the last tick in the run (inclusive).
    pub end: usize,
    /// Smallest `t_rel` observed in the run.
    pub min_t: f64,
    /// Largest `t_rel` observed in the run.
    pub max_t: f64,
}

impl Segment {
    /// Number of ticks in the run.
    #[must_use]
    pub fn len(&self) -> usize {
        self.end - self.start + 1
    }

    /// Always false; a segment holds at least one tick by construction.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }
}

/// The selector's verdict.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Selection {
    /// Index into the segment list.
    pub index: usize,
    /// Whether the chosen segment covered the nominal window.
    pub confidence: SelectionConfidence,
}

/// Splits a tick sequence into contiguous segments at timer resets.
///
/// A new segment starts when `t_rel` drops by more than
/// `reset_tolerance_secs` (a reset; small backward wiggles are sampling
/// jitter) or advances by more than `large_gap_secs` (a stale logger
/// resuming). Zero resets yield exactly one segment spanning the whole
/// sequence; an empty input yields no segments.
#[must_use]
pub fn segment_by_reset(ticks: &[Tick], config: &SegmenterConfig) -> Vec<Segment> {
    let mut segments = Vec::new();
    let Some(first) = ticks.first() else {
        return segments;
    };

    let mut start = 0;
    let mut min_t = first.t_rel;
    let mut max_t = first.t_rel;
    let mut prev_t = first.t_rel;

    for (i, tick) in ticks.iter().enumerate().skip(1) {
        let backward = prev_t - tick.t_rel > config.reset_tolerance_secs;
        let gapped = tick.t_rel - prev_t > config.large_gap_secs;
        if backward || gapped {
            segments.push(Segment {
                start,
                end: i - 1,
                min_t,
                max_t,
            });
            start = i;
            min_t = tick.t_rel;
            max_t = tick.t_rel;
        } else {
            min_t = min_t.min(tick.t_rel);
            max_t = max_t.max(tick.t_rel);
        }
        prev_t = tick.t_rel;
    }
    segments.push(Segment {
        start,
        end: ticks.len() - 1,
        min_t,
        max_t,
    });

    if segments.len() > 1 {
        debug!(segments = segments.len(), "tick log split at timer resets");
    }
    segments
}

/// Picks the segment to analyze.
///
/// Prefers the last segment whose `max_t` reaches within
/// `completion_tolerance_secs` of the nominal duration. When several
/// segments qualify, the last one is the window the log was actually
/// recording when it closed; earlier complete segments are leftovers of
/// previous windows. If none qualifies, the segment with the greatest
/// `max_t` is used (later arrival wins ties) and the selection is marked
/// incomplete. Returns `None` only for an empty segment list.
#[must_use]
pub fn select_segment(
    segments: &[Segment],
    window_duration_secs: f64,
    config: &SegmenterConfig,
) -> Option<Selection> {
    if segments.is_empty() {
        return None;
    }

    let cutoff = window_duration_secs - config.completion_tolerance_secs;
    if let Some(index) = segments.iter().rposition(|s| s.max_t >= cutoff) {
        return Some(Selection {
            index,
            confidence: SelectionConfidence::Complete,
        });
    }

    let mut best = 0;
    for (i, segment) in segments.iter().enumerate().skip(1) {
        if segment.max_t >= segments[best].max_t {
            best = i;
        }
    }
    Some(Selection {
        index: best,
        confidence: SelectionConfidence::Incomplete,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ticks_at(times: &[f64]) -> Vec<Tick> {
        times.iter().map(|&t| Tick::new(t, 50, 50)).collect()
    }

    // ============================================================
    // segment_by_reset Tests
    // ============================================================

    #[test]
    fn no_resets_yields_single_segment() {
        let ticks = ticks_at(&[0.0, 1.5, 3.0, 898.0]);
        let segments = segment_by_reset(&ticks, &SegmenterConfig::default());

        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].start, 0);
        assert_eq!(segments[0].end, 3);
        assert!((segments[0].min_t - 0.0).abs() < f64::EPSILON);
        assert!((segments[0].max_t - 898.0).abs() < f64::EPSILON);
    }

    #[test]
    fn backward_jump_past_tolerance_starts_new_segment() {
        // Timer runs to 450, resets to 5.
        let ticks = ticks_at(&[440.0, 445.0, 450.0, 5.0, 10.0, 890.0]);
        let segments = segment_by_reset(&ticks, &SegmenterConfig::default());

        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].end, 2);
        assert_eq!(segments[1].start, 3);
        assert!((segments[1].max_t - 890.0).abs() < f64::EPSILON);
    }

    #[test]
    fn small_backward_wiggle_stays_in_segment() {
        // Jitter of a few seconds is below the 30 s tolerance.
        let ticks = ticks_at(&[100.0, 102.0, 99.0, 104.0]);
        let segments = segment_by_reset(&ticks, &SegmenterConfig::default());

        assert_eq!(segments.len(), 1);
    }

    #[test]
    fn large_forward_gap_starts_new_segment() {
        let ticks = ticks_at(&[10.0, 12.0, 400.0, 402.0]);
        let segments = segment_by_reset(&ticks, &SegmenterConfig::default());

        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].end, 1);
        assert_eq!(segments[1].start, 2);
    }

    #[test]
    fn empty_input_yields_no_segments() {
        let segments = segment_by_reset(&[], &SegmenterConfig::default());
        assert!(segments.is_empty());
    }

    #[test]
    fn single_tick_yields_single_segment() {
        let ticks = ticks_at(&[42.0]);
        let segments = segment_by_reset(&ticks, &SegmenterConfig::default());

        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].start, 0);
        assert_eq!(segments[0].end, 0);
        assert_eq!(segments[0].len(), 1);
    }

    #[test]
    fn thresholds_come_from_config_not_constants() {
        // With a tiny tolerance even jitter splits.
        let config = SegmenterConfig {
            reset_tolerance_secs: 1.0,
            ..SegmenterConfig::default()
        };
        let ticks = ticks_at(&[100.0, 102.0, 99.0, 104.0]);
        let segments = segment_by_reset(&ticks, &config);

        assert_eq!(segments.len(), 2);
    }

    #[test]
    fn consecutive_resets_produce_one_segment_each() {
        let ticks = ticks_at(&[800.0, 890.0, 3.0, 895.0, 2.0, 4.0]);
        let segments = segment_by_reset(&ticks, &SegmenterConfig::default());

        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0].len(), 2);
        assert_eq!(segments[1].len(), 2);
        assert_eq!(segments[2].len(), 2);
    }

    // ============================================================
    // select_segment Tests
    // ============================================================

    #[test]
    fn last_complete_segment_wins() {
        // Two segments both reach nominal expiry; the later one is the
        // window the log closed on.
        let segments = vec![
            Segment {
                start: 0,
                end: 9,
                min_t: 0.0,
                max_t: 895.0,
            },
            Segment {
                start: 10,
                end: 19,
                min_t: 2.0,
                max_t: 890.0,
            },
        ];
        let selection =
            select_segment(&segments, 900.0, &SegmenterConfig::default()).unwrap();

        assert_eq!(selection.index, 1);
        assert_eq!(selection.confidence, SelectionConfidence::Complete);
    }

    #[test]
    fn partial_leader_followed_by_complete_trailer_picks_trailer() {
        // Reset at 450 s; the second run is the real window.
        let segments = vec![
            Segment {
                start: 0,
                end: 4,
                min_t: 0.0,
                max_t: 450.0,
            },
            Segment {
                start: 5,
                end: 20,
                min_t: 5.0,
                max_t: 893.0,
            },
        ];
        let selection =
            select_segment(&segments, 900.0, &SegmenterConfig::default()).unwrap();

        assert_eq!(selection.index, 1);
        assert_eq!(selection.confidence, SelectionConfidence::Complete);
    }

    #[test]
    fn no_complete_segment_falls_back_to_longest_running() {
        let segments = vec![
            Segment {
                start: 0,
                end: 4,
                min_t: 0.0,
                max_t: 600.0,
            },
            Segment {
                start: 5,
                end: 9,
                min_t: 0.0,
                max_t: 300.0,
            },
        ];
        let selection =
            select_segment(&segments, 900.0, &SegmenterConfig::default()).unwrap();

        assert_eq!(selection.index, 0);
        assert_eq!(selection.confidence, SelectionConfidence::Incomplete);
    }

    #[test]
    fn incomplete_tie_prefers_later_segment() {
        let segments = vec![
            Segment {
                start: 0,
                end: 4,
                min_t: 0.0,
                max_t: 500.0,
            },
            Segment {
                start: 5,
                end: 9,
                min_t: 0.0,
                max_t: 500.0,
            },
        ];
        let selection =
            select_segment(&segments, 900.0, &SegmenterConfig::default()).unwrap();

        assert_eq!(selection.index, 1);
        assert_eq!(selection.confidence, SelectionConfidence::Incomplete);
    }

    #[test]
    fn completion_tolerance_is_respected() {
        // 871 s is within 30 s of 900 s nominal.
        let segments = vec![Segment {
            start: 0,
            end: 9,
            min_t: 0.0,
            max_t: 871.0,
        }];
        let selection =
            select_segment(&segments, 900.0, &SegmenterConfig::default()).unwrap();

        assert_eq!(selection.confidence, SelectionConfidence::Complete);
    }

    #[test]
    fn empty_segment_list_selects_nothing() {
        assert!(select_segment(&[], 900.0, &SegmenterConfig::default()).is_none());
    }
}
