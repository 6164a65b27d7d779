//! Statistics over a trailing time window
//!
//! A [`RollingStats`] partitions its window into a ring of fixed-width
//! segments, each backed by its own [`StatsAccumulator`]. Window statistics
//! are the combination of every segment, so queries cost O(segments) and
//! memory never depends on how many samples were added.
//!
//! Segments are cleared lazily. Every call first looks at the clock and
//! clears the segments whose slot the cursor has passed since the previous
//! call. Nothing runs in the background: an idle instance keeps its stale
//! segments until it is next touched, at which point it reports an empty
//! window.

use core::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use log::{debug, trace};
use parking_lot::Mutex;

use super::accumulator::{StatsAccumulator, Summary};
use crate::clock::{millis_between, Clock, SystemClock};
use crate::error::ConfigError;
use crate::traits::Sketch;

/// Default window width: five minutes
pub const DEFAULT_WINDOW_WIDTH_MS: u64 = 300_000;

/// Default segment width: five seconds
pub const DEFAULT_SEGMENT_WIDTH_MS: u64 = 5_000;

/// Largest number of segments a ring may be cut into
pub const MAX_SEGMENTS: usize = 1 << 20;

/// How a window is cut into segments
///
/// The number of segments is `window_width / segment_width` rounded to the
/// nearest integer, and at least 1. When the widths do not divide evenly the
/// last segment absorbs the remainder of the window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WindowLayout {
    window_width: u64,
    segment_width: u64,
    num_segments: usize,
}

/// Outcome of one rotation step
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rotation {
    /// Still inside the cursor's segment
    Stay,
    /// Every segment is stale; clear them all and move the cursor
    ClearAll { cursor: usize },
    /// Clear each segment after the old cursor up to and including the new one
    Advance { cursor: usize },
}

impl Rotation {
    /// Indices cleared by this rotation, starting from cursor `from`
    pub fn cleared(self, from: usize, num_segments: usize) -> impl Iterator<Item = usize> {
        let (start, len) = match self {
            Rotation::Stay => (0, 0),
            Rotation::ClearAll { .. } => (0, num_segments),
            Rotation::Advance { cursor } => (
                (from + 1) % num_segments,
                (cursor + num_segments - from - 1) % num_segments + 1,
            ),
        };
        (0..len).map(move |k| (start + k) % num_segments)
    }

    /// The cursor after this rotation, given cursor `from` before it
    pub fn cursor(self, from: usize) -> usize {
        match self {
            Rotation::Stay => from,
            Rotation::ClearAll { cursor } | Rotation::Advance { cursor } => cursor,
        }
    }
}

impl WindowLayout {
    /// Validate the widths (in milliseconds) and derive the segment count
    pub fn new(window_width: u64, segment_width: u64) -> Result<Self, ConfigError> {
        if window_width == 0 {
            return Err(ConfigError::NonPositiveWindow(window_width));
        }
        if segment_width == 0 {
            return Err(ConfigError::NonPositiveSegment(segment_width));
        }
        let ratio = (window_width as f64 / segment_width as f64).round();
        if ratio > MAX_SEGMENTS as f64 {
            return Err(ConfigError::TooManySegments {
                window: window_width,
                segment: segment_width,
                max: MAX_SEGMENTS,
            });
        }
        let num_segments = (ratio as usize).max(1);
        Ok(Self {
            window_width,
            segment_width,
            num_segments,
        })
    }

    /// Window width in milliseconds
    pub fn window_width(&self) -> u64 {
        self.window_width
    }

    /// Segment width in milliseconds
    pub fn segment_width(&self) -> u64 {
        self.segment_width
    }

    /// Number of segments in the ring
    pub fn num_segments(&self) -> usize {
        self.num_segments
    }

    /// Segment that owns the instant `elapsed` milliseconds after the start
    pub fn segment_at(&self, elapsed: u64) -> usize {
        let slot = (elapsed % self.window_width) / self.segment_width;
        (slot as usize).min(self.num_segments - 1)
    }

    /// Decide which segments to clear
    ///
    /// `elapsed_now` and `elapsed_ref` are milliseconds since the start for
    /// this call and the previous one; `cursor` is the segment selected by
    /// the previous call.
    ///
    /// A rotation is triggered when the current instant falls in another
    /// segment, when more than a segment width passed since the previous
    /// call, or when the window wrapped around since then. Once triggered:
    ///
    /// - a single-segment ring is cleared;
    /// - if more than a full window passed, every segment is cleared;
    /// - if the cursor came back to its own segment on a later lap, every
    ///   segment is cleared, otherwise nothing is;
    /// - else the segments from the one after the cursor through the new
    ///   one are cleared.
    pub fn rotate(&self, elapsed_now: u64, elapsed_ref: u64, cursor: usize) -> Rotation {
        let seg_num = self.segment_at(elapsed_now);
        let diff = elapsed_now.saturating_sub(elapsed_ref);
        let wrapped = elapsed_now / self.window_width != elapsed_ref / self.window_width;

        if seg_num == cursor && diff <= self.segment_width && !wrapped {
            Rotation::Stay
        } else if self.num_segments == 1 {
            Rotation::ClearAll { cursor: 0 }
        } else if diff > self.window_width {
            Rotation::ClearAll { cursor: seg_num }
        } else if seg_num == cursor {
            if wrapped {
                Rotation::ClearAll { cursor: seg_num }
            } else {
                Rotation::Stay
            }
        } else {
            Rotation::Advance { cursor: seg_num }
        }
    }
}

#[derive(Debug)]
struct Ring {
    segments: Vec<StatsAccumulator>,
    start_time: DateTime<Utc>,
    ref_time: DateTime<Utc>,
    cursor: usize,
}

impl Ring {
    fn new(num_segments: usize, now: DateTime<Utc>) -> Self {
        Self {
            segments: (0..num_segments)
                .map(|i| StatsAccumulator::with_label(format!("segment-{}", i)))
                .collect(),
            start_time: now,
            ref_time: now,
            cursor: 0,
        }
    }

    /// Bring the cursor up to `now`, clearing segments that aged out
    ///
    /// Segments are reached through `&mut`, so clearing them does not take
    /// their own locks. A clock that steps back is held at `ref_time`.
    fn rotate(&mut self, layout: &WindowLayout, now: DateTime<Utc>) {
        let now = now.max(self.ref_time);
        let elapsed_now = millis_between(now, self.start_time);
        let elapsed_ref = millis_between(self.ref_time, self.start_time);
        let rotation = layout.rotate(elapsed_now, elapsed_ref, self.cursor);

        if rotation != Rotation::Stay {
            trace!(
                "rotating from segment {} at +{}ms: {:?}",
                self.cursor,
                elapsed_now,
                rotation
            );
            for i in rotation.cleared(self.cursor, layout.num_segments) {
                Sketch::clear(&mut self.segments[i]);
            }
            self.cursor = rotation.cursor(self.cursor);
        }
        self.ref_time = now;
    }
}

/// Cumulative and trailing-window statistics of a sample stream
///
/// Every call serializes on a single per-instance lock held across the
/// clock read, the rotation and the access to the segments, so `add` and
/// [`window_stats`](Self::window_stats) never observe each other half-done.
///
/// # Example
///
/// ```
/// use rollstats::statistics::RollingStats;
///
/// // five minute window in five second segments
/// let stats = RollingStats::new(300_000, 5_000).unwrap();
/// assert_eq!(stats.num_segments(), 60);
///
/// stats.add(12.0);
/// stats.add_all([8.0, 10.0]);
///
/// let window = stats.window_stats();
/// assert_eq!(window.n(), 3);
/// assert_eq!(window.mean(), 10.0);
/// assert_eq!(stats.cumulative_stats().n(), 3);
/// ```
#[derive(Debug)]
pub struct RollingStats<C: Clock = SystemClock> {
    layout: WindowLayout,
    clock: C,
    cumulative: StatsAccumulator,
    ring: Mutex<Ring>,
}

impl Default for RollingStats<SystemClock> {
    fn default() -> Self {
        let layout = WindowLayout {
            window_width: DEFAULT_WINDOW_WIDTH_MS,
            segment_width: DEFAULT_SEGMENT_WIDTH_MS,
            num_segments: (DEFAULT_WINDOW_WIDTH_MS / DEFAULT_SEGMENT_WIDTH_MS) as usize,
        };
        Self::from_layout(layout, SystemClock)
    }
}

impl RollingStats<SystemClock> {
    /// Create rolling statistics driven by the system clock
    ///
    /// Both widths are in milliseconds and must be positive.
    pub fn new(window_width: u64, segment_width: u64) -> Result<Self, ConfigError> {
        Self::with_clock(window_width, segment_width, SystemClock)
    }
}

impl<C: Clock> RollingStats<C> {
    /// Create rolling statistics driven by `clock`
    pub fn with_clock(window_width: u64, segment_width: u64, clock: C) -> Result<Self, ConfigError> {
        Ok(Self::from_layout(
            WindowLayout::new(window_width, segment_width)?,
            clock,
        ))
    }

    fn from_layout(layout: WindowLayout, clock: C) -> Self {
        debug!(
            "rolling stats: {}ms window in {} segments of {}ms",
            layout.window_width, layout.num_segments, layout.segment_width
        );
        let now = clock.now();
        Self {
            layout,
            cumulative: StatsAccumulator::with_label("cumulative"),
            ring: Mutex::new(Ring::new(layout.num_segments, now)),
            clock,
        }
    }

    /// Segmentation of the window
    pub fn layout(&self) -> WindowLayout {
        self.layout
    }

    /// Window width in milliseconds
    pub fn window_width(&self) -> u64 {
        self.layout.window_width
    }

    /// Segment width in milliseconds
    pub fn segment_width(&self) -> u64 {
        self.layout.segment_width
    }

    /// Number of segments in the ring
    pub fn num_segments(&self) -> usize {
        self.layout.num_segments
    }

    /// Construction (or last reset) time
    pub fn start_time(&self) -> DateTime<Utc> {
        self.ring.lock().start_time
    }

    /// Time of the last rotation
    pub fn ref_time(&self) -> DateTime<Utc> {
        self.ring.lock().ref_time
    }

    /// Add a sample, returning the index of the segment it went into
    pub fn add(&self, value: f64) -> usize {
        self.add_all([value])
    }

    /// Add several samples, returning the index of the segment they went into
    pub fn add_all<I>(&self, values: I) -> usize
    where
        I: IntoIterator<Item = f64>,
    {
        let mut ring = self.ring.lock();
        ring.rotate(&self.layout, self.clock.now());
        let cursor = ring.cursor;
        let segment = &mut ring.segments[cursor];
        for value in values {
            segment.update(&value);
            self.cumulative.add(value);
        }
        cursor
    }

    /// Combined statistics of the trailing window
    ///
    /// The result is a fresh snapshot labeled with the reference time and
    /// the window width; later samples do not show up in it.
    pub fn window_stats(&self) -> StatsAccumulator {
        let mut ring = self.ring.lock();
        ring.rotate(&self.layout, self.clock.now());
        StatsAccumulator::combine(self.label_at(ring.ref_time), &ring.segments)
    }

    /// All-time statistics since construction or the last reset
    ///
    /// This is the live accumulator, not a snapshot.
    pub fn cumulative_stats(&self) -> &StatsAccumulator {
        &self.cumulative
    }

    /// Whether the window holds any samples, along with its statistics
    pub fn has_window_activity(&self) -> (bool, StatsAccumulator) {
        let stats = self.window_stats();
        (stats.n() > 0, stats)
    }

    /// Segment the current instant belongs to, after rotating
    pub fn current_segment(&self) -> usize {
        let mut ring = self.ring.lock();
        ring.rotate(&self.layout, self.clock.now());
        ring.cursor
    }

    /// Segment selected by the last rotation, without rotating
    pub fn last_segment(&self) -> usize {
        self.ring.lock().cursor
    }

    /// Label used for window snapshots as of the last rotation
    pub fn current_label(&self) -> String {
        self.label_at(self.ring.lock().ref_time)
    }

    fn label_at(&self, ref_time: DateTime<Utc>) -> String {
        format!(
            "Window-{}-{}ms",
            ref_time.to_rfc3339_opts(SecondsFormat::Millis, true),
            self.layout.window_width
        )
    }

    /// Forget everything and restart the timeline at the current instant
    pub fn reset(&self) {
        let mut ring = self.ring.lock();
        let now = self.clock.now();
        debug!("resetting rolling stats at {}", now);
        ring.start_time = now;
        ring.ref_time = now;
        ring.cursor = 0;
        for segment in ring.segments.iter_mut() {
            Sketch::clear(segment);
        }
        self.cumulative.clear("cumulative");
    }

    /// Cumulative and window statistics with throughput figures
    pub fn summary_info(&self) -> RollingSummary {
        let window = self.window_stats().summary();
        RollingSummary {
            now: self.clock.now(),
            cumulative: CumulativeInfo {
                since: self.start_time(),
                activity: Activity::from_summary(self.cumulative.summary()),
            },
            window: WindowInfo {
                width_millis: self.layout.window_width,
                activity: Activity::from_summary(window),
            },
        }
    }
}

impl<C: Clock> fmt::Display for RollingStats<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.summary_info(), f)
    }
}

/// Snapshot of a [`RollingStats`], as produced by
/// [`summary_info`](RollingStats::summary_info)
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RollingSummary {
    pub now: DateTime<Utc>,
    pub cumulative: CumulativeInfo,
    pub window: WindowInfo,
}

/// All-time part of a [`RollingSummary`]
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CumulativeInfo {
    pub since: DateTime<Utc>,
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub activity: Activity,
}

/// Trailing-window part of a [`RollingSummary`]
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WindowInfo {
    pub width_millis: u64,
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub activity: Activity,
}

/// Whether a span of time saw any samples
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(tag = "status", rename_all = "lowercase")
)]
pub enum Activity {
    Inactive,
    Active {
        stats: Summary,
        millis_per_item: Option<f64>,
        items_per_milli: Option<f64>,
    },
}

impl Activity {
    fn from_summary(stats: Summary) -> Self {
        if stats.n == 0 {
            return Activity::Inactive;
        }
        Activity::Active {
            millis_per_item: millis_per_item(&stats),
            items_per_milli: items_per_milli(&stats),
            stats,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Activity::Active { .. })
    }
}

impl fmt::Display for RollingSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} cumulative since {}: {}; window of {}ms: {}",
            self.now.to_rfc3339_opts(SecondsFormat::Millis, true),
            self.cumulative.since.to_rfc3339_opts(SecondsFormat::Millis, true),
            self.cumulative.activity,
            self.window.width_millis,
            self.window.activity
        )
    }
}

impl fmt::Display for Activity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Activity::Inactive => f.write_str("inactive"),
            Activity::Active {
                stats,
                items_per_milli: Some(rate),
                ..
            } => write!(f, "{}, {} items/ms", stats, rate),
            Activity::Active { stats, .. } => fmt::Display::fmt(stats, f),
        }
    }
}

/// Average milliseconds per item, for stats of per-item timings
pub fn millis_per_item(stats: &Summary) -> Option<f64> {
    (stats.n > 0).then_some(stats.mean)
}

/// Average items per millisecond, for stats of per-item timings
pub fn items_per_milli(stats: &Summary) -> Option<f64> {
    (stats.mean > 0.0).then(|| 1.0 / stats.mean)
}
