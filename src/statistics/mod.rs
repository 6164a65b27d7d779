//! Statistical summaries for streaming data
//!
//! This module provides accumulators that summarize a stream in a single
//! pass with constant memory, both over all time and over a trailing window.
//!
//! # Example
//!
//! ```
//! use rollstats::statistics::RollingStats;
//!
//! // one minute window, one second segments
//! let latency = RollingStats::new(60_000, 1_000).unwrap();
//!
//! for millis in [12.0, 15.0, 9.0] {
//!     latency.add(millis);
//! }
//!
//! let window = latency.window_stats();
//! println!("Mean: {}", window.mean());
//! println!("Stddev: {}", window.standard_deviation());
//! println!("All time: {}", latency.cumulative_stats());
//! ```

mod accumulator;
mod rolling;

pub use accumulator::{StatsAccumulator, Summary};
pub use rolling::{
    items_per_milli, millis_per_item, Activity, CumulativeInfo, RollingStats, RollingSummary,
    Rotation, WindowInfo, WindowLayout, DEFAULT_SEGMENT_WIDTH_MS, DEFAULT_WINDOW_WIDTH_MS,
};
