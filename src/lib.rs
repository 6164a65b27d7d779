//! # Rollstats
//!
//! Thread-safe streaming statistics for instrumenting request-processing code.
//!
//! Rollstats tracks numeric sample streams (timings, counts) and summarizes
//! them both cumulatively and over a trailing time window, without storing
//! the samples themselves.
//!
//! ## Features
//!
//! - **Running Statistics**: count, min, max, mean, variance and standard
//!   deviation with [`StatsAccumulator`]
//! - **Rolling Windows**: statistics over the last W milliseconds with
//!   [`RollingStats`], in O(segments) memory
//! - **Full Mergeability**: accumulators built independently can be combined
//! - **Lazy Rotation**: no background threads; stale segments are cleared by
//!   the next call that looks at them
//! - **Injectable Clocks**: drive windows from [`ManualClock`](clock::ManualClock)
//!   in tests
//!
//! ## Quick Start
//!
//! ```rust
//! use rollstats::prelude::*;
//!
//! let request_millis = RollingStats::new(60_000, 1_000).unwrap();
//! for millis in [12.0, 15.0, 9.0] {
//!     request_millis.add(millis);
//! }
//!
//! let (active, window) = request_millis.has_window_activity();
//! assert!(active);
//! println!("last minute: {}", window);
//! ```
//!
//! ## Merging
//!
//! ```rust
//! use rollstats::StatsAccumulator;
//!
//! let worker1 = StatsAccumulator::with_label("worker1");
//! let worker2 = StatsAccumulator::with_label("worker2");
//!
//! worker1.add_all([1.0, 2.0, 3.0]);
//! worker2.add_all([4.0, 5.0, 6.0]);
//!
//! let all = StatsAccumulator::combine("all", [&worker1, &worker2]);
//! assert_eq!(all.n(), 6);
//! ```
//!
//! ## Feature Flags
//!
//! - `serde`: Serialize and deserialize summary records

pub mod clock;
pub mod error;
pub mod statistics;
pub mod traits;

pub mod prelude {
    pub use crate::clock::{Clock, ManualClock, SystemClock};
    pub use crate::error::ConfigError;
    pub use crate::statistics::{RollingStats, StatsAccumulator, Summary};
    pub use crate::traits::*;
}

pub use error::ConfigError;
pub use statistics::{RollingStats, StatsAccumulator, Summary};
