//! Error types
//!
//! Numeric edge cases (empty or single-sample accumulators) never fail; they
//! report 0. The only failure is an invalid rolling-window configuration,
//! which is rejected at construction.

use thiserror::Error;

/// Invalid [`RollingStats`](crate::statistics::RollingStats) configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The window width must be at least one millisecond
    #[error("window width must be positive, got {0} ms")]
    NonPositiveWindow(u64),
    /// The segment width must be at least one millisecond
    #[error("segment width must be positive, got {0} ms")]
    NonPositiveSegment(u64),
    /// The window would need more segments than a ring may hold
    #[error("window of {window} ms cut into {segment} ms segments exceeds {max} segments")]
    TooManySegments { window: u64, segment: u64, max: usize },
}
