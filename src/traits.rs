//! Core traits for streaming accumulators
//!
//! Accumulators in this crate implement [`Sketch`], the exclusive-access view
//! of a mergeable, clearable summary. Shared-access entry points (adding from
//! many threads at once) are inherent methods on each type.

use core::fmt::Debug;

/// Core trait for mergeable streaming summaries
///
/// All methods take `&mut self`, so implementations backed by a lock can
/// reach their state directly without acquiring it.
pub trait Sketch: Clone + Debug {
    /// The type of item this sketch processes
    type Item: ?Sized;

    /// Add an item to the sketch
    fn update(&mut self, item: &Self::Item);

    /// Merge another sketch into this one, as if this sketch had seen the
    /// other's items along with its own
    fn merge(&mut self, other: &Self);

    /// Reset sketch to empty state
    fn clear(&mut self);

    /// Memory usage in bytes
    fn size_bytes(&self) -> usize;

    /// Number of items processed
    fn count(&self) -> u64;

    /// Check if sketch is empty
    fn is_empty(&self) -> bool {
        self.count() == 0
    }
}
