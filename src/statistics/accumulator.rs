//! Lock-protected running statistics (count, min, max, mean, standard deviation)
//!
//! Keeps five aggregates (n, min, max, sum, sum of squares) and derives the
//! rest on demand, so memory is O(1) regardless of sample volume. Instances
//! can be shared between threads and merged with each other.

use core::fmt;

use parking_lot::Mutex;

use crate::traits::Sketch;

/// The raw aggregates behind a [`StatsAccumulator`]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct Moments {
    n: u64,
    minimum: f64,
    maximum: f64,
    sum: f64,
    sos: f64,
}

impl Moments {
    #[inline]
    fn push(&mut self, value: f64) {
        if self.n == 0 {
            self.minimum = value;
            self.maximum = value;
        } else {
            if value < self.minimum {
                self.minimum = value;
            }
            if value > self.maximum {
                self.maximum = value;
            }
        }
        self.n += 1;
        self.sum += value;
        self.sos += value * value;
    }

    fn absorb(&mut self, other: &Moments) {
        if other.n == 0 {
            return;
        }
        if self.n == 0 {
            self.minimum = other.minimum;
            self.maximum = other.maximum;
        } else {
            self.minimum = self.minimum.min(other.minimum);
            self.maximum = self.maximum.max(other.maximum);
        }
        self.n += other.n;
        self.sum += other.sum;
        self.sos += other.sos;
    }

    fn mean(&self) -> f64 {
        if self.n == 0 {
            0.0
        } else {
            self.sum / self.n as f64
        }
    }

    fn variance(&self) -> f64 {
        if self.n < 2 {
            return 0.0;
        }
        let n = self.n as f64;
        // Rounding can push a near-zero result below zero
        ((self.sos - self.sum * self.sum / n) / (n - 1.0)).max(0.0)
    }

    fn stddev(&self) -> f64 {
        self.variance().sqrt()
    }

    /// Rebuild aggregates from externalized summary statistics
    fn from_summary(summary: &Summary) -> Self {
        if summary.n == 0 {
            return Self::default();
        }
        let n = summary.n as f64;
        let sum = summary.mean * n;
        Self {
            n: summary.n,
            minimum: summary.minimum,
            maximum: summary.maximum,
            sum,
            sos: summary.stddev * summary.stddev * (n - 1.0) + sum * sum / n,
        }
    }
}

#[derive(Clone, Debug, Default)]
struct State {
    label: String,
    moments: Moments,
}

impl State {
    fn summary(&self) -> Summary {
        Summary {
            label: self.label.clone(),
            n: self.moments.n,
            minimum: self.moments.minimum,
            maximum: self.moments.maximum,
            mean: self.moments.mean(),
            stddev: self.moments.stddev(),
        }
    }
}

/// Immutable snapshot of a [`StatsAccumulator`]
///
/// This flat record is the externalized form of an accumulator and the only
/// form accepted back by [`StatsAccumulator::from_summary`].
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct Summary {
    pub label: String,
    pub n: u64,
    pub minimum: f64,
    pub maximum: f64,
    pub mean: f64,
    pub stddev: f64,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: n={} min={} max={} mean={} stddev={}",
            self.label, self.n, self.minimum, self.maximum, self.mean, self.stddev
        )
    }
}

/// Thread-safe, low-memory accumulator of numeric samples
///
/// Every mutating call is serialized by a per-instance lock, so a single
/// accumulator can be fed from many threads through a shared reference.
/// Individual accessors each take the lock on their own; use
/// [`summary`](Self::summary) for a consistent view of several fields.
///
/// An empty accumulator reports 0 for every statistic, and the variance is
/// the unbiased sample variance (0 with fewer than two samples).
///
/// # Example
///
/// ```
/// use rollstats::statistics::StatsAccumulator;
///
/// let stats = StatsAccumulator::with_label("latency");
/// stats.add_all([1.0, 2.0, 3.0]);
///
/// assert_eq!(stats.n(), 3);
/// assert_eq!(stats.mean(), 2.0);
/// assert_eq!(stats.variance(), 1.0);
/// assert_eq!(stats.minimum(), 1.0);
/// assert_eq!(stats.maximum(), 3.0);
/// ```
///
/// # Merging
///
/// ```
/// use rollstats::statistics::StatsAccumulator;
///
/// let a = StatsAccumulator::new();
/// let b = StatsAccumulator::new();
/// a.add_all([1.0, 2.0, 3.0]);
/// b.add_all([4.0, 5.0, 6.0]);
///
/// let both = StatsAccumulator::combine("both", [&a, &b]);
/// assert_eq!(both.n(), 6);
/// assert!((both.mean() - 3.5).abs() < 1e-12);
/// ```
#[derive(Debug, Default)]
pub struct StatsAccumulator {
    state: Mutex<State>,
}

impl Clone for StatsAccumulator {
    fn clone(&self) -> Self {
        Self {
            state: Mutex::new(self.state.lock().clone()),
        }
    }
}

impl StatsAccumulator {
    /// Create an empty, unlabeled accumulator
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty accumulator with the given label
    pub fn with_label(label: impl Into<String>) -> Self {
        Self {
            state: Mutex::new(State {
                label: label.into(),
                moments: Moments::default(),
            }),
        }
    }

    /// Create an accumulator approximating the one `summary` was taken from
    ///
    /// See [`initialize_from_summary`](Self::initialize_from_summary).
    pub fn from_summary(summary: &Summary) -> Self {
        let stats = Self::new();
        stats.initialize_from_summary(summary);
        stats
    }

    fn from_moments(label: String, moments: Moments) -> Self {
        Self {
            state: Mutex::new(State { label, moments }),
        }
    }

    /// Informational label
    pub fn label(&self) -> String {
        self.state.lock().label.clone()
    }

    /// Replace the label, keeping the accumulated data
    pub fn set_label(&self, label: impl Into<String>) {
        self.state.lock().label = label.into();
    }

    /// Add a single sample
    ///
    /// No validation is performed: NaN or infinite samples propagate into
    /// the statistics.
    pub fn add(&self, value: f64) {
        self.state.lock().moments.push(value);
    }

    /// Add several samples under one acquisition of the lock
    pub fn add_all<I>(&self, values: I)
    where
        I: IntoIterator<Item = f64>,
    {
        let mut state = self.state.lock();
        for value in values {
            state.moments.push(value);
        }
    }

    /// Number of samples
    pub fn n(&self) -> u64 {
        self.state.lock().moments.n
    }

    /// Smallest sample, or 0 when empty
    pub fn minimum(&self) -> f64 {
        self.state.lock().moments.minimum
    }

    /// Largest sample, or 0 when empty
    pub fn maximum(&self) -> f64 {
        self.state.lock().moments.maximum
    }

    /// Sum of all samples
    pub fn sum(&self) -> f64 {
        self.state.lock().moments.sum
    }

    /// Sum of the squares of all samples
    pub fn sum_of_squares(&self) -> f64 {
        self.state.lock().moments.sos
    }

    /// Arithmetic mean, or 0 when empty
    pub fn mean(&self) -> f64 {
        self.state.lock().moments.mean()
    }

    /// Unbiased sample variance, or 0 with fewer than two samples
    ///
    /// Computed in one pass from the sum and sum of squares. This loses
    /// precision when the spread is tiny relative to the magnitude of the
    /// samples.
    pub fn variance(&self) -> f64 {
        self.state.lock().moments.variance()
    }

    /// Square root of [`variance`](Self::variance)
    pub fn standard_deviation(&self) -> f64 {
        self.state.lock().moments.stddev()
    }

    /// Fold another accumulator's data into this one
    ///
    /// Afterwards this accumulator reports statistics as if it had seen the
    /// other's samples along with its own. Passing `None` or an empty
    /// accumulator is a no-op. The other accumulator is read under its own
    /// lock before this one is taken, so incorporating an accumulator into
    /// itself doubles its data instead of deadlocking.
    pub fn incorporate<'a>(&self, other: impl Into<Option<&'a StatsAccumulator>>) {
        let Some(other) = other.into() else {
            return;
        };
        let theirs = other.moments();
        self.state.lock().moments.absorb(&theirs);
    }

    /// Build a new accumulator holding the data of all of `stats`
    ///
    /// Equivalent to incorporating each of them in turn into a fresh
    /// accumulator labeled `label`.
    pub fn combine<'a, I>(label: impl Into<String>, stats: I) -> StatsAccumulator
    where
        I: IntoIterator<Item = &'a StatsAccumulator>,
    {
        let mut moments = Moments::default();
        for s in stats {
            moments.absorb(&s.moments());
        }
        Self::from_moments(label.into(), moments)
    }

    /// Reset to the empty state under a new label
    pub fn clear(&self, label: impl Into<String>) {
        let mut state = self.state.lock();
        state.label = label.into();
        state.moments = Moments::default();
    }

    /// Replace the contents with aggregates re-derived from `summary`
    ///
    /// The sum is `mean * n` and the sum of squares inverts the variance
    /// formula. The result is lossy: the samples themselves cannot be
    /// recovered, but taking a summary of the rebuilt accumulator yields
    /// the original summary up to rounding.
    pub fn initialize_from_summary(&self, summary: &Summary) {
        let mut state = self.state.lock();
        state.label = summary.label.clone();
        state.moments = Moments::from_summary(summary);
    }

    /// Consistent snapshot of the label and all statistics
    pub fn summary(&self) -> Summary {
        self.state.lock().summary()
    }

    fn moments(&self) -> Moments {
        self.state.lock().moments
    }
}

impl fmt::Display for StatsAccumulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.summary(), f)
    }
}

impl Sketch for StatsAccumulator {
    type Item = f64;

    fn update(&mut self, item: &Self::Item) {
        self.state.get_mut().moments.push(*item);
    }

    fn merge(&mut self, other: &Self) {
        let theirs = other.moments();
        self.state.get_mut().moments.absorb(&theirs);
    }

    /// Reset the data, keeping the label
    fn clear(&mut self) {
        self.state.get_mut().moments = Moments::default();
    }

    fn size_bytes(&self) -> usize {
        core::mem::size_of::<Self>() + self.state.lock().label.capacity()
    }

    fn count(&self) -> u64 {
        self.n()
    }
}
