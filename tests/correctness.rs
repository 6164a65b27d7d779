//! Correctness and invariant tests for rollstats
//!
//! These tests verify merge semantics, window aging and thread safety. They
//! complement the unit tests in each module by focusing on properties that
//! must always hold.
//!
//! Run with: cargo test --test correctness --all-features

use std::sync::Arc;
use std::thread;

use proptest::prelude::*;

use rollstats::clock::{Clock, ManualClock};
use rollstats::statistics::{RollingStats, StatsAccumulator, Summary};
use rollstats::traits::Sketch;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn built(label: &str, values: &[f64]) -> StatsAccumulator {
    let stats = StatsAccumulator::with_label(label);
    stats.add_all(values.iter().copied());
    stats
}

fn manual(window: u64, segment: u64) -> (RollingStats<ManualClock>, ManualClock) {
    init_logging();
    let clock = ManualClock::new();
    let stats = RollingStats::with_clock(window, segment, clock.clone()).unwrap();
    (stats, clock)
}

// ============================================================================
// Stats Accumulator
// ============================================================================

mod stats_accumulator {
    use super::*;

    #[test]
    fn cumulative_matches_true_statistics() {
        let data = [12.5, 3.25, 8.0, 41.0, 0.5, 17.75];
        let stats = built("t", &data);

        let mean = data.iter().sum::<f64>() / data.len() as f64;
        assert_eq!(stats.n(), data.len() as u64);
        assert_eq!(stats.minimum(), 0.5);
        assert_eq!(stats.maximum(), 41.0);
        assert!(
            (stats.mean() - mean).abs() < 1e-10,
            "mean: {} expected: {}",
            stats.mean(),
            mean
        );
    }

    #[test]
    fn combine_equals_single_accumulator() {
        let a = built("a", &[1.0, 2.0, 3.0]);
        let b = built("b", &[4.0, 5.0, 6.0]);
        let direct = built("ab", &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);

        let combined = StatsAccumulator::combine("ab", [&a, &b]);

        assert_eq!(combined.n(), 6);
        assert_eq!(combined.minimum(), 1.0);
        assert_eq!(combined.maximum(), 6.0);
        assert_eq!(combined.mean(), 3.5);
        assert!((combined.standard_deviation() - 1.8708).abs() < 1e-4);
        assert_eq!(combined.summary(), direct.summary());
    }

    #[test]
    fn combine_matches_pairwise_incorporate() {
        let a = built("a", &[1.5, 3.7, 2.1]);
        let b = built("b", &[8.9, 4.3]);
        let c = built("c", &[6.2, 0.5, 9.1]);

        let pairwise = StatsAccumulator::with_label("abc");
        pairwise.incorporate(&a);
        pairwise.incorporate(&b);
        pairwise.incorporate(&c);

        let combined = StatsAccumulator::combine("abc", [&a, &b, &c]);

        assert_eq!(combined.summary(), pairwise.summary());
    }

    #[test]
    fn incorporate_is_commutative() {
        let a = built("x", &[1.0, 3.0, 5.0, 7.0, 9.0]);
        let b = built("x", &[2.0, 4.0, 6.0, 8.0, 10.0]);

        let ab = a.clone();
        ab.incorporate(&b);
        let ba = b.clone();
        ba.incorporate(&a);

        assert_eq!(ab.n(), ba.n());
        assert!(
            (ab.variance() - ba.variance()).abs() < 1e-10,
            "variance: {} vs {}",
            ab.variance(),
            ba.variance()
        );
        assert_eq!(ab.minimum(), ba.minimum());
        assert_eq!(ab.maximum(), ba.maximum());
    }

    #[test]
    fn incorporate_is_associative() {
        let a = built("a", &[1.0, 2.0, 3.0]);
        let b = built("b", &[4.0, 5.0, 6.0]);
        let c = built("c", &[7.0, 8.0, 9.0]);

        let ab_c = a.clone();
        ab_c.incorporate(&b);
        ab_c.incorporate(&c);

        let bc = b.clone();
        bc.incorporate(&c);
        let a_bc = a.clone();
        a_bc.incorporate(&bc);

        assert_eq!(ab_c.n(), a_bc.n());
        assert!((ab_c.mean() - a_bc.mean()).abs() < 1e-10);
        assert!((ab_c.variance() - a_bc.variance()).abs() < 1e-10);
    }

    #[test]
    fn incorporate_into_empty() {
        let empty = StatsAccumulator::new();
        empty.incorporate(&built("p", &[1.0, 2.0, 3.0, 4.0, 5.0]));

        assert_eq!(empty.n(), 5);
        assert_eq!(empty.mean(), 3.0);
        assert_eq!(empty.minimum(), 1.0);
        assert_eq!(empty.maximum(), 5.0);
        assert_eq!(empty.sum(), 15.0);
        assert!((empty.variance() - 2.5).abs() < 1e-10);
    }

    #[test]
    fn incorporate_empty_into_empty() {
        let a = StatsAccumulator::new();
        a.incorporate(&StatsAccumulator::new());

        assert!(a.is_empty());
        assert_eq!(a.summary(), Summary::default());
    }

    #[test]
    fn summary_round_trip() {
        let original = built("rt", &[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        let summary = original.summary();

        let rebuilt = StatsAccumulator::from_summary(&summary);
        let again = rebuilt.summary();

        assert_eq!(again.label, summary.label);
        assert_eq!(again.n, summary.n);
        assert_eq!(again.minimum, summary.minimum);
        assert_eq!(again.maximum, summary.maximum);
        assert!((again.mean - summary.mean).abs() < 1e-10);
        assert!((again.stddev - summary.stddev).abs() < 1e-10);
    }

    #[test]
    fn rebuilt_accumulator_keeps_accumulating() {
        let rebuilt = StatsAccumulator::from_summary(&built("r", &[1.0, 2.0, 3.0]).summary());
        rebuilt.add(4.0);

        let direct = built("r", &[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(rebuilt.n(), 4);
        assert!((rebuilt.mean() - direct.mean()).abs() < 1e-10);
        assert!((rebuilt.variance() - direct.variance()).abs() < 1e-10);
        assert_eq!(rebuilt.maximum(), 4.0);
    }

    #[test]
    fn nan_is_not_filtered() {
        let stats = built("nan", &[1.0, f64::NAN]);

        assert_eq!(stats.n(), 2);
        assert!(stats.mean().is_nan());
    }

    #[test]
    fn concurrent_adds_are_all_counted() {
        let stats = StatsAccumulator::with_label("shared");

        thread::scope(|s| {
            for t in 0..8 {
                let stats = &stats;
                s.spawn(move || {
                    for i in 0..1_000 {
                        stats.add((t * 1_000 + i) as f64);
                    }
                });
            }
        });

        assert_eq!(stats.n(), 8_000);
        assert_eq!(stats.minimum(), 0.0);
        assert_eq!(stats.maximum(), 7_999.0);
        assert!((stats.mean() - 3_999.5).abs() < 1e-9);
    }
}

// ============================================================================
// Rolling Stats
// ============================================================================

mod rolling_stats {
    use super::*;

    #[test]
    fn two_segments_age_out() {
        let (stats, clock) = manual(100, 50);
        assert_eq!(stats.num_segments(), 2);

        let reference = StatsAccumulator::new();
        for v in [10.0, 250.0, 42.0, 7.5] {
            assert_eq!(stats.add(v), 0);
            reference.add(v);
            clock.advance(10);
        }

        let window = stats.window_stats();
        assert_eq!(window.n(), reference.n());
        assert!((window.mean() - reference.mean()).abs() < 0.005);

        // segment 1 passes without samples
        clock.set(60);
        assert_eq!(stats.current_segment(), 1);
        assert_eq!(stats.window_stats().n(), 4);

        // back to segment 0: its old samples are gone
        clock.set(110);
        assert_eq!(stats.current_segment(), 0);
        assert_eq!(stats.window_stats().n(), 0);

        clock.set(160);
        assert_eq!(stats.window_stats().n(), 0);

        let cumulative = stats.cumulative_stats();
        assert_eq!(cumulative.n(), reference.n());
        assert!((cumulative.mean() - reference.mean()).abs() < 0.005);
    }

    #[test]
    fn single_segment_clears_every_lap() {
        let (stats, clock) = manual(100, 100);
        assert_eq!(stats.num_segments(), 1);

        for lap in 0..5u64 {
            for step in 0..10 {
                clock.set((lap * 100 + step * 10) as i64);
                stats.add(1.0);
                assert!(
                    stats.window_stats().n() <= 10,
                    "window kept more than one lap: {}",
                    stats.window_stats().n()
                );
            }
            assert_eq!(stats.window_stats().n(), 10);
        }

        assert_eq!(stats.cumulative_stats().n(), 50);
    }

    #[test]
    fn current_segment_samples_survive_rotation() {
        let (stats, clock) = manual(100, 25);

        clock.set(30);
        assert_eq!(stats.add(1.0), 1);
        clock.set(40);
        assert_eq!(stats.add(2.0), 1);
        // query from the same segment
        clock.set(49);
        assert_eq!(stats.window_stats().n(), 2);

        // rotate into segment 2 and 3, segment 1 stays in the window
        clock.set(60);
        assert_eq!(stats.add(3.0), 2);
        clock.set(80);
        assert_eq!(stats.window_stats().n(), 3);
    }

    #[test]
    fn clearing_is_idempotent() {
        let (stats, clock) = manual(100, 25);
        stats.add(1.0);

        clock.set(1_000);
        assert_eq!(stats.window_stats().n(), 0);
        clock.set(1_001);
        assert_eq!(stats.window_stats().n(), 0);
        clock.set(5_000);
        assert_eq!(stats.window_stats().n(), 0);

        stats.add(9.0);
        assert_eq!(stats.window_stats().n(), 1);
    }

    #[test]
    fn frequent_polling_does_not_drop_window() {
        let (stats, clock) = manual(1_000, 100);

        for ms in 0..1_000 {
            clock.set(ms);
            stats.add(1.0);
            let _ = stats.window_stats();
        }

        // every sample is younger than the window
        assert_eq!(stats.window_stats().n(), 1_000);

        // the first segment rolls over
        clock.set(1_000);
        assert_eq!(stats.window_stats().n(), 900);
    }

    #[test]
    fn shared_clock_handle() {
        init_logging();
        let clock = Arc::new(ManualClock::new());
        let dynamic: Arc<dyn Clock> = clock.clone();
        let stats = RollingStats::with_clock(100, 50, dynamic).unwrap();

        stats.add(1.0);
        clock.advance(500);

        assert_eq!(stats.window_stats().n(), 0);
    }

    #[test]
    fn invalid_configuration_is_rejected() {
        assert!(RollingStats::new(0, 10).is_err());
        assert!(RollingStats::new(10, 0).is_err());
        assert!(RollingStats::new(10, 10).is_ok());
    }

    #[test]
    fn concurrent_add_and_query() {
        let (stats, clock) = manual(1_000, 100);

        thread::scope(|s| {
            for t in 0..4 {
                let stats = &stats;
                s.spawn(move || {
                    for i in 0..500 {
                        stats.add((t + i) as f64);
                    }
                });
            }
            s.spawn(|| {
                for _ in 0..200 {
                    let window = stats.window_stats();
                    assert!(window.n() <= stats.cumulative_stats().n());
                }
            });
            s.spawn(|| {
                for _ in 0..50 {
                    clock.advance(1);
                }
            });
        });

        assert_eq!(stats.cumulative_stats().n(), 2_000);
        assert_eq!(stats.window_stats().n(), 2_000);
    }

    #[test]
    fn cumulative_count_is_monotone() {
        let (stats, clock) = manual(100, 10);
        let mut last = 0;

        for i in 0..300 {
            clock.advance(7);
            stats.add(i as f64);
            let n = stats.cumulative_stats().n();
            assert!(n > last);
            last = n;
        }
    }

    #[test]
    fn system_clock_window_holds_recent_samples() {
        init_logging();
        let stats = RollingStats::new(60_000, 1_000).unwrap();
        stats.add_all([1.0, 2.0, 3.0]);

        let (active, window) = stats.has_window_activity();
        assert!(active);
        assert_eq!(window.n(), 3);
        assert!(window.label().starts_with("Window-"));
    }
}

// ============================================================================
// Properties
// ============================================================================

mod properties {
    use super::*;

    fn finite_vec(max_len: usize) -> impl Strategy<Value = Vec<f64>> {
        proptest::collection::vec(-1e6..1e6f64, 0..=max_len)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn combine_equals_union(a in finite_vec(50), b in finite_vec(50)) {
            let sa = built("u", &a);
            let sb = built("u", &b);
            let union: Vec<f64> = a.iter().chain(b.iter()).copied().collect();
            let direct = built("u", &union);

            let combined = StatsAccumulator::combine("u", [&sa, &sb]);

            prop_assert_eq!(combined.n(), direct.n());
            prop_assert_eq!(combined.minimum(), direct.minimum());
            prop_assert_eq!(combined.maximum(), direct.maximum());
            prop_assert!((combined.mean() - direct.mean()).abs() < 1e-6);
            prop_assert!(
                (combined.variance() - direct.variance()).abs()
                    <= 1e-9 * (1.0 + direct.sum_of_squares())
            );
        }

        #[test]
        fn min_max_bound_every_sample(data in finite_vec(100)) {
            let stats = built("b", &data);
            for &v in &data {
                prop_assert!(stats.minimum() <= v && v <= stats.maximum());
            }
            prop_assert!(stats.variance() >= 0.0);
        }

        #[test]
        fn summary_round_trips(data in finite_vec(100)) {
            let original = built("s", &data);
            let summary = original.summary();
            let again = StatsAccumulator::from_summary(&summary).summary();

            prop_assert_eq!(again.n, summary.n);
            prop_assert_eq!(again.minimum, summary.minimum);
            prop_assert_eq!(again.maximum, summary.maximum);
            prop_assert!((again.mean - summary.mean).abs() <= 1e-9 * (1.0 + summary.mean.abs()));
            prop_assert!(
                (again.stddev.powi(2) - summary.stddev.powi(2)).abs()
                    <= 1e-9 * (1.0 + original.sum_of_squares())
            );
        }

        /// With segments dividing the window evenly, the window holds exactly
        /// the samples whose segment has not been lapped by the current one.
        #[test]
        fn window_matches_segment_model(
            steps in proptest::collection::vec((0i64..60, -1e3..1e3f64), 1..200)
        ) {
            const WINDOW: i64 = 100;
            const SEGMENT: i64 = 25;
            let (stats, clock) = manual(WINDOW as u64, SEGMENT as u64);
            let mut times = Vec::new();

            for (dt, value) in steps {
                clock.advance(dt);
                let now = clock.elapsed();
                stats.add(value);
                times.push(now);

                let slot = now / SEGMENT;
                let expected = times
                    .iter()
                    .filter(|&&t| t / SEGMENT > slot - WINDOW / SEGMENT)
                    .count() as u64;
                let window = stats.window_stats();

                prop_assert_eq!(window.n(), expected);
                prop_assert!(window.minimum() <= value && value <= window.maximum());
                prop_assert_eq!(stats.cumulative_stats().n(), times.len() as u64);
            }
        }
    }
}

// ============================================================================
// Serialization
// ============================================================================

#[cfg(feature = "serde")]
mod serialization {
    use super::*;
    use rollstats::statistics::{Activity, RollingSummary};

    #[test]
    fn summary_json_shape() {
        let summary = built("json", &[1.0, 2.0, 3.0]).summary();
        let json = serde_json::to_value(&summary).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "label": "json",
                "n": 3,
                "minimum": 1.0,
                "maximum": 3.0,
                "mean": 2.0,
                "stddev": 1.0,
            })
        );

        let back: Summary = serde_json::from_value(json).unwrap();
        assert_eq!(StatsAccumulator::from_summary(&back).summary(), summary);
    }

    #[test]
    fn rolling_summary_status() {
        let (stats, clock) = manual(100, 50);
        stats.add_all([4.0, 6.0]);
        clock.advance(1_000);

        let info = stats.summary_info();
        let json = serde_json::to_value(&info).unwrap();

        assert_eq!(json["window"]["status"], "inactive");
        assert_eq!(json["window"]["width_millis"], 100);
        assert_eq!(json["cumulative"]["status"], "active");
        assert_eq!(json["cumulative"]["stats"]["n"], 2);
        assert_eq!(json["cumulative"]["millis_per_item"], 5.0);

        let back: RollingSummary = serde_json::from_value(json).unwrap();
        assert_eq!(back.window.activity, Activity::Inactive);
        assert!(back.cumulative.activity.is_active());
    }

    #[test]
    fn partial_summary_fills_defaults() {
        let empty: Summary = serde_json::from_str(r#"{"label":"p","n":0}"#).unwrap();
        assert_eq!(empty.label, "p");
        assert_eq!(StatsAccumulator::from_summary(&empty).n(), 0);

        let sparse: Summary = serde_json::from_str(r#"{"n":3,"mean":2.0}"#).unwrap();
        assert_eq!(sparse.label, "");
        assert_eq!(sparse.minimum, 0.0);
        assert_eq!(sparse.stddev, 0.0);

        let restored = StatsAccumulator::from_summary(&sparse);
        assert_eq!(restored.n(), 3);
        assert_eq!(restored.sum(), 6.0);
    }
}
