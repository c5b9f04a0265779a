use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use super::outcome::Outcome;

/// Maximum number of error strings kept in [`TestResult::errors`].
pub const ERROR_SAMPLE_LIMIT: usize = 10;

/// Latency populations up to this size report `p95 == max`.
pub const SMALL_SAMPLE_MAX: usize = 20;

/// Aggregate over one scenario run.
#[derive(Debug, Clone, PartialEq)]
pub struct TestResult {
    pub name: String,
    pub total: u64,
    pub successful: u64,
    pub failed: u64,
    /// Failures that never produced a response (timeouts, refused connections, ...).
    pub transport_failures: u64,

    pub avg: Duration,
    pub min: Duration,
    pub max: Duration,
    pub p95: Duration,
    /// Size of the latency population (`total - transport_failures`).
    pub latency_samples: u64,

    /// Requests per second over `duration`; `0.0` when not meaningful.
    pub throughput: f64,
    /// Wall-clock time of the batch; zero for sequential measurements.
    pub duration: Duration,

    pub status_counts: BTreeMap<u16, u64>,
    /// Sorted, de-duplicated sample of at most [`ERROR_SAMPLE_LIMIT`] error strings.
    pub errors: Vec<String>,
}

impl TestResult {
    /// `successful / total`, or `0.0` for an empty run.
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.successful as f64 / self.total as f64
    }

    #[must_use]
    pub fn failure_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.failed as f64 / self.total as f64
    }
}

/// Builds a [`TestResult`] from the raw outcomes of a batch.
///
/// `elapsed` is the batch's wall-clock duration; pass `None` for sequential measurements where a
/// throughput figure is not meaningful. The result does not depend on the order of `outcomes`.
#[must_use]
pub fn aggregate(
    name: impl Into<String>,
    outcomes: &[Outcome],
    elapsed: Option<Duration>,
) -> TestResult {
    let mut successful = 0u64;
    let mut transport_failures = 0u64;
    let mut status_counts: BTreeMap<u16, u64> = BTreeMap::new();
    let mut latencies: Vec<Duration> = Vec::with_capacity(outcomes.len());
    let mut errors: BTreeSet<&str> = BTreeSet::new();

    for o in outcomes {
        if o.is_success() {
            successful += 1;
        }
        match o.status() {
            Some(status) => *status_counts.entry(status).or_insert(0) += 1,
            None => transport_failures += 1,
        }
        if let Some(latency) = o.latency() {
            latencies.push(latency);
        }
        if let Some(reason) = o.error_reason() {
            // Keeps the smallest `ERROR_SAMPLE_LIMIT` distinct reasons.
            if errors.insert(reason) && errors.len() > ERROR_SAMPLE_LIMIT {
                errors.pop_last();
            }
        }
    }

    latencies.sort_unstable();

    let total = outcomes.len() as u64;
    let stats = LatencyStats::from_sorted(&latencies);
    let duration = elapsed.unwrap_or_default();
    let throughput = if duration.is_zero() {
        0.0
    } else {
        total as f64 / duration.as_secs_f64()
    };

    TestResult {
        name: name.into(),
        total,
        successful,
        failed: total - successful,
        transport_failures,
        avg: stats.avg,
        min: stats.min,
        max: stats.max,
        p95: stats.p95,
        latency_samples: latencies.len() as u64,
        throughput,
        duration,
        status_counts,
        errors: errors.into_iter().map(str::to_string).collect(),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct LatencyStats {
    avg: Duration,
    min: Duration,
    max: Duration,
    p95: Duration,
}

impl LatencyStats {
    fn from_sorted(sorted: &[Duration]) -> Self {
        let (Some(&min), Some(&max)) = (sorted.first(), sorted.last()) else {
            return Self::default();
        };

        // Integer nanosecond sum keeps the mean exact and independent of summation order.
        let sum: u128 = sorted.iter().map(Duration::as_nanos).sum();
        let mean_ns = sum / sorted.len() as u128;
        let avg = Duration::new(
            (mean_ns / 1_000_000_000) as u64,
            (mean_ns % 1_000_000_000) as u32,
        );

        Self {
            avg,
            min,
            max,
            p95: percentile_95(sorted),
        }
    }
}

/// 95th percentile of an ascending latency population.
///
/// Takes the element at 0-based index `ceil(0.95 * n)`, clipped to the last element, for
/// populations larger than [`SMALL_SAMPLE_MAX`]; smaller populations report their maximum.
#[must_use]
pub fn percentile_95(sorted: &[Duration]) -> Duration {
    let n = sorted.len();
    if n == 0 {
        return Duration::ZERO;
    }
    if n <= SMALL_SAMPLE_MAX {
        return sorted[n - 1];
    }

    let index = (95 * n).div_ceil(100).min(n - 1);
    sorted[index]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    fn ok(latency_ms: u64) -> Outcome {
        Outcome::from_status(200, ms(latency_ms))
    }

    #[test]
    fn empty_population_is_all_zero() {
        let r = aggregate("empty", &[], Some(ms(100)));
        assert_eq!(r.total, 0);
        assert_eq!(r.successful, 0);
        assert_eq!(r.failed, 0);
        assert_eq!(r.avg, Duration::ZERO);
        assert_eq!(r.min, Duration::ZERO);
        assert_eq!(r.max, Duration::ZERO);
        assert_eq!(r.p95, Duration::ZERO);
        assert_eq!(r.throughput, 0.0);
        assert_eq!(r.success_rate(), 0.0);
    }

    #[test]
    fn counts_and_basic_stats() {
        let outcomes = vec![ok(10), ok(20), ok(30), Outcome::from_status(500, ms(40))];
        let r = aggregate("basic", &outcomes, Some(Duration::from_secs(2)));

        assert_eq!(r.total, 4);
        assert_eq!(r.successful, 3);
        assert_eq!(r.failed, 1);
        assert_eq!(r.total, r.successful + r.failed);
        assert_eq!(r.min, ms(10));
        assert_eq!(r.max, ms(40));
        assert_eq!(r.avg, ms(25));
        assert_eq!(r.throughput, 2.0);
        assert_eq!(r.status_counts.get(&200), Some(&3));
        assert_eq!(r.status_counts.get(&500), Some(&1));
        assert_eq!(r.success_rate(), 0.75);
    }

    #[test]
    fn transport_failures_are_counted_but_not_timed() {
        let outcomes = vec![
            ok(10),
            Outcome::from_status(503, ms(30)),
            Outcome::transport_failure("connect: connection refused", Duration::from_secs(5)),
        ];
        let r = aggregate("mixed", &outcomes, Some(Duration::from_secs(1)));

        assert_eq!(r.total, 3);
        assert_eq!(r.failed, 2);
        assert_eq!(r.transport_failures, 1);
        assert_eq!(r.latency_samples, 2);
        assert_eq!(r.max, ms(30));
        assert_eq!(r.avg, ms(20));
    }

    #[test]
    fn small_population_p95_is_max() {
        for n in 1..=SMALL_SAMPLE_MAX as u64 {
            let outcomes: Vec<Outcome> = (1..=n).map(ok).collect();
            let r = aggregate("small", &outcomes, None);
            assert_eq!(r.p95, r.max, "n={n}");
        }
    }

    #[test]
    fn large_population_p95_index_is_ceil_of_95_percent() {
        let outcomes: Vec<Outcome> = (1..=100).map(ok).collect();
        let r = aggregate("large", &outcomes, None);
        // index 95 (0-based)
        assert_eq!(r.p95, ms(96));

        let outcomes: Vec<Outcome> = (1..=21).map(ok).collect();
        let r = aggregate("boundary", &outcomes, None);
        // index ceil(19.95) = 20, the last element
        assert_eq!(r.p95, ms(21));

        let population: Vec<Duration> = (1..=40).map(ms).collect();
        // index 38
        assert_eq!(percentile_95(&population), ms(39));
    }

    #[test]
    fn ordering_invariants_hold() {
        let latencies = [
            3u64, 97, 12, 5, 44, 44, 8, 1000, 2, 61, 13, 77, 5, 9, 30, 21, 18, 400, 6, 7, 15, 90,
        ];
        let outcomes: Vec<Outcome> = latencies.iter().copied().map(ok).collect();
        let r = aggregate("invariants", &outcomes, Some(ms(500)));

        assert!(r.min <= r.avg && r.avg <= r.max);
        assert!(r.min <= r.p95 && r.p95 <= r.max);
    }

    #[test]
    fn aggregation_is_order_independent_and_idempotent() {
        let mut outcomes: Vec<Outcome> = (1..=40)
            .map(|i| match i % 7 {
                0 => Outcome::transport_failure(format!("request: reset {i}"), ms(i)),
                3 => Outcome::from_status(502, ms(i)),
                _ => ok(i * 3),
            })
            .collect();

        let a = aggregate("pure", &outcomes, Some(ms(750)));
        let b = aggregate("pure", &outcomes, Some(ms(750)));
        outcomes.reverse();
        let c = aggregate("pure", &outcomes, Some(ms(750)));

        assert_eq!(a, b);
        assert_eq!(a, c);
    }

    #[test]
    fn error_sample_is_bounded() {
        let outcomes: Vec<Outcome> = (0..50)
            .map(|i| Outcome::transport_failure(format!("request: failure #{i:02}"), ms(1)))
            .collect();
        let r = aggregate("errors", &outcomes, Some(ms(10)));

        assert_eq!(r.failed, 50);
        assert_eq!(r.errors.len(), ERROR_SAMPLE_LIMIT);
        assert_eq!(r.errors[0], "request: failure #00");
        assert_eq!(r.errors[ERROR_SAMPLE_LIMIT - 1], "request: failure #09");
    }

    #[test]
    fn error_sample_keeps_smallest_distinct_reasons_in_any_order() {
        let mut outcomes: Vec<Outcome> = (0..200)
            .rev()
            .map(|i| Outcome::from_status(500 + (i % 12) as u16, ms(1)))
            .collect();
        outcomes.push(Outcome::transport_failure("connect: refused", ms(1)));
        let r = aggregate("errors", &outcomes, None);

        let mut expected: Vec<String> = (500..512).map(|s| format!("http status {s}")).collect();
        expected.insert(0, "connect: refused".to_string());
        expected.truncate(ERROR_SAMPLE_LIMIT);
        assert_eq!(r.errors, expected);
    }

    #[test]
    fn sequential_measurement_has_zero_throughput() {
        let outcomes: Vec<Outcome> = (1..=5).map(ok).collect();
        let r = aggregate("sequential", &outcomes, None);
        assert_eq!(r.throughput, 0.0);
        assert_eq!(r.duration, Duration::ZERO);
    }
}
