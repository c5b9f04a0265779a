use std::time::Duration;

use surge_core::{SequentialReport, TestResult};

/// Roll-up across every scenario of a suite.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct SuiteSummary {
    pub scenarios: u64,
    pub total: u64,
    pub successful: u64,
    throughput_sum: f64,
    throughput_samples: u64,
    avg_latency_sum: Duration,
    avg_latency_samples: u32,
}

impl SuiteSummary {
    pub(crate) fn add_result(&mut self, result: &TestResult) {
        self.scenarios += 1;
        self.total += result.total;
        self.successful += result.successful;
        if result.throughput > 0.0 {
            self.throughput_sum += result.throughput;
            self.throughput_samples += 1;
        }
        if result.latency_samples > 0 {
            self.avg_latency_sum += result.avg;
            self.avg_latency_samples += 1;
        }
    }

    pub(crate) fn add_sequential(&mut self, report: &SequentialReport) {
        self.scenarios += 1;
        self.total += report.total();
        self.successful += report.successful();
        if report.warm.latency_samples > 0 {
            self.avg_latency_sum += report.warm.avg;
            self.avg_latency_samples += 1;
        }
    }

    #[must_use]
    pub(crate) fn success_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.successful as f64 / self.total as f64
    }

    /// Mean throughput over scenarios that reported one.
    #[must_use]
    pub(crate) fn avg_throughput(&self) -> f64 {
        if self.throughput_samples == 0 {
            return 0.0;
        }
        self.throughput_sum / self.throughput_samples as f64
    }

    /// Mean of the per-scenario average latencies.
    #[must_use]
    pub(crate) fn avg_latency(&self) -> Duration {
        if self.avg_latency_samples == 0 {
            return Duration::ZERO;
        }
        self.avg_latency_sum / self.avg_latency_samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use surge_core::{Outcome, aggregate};

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn empty_summary_is_zero() {
        let s = SuiteSummary::default();
        assert_eq!(s.success_rate(), 0.0);
        assert_eq!(s.avg_throughput(), 0.0);
        assert_eq!(s.avg_latency(), Duration::ZERO);
    }

    #[test]
    fn sequential_results_do_not_dilute_throughput() {
        let fast = aggregate(
            "fast",
            &[Outcome::from_status(200, ms(10)), Outcome::from_status(200, ms(30))],
            Some(Duration::from_secs(1)),
        );
        let failing = aggregate(
            "failing",
            &[Outcome::from_status(500, ms(50)), Outcome::from_status(200, ms(50))],
            Some(ms(500)),
        );
        let sequential = SequentialReport {
            first: Outcome::from_status(200, ms(80)),
            warm: aggregate("cache", &[Outcome::from_status(200, ms(20))], None),
        };

        let mut s = SuiteSummary::default();
        s.add_result(&fast);
        s.add_result(&failing);
        s.add_sequential(&sequential);

        assert_eq!(s.scenarios, 3);
        assert_eq!(s.total, 6);
        assert_eq!(s.successful, 5);
        // (2 rps + 4 rps) / 2; the sequential probe has no throughput.
        assert_eq!(s.avg_throughput(), 3.0);
        // (20 + 50 + 20) / 3
        assert_eq!(s.avg_latency(), ms(30));
    }
}
