use std::fmt::Write as _;

use surge_core::{EscalationReport, EscalationStep, SequentialReport, StopReason, TestResult};

use super::format::*;
use crate::summary::SuiteSummary;

pub(crate) fn render_result(r: &TestResult) -> String {
    let mut out = String::new();

    writeln!(&mut out, "scenario: {}", r.name).ok();
    writeln!(
        &mut out,
        "  requests: {} (successful {}, failed {}, success {})",
        r.total,
        r.successful,
        r.failed,
        format_percent(r.success_rate())
    )
    .ok();
    if r.transport_failures > 0 {
        writeln!(&mut out, "  transport_failures: {}", r.transport_failures).ok();
    }

    if r.latency_samples > 0 {
        writeln!(
            &mut out,
            "  latency: avg={} min={} max={} p95={} (n={})",
            format_ms(r.avg),
            format_ms(r.min),
            format_ms(r.max),
            format_ms(r.p95),
            r.latency_samples
        )
        .ok();
    } else {
        out.push_str("  latency: n/a\n");
    }

    if r.throughput > 0.0 {
        writeln!(
            &mut out,
            "  throughput: {} req/s over {}",
            format_rate(r.throughput),
            humantime::format_duration(round_to_millis(r.duration))
        )
        .ok();
    }
    writeln!(&mut out, "  statuses: {}", format_status_counts(&r.status_counts)).ok();

    if !r.errors.is_empty() {
        out.push_str("  errors:\n");
        for e in &r.errors {
            writeln!(&mut out, "    {e}").ok();
        }
    }

    out
}

pub(crate) fn render_sequential(report: &SequentialReport) -> String {
    let mut out = render_result(&report.warm);
    let first = if report.first.is_success() {
        format_ms(report.first.elapsed)
    } else {
        format!(
            "{} ({})",
            format_ms(report.first.elapsed),
            report.first.error_reason().unwrap_or("failed")
        )
    };
    writeln!(&mut out, "  first request: {first}").ok();
    match report.speedup() {
        Some(speedup) => writeln!(&mut out, "  warm speedup: {speedup:.1}x").ok(),
        None => writeln!(&mut out, "  warm speedup: n/a").ok(),
    };
    out
}

pub(crate) fn render_memory_stress(result: &TestResult, payload_bytes: usize) -> String {
    let mut out = render_result(result);
    let pushed = result.total.saturating_mul(payload_bytes as u64);
    writeln!(
        &mut out,
        "  payload: {} per request, ~{} sent",
        format_bytes(payload_bytes as u64),
        format_bytes(pushed)
    )
    .ok();
    out
}

pub(crate) fn render_step(step: &EscalationStep) -> String {
    let r = &step.result;
    let verdict = match step.stop_reason {
        StopReason::None => "ok".to_string(),
        other => format!("stop: {other}"),
    };
    format!(
        "level {:>4}: success {} avg={} p95={} rps={} [{verdict}]\n",
        step.level,
        format_percent(r.success_rate()),
        format_ms(r.avg),
        format_ms(r.p95),
        format_rate(r.throughput),
    )
}

pub(crate) fn render_escalation(report: &EscalationReport) -> String {
    let mut out = String::new();
    writeln!(&mut out, "escalation stopped: {}", report.stop_reason).ok();
    match report.max_healthy_level() {
        Some(level) => writeln!(&mut out, "  max healthy level: {level} workers").ok(),
        None => writeln!(&mut out, "  max healthy level: none").ok(),
    };
    out
}

pub(crate) fn render_summary(s: &SuiteSummary) -> String {
    let mut out = String::new();
    out.push_str("summary\n");
    writeln!(&mut out, "  scenarios: {}", s.scenarios).ok();
    writeln!(
        &mut out,
        "  requests: {} (successful {}, success {})",
        s.total,
        s.successful,
        format_percent(s.success_rate())
    )
    .ok();
    writeln!(
        &mut out,
        "  avg throughput: {} req/s",
        format_rate(s.avg_throughput())
    )
    .ok();
    writeln!(&mut out, "  avg latency: {}", format_ms(s.avg_latency())).ok();
    out
}

fn round_to_millis(d: std::time::Duration) -> std::time::Duration {
    std::time::Duration::from_millis(d.as_millis() as u64)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use surge_core::{Outcome, aggregate};

    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn result_block_lists_counts_latency_and_errors() {
        let r = aggregate(
            "Health Check",
            &[
                Outcome::from_status(200, ms(10)),
                Outcome::from_status(503, ms(30)),
                Outcome::transport_failure("connect: connection refused", ms(1)),
            ],
            Some(Duration::from_secs(1)),
        );

        let out = render_result(&r);

        assert!(out.starts_with("scenario: Health Check\n"));
        assert!(out.contains("requests: 3 (successful 1, failed 2, success 33.3%)"));
        assert!(out.contains("transport_failures: 1"));
        assert!(out.contains("latency: avg=20.00ms min=10.00ms max=30.00ms p95=30.00ms (n=2)"));
        assert!(out.contains("throughput: 3.0 req/s over 1s"));
        assert!(out.contains("statuses: 200=1 503=1"));
        assert!(out.contains("    connect: connection refused\n"));
        assert!(out.contains("    http status 503\n"));
    }

    #[test]
    fn sequential_block_reports_first_request_and_speedup() {
        let report = SequentialReport {
            first: Outcome::from_status(200, ms(40)),
            warm: aggregate("Cache", &[Outcome::from_status(200, ms(10))], None),
        };

        let out = render_sequential(&report);

        assert!(out.contains("first request: 40.00ms"));
        assert!(out.contains("warm speedup: 4.0x"));
        assert!(!out.contains("throughput"));
    }

    #[test]
    fn step_line_shows_verdict() {
        let step = EscalationStep {
            level: 25,
            result: aggregate("lvl", &[Outcome::from_status(200, ms(5))], Some(ms(100))),
            stop_reason: StopReason::LatencyAboveThreshold,
        };
        let line = render_step(&step);
        assert!(line.starts_with("level   25: success 100.0%"));
        assert!(line.ends_with("[stop: latency_above_threshold]\n"));
    }
}
