use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write as _;
use std::time::Duration;

use surge_core::{EscalationReport, EscalationStep, SequentialReport, TestResult};

use super::Reporter;
use crate::summary::SuiteSummary;

pub(crate) struct JsonReport;

impl Reporter for JsonReport {
    fn run_started(&self, title: &str, base_url: &str) {
        emit_json_line(&JsonRunLine {
            kind: "run",
            title: title.to_string(),
            base_url: base_url.to_string(),
        });
    }

    fn scenario_started(&self, _name: &str) {}

    fn scenario(&self, result: &TestResult) {
        emit_json_line(&JsonScenarioLine {
            kind: "scenario",
            result: build_result(result),
        });
    }

    fn sequential(&self, report: &SequentialReport) {
        emit_json_line(&build_sequential_line(report));
    }

    fn memory_stress(&self, result: &TestResult, payload_bytes: usize) {
        emit_json_line(&JsonMemoryStressLine {
            kind: "memory_stress",
            payload_bytes: payload_bytes as u64,
            bytes_sent_approx: result.total.saturating_mul(payload_bytes as u64),
            result: build_result(result),
        });
    }

    fn escalation_step(&self, step: &EscalationStep) {
        emit_json_line(&JsonEscalationStepLine {
            kind: "escalation_step",
            level: step.level,
            stop_reason: step.stop_reason.to_string(),
            result: build_result(&step.result),
        });
    }

    fn escalation(&self, report: &EscalationReport) {
        emit_json_line(&JsonEscalationLine {
            kind: "escalation",
            stop_reason: report.stop_reason.to_string(),
            levels_run: report.steps.len() as u64,
            max_healthy_level: report.max_healthy_level(),
        });
    }

    fn summary(&self, summary: &SuiteSummary) {
        emit_json_line(&build_summary_line(summary));
    }

    fn interrupted(&self) {
        emit_json_line(&JsonKindLine {
            kind: "interrupted",
        });
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonKindLine {
    pub kind: &'static str,
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonRunLine {
    pub kind: &'static str,
    pub title: String,
    pub base_url: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonResult {
    pub name: String,
    pub total: u64,
    pub successful: u64,
    pub failed: u64,
    pub transport_failures: u64,
    pub success_rate: f64,
    pub latency: JsonLatency,
    pub throughput: f64,
    pub duration_ms: f64,
    pub status_counts: BTreeMap<u16, u64>,
    pub errors: Vec<String>,
}

/// Latencies in fractional milliseconds.
#[derive(Debug, Serialize)]
pub(crate) struct JsonLatency {
    pub avg: f64,
    pub min: f64,
    pub max: f64,
    pub p95: f64,
    pub count: u64,
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonScenarioLine {
    pub kind: &'static str,
    #[serde(flatten)]
    pub result: JsonResult,
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonSequentialLine {
    pub kind: &'static str,
    pub first_ms: f64,
    pub first_success: bool,
    pub speedup: Option<f64>,
    pub warm: JsonResult,
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonMemoryStressLine {
    pub kind: &'static str,
    pub payload_bytes: u64,
    pub bytes_sent_approx: u64,
    #[serde(flatten)]
    pub result: JsonResult,
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonEscalationStepLine {
    pub kind: &'static str,
    pub level: u64,
    pub stop_reason: String,
    pub result: JsonResult,
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonEscalationLine {
    pub kind: &'static str,
    pub stop_reason: String,
    pub levels_run: u64,
    pub max_healthy_level: Option<u64>,
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonSummaryLine {
    pub kind: &'static str,
    pub scenarios: u64,
    pub total: u64,
    pub successful: u64,
    pub success_rate: f64,
    pub avg_throughput: f64,
    pub avg_latency_ms: f64,
}

fn millis(d: Duration) -> f64 {
    d.as_nanos() as f64 / 1_000_000.0
}

fn build_result(r: &TestResult) -> JsonResult {
    JsonResult {
        name: r.name.clone(),
        total: r.total,
        successful: r.successful,
        failed: r.failed,
        transport_failures: r.transport_failures,
        success_rate: r.success_rate(),
        latency: JsonLatency {
            avg: millis(r.avg),
            min: millis(r.min),
            max: millis(r.max),
            p95: millis(r.p95),
            count: r.latency_samples,
        },
        throughput: r.throughput,
        duration_ms: millis(r.duration),
        status_counts: r.status_counts.clone(),
        errors: r.errors.clone(),
    }
}

fn build_sequential_line(report: &SequentialReport) -> JsonSequentialLine {
    JsonSequentialLine {
        kind: "sequential",
        first_ms: millis(report.first.elapsed),
        first_success: report.first.is_success(),
        speedup: report.speedup(),
        warm: build_result(&report.warm),
    }
}

fn build_summary_line(s: &SuiteSummary) -> JsonSummaryLine {
    JsonSummaryLine {
        kind: "summary",
        scenarios: s.scenarios,
        total: s.total,
        successful: s.successful,
        success_rate: s.success_rate(),
        avg_throughput: s.avg_throughput(),
        avg_latency_ms: millis(s.avg_latency()),
    }
}

fn emit_json_line<T: Serialize>(line: &T) {
    let mut out = std::io::stdout().lock();
    if serde_json::to_writer(&mut out, line).is_ok() {
        let _ = writeln!(out);
    }
}
