use std::sync::Arc;

use surge_core::{EscalationReport, EscalationStep, SequentialReport, TestResult};

use crate::cli::OutputFormat;
use crate::summary::SuiteSummary;

mod human;
mod json;

/// Receives results as they become available; nothing is buffered, so an interrupted run has
/// already reported everything that finished.
pub(crate) trait Reporter: Send + Sync {
    fn run_started(&self, title: &str, base_url: &str);
    fn scenario_started(&self, name: &str);
    fn scenario(&self, result: &TestResult);
    fn sequential(&self, report: &SequentialReport);
    fn memory_stress(&self, result: &TestResult, payload_bytes: usize);
    fn escalation_step(&self, step: &EscalationStep);
    fn escalation(&self, report: &EscalationReport);
    fn summary(&self, summary: &SuiteSummary);
    fn interrupted(&self);
}

pub(crate) fn reporter(format: OutputFormat) -> Arc<dyn Reporter> {
    match format {
        OutputFormat::Human => Arc::new(human::HumanReport::new()),
        OutputFormat::Json => Arc::new(json::JsonReport),
    }
}
