use std::sync::Mutex;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use surge_core::{EscalationReport, EscalationStep, SequentialReport, TestResult};

mod format;
mod render;

use render::*;

use super::Reporter;
use crate::summary::SuiteSummary;

pub(crate) struct HumanReport {
    spinner: Mutex<Option<ProgressBar>>,
}

impl HumanReport {
    pub(crate) fn new() -> Self {
        Self {
            spinner: Mutex::new(None),
        }
    }

    fn clear_spinner(&self) {
        let mut inner = self
            .spinner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(pb) = inner.take() {
            pb.finish_and_clear();
        }
    }

    /// Prints a block on stdout after taking the spinner off stderr.
    fn emit(&self, block: &str) {
        self.clear_spinner();
        print!("{block}");
    }
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner} {prefix} {elapsed}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

impl Reporter for HumanReport {
    fn run_started(&self, title: &str, base_url: &str) {
        println!("{title}");
        println!("target: {base_url}");
        println!();
    }

    fn scenario_started(&self, name: &str) {
        self.clear_spinner();
        let pb = ProgressBar::with_draw_target(None, ProgressDrawTarget::stderr_with_hz(5));
        pb.set_style(spinner_style());
        pb.set_prefix(name.to_string());
        pb.enable_steady_tick(Duration::from_millis(120));

        let mut inner = self
            .spinner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *inner = Some(pb);
    }

    fn scenario(&self, result: &TestResult) {
        self.emit(&format!("{}\n", render_result(result)));
    }

    fn sequential(&self, report: &SequentialReport) {
        self.emit(&format!("{}\n", render_sequential(report)));
    }

    fn memory_stress(&self, result: &TestResult, payload_bytes: usize) {
        self.emit(&format!("{}\n", render_memory_stress(result, payload_bytes)));
    }

    fn escalation_step(&self, step: &EscalationStep) {
        self.emit(&render_step(step));
    }

    fn escalation(&self, report: &EscalationReport) {
        self.emit(&format!("{}\n", render_escalation(report)));
    }

    fn summary(&self, summary: &SuiteSummary) {
        self.emit(&render_summary(summary));
    }

    fn interrupted(&self) {
        self.clear_spinner();
        eprintln!("interrupted; results above are partial");
    }
}
