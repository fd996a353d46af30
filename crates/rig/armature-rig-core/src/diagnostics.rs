//! Report collection for one rig instance.
//!
//! Every report is forwarded to the `log` facade and retained until taken.
//! `log_once` keys suppress repeats of the same message across frames.

use armature_vm_core::{Report, ReportSink, Severity};
use hashbrown::HashSet;

#[derive(Debug, Default, Clone)]
pub struct RigDiagnostics {
    reports: Vec<Report>,
    logged_once: HashSet<String>,
}

fn emit(report: &Report) {
    match report.severity {
        Severity::Info => log::info!("[{}:{}] {}", report.event, report.node, report.message),
        Severity::Warning => log::warn!("[{}:{}] {}", report.event, report.node, report.message),
        Severity::Error => log::error!("[{}:{}] {}", report.event, report.node, report.message),
    }
}

impl RigDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> &[Report] {
        &self.reports
    }

    pub fn take_reports(&mut self) -> Vec<Report> {
        std::mem::take(&mut self.reports)
    }

    pub fn has_errors(&self) -> bool {
        self.reports.iter().any(|r| r.severity == Severity::Error)
    }

    /// Record a rig-level message (not tied to a unit).
    pub fn record(&mut self, severity: Severity, event: &str, message: impl Into<String>) {
        self.report(Report {
            severity,
            event: event.to_string(),
            node: String::new(),
            message: message.into(),
        });
    }

    /// Like [`record`](Self::record), but only the first time `key` is seen.
    pub fn log_once(&mut self, key: &str, severity: Severity, event: &str, message: impl Into<String>) -> bool {
        if !self.logged_once.insert(key.to_string()) {
            return false;
        }
        self.record(severity, event, message);
        true
    }

    /// Forget `log_once` keys, e.g. after the rig was rebuilt.
    pub fn reset_once(&mut self) {
        self.logged_once.clear();
    }
}

impl ReportSink for RigDiagnostics {
    fn report(&mut self, report: Report) {
        emit(&report);
        self.reports.push(report);
    }
}
