//! State handed to every rig unit for one event run.

use armature_api_core::ElementKey;
use armature_hierarchy_core::{ElementKeyRedirector, HierarchySettings, RigHierarchy};

use crate::events;
use crate::report::{Report, ReportSink, Severity};

pub struct ExecuteContext<'a> {
    pub hierarchy: &'a mut RigHierarchy,
    pub event: &'a str,
    pub delta_time: f32,
    pub absolute_time: f32,
    pub settings: HierarchySettings,
    pub redirector: Option<&'a ElementKeyRedirector>,
    reports: &'a mut dyn ReportSink,
    node: String,
}

impl<'a> ExecuteContext<'a> {
    pub fn new(hierarchy: &'a mut RigHierarchy, event: &'a str, reports: &'a mut dyn ReportSink) -> Self {
        let settings = hierarchy.settings().clone();
        Self {
            hierarchy,
            event,
            delta_time: 0.0,
            absolute_time: 0.0,
            settings,
            redirector: None,
            reports,
            node: String::new(),
        }
    }

    pub fn with_time(mut self, delta_time: f32, absolute_time: f32) -> Self {
        self.delta_time = delta_time;
        self.absolute_time = absolute_time;
        self
    }

    pub fn with_settings(mut self, settings: HierarchySettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_redirector(mut self, redirector: &'a ElementKeyRedirector) -> Self {
        self.redirector = Some(redirector);
        self
    }

    pub fn is_construction(&self) -> bool {
        events::is_construction(self.event)
    }

    /// Follow the key redirector, if any.
    pub fn resolve(&self, key: &ElementKey) -> ElementKey {
        match self.redirector {
            Some(redirector) => redirector.resolve(key),
            None => key.clone(),
        }
    }

    pub(crate) fn set_node(&mut self, node: &str) {
        self.node.clear();
        self.node.push_str(node);
    }

    pub fn report(&mut self, severity: Severity, message: impl Into<String>) {
        let report = Report {
            severity,
            event: self.event.to_string(),
            node: self.node.clone(),
            message: message.into(),
        };
        self.reports.report(report);
    }
}
