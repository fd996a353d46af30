//! Additive evaluation.
//!
//! Control writes on an additive rig are queued and applied as deltas on
//! top of the pose the backwards solve derives from the incoming animation.
//! One evaluation runs: reset additive controls, restore the input pose,
//! Inverse, queued parent switches, queued control values, Forward.
//! Queued values stay in place for every later evaluation until
//! [`ControlRig::reset_control_values`] clears them.

use std::sync::Arc;

use armature_api_core::{ControlValue, ElementKey, ElementTypeMask};
use armature_hierarchy_core::{write_hierarchy, ControlValueType, RigHierarchy, RigPose, TransformType};
use armature_vm_core::events::{FORWARD, INVERSE};
use armature_vm_core::Severity;
use indexmap::IndexMap;

use crate::controls::sync_curve_control;
use crate::delegates::{ControlModifiedContext, RigPhase};
use crate::rig::ControlRig;

#[derive(Debug, Clone, PartialEq)]
pub struct PendingControlValue {
    pub value: ControlValue,
    pub notify: bool,
    pub context: ControlModifiedContext,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PendingParentSwitch {
    pub parent: ElementKey,
    pub initial: bool,
    pub affect_children: bool,
}

#[derive(Debug)]
pub(crate) struct AdditiveState {
    pub pending_controls: IndexMap<ElementKey, PendingControlValue>,
    pub pending_switches: IndexMap<ElementKey, PendingParentSwitch>,
    pub controls_after_backwards_solve: RigPose,
    pub pose_before_backwards_solve: Option<RigPose>,
    pub capture_pose_before_backwards_solve: bool,
}

impl Default for AdditiveState {
    fn default() -> Self {
        Self {
            pending_controls: IndexMap::new(),
            pending_switches: IndexMap::new(),
            controls_after_backwards_solve: RigPose::default(),
            pose_before_backwards_solve: None,
            capture_pose_before_backwards_solve: true,
        }
    }
}

impl ControlRig {
    /// The next additive evaluation snapshots the incoming pose again
    /// instead of restoring the previous snapshot. Hosts call this once per
    /// frame after writing new input.
    pub fn reset_pose_before_backwards_solve_capture(&mut self) {
        self.additive.capture_pose_before_backwards_solve = true;
    }

    /// Drop every queued additive value and parent switch.
    pub fn reset_control_values(&mut self) {
        self.additive.pending_controls.clear();
        self.additive.pending_switches.clear();
    }

    pub fn pending_control_value(&self, key: &ElementKey) -> Option<&PendingControlValue> {
        self.additive.pending_controls.get(key)
    }

    pub fn pending_parent_switch(&self, key: &ElementKey) -> Option<&PendingParentSwitch> {
        self.additive.pending_switches.get(key)
    }

    /// Control pose right after the last backwards solve.
    pub fn controls_after_backwards_solve(&self) -> &RigPose {
        &self.additive.controls_after_backwards_solve
    }

    pub(crate) fn evaluate_additive(&mut self) -> bool {
        if self.vm.is_none() {
            return false;
        }
        if self.executing {
            log::warn!("rig '{}': Execute is being called recursively (additive)", self.rig_name());
            return false;
        }
        if self.requires_init() {
            self.initialize_vm();
        }
        let shared = Arc::clone(&self.hierarchy);
        let mut hierarchy = write_hierarchy(&shared);
        self.executing = true;
        let ok = self.evaluate_additive_locked(&mut hierarchy);
        self.executing = false;
        ok
    }

    fn evaluate_additive_locked(&mut self, hierarchy: &mut RigHierarchy) -> bool {
        let mut ok = true;
        if self.construction_pending {
            ok &= self.run_construction(hierarchy);
        }

        reset_additive_controls(hierarchy);

        if self.additive.capture_pose_before_backwards_solve || self.additive.pose_before_backwards_solve.is_none() {
            let input = ElementTypeMask::BONE | ElementTypeMask::CURVE;
            self.additive.pose_before_backwards_solve = Some(hierarchy.get_pose(false, input, &[]));
            self.additive.capture_pose_before_backwards_solve = false;
        } else if let Some(pose) = &self.additive.pose_before_backwards_solve {
            hierarchy.set_pose(pose, TransformType::CurrentLocal);
        }

        if self.supports_event(INVERSE) {
            ok &= self.execute_event(hierarchy, INVERSE);
        }

        self.apply_pending_switches(hierarchy);
        self.additive.controls_after_backwards_solve = hierarchy.get_pose(false, ElementTypeMask::CONTROL, &[]);
        self.delegates.broadcast(RigPhase::PreAdditiveValuesApplication, FORWARD);
        self.apply_pending_controls(hierarchy);

        if self.supports_event(FORWARD) {
            ok &= self.execute_event(hierarchy, FORWARD);
        }
        ok
    }

    fn apply_pending_switches(&mut self, hierarchy: &mut RigHierarchy) {
        if self.additive.pending_switches.is_empty() {
            return;
        }
        let dependencies = self
            .vm
            .as_ref()
            .map(|vm| vm.dependency_map(Some(&self.redirector)))
            .unwrap_or_default();
        for (child, switch) in &self.additive.pending_switches {
            if let Err(err) = hierarchy.switch_to_parent(
                child,
                &switch.parent,
                switch.initial,
                switch.affect_children,
                Some(&dependencies),
            ) {
                self.diagnostics.record(
                    Severity::Warning,
                    INVERSE,
                    format!("could not switch {child} to {}: {err}", switch.parent),
                );
            }
        }
    }

    fn apply_pending_controls(&mut self, hierarchy: &mut RigHierarchy) {
        for (key, pending) in self.additive.pending_controls.iter_mut() {
            let Some(settings) = hierarchy.control_settings(key).cloned() else {
                self.diagnostics
                    .record(Severity::Warning, FORWARD, format!("{key} disappeared before its value was applied"));
                continue;
            };
            let result = if settings.can_treat_as_additive() {
                pending
                    .value
                    .to_transform(settings.control_type, settings.primary_axis)
                    .map_err(armature_hierarchy_core::HierarchyError::from)
                    .and_then(|delta| {
                        let base = hierarchy.local_transform(key, false)?;
                        let local = delta.compose(&base).with_normalized_rotation();
                        hierarchy.set_transform(key, local, TransformType::CurrentLocal, true)
                    })
            } else {
                hierarchy.set_control_value(key, pending.value, ControlValueType::Current, true)
            };
            if let Err(err) = result {
                self.diagnostics
                    .record(Severity::Warning, FORWARD, format!("could not apply {key}: {err}"));
                continue;
            }
            if self.config.create_float_controls_for_curves {
                sync_curve_control(hierarchy, key);
            }
            if pending.notify {
                self.delegates.control_modified(key, &pending.value, &pending.context);
                pending.notify = false;
            }
        }
    }
}

/// Put every control that holds an additive delta back at its default
/// parent and initial local pose.
fn reset_additive_controls(hierarchy: &mut RigHierarchy) {
    let controls: Vec<ElementKey> = hierarchy
        .controls()
        .into_iter()
        .filter(|key| {
            hierarchy
                .control_settings(key)
                .is_some_and(|settings| settings.can_treat_as_additive())
        })
        .collect();
    for key in controls {
        if hierarchy.active_parent(&key, false) != hierarchy.default_parent(&key) {
            let _ = hierarchy.switch_to_parent(&key, &ElementKey::default_parent(), false, false, None);
        }
        if let Ok(initial) = hierarchy.local_transform(&key, true) {
            let _ = hierarchy.set_transform(&key, initial, TransformType::CurrentLocal, false);
        }
    }
}
