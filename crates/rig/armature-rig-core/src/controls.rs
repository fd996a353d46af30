//! Control access on the rig.
//!
//! Non-additive rigs write straight into the hierarchy. Additive rigs queue
//! values and parent switches for the next evaluation and report values as
//! deltas against the pose the backwards solve produced.

use armature_api_core::coercion::value_from_transform;
use armature_api_core::{ControlType, ControlValue, ElementKey, ElementType, Transform};
use armature_hierarchy_core::{
    read_hierarchy, write_hierarchy, ControlSettings, ControlValueType, HierarchyError, MetadataValue, RigHierarchy,
    TransformType,
};
use armature_vm_core::events::FORWARD;

use crate::additive::{PendingControlValue, PendingParentSwitch};
use crate::delegates::ControlModifiedContext;
use crate::error::RigError;
use crate::rig::ControlRig;

/// Metadata flag on Float controls that mirror a curve.
pub const CURVE_CONTROL_METADATA: &str = "ControlRig:CurveControl";

/// Add a Float control for every curve without one.
pub(crate) fn add_curve_controls(hierarchy: &mut RigHierarchy) -> Result<Vec<ElementKey>, HierarchyError> {
    let mut created = Vec::new();
    for curve in hierarchy.curves() {
        if hierarchy.contains(&ElementKey::control(curve.name.clone())) {
            continue;
        }
        let value = hierarchy.curve_value(&curve).unwrap_or_default();
        let key = hierarchy
            .controller()
            .ok_or(HierarchyError::ControllerUnavailable)?
            .add_control(
                &curve.name,
                None,
                ControlSettings::new(ControlType::Float),
                ControlValue::Float(value),
                Transform::identity(),
                Transform::identity(),
            )?;
        hierarchy.set_metadata(&key, CURVE_CONTROL_METADATA, MetadataValue::Bool(true))?;
        created.push(key);
    }
    Ok(created)
}

/// Copy a curve control's value onto its curve.
pub(crate) fn sync_curve_control(hierarchy: &mut RigHierarchy, key: &ElementKey) {
    if hierarchy.get_metadata(key, CURVE_CONTROL_METADATA) != Some(&MetadataValue::Bool(true)) {
        return;
    }
    if let Ok(ControlValue::Float(value)) = hierarchy.control_value(key, ControlValueType::Current) {
        let curve = ElementKey::curve(key.name.clone());
        if let Err(err) = hierarchy.set_curve_value(&curve, value) {
            log::warn!("curve control {key}: {err}");
        }
    }
}

fn value_type_is_initial(value_type: ControlValueType) -> bool {
    value_type == ControlValueType::Initial
}

impl ControlRig {
    fn control_key(&self, name: &str) -> Result<ElementKey, RigError> {
        let key = ElementKey::control(name);
        if read_hierarchy(&self.hierarchy).control_settings(&key).is_some() {
            Ok(key)
        } else {
            Err(RigError::UnknownControl(name.to_string()))
        }
    }

    pub fn available_controls(&self) -> Vec<ElementKey> {
        read_hierarchy(&self.hierarchy).controls()
    }

    pub fn find_control(&self, name: &str) -> Option<ControlSettings> {
        read_hierarchy(&self.hierarchy)
            .control_settings(&ElementKey::control(name))
            .cloned()
    }

    /// Create the Float controls mirroring curves. Returns the new keys.
    pub fn create_float_controls_for_curves(&mut self) -> Result<Vec<ElementKey>, RigError> {
        Ok(add_curve_controls(&mut write_hierarchy(&self.hierarchy))?)
    }

    pub fn is_curve_control(&self, name: &str) -> bool {
        read_hierarchy(&self.hierarchy).get_metadata(&ElementKey::control(name), CURVE_CONTROL_METADATA)
            == Some(&MetadataValue::Bool(true))
    }

    // ---------- values ----------

    /// Read a control value. On an additive rig the Current value is the
    /// delta on top of the backwards-solved pose: a queued value if there
    /// is one, otherwise derived from the hierarchy.
    pub fn control_value(&self, name: &str, value_type: ControlValueType) -> Result<ControlValue, RigError> {
        let key = self.control_key(name)?;
        if self.config.is_additive && value_type == ControlValueType::Current {
            if let Some(pending) = self.additive.pending_controls.get(&key) {
                return Ok(pending.value);
            }
            let hierarchy = read_hierarchy(&self.hierarchy);
            let settings = hierarchy
                .control_settings(&key)
                .ok_or_else(|| RigError::UnknownControl(name.to_string()))?;
            if settings.can_treat_as_additive() {
                let Some(anim_local) = self.anim_local(&key) else {
                    return Ok(settings.identity_value());
                };
                let local = hierarchy.local_transform(&key, false)?;
                return Ok(additive_value(settings, &local.relative_to(&anim_local)));
            }
        }
        Ok(read_hierarchy(&self.hierarchy).control_value(&key, value_type)?)
    }

    fn anim_local(&self, key: &ElementKey) -> Option<Transform> {
        self.additive
            .controls_after_backwards_solve
            .find(key)
            .map(|entry| entry.local)
    }

    /// Write a control's Current value.
    ///
    /// Additive rigs queue the value; the newest value for a control wins
    /// and `notify` fires when the queue is applied.
    pub fn set_control_value(
        &mut self,
        name: &str,
        value: ControlValue,
        notify: bool,
        context: ControlModifiedContext,
    ) -> Result<(), RigError> {
        let key = self.control_key(name)?;
        if let Some(settings) = self.find_control(name) {
            if !value.matches(settings.control_type) {
                return Err(HierarchyError::Value(armature_api_core::ApiError::ValueTypeMismatch {
                    expected: settings.control_type,
                    found: value.kind_name(),
                })
                .into());
            }
        }
        if self.config.is_additive {
            self.additive
                .pending_controls
                .insert(key, PendingControlValue { value, notify, context });
            return Ok(());
        }
        let stored = {
            let mut hierarchy = write_hierarchy(&self.hierarchy);
            hierarchy.set_control_value(&key, value, ControlValueType::Current, true)?;
            if self.config.create_float_controls_for_curves {
                sync_curve_control(&mut hierarchy, &key);
            }
            hierarchy.control_value(&key, ControlValueType::Current)?
        };
        if notify {
            self.delegates.control_modified(&key, &stored, &context);
        }
        Ok(())
    }

    /// Value the control would hold at `global`. Limits apply.
    ///
    /// For the Current value of an additive rig this is the delta against
    /// the backwards-solved pose, or the identity value before any solve.
    pub fn control_value_from_global_transform(
        &self,
        name: &str,
        global: &Transform,
        value_type: ControlValueType,
    ) -> Result<ControlValue, RigError> {
        let key = self.control_key(name)?;
        let hierarchy = read_hierarchy(&self.hierarchy);
        let initial = value_type_is_initial(value_type);
        if self.config.is_additive && !initial {
            let settings = hierarchy
                .control_settings(&key)
                .ok_or_else(|| RigError::UnknownControl(name.to_string()))?;
            if settings.can_treat_as_additive() {
                let Some(anim_local) = self.anim_local(&key) else {
                    return Ok(settings.identity_value());
                };
                let local = global.relative_to(&hierarchy.parent_frame(&key, false)?);
                return Ok(additive_value(settings, &local.relative_to(&anim_local)));
            }
        }
        Ok(hierarchy.control_value_from_global(&key, global, initial)?)
    }

    // ---------- transforms ----------

    pub fn control_global_transform(&self, name: &str) -> Result<Transform, RigError> {
        let key = self.control_key(name)?;
        Ok(read_hierarchy(&self.hierarchy).global_transform(&key, false)?)
    }

    /// The hierarchy local. On an additive rig this is the delta composed
    /// onto the backwards-solved pose.
    pub fn control_local_transform(&self, name: &str) -> Result<Transform, RigError> {
        let key = self.control_key(name)?;
        Ok(read_hierarchy(&self.hierarchy).local_transform(&key, false)?)
    }

    pub fn set_control_global_transform(
        &mut self,
        name: &str,
        global: Transform,
        notify: bool,
        context: ControlModifiedContext,
    ) -> Result<(), RigError> {
        let key = self.control_key(name)?;
        if self.config.is_additive && self.find_control(name).is_some_and(|s| s.is_proxy()) {
            write_hierarchy(&self.hierarchy).set_transform(&key, global, TransformType::CurrentGlobal, true)?;
            self.execute(FORWARD);
            return Ok(());
        }
        let value = self.control_value_from_global_transform(name, &global, ControlValueType::Current)?;
        self.set_control_value(name, value, notify, context)
    }

    pub fn set_control_local_transform(
        &mut self,
        name: &str,
        local: Transform,
        notify: bool,
        context: ControlModifiedContext,
    ) -> Result<(), RigError> {
        let key = self.control_key(name)?;
        let value = {
            let hierarchy = read_hierarchy(&self.hierarchy);
            if self.config.is_additive {
                let global = local.compose(&hierarchy.parent_frame(&key, false)?);
                drop(hierarchy);
                self.control_value_from_global_transform(name, &global, ControlValueType::Current)?
            } else {
                hierarchy.control_value_from_local(&key, &local, false)?
            }
        };
        self.set_control_value(name, value, notify, context)
    }

    // ---------- selection ----------

    /// Select or deselect a control. Returns whether the selection changed.
    pub fn select_control(&mut self, name: &str, selected: bool) -> Result<bool, RigError> {
        let key = self.control_key(name)?;
        Ok(write_hierarchy(&self.hierarchy).select(&key, selected)?)
    }

    /// Deselect every control. Other selected elements stay selected.
    pub fn clear_control_selection(&mut self) -> bool {
        let mut hierarchy = write_hierarchy(&self.hierarchy);
        let selected: Vec<ElementKey> = hierarchy
            .selected_keys()
            .iter()
            .filter(|key| key.element_type == ElementType::Control)
            .cloned()
            .collect();
        let mut changed = false;
        for key in &selected {
            changed |= hierarchy.select(key, false).unwrap_or(false);
        }
        changed
    }

    pub fn current_control_selection(&self) -> Vec<ElementKey> {
        read_hierarchy(&self.hierarchy)
            .selected_keys()
            .iter()
            .filter(|key| key.element_type == ElementType::Control)
            .cloned()
            .collect()
    }

    pub fn is_control_selected(&self, name: &str) -> bool {
        read_hierarchy(&self.hierarchy).is_selected(&ElementKey::control(name))
    }

    // ---------- parents ----------

    /// Switch `element` to `new_parent`, keeping its global transform.
    ///
    /// Additive rigs queue the switch until after the next backwards solve.
    /// Otherwise the switch is checked against the program's dependencies
    /// and rejected when it would close a cycle.
    pub fn switch_to_parent(
        &mut self,
        element: &ElementKey,
        new_parent: &ElementKey,
        initial: bool,
        affect_children: bool,
    ) -> Result<(), RigError> {
        if self.config.is_additive {
            self.additive.pending_switches.insert(
                element.clone(),
                PendingParentSwitch {
                    parent: new_parent.clone(),
                    initial,
                    affect_children,
                },
            );
            return Ok(());
        }
        let dependencies = self
            .vm
            .as_ref()
            .map(|vm| vm.dependency_map(Some(&self.redirector)))
            .unwrap_or_default();
        write_hierarchy(&self.hierarchy).switch_to_parent(
            element,
            new_parent,
            initial,
            affect_children,
            Some(&dependencies),
        )?;
        Ok(())
    }
}

fn additive_value(settings: &ControlSettings, delta: &Transform) -> ControlValue {
    let mut value = value_from_transform(delta, settings.control_type, settings.primary_axis, None);
    settings.apply_limits(&mut value);
    value
}
