//! Host object properties pushed onto a rig before it evaluates.

use armature_api_core::{ControlValue, EulerTransform, Rotator, Transform, TransformNoScale};
use armature_rig_core::{ControlModifiedContext, ControlRig};
use armature_vm_core::VmValue;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum HostProperty {
    Bool(bool),
    Float(f32),
    Int(i32),
    #[serde(rename = "vector2d")]
    Vector2D([f32; 2]),
    Vector([f32; 3]),
    Rotator(Rotator),
    Transform(Transform),
    TransformNoScale(TransformNoScale),
    EulerTransform(EulerTransform),
    Name(String),
}

impl HostProperty {
    fn as_control_value(&self) -> Option<ControlValue> {
        Some(match self {
            HostProperty::Bool(b) => ControlValue::Bool(*b),
            HostProperty::Float(f) => ControlValue::Float(*f),
            HostProperty::Int(i) => ControlValue::Integer(*i),
            HostProperty::Vector2D(v) => ControlValue::Vector2D(*v),
            HostProperty::Vector(v) => ControlValue::Vector(*v),
            HostProperty::Transform(t) => ControlValue::Transform(*t),
            HostProperty::TransformNoScale(t) => ControlValue::TransformNoScale(*t),
            HostProperty::EulerTransform(t) => ControlValue::EulerTransform(*t),
            HostProperty::Rotator(_) | HostProperty::Name(_) => return None,
        })
    }

    fn as_vm_value(&self) -> VmValue {
        match self {
            HostProperty::Bool(b) => VmValue::Bool(*b),
            HostProperty::Float(f) => VmValue::Float(*f),
            HostProperty::Int(i) => VmValue::Int(*i),
            HostProperty::Vector(v) => VmValue::Vector(*v),
            HostProperty::Rotator(r) => VmValue::Rotator(*r),
            HostProperty::Transform(t) => VmValue::Transform(*t),
            HostProperty::Name(n) => VmValue::Name(n.clone()),
            HostProperty::Vector2D(v) => VmValue::Control(ControlValue::Vector2D(*v)),
            HostProperty::TransformNoScale(t) => VmValue::Control(ControlValue::TransformNoScale(*t)),
            HostProperty::EulerTransform(t) => VmValue::Control(ControlValue::EulerTransform(*t)),
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            HostProperty::Bool(_) => "bool",
            HostProperty::Float(_) => "float",
            HostProperty::Int(_) => "int",
            HostProperty::Vector2D(_) => "vector2d",
            HostProperty::Vector(_) => "vector",
            HostProperty::Rotator(_) => "rotator",
            HostProperty::Transform(_) => "transform",
            HostProperty::TransformNoScale(_) => "transform_no_scale",
            HostProperty::EulerTransform(_) => "euler_transform",
            HostProperty::Name(_) => "name",
        }
    }
}

/// Copy named properties onto the rig.
///
/// A property lands on the control of the same name when its type matches
/// the control type exactly, otherwise on the public variable of the same
/// name and kind. Anything else is skipped with a warning. Returns how many
/// properties were applied.
pub fn propagate_input_properties(rig: &mut ControlRig, properties: &IndexMap<String, HostProperty>) -> usize {
    let public = rig.public_variables();
    let mut applied = 0;
    for (name, property) in properties {
        if let Some(settings) = rig.find_control(name) {
            match property.as_control_value() {
                Some(value) if value.matches(settings.control_type) => {
                    match rig.set_control_value(name, value, false, ControlModifiedContext::default()) {
                        Ok(()) => applied += 1,
                        Err(err) => log::warn!("property '{name}' not applied: {err}"),
                    }
                }
                _ => log::warn!(
                    "property '{name}' ({}) does not match control type {:?}; skipped",
                    property.kind_name(),
                    settings.control_type
                ),
            }
            continue;
        }

        let Some((_, current)) = public.iter().find(|(variable, _)| variable == name) else {
            log::warn!("property '{name}' has no matching control or public variable; skipped");
            continue;
        };
        let value = property.as_vm_value();
        if !value.same_kind(current) {
            log::warn!(
                "property '{name}' ({}) does not match variable kind {}; skipped",
                property.kind_name(),
                current.kind_name()
            );
            continue;
        }
        match rig.set_variable(name, value) {
            Ok(()) => applied += 1,
            Err(err) => log::warn!("property '{name}' not applied: {err}"),
        }
    }
    applied
}
