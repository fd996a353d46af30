//! Control settings and the control value model.
//!
//! A control's value is the decoded form of its local transform (see
//! `armature_api_core::coercion`). Writes go value -> limits -> transform.

use armature_api_core::coercion::value_from_transform;
use armature_api_core::{
    ControlAxis, ControlLimits, ControlType, ControlValue, ElementKey, LimitEnabled, Transform,
};
use serde::{Deserialize, Serialize};

use crate::element::{ElementPayload, TransformType};
use crate::error::HierarchyError;
use crate::hierarchy::RigHierarchy;
use crate::notify::HierarchyNotification;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ControlValueType {
    Initial,
    Current,
    Minimum,
    Maximum,
}

impl ControlValueType {
    fn initial(self) -> bool {
        matches!(self, ControlValueType::Initial)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ControlAnimationType {
    #[default]
    AnimationControl,
    AnimationChannel,
    /// Drives the controls listed in `driven_controls`.
    ProxyControl,
    VisualCue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilteredChannel {
    TranslationX,
    TranslationY,
    TranslationZ,
    RotationPitch,
    RotationYaw,
    RotationRoll,
    ScaleX,
    ScaleY,
    ScaleZ,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShapeSettings {
    pub name: String,
    pub color: [f32; 4],
    pub visible: bool,
}

impl Default for ShapeSettings {
    fn default() -> Self {
        Self {
            name: "Default".to_string(),
            color: [1.0, 0.0, 0.0, 1.0],
            visible: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlSettings {
    pub control_type: ControlType,
    pub primary_axis: ControlAxis,
    pub animation_type: ControlAnimationType,
    pub display_name: Option<String>,
    pub limits: ControlLimits,
    pub shape: ShapeSettings,
    pub driven_controls: Vec<ElementKey>,
    pub filtered_channels: Vec<FilteredChannel>,
    /// Names of the enum entries backing an Integer control.
    pub control_enum: Option<Vec<String>>,
    pub restrict_space_switching: bool,
}

impl Default for ControlSettings {
    fn default() -> Self {
        Self::new(ControlType::Transform)
    }
}

impl ControlSettings {
    pub fn new(control_type: ControlType) -> Self {
        let primary_axis = ControlAxis::X;
        Self {
            control_type,
            primary_axis,
            animation_type: ControlAnimationType::AnimationControl,
            display_name: None,
            limits: ControlLimits::disabled(
                control_type,
                ControlValue::identity(control_type, primary_axis),
            ),
            shape: ShapeSettings::default(),
            driven_controls: Vec::new(),
            filtered_channels: Vec::new(),
            control_enum: None,
            restrict_space_switching: false,
        }
    }

    pub fn with_limits(mut self, minimum: ControlValue, maximum: ControlValue) -> Self {
        self.limits = ControlLimits::uniform(self.control_type, minimum, maximum);
        self
    }

    pub fn with_animation_type(mut self, animation_type: ControlAnimationType) -> Self {
        self.animation_type = animation_type;
        self
    }

    pub fn with_primary_axis(mut self, axis: ControlAxis) -> Self {
        self.primary_axis = axis;
        self.sanitize();
        self
    }

    /// Bool and enum-backed Integer controls never take part in additive math.
    pub fn can_treat_as_additive(&self) -> bool {
        match self.control_type {
            ControlType::Bool => false,
            ControlType::Integer => self.control_enum.is_none(),
            _ => true,
        }
    }

    pub fn is_proxy(&self) -> bool {
        self.animation_type == ControlAnimationType::ProxyControl
    }

    pub fn is_animatable(&self) -> bool {
        matches!(
            self.animation_type,
            ControlAnimationType::AnimationControl | ControlAnimationType::AnimationChannel
        )
    }

    pub fn identity_value(&self) -> ControlValue {
        ControlValue::identity(self.control_type, self.primary_axis)
    }

    /// Bring limit storage in line with the control type.
    pub fn sanitize(&mut self) {
        let identity = self.identity_value();
        if !self.limits.minimum.matches(self.control_type) {
            self.limits.minimum = identity;
        }
        if !self.limits.maximum.matches(self.control_type) {
            self.limits.maximum = identity;
        }
        self.limits
            .enabled
            .resize(self.control_type.limit_channels(), LimitEnabled::default());
    }

    pub fn apply_limits(&self, value: &mut ControlValue) {
        self.limits.apply(value, self.control_type);
    }
}

impl RigHierarchy {
    pub(crate) fn require_control(&self, key: &ElementKey) -> Result<usize, HierarchyError> {
        let index = self.require(key)?;
        if self.elements[index].control().is_none() {
            return Err(HierarchyError::NotAControl(key.clone()));
        }
        Ok(index)
    }

    /// Decode `local`, clamp it, store it as the value hint, and return the
    /// transform of the clamped value.
    pub(crate) fn limit_control_local(&mut self, index: usize, local: Transform, initial: bool) -> Transform {
        let Some(control) = self.elements[index].payload.control_mut() else {
            return local;
        };
        let settings = &control.settings;
        let hint = *control.values.get(initial);
        let mut value = value_from_transform(&local, settings.control_type, settings.primary_axis, Some(&hint));
        settings.apply_limits(&mut value);
        let limited = if settings.control_type.is_transform_like() && !settings.limits.any_enabled() {
            local
        } else {
            value
                .to_transform(settings.control_type, settings.primary_axis)
                .unwrap_or(local)
        };
        *control.values.get_mut(initial) = value;
        limited
    }

    pub fn control_settings(&self, key: &ElementKey) -> Option<&ControlSettings> {
        self.find(key).and_then(|e| e.control()).map(|c| &c.settings)
    }

    pub fn set_control_settings(
        &mut self,
        key: &ElementKey,
        mut settings: ControlSettings,
        notify: bool,
    ) -> Result<(), HierarchyError> {
        let index = self.require_control(key)?;
        settings.sanitize();
        let Some(control) = self.elements[index].payload.control_mut() else {
            return Err(HierarchyError::NotAControl(key.clone()));
        };
        let visibility_changed = control.settings.shape.visible != settings.shape.visible;
        let driven_changed = control.settings.driven_controls != settings.driven_controls;
        let type_changed = control.settings.control_type != settings.control_type
            || control.settings.primary_axis != settings.primary_axis;
        control.settings = settings.clone();
        if type_changed {
            control.values = crate::element::PoseSlots::splat(settings.identity_value());
        }
        // Re-clamp both poses under the new limits.
        for initial in [true, false] {
            let local = self.local_at(index, initial);
            let limited = self.limit_control_local(index, local, initial);
            if !limited.approx_eq(&local, 1e-6) {
                self.set_transform_at(index, limited, TransformType::new(initial, true), true);
            }
        }
        if notify {
            self.notify(HierarchyNotification::ControlSettingChanged, Some(key));
            if visibility_changed {
                self.notify(HierarchyNotification::ControlVisibilityChanged, Some(key));
            }
            if driven_changed {
                self.notify(HierarchyNotification::ControlDrivenListChanged, Some(key));
            }
        }
        self.propagate_to_listening(|other| {
            let _ = other.set_control_settings(key, settings.clone(), notify);
        });
        Ok(())
    }

    /// Read a control value. Initial/Current decode the local transform;
    /// Minimum/Maximum read the limit bounds.
    pub fn control_value(&self, key: &ElementKey, value_type: ControlValueType) -> Result<ControlValue, HierarchyError> {
        let index = self.require_control(key)?;
        let Some(control) = self.elements[index].control() else {
            return Err(HierarchyError::NotAControl(key.clone()));
        };
        let settings = &control.settings;
        Ok(match value_type {
            ControlValueType::Minimum => settings.limits.minimum,
            ControlValueType::Maximum => settings.limits.maximum,
            ControlValueType::Initial | ControlValueType::Current => {
                let initial = value_type.initial();
                let local = self.local_at(index, initial);
                value_from_transform(
                    &local,
                    settings.control_type,
                    settings.primary_axis,
                    Some(control.values.get(initial)),
                )
            }
        })
    }

    /// Write a control value. The value kind must match the control type.
    /// Initial/Current values are clamped by enabled limits; Minimum/Maximum
    /// update the bounds and re-clamp both poses.
    pub fn set_control_value(
        &mut self,
        key: &ElementKey,
        value: ControlValue,
        value_type: ControlValueType,
        affect_children: bool,
    ) -> Result<(), HierarchyError> {
        let index = self.require_control(key)?;
        let (control_type, axis) = {
            let settings = self.control_settings(key).ok_or_else(|| HierarchyError::NotAControl(key.clone()))?;
            (settings.control_type, settings.primary_axis)
        };
        if !value.matches(control_type) {
            return Err(HierarchyError::Value(armature_api_core::ApiError::ValueTypeMismatch {
                expected: control_type,
                found: value.kind_name(),
            }));
        }
        match value_type {
            ControlValueType::Initial | ControlValueType::Current => {
                let initial = value_type.initial();
                let mut clamped = value;
                if let Some(control) = self.elements[index].control() {
                    control.settings.apply_limits(&mut clamped);
                }
                let local = clamped.to_transform(control_type, axis)?;
                self.prepare_dependents(index, initial, affect_children);
                self.write_slot(index, local, TransformType::new(initial, true));
                if let Some(control) = self.elements[index].payload.control_mut() {
                    *control.values.get_mut(initial) = clamped;
                }
            }
            ControlValueType::Minimum | ControlValueType::Maximum => {
                if let Some(control) = self.elements[index].payload.control_mut() {
                    if value_type == ControlValueType::Minimum {
                        control.settings.limits.set_minimum(control_type, value);
                    } else {
                        control.settings.limits.set_maximum(control_type, value);
                    }
                }
                for initial in [true, false] {
                    let local = self.local_at(index, initial);
                    let limited = self.limit_control_local(index, local, initial);
                    if !limited.approx_eq(&local, 1e-6) {
                        self.set_transform_at(index, limited, TransformType::new(initial, true), true);
                    }
                }
            }
        }
        self.propagate_to_listening(|other| {
            let _ = other.set_control_value(key, value, value_type, affect_children);
        });
        Ok(())
    }

    /// Value a control would hold if its global transform were `global`.
    /// Limits apply.
    pub fn control_value_from_global(
        &self,
        key: &ElementKey,
        global: &Transform,
        initial: bool,
    ) -> Result<ControlValue, HierarchyError> {
        let index = self.require_control(key)?;
        let local = global.relative_to(&self.parent_frame_at(index, initial));
        self.control_value_from_local(key, &local, initial)
    }

    /// Decode `local` as a value of this control, with limits applied.
    pub fn control_value_from_local(
        &self,
        key: &ElementKey,
        local: &Transform,
        initial: bool,
    ) -> Result<ControlValue, HierarchyError> {
        let index = self.require_control(key)?;
        let Some(control) = self.elements[index].control() else {
            return Err(HierarchyError::NotAControl(key.clone()));
        };
        let settings = &control.settings;
        let mut value = value_from_transform(
            local,
            settings.control_type,
            settings.primary_axis,
            Some(control.values.get(initial)),
        );
        settings.apply_limits(&mut value);
        Ok(value)
    }

    pub fn control_offset_transform(&self, key: &ElementKey, initial: bool) -> Result<Transform, HierarchyError> {
        let index = self.require_control(key)?;
        self.control_offset_at(index, initial)
            .ok_or_else(|| HierarchyError::NotAControl(key.clone()))
    }

    /// Replace the offset layer. The control keeps its local transform, so
    /// its global moves; `affect_children` decides whether children follow.
    pub fn set_control_offset_transform(
        &mut self,
        key: &ElementKey,
        offset: Transform,
        initial: bool,
        affect_children: bool,
    ) -> Result<(), HierarchyError> {
        let index = self.require_control(key)?;
        self.clean_slot(index, TransformType::new(initial, true));
        self.prepare_dependents(index, initial, affect_children);
        if let Some(control) = self.elements[index].payload.control_mut() {
            *control.offset.get_mut(initial) = offset.with_normalized_rotation();
        }
        self.dirty_slot(index, TransformType::new(initial, false));
        self.propagate_to_listening(|other| {
            let _ = other.set_control_offset_transform(key, offset, initial, affect_children);
        });
        Ok(())
    }

    pub fn control_shape_transform(&self, key: &ElementKey, initial: bool) -> Result<Transform, HierarchyError> {
        let index = self.require_control(key)?;
        self.elements[index]
            .control()
            .map(|c| *c.shape.get(initial))
            .ok_or_else(|| HierarchyError::NotAControl(key.clone()))
    }

    pub fn set_control_shape_transform(
        &mut self,
        key: &ElementKey,
        shape: Transform,
        initial: bool,
    ) -> Result<(), HierarchyError> {
        let index = self.require_control(key)?;
        if let ElementPayload::Control(control) = &mut self.elements[index].payload {
            *control.shape.get_mut(initial) = shape;
        }
        self.notify(HierarchyNotification::ControlShapeTransformChanged, Some(key));
        Ok(())
    }

    pub fn set_control_visibility(&mut self, key: &ElementKey, visible: bool) -> Result<(), HierarchyError> {
        let index = self.require_control(key)?;
        let changed = match self.elements[index].payload.control_mut() {
            Some(control) if control.settings.shape.visible != visible => {
                control.settings.shape.visible = visible;
                true
            }
            _ => false,
        };
        if changed {
            self.notify(HierarchyNotification::ControlVisibilityChanged, Some(key));
        }
        Ok(())
    }

    /// Controls driven by `key` when it is a proxy control.
    pub fn driven_controls(&self, key: &ElementKey) -> Vec<ElementKey> {
        self.control_settings(key)
            .filter(|s| s.is_proxy())
            .map(|s| s.driven_controls.clone())
            .unwrap_or_default()
    }

    /// Animation channels hosted under a control.
    pub fn animation_channels(&self, key: &ElementKey) -> Vec<ElementKey> {
        let Some(index) = self.index_of(key) else {
            return Vec::new();
        };
        self.elements[index]
            .children
            .iter()
            .filter_map(|&c| {
                let element = &self.elements[c];
                element
                    .control()
                    .filter(|ctrl| ctrl.settings.animation_type == ControlAnimationType::AnimationChannel)
                    .map(|_| element.key.clone())
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::HierarchyDefinition;
    use approx::assert_relative_eq;
    use armature_api_core::Vector3;

    fn rig() -> RigHierarchy {
        HierarchyDefinition::from_json_str(
            r#"{"elements":[
                {"type":"Null","name":"Space","transform":{"translation":[0,0,10]}},
                {"type":"Control","name":"Slider","parent":"Null:Space",
                 "settings":{"control_type":"Float","limits":{
                    "enabled":[{"minimum":true,"maximum":true}],
                    "minimum":{"kind":"float","value":0.0},
                    "maximum":{"kind":"float","value":1.0}}}},
                {"type":"Control","name":"Hand","parent":"Null:Space",
                 "offset":{"translation":[1,0,0]}}
            ]}"#,
        )
        .unwrap()
        .build()
        .unwrap()
    }

    #[test]
    fn float_values_clamp_on_set() {
        let mut h = rig();
        let slider = ElementKey::control("Slider");
        h.set_control_value(&slider, ControlValue::Float(1.5), ControlValueType::Current, true)
            .unwrap();
        assert_eq!(
            h.control_value(&slider, ControlValueType::Current).unwrap(),
            ControlValue::Float(1.0)
        );
        assert!(h
            .set_control_value(&slider, ControlValue::Bool(true), ControlValueType::Current, true)
            .is_err());
    }

    #[test]
    fn narrowing_limits_reclamps_values() {
        let mut h = rig();
        let slider = ElementKey::control("Slider");
        h.set_control_value(&slider, ControlValue::Float(0.8), ControlValueType::Current, true)
            .unwrap();
        h.set_control_value(&slider, ControlValue::Float(0.5), ControlValueType::Maximum, true)
            .unwrap();
        assert_eq!(
            h.control_value(&slider, ControlValueType::Current).unwrap(),
            ControlValue::Float(0.5)
        );
    }

    #[test]
    fn offset_sits_between_parent_and_local() {
        let mut h = rig();
        let hand = ElementKey::control("Hand");
        let global = h.global_transform(&hand, false).unwrap();
        assert_relative_eq!(global.translation, Vector3::new(1.0, 0.0, 10.0), epsilon = 1e-5);

        h.set_control_value(
            &hand,
            ControlValue::Transform(Transform::from_translation(Vector3::new(0.0, 2.0, 0.0))),
            ControlValueType::Current,
            true,
        )
        .unwrap();
        let global = h.global_transform(&hand, false).unwrap();
        assert_relative_eq!(global.translation, Vector3::new(1.0, 2.0, 10.0), epsilon = 1e-5);

        let value = h
            .control_value_from_global(
                &hand,
                &Transform::from_translation(Vector3::new(1.0, 0.0, 13.0)),
                false,
            )
            .unwrap();
        let t = value.as_transform().unwrap();
        assert_relative_eq!(t.translation, Vector3::new(0.0, 0.0, 3.0), epsilon = 1e-5);
    }

    #[test]
    fn additive_treatment_by_type() {
        assert!(!ControlSettings::new(ControlType::Bool).can_treat_as_additive());
        assert!(ControlSettings::new(ControlType::Integer).can_treat_as_additive());
        let mut enum_backed = ControlSettings::new(ControlType::Integer);
        enum_backed.control_enum = Some(vec!["Left".into(), "Right".into()]);
        assert!(!enum_backed.can_treat_as_additive());
        assert!(ControlSettings::new(ControlType::Transform).can_treat_as_additive());
    }
}
