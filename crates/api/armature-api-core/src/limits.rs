//! Per-channel control limits.

use serde::{Deserialize, Serialize};

use crate::rotator::Rotator;
use crate::transform::Transform;
use crate::value::{ControlType, ControlValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LimitEnabled {
    #[serde(default)]
    pub minimum: bool,
    #[serde(default)]
    pub maximum: bool,
}

impl LimitEnabled {
    pub fn new(enabled: bool) -> Self {
        Self {
            minimum: enabled,
            maximum: enabled,
        }
    }

    pub fn is_on(&self) -> bool {
        self.minimum || self.maximum
    }

    /// Clamp `value` by whichever bounds are enabled. Does not panic when `min > max`.
    pub fn apply(&self, value: f32, min: f32, max: f32) -> f32 {
        let mut out = value;
        if self.minimum && out < min {
            out = min;
        }
        if self.maximum && out > max {
            out = max;
        }
        out
    }
}

/// Limit configuration of a control: enabled flags per channel plus bound values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlLimits {
    #[serde(default)]
    pub enabled: Vec<LimitEnabled>,
    pub minimum: ControlValue,
    pub maximum: ControlValue,
}

impl ControlLimits {
    /// Limits with every channel disabled and bounds set to the identity value.
    pub fn disabled(control_type: ControlType, identity: ControlValue) -> Self {
        Self {
            enabled: vec![LimitEnabled::default(); control_type.limit_channels()],
            minimum: identity,
            maximum: identity,
        }
    }

    pub fn uniform(control_type: ControlType, minimum: ControlValue, maximum: ControlValue) -> Self {
        Self {
            enabled: vec![LimitEnabled::new(true); control_type.limit_channels()],
            minimum,
            maximum,
        }
    }

    pub fn any_enabled(&self) -> bool {
        self.enabled.iter().any(LimitEnabled::is_on)
    }

    /// Store a new minimum, raising the maximum where it falls below it.
    pub fn set_minimum(&mut self, control_type: ControlType, minimum: ControlValue) {
        self.minimum = minimum;
        let floor = vec![
            LimitEnabled {
                minimum: true,
                maximum: false
            };
            control_type.limit_channels()
        ];
        apply_limits(&mut self.maximum, control_type, &floor, &self.minimum, &self.minimum);
    }

    /// Store a new maximum, lowering the minimum where it exceeds it.
    pub fn set_maximum(&mut self, control_type: ControlType, maximum: ControlValue) {
        self.maximum = maximum;
        let ceiling = vec![
            LimitEnabled {
                minimum: false,
                maximum: true
            };
            control_type.limit_channels()
        ];
        apply_limits(&mut self.minimum, control_type, &ceiling, &self.maximum, &self.maximum);
    }

    /// Clamp `value` in place according to the limits for `control_type`.
    pub fn apply(&self, value: &mut ControlValue, control_type: ControlType) {
        apply_limits(value, control_type, &self.enabled, &self.minimum, &self.maximum);
    }
}

fn channels_on(enabled: &[LimitEnabled], range: std::ops::Range<usize>) -> bool {
    enabled[range].iter().any(LimitEnabled::is_on)
}

fn clamp_vec3(value: &mut [f32; 3], enabled: &[LimitEnabled], min: [f32; 3], max: [f32; 3]) {
    for i in 0..3 {
        value[i] = enabled[i].apply(value[i], min[i], max[i]);
    }
}

fn clamp_rotator(value: Rotator, enabled: &[LimitEnabled], min: Rotator, max: Rotator) -> Rotator {
    Rotator {
        pitch: enabled[0].apply(value.pitch, min.pitch, max.pitch),
        yaw: enabled[1].apply(value.yaw, min.yaw, max.yaw),
        roll: enabled[2].apply(value.roll, min.roll, max.roll),
    }
}

fn to_arr(v: &nalgebra::Vector3<f32>) -> [f32; 3] {
    [v.x, v.y, v.z]
}

fn clamp_transform(value: &mut Transform, enabled: &[LimitEnabled], min: &Transform, max: &Transform) {
    if channels_on(enabled, 0..3) {
        let mut t = to_arr(&value.translation);
        clamp_vec3(&mut t, &enabled[0..3], to_arr(&min.translation), to_arr(&max.translation));
        value.translation = nalgebra::Vector3::new(t[0], t[1], t[2]);
    }
    if channels_on(enabled, 3..6) {
        let limited = clamp_rotator(value.rotator(), &enabled[3..6], min.rotator(), max.rotator());
        value.rotation = limited.to_quaternion();
    }
    if enabled.len() >= 9 && channels_on(enabled, 6..9) {
        let mut s = to_arr(&value.scale);
        clamp_vec3(&mut s, &enabled[6..9], to_arr(&min.scale), to_arr(&max.scale));
        value.scale = nalgebra::Vector3::new(s[0], s[1], s[2]);
    }
}

/// Clamp a control value channel by channel. Values whose storage does not
/// match `control_type`, or limit arrays that are too short, are left untouched.
pub fn apply_limits(
    value: &mut ControlValue,
    control_type: ControlType,
    enabled: &[LimitEnabled],
    minimum: &ControlValue,
    maximum: &ControlValue,
) {
    if enabled.len() < control_type.limit_channels() || !enabled.iter().any(LimitEnabled::is_on) {
        return;
    }
    match (value, minimum, maximum) {
        (ControlValue::Float(v), ControlValue::Float(min), ControlValue::Float(max)) => {
            *v = enabled[0].apply(*v, *min, *max);
        }
        (ControlValue::Integer(v), ControlValue::Integer(min), ControlValue::Integer(max)) => {
            *v = enabled[0].apply(*v as f32, *min as f32, *max as f32).round() as i32;
        }
        (ControlValue::Vector2D(v), ControlValue::Vector2D(min), ControlValue::Vector2D(max)) => {
            v[0] = enabled[0].apply(v[0], min[0], max[0]);
            v[1] = enabled[1].apply(v[1], min[1], max[1]);
        }
        // Rotator values are Euler vectors, so they clamp per stored component too.
        (ControlValue::Vector(v), ControlValue::Vector(min), ControlValue::Vector(max)) => {
            clamp_vec3(v, enabled, *min, *max);
        }
        (ControlValue::Transform(v), ControlValue::Transform(min), ControlValue::Transform(max)) => {
            clamp_transform(v, enabled, min, max);
        }
        (
            ControlValue::TransformNoScale(v),
            ControlValue::TransformNoScale(min),
            ControlValue::TransformNoScale(max),
        ) => {
            let mut full = Transform::from(*v);
            clamp_transform(&mut full, &enabled[0..6], &(*min).into(), &(*max).into());
            *v = full.into();
        }
        (
            ControlValue::EulerTransform(v),
            ControlValue::EulerTransform(min),
            ControlValue::EulerTransform(max),
        ) => {
            if channels_on(enabled, 0..3) {
                let mut t = to_arr(&v.translation);
                clamp_vec3(&mut t, &enabled[0..3], to_arr(&min.translation), to_arr(&max.translation));
                v.translation = nalgebra::Vector3::new(t[0], t[1], t[2]);
            }
            if channels_on(enabled, 3..6) {
                v.rotation = clamp_rotator(v.rotation, &enabled[3..6], min.rotation, max.rotation);
            }
            if channels_on(enabled, 6..9) {
                let mut s = to_arr(&v.scale);
                clamp_vec3(&mut s, &enabled[6..9], to_arr(&min.scale), to_arr(&max.scale));
                v.scale = nalgebra::Vector3::new(s[0], s[1], s[2]);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use nalgebra::Vector3;

    #[test]
    fn float_clamps_both_ends() {
        let limits = ControlLimits::uniform(
            ControlType::Float,
            ControlValue::Float(0.0),
            ControlValue::Float(1.0),
        );
        let mut v = ControlValue::Float(1.5);
        limits.apply(&mut v, ControlType::Float);
        assert_eq!(v, ControlValue::Float(1.0));
        let mut v = ControlValue::Float(-3.0);
        limits.apply(&mut v, ControlType::Float);
        assert_eq!(v, ControlValue::Float(0.0));
    }

    #[test]
    fn only_enabled_bounds_apply() {
        let limits = ControlLimits {
            enabled: vec![LimitEnabled {
                minimum: true,
                maximum: false,
            }],
            minimum: ControlValue::Float(0.0),
            maximum: ControlValue::Float(1.0),
        };
        let mut v = ControlValue::Float(5.0);
        limits.apply(&mut v, ControlType::Float);
        assert_eq!(v, ControlValue::Float(5.0));
    }

    #[test]
    fn inverted_bounds_do_not_panic() {
        let e = LimitEnabled::new(true);
        assert_eq!(e.apply(0.5, 1.0, 0.0), 0.0);
    }

    #[test]
    fn transform_translation_channels() {
        let mut enabled = vec![LimitEnabled::default(); 9];
        enabled[2] = LimitEnabled::new(true);
        let min = Transform::from_translation(Vector3::new(0.0, 0.0, -1.0));
        let max = Transform::from_translation(Vector3::new(0.0, 0.0, 1.0));
        let mut v = ControlValue::Transform(Transform::from_translation(Vector3::new(7.0, 7.0, 7.0)));
        apply_limits(
            &mut v,
            ControlType::Transform,
            &enabled,
            &ControlValue::Transform(min),
            &ControlValue::Transform(max),
        );
        let t = v.as_transform().unwrap();
        assert_abs_diff_eq!(t.translation.x, 7.0);
        assert_abs_diff_eq!(t.translation.z, 1.0);
    }

    #[test]
    fn moving_a_bound_drags_the_other() {
        let mut limits = ControlLimits::uniform(
            ControlType::Float,
            ControlValue::Float(0.0),
            ControlValue::Float(1.0),
        );
        limits.set_minimum(ControlType::Float, ControlValue::Float(2.0));
        assert_eq!(limits.maximum, ControlValue::Float(2.0));
        limits.set_maximum(ControlType::Float, ControlValue::Float(-1.0));
        assert_eq!(limits.minimum, ControlValue::Float(-1.0));
    }

    #[test]
    fn short_limit_arrays_are_ignored() {
        let mut v = ControlValue::Vector([5.0, 5.0, 5.0]);
        apply_limits(
            &mut v,
            ControlType::Position,
            &[LimitEnabled::new(true)],
            &ControlValue::Vector([0.0; 3]),
            &ControlValue::Vector([1.0; 3]),
        );
        assert_eq!(v, ControlValue::Vector([5.0, 5.0, 5.0]));
    }
}
