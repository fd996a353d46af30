//! Conversions between control values and transforms.
//!
//! Mapping per control type:
//! - Bool: location.x (> SMALL_NUMBER means true)
//! - Float / Integer: location along the primary axis
//! - ScaleFloat: uniform scale, read back from scale.x
//! - Vector2D: location with the primary axis dropped
//! - Position / Scale: location / scale
//! - Rotator: rotation, keeping the winding of the previous value
//! - Transform variants: direct

use nalgebra::Vector3;

use crate::error::ApiError;
use crate::rotator::Rotator;
use crate::transform::{EulerTransform, Transform, TransformNoScale, SMALL_NUMBER};
use crate::value::{ControlAxis, ControlType, ControlValue};

fn along_axis(value: f32, axis: ControlAxis) -> Vector3<f32> {
    let mut v = Vector3::zeros();
    v[axis.index()] = value;
    v
}

fn plane_for_axis(xy: [f32; 2], axis: ControlAxis) -> Vector3<f32> {
    match axis {
        ControlAxis::X => Vector3::new(0.0, xy[0], xy[1]),
        ControlAxis::Y => Vector3::new(xy[0], 0.0, xy[1]),
        ControlAxis::Z => Vector3::new(xy[0], xy[1], 0.0),
    }
}

fn mismatch(control_type: ControlType, value: &ControlValue) -> ApiError {
    ApiError::ValueTypeMismatch {
        expected: control_type,
        found: value.kind_name(),
    }
}

/// Encode a control value as a transform.
pub fn value_to_transform(
    value: &ControlValue,
    control_type: ControlType,
    axis: ControlAxis,
) -> Result<Transform, ApiError> {
    let mut transform = Transform::identity();
    match (control_type, value) {
        (ControlType::Bool, ControlValue::Bool(b)) => {
            transform.translation = Vector3::new(if *b { 1.0 } else { 0.0 }, 0.0, 0.0);
        }
        (ControlType::Float, ControlValue::Float(f)) => {
            transform.translation = along_axis(*f, axis);
        }
        (ControlType::Integer, ControlValue::Integer(i)) => {
            transform.translation = along_axis(*i as f32, axis);
        }
        (ControlType::ScaleFloat, ControlValue::Float(f)) => {
            transform.scale = Vector3::new(*f, *f, *f);
        }
        (ControlType::Vector2D, ControlValue::Vector2D(xy)) => {
            transform.translation = plane_for_axis(*xy, axis);
        }
        (ControlType::Position, ControlValue::Vector(v)) => {
            transform.translation = Vector3::new(v[0], v[1], v[2]);
        }
        (ControlType::Scale, ControlValue::Vector(v)) => {
            transform.scale = Vector3::new(v[0], v[1], v[2]);
        }
        (ControlType::Rotator, ControlValue::Vector(v)) => {
            transform.rotation = Rotator::from_euler(*v).to_quaternion();
        }
        (ControlType::Transform, ControlValue::Transform(t)) => {
            transform = t.with_normalized_rotation();
        }
        (ControlType::TransformNoScale, ControlValue::TransformNoScale(t)) => {
            transform = Transform::from(*t).with_normalized_rotation();
        }
        (ControlType::EulerTransform, ControlValue::EulerTransform(t)) => {
            transform = Transform::from(*t).with_normalized_rotation();
        }
        _ => return Err(mismatch(control_type, value)),
    }
    Ok(transform)
}

/// Decode a transform into a control value.
///
/// `previous` is consulted for Rotator controls so angles beyond ±180° keep
/// their winding across a round trip.
pub fn value_from_transform(
    transform: &Transform,
    control_type: ControlType,
    axis: ControlAxis,
    previous: Option<&ControlValue>,
) -> ControlValue {
    let location = transform.translation;
    match control_type {
        ControlType::Bool => ControlValue::Bool(location.x > SMALL_NUMBER),
        ControlType::Float => ControlValue::Float(location[axis.index()]),
        ControlType::Integer => ControlValue::Integer(location[axis.index()] as i32),
        ControlType::ScaleFloat => ControlValue::Float(transform.scale.x),
        ControlType::Vector2D => ControlValue::Vector2D(match axis {
            ControlAxis::X => [location.y, location.z],
            ControlAxis::Y => [location.x, location.z],
            ControlAxis::Z => [location.x, location.y],
        }),
        ControlType::Position => ControlValue::Vector([location.x, location.y, location.z]),
        ControlType::Scale => {
            ControlValue::Vector([transform.scale.x, transform.scale.y, transform.scale.z])
        }
        ControlType::Rotator => {
            let current = previous
                .and_then(ControlValue::as_rotator)
                .unwrap_or(Rotator::ZERO);
            let (_, remainder) = current.winding_and_remainder();
            let target = Rotator::from_quaternion(&transform.rotation);
            let delta = (target - remainder).normalized();
            ControlValue::Vector((current + delta).euler())
        }
        ControlType::Transform => ControlValue::Transform(*transform),
        ControlType::TransformNoScale => {
            ControlValue::TransformNoScale(TransformNoScale::from(*transform))
        }
        ControlType::EulerTransform => {
            let mut euler = EulerTransform::from(*transform);
            if let Some(ControlValue::EulerTransform(prev)) = previous {
                let (_, remainder) = prev.rotation.winding_and_remainder();
                let delta = (euler.rotation - remainder).normalized();
                euler.rotation = prev.rotation + delta;
            }
            ControlValue::EulerTransform(euler)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn float_uses_primary_axis() {
        let t = value_to_transform(&ControlValue::Float(2.5), ControlType::Float, ControlAxis::Y)
            .unwrap();
        assert_eq!(t.translation, Vector3::new(0.0, 2.5, 0.0));
        assert_eq!(
            value_from_transform(&t, ControlType::Float, ControlAxis::Y, None),
            ControlValue::Float(2.5)
        );
        assert_eq!(
            value_from_transform(&t, ControlType::Float, ControlAxis::X, None),
            ControlValue::Float(0.0)
        );
    }

    #[test]
    fn vector2d_drops_primary_axis() {
        let t = value_to_transform(
            &ControlValue::Vector2D([3.0, 4.0]),
            ControlType::Vector2D,
            ControlAxis::X,
        )
        .unwrap();
        assert_eq!(t.translation, Vector3::new(0.0, 3.0, 4.0));
        let t = value_to_transform(
            &ControlValue::Vector2D([3.0, 4.0]),
            ControlType::Vector2D,
            ControlAxis::Z,
        )
        .unwrap();
        assert_eq!(t.translation, Vector3::new(3.0, 4.0, 0.0));
    }

    #[test]
    fn bool_threshold() {
        let on = value_to_transform(&ControlValue::Bool(true), ControlType::Bool, ControlAxis::X)
            .unwrap();
        assert_eq!(
            value_from_transform(&on, ControlType::Bool, ControlAxis::X, None),
            ControlValue::Bool(true)
        );
        assert_eq!(
            value_from_transform(&Transform::identity(), ControlType::Bool, ControlAxis::X, None),
            ControlValue::Bool(false)
        );
    }

    #[test]
    fn rotator_keeps_winding() {
        let previous = ControlValue::Vector([0.0, 0.0, 370.0]);
        let t = value_to_transform(&previous, ControlType::Rotator, ControlAxis::X).unwrap();
        let decoded = value_from_transform(&t, ControlType::Rotator, ControlAxis::X, Some(&previous));
        let yaw = decoded.as_vector().unwrap()[2];
        assert_abs_diff_eq!(yaw, 370.0, epsilon = 1e-2);

        let fresh = value_from_transform(&t, ControlType::Rotator, ControlAxis::X, None);
        assert_abs_diff_eq!(fresh.as_vector().unwrap()[2], 10.0, epsilon = 1e-2);
    }

    #[test]
    fn mismatch_is_reported() {
        let err = value_to_transform(&ControlValue::Bool(true), ControlType::Float, ControlAxis::X)
            .unwrap_err();
        assert_eq!(err.category(), "value");
    }
}
