//! Typed control values.
//!
//! A [`ControlValue`] carries the raw storage of a control. Several
//! [`ControlType`]s share a storage kind (`Float` backs both Float and
//! ScaleFloat, `Vector` backs Position, Scale and Rotator).

use serde::{Deserialize, Serialize};

use crate::coercion;
use crate::error::ApiError;
use crate::rotator::Rotator;
use crate::transform::{EulerTransform, Transform, TransformNoScale};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ControlType {
    Bool,
    Float,
    Integer,
    Vector2D,
    Position,
    Scale,
    Rotator,
    #[default]
    Transform,
    TransformNoScale,
    EulerTransform,
    ScaleFloat,
}

impl ControlType {
    /// Number of limit channels a control of this type exposes.
    pub fn limit_channels(self) -> usize {
        match self {
            ControlType::Bool => 0,
            ControlType::Float | ControlType::Integer | ControlType::ScaleFloat => 1,
            ControlType::Vector2D => 2,
            ControlType::Position | ControlType::Scale | ControlType::Rotator => 3,
            ControlType::TransformNoScale => 6,
            ControlType::Transform | ControlType::EulerTransform => 9,
        }
    }

    pub fn is_transform_like(self) -> bool {
        matches!(
            self,
            ControlType::Transform | ControlType::TransformNoScale | ControlType::EulerTransform
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ControlAxis {
    #[default]
    X,
    Y,
    Z,
}

impl ControlAxis {
    pub fn index(self) -> usize {
        match self {
            ControlAxis::X => 0,
            ControlAxis::Y => 1,
            ControlAxis::Z => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ControlValue {
    Bool(bool),
    Float(f32),
    Integer(i32),
    #[serde(rename = "vector2d")]
    Vector2D([f32; 2]),
    Vector([f32; 3]),
    Transform(Transform),
    TransformNoScale(TransformNoScale),
    EulerTransform(EulerTransform),
}

impl ControlValue {
    pub fn kind_name(&self) -> &'static str {
        match self {
            ControlValue::Bool(_) => "bool",
            ControlValue::Float(_) => "float",
            ControlValue::Integer(_) => "integer",
            ControlValue::Vector2D(_) => "vector2d",
            ControlValue::Vector(_) => "vector",
            ControlValue::Transform(_) => "transform",
            ControlValue::TransformNoScale(_) => "transform_no_scale",
            ControlValue::EulerTransform(_) => "euler_transform",
        }
    }

    /// Whether this value's storage matches the given control type.
    pub fn matches(&self, control_type: ControlType) -> bool {
        matches!(
            (self, control_type),
            (ControlValue::Bool(_), ControlType::Bool)
                | (ControlValue::Float(_), ControlType::Float | ControlType::ScaleFloat)
                | (ControlValue::Integer(_), ControlType::Integer)
                | (ControlValue::Vector2D(_), ControlType::Vector2D)
                | (
                    ControlValue::Vector(_),
                    ControlType::Position | ControlType::Scale | ControlType::Rotator
                )
                | (ControlValue::Transform(_), ControlType::Transform)
                | (ControlValue::TransformNoScale(_), ControlType::TransformNoScale)
                | (ControlValue::EulerTransform(_), ControlType::EulerTransform)
        )
    }

    /// Value decoded from the identity transform: the zero/identity value for the type.
    pub fn identity(control_type: ControlType, axis: ControlAxis) -> ControlValue {
        coercion::value_from_transform(&Transform::identity(), control_type, axis, None)
    }

    pub fn to_transform(
        &self,
        control_type: ControlType,
        axis: ControlAxis,
    ) -> Result<Transform, ApiError> {
        coercion::value_to_transform(self, control_type, axis)
    }

    pub fn from_transform(
        transform: &Transform,
        control_type: ControlType,
        axis: ControlAxis,
    ) -> ControlValue {
        coercion::value_from_transform(transform, control_type, axis, None)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ControlValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match self {
            ControlValue::Float(f) => Some(*f),
            ControlValue::Integer(i) => Some(*i as f32),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i32> {
        match self {
            ControlValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_vector(&self) -> Option<[f32; 3]> {
        match self {
            ControlValue::Vector(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_rotator(&self) -> Option<Rotator> {
        self.as_vector().map(Rotator::from_euler)
    }

    pub fn as_transform(&self) -> Option<Transform> {
        match self {
            ControlValue::Transform(t) => Some(*t),
            ControlValue::TransformNoScale(t) => Some((*t).into()),
            ControlValue::EulerTransform(t) => Some((*t).into()),
            _ => None,
        }
    }
}

impl From<bool> for ControlValue {
    fn from(value: bool) -> Self {
        ControlValue::Bool(value)
    }
}

impl From<f32> for ControlValue {
    fn from(value: f32) -> Self {
        ControlValue::Float(value)
    }
}

impl From<i32> for ControlValue {
    fn from(value: i32) -> Self {
        ControlValue::Integer(value)
    }
}

impl From<Transform> for ControlValue {
    fn from(value: Transform) -> Self {
        ControlValue::Transform(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_kinds() {
        assert!(ControlValue::Float(1.0).matches(ControlType::ScaleFloat));
        assert!(ControlValue::Vector([0.0; 3]).matches(ControlType::Rotator));
        assert!(!ControlValue::Float(1.0).matches(ControlType::Integer));
        assert!(!ControlValue::Bool(true).matches(ControlType::Transform));
    }

    #[test]
    fn identity_values() {
        assert_eq!(
            ControlValue::identity(ControlType::Scale, ControlAxis::X),
            ControlValue::Vector([1.0, 1.0, 1.0])
        );
        assert_eq!(
            ControlValue::identity(ControlType::ScaleFloat, ControlAxis::X),
            ControlValue::Float(1.0)
        );
        assert_eq!(
            ControlValue::identity(ControlType::Bool, ControlAxis::X),
            ControlValue::Bool(false)
        );
        assert_eq!(
            ControlValue::identity(ControlType::Integer, ControlAxis::Z),
            ControlValue::Integer(0)
        );
    }

    #[test]
    fn json_shape() {
        let v = ControlValue::Vector2D([1.0, 2.0]);
        let json = serde_json::to_value(v).unwrap();
        assert_eq!(json["kind"], "vector2d");
        let back: ControlValue = serde_json::from_value(json).unwrap();
        assert_eq!(back, v);
    }
}
