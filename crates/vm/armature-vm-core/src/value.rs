//! Register values flowing between rig units.

use armature_api_core::{
    ControlType, ControlValue, ElementKey, Rotator, Transform, TransformNoScale, Vector3,
};
use armature_hierarchy_core::MetadataValue;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum VmValue {
    #[default]
    None,
    Bool(bool),
    Float(f32),
    Int(i32),
    Vector([f32; 3]),
    Rotator(Rotator),
    Transform(Transform),
    Key(ElementKey),
    Name(String),
    Control(ControlValue),
}

impl VmValue {
    pub fn kind_name(&self) -> &'static str {
        match self {
            VmValue::None => "none",
            VmValue::Bool(_) => "bool",
            VmValue::Float(_) => "float",
            VmValue::Int(_) => "int",
            VmValue::Vector(_) => "vector",
            VmValue::Rotator(_) => "rotator",
            VmValue::Transform(_) => "transform",
            VmValue::Key(_) => "key",
            VmValue::Name(_) => "name",
            VmValue::Control(_) => "control",
        }
    }

    pub fn same_kind(&self, other: &VmValue) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            VmValue::Bool(b) => Some(*b),
            VmValue::Control(ControlValue::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match self {
            VmValue::Float(f) => Some(*f),
            VmValue::Int(i) => Some(*i as f32),
            VmValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            VmValue::Control(c) => c.as_float(),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            VmValue::Int(i) => Some(*i),
            VmValue::Float(f) => Some(f.round() as i32),
            VmValue::Control(c) => c.as_integer(),
            _ => None,
        }
    }

    pub fn as_vector(&self) -> Option<[f32; 3]> {
        match self {
            VmValue::Vector(v) => Some(*v),
            VmValue::Rotator(r) => Some(r.euler()),
            VmValue::Control(c) => c.as_vector(),
            _ => None,
        }
    }

    pub fn as_rotator(&self) -> Option<Rotator> {
        match self {
            VmValue::Rotator(r) => Some(*r),
            VmValue::Vector(v) => Some(Rotator::from_euler(*v)),
            VmValue::Transform(t) => Some(t.rotator()),
            _ => None,
        }
    }

    pub fn as_transform(&self) -> Option<Transform> {
        match self {
            VmValue::Transform(t) => Some(*t),
            VmValue::Control(c) => c.as_transform(),
            _ => None,
        }
    }

    pub fn as_key(&self) -> Option<&ElementKey> {
        match self {
            VmValue::Key(k) => Some(k),
            _ => None,
        }
    }

    pub fn as_name(&self) -> Option<&str> {
        match self {
            VmValue::Name(n) => Some(n),
            _ => None,
        }
    }

    /// Storage for a control of `control_type`, if this value can supply it.
    pub fn to_control_value(&self, control_type: ControlType) -> Option<ControlValue> {
        if let VmValue::Control(value) = self {
            return value.matches(control_type).then_some(*value);
        }
        let value = match control_type {
            ControlType::Bool => ControlValue::Bool(self.as_bool()?),
            ControlType::Float | ControlType::ScaleFloat => ControlValue::Float(self.as_float()?),
            ControlType::Integer => ControlValue::Integer(self.as_int()?),
            ControlType::Vector2D => {
                let v = self.as_vector()?;
                ControlValue::Vector2D([v[0], v[1]])
            }
            ControlType::Position | ControlType::Scale | ControlType::Rotator => {
                ControlValue::Vector(self.as_vector()?)
            }
            ControlType::Transform => ControlValue::Transform(self.as_transform()?),
            ControlType::TransformNoScale => {
                ControlValue::TransformNoScale(TransformNoScale::from(self.as_transform()?))
            }
            ControlType::EulerTransform => ControlValue::EulerTransform(self.as_transform()?.into()),
        };
        Some(value)
    }

    pub fn to_metadata(&self) -> Option<MetadataValue> {
        Some(match self {
            VmValue::Bool(b) => MetadataValue::Bool(*b),
            VmValue::Float(f) => MetadataValue::Float(*f),
            VmValue::Int(i) => MetadataValue::Int32(*i),
            VmValue::Vector(v) => MetadataValue::Vector(*v),
            VmValue::Rotator(r) => MetadataValue::Rotator(*r),
            VmValue::Transform(t) => MetadataValue::Transform(*t),
            VmValue::Key(k) => MetadataValue::ElementKey(k.clone()),
            VmValue::Name(n) => MetadataValue::Name(n.clone()),
            VmValue::None | VmValue::Control(_) => return None,
        })
    }

    pub fn from_metadata(value: &MetadataValue) -> VmValue {
        match value {
            MetadataValue::Bool(b) => VmValue::Bool(*b),
            MetadataValue::Float(f) => VmValue::Float(*f),
            MetadataValue::Int32(i) => VmValue::Int(*i),
            MetadataValue::Name(n) => VmValue::Name(n.clone()),
            MetadataValue::Vector(v) => VmValue::Vector(*v),
            MetadataValue::Rotator(r) => VmValue::Rotator(*r),
            MetadataValue::Transform(t) => VmValue::Transform(*t),
            MetadataValue::ElementKey(k) => VmValue::Key(k.clone()),
            _ => VmValue::None,
        }
    }

    pub fn vector3(&self) -> Option<Vector3<f32>> {
        self.as_vector().map(|v| Vector3::new(v[0], v[1], v[2]))
    }
}

impl From<ControlValue> for VmValue {
    fn from(value: ControlValue) -> Self {
        VmValue::Control(value)
    }
}

impl From<Transform> for VmValue {
    fn from(value: Transform) -> Self {
        VmValue::Transform(value)
    }
}

impl From<f32> for VmValue {
    fn from(value: f32) -> Self {
        VmValue::Float(value)
    }
}

impl From<ElementKey> for VmValue {
    fn from(value: ElementKey) -> Self {
        VmValue::Key(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_values_coerce_to_control_storage() {
        assert_eq!(
            VmValue::Float(0.5).to_control_value(ControlType::Float),
            Some(ControlValue::Float(0.5))
        );
        assert_eq!(
            VmValue::Rotator(Rotator::new(10.0, 20.0, 30.0)).to_control_value(ControlType::Rotator),
            Some(ControlValue::Vector([30.0, 10.0, 20.0]))
        );
        assert_eq!(VmValue::Name("x".into()).to_control_value(ControlType::Float), None);
        assert_eq!(
            VmValue::Control(ControlValue::Bool(true)).to_control_value(ControlType::Float),
            None
        );
    }

    #[test]
    fn serde_form() {
        let v: VmValue = serde_json::from_str(r#"{"kind":"key","value":"Bone:hand_l"}"#).unwrap();
        assert_eq!(v, VmValue::Key(ElementKey::bone("hand_l")));
        let none: VmValue = serde_json::from_str(r#"{"kind":"none"}"#).unwrap();
        assert_eq!(none, VmValue::None);
    }
}
