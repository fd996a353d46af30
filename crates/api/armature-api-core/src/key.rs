//! Element keys and element type masks.
//!
//! Text form (used by fixtures and diagnostics):
//!   Type:Name
//!   "Bone:Root" -> ElementKey { name: "Root", element_type: Bone }
//!   "Control:Arm_Ctrl" -> ElementKey { name: "Arm_Ctrl", element_type: Control }
//!
//! Keys deserialize from either the text form or `{ "name": .., "type": .. }`
//! and always serialize to the struct form.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::str::FromStr;

use crate::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ElementType {
    Bone,
    Null,
    Control,
    Curve,
    Physics,
    Reference,
    Connector,
}

impl ElementType {
    pub const ALL: [ElementType; 7] = [
        ElementType::Bone,
        ElementType::Null,
        ElementType::Control,
        ElementType::Curve,
        ElementType::Physics,
        ElementType::Reference,
        ElementType::Connector,
    ];

    pub fn mask(self) -> ElementTypeMask {
        match self {
            ElementType::Bone => ElementTypeMask::BONE,
            ElementType::Null => ElementTypeMask::NULL,
            ElementType::Control => ElementTypeMask::CONTROL,
            ElementType::Curve => ElementTypeMask::CURVE,
            ElementType::Physics => ElementTypeMask::PHYSICS,
            ElementType::Reference => ElementTypeMask::REFERENCE,
            ElementType::Connector => ElementTypeMask::CONNECTOR,
        }
    }

    /// Whether elements of this type carry the four transform slots.
    pub fn is_transform(self) -> bool {
        !matches!(self, ElementType::Curve | ElementType::Connector)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ElementType::Bone => "Bone",
            ElementType::Null => "Null",
            ElementType::Control => "Control",
            ElementType::Curve => "Curve",
            ElementType::Physics => "Physics",
            ElementType::Reference => "Reference",
            ElementType::Connector => "Connector",
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ElementType {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ElementType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str().eq_ignore_ascii_case(s) || (s.eq_ignore_ascii_case("space") && *t == ElementType::Null))
            .ok_or_else(|| ApiError::UnknownElementType(s.to_string()))
    }
}

/// Bit set over [`ElementType`], used to filter poses and resets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ElementTypeMask(pub u16);

impl ElementTypeMask {
    pub const NONE: ElementTypeMask = ElementTypeMask(0);
    pub const BONE: ElementTypeMask = ElementTypeMask(0x01);
    pub const NULL: ElementTypeMask = ElementTypeMask(0x02);
    pub const CONTROL: ElementTypeMask = ElementTypeMask(0x04);
    pub const CURVE: ElementTypeMask = ElementTypeMask(0x08);
    pub const PHYSICS: ElementTypeMask = ElementTypeMask(0x10);
    pub const REFERENCE: ElementTypeMask = ElementTypeMask(0x20);
    pub const CONNECTOR: ElementTypeMask = ElementTypeMask(0x40);
    pub const ALL: ElementTypeMask = ElementTypeMask(0x7f);
    /// Element types whose current values are restored after a construction run.
    pub const TO_RESET_AFTER_CONSTRUCTION: ElementTypeMask = ElementTypeMask(0x01 | 0x04 | 0x08);

    pub fn contains(self, element_type: ElementType) -> bool {
        self.0 & element_type.mask().0 != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn from_types(types: &[ElementType]) -> Self {
        types
            .iter()
            .fold(ElementTypeMask::NONE, |mask, t| mask | t.mask())
    }
}

impl BitOr for ElementTypeMask {
    type Output = ElementTypeMask;

    fn bitor(self, rhs: Self) -> Self::Output {
        ElementTypeMask(self.0 | rhs.0)
    }
}

impl BitOrAssign for ElementTypeMask {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl From<ElementType> for ElementTypeMask {
    fn from(value: ElementType) -> Self {
        value.mask()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "ElementKeyRepr")]
pub struct ElementKey {
    pub name: String,
    #[serde(rename = "type")]
    pub element_type: ElementType,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ElementKeyRepr {
    Text(String),
    Struct {
        name: String,
        #[serde(rename = "type")]
        element_type: ElementType,
    },
}

impl TryFrom<ElementKeyRepr> for ElementKey {
    type Error = ApiError;

    fn try_from(value: ElementKeyRepr) -> Result<Self, Self::Error> {
        match value {
            ElementKeyRepr::Text(text) => text.parse(),
            ElementKeyRepr::Struct { name, element_type } => Ok(ElementKey { name, element_type }),
        }
    }
}

pub const WORLD_SPACE_NAME: &str = "WorldSpace";
pub const DEFAULT_PARENT_NAME: &str = "DefaultParent";

impl ElementKey {
    pub fn new(name: impl Into<String>, element_type: ElementType) -> Self {
        Self {
            name: name.into(),
            element_type,
        }
    }

    pub fn bone(name: impl Into<String>) -> Self {
        Self::new(name, ElementType::Bone)
    }

    pub fn null(name: impl Into<String>) -> Self {
        Self::new(name, ElementType::Null)
    }

    pub fn control(name: impl Into<String>) -> Self {
        Self::new(name, ElementType::Control)
    }

    pub fn curve(name: impl Into<String>) -> Self {
        Self::new(name, ElementType::Curve)
    }

    pub fn physics(name: impl Into<String>) -> Self {
        Self::new(name, ElementType::Physics)
    }

    pub fn reference(name: impl Into<String>) -> Self {
        Self::new(name, ElementType::Reference)
    }

    pub fn connector(name: impl Into<String>) -> Self {
        Self::new(name, ElementType::Connector)
    }

    /// Switch target meaning "no parent contributes".
    pub fn world_space() -> Self {
        Self::reference(WORLD_SPACE_NAME)
    }

    /// Switch target meaning "the first parent of the child".
    pub fn default_parent() -> Self {
        Self::reference(DEFAULT_PARENT_NAME)
    }

    pub fn is_world_space(&self) -> bool {
        self.element_type == ElementType::Reference && self.name == WORLD_SPACE_NAME
    }

    pub fn is_default_parent(&self) -> bool {
        self.element_type == ElementType::Reference && self.name == DEFAULT_PARENT_NAME
    }

    pub fn is_valid(&self) -> bool {
        !self.name.is_empty()
    }

    /// Parse a key according to the `Type:Name` grammar described above.
    pub fn parse(s: &str) -> Result<Self, ApiError> {
        let (kind, name) = s
            .split_once(':')
            .ok_or_else(|| ApiError::InvalidKey(s.to_string()))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(ApiError::InvalidKey(s.to_string()));
        }
        let element_type = kind.trim().parse::<ElementType>()?;
        Ok(Self::new(name, element_type))
    }
}

impl fmt::Display for ElementKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.element_type, self.name)
    }
}

impl FromStr for ElementKey {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ElementKey::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_display() {
        let key = ElementKey::parse("Bone:Root").expect("parse");
        assert_eq!(key, ElementKey::bone("Root"));
        assert_eq!(key.to_string(), "Bone:Root");
        assert_eq!("space:Pelvis_Space".parse::<ElementKey>().unwrap().element_type, ElementType::Null);
    }

    #[test]
    fn invalid_keys() {
        assert!(ElementKey::parse("Root").is_err());
        assert!(ElementKey::parse("Bone:").is_err());
        assert!(matches!(
            ElementKey::parse("Widget:Foo"),
            Err(ApiError::UnknownElementType(_))
        ));
    }

    #[test]
    fn deserialize_both_forms() {
        let a: ElementKey = serde_json::from_str("\"Control:Arm\"").expect("text form");
        let b: ElementKey =
            serde_json::from_str(r#"{"name":"Arm","type":"Control"}"#).expect("struct form");
        assert_eq!(a, b);
        let json = serde_json::to_value(&a).unwrap();
        assert_eq!(json["type"], "Control");
    }

    #[test]
    fn masks() {
        let mask = ElementTypeMask::BONE | ElementTypeMask::CURVE;
        assert!(mask.contains(ElementType::Bone));
        assert!(mask.contains(ElementType::Curve));
        assert!(!mask.contains(ElementType::Control));
        assert!(ElementTypeMask::TO_RESET_AFTER_CONSTRUCTION.contains(ElementType::Control));
        assert!(ElementTypeMask::ALL.contains(ElementType::Connector));
        assert_eq!(
            ElementTypeMask::from_types(&[ElementType::Null, ElementType::Physics]).0,
            0x12
        );
    }
}
