//! Typed, namespaced per-element metadata.
//!
//! Names are stored fully qualified: `namespace:name` when a namespace is
//! given, the bare name otherwise. Tags live under [`TAGS_NAME`] as a name
//! array.

use armature_api_core::{ElementKey, Rotator, Transform};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub const TAGS_NAME: &str = "Tags";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum MetadataValue {
    Bool(bool),
    Float(f32),
    Int32(i32),
    Name(String),
    Vector([f32; 3]),
    Rotator(Rotator),
    Quat([f32; 4]),
    Transform(Transform),
    LinearColor([f32; 4]),
    ElementKey(ElementKey),
    BoolArray(Vec<bool>),
    FloatArray(Vec<f32>),
    Int32Array(Vec<i32>),
    NameArray(Vec<String>),
    VectorArray(Vec<[f32; 3]>),
    RotatorArray(Vec<Rotator>),
    QuatArray(Vec<[f32; 4]>),
    TransformArray(Vec<Transform>),
    LinearColorArray(Vec<[f32; 4]>),
    ElementKeyArray(Vec<ElementKey>),
}

impl MetadataValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            MetadataValue::Bool(_) => "Bool",
            MetadataValue::Float(_) => "Float",
            MetadataValue::Int32(_) => "Int32",
            MetadataValue::Name(_) => "Name",
            MetadataValue::Vector(_) => "Vector",
            MetadataValue::Rotator(_) => "Rotator",
            MetadataValue::Quat(_) => "Quat",
            MetadataValue::Transform(_) => "Transform",
            MetadataValue::LinearColor(_) => "LinearColor",
            MetadataValue::ElementKey(_) => "ElementKey",
            MetadataValue::BoolArray(_) => "BoolArray",
            MetadataValue::FloatArray(_) => "FloatArray",
            MetadataValue::Int32Array(_) => "Int32Array",
            MetadataValue::NameArray(_) => "NameArray",
            MetadataValue::VectorArray(_) => "VectorArray",
            MetadataValue::RotatorArray(_) => "RotatorArray",
            MetadataValue::QuatArray(_) => "QuatArray",
            MetadataValue::TransformArray(_) => "TransformArray",
            MetadataValue::LinearColorArray(_) => "LinearColorArray",
            MetadataValue::ElementKeyArray(_) => "ElementKeyArray",
        }
    }

    pub fn same_type(&self, other: &MetadataValue) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

/// Qualify `name` with `namespace` (empty namespace leaves it untouched).
pub fn qualified_name(namespace: &str, name: &str) -> String {
    if namespace.is_empty() || name.contains(':') {
        name.to_string()
    } else {
        format!("{namespace}:{name}")
    }
}

/// Insertion-ordered metadata of one element.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetadataStore {
    entries: IndexMap<String, MetadataValue>,
}

impl MetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&MetadataValue> {
        self.entries.get(name)
    }

    /// Insert or replace. Returns `false` when an entry of a different type
    /// already exists under `name`, leaving it untouched.
    pub fn set(&mut self, name: impl Into<String>, value: MetadataValue) -> bool {
        let name = name.into();
        match self.entries.get_mut(&name) {
            Some(existing) if !existing.same_type(&value) => false,
            Some(existing) => {
                *existing = value;
                true
            }
            None => {
                self.entries.insert(name, value);
                true
            }
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<MetadataValue> {
        self.entries.shift_remove(name)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetadataValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn tags(&self) -> &[String] {
        match self.entries.get(TAGS_NAME) {
            Some(MetadataValue::NameArray(tags)) => tags,
            _ => &[],
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags().iter().any(|t| t == tag)
    }

    /// Add `tag` once. Returns `false` if it was already present.
    pub fn add_tag(&mut self, tag: &str) -> bool {
        if self.has_tag(tag) {
            return false;
        }
        match self.entries.get_mut(TAGS_NAME) {
            Some(MetadataValue::NameArray(tags)) => tags.push(tag.to_string()),
            _ => {
                self.entries.insert(
                    TAGS_NAME.to_string(),
                    MetadataValue::NameArray(vec![tag.to_string()]),
                );
            }
        }
        true
    }

    pub fn remove_tag(&mut self, tag: &str) -> bool {
        match self.entries.get_mut(TAGS_NAME) {
            Some(MetadataValue::NameArray(tags)) => {
                let before = tags.len();
                tags.retain(|t| t != tag);
                before != tags.len()
            }
            _ => false,
        }
    }
}
