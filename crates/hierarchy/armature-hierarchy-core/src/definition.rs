//! Serializable hierarchy description.
//!
//! Elements are listed parents-first; `parent` names a single full-weight
//! parent and `parents` adds weighted ones on top.

use anyhow::Context;
use armature_api_core::{ControlValue, ElementKey, ElementWeight, Transform};
use serde::{Deserialize, Serialize};

use crate::config::HierarchySettings;
use crate::control::ControlSettings;
use crate::element::{BoneType, ConnectorSettings, ElementPayload, PhysicsSolverId};
use crate::error::HierarchyError;
use crate::hierarchy::RigHierarchy;
use crate::metadata::MetadataStore;

fn full_weight() -> f32 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParentDefinition {
    pub key: ElementKey,
    #[serde(default = "full_weight")]
    pub weight: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ElementKind {
    Bone {
        #[serde(default)]
        transform: Transform,
        #[serde(default)]
        bone_type: BoneType,
    },
    Null {
        #[serde(default)]
        transform: Transform,
    },
    Control {
        #[serde(default)]
        settings: ControlSettings,
        /// Defaults to the identity value of the control type.
        #[serde(default)]
        value: Option<ControlValue>,
        #[serde(default)]
        offset: Transform,
        #[serde(default)]
        shape: Transform,
    },
    Curve {
        #[serde(default)]
        value: f32,
    },
    Physics {
        #[serde(default)]
        solver: Option<String>,
        #[serde(default)]
        transform: Transform,
    },
    Reference {},
    Connector {
        #[serde(default)]
        settings: ConnectorSettings,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<ElementKey>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parents: Vec<ParentDefinition>,
    #[serde(default, skip_serializing_if = "MetadataStore::is_empty")]
    pub metadata: MetadataStore,
    #[serde(flatten)]
    pub kind: ElementKind,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HierarchyDefinition {
    #[serde(default)]
    pub settings: HierarchySettings,
    #[serde(default)]
    pub elements: Vec<ElementDefinition>,
}

impl HierarchyDefinition {
    pub fn from_json_str(json: &str) -> anyhow::Result<Self> {
        serde_json::from_str(json).context("parsing hierarchy definition")
    }

    pub fn to_json_string(&self) -> anyhow::Result<String> {
        serde_json::to_string_pretty(self).context("serializing hierarchy definition")
    }

    /// Create a fresh hierarchy from this definition.
    pub fn build(&self) -> Result<RigHierarchy, HierarchyError> {
        let mut hierarchy = RigHierarchy::with_settings(self.settings.clone());
        self.build_into(&mut hierarchy)?;
        Ok(hierarchy)
    }

    /// Append the definition's elements to an existing hierarchy.
    pub fn build_into(&self, hierarchy: &mut RigHierarchy) -> Result<Vec<ElementKey>, HierarchyError> {
        let mut created = Vec::with_capacity(self.elements.len());
        for def in &self.elements {
            let key = {
                let mut controller = hierarchy
                    .controller()
                    .ok_or(HierarchyError::ControllerUnavailable)?;
                let parent = def.parent.as_ref();
                let key = match &def.kind {
                    ElementKind::Bone {
                        transform,
                        bone_type,
                    } => controller.add_bone(&def.name, parent, *transform, false, *bone_type)?,
                    ElementKind::Null { transform } => {
                        controller.add_null(&def.name, parent, *transform, false)?
                    }
                    ElementKind::Control {
                        settings,
                        value,
                        offset,
                        shape,
                    } => {
                        let mut settings = settings.clone();
                        settings.sanitize();
                        let value = value.unwrap_or_else(|| settings.identity_value());
                        controller.add_control(&def.name, parent, settings, value, *offset, *shape)?
                    }
                    ElementKind::Curve { value } => controller.add_curve(&def.name, *value)?,
                    ElementKind::Physics { solver, transform } => {
                        let solver = solver
                            .as_deref()
                            .map(PhysicsSolverId::from_name)
                            .unwrap_or_default();
                        controller.add_physics(&def.name, parent, solver, *transform)?
                    }
                    ElementKind::Reference {} => controller.add_reference(&def.name, parent)?,
                    ElementKind::Connector { settings } => {
                        controller.add_connector(&def.name, settings.clone())?
                    }
                };
                for extra in &def.parents {
                    controller.add_parent(&key, &extra.key, extra.weight, false)?;
                }
                key
            };
            for (name, value) in def.metadata.iter() {
                hierarchy.set_metadata(&key, name, value.clone())?;
            }
            created.push(key);
        }
        Ok(created)
    }

    /// Describe the initial pose of `hierarchy`.
    pub fn from_hierarchy(hierarchy: &RigHierarchy) -> Self {
        let elements = hierarchy
            .iter()
            .map(|element| {
                let parents = element.parents();
                let (parent, parents) = match parents {
                    [single] if single.weight(true) == ElementWeight::FULL => (
                        hierarchy.get(single.parent).map(|p| p.key().clone()),
                        Vec::new(),
                    ),
                    _ => (
                        None,
                        parents
                            .iter()
                            .filter_map(|p| {
                                hierarchy.get(p.parent).map(|e| ParentDefinition {
                                    key: e.key().clone(),
                                    weight: p.weight(true).location,
                                })
                            })
                            .collect(),
                    ),
                };
                let local = element
                    .pose()
                    .map(|_| hierarchy.local_at(element.index(), true))
                    .unwrap_or_default();
                let kind = match element.payload() {
                    ElementPayload::Bone { bone_type, .. } => ElementKind::Bone {
                        transform: local,
                        bone_type: *bone_type,
                    },
                    ElementPayload::Null { .. } => ElementKind::Null { transform: local },
                    ElementPayload::Control(control) => ElementKind::Control {
                        settings: control.settings.clone(),
                        value: Some(control.values.initial),
                        offset: control.offset.initial,
                        shape: control.shape.initial,
                    },
                    ElementPayload::Curve(curve) => ElementKind::Curve { value: curve.value },
                    ElementPayload::Physics { .. } => ElementKind::Physics {
                        solver: None,
                        transform: local,
                    },
                    ElementPayload::Reference { .. } => ElementKind::Reference {},
                    ElementPayload::Connector(settings) => ElementKind::Connector {
                        settings: settings.clone(),
                    },
                };
                ElementDefinition {
                    name: element.name().to_string(),
                    parent,
                    parents,
                    metadata: element.metadata().clone(),
                    kind,
                }
            })
            .collect();
        Self {
            settings: hierarchy.settings().clone(),
            elements,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use armature_api_core::{ElementType, Vector3};

    #[test]
    fn weighted_parents_and_metadata() {
        let h = HierarchyDefinition::from_json_str(
            r#"{"elements":[
                {"type":"Null","name":"A","transform":{"translation":[2,0,0]}},
                {"type":"Null","name":"B","transform":{"translation":[0,2,0]}},
                {"type":"Null","name":"Mid","parents":[{"key":"Null:A","weight":1.0},{"key":"Null:B","weight":1.0}],
                 "metadata":{"side":{"kind":"Name","value":"center"}}},
                {"type":"Connector","name":"Root","settings":{"optional":true}}
            ]}"#,
        )
        .unwrap()
        .build()
        .unwrap();
        let mid = ElementKey::null("Mid");
        assert_eq!(h.parents(&mid).len(), 2);
        let g = h.global_transform(&mid, true).unwrap();
        assert_relative_eq!(g.translation, Vector3::new(1.0, 1.0, 0.0), epsilon = 1e-6);
        assert!(h.get_metadata(&mid, "side").is_some());
        assert!(h.find(&ElementKey::connector("Root")).unwrap().connector().unwrap().optional);
    }

    #[test]
    fn unknown_parent_is_an_error() {
        let def = HierarchyDefinition::from_json_str(
            r#"{"elements":[{"type":"Bone","name":"Orphan","parent":"Bone:Nope"}]}"#,
        )
        .unwrap();
        assert!(matches!(def.build(), Err(HierarchyError::ElementNotFound(_))));
        assert!(HierarchyDefinition::from_json_str(r#"{"elements":[{"type":"Widget","name":"x"}]}"#).is_err());
    }

    #[test]
    fn export_rebuilds_the_same_initial_pose() {
        let original = HierarchyDefinition::from_json_str(
            r#"{"elements":[
                {"type":"Bone","name":"Root","transform":{"translation":[0,0,1]}},
                {"type":"Bone","name":"Arm","parent":"Bone:Root","transform":{"translation":[1,0,0]}},
                {"type":"Curve","name":"Smile","value":0.5}
            ]}"#,
        )
        .unwrap()
        .build()
        .unwrap();
        let rebuilt = HierarchyDefinition::from_hierarchy(&original).build().unwrap();
        assert_eq!(rebuilt.keys(), original.keys());
        let arm = rebuilt.global_transform(&ElementKey::bone("Arm"), true).unwrap();
        assert_relative_eq!(arm.translation, Vector3::new(1.0, 0.0, 1.0), epsilon = 1e-6);
        assert_eq!(rebuilt.keys_of_type(ElementType::Curve.mask()).len(), 1);
    }
}
