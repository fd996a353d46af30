//! HierarchyController: structural edits (add / remove / rename / reparent).
//!
//! A controller is only handed out while [`RigHierarchy::is_controller_available`]
//! holds: outside execution, or inside a controller bracket. Every structural
//! change bumps the topology version and emits one notification.

use armature_api_core::{ControlValue, ElementKey, ElementType, ElementWeight, Transform};
use serde::{Deserialize, Serialize};

use crate::control::{ControlAnimationType, ControlSettings};
use crate::element::{
    BoneType, ConnectorSettings, ControlState, CurveState, ElementPayload, ElementPose,
    PhysicsSolverId, PoseSlots, RigElement, TransformType,
};
use crate::error::HierarchyError;
use crate::hierarchy::RigHierarchy;
use crate::notify::{HierarchyEvent, HierarchyNotification};

/// One bone of an imported skeleton.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoneImport {
    pub name: String,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub local: Transform,
}

/// Replace characters that cannot appear in element names.
pub fn sanitize_name(name: &str) -> Result<String, HierarchyError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(HierarchyError::InvalidName(name.to_string()));
    }
    Ok(trimmed
        .chars()
        .map(|c| if c.is_whitespace() || c == ':' || c == '/' { '_' } else { c })
        .collect())
}

impl RigHierarchy {
    /// Structural editing access, when available.
    pub fn controller(&mut self) -> Option<HierarchyController<'_>> {
        if !self.is_controller_available() {
            return None;
        }
        Some(HierarchyController {
            hierarchy: self,
            procedural: false,
        })
    }
}

pub struct HierarchyController<'a> {
    hierarchy: &'a mut RigHierarchy,
    procedural: bool,
}

impl<'a> HierarchyController<'a> {
    /// Flag every element added through this controller as procedural.
    pub fn procedural(mut self) -> Self {
        self.procedural = true;
        self
    }

    pub fn hierarchy(&self) -> &RigHierarchy {
        self.hierarchy
    }

    /// A free name for `element_type`, suffixing `_1`, `_2`, ... on collision.
    pub fn unique_name(&self, name: &str, element_type: ElementType) -> Result<String, HierarchyError> {
        let base = sanitize_name(name)?;
        if !self.hierarchy.contains(&ElementKey::new(base.clone(), element_type)) {
            return Ok(base);
        }
        let mut suffix = 1usize;
        loop {
            let candidate = format!("{base}_{suffix}");
            if !self.hierarchy.contains(&ElementKey::new(candidate.clone(), element_type)) {
                return Ok(candidate);
            }
            suffix += 1;
        }
    }

    fn parent_index(&self, parent: Option<&ElementKey>) -> Result<Option<usize>, HierarchyError> {
        let Some(parent) = parent else {
            return Ok(None);
        };
        let index = self.hierarchy.require(parent)?;
        if !parent.element_type.is_transform() {
            return Err(HierarchyError::InvalidParentType(parent.element_type));
        }
        Ok(Some(index))
    }

    fn add_element(
        &mut self,
        name: &str,
        payload: ElementPayload,
        parent: Option<usize>,
    ) -> Result<ElementKey, HierarchyError> {
        let element_type = payload.element_type();
        let name = self.unique_name(name, element_type)?;
        let key = ElementKey::new(name, element_type);
        let index = self.hierarchy.elements.len();
        let mut element = RigElement::new(key.clone(), payload);
        element.index = index;
        element.procedural = self.procedural;
        self.hierarchy.elements.push(element);
        self.hierarchy.index_by_key.insert(key.clone(), index);
        if let Some(parent) = parent {
            self.hierarchy.attach_parent(index, parent, ElementWeight::FULL);
        }
        self.hierarchy.bump_topology();
        self.hierarchy.notify(HierarchyNotification::ElementAdded, Some(&key));
        Ok(key)
    }

    pub fn add_bone(
        &mut self,
        name: &str,
        parent: Option<&ElementKey>,
        transform: Transform,
        global: bool,
        bone_type: BoneType,
    ) -> Result<ElementKey, HierarchyError> {
        let parent = self.parent_index(parent)?;
        let payload = ElementPayload::Bone {
            bone_type,
            pose: ElementPose::with_transform(transform.with_normalized_rotation(), global),
        };
        self.add_element(name, payload, parent)
    }

    pub fn add_null(
        &mut self,
        name: &str,
        parent: Option<&ElementKey>,
        transform: Transform,
        global: bool,
    ) -> Result<ElementKey, HierarchyError> {
        let parent = self.parent_index(parent)?;
        let payload = ElementPayload::Null {
            pose: ElementPose::with_transform(transform.with_normalized_rotation(), global),
        };
        self.add_element(name, payload, parent)
    }

    /// Add a control. `value` must match the settings' control type and is
    /// clamped by enabled limits; `offset` sits between parent and control.
    pub fn add_control(
        &mut self,
        name: &str,
        parent: Option<&ElementKey>,
        mut settings: ControlSettings,
        value: ControlValue,
        offset: Transform,
        shape: Transform,
    ) -> Result<ElementKey, HierarchyError> {
        let parent = self.parent_index(parent)?;
        settings.sanitize();
        if !value.matches(settings.control_type) {
            return Err(HierarchyError::Value(
                armature_api_core::ApiError::ValueTypeMismatch {
                    expected: settings.control_type,
                    found: value.kind_name(),
                },
            ));
        }
        let mut value = value;
        settings.apply_limits(&mut value);
        let local = value.to_transform(settings.control_type, settings.primary_axis)?;
        let payload = ElementPayload::Control(Box::new(ControlState {
            pose: ElementPose::with_transform(local, false),
            offset: PoseSlots::splat(offset.with_normalized_rotation()),
            shape: PoseSlots::splat(shape),
            settings,
            values: PoseSlots::splat(value),
        }));
        self.add_element(name, payload, parent)
    }

    /// Add an animation channel hosted under `parent_control`.
    pub fn add_animation_channel(
        &mut self,
        name: &str,
        parent_control: &ElementKey,
        settings: ControlSettings,
    ) -> Result<ElementKey, HierarchyError> {
        if self.hierarchy.require_control(parent_control).is_err() {
            return Err(HierarchyError::NotAControl(parent_control.clone()));
        }
        let mut settings = settings.with_animation_type(ControlAnimationType::AnimationChannel);
        settings.shape.visible = false;
        let value = settings.identity_value();
        self.add_control(
            name,
            Some(parent_control),
            settings,
            value,
            Transform::identity(),
            Transform::identity(),
        )
    }

    pub fn add_curve(&mut self, name: &str, value: f32) -> Result<ElementKey, HierarchyError> {
        self.add_element(
            name,
            ElementPayload::Curve(CurveState {
                value,
                value_set: false,
            }),
            None,
        )
    }

    pub fn add_physics(
        &mut self,
        name: &str,
        parent: Option<&ElementKey>,
        solver: PhysicsSolverId,
        transform: Transform,
    ) -> Result<ElementKey, HierarchyError> {
        let parent = self.parent_index(parent)?;
        let payload = ElementPayload::Physics {
            solver,
            pose: ElementPose::with_transform(transform.with_normalized_rotation(), false),
        };
        self.add_element(name, payload, parent)
    }

    pub fn add_reference(
        &mut self,
        name: &str,
        parent: Option<&ElementKey>,
    ) -> Result<ElementKey, HierarchyError> {
        let parent = self.parent_index(parent)?;
        let payload = ElementPayload::Reference {
            pose: ElementPose::with_transform(Transform::identity(), false),
        };
        self.add_element(name, payload, parent)
    }

    pub fn add_connector(
        &mut self,
        name: &str,
        settings: ConnectorSettings,
    ) -> Result<ElementKey, HierarchyError> {
        self.add_element(name, ElementPayload::Connector(settings), None)
    }

    pub fn set_connector_settings(
        &mut self,
        key: &ElementKey,
        settings: ConnectorSettings,
    ) -> Result<(), HierarchyError> {
        let index = self.hierarchy.require(key)?;
        match &mut self.hierarchy.elements[index].payload {
            ElementPayload::Connector(existing) => *existing = settings,
            _ => return Err(HierarchyError::ElementNotFound(key.clone())),
        }
        self.hierarchy
            .notify(HierarchyNotification::ConnectorSettingChanged, Some(key));
        Ok(())
    }

    /// Remove an element. Its children keep their global transforms.
    pub fn remove_element(&mut self, key: &ElementKey) -> Result<(), HierarchyError> {
        let index = self.hierarchy.require(key)?;
        let children = self.hierarchy.elements[index].children.clone();
        for &child in &children {
            self.restructure(child, true, |h| h.detach_parent(child, index));
        }
        let parents: Vec<usize> = self.hierarchy.elements[index]
            .parents
            .iter()
            .map(|p| p.parent)
            .collect();
        for parent in parents {
            self.hierarchy.detach_parent(index, parent);
        }
        self.hierarchy.selection.retain(|k| k != key);
        self.hierarchy.elements.remove(index);
        for element in &mut self.hierarchy.elements {
            for constraint in &mut element.parents {
                if constraint.parent > index {
                    constraint.parent -= 1;
                }
            }
            for child in &mut element.children {
                if *child > index {
                    *child -= 1;
                }
            }
        }
        self.hierarchy.previous_names.retain(|_, current| *current != *key);
        self.hierarchy.rebuild_lookup();
        self.hierarchy.bump_topology();
        self.hierarchy
            .notify(HierarchyNotification::ElementRemoved, Some(key));
        Ok(())
    }

    /// Rename an element, returning its new key. The old key keeps resolving
    /// through [`RigHierarchy::resolve_renamed`].
    pub fn rename_element(&mut self, key: &ElementKey, new_name: &str) -> Result<ElementKey, HierarchyError> {
        let index = self.hierarchy.require(key)?;
        if sanitize_name(new_name)? == key.name {
            return Ok(key.clone());
        }
        let name = self.unique_name(new_name, key.element_type)?;
        let new_key = ElementKey::new(name, key.element_type);
        self.hierarchy.elements[index].key = new_key.clone();
        self.hierarchy.index_by_key.remove(key);
        self.hierarchy.index_by_key.insert(new_key.clone(), index);
        self.hierarchy
            .previous_names
            .insert(key.clone(), new_key.clone());
        for selected in &mut self.hierarchy.selection {
            if selected == key {
                *selected = new_key.clone();
            }
        }
        self.hierarchy.bump_topology();
        self.hierarchy.dispatch(HierarchyEvent {
            notification: HierarchyNotification::ElementRenamed,
            key: Some(new_key.clone()),
            previous_key: Some(key.clone()),
        });
        Ok(new_key)
    }

    /// Run a parent-list edit on `child`, keeping its global transform
    /// (`maintain_global`) or its local transform.
    fn restructure(&mut self, child: usize, maintain_global: bool, edit: impl FnOnce(&mut RigHierarchy)) {
        for initial in [true, false] {
            if maintain_global {
                self.hierarchy
                    .clean_slot(child, TransformType::new(initial, false));
            } else {
                self.hierarchy
                    .clean_slot(child, TransformType::new(initial, true));
                self.hierarchy.prepare_dependents(child, initial, true);
            }
        }
        edit(self.hierarchy);
        for initial in [true, false] {
            if maintain_global {
                self.hierarchy
                    .dirty_slot(child, TransformType::new(initial, true));
            } else {
                self.hierarchy
                    .dirty_slot(child, TransformType::new(initial, false));
            }
        }
    }

    fn check_parent(&self, child: &ElementKey, parent: &ElementKey) -> Result<(usize, usize), HierarchyError> {
        let child_index = self.hierarchy.require_transform(child)?;
        let parent_index = self.parent_index(Some(parent))?.ok_or_else(|| {
            HierarchyError::ElementNotFound(parent.clone())
        })?;
        if parent_index == child_index || self.hierarchy.is_parented_to_index(parent_index, child_index) {
            return Err(HierarchyError::Cycle {
                child: child.clone(),
                parent: parent.clone(),
            });
        }
        Ok((child_index, parent_index))
    }

    /// Add another parent with the given weight on every channel.
    pub fn add_parent(
        &mut self,
        child: &ElementKey,
        parent: &ElementKey,
        weight: f32,
        maintain_global: bool,
    ) -> Result<(), HierarchyError> {
        let (child_index, parent_index) = self.check_parent(child, parent)?;
        let existing = self.hierarchy.elements[child_index]
            .parents
            .iter()
            .any(|p| p.parent == parent_index);
        if existing {
            return Ok(());
        }
        self.restructure(child_index, maintain_global, |h| {
            h.attach_parent(child_index, parent_index, ElementWeight::uniform(weight))
        });
        self.hierarchy.bump_topology();
        self.hierarchy
            .notify(HierarchyNotification::ParentChanged, Some(child));
        Ok(())
    }

    /// Make `parent` the only parent.
    pub fn set_parent(
        &mut self,
        child: &ElementKey,
        parent: &ElementKey,
        maintain_global: bool,
    ) -> Result<(), HierarchyError> {
        let (child_index, parent_index) = self.check_parent(child, parent)?;
        self.restructure(child_index, maintain_global, |h| {
            let previous: Vec<usize> = h.elements[child_index].parents.iter().map(|p| p.parent).collect();
            for p in previous {
                h.detach_parent(child_index, p);
            }
            h.attach_parent(child_index, parent_index, ElementWeight::FULL);
        });
        self.hierarchy.bump_topology();
        self.hierarchy
            .notify(HierarchyNotification::ParentChanged, Some(child));
        Ok(())
    }

    pub fn remove_parent(
        &mut self,
        child: &ElementKey,
        parent: &ElementKey,
        maintain_global: bool,
    ) -> Result<(), HierarchyError> {
        let child_index = self.hierarchy.require_transform(child)?;
        let parent_index = self.hierarchy.require(parent)?;
        if !self.hierarchy.elements[child_index]
            .parents
            .iter()
            .any(|p| p.parent == parent_index)
        {
            return Err(HierarchyError::ParentNotFound {
                child: child.clone(),
                parent: parent.clone(),
            });
        }
        self.restructure(child_index, maintain_global, |h| {
            h.detach_parent(child_index, parent_index)
        });
        self.hierarchy.bump_topology();
        self.hierarchy
            .notify(HierarchyNotification::ParentChanged, Some(child));
        Ok(())
    }

    pub fn remove_all_parents(&mut self, child: &ElementKey, maintain_global: bool) -> Result<(), HierarchyError> {
        let child_index = self.hierarchy.require_transform(child)?;
        if self.hierarchy.elements[child_index].parents.is_empty() {
            return Ok(());
        }
        self.restructure(child_index, maintain_global, |h| {
            let previous: Vec<usize> = h.elements[child_index].parents.iter().map(|p| p.parent).collect();
            for p in previous {
                h.detach_parent(child_index, p);
            }
        });
        self.hierarchy.bump_topology();
        self.hierarchy
            .notify(HierarchyNotification::ParentChanged, Some(child));
        Ok(())
    }

    pub fn select(&mut self, key: &ElementKey, selected: bool) -> Result<bool, HierarchyError> {
        self.hierarchy.select(key, selected)
    }

    pub fn clear_selection(&mut self) -> bool {
        self.hierarchy.clear_selection()
    }

    /// Replace the selection with `keys`.
    pub fn set_selection(&mut self, keys: &[ElementKey]) -> Result<(), HierarchyError> {
        let current = self.hierarchy.selected_keys().to_vec();
        for key in current.iter().filter(|k| !keys.contains(k)) {
            self.hierarchy.select(key, false)?;
        }
        for key in keys {
            self.hierarchy.select(key, true)?;
        }
        Ok(())
    }

    pub fn set_control_settings(&mut self, key: &ElementKey, settings: ControlSettings) -> Result<(), HierarchyError> {
        self.hierarchy.set_control_settings(key, settings, true)
    }

    /// Create imported bones (parents must precede children). With
    /// `replace_existing`, bones already present get their initial and
    /// current local transforms overwritten instead.
    pub fn import_bones(
        &mut self,
        bones: &[BoneImport],
        replace_existing: bool,
    ) -> Result<Vec<ElementKey>, HierarchyError> {
        let mut keys = Vec::with_capacity(bones.len());
        for bone in bones {
            let key = ElementKey::bone(bone.name.clone());
            if self.hierarchy.contains(&key) {
                if replace_existing {
                    for initial in [true, false] {
                        self.hierarchy.set_local_transform(&key, bone.local, initial, true)?;
                    }
                }
                keys.push(key);
                continue;
            }
            let parent = bone.parent.as_ref().map(|p| ElementKey::bone(p.clone()));
            keys.push(self.add_bone(&bone.name, parent.as_ref(), bone.local, false, BoneType::Imported)?);
        }
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use armature_api_core::Vector3;
    use std::sync::{Arc, Mutex};

    #[test]
    fn names_are_sanitized_and_made_unique() {
        let mut h = RigHierarchy::new();
        let mut c = h.controller().unwrap();
        let a = c.add_null("my space", None, Transform::identity(), false).unwrap();
        let b = c.add_null("my space", None, Transform::identity(), false).unwrap();
        let d = c.add_null("my:space", None, Transform::identity(), false).unwrap();
        assert_eq!(a.name, "my_space");
        assert_eq!(b.name, "my_space_1");
        assert_eq!(d.name, "my_space_2");
        // Same name, different type is fine.
        let bone = c
            .add_bone("my_space", None, Transform::identity(), false, BoneType::User)
            .unwrap();
        assert_eq!(bone.name, "my_space");
        assert!(c.add_null("  ", None, Transform::identity(), false).is_err());
    }

    #[test]
    fn removal_compacts_and_keeps_child_globals() {
        let mut h = RigHierarchy::new();
        let mut c = h.controller().unwrap();
        let root = c
            .add_bone("Root", None, Transform::from_translation(Vector3::new(0.0, 0.0, 5.0)), false, BoneType::User)
            .unwrap();
        let child = c
            .add_bone("Child", Some(&root), Transform::from_translation(Vector3::new(1.0, 0.0, 0.0)), false, BoneType::User)
            .unwrap();
        c.remove_element(&root).unwrap();
        assert_eq!(h.len(), 1);
        assert_eq!(h.index_of(&child), Some(0));
        assert!(h.parents(&child).is_empty());
        let g = h.global_transform(&child, false).unwrap();
        assert_relative_eq!(g.translation, Vector3::new(1.0, 0.0, 5.0), epsilon = 1e-6);
    }

    #[test]
    fn rename_emits_previous_key() {
        let mut h = RigHierarchy::new();
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        h.subscribe(move |e| sink.lock().unwrap().push(e.clone()));
        let key = h
            .controller()
            .unwrap()
            .add_null("Old", None, Transform::identity(), false)
            .unwrap();
        let renamed = h.controller().unwrap().rename_element(&key, "New").unwrap();
        assert_eq!(h.resolve_renamed(&key), Some(renamed.clone()));
        let events = events.lock().unwrap();
        let last = events.last().unwrap();
        assert_eq!(last.notification, HierarchyNotification::ElementRenamed);
        assert_eq!(last.previous_key, Some(ElementKey::null("Old")));
        assert_eq!(last.key, Some(ElementKey::null("New")));
    }

    #[test]
    fn reparent_rejects_cycles() {
        let mut h = RigHierarchy::new();
        let mut c = h.controller().unwrap();
        let a = c.add_null("A", None, Transform::identity(), false).unwrap();
        let b = c.add_null("B", Some(&a), Transform::identity(), false).unwrap();
        assert!(matches!(
            c.set_parent(&a, &b, true),
            Err(HierarchyError::Cycle { .. })
        ));
        let curve = c.add_curve("Weight", 0.0).unwrap();
        assert!(matches!(
            c.set_parent(&a, &curve, true),
            Err(HierarchyError::InvalidParentType(ElementType::Curve))
        ));
    }

    #[test]
    fn set_parent_keeps_local_when_asked() {
        let mut h = RigHierarchy::new();
        let mut c = h.controller().unwrap();
        let a = c
            .add_null("A", None, Transform::from_translation(Vector3::new(10.0, 0.0, 0.0)), false)
            .unwrap();
        let item = c
            .add_null("Item", None, Transform::from_translation(Vector3::new(1.0, 0.0, 0.0)), false)
            .unwrap();
        c.set_parent(&item, &a, false).unwrap();
        let g = h.global_transform(&item, false).unwrap();
        assert_relative_eq!(g.translation, Vector3::new(11.0, 0.0, 0.0), epsilon = 1e-6);
    }

    #[test]
    fn import_bones_in_order() {
        let mut h = RigHierarchy::new();
        let bones = vec![
            BoneImport {
                name: "pelvis".into(),
                parent: None,
                local: Transform::from_translation(Vector3::new(0.0, 0.0, 1.0)),
            },
            BoneImport {
                name: "spine".into(),
                parent: Some("pelvis".into()),
                local: Transform::from_translation(Vector3::new(0.0, 0.0, 0.5)),
            },
        ];
        let keys = h.controller().unwrap().import_bones(&bones, false).unwrap();
        assert_eq!(keys.len(), 2);
        let spine = h.global_transform(&ElementKey::bone("spine"), true).unwrap();
        assert_relative_eq!(spine.translation, Vector3::new(0.0, 0.0, 1.5), epsilon = 1e-6);
        assert_eq!(h.find(&keys[0]).unwrap().bone_type(), Some(BoneType::Imported));
    }
}
