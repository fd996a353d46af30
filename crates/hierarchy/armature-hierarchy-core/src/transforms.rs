//! Local/global transform conversion with lazy dirty-slot recomputation.
//!
//! Global(E) = Local(E) * Frame(E), where Frame(E) blends the parents'
//! globals by their per-channel weights (controls compose their offset onto
//! each parent first). Reads never mutate; a dirty slot is recomputed on the
//! fly from its clean counterpart. Writes first settle the slots of
//! dependents so their observable values are preserved or recomputed as
//! requested, then mark the affected slots dirty.

use armature_api_core::blend::blend_weighted;
use armature_api_core::{ElementKey, Transform};

use crate::element::{ElementPayload, TransformType};
use crate::error::HierarchyError;
use crate::hierarchy::RigHierarchy;

impl RigHierarchy {
    pub(crate) fn require_transform(&self, key: &ElementKey) -> Result<usize, HierarchyError> {
        let index = self.require(key)?;
        if self.elements[index].pose().is_none() {
            return Err(HierarchyError::NotATransformElement(key.clone()));
        }
        Ok(index)
    }

    pub(crate) fn control_offset_at(&self, index: usize, initial: bool) -> Option<Transform> {
        self.elements[index]
            .control()
            .map(|control| *control.offset.get(initial))
    }

    /// Weighted blend of the parent globals, without any control offset.
    pub(crate) fn parent_blend_at(&self, index: usize, initial: bool) -> Transform {
        let parents = &self.elements[index].parents;
        if parents.is_empty() {
            return Transform::identity();
        }
        let frames: Vec<_> = parents
            .iter()
            .map(|p| (self.global_at(p.parent, initial), p.weight(initial)))
            .collect();
        blend_weighted(&frames, &Transform::identity())
    }

    /// The frame an element's local transform is expressed in.
    pub(crate) fn parent_frame_at(&self, index: usize, initial: bool) -> Transform {
        let offset = self.control_offset_at(index, initial);
        let parents = &self.elements[index].parents;
        match offset {
            None => self.parent_blend_at(index, initial),
            Some(offset) => {
                let frames: Vec<_> = parents
                    .iter()
                    .map(|p| {
                        let parent_global = self.global_at(p.parent, initial);
                        (offset.compose(&parent_global), p.weight(initial))
                    })
                    .collect();
                blend_weighted(&frames, &offset)
            }
        }
    }

    pub(crate) fn local_at(&self, index: usize, initial: bool) -> Transform {
        let Some(pose) = self.elements[index].pose() else {
            return Transform::identity();
        };
        let slots = pose.get(initial);
        if !slots.local.dirty || slots.global.dirty {
            return slots.local.transform;
        }
        slots
            .global
            .transform
            .relative_to(&self.parent_frame_at(index, initial))
    }

    pub(crate) fn global_at(&self, index: usize, initial: bool) -> Transform {
        let Some(pose) = self.elements[index].pose() else {
            return Transform::identity();
        };
        let slots = pose.get(initial);
        if !slots.global.dirty {
            return slots.global.transform;
        }
        slots
            .local
            .transform
            .compose(&self.parent_frame_at(index, initial))
    }

    pub(crate) fn transform_at(&self, index: usize, transform_type: TransformType) -> Transform {
        if transform_type.is_local() {
            self.local_at(index, transform_type.is_initial())
        } else {
            self.global_at(index, transform_type.is_initial())
        }
    }

    /// Store the computed value of a dirty slot so it survives upstream edits.
    pub(crate) fn clean_slot(&mut self, index: usize, transform_type: TransformType) {
        let initial = transform_type.is_initial();
        let local = transform_type.is_local();
        let dirty = self.elements[index]
            .pose()
            .map(|p| p.get(initial).slot(local).dirty)
            .unwrap_or(false);
        if !dirty {
            return;
        }
        let value = self.transform_at(index, transform_type);
        if let Some(pose) = self.elements[index].payload.pose_mut() {
            pose.get_mut(initial).slot_mut(local).set(value);
        }
    }

    /// Mark a slot dirty. The opposite slot must be clean.
    pub(crate) fn dirty_slot(&mut self, index: usize, transform_type: TransformType) {
        let initial = transform_type.is_initial();
        let local = transform_type.is_local();
        if let Some(pose) = self.elements[index].payload.pose_mut() {
            let slots = pose.get_mut(initial);
            if !slots.slot(!local).dirty {
                slots.slot_mut(local).dirty = true;
            }
        }
    }

    /// Settle dependents of `index` before its transform changes.
    ///
    /// With `affect_children` every descendant keeps its local transform and
    /// follows. Without it the direct children keep their global transform.
    pub(crate) fn prepare_dependents(&mut self, index: usize, initial: bool, affect_children: bool) {
        let local = TransformType::new(initial, true);
        let global = TransformType::new(initial, false);
        if affect_children {
            let descendants = self.descendants(index);
            for &d in &descendants {
                self.clean_slot(d, local);
            }
            for &d in &descendants {
                self.dirty_slot(d, global);
            }
        } else {
            let children = self.elements[index].children.clone();
            for &c in &children {
                self.clean_slot(c, global);
            }
            for &c in &children {
                self.dirty_slot(c, local);
            }
        }
    }

    /// Write one slot and mark its counterpart dirty, without touching dependents.
    pub(crate) fn write_slot(&mut self, index: usize, transform: Transform, transform_type: TransformType) {
        let initial = transform_type.is_initial();
        let local = transform_type.is_local();
        if let Some(pose) = self.elements[index].payload.pose_mut() {
            let slots = pose.get_mut(initial);
            slots.slot_mut(local).set(transform);
            slots.slot_mut(!local).dirty = true;
        }
    }

    // ---------- public API ----------

    pub fn transform(&self, key: &ElementKey, transform_type: TransformType) -> Result<Transform, HierarchyError> {
        let index = self.require_transform(key)?;
        Ok(self.transform_at(index, transform_type))
    }

    pub fn transform_by_index(&self, index: usize, transform_type: TransformType) -> Result<Transform, HierarchyError> {
        let element = self.get(index).ok_or(HierarchyError::InvalidIndex(index))?;
        if element.pose().is_none() {
            return Err(HierarchyError::NotATransformElement(element.key.clone()));
        }
        Ok(self.transform_at(index, transform_type))
    }

    pub fn local_transform(&self, key: &ElementKey, initial: bool) -> Result<Transform, HierarchyError> {
        self.transform(key, TransformType::new(initial, true))
    }

    pub fn global_transform(&self, key: &ElementKey, initial: bool) -> Result<Transform, HierarchyError> {
        self.transform(key, TransformType::new(initial, false))
    }

    /// Blended frame of the parents (identity for roots), ignoring control offsets.
    pub fn parent_transform(&self, key: &ElementKey, initial: bool) -> Result<Transform, HierarchyError> {
        let index = self.require_transform(key)?;
        Ok(self.parent_blend_at(index, initial))
    }

    /// Frame the element's local transform is relative to (includes the control offset).
    pub fn parent_frame(&self, key: &ElementKey, initial: bool) -> Result<Transform, HierarchyError> {
        let index = self.require_transform(key)?;
        Ok(self.parent_frame_at(index, initial))
    }

    /// Write a transform slot.
    ///
    /// Controls are routed through their value so limits apply; a global
    /// write is converted to the control's local space first.
    pub fn set_transform(
        &mut self,
        key: &ElementKey,
        transform: Transform,
        transform_type: TransformType,
        affect_children: bool,
    ) -> Result<(), HierarchyError> {
        let index = self.require_transform(key)?;
        self.set_transform_at(index, transform, transform_type, affect_children);
        self.propagate_to_listening(|other| {
            let _ = other.set_transform(key, transform, transform_type, affect_children);
        });
        Ok(())
    }

    pub fn set_local_transform(
        &mut self,
        key: &ElementKey,
        transform: Transform,
        initial: bool,
        affect_children: bool,
    ) -> Result<(), HierarchyError> {
        self.set_transform(key, transform, TransformType::new(initial, true), affect_children)
    }

    pub fn set_global_transform(
        &mut self,
        key: &ElementKey,
        transform: Transform,
        initial: bool,
        affect_children: bool,
    ) -> Result<(), HierarchyError> {
        self.set_transform(key, transform, TransformType::new(initial, false), affect_children)
    }

    pub(crate) fn set_transform_at(
        &mut self,
        index: usize,
        transform: Transform,
        transform_type: TransformType,
        affect_children: bool,
    ) {
        let initial = transform_type.is_initial();
        if matches!(self.elements[index].payload, ElementPayload::Control(_)) {
            let local = if transform_type.is_local() {
                transform
            } else {
                transform.relative_to(&self.parent_frame_at(index, initial))
            };
            let local = self.limit_control_local(index, local, initial);
            self.prepare_dependents(index, initial, affect_children);
            self.write_slot(index, local, TransformType::new(initial, true));
            return;
        }
        self.prepare_dependents(index, initial, affect_children);
        self.write_slot(index, transform.with_normalized_rotation(), transform_type);
    }

    /// Make every slot of the given pose clean.
    pub fn compute_all_transforms(&mut self, initial: bool) {
        for index in 0..self.elements.len() {
            self.clean_slot(index, TransformType::new(initial, true));
            self.clean_slot(index, TransformType::new(initial, false));
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::definition::HierarchyDefinition;
    use crate::element::TransformType;
    use crate::hierarchy::RigHierarchy;
    use approx::assert_relative_eq;
    use armature_api_core::{ElementKey, Transform, UnitQuaternion, Vector3};

    fn chain() -> RigHierarchy {
        HierarchyDefinition::from_json_str(
            r#"{"elements":[
                {"type":"Bone","name":"Root","transform":{"translation":[0,0,1]}},
                {"type":"Bone","name":"Mid","parent":"Bone:Root","transform":{"translation":[0,2,0]}},
                {"type":"Bone","name":"Tip","parent":"Bone:Mid","transform":{"translation":[0,3,0]}}
            ]}"#,
        )
        .unwrap()
        .build()
        .unwrap()
    }

    #[test]
    fn globals_follow_locals_lazily() {
        let h = chain();
        let tip = h.global_transform(&ElementKey::bone("Tip"), false).unwrap();
        assert_relative_eq!(tip.translation, Vector3::new(0.0, 5.0, 1.0), epsilon = 1e-5);
    }

    #[test]
    fn affect_children_moves_descendants() {
        let mut h = chain();
        let root = ElementKey::bone("Root");
        let moved = Transform::from_translation(Vector3::new(10.0, 0.0, 1.0));
        h.set_local_transform(&root, moved, false, true).unwrap();
        let tip = h.global_transform(&ElementKey::bone("Tip"), false).unwrap();
        assert_relative_eq!(tip.translation, Vector3::new(10.0, 5.0, 1.0), epsilon = 1e-5);
    }

    #[test]
    fn without_affect_children_direct_children_stay() {
        let mut h = chain();
        let mid = ElementKey::bone("Mid");
        let tip = ElementKey::bone("Tip");
        let before_mid = h.global_transform(&mid, false).unwrap();
        let before_tip = h.global_transform(&tip, false).unwrap();

        let rotated = Transform::from_rotation(UnitQuaternion::from_euler_angles(0.0, 0.0, 1.0));
        h.set_local_transform(&ElementKey::bone("Root"), rotated, false, false)
            .unwrap();

        assert!(h.global_transform(&mid, false).unwrap().approx_eq(&before_mid, 1e-5));
        assert!(h.global_transform(&tip, false).unwrap().approx_eq(&before_tip, 1e-5));
        // Mid's local now compensates for the rotated parent.
        let mid_local = h.local_transform(&mid, false).unwrap();
        assert!(!mid_local.approx_eq(&Transform::from_translation(Vector3::new(0.0, 2.0, 0.0)), 1e-3));
    }

    #[test]
    fn initial_and_current_are_independent() {
        let mut h = chain();
        let root = ElementKey::bone("Root");
        h.set_transform(
            &root,
            Transform::from_translation(Vector3::new(4.0, 0.0, 0.0)),
            TransformType::CurrentGlobal,
            true,
        )
        .unwrap();
        let initial = h.global_transform(&root, true).unwrap();
        assert_relative_eq!(initial.translation, Vector3::new(0.0, 0.0, 1.0));
    }

    #[test]
    fn curves_have_no_transform() {
        let mut h = chain();
        h.controller()
            .unwrap()
            .add_curve("Smile", 0.0)
            .unwrap();
        assert!(h
            .local_transform(&ElementKey::curve("Smile"), false)
            .is_err());
    }
}
