//! Pose snapshots.
//!
//! A [`RigPose`] is an ordered copy of local/global transforms (and curve
//! values) for a filtered set of elements. Poses are built on demand and
//! never persisted; taking a new pose recomputes everything.

use armature_api_core::{ElementKey, ElementTypeMask, Transform};
use serde::{Deserialize, Serialize};

use crate::element::{ElementPayload, TransformType};
use crate::hierarchy::RigHierarchy;
use crate::ids::CachedElement;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseElement {
    pub element: CachedElement,
    pub local: Transform,
    pub global: Transform,
    #[serde(default)]
    pub curve_value: f32,
}

impl PoseElement {
    pub fn key(&self) -> &ElementKey {
        self.element.key()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RigPose {
    pub elements: Vec<PoseElement>,
}

impl RigPose {
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn find(&self, key: &ElementKey) -> Option<&PoseElement> {
        self.elements.iter().find(|e| e.key() == key)
    }

    pub fn contains(&self, key: &ElementKey) -> bool {
        self.find(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PoseElement> {
        self.elements.iter()
    }
}

impl RigHierarchy {
    /// Snapshot the initial or current pose of every element whose type is in
    /// `mask`. A non-empty `filter` further restricts the snapshot to those keys.
    pub fn get_pose(&self, initial: bool, mask: ElementTypeMask, filter: &[ElementKey]) -> RigPose {
        let elements = self
            .elements
            .iter()
            .filter(|e| mask.contains(e.element_type()))
            .filter(|e| filter.is_empty() || filter.contains(&e.key))
            .map(|e| PoseElement {
                element: CachedElement::resolved(e.key.clone(), self),
                local: self.local_at(e.index, initial),
                global: self.global_at(e.index, initial),
                curve_value: e.curve().map(|c| c.value).unwrap_or(0.0),
            })
            .collect();
        RigPose { elements }
    }

    /// Write every pose entry into the named slot. Entries missing from this
    /// hierarchy are skipped.
    pub fn set_pose(&mut self, pose: &RigPose, transform_type: TransformType) {
        let affect_children = transform_type.is_local();
        for entry in &pose.elements {
            let Some(index) = self.index_of(entry.key()) else {
                continue;
            };
            if let ElementPayload::Curve(curve) = &mut self.elements[index].payload {
                curve.value = entry.curve_value;
                curve.value_set = true;
                continue;
            }
            if self.elements[index].pose().is_none() {
                continue;
            }
            let transform = if transform_type.is_local() {
                entry.local
            } else {
                entry.global
            };
            self.set_transform_at(index, transform, transform_type, affect_children);
        }
    }

    /// Current := Initial for every element whose type is in `mask`.
    pub fn reset_pose_to_initial(&mut self, mask: ElementTypeMask) {
        for element in &mut self.elements {
            if !mask.contains(element.element_type()) {
                continue;
            }
            match &mut element.payload {
                ElementPayload::Control(control) => {
                    control.pose.current = control.pose.initial;
                    control.offset.current = control.offset.initial;
                    control.shape.current = control.shape.initial;
                    control.values.current = control.values.initial;
                }
                ElementPayload::Curve(curve) => {
                    curve.value = 0.0;
                    curve.value_set = false;
                }
                payload => {
                    if let Some(pose) = payload.pose_mut() {
                        pose.current = pose.initial;
                    }
                }
            }
            for constraint in &mut element.parents {
                constraint.weight.current = constraint.weight.initial;
            }
        }
    }

    /// Initial := Current for every element whose type is in `mask`.
    pub fn set_current_pose_as_initial(&mut self, mask: ElementTypeMask) {
        for element in &mut self.elements {
            if !mask.contains(element.element_type()) {
                continue;
            }
            if let Some(control) = element.payload.control_mut() {
                control.offset.initial = control.offset.current;
                control.values.initial = control.values.current;
            }
            if let Some(pose) = element.payload.pose_mut() {
                pose.initial = pose.current;
            }
        }
    }
}
