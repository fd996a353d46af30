//! Parent queries, weights and space switching.

use armature_api_core::{ElementKey, ElementWeight};
use hashbrown::HashMap;

use crate::element::TransformType;
use crate::error::HierarchyError;
use crate::hierarchy::RigHierarchy;
use crate::notify::HierarchyNotification;
use crate::weights::{single_affecting, ParentConstraint};

/// Element -> elements its computation reads, derived from a rig program.
pub type DependencyMap = HashMap<ElementKey, Vec<ElementKey>>;

impl RigHierarchy {
    pub fn parents(&self, key: &ElementKey) -> Vec<ElementKey> {
        self.find(key)
            .map(|e| {
                e.parents
                    .iter()
                    .map(|p| self.elements[p.parent].key.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn first_parent(&self, key: &ElementKey) -> Option<ElementKey> {
        self.find(key)
            .and_then(|e| e.parents.first())
            .map(|p| self.elements[p.parent].key.clone())
    }

    pub fn children(&self, key: &ElementKey) -> Vec<ElementKey> {
        self.find(key)
            .map(|e| {
                e.children
                    .iter()
                    .map(|&c| self.elements[c].key.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn parent_weights(&self, key: &ElementKey, initial: bool) -> Vec<(ElementKey, ElementWeight)> {
        self.find(key)
            .map(|e| {
                e.parents
                    .iter()
                    .map(|p| (self.elements[p.parent].key.clone(), p.weight(initial)))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The distinguished default parent: the first parent, or world space.
    pub fn default_parent(&self, key: &ElementKey) -> Option<ElementKey> {
        self.find(key)?;
        Some(self.first_parent(key).unwrap_or_else(ElementKey::world_space))
    }

    /// The single parent carrying weight. World space when no parent does;
    /// `None` when several parents blend.
    pub fn active_parent(&self, key: &ElementKey, initial: bool) -> Option<ElementKey> {
        let element = self.find(key)?;
        if !crate::weights::any_affecting(&element.parents, initial) {
            return Some(ElementKey::world_space());
        }
        single_affecting(&element.parents, initial).map(|p| self.elements[p].key.clone())
    }

    /// Whether `parent` is reachable from `child` through parent links of any weight.
    pub fn is_parented_to(&self, child: &ElementKey, parent: &ElementKey) -> bool {
        match (self.index_of(child), self.index_of(parent)) {
            (Some(c), Some(p)) => self.is_parented_to_index(c, p),
            _ => false,
        }
    }

    pub(crate) fn is_parented_to_index(&self, child: usize, parent: usize) -> bool {
        let mut visited = vec![false; self.elements.len()];
        let mut stack = vec![child];
        while let Some(i) = stack.pop() {
            for constraint in &self.elements[i].parents {
                if constraint.parent == parent {
                    return true;
                }
                if !std::mem::replace(&mut visited[constraint.parent], true) {
                    stack.push(constraint.parent);
                }
            }
        }
        false
    }

    fn depends_on(dependencies: &DependencyMap, from: &ElementKey, target: &ElementKey) -> bool {
        let mut visited: Vec<&ElementKey> = Vec::new();
        let mut stack = vec![from];
        while let Some(key) = stack.pop() {
            let Some(reads) = dependencies.get(key) else {
                continue;
            };
            for read in reads {
                if read == target {
                    return true;
                }
                if !visited.contains(&read) {
                    visited.push(read);
                    stack.push(read);
                }
            }
        }
        false
    }

    /// Change one parent weight.
    ///
    /// With `affect_children` the child keeps its local transform (its global
    /// moves and descendants follow); otherwise it keeps its global.
    pub fn set_parent_weight(
        &mut self,
        child: &ElementKey,
        parent: &ElementKey,
        weight: ElementWeight,
        initial: bool,
        affect_children: bool,
    ) -> Result<(), HierarchyError> {
        let child_index = self.require_transform(child)?;
        let parent_index = self.require(parent)?;
        let slot = self.elements[child_index]
            .parents
            .iter()
            .position(|p| p.parent == parent_index)
            .ok_or_else(|| HierarchyError::ParentNotFound {
                child: child.clone(),
                parent: parent.clone(),
            })?;
        self.reweight(child_index, initial, affect_children, |parents| {
            *parents[slot].weight.get_mut(initial) = weight;
        });
        self.notify(HierarchyNotification::ParentWeightsChanged, Some(child));
        self.propagate_to_listening(|other| {
            let _ = other.set_parent_weight(child, parent, weight, initial, affect_children);
        });
        Ok(())
    }

    /// Replace all parent weights, in parent order.
    pub fn set_parent_weights(
        &mut self,
        child: &ElementKey,
        weights: &[ElementWeight],
        initial: bool,
        affect_children: bool,
    ) -> Result<(), HierarchyError> {
        let child_index = self.require_transform(child)?;
        if weights.len() != self.elements[child_index].parents.len() {
            return Ok(());
        }
        self.reweight(child_index, initial, affect_children, |parents| {
            for (constraint, weight) in parents.iter_mut().zip(weights) {
                *constraint.weight.get_mut(initial) = *weight;
            }
        });
        self.notify(HierarchyNotification::ParentWeightsChanged, Some(child));
        Ok(())
    }

    fn reweight(
        &mut self,
        child_index: usize,
        initial: bool,
        affect_children: bool,
        apply: impl FnOnce(&mut [ParentConstraint]),
    ) {
        if affect_children {
            self.clean_slot(child_index, TransformType::new(initial, true));
            self.prepare_dependents(child_index, initial, true);
            apply(&mut self.elements[child_index].parents);
            self.dirty_slot(child_index, TransformType::new(initial, false));
        } else {
            self.clean_slot(child_index, TransformType::new(initial, false));
            apply(&mut self.elements[child_index].parents);
            self.dirty_slot(child_index, TransformType::new(initial, true));
        }
    }

    /// Switch `child` to be driven fully by `new_parent`, keeping its global transform.
    ///
    /// `new_parent` may be [`ElementKey::world_space`] (no parent contributes)
    /// or [`ElementKey::default_parent`] (the first parent). A target that is
    /// not yet a parent is added with zero weight first. Fails without any
    /// mutation or notification when the switch would introduce a cycle,
    /// either through the live parent chain or through `dependencies`.
    pub fn switch_to_parent(
        &mut self,
        child: &ElementKey,
        new_parent: &ElementKey,
        initial: bool,
        affect_children: bool,
        dependencies: Option<&DependencyMap>,
    ) -> Result<(), HierarchyError> {
        let child_index = self.require_transform(child)?;

        let target = if new_parent.is_world_space() {
            None
        } else if new_parent.is_default_parent() {
            self.elements[child_index].parents.first().map(|p| p.parent)
        } else {
            Some(self.require_transform(new_parent)?)
        };

        let active = self.active_parent(child, initial);
        let target_key = target
            .map(|t| self.elements[t].key.clone())
            .unwrap_or_else(ElementKey::world_space);
        if active.as_ref() == Some(&target_key) {
            return Ok(());
        }

        if let Some(target_index) = target {
            let cycle = target_index == child_index
                || self.is_parented_to_index(target_index, child_index)
                || dependencies
                    .map(|deps| Self::depends_on(deps, &target_key, child))
                    .unwrap_or(false);
            if cycle {
                return Err(HierarchyError::Cycle {
                    child: child.clone(),
                    parent: target_key,
                });
            }
            if !self.elements[child_index]
                .parents
                .iter()
                .any(|p| p.parent == target_index)
            {
                self.attach_parent(child_index, target_index, ElementWeight::ZERO);
                self.notify(HierarchyNotification::ParentChanged, Some(child));
            }
        }

        // The switched element keeps its global, so its children stay put either way.
        self.reweight(child_index, initial, false, |parents| {
            for constraint in parents.iter_mut() {
                let weight = if Some(constraint.parent) == target {
                    ElementWeight::FULL
                } else {
                    ElementWeight::ZERO
                };
                *constraint.weight.get_mut(initial) = weight;
            }
        });
        self.notify(HierarchyNotification::ParentWeightsChanged, Some(child));
        self.propagate_to_listening(|other| {
            let _ = other.switch_to_parent(child, new_parent, initial, affect_children, None);
        });
        Ok(())
    }

    /// Whether `switch_to_parent` would succeed.
    pub fn can_switch_to_parent(
        &self,
        child: &ElementKey,
        new_parent: &ElementKey,
        dependencies: Option<&DependencyMap>,
    ) -> Result<(), HierarchyError> {
        let child_index = self.require_transform(child)?;
        if new_parent.is_world_space() || new_parent.is_default_parent() {
            return Ok(());
        }
        let target_index = self.require_transform(new_parent)?;
        let cycle = target_index == child_index
            || self.is_parented_to_index(target_index, child_index)
            || dependencies
                .map(|deps| Self::depends_on(deps, new_parent, child))
                .unwrap_or(false);
        if cycle {
            return Err(HierarchyError::Cycle {
                child: child.clone(),
                parent: new_parent.clone(),
            });
        }
        Ok(())
    }

    /// Link `child` under `parent` without touching transforms.
    pub(crate) fn attach_parent(&mut self, child: usize, parent: usize, weight: ElementWeight) {
        self.elements[child]
            .parents
            .push(ParentConstraint::new(parent, weight));
        if !self.elements[parent].children.contains(&child) {
            self.elements[parent].children.push(child);
        }
    }

    pub(crate) fn detach_parent(&mut self, child: usize, parent: usize) {
        self.elements[child].parents.retain(|p| p.parent != parent);
        self.elements[parent].children.retain(|&c| c != child);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::HierarchyDefinition;
    use approx::assert_relative_eq;
    use armature_api_core::{Transform, Vector3};

    fn spaces() -> RigHierarchy {
        HierarchyDefinition::from_json_str(
            r#"{"elements":[
                {"type":"Null","name":"A","transform":{"translation":[10,0,0]}},
                {"type":"Null","name":"B","transform":{"translation":[0,10,0]}},
                {"type":"Null","name":"Item","parent":"Null:A","transform":{"translation":[1,0,0]}},
                {"type":"Null","name":"Under","parent":"Null:Item"}
            ]}"#,
        )
        .unwrap()
        .build()
        .unwrap()
    }

    #[test]
    fn switching_keeps_global() {
        let mut h = spaces();
        let item = ElementKey::null("Item");
        let before = h.global_transform(&item, false).unwrap();
        h.switch_to_parent(&item, &ElementKey::null("B"), false, true, None)
            .unwrap();
        assert_eq!(h.active_parent(&item, false), Some(ElementKey::null("B")));
        assert!(h.global_transform(&item, false).unwrap().approx_eq(&before, 1e-5));
        let local = h.local_transform(&item, false).unwrap();
        assert_relative_eq!(local.translation, Vector3::new(11.0, -10.0, 0.0), epsilon = 1e-5);

        // Moving the new parent now drags the item.
        h.set_global_transform(
            &ElementKey::null("B"),
            Transform::from_translation(Vector3::new(0.0, 20.0, 0.0)),
            false,
            true,
        )
        .unwrap();
        let moved = h.global_transform(&item, false).unwrap();
        assert_relative_eq!(moved.translation, Vector3::new(11.0, 10.0, 0.0), epsilon = 1e-5);
    }

    #[test]
    fn world_space_and_default_parent() {
        let mut h = spaces();
        let item = ElementKey::null("Item");
        h.switch_to_parent(&item, &ElementKey::world_space(), false, true, None)
            .unwrap();
        assert_eq!(h.active_parent(&item, false), Some(ElementKey::world_space()));
        let local = h.local_transform(&item, false).unwrap();
        assert_relative_eq!(local.translation, Vector3::new(11.0, 0.0, 0.0), epsilon = 1e-5);

        h.switch_to_parent(&item, &ElementKey::default_parent(), false, true, None)
            .unwrap();
        assert_eq!(h.active_parent(&item, false), Some(ElementKey::null("A")));
        assert_eq!(h.default_parent(&item), Some(ElementKey::null("A")));
    }

    #[test]
    fn dependency_map_detects_cycles() {
        let mut h = spaces();
        let mut deps = DependencyMap::new();
        // B is computed from Item.
        deps.insert(ElementKey::null("B"), vec![ElementKey::null("Item")]);
        let err = h
            .switch_to_parent(&ElementKey::null("Item"), &ElementKey::null("B"), false, true, Some(&deps))
            .unwrap_err();
        assert_eq!(err.category(), "cycle");
        assert_eq!(h.parents(&ElementKey::null("Item")), vec![ElementKey::null("A")]);
    }

    #[test]
    fn blended_parents_have_no_active_parent() {
        let mut h = spaces();
        let item = ElementKey::null("Item");
        h.controller()
            .unwrap()
            .add_parent(&item, &ElementKey::null("B"), 1.0, false)
            .unwrap();
        h.set_parent_weight(&item, &ElementKey::null("A"), ElementWeight::uniform(0.5), false, true)
            .unwrap();
        h.set_parent_weight(&item, &ElementKey::null("B"), ElementWeight::uniform(0.5), false, true)
            .unwrap();
        assert_eq!(h.active_parent(&item, false), None);
        // Local (1,0,0) in the frame half way between A and B.
        let global = h.global_transform(&item, false).unwrap();
        assert_relative_eq!(global.translation, Vector3::new(6.0, 5.0, 0.0), epsilon = 1e-5);
    }
}
