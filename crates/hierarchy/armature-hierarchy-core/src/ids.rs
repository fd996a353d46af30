//! Cached element handles.
//!
//! A [`CachedElement`] remembers the store index a key resolved to together
//! with the topology version at the time. Any structural change bumps the
//! version, so stale handles re-resolve on their next use.

use armature_api_core::ElementKey;
use serde::{Deserialize, Serialize};

use crate::hierarchy::RigHierarchy;

/// Opaque handle returned by listener registration.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ListenerId(pub u64);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedElement {
    key: ElementKey,
    #[serde(skip)]
    index: Option<usize>,
    #[serde(skip)]
    topology_version: Option<u64>,
}

impl CachedElement {
    pub fn new(key: ElementKey) -> Self {
        Self {
            key,
            index: None,
            topology_version: None,
        }
    }

    /// Build an already-resolved handle.
    pub fn resolved(key: ElementKey, hierarchy: &RigHierarchy) -> Self {
        let mut cached = Self::new(key);
        cached.resolve(hierarchy);
        cached
    }

    pub fn key(&self) -> &ElementKey {
        &self.key
    }

    /// Last resolved index, without revalidation.
    pub fn cached_index(&self) -> Option<usize> {
        self.index
    }

    /// Whether the cached index is still current for `hierarchy`.
    pub fn is_valid(&self, hierarchy: &RigHierarchy) -> bool {
        self.index.is_some() && self.topology_version == Some(hierarchy.topology_version())
    }

    /// Resolve the key, re-looking it up when the topology changed.
    pub fn resolve(&mut self, hierarchy: &RigHierarchy) -> Option<usize> {
        if !self.is_valid(hierarchy) {
            self.index = hierarchy.index_of(&self.key);
            self.topology_version = Some(hierarchy.topology_version());
        }
        self.index
    }

    pub fn reset(&mut self) {
        self.index = None;
        self.topology_version = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::HierarchyDefinition;

    #[test]
    fn handle_revalidates_after_structural_change() {
        let mut hierarchy = HierarchyDefinition::from_json_str(
            r#"{"elements":[
                {"type":"Bone","name":"A"},
                {"type":"Bone","name":"B"}
            ]}"#,
        )
        .unwrap()
        .build()
        .unwrap();
        let mut handle = CachedElement::new(ElementKey::bone("B"));
        assert_eq!(handle.resolve(&hierarchy), Some(1));
        assert!(handle.is_valid(&hierarchy));

        hierarchy
            .controller()
            .unwrap()
            .remove_element(&ElementKey::bone("A"))
            .unwrap();
        assert!(!handle.is_valid(&hierarchy));
        assert_eq!(handle.resolve(&hierarchy), Some(0));
    }
}
