//! Bone data handed over by an animation host.

use anyhow::Context;
use armature_api_core::Transform;
use armature_hierarchy_core::BoneImport;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceBone {
    pub name: String,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub local: Transform,
}

/// Bind pose of a skeleton, parents listed before children.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReferenceSkeleton {
    pub bones: Vec<ReferenceBone>,
}

impl ReferenceSkeleton {
    pub fn from_json_str(json: &str) -> anyhow::Result<Self> {
        serde_json::from_str(json).context("parsing reference skeleton")
    }

    pub fn find(&self, name: &str) -> Option<&ReferenceBone> {
        self.bones.iter().find(|b| b.name == name)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.bones.iter().position(|b| b.name == name)
    }

    pub fn len(&self) -> usize {
        self.bones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    /// Rows for [`HierarchyController::import_bones`](armature_hierarchy_core::HierarchyController::import_bones).
    pub fn bone_imports(&self) -> Vec<BoneImport> {
        self.bones
            .iter()
            .map(|b| BoneImport {
                name: b.name.clone(),
                parent: b.parent.clone(),
                local: b.local,
            })
            .collect()
    }

    /// A pose holding every bone at its reference transform.
    pub fn reference_pose(&self, serial: u64) -> CompactPose {
        CompactPose {
            serial,
            bones: self
                .bones
                .iter()
                .map(|b| PoseBone {
                    name: b.name.clone(),
                    local: b.local,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseBone {
    pub name: String,
    pub local: Transform,
}

/// Local bone transforms for the bones a host currently evaluates.
///
/// `serial` changes whenever the host's bone set changes; caches keyed on
/// it must be rebuilt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompactPose {
    #[serde(default)]
    pub serial: u64,
    pub bones: Vec<PoseBone>,
}

impl CompactPose {
    pub fn find(&self, name: &str) -> Option<&PoseBone> {
        self.bones.iter().find(|b| b.name == name)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.bones.iter().position(|b| b.name == name)
    }

    pub fn len(&self) -> usize {
        self.bones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }
}
