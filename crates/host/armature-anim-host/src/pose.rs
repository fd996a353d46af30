//! Data exchanged with the host's animation graph every frame.

use armature_rig_core::CompactPose;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Bone locals plus named float curves.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnimPose {
    pub pose: CompactPose,
    #[serde(default)]
    pub curves: IndexMap<String, f32>,
}

impl AnimPose {
    pub fn new(pose: CompactPose) -> Self {
        Self {
            pose,
            curves: IndexMap::new(),
        }
    }

    pub fn with_curve(mut self, name: impl Into<String>, value: f32) -> Self {
        self.curves.insert(name.into(), value);
        self
    }

    pub fn curve(&self, name: &str) -> Option<f32> {
        self.curves.get(name).copied()
    }
}

/// Routes one curve between the host and the rig.
///
/// For input mappings `source` is the host curve and `target` a rig curve
/// or Float control. Output mappings read `source` from the rig and write
/// the host curve named `target`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurveMapping {
    pub source: String,
    pub target: String,
}

impl CurveMapping {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }
}
