//! Hierarchy-wide settings.

use serde::{Deserialize, Serialize};

/// Default ceiling for elements created procedurally during construction.
pub const DEFAULT_PROCEDURAL_ELEMENT_LIMIT: usize = 2000;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HierarchySettings {
    /// Dynamic hierarchy units refuse to add elements once the hierarchy holds this many.
    pub procedural_element_limit: usize,
}

impl Default for HierarchySettings {
    fn default() -> Self {
        Self {
            procedural_element_limit: DEFAULT_PROCEDURAL_ELEMENT_LIMIT,
        }
    }
}
