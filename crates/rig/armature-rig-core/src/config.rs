//! Per-rig options.

use armature_hierarchy_core::config::DEFAULT_PROCEDURAL_ELEMENT_LIMIT;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RigConfig {
    /// Hosts may draw control gizmos in game views.
    pub enable_draw_in_game: bool,
    /// Mirror every curve with a Float control of the same name.
    pub create_float_controls_for_curves: bool,
    pub procedural_element_limit: usize,
    /// Construction restores the default initial pose instead of keeping
    /// the one set since the last run.
    pub reset_initial_transforms_before_construction: bool,
    /// Current transforms survive construction.
    pub reset_current_transforms_after_construction: bool,
    pub copy_hierarchy_before_construction: bool,
    /// Control values are deltas on top of the animated pose.
    pub is_additive: bool,
    pub enable_anim_attribute_trace: bool,
}

impl Default for RigConfig {
    fn default() -> Self {
        Self {
            enable_draw_in_game: false,
            create_float_controls_for_curves: false,
            procedural_element_limit: DEFAULT_PROCEDURAL_ELEMENT_LIMIT,
            reset_initial_transforms_before_construction: true,
            reset_current_transforms_after_construction: false,
            copy_hierarchy_before_construction: true,
            is_additive: false,
            enable_anim_attribute_trace: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config: RigConfig = serde_json::from_str(r#"{"is_additive":true}"#).unwrap();
        assert!(config.is_additive);
        assert!(config.copy_hierarchy_before_construction);
        assert_eq!(config.procedural_element_limit, DEFAULT_PROCEDURAL_ELEMENT_LIMIT);
    }
}
