//! Compatibility checks for replacing a live rig with another class.

use armature_api_core::{ElementKey, ElementType};
use armature_hierarchy_core::{read_hierarchy, BoneType};
use armature_rig_core::ControlRig;

use crate::class::RigClass;
use crate::error::HostError;

/// Check that `class` can take over from `current`.
///
/// Every public variable of `current` must exist on the class with the
/// same kind, every imported bone and curve must exist in its hierarchy,
/// and every exposed control must keep its control type.
pub fn validate_class_swap(current: &ControlRig, class: &RigClass, exposed_controls: &[String]) -> Result<(), HostError> {
    let target = class.class_default();

    for (name, value) in current.public_variables() {
        if !target.variable(&name).is_some_and(|v| v.same_kind(&value)) {
            return Err(HostError::IncompatibleVariable {
                class: class.name().to_string(),
                name,
            });
        }
    }

    let required: Vec<ElementKey> = read_hierarchy(current.hierarchy())
        .iter()
        .filter(|element| !element.is_procedural())
        .filter(|element| {
            element.bone_type() == Some(BoneType::Imported) || element.element_type() == ElementType::Curve
        })
        .map(|element| element.key().clone())
        .collect();
    {
        let hierarchy = read_hierarchy(target.hierarchy());
        if let Some(key) = required.into_iter().find(|key| !hierarchy.contains(key)) {
            return Err(HostError::MissingElement {
                class: class.name().to_string(),
                key,
            });
        }
    }

    for name in exposed_controls {
        let before = current.find_control(name).map(|s| s.control_type);
        let after = target.find_control(name).map(|s| s.control_type);
        if before.is_none() || before != after {
            return Err(HostError::IncompatibleControl {
                class: class.name().to_string(),
                name: name.clone(),
            });
        }
    }
    Ok(())
}
