//! Construction: rebuild procedural state from the rig's defaults, then run
//! the Construction event.

use armature_api_core::{ElementKey, ElementTypeMask, Transform};
use armature_hierarchy_core::{read_hierarchy, write_hierarchy, BoneType, HierarchyNotification, RigHierarchy, TransformType};
use armature_vm_core::events::{CONSTRUCTION, POST_CONSTRUCTION};

use crate::controls::add_curve_controls;
use crate::delegates::RigPhase;
use crate::physics::instance_solver_id;
use crate::rig::ControlRig;
use crate::skeleton::{CompactPose, ReferenceSkeleton};

impl ControlRig {
    /// Run construction with selection notifications held back.
    ///
    /// Afterwards only keys that were selected before and no longer exist
    /// are announced as deselected. Selections made by the Construction
    /// event itself are dropped without a notification.
    pub(crate) fn run_construction(&mut self, hierarchy: &mut RigHierarchy) -> bool {
        if self.constructing {
            log::warn!("rig '{}': construction is being called recursively", self.rig_name());
            return false;
        }
        self.constructing = true;
        let previous_selection = hierarchy.selected_keys().to_vec();
        let ok = {
            let mut quiet = hierarchy.selection_notification_bracket();
            let ok = self.construct(&mut quiet);
            quiet.clear_selection();
            for key in &previous_selection {
                if quiet.contains(key) {
                    let _ = quiet.select(key, true);
                }
            }
            ok
        };
        for key in previous_selection.iter().filter(|key| !hierarchy.is_selected(key)) {
            hierarchy.notify(HierarchyNotification::ElementDeselected, Some(key));
        }
        self.constructing = false;
        self.construction_pending = false;
        self.delegates.broadcast(RigPhase::PostConstruction, CONSTRUCTION);
        log::debug!("rig '{}' constructed (ok: {ok})", self.rig_name());
        ok
    }

    fn construct(&mut self, hierarchy: &mut RigHierarchy) -> bool {
        let current_before = self
            .config
            .reset_current_transforms_after_construction
            .then(|| hierarchy.get_pose(false, ElementTypeMask::TO_RESET_AFTER_CONSTRUCTION, &[]));
        let initial_before = (!self.config.reset_initial_transforms_before_construction)
            .then(|| hierarchy.get_pose(true, ElementTypeMask::BONE | ElementTypeMask::NULL, &[]));

        self.reset_to_defaults(hierarchy);
        self.apply_bone_initials(hierarchy);
        if let Some(pose) = &initial_before {
            hierarchy.set_pose(pose, TransformType::InitialLocal);
        }
        if self.config.create_float_controls_for_curves {
            if let Err(err) = add_curve_controls(hierarchy) {
                log::warn!("rig '{}': could not create curve controls: {err}", self.rig_name());
            }
        }
        hierarchy.reset_pose_to_initial(ElementTypeMask::ALL);
        self.restore_shape_libraries();

        self.delegates.broadcast(RigPhase::PreConstruction, CONSTRUCTION);
        let mut ok = !self.supports_event(CONSTRUCTION) || self.execute_internal(hierarchy, CONSTRUCTION);
        if self.supports_event(POST_CONSTRUCTION) && !self.event_queue().iter().any(|e| e == POST_CONSTRUCTION) {
            ok &= self.execute_internal(hierarchy, POST_CONSTRUCTION);
        }

        if let Some(pose) = &current_before {
            hierarchy.set_pose(pose, TransformType::CurrentLocal);
        }
        ok
    }

    /// Copy the class default hierarchy back in, or drop what the last
    /// construction created when there is nothing to copy from.
    fn reset_to_defaults(&mut self, hierarchy: &mut RigHierarchy) {
        let mut copied = false;
        if self.config.copy_hierarchy_before_construction && hierarchy.default_hierarchy().is_some() {
            let settings = hierarchy.settings().clone();
            match hierarchy.reset_to_default() {
                Ok(()) => {
                    hierarchy.set_settings(settings);
                    let instance = self.instance_id();
                    hierarchy.remap_physics_solvers(|id| instance_solver_id(instance, id));
                    copied = true;
                }
                Err(err) => log::warn!("rig '{}': {err}; keeping the live hierarchy", self.rig_name()),
            }
        }
        if !copied {
            remove_procedural_elements(hierarchy);
        }
    }

    /// Write reference-skeleton locals into the initial pose of imported bones.
    ///
    /// The locals are remembered and survive later constructions. Returns
    /// how many bones were updated and schedules construction.
    pub fn set_bone_initial_transforms_from_ref_skeleton(&mut self, skeleton: &ReferenceSkeleton) -> usize {
        self.set_imported_bone_initials(|name| skeleton.find(name).map(|bone| bone.local))
    }

    pub fn set_bone_initial_transforms_from_compact_pose(&mut self, pose: &CompactPose) -> usize {
        self.set_imported_bone_initials(|name| pose.find(name).map(|bone| bone.local))
    }

    fn set_imported_bone_initials(&mut self, lookup: impl Fn(&str) -> Option<Transform>) -> usize {
        let updated = {
            let hierarchy = read_hierarchy(&self.hierarchy);
            hierarchy
                .iter()
                .filter(|element| element.bone_type() == Some(BoneType::Imported))
                .filter_map(|element| lookup(element.name()).map(|local| (element.name().to_string(), local)))
                .collect::<Vec<_>>()
        };
        let count = updated.len();
        self.bone_initials.extend(updated);
        self.apply_bone_initials(&mut write_hierarchy(&self.hierarchy));
        self.request_construction();
        count
    }

    /// Re-apply the remembered reference locals, parents first.
    fn apply_bone_initials(&self, hierarchy: &mut RigHierarchy) {
        if self.bone_initials.is_empty() {
            return;
        }
        let bones: Vec<(ElementKey, Transform)> = hierarchy
            .iter()
            .filter(|element| element.bone_type() == Some(BoneType::Imported))
            .filter_map(|element| {
                self.bone_initials
                    .get(element.name())
                    .map(|local| (element.key().clone(), *local))
            })
            .collect();
        for (key, local) in &bones {
            if let Err(err) = hierarchy.set_local_transform(key, *local, true, true) {
                log::warn!("rig '{}': {err}", self.rig_name());
            }
        }
    }
}

fn remove_procedural_elements(hierarchy: &mut RigHierarchy) {
    let procedural: Vec<ElementKey> = hierarchy
        .iter()
        .filter(|element| element.is_procedural())
        .map(|element| element.key().clone())
        .collect();
    if procedural.is_empty() {
        return;
    }
    let Some(mut controller) = hierarchy.controller() else {
        log::warn!("controller unavailable; {} procedural elements kept", procedural.len());
        return;
    };
    for key in procedural.iter().rev() {
        if let Err(err) = controller.remove_element(key) {
            log::warn!("could not remove procedural element {key}: {err}");
        }
    }
}
