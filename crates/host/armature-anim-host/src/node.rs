//! Anim graph node that runs a Control Rig on the incoming pose.

use std::sync::Arc;

use armature_api_core::{ControlType, ControlValue, ElementKey, Transform};
use armature_hierarchy_core::{read_hierarchy, write_hierarchy, ControlValueType};
use armature_rig_core::{events, CompactPose, ControlModifiedContext, ControlRig, ReferenceSkeleton, RigError};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::class::RigClass;
use crate::error::HostError;
use crate::pose::{AnimPose, CurveMapping};
use crate::properties::{propagate_input_properties, HostProperty};
use crate::swap::validate_class_swap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimNodeSettings {
    /// Also write incoming bone locals into the initial pose.
    pub transfer_initial_transforms: bool,
    pub input_curve_mappings: Vec<CurveMapping>,
    pub output_curve_mappings: Vec<CurveMapping>,
    /// Controls the host drives by name. A class swap must keep them.
    pub exposed_controls: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
enum CurveSlot {
    Curve(ElementKey),
    Control(String),
}

/// Lookups resolved against one bone container.
#[derive(Debug, Default)]
struct BoneCache {
    serial: Option<u64>,
    /// Pose bone index and the hierarchy bone it maps to.
    bones: Vec<(usize, ElementKey)>,
    inputs: Vec<Option<CurveSlot>>,
    outputs: Vec<Option<CurveSlot>>,
}

#[derive(Debug)]
pub struct AnimNodeControlRig {
    default_class: Arc<RigClass>,
    class: Arc<RigClass>,
    requested_class: Option<Arc<RigClass>>,
    rig: ControlRig,
    settings: AnimNodeSettings,
    properties: IndexMap<String, HostProperty>,
    reference_skeleton: Option<ReferenceSkeleton>,
    cache: BoneCache,
    last_output: Option<AnimPose>,
}

impl AnimNodeControlRig {
    /// Create a node running `class`, which also becomes the fallback class.
    pub fn new(class: Arc<RigClass>, settings: AnimNodeSettings) -> Result<Self, HostError> {
        let rig = class.instantiate()?;
        Ok(Self {
            default_class: Arc::clone(&class),
            class,
            requested_class: None,
            rig,
            settings,
            properties: IndexMap::new(),
            reference_skeleton: None,
            cache: BoneCache::default(),
            last_output: None,
        })
    }

    pub fn rig(&self) -> &ControlRig {
        &self.rig
    }

    pub fn rig_mut(&mut self) -> &mut ControlRig {
        &mut self.rig
    }

    pub fn class(&self) -> &Arc<RigClass> {
        &self.class
    }

    pub fn settings(&self) -> &AnimNodeSettings {
        &self.settings
    }

    /// Class used when a requested swap is rejected.
    pub fn set_default_class(&mut self, class: Arc<RigClass>) {
        self.default_class = class;
    }

    /// Ask for another class. The swap happens on the next evaluation.
    pub fn set_rig_class(&mut self, class: Arc<RigClass>) {
        self.requested_class = Some(class);
    }

    pub fn set_property(&mut self, name: impl Into<String>, value: HostProperty) {
        self.properties.insert(name.into(), value);
    }

    pub fn clear_properties(&mut self) {
        self.properties.clear();
    }

    /// Use the skeleton's bind pose as the rig's imported bone initials.
    /// Survives class swaps.
    pub fn set_reference_skeleton(&mut self, skeleton: ReferenceSkeleton) -> usize {
        let updated = self.rig.set_bone_initial_transforms_from_ref_skeleton(&skeleton);
        self.reference_skeleton = Some(skeleton);
        updated
    }

    /// Swap to the requested class when there is one.
    ///
    /// An incompatible class is refused with a warning and the node falls
    /// back to its default class. Returns whether the live rig changed.
    pub fn update_rig_if_needed(&mut self) -> bool {
        let Some(requested) = self.requested_class.take() else {
            return false;
        };
        if Arc::ptr_eq(&requested, &self.class) {
            return false;
        }
        let next = match validate_class_swap(&self.rig, &requested, &self.settings.exposed_controls) {
            Ok(()) => requested,
            Err(err) => {
                log::warn!(
                    "cannot swap to rig class '{}': {err}; falling back to '{}'",
                    requested.name(),
                    self.default_class.name()
                );
                if Arc::ptr_eq(&self.class, &self.default_class) {
                    return false;
                }
                Arc::clone(&self.default_class)
            }
        };
        match self.swap_to(next) {
            Ok(()) => true,
            Err(err) => {
                log::error!("rig class swap failed: {err}");
                false
            }
        }
    }

    fn swap_to(&mut self, class: Arc<RigClass>) -> Result<(), HostError> {
        let mut rig = class.instantiate()?;
        if let Some(skeleton) = &self.reference_skeleton {
            rig.set_bone_initial_transforms_from_ref_skeleton(skeleton);
        }
        log::debug!("rig class '{}' replaced by '{}'", self.class.name(), class.name());
        self.rig = rig;
        self.class = class;
        self.cache = BoneCache::default();
        Ok(())
    }

    /// Map pose bones and curve mappings onto the rig. Kept until the
    /// container serial changes or the class is swapped.
    pub fn cache_bones(&mut self, pose: &CompactPose) {
        if self.cache.serial == Some(pose.serial) {
            return;
        }
        let bones = {
            let hierarchy = read_hierarchy(self.rig.hierarchy());
            pose.bones
                .iter()
                .enumerate()
                .filter_map(|(index, bone)| {
                    let key = ElementKey::bone(bone.name.clone());
                    hierarchy.contains(&key).then_some((index, key))
                })
                .collect()
        };
        let inputs = self
            .settings
            .input_curve_mappings
            .iter()
            .map(|mapping| self.curve_slot(&mapping.target))
            .collect();
        let outputs = self
            .settings
            .output_curve_mappings
            .iter()
            .map(|mapping| self.curve_slot(&mapping.source))
            .collect();
        self.cache = BoneCache {
            serial: Some(pose.serial),
            bones,
            inputs,
            outputs,
        };
    }

    fn curve_slot(&self, name: &str) -> Option<CurveSlot> {
        if let Some(settings) = self.rig.find_control(name) {
            return matches!(settings.control_type, ControlType::Float | ControlType::ScaleFloat)
                .then(|| CurveSlot::Control(name.to_string()));
        }
        let key = ElementKey::curve(name);
        if read_hierarchy(self.rig.hierarchy()).contains(&key) {
            return Some(CurveSlot::Curve(key));
        }
        log::debug!("curve mapping '{name}' matches nothing on rig '{}'", self.rig.name());
        None
    }

    /// Write the incoming bones and mapped curves into the rig.
    ///
    /// Pending construction runs first so it cannot overwrite the input.
    pub fn update_input(&mut self, input: &AnimPose) {
        if self.rig.is_construction_required() {
            self.rig.execute(events::CONSTRUCTION);
        }
        self.cache_bones(&input.pose);

        {
            let mut hierarchy = write_hierarchy(self.rig.hierarchy());
            for (index, key) in &self.cache.bones {
                let Some(bone) = input.pose.bones.get(*index) else {
                    continue;
                };
                if self.settings.transfer_initial_transforms {
                    if let Err(err) = hierarchy.set_local_transform(key, bone.local, true, true) {
                        log::warn!("{err}");
                    }
                }
                if let Err(err) = hierarchy.set_local_transform(key, bone.local, false, true) {
                    log::warn!("{err}");
                }
            }
        }

        for (mapping, slot) in self.settings.input_curve_mappings.iter().zip(&self.cache.inputs) {
            let (Some(slot), Some(value)) = (slot, input.curve(&mapping.source)) else {
                continue;
            };
            let result = match slot {
                CurveSlot::Curve(key) => write_hierarchy(self.rig.hierarchy())
                    .set_curve_value(key, value)
                    .map_err(RigError::from),
                CurveSlot::Control(name) => self.rig.set_control_value(
                    name,
                    ControlValue::Float(value),
                    false,
                    ControlModifiedContext::default(),
                ),
            };
            if let Err(err) = result {
                log::warn!("input curve '{}' not applied: {err}", mapping.source);
            }
        }

        if !self.properties.is_empty() {
            propagate_input_properties(&mut self.rig, &self.properties);
        }
    }

    /// Copy the rig's bones and mapped curves into `output`.
    pub fn update_output(&self, output: &mut AnimPose) {
        let hierarchy = read_hierarchy(self.rig.hierarchy());
        for (index, key) in &self.cache.bones {
            if let (Some(bone), Ok(local)) = (output.pose.bones.get_mut(*index), hierarchy.local_transform(key, false)) {
                bone.local = local;
            }
        }
        for (mapping, slot) in self.settings.output_curve_mappings.iter().zip(&self.cache.outputs) {
            let value = match slot {
                Some(CurveSlot::Curve(key)) => hierarchy.curve_value(key),
                Some(CurveSlot::Control(name)) => hierarchy
                    .control_value(&ElementKey::control(name.as_str()), ControlValueType::Current)
                    .ok()
                    .and_then(|value| value.as_float()),
                None => None,
            };
            if let Some(value) = value {
                output.curves.insert(mapping.target.clone(), value);
            }
        }
    }

    /// Run one frame: swap class if requested, feed the input, evaluate and
    /// read the result back.
    ///
    /// A failed evaluation returns the last good output for the same bone
    /// container, or the input unchanged.
    pub fn evaluate_any_thread(&mut self, input: &AnimPose) -> AnimPose {
        self.update_rig_if_needed();
        self.update_input(input);
        self.rig.reset_pose_before_backwards_solve_capture();

        if self.rig.evaluate_any_thread() {
            let mut output = input.clone();
            self.update_output(&mut output);
            self.last_output = Some(output.clone());
            return output;
        }
        log::debug!("rig '{}' failed to evaluate; holding the last good pose", self.rig.name());
        self.last_output
            .as_ref()
            .filter(|last| last.pose.serial == input.pose.serial)
            .cloned()
            .unwrap_or_else(|| input.clone())
    }

    /// Current local transform of a bone the rig drives.
    pub fn bone_transform(&self, name: &str) -> Result<Transform, HostError> {
        let key = ElementKey::bone(name);
        let hierarchy = read_hierarchy(self.rig.hierarchy());
        if !hierarchy.contains(&key) {
            return Err(HostError::UnknownBone(name.to_string()));
        }
        hierarchy
            .local_transform(&key, false)
            .map_err(|err| HostError::Rig(err.into()))
    }
}
