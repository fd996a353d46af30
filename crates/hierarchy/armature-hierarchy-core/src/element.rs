//! Element store records.
//!
//! Every element is one [`RigElement`] with a closed [`ElementPayload`]
//! carrying the per-type state. Transform-bearing payloads hold an
//! [`ElementPose`]: {initial, current} x {local, global}. At any time at most
//! one of local/global per slot is dirty; the dirty one is recomputed from
//! the other and the weighted parent frame when read.

use armature_api_core::{ControlValue, ElementKey, ElementType, Transform};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::control::ControlSettings;
use crate::metadata::MetadataStore;
use crate::weights::ParentConstraint;

/// Which of the four transform slots an operation addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransformType {
    InitialLocal,
    CurrentLocal,
    InitialGlobal,
    CurrentGlobal,
}

impl TransformType {
    pub fn new(initial: bool, local: bool) -> Self {
        match (initial, local) {
            (true, true) => TransformType::InitialLocal,
            (false, true) => TransformType::CurrentLocal,
            (true, false) => TransformType::InitialGlobal,
            (false, false) => TransformType::CurrentGlobal,
        }
    }

    pub fn is_initial(self) -> bool {
        matches!(self, TransformType::InitialLocal | TransformType::InitialGlobal)
    }

    pub fn is_local(self) -> bool {
        matches!(self, TransformType::InitialLocal | TransformType::CurrentLocal)
    }

    /// Same space, other pose.
    pub fn swap_pose(self) -> Self {
        Self::new(!self.is_initial(), self.is_local())
    }

    /// Same pose, other space.
    pub fn swap_space(self) -> Self {
        Self::new(self.is_initial(), !self.is_local())
    }
}

/// A pair of values kept for the initial and the current pose.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PoseSlots<T> {
    pub initial: T,
    pub current: T,
}

impl<T: Clone> PoseSlots<T> {
    pub fn splat(value: T) -> Self {
        Self {
            initial: value.clone(),
            current: value,
        }
    }
}

impl<T> PoseSlots<T> {
    pub fn get(&self, initial: bool) -> &T {
        if initial {
            &self.initial
        } else {
            &self.current
        }
    }

    pub fn get_mut(&mut self, initial: bool) -> &mut T {
        if initial {
            &mut self.initial
        } else {
            &mut self.current
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComputedTransform {
    pub transform: Transform,
    pub dirty: bool,
}

impl ComputedTransform {
    pub fn clean(transform: Transform) -> Self {
        Self {
            transform,
            dirty: false,
        }
    }

    pub fn dirty() -> Self {
        Self {
            transform: Transform::identity(),
            dirty: true,
        }
    }

    pub fn set(&mut self, transform: Transform) {
        self.transform = transform;
        self.dirty = false;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransformPose {
    pub local: ComputedTransform,
    pub global: ComputedTransform,
}

impl TransformPose {
    pub fn from_local(local: Transform) -> Self {
        Self {
            local: ComputedTransform::clean(local),
            global: ComputedTransform::dirty(),
        }
    }

    pub fn from_global(global: Transform) -> Self {
        Self {
            local: ComputedTransform::dirty(),
            global: ComputedTransform::clean(global),
        }
    }

    pub fn slot(&self, local: bool) -> &ComputedTransform {
        if local {
            &self.local
        } else {
            &self.global
        }
    }

    pub fn slot_mut(&mut self, local: bool) -> &mut ComputedTransform {
        if local {
            &mut self.local
        } else {
            &mut self.global
        }
    }
}

impl Default for TransformPose {
    fn default() -> Self {
        Self::from_local(Transform::identity())
    }
}

pub type ElementPose = PoseSlots<TransformPose>;

impl ElementPose {
    pub fn with_transform(transform: Transform, global: bool) -> Self {
        if global {
            Self::splat(TransformPose::from_global(transform))
        } else {
            Self::splat(TransformPose::from_local(transform))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BoneType {
    /// Initial transform comes from the reference skeleton.
    #[default]
    Imported,
    /// Created procedurally.
    User,
}

/// Rig-level physics solver a physics element points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PhysicsSolverId(pub Uuid);

impl PhysicsSolverId {
    /// Stable identifier derived from a solver name.
    pub fn from_name(name: &str) -> Self {
        Self(Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()))
    }

    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ConnectorType {
    #[default]
    Primary,
    Secondary,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectorSettings {
    pub connector_type: ConnectorType,
    /// Optional connectors do not block execution while unresolved.
    pub optional: bool,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CurveState {
    pub value: f32,
    pub value_set: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ControlState {
    pub pose: ElementPose,
    /// Offset layer between the parent frame and the control's local.
    pub offset: PoseSlots<Transform>,
    /// Gizmo transform relative to the control.
    pub shape: PoseSlots<Transform>,
    pub settings: ControlSettings,
    /// Last values written; used to keep Euler winding stable.
    pub values: PoseSlots<ControlValue>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ElementPayload {
    Bone { bone_type: BoneType, pose: ElementPose },
    Null { pose: ElementPose },
    Control(Box<ControlState>),
    Curve(CurveState),
    Physics { solver: PhysicsSolverId, pose: ElementPose },
    Reference { pose: ElementPose },
    Connector(ConnectorSettings),
}

impl ElementPayload {
    pub fn element_type(&self) -> ElementType {
        match self {
            ElementPayload::Bone { .. } => ElementType::Bone,
            ElementPayload::Null { .. } => ElementType::Null,
            ElementPayload::Control(_) => ElementType::Control,
            ElementPayload::Curve(_) => ElementType::Curve,
            ElementPayload::Physics { .. } => ElementType::Physics,
            ElementPayload::Reference { .. } => ElementType::Reference,
            ElementPayload::Connector(_) => ElementType::Connector,
        }
    }

    pub fn pose(&self) -> Option<&ElementPose> {
        match self {
            ElementPayload::Bone { pose, .. }
            | ElementPayload::Null { pose }
            | ElementPayload::Physics { pose, .. }
            | ElementPayload::Reference { pose } => Some(pose),
            ElementPayload::Control(control) => Some(&control.pose),
            ElementPayload::Curve(_) | ElementPayload::Connector(_) => None,
        }
    }

    pub fn pose_mut(&mut self) -> Option<&mut ElementPose> {
        match self {
            ElementPayload::Bone { pose, .. }
            | ElementPayload::Null { pose }
            | ElementPayload::Physics { pose, .. }
            | ElementPayload::Reference { pose } => Some(pose),
            ElementPayload::Control(control) => Some(&mut control.pose),
            ElementPayload::Curve(_) | ElementPayload::Connector(_) => None,
        }
    }

    pub fn control(&self) -> Option<&ControlState> {
        match self {
            ElementPayload::Control(control) => Some(control.as_ref()),
            _ => None,
        }
    }

    pub fn control_mut(&mut self) -> Option<&mut ControlState> {
        match self {
            ElementPayload::Control(control) => Some(control.as_mut()),
            _ => None,
        }
    }
}

/// One entry of the element store.
#[derive(Debug, Clone, PartialEq)]
pub struct RigElement {
    pub(crate) index: usize,
    pub(crate) key: ElementKey,
    pub(crate) parents: Vec<ParentConstraint>,
    pub(crate) children: Vec<usize>,
    pub(crate) metadata: MetadataStore,
    pub(crate) selected: bool,
    /// Created by a dynamic hierarchy unit during construction.
    pub(crate) procedural: bool,
    pub(crate) payload: ElementPayload,
}

impl RigElement {
    pub(crate) fn new(key: ElementKey, payload: ElementPayload) -> Self {
        Self {
            index: 0,
            key,
            parents: Vec::new(),
            children: Vec::new(),
            metadata: MetadataStore::new(),
            selected: false,
            procedural: false,
            payload,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn key(&self) -> &ElementKey {
        &self.key
    }

    pub fn name(&self) -> &str {
        &self.key.name
    }

    pub fn element_type(&self) -> ElementType {
        self.key.element_type
    }

    pub fn parents(&self) -> &[ParentConstraint] {
        &self.parents
    }

    /// Store indices of elements listing this one as a parent.
    pub fn children(&self) -> &[usize] {
        &self.children
    }

    pub fn metadata(&self) -> &MetadataStore {
        &self.metadata
    }

    pub fn is_selected(&self) -> bool {
        self.selected
    }

    pub fn is_procedural(&self) -> bool {
        self.procedural
    }

    pub fn payload(&self) -> &ElementPayload {
        &self.payload
    }

    pub fn pose(&self) -> Option<&ElementPose> {
        self.payload.pose()
    }

    pub fn control(&self) -> Option<&ControlState> {
        self.payload.control()
    }

    pub fn bone_type(&self) -> Option<BoneType> {
        match self.payload {
            ElementPayload::Bone { bone_type, .. } => Some(bone_type),
            _ => None,
        }
    }

    pub fn curve(&self) -> Option<&CurveState> {
        match &self.payload {
            ElementPayload::Curve(curve) => Some(curve),
            _ => None,
        }
    }

    pub fn connector(&self) -> Option<&ConnectorSettings> {
        match &self.payload {
            ElementPayload::Connector(settings) => Some(settings),
            _ => None,
        }
    }

    pub fn physics_solver(&self) -> Option<PhysicsSolverId> {
        match self.payload {
            ElementPayload::Physics { solver, .. } => Some(solver),
            _ => None,
        }
    }
}
