//! armature-hierarchy-core: the rig element store (core, engine-agnostic)
//!
//! Elements live in an index arena keyed by [`ElementKey`](armature_api_core::ElementKey).
//! Every transform element carries four slots (initial/current x local/global)
//! resolved lazily through dirty flags; writes settle dependents first.

pub mod brackets;
pub mod config;
pub mod control;
pub mod controller;
pub mod definition;
pub mod element;
pub mod error;
pub mod hierarchy;
pub mod ids;
pub mod metadata;
pub mod notify;
pub mod parenting;
pub mod pose;
pub mod redirector;
pub mod transforms;
pub mod weights;

pub use brackets::{ControllerBracket, ExecuteBracket, NotificationBracket, SelectionNotificationBracket};
pub use config::HierarchySettings;
pub use control::{
    ControlAnimationType, ControlSettings, ControlValueType, FilteredChannel, ShapeSettings,
};
pub use controller::{BoneImport, HierarchyController};
pub use definition::{ElementDefinition, ElementKind, HierarchyDefinition, ParentDefinition};
pub use element::{
    BoneType, ConnectorSettings, ConnectorType, ControlState, CurveState, ElementPayload,
    ElementPose, PhysicsSolverId, PoseSlots, RigElement, TransformType,
};
pub use error::HierarchyError;
pub use hierarchy::{read_hierarchy, shared, write_hierarchy, RigHierarchy, SharedHierarchy, WeakHierarchy};
pub use ids::{CachedElement, ListenerId};
pub use metadata::{MetadataStore, MetadataValue};
pub use notify::{HierarchyEvent, HierarchyNotification};
pub use parenting::DependencyMap;
pub use pose::{PoseElement, RigPose};
pub use redirector::ElementKeyRedirector;
pub use weights::ParentConstraint;
