//! armature-rig-core: the Control Rig (core, engine-agnostic)
//!
//! A [`ControlRig`] owns one hierarchy and one VM. Class defaults are built
//! from a [`RigDefinition`]; instances share the class default's byte-code
//! and start from a copy of its hierarchy.

mod additive;
mod construction;
mod controls;
mod shapes;

pub mod config;
pub mod definition;
pub mod delegates;
pub mod diagnostics;
pub mod error;
pub mod physics;
pub mod rig;
pub mod skeleton;

pub use additive::{PendingControlValue, PendingParentSwitch};
pub use config::RigConfig;
pub use controls::CURVE_CONTROL_METADATA;
pub use definition::{ModuleSettings, RigDefinition};
pub use delegates::{ControlModifiedContext, DelegateId, RigDelegates, RigPhase};
pub use diagnostics::RigDiagnostics;
pub use error::RigError;
pub use physics::{instance_solver_id, PhysicsSolverDescription};
pub use rig::{ControlRig, InteractionType};
pub use shapes::{AddShapeLibraryFn, ShapeExistsFn, ShapeLibraryBindings};
pub use skeleton::{CompactPose, PoseBone, ReferenceBone, ReferenceSkeleton};

pub use armature_vm_core::events;
