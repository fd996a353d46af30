//! armature-anim-host
//!
//! Drives a [`ControlRig`](armature_rig_core::ControlRig) from a skeletal
//! animation host: incoming bone locals and curves go in, the solved bones
//! and curves come back out, host properties are pushed onto controls and
//! variables, and the rig class can be swapped at runtime.

pub mod class;
pub mod error;
pub mod node;
pub mod pose;
pub mod properties;
pub mod swap;

pub use class::RigClass;
pub use error::HostError;
pub use node::{AnimNodeControlRig, AnimNodeSettings};
pub use pose::{AnimPose, CurveMapping};
pub use properties::{propagate_input_properties, HostProperty};
pub use swap::validate_class_swap;

pub use armature_rig_core::{CompactPose, PoseBone, ReferenceBone, ReferenceSkeleton};
