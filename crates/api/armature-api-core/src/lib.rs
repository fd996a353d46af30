//! armature-api-core: transform math and typed control values (core, engine-agnostic)

pub mod blend;
pub mod coercion;
pub mod error;
pub mod key;
pub mod limits;
pub mod rotator;
pub mod transform;
pub mod value;

pub use blend::ElementWeight;
pub use error::ApiError;
pub use key::{ElementKey, ElementType, ElementTypeMask};
pub use limits::{ControlLimits, LimitEnabled};
pub use rotator::Rotator;
pub use transform::{EulerTransform, Transform, TransformNoScale};
pub use value::{ControlAxis, ControlType, ControlValue};

pub use nalgebra::{UnitQuaternion, Vector3};
