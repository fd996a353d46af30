use armature_api_core::ElementKey;
use armature_rig_core::RigError;
use thiserror::Error;

/// Failures raised while driving a rig from an animation host.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum HostError {
    #[error(transparent)]
    Rig(#[from] RigError),
    #[error("variable '{name}' is missing or has another type on rig class '{class}'")]
    IncompatibleVariable { class: String, name: String },
    #[error("{key} is missing on rig class '{class}'")]
    MissingElement { class: String, key: ElementKey },
    #[error("control '{name}' is missing or has another type on rig class '{class}'")]
    IncompatibleControl { class: String, name: String },
    #[error("bone '{0}' is not driven by the rig")]
    UnknownBone(String),
}

impl HostError {
    pub fn category(&self) -> &'static str {
        match self {
            HostError::Rig(err) => err.category(),
            HostError::IncompatibleVariable { .. }
            | HostError::MissingElement { .. }
            | HostError::IncompatibleControl { .. } => "class_swap",
            HostError::UnknownBone(_) => "lookup",
        }
    }
}
