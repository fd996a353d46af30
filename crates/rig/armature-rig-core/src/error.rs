use armature_hierarchy_core::HierarchyError;
use armature_vm_core::VmError;
use thiserror::Error;

/// Failures while building a rig or driving its controls.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum RigError {
    #[error(transparent)]
    Hierarchy(#[from] HierarchyError),
    #[error(transparent)]
    Vm(#[from] VmError),
    #[error("control '{0}' not found")]
    UnknownControl(String),
    #[error("physics solver '{0}' is declared twice")]
    DuplicatePhysicsSolver(String),
    #[error("physics element '{element}' uses undeclared solver '{solver}'")]
    UnknownPhysicsSolver { element: String, solver: String },
    #[error("only a class default rig can create instances")]
    NotClassDefault,
}

impl RigError {
    pub fn category(&self) -> &'static str {
        match self {
            RigError::Hierarchy(err) => err.category(),
            RigError::Vm(err) => err.category(),
            RigError::UnknownControl(_) => "lookup",
            RigError::DuplicatePhysicsSolver(_) | RigError::UnknownPhysicsSolver { .. } => "definition",
            RigError::NotClassDefault => "instance",
        }
    }
}
