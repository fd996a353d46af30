use thiserror::Error;

/// Errors raised while compiling a rig program or touching VM variables.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum VmError {
    #[error("node '{node}' input '{input}' references unknown node '{source_node}'")]
    UnknownInputNode {
        node: String,
        input: String,
        source_node: String,
    },
    #[error("duplicate node id '{0}'")]
    DuplicateNode(String),
    #[error("cycle detected in the '{event}' program")]
    Cycle { event: String },
    #[error("unknown variable '{0}'")]
    UnknownVariable(String),
    #[error("variable '{name}' holds {expected} values, got {found}")]
    VariableTypeMismatch {
        name: String,
        expected: &'static str,
        found: &'static str,
    },
}

impl VmError {
    pub fn category(&self) -> &'static str {
        match self {
            VmError::UnknownInputNode { .. } | VmError::DuplicateNode(_) | VmError::Cycle { .. } => {
                "compile"
            }
            VmError::UnknownVariable(_) | VmError::VariableTypeMismatch { .. } => "variable",
        }
    }
}
