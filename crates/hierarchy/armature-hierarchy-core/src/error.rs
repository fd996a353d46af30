use armature_api_core::{ApiError, ElementKey, ElementType};
use thiserror::Error;

/// Structural failures reported by hierarchy operations.
///
/// The `Display` form is the human readable failure string handed back to
/// callers and report sinks.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum HierarchyError {
    #[error("element '{0}' not found")]
    ElementNotFound(ElementKey),
    #[error("element index {0} is out of range")]
    InvalidIndex(usize),
    #[error("element '{0}' does not carry a transform")]
    NotATransformElement(ElementKey),
    #[error("element '{0}' is not a control")]
    NotAControl(ElementKey),
    #[error("element '{0}' is not a curve")]
    NotACurve(ElementKey),
    #[error("parenting '{child}' under '{parent}' would create a cycle")]
    Cycle { child: ElementKey, parent: ElementKey },
    #[error("'{parent}' is not a parent of '{child}'")]
    ParentNotFound { child: ElementKey, parent: ElementKey },
    #[error("element type {0} cannot be used as a parent")]
    InvalidParentType(ElementType),
    #[error("element '{0}' already exists")]
    DuplicateElement(ElementKey),
    #[error("invalid element name '{0}'")]
    InvalidName(String),
    #[error("the hierarchy controller is only available outside of execution or within a controller bracket")]
    ControllerUnavailable,
    #[error("no default hierarchy is available")]
    DefaultHierarchyUnavailable,
    #[error("metadata '{name}' on '{key}' has a different type")]
    MetadataTypeMismatch { key: ElementKey, name: String },
    #[error(transparent)]
    Value(#[from] ApiError),
}

impl HierarchyError {
    pub fn category(&self) -> &'static str {
        match self {
            HierarchyError::ElementNotFound(_)
            | HierarchyError::InvalidIndex(_)
            | HierarchyError::ParentNotFound { .. }
            | HierarchyError::DefaultHierarchyUnavailable => "lookup",
            HierarchyError::NotATransformElement(_)
            | HierarchyError::NotAControl(_)
            | HierarchyError::NotACurve(_)
            | HierarchyError::InvalidParentType(_)
            | HierarchyError::MetadataTypeMismatch { .. }
            | HierarchyError::Value(_) => "type",
            HierarchyError::Cycle { .. } => "cycle",
            HierarchyError::DuplicateElement(_) | HierarchyError::InvalidName(_) => "name",
            HierarchyError::ControllerUnavailable => "controller",
        }
    }
}
