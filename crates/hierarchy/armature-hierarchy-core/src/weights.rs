//! Parent relations and their blend weights.

use armature_api_core::ElementWeight;
use serde::{Deserialize, Serialize};

use crate::element::PoseSlots;

/// One parent of an element. `parent` is a store index.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParentConstraint {
    pub parent: usize,
    pub weight: PoseSlots<ElementWeight>,
}

impl ParentConstraint {
    pub fn new(parent: usize, weight: ElementWeight) -> Self {
        Self {
            parent,
            weight: PoseSlots::splat(weight),
        }
    }

    pub fn weight(&self, initial: bool) -> ElementWeight {
        *self.weight.get(initial)
    }

    pub fn affects(&self, initial: bool) -> bool {
        !self.weight(initial).is_almost_zero()
    }
}

/// Index of the single parent carrying weight, if exactly one does.
pub(crate) fn single_affecting(parents: &[ParentConstraint], initial: bool) -> Option<usize> {
    let mut affecting = parents.iter().filter(|p| p.affects(initial));
    match (affecting.next(), affecting.next()) {
        (Some(only), None) => Some(only.parent),
        _ => None,
    }
}

pub(crate) fn any_affecting(parents: &[ParentConstraint], initial: bool) -> bool {
    parents.iter().any(|p| p.affects(initial))
}
