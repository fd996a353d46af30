//! Physics solver descriptions held at rig level.
//!
//! Physics elements refer to a solver by id. Instances get their own ids,
//! derived from the instance id so the mapping is stable per instance.

use armature_hierarchy_core::PhysicsSolverId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhysicsSolverDescription {
    pub name: String,
    /// Derived from `name` when omitted.
    #[serde(default)]
    pub id: PhysicsSolverId,
}

impl PhysicsSolverDescription {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: PhysicsSolverId::from_name(&name),
            name,
        }
    }

    pub(crate) fn fill_id(&mut self) {
        if self.id.is_nil() {
            self.id = PhysicsSolverId::from_name(&self.name);
        }
    }
}

/// Instance-unique id for a class-default solver id.
pub fn instance_solver_id(instance: Uuid, solver: PhysicsSolverId) -> PhysicsSolverId {
    if solver.is_nil() {
        return solver;
    }
    PhysicsSolverId(Uuid::new_v5(&instance, solver.0.as_bytes()))
}
