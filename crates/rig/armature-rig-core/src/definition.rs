//! JSON description of a rig class.

use anyhow::Context;
use armature_hierarchy_core::{ElementKeyRedirector, ElementPayload, HierarchyDefinition};
use armature_vm_core::RigProgram;
use hashbrown::HashSet;
use serde::{Deserialize, Serialize};

use crate::config::RigConfig;
use crate::error::RigError;
use crate::physics::PhysicsSolverDescription;
use crate::rig::ControlRig;

/// Marks a rig as a module plugged into a modular rig through connectors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleSettings {
    pub identifier: String,
    /// Namespace prefixed to the module's element names by its owner.
    pub namespace: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RigDefinition {
    pub name: String,
    pub hierarchy: HierarchyDefinition,
    pub program: RigProgram,
    pub physics_solvers: Vec<PhysicsSolverDescription>,
    pub config: RigConfig,
    pub shape_libraries: Vec<String>,
    pub module: Option<ModuleSettings>,
    pub redirector: ElementKeyRedirector,
    /// Events run by a plain `evaluate`; `[Forward]` when empty.
    pub event_queue: Vec<String>,
}

impl RigDefinition {
    pub fn from_json_str(json: &str) -> anyhow::Result<Self> {
        serde_json::from_str(json).context("parsing rig definition")
    }

    pub fn to_json_string(&self) -> anyhow::Result<String> {
        serde_json::to_string_pretty(self).context("serializing rig definition")
    }

    /// Solvers with their ids filled in, rejecting duplicate names.
    pub fn solvers(&self) -> Result<Vec<PhysicsSolverDescription>, RigError> {
        let mut names = HashSet::new();
        let mut solvers = self.physics_solvers.clone();
        for solver in &mut solvers {
            if !names.insert(solver.name.clone()) {
                return Err(RigError::DuplicatePhysicsSolver(solver.name.clone()));
            }
            solver.fill_id();
        }
        Ok(solvers)
    }

    /// Build the class default rig. Instances are created from it with
    /// [`ControlRig::instantiate`].
    pub fn build_class_default(&self) -> Result<ControlRig, RigError> {
        let solvers = self.solvers()?;
        let mut hierarchy = self.hierarchy.build()?;
        let mut settings = hierarchy.settings().clone();
        settings.procedural_element_limit = self.config.procedural_element_limit;
        hierarchy.set_settings(settings);

        for element in hierarchy.iter() {
            if let ElementPayload::Physics { solver, .. } = element.payload() {
                if !solver.is_nil() && !solvers.iter().any(|s| s.id == *solver) {
                    return Err(RigError::UnknownPhysicsSolver {
                        element: element.name().to_string(),
                        solver: solver.0.to_string(),
                    });
                }
            }
        }

        let mut rig = ControlRig::class_default(self.name.clone(), hierarchy, &self.program, self.config.clone())?;
        rig.physics_solvers = solvers;
        rig.shape_libraries = self.shape_libraries.clone();
        rig.module = self.module.clone();
        rig.redirector = self.redirector.clone();
        if !self.event_queue.is_empty() {
            rig.set_event_queue(self.event_queue.clone());
        }
        log::debug!("built class default rig '{}'", self.name);
        Ok(rig)
    }
}
