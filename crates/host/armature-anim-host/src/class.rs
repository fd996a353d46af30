use armature_rig_core::{ControlRig, RigDefinition};

use crate::error::HostError;

/// A rig class: the class default rig instances are created from.
///
/// The class default owns the hierarchy instances reset to during
/// construction, so a class must outlive every rig created from it.
#[derive(Debug)]
pub struct RigClass {
    cdo: ControlRig,
}

impl RigClass {
    pub fn from_definition(definition: &RigDefinition) -> Result<Self, HostError> {
        Ok(Self {
            cdo: definition.build_class_default()?,
        })
    }

    pub fn name(&self) -> &str {
        self.cdo.name()
    }

    pub fn class_default(&self) -> &ControlRig {
        &self.cdo
    }

    /// A fresh, initialized instance.
    pub fn instantiate(&self) -> Result<ControlRig, HostError> {
        let mut rig = self.cdo.instantiate()?;
        rig.initialize(true);
        Ok(rig)
    }
}
