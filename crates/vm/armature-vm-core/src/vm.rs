//! The rig VM: shared byte-code plus per-instance memory.

use std::sync::Arc;

use armature_hierarchy_core::{DependencyMap, ElementKeyRedirector};
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::bytecode::ByteCode;
use crate::context::ExecuteContext;
use crate::error::VmError;
use crate::memory::VmMemory;
use crate::program::RigProgram;
use crate::report::Severity;
use crate::units::{execute_unit, UnitInputs, UnitIssue};
use crate::value::VmValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecuteResult {
    Succeeded,
    Failed,
}

impl ExecuteResult {
    pub fn succeeded(self) -> bool {
        self == ExecuteResult::Succeeded
    }
}

#[derive(Debug, Clone)]
pub struct RigVm {
    bytecode: Arc<ByteCode>,
    memory: VmMemory,
    initialized: bool,
}

impl RigVm {
    /// Memory starts out initialized with the declared variable defaults.
    pub fn new(bytecode: Arc<ByteCode>) -> Self {
        let memory = VmMemory::new(&bytecode);
        Self {
            bytecode,
            memory,
            initialized: true,
        }
    }

    pub fn from_program(program: &RigProgram) -> Result<Self, VmError> {
        Ok(Self::new(ByteCode::compile(program)?))
    }

    pub fn bytecode(&self) -> &Arc<ByteCode> {
        &self.bytecode
    }

    /// A fresh VM over the same byte-code with its own memory.
    pub fn share(&self) -> Self {
        Self::new(Arc::clone(&self.bytecode))
    }

    /// Reset private variables to their declared defaults. Public variables
    /// are host inputs and keep their current values.
    pub fn initialize(&mut self) {
        self.memory.reset_private_variables(&self.bytecode);
        self.memory.registers.clear();
        self.initialized = true;
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn supports_event(&self, event: &str) -> bool {
        self.bytecode.supports_event(event)
    }

    pub fn event_names(&self) -> Vec<String> {
        self.bytecode.event_names().map(str::to_string).collect()
    }

    /// Run the program for `ctx.event`.
    ///
    /// A unit that cannot run is reported and skipped. A failing unit stops
    /// the event; writes made before it stay in the hierarchy.
    pub fn execute(&mut self, ctx: &mut ExecuteContext<'_>) -> ExecuteResult {
        if !self.initialized {
            self.initialize();
        }
        let bytecode = Arc::clone(&self.bytecode);
        let Some(instructions) = bytecode.instructions(ctx.event) else {
            return ExecuteResult::Succeeded;
        };
        self.memory.clear_registers(instructions.len());

        for (slot, instruction) in instructions.iter().enumerate() {
            let node = &instruction.node;
            let mut values = HashMap::with_capacity(instruction.inputs.len());
            for input in &instruction.inputs {
                let value = self
                    .memory
                    .read(input.source, &input.output_key)
                    .cloned()
                    .unwrap_or_default();
                values.insert(input.port.as_str(), value);
            }
            let inputs = UnitInputs::new(&node.params, values);
            ctx.set_node(&node.id);

            match execute_unit(ctx, &mut self.memory.variables, node, &inputs) {
                Ok(outputs) => self.memory.registers[slot] = Some(outputs),
                Err(UnitIssue::Warning(message)) => {
                    log::warn!("{} / {}: {message}", ctx.event, node.id);
                    ctx.report(Severity::Warning, message);
                }
                Err(UnitIssue::Error(message)) => {
                    log::error!("{} / {}: {message}", ctx.event, node.id);
                    ctx.report(Severity::Error, message);
                }
                Err(UnitIssue::Fail(message)) => {
                    log::error!("{} / {} failed: {message}", ctx.event, node.id);
                    ctx.report(Severity::Error, message);
                    return ExecuteResult::Failed;
                }
            }
        }
        ExecuteResult::Succeeded
    }

    pub fn variable(&self, name: &str) -> Option<&VmValue> {
        self.memory.variables.get(name).map(|v| &v.value)
    }

    /// Write a variable; the value must keep the declared kind.
    pub fn set_variable(&mut self, name: &str, value: VmValue) -> Result<(), VmError> {
        let variable = self
            .memory
            .variables
            .get_mut(name)
            .ok_or_else(|| VmError::UnknownVariable(name.to_string()))?;
        if !variable.value.same_kind(&value) {
            return Err(VmError::VariableTypeMismatch {
                name: name.to_string(),
                expected: variable.value.kind_name(),
                found: value.kind_name(),
            });
        }
        variable.value = value;
        Ok(())
    }

    pub fn public_variables(&self) -> impl Iterator<Item = (&str, &VmValue)> {
        self.memory
            .variables
            .iter()
            .filter(|(_, v)| v.public)
            .map(|(name, v)| (name.as_str(), &v.value))
    }

    pub fn dependency_map(&self, redirector: Option<&ElementKeyRedirector>) -> DependencyMap {
        self.bytecode.dependency_map(redirector)
    }
}
