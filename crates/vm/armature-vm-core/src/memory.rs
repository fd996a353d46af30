//! Per-instance VM state: unit output registers and variable values.

use hashbrown::HashMap;
use indexmap::IndexMap;

use crate::bytecode::ByteCode;
use crate::value::VmValue;

pub type Outputs = HashMap<String, VmValue>;

#[derive(Debug, Clone, PartialEq)]
pub struct VmVariable {
    pub value: VmValue,
    pub public: bool,
}

#[derive(Debug, Clone, Default)]
pub struct VmMemory {
    pub registers: Vec<Option<Outputs>>,
    pub variables: IndexMap<String, VmVariable>,
}

impl VmMemory {
    pub fn new(bytecode: &ByteCode) -> Self {
        let mut memory = Self::default();
        memory.reset_variables(bytecode);
        memory
    }

    pub fn reset_variables(&mut self, bytecode: &ByteCode) {
        self.variables = bytecode
            .variables()
            .iter()
            .map(|(name, spec)| {
                (
                    name.clone(),
                    VmVariable {
                        value: spec.value.clone(),
                        public: spec.public,
                    },
                )
            })
            .collect();
    }

    pub fn reset_private_variables(&mut self, bytecode: &ByteCode) {
        let previous = std::mem::take(&mut self.variables);
        self.reset_variables(bytecode);
        for (name, variable) in self.variables.iter_mut().filter(|(_, v)| v.public) {
            if let Some(kept) = previous.get(name).filter(|old| old.value.same_kind(&variable.value)) {
                variable.value = kept.value.clone();
            }
        }
    }

    pub(crate) fn clear_registers(&mut self, len: usize) {
        self.registers.clear();
        self.registers.resize(len, None);
    }

    pub(crate) fn read(&self, source: usize, key: &str) -> Option<&VmValue> {
        self.registers.get(source)?.as_ref()?.get(key)
    }
}
