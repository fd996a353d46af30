//! Compiled programs.
//!
//! A [`ByteCode`] is immutable once built and is shared through an `Arc`
//! between a class default rig and its instances; only [`VmMemory`]
//! differs per instance.
//!
//! [`VmMemory`]: crate::memory::VmMemory

use std::sync::Arc;

use armature_api_core::ElementKey;
use armature_hierarchy_core::{DependencyMap, ElementKeyRedirector};
use hashbrown::HashSet;
use indexmap::IndexMap;

use crate::error::VmError;
use crate::program::{NodeSpec, RigProgram, UnitKind, VariableSpec};
use crate::topo::topo_order;
use crate::value::VmValue;

/// Input port bound to the register of an earlier instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundInput {
    pub port: String,
    pub source: usize,
    pub output_key: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub node: NodeSpec,
    pub inputs: Vec<BoundInput>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ByteCode {
    events: IndexMap<String, Vec<Instruction>>,
    variables: IndexMap<String, VariableSpec>,
}

impl ByteCode {
    pub fn compile(program: &RigProgram) -> Result<Arc<ByteCode>, VmError> {
        let mut events = IndexMap::with_capacity(program.events.len());
        for (event, graph) in &program.events {
            let order = topo_order(event, &graph.nodes)?;
            let mut slot_of = vec![0usize; graph.nodes.len()];
            for (slot, &node) in order.iter().enumerate() {
                slot_of[node] = slot;
            }
            let instructions = order
                .iter()
                .map(|&i| {
                    let node = &graph.nodes[i];
                    let inputs = node
                        .inputs
                        .iter()
                        .filter_map(|(port, conn)| {
                            let src = graph.nodes.iter().position(|n| n.id == conn.node_id)?;
                            Some(BoundInput {
                                port: port.clone(),
                                source: slot_of[src],
                                output_key: conn.output_key.clone(),
                            })
                        })
                        .collect();
                    Instruction {
                        node: node.clone(),
                        inputs,
                    }
                })
                .collect();
            events.insert(event.clone(), instructions);
        }
        Ok(Arc::new(ByteCode {
            events,
            variables: program.variables.clone(),
        }))
    }

    pub fn supports_event(&self, event: &str) -> bool {
        self.events.contains_key(event)
    }

    pub fn event_names(&self) -> impl Iterator<Item = &str> {
        self.events.keys().map(String::as_str)
    }

    pub fn instructions(&self, event: &str) -> Option<&[Instruction]> {
        self.events.get(event).map(Vec::as_slice)
    }

    pub fn variables(&self) -> &IndexMap<String, VariableSpec> {
        &self.variables
    }

    /// Element a unit addresses when it is known without running the program:
    /// the `item` param, or an `item` input fed by a key constant.
    fn static_item(
        instructions: &[Instruction],
        instruction: &Instruction,
        redirector: Option<&ElementKeyRedirector>,
    ) -> Option<ElementKey> {
        let key = instruction.node.params.item.clone().or_else(|| {
            let input = instruction.inputs.iter().find(|i| i.port == "item")?;
            let source = &instructions[input.source].node;
            match (&source.kind, &source.params.value) {
                (UnitKind::Constant, Some(VmValue::Key(key))) => Some(key.clone()),
                _ => None,
            }
        })?;
        Some(match redirector {
            Some(r) => r.resolve(&key),
            None => key,
        })
    }

    /// Written element -> elements read upstream of the write, across all events.
    pub fn dependency_map(&self, redirector: Option<&ElementKeyRedirector>) -> DependencyMap {
        let mut map = DependencyMap::new();
        for instructions in self.events.values() {
            for instruction in instructions {
                if !instruction.node.kind.writes_element() {
                    continue;
                }
                let Some(written) = Self::static_item(instructions, instruction, redirector) else {
                    continue;
                };
                let mut visited = HashSet::new();
                let mut stack: Vec<usize> = instruction.inputs.iter().map(|i| i.source).collect();
                let mut reads = Vec::new();
                while let Some(slot) = stack.pop() {
                    if !visited.insert(slot) {
                        continue;
                    }
                    let upstream = &instructions[slot];
                    if upstream.node.kind.reads_element() {
                        if let Some(read) = Self::static_item(instructions, upstream, redirector) {
                            if read != written && !reads.contains(&read) {
                                reads.push(read);
                            }
                        }
                    }
                    stack.extend(upstream.inputs.iter().map(|i| i.source));
                }
                let entry = map.entry(written).or_default();
                for read in reads {
                    if !entry.contains(&read) {
                        entry.push(read);
                    }
                }
            }
        }
        map
    }
}
