//! Rig program VM.
//!
//! A [`RigProgram`] maps event names to dataflow graphs of rig units. It is
//! compiled once into [`ByteCode`], which instances share, and executed by a
//! [`RigVm`] against a [`RigHierarchy`](armature_hierarchy_core::RigHierarchy)
//! through an [`ExecuteContext`].

pub mod bytecode;
pub mod context;
pub mod error;
pub mod events;
pub mod memory;
pub mod program;
pub mod report;
mod topo;
mod units;
pub mod value;
pub mod vm;

pub use bytecode::{BoundInput, ByteCode, Instruction};
pub use context::ExecuteContext;
pub use error::VmError;
pub use memory::{Outputs, VmMemory, VmVariable};
pub use program::{GraphSpec, NodeId, InputConnection, NodeParams, NodeSpec, RigProgram, Space, UnitKind, VariableSpec};
pub use report::{NullSink, Report, ReportSink, Severity};
pub use topo::topo_order;
pub use value::VmValue;
pub use vm::{ExecuteResult, RigVm};
