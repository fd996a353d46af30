//! Rig programs: one dataflow graph per event.

use armature_api_core::ElementKey;
use armature_hierarchy_core::ControlSettings;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::value::VmValue;

pub type NodeId = String;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    // Values & variables
    Constant,
    GetVariable,
    SetVariable,
    Time,

    // Hierarchy access
    GetTransform,
    SetTransform,
    GetControlValue,
    SetControlValue,
    GetCurveValue,
    SetCurveValue,
    GetParent,
    GetChildrenCount,
    SwitchParent,

    // Math
    MultiplyTransform,
    InverseTransform,
    RelativeTransform,
    MakeTransform,
    FloatAdd,
    FloatMultiply,
    VectorAdd,
    VectorScale,

    // Dynamic hierarchy (construction only)
    AddBone,
    AddNull,
    AddControl,
    AddCurve,
    AddParent,
    SetDefaultParent,
    RemoveElement,

    // Metadata
    SetMetadata,
    GetMetadata,
    AddTag,

    Fail,
}

impl UnitKind {
    /// Units that read an element of the hierarchy.
    pub fn reads_element(self) -> bool {
        matches!(
            self,
            UnitKind::GetTransform
                | UnitKind::GetControlValue
                | UnitKind::GetCurveValue
                | UnitKind::GetParent
                | UnitKind::GetChildrenCount
                | UnitKind::GetMetadata
        )
    }

    /// Units that write an element's transform, value or parenting.
    pub fn writes_element(self) -> bool {
        matches!(
            self,
            UnitKind::SetTransform
                | UnitKind::SetControlValue
                | UnitKind::SetCurveValue
                | UnitKind::SwitchParent
                | UnitKind::AddParent
                | UnitKind::SetDefaultParent
        )
    }

    pub fn is_dynamic_hierarchy(self) -> bool {
        matches!(
            self,
            UnitKind::AddBone
                | UnitKind::AddNull
                | UnitKind::AddControl
                | UnitKind::AddCurve
                | UnitKind::AddParent
                | UnitKind::SetDefaultParent
                | UnitKind::RemoveElement
        )
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Space {
    Local,
    #[default]
    Global,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct NodeParams {
    pub value: Option<VmValue>,
    pub item: Option<ElementKey>,
    pub parent: Option<ElementKey>,
    pub name: Option<String>,
    pub space: Space,
    pub initial: bool,
    /// Children follow the written element (defaults to true).
    pub propagate: Option<bool>,
    pub weight: Option<f32>,
    pub settings: Option<ControlSettings>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InputConnection {
    pub node_id: NodeId,
    #[serde(default = "default_output_key")]
    pub output_key: String,
}

fn default_output_key() -> String {
    "out".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeSpec {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub kind: UnitKind,
    #[serde(default)]
    pub params: NodeParams,
    #[serde(default)]
    pub inputs: IndexMap<String, InputConnection>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct GraphSpec {
    pub nodes: Vec<NodeSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VariableSpec {
    pub value: VmValue,
    /// Public variables can be driven from the host.
    #[serde(default)]
    pub public: bool,
}

/// Event name -> graph, plus the program's variables.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct RigProgram {
    #[serde(default)]
    pub events: IndexMap<String, GraphSpec>,
    #[serde(default)]
    pub variables: IndexMap<String, VariableSpec>,
}

impl RigProgram {
    pub fn from_json_str(json: &str) -> anyhow::Result<Self> {
        use anyhow::Context;
        serde_json::from_str(json).context("parsing rig program")
    }
}
