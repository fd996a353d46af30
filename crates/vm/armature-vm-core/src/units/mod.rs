//! Rig units: the instruction set of the VM.
//!
//! Each unit reads its input registers (falling back to its params), touches
//! the hierarchy through the execute context, and returns its outputs. A
//! unit that cannot run reports a warning and is skipped; execution goes on.

use std::fmt::Display;

use armature_api_core::ElementKey;
use hashbrown::HashMap;
use indexmap::IndexMap;

use crate::context::ExecuteContext;
use crate::memory::{Outputs, VmVariable};
use crate::program::{NodeParams, NodeSpec, UnitKind};
use crate::value::VmValue;

mod access;
mod dynamic;
mod math;
mod metadata;
mod variables;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum UnitIssue {
    /// Skip this unit.
    Warning(String),
    /// Skip this unit and flag an error.
    Error(String),
    /// Abort the event.
    Fail(String),
}

pub(crate) type UnitResult = Result<Outputs, UnitIssue>;

pub(crate) fn warn(message: impl Display) -> UnitIssue {
    UnitIssue::Warning(message.to_string())
}

pub(crate) fn out(value: VmValue) -> Outputs {
    let mut map = HashMap::with_capacity(1);
    map.insert("out".to_string(), value);
    map
}

/// Resolved inputs of one instruction.
pub(crate) struct UnitInputs<'a> {
    params: &'a NodeParams,
    values: HashMap<&'a str, VmValue>,
}

impl<'a> UnitInputs<'a> {
    pub(crate) fn new(params: &'a NodeParams, values: HashMap<&'a str, VmValue>) -> Self {
        Self { params, values }
    }

    pub(crate) fn params(&self) -> &NodeParams {
        self.params
    }

    pub(crate) fn get(&self, port: &str) -> Option<&VmValue> {
        self.values.get(port).filter(|v| !matches!(v, VmValue::None))
    }

    /// The `value` input, or the `value` param.
    pub(crate) fn value(&self) -> Option<&VmValue> {
        self.get("value").or(self.params.value.as_ref())
    }

    pub(crate) fn float(&self, port: &str) -> Option<f32> {
        self.get(port).and_then(VmValue::as_float)
    }

    /// Keyed port (`item` or `parent`) from the input, else the param, through
    /// the redirector.
    pub(crate) fn key(&self, ctx: &ExecuteContext<'_>, port: &str) -> Option<ElementKey> {
        let key = match self.get(port) {
            Some(VmValue::Key(key)) => Some(key.clone()),
            _ => match port {
                "item" => self.params.item.clone(),
                "parent" => self.params.parent.clone(),
                _ => None,
            },
        }?;
        Some(ctx.resolve(&key))
    }

    pub(crate) fn require_key(&self, ctx: &ExecuteContext<'_>, port: &str) -> Result<ElementKey, UnitIssue> {
        self.key(ctx, port)
            .ok_or_else(|| UnitIssue::Warning(format!("no '{port}' element given")))
    }

    pub(crate) fn name(&self) -> Option<String> {
        match self.get("name") {
            Some(VmValue::Name(name)) => Some(name.clone()),
            _ => self.params.name.clone(),
        }
    }

    pub(crate) fn require_name(&self) -> Result<String, UnitIssue> {
        self.name()
            .ok_or_else(|| UnitIssue::Warning("no name given".to_string()))
    }

    /// `weight` input or param; full weight when absent.
    pub(crate) fn weight(&self) -> f32 {
        self.float("weight")
            .or(self.params.weight)
            .unwrap_or(1.0)
    }

    pub(crate) fn propagate(&self) -> bool {
        self.get("propagate")
            .and_then(VmValue::as_bool)
            .or(self.params.propagate)
            .unwrap_or(true)
    }

    pub(crate) fn initial(&self) -> bool {
        self.get("initial")
            .and_then(VmValue::as_bool)
            .unwrap_or(self.params.initial)
    }
}

pub(crate) fn execute_unit(
    ctx: &mut ExecuteContext<'_>,
    variables: &mut IndexMap<String, VmVariable>,
    node: &NodeSpec,
    inputs: &UnitInputs<'_>,
) -> UnitResult {
    match node.kind {
        UnitKind::Constant => Ok(out(inputs.params().value.clone().unwrap_or_default())),
        UnitKind::GetVariable => variables::get(variables, inputs),
        UnitKind::SetVariable => variables::set(variables, inputs),
        UnitKind::Time => Ok(math::time(ctx)),

        UnitKind::GetTransform => access::get_transform(ctx, inputs),
        UnitKind::SetTransform => access::set_transform(ctx, inputs),
        UnitKind::GetControlValue => access::get_control_value(ctx, inputs),
        UnitKind::SetControlValue => access::set_control_value(ctx, inputs),
        UnitKind::GetCurveValue => access::get_curve_value(ctx, inputs),
        UnitKind::SetCurveValue => access::set_curve_value(ctx, inputs),
        UnitKind::GetParent => access::get_parent(ctx, inputs),
        UnitKind::GetChildrenCount => access::get_children_count(ctx, inputs),
        UnitKind::SwitchParent => access::switch_parent(ctx, inputs),

        UnitKind::MultiplyTransform
        | UnitKind::InverseTransform
        | UnitKind::RelativeTransform
        | UnitKind::MakeTransform
        | UnitKind::FloatAdd
        | UnitKind::FloatMultiply
        | UnitKind::VectorAdd
        | UnitKind::VectorScale => math::evaluate(node.kind, inputs),

        UnitKind::AddBone
        | UnitKind::AddNull
        | UnitKind::AddControl
        | UnitKind::AddCurve
        | UnitKind::AddParent
        | UnitKind::SetDefaultParent
        | UnitKind::RemoveElement => dynamic::evaluate(ctx, node.kind, inputs),

        UnitKind::SetMetadata => metadata::set(ctx, inputs),
        UnitKind::GetMetadata => metadata::get(ctx, inputs),
        UnitKind::AddTag => metadata::add_tag(ctx, inputs),

        UnitKind::Fail => Err(UnitIssue::Fail(
            inputs
                .params()
                .message
                .clone()
                .unwrap_or_else(|| "execution failed".to_string()),
        )),
    }
}
