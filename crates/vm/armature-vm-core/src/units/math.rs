use armature_api_core::{Rotator, Transform, Vector3};

use super::{out, warn, UnitInputs, UnitResult};
use crate::context::ExecuteContext;
use crate::memory::Outputs;
use crate::program::UnitKind;
use crate::value::VmValue;

pub(super) fn time(ctx: &ExecuteContext<'_>) -> Outputs {
    let mut outputs = out(VmValue::Float(ctx.absolute_time));
    outputs.insert("delta".to_string(), VmValue::Float(ctx.delta_time));
    outputs
}

fn transform_input(inputs: &UnitInputs<'_>, port: &str) -> Result<Transform, super::UnitIssue> {
    inputs
        .get(port)
        .and_then(VmValue::as_transform)
        .ok_or_else(|| warn(format!("input '{port}' is not a transform")))
}

fn float_input(inputs: &UnitInputs<'_>, port: &str) -> Result<f32, super::UnitIssue> {
    inputs
        .float(port)
        .ok_or_else(|| warn(format!("input '{port}' is not a number")))
}

fn vector_input(inputs: &UnitInputs<'_>, port: &str) -> Result<Vector3<f32>, super::UnitIssue> {
    inputs
        .get(port)
        .and_then(VmValue::vector3)
        .ok_or_else(|| warn(format!("input '{port}' is not a vector")))
}

fn to_vm(v: Vector3<f32>) -> VmValue {
    VmValue::Vector([v.x, v.y, v.z])
}

pub(super) fn evaluate(kind: UnitKind, inputs: &UnitInputs<'_>) -> UnitResult {
    let value = match kind {
        UnitKind::MultiplyTransform => {
            let a = transform_input(inputs, "a")?;
            let b = transform_input(inputs, "b")?;
            VmValue::Transform(a.compose(&b).with_normalized_rotation())
        }
        UnitKind::InverseTransform => VmValue::Transform(transform_input(inputs, "value")?.inverse()),
        UnitKind::RelativeTransform => {
            let value = transform_input(inputs, "value")?;
            let parent = transform_input(inputs, "parent")?;
            VmValue::Transform(value.relative_to(&parent))
        }
        UnitKind::MakeTransform => {
            let translation = inputs.get("translation").and_then(VmValue::vector3).unwrap_or_else(Vector3::zeros);
            let rotation = inputs
                .get("rotation")
                .and_then(VmValue::as_rotator)
                .unwrap_or(Rotator::ZERO)
                .to_quaternion();
            let scale = inputs
                .get("scale")
                .and_then(VmValue::vector3)
                .unwrap_or_else(|| Vector3::new(1.0, 1.0, 1.0));
            VmValue::Transform(Transform::new(translation, rotation, scale))
        }
        UnitKind::FloatAdd => VmValue::Float(float_input(inputs, "a")? + float_input(inputs, "b")?),
        UnitKind::FloatMultiply => VmValue::Float(float_input(inputs, "a")? * float_input(inputs, "b")?),
        UnitKind::VectorAdd => to_vm(vector_input(inputs, "a")? + vector_input(inputs, "b")?),
        UnitKind::VectorScale => to_vm(vector_input(inputs, "value")? * float_input(inputs, "factor")?),
        other => return Err(warn(format!("{other:?} is not a math unit"))),
    };
    Ok(out(value))
}
