use armature_api_core::blend::lerp_transform;
use armature_hierarchy_core::{ControlValueType, TransformType};

use super::{out, warn, UnitInputs, UnitIssue, UnitResult};
use crate::context::ExecuteContext;
use crate::program::Space;
use crate::value::VmValue;

fn transform_type(inputs: &UnitInputs<'_>) -> TransformType {
    TransformType::new(inputs.initial(), inputs.params().space == Space::Local)
}

fn value_type(inputs: &UnitInputs<'_>) -> ControlValueType {
    if inputs.initial() {
        ControlValueType::Initial
    } else {
        ControlValueType::Current
    }
}

pub(super) fn get_transform(ctx: &mut ExecuteContext<'_>, inputs: &UnitInputs<'_>) -> UnitResult {
    let item = inputs.require_key(ctx, "item")?;
    let transform = ctx
        .hierarchy
        .transform(&item, transform_type(inputs))
        .map_err(warn)?;
    Ok(out(VmValue::Transform(transform)))
}

/// Write a transform, blended with the current one by `weight`.
pub(super) fn set_transform(ctx: &mut ExecuteContext<'_>, inputs: &UnitInputs<'_>) -> UnitResult {
    let item = inputs.require_key(ctx, "item")?;
    let value = inputs
        .value()
        .and_then(VmValue::as_transform)
        .ok_or_else(|| warn("no transform given"))?;
    let weight = inputs.weight().clamp(0.0, 1.0);
    let tt = transform_type(inputs);
    if weight <= f32::EPSILON {
        return Ok(out(VmValue::Transform(value)));
    }
    let target = if weight < 1.0 {
        let current = ctx.hierarchy.transform(&item, tt).map_err(warn)?;
        lerp_transform(&current, &value, weight)
    } else {
        value
    };
    ctx.hierarchy
        .set_transform(&item, target, tt, inputs.propagate())
        .map_err(warn)?;
    Ok(out(VmValue::Transform(target)))
}

pub(super) fn get_control_value(ctx: &mut ExecuteContext<'_>, inputs: &UnitInputs<'_>) -> UnitResult {
    let item = inputs.require_key(ctx, "item")?;
    let value = ctx
        .hierarchy
        .control_value(&item, value_type(inputs))
        .map_err(warn)?;
    Ok(out(VmValue::Control(value)))
}

pub(super) fn set_control_value(ctx: &mut ExecuteContext<'_>, inputs: &UnitInputs<'_>) -> UnitResult {
    let item = inputs.require_key(ctx, "item")?;
    let control_type = ctx
        .hierarchy
        .control_settings(&item)
        .map(|s| s.control_type)
        .ok_or_else(|| warn(format!("{item} is not a control")))?;
    let given = inputs.value().ok_or_else(|| warn("no value given"))?;
    let value = given.to_control_value(control_type).ok_or_else(|| {
        UnitIssue::Warning(format!(
            "{} value cannot drive {control_type:?} control {item}",
            given.kind_name()
        ))
    })?;
    ctx.hierarchy
        .set_control_value(&item, value, value_type(inputs), inputs.propagate())
        .map_err(warn)?;
    Ok(out(VmValue::Control(value)))
}

pub(super) fn get_curve_value(ctx: &mut ExecuteContext<'_>, inputs: &UnitInputs<'_>) -> UnitResult {
    let item = inputs.require_key(ctx, "item")?;
    let value = ctx
        .hierarchy
        .curve_value(&item)
        .ok_or_else(|| warn(format!("{item} is not a curve")))?;
    Ok(out(VmValue::Float(value)))
}

pub(super) fn set_curve_value(ctx: &mut ExecuteContext<'_>, inputs: &UnitInputs<'_>) -> UnitResult {
    let item = inputs.require_key(ctx, "item")?;
    let value = inputs
        .value()
        .and_then(VmValue::as_float)
        .ok_or_else(|| warn("no curve value given"))?;
    ctx.hierarchy.set_curve_value(&item, value).map_err(warn)?;
    Ok(out(VmValue::Float(value)))
}

/// First parent, or world space for roots.
pub(super) fn get_parent(ctx: &mut ExecuteContext<'_>, inputs: &UnitInputs<'_>) -> UnitResult {
    let item = inputs.require_key(ctx, "item")?;
    let parent = ctx
        .hierarchy
        .default_parent(&item)
        .ok_or_else(|| warn(format!("{item} not found")))?;
    Ok(out(VmValue::Key(parent)))
}

pub(super) fn get_children_count(ctx: &mut ExecuteContext<'_>, inputs: &UnitInputs<'_>) -> UnitResult {
    let item = inputs.require_key(ctx, "item")?;
    let element = ctx
        .hierarchy
        .find(&item)
        .ok_or_else(|| warn(format!("{item} not found")))?;
    Ok(out(VmValue::Int(element.children().len() as i32)))
}

pub(super) fn switch_parent(ctx: &mut ExecuteContext<'_>, inputs: &UnitInputs<'_>) -> UnitResult {
    let item = inputs.require_key(ctx, "item")?;
    let parent = inputs.require_key(ctx, "parent")?;
    let affect_children = inputs.propagate();
    ctx.hierarchy
        .switch_to_parent(&item, &parent, inputs.initial(), affect_children, None)
        .map_err(warn)?;
    Ok(out(VmValue::Key(parent)))
}
