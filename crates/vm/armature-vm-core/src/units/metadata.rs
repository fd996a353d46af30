use super::{out, warn, UnitInputs, UnitResult};
use crate::context::ExecuteContext;
use crate::value::VmValue;

pub(super) fn set(ctx: &mut ExecuteContext<'_>, inputs: &UnitInputs<'_>) -> UnitResult {
    let item = inputs.require_key(ctx, "item")?;
    let name = inputs.require_name()?;
    let given = inputs.value().ok_or_else(|| warn("no metadata value given"))?;
    let value = given
        .to_metadata()
        .ok_or_else(|| warn(format!("{} values cannot be stored as metadata", given.kind_name())))?;
    ctx.hierarchy
        .set_metadata(&item, &name, value)
        .map_err(warn)?;
    Ok(out(given.clone()))
}

/// Missing metadata yields the `value` param as a default.
pub(super) fn get(ctx: &mut ExecuteContext<'_>, inputs: &UnitInputs<'_>) -> UnitResult {
    let item = inputs.require_key(ctx, "item")?;
    let name = inputs.require_name()?;
    if !ctx.hierarchy.contains(&item) {
        return Err(warn(format!("{item} not found")));
    }
    let found = ctx
        .hierarchy
        .get_metadata(&item, &name)
        .map(VmValue::from_metadata);
    let mut outputs = out(
        found
            .clone()
            .or_else(|| inputs.params().value.clone())
            .unwrap_or_default(),
    );
    outputs.insert("found".to_string(), VmValue::Bool(found.is_some()));
    Ok(outputs)
}

pub(super) fn add_tag(ctx: &mut ExecuteContext<'_>, inputs: &UnitInputs<'_>) -> UnitResult {
    let item = inputs.require_key(ctx, "item")?;
    let tag = inputs.require_name()?;
    let added = ctx.hierarchy.add_tag(&item, &tag).map_err(warn)?;
    Ok(out(VmValue::Bool(added)))
}
