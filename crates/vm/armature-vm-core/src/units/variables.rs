use indexmap::IndexMap;

use super::{out, UnitInputs, UnitIssue, UnitResult};
use crate::memory::VmVariable;

pub(super) fn get(variables: &IndexMap<String, VmVariable>, inputs: &UnitInputs<'_>) -> UnitResult {
    let name = inputs.require_name()?;
    let variable = variables
        .get(&name)
        .ok_or_else(|| UnitIssue::Warning(format!("unknown variable '{name}'")))?;
    Ok(out(variable.value.clone()))
}

/// Variables keep their declared kind.
pub(super) fn set(variables: &mut IndexMap<String, VmVariable>, inputs: &UnitInputs<'_>) -> UnitResult {
    let name = inputs.require_name()?;
    let value = inputs
        .value()
        .cloned()
        .ok_or_else(|| UnitIssue::Warning(format!("no value for variable '{name}'")))?;
    let variable = variables
        .get_mut(&name)
        .ok_or_else(|| UnitIssue::Warning(format!("unknown variable '{name}'")))?;
    if !variable.value.same_kind(&value) {
        return Err(UnitIssue::Warning(format!(
            "variable '{name}' holds {} values, got {}",
            variable.value.kind_name(),
            value.kind_name()
        )));
    }
    variable.value = value.clone();
    Ok(out(value))
}
