//! Units that change the hierarchy's topology.
//!
//! They only run during construction, and everything they add is marked
//! procedural so the next construction pass can clear it.

use armature_api_core::Transform;
use armature_hierarchy_core::{BoneType, HierarchyController};

use super::{out, warn, UnitInputs, UnitIssue, UnitResult};
use crate::context::ExecuteContext;
use crate::program::{Space, UnitKind};
use crate::value::VmValue;

fn adds_element(kind: UnitKind) -> bool {
    matches!(
        kind,
        UnitKind::AddBone | UnitKind::AddNull | UnitKind::AddControl | UnitKind::AddCurve
    )
}

fn controller<'c>(ctx: &'c mut ExecuteContext<'_>) -> Result<HierarchyController<'c>, UnitIssue> {
    ctx.hierarchy
        .controller()
        .map(HierarchyController::procedural)
        .ok_or_else(|| warn("hierarchy controller is not available"))
}

pub(super) fn evaluate(ctx: &mut ExecuteContext<'_>, kind: UnitKind, inputs: &UnitInputs<'_>) -> UnitResult {
    if !ctx.is_construction() {
        return Err(UnitIssue::Error(format!(
            "{kind:?} may only run during construction, not '{}'",
            ctx.event
        )));
    }
    if adds_element(kind) {
        let limit = ctx.settings.procedural_element_limit;
        if ctx.hierarchy.len() >= limit {
            log::error!(
                "procedural element limit of {limit} reached in '{}'; raise it in the hierarchy settings",
                ctx.event
            );
            return Err(UnitIssue::Error(format!(
                "procedural element limit of {limit} reached"
            )));
        }
    }

    let parent = inputs.key(ctx, "parent");
    let global = inputs.params().space == Space::Global;
    let transform = inputs
        .value()
        .and_then(VmValue::as_transform)
        .unwrap_or_else(Transform::identity);

    let key = match kind {
        UnitKind::AddBone => {
            let name = inputs.require_name()?;
            controller(ctx)?
                .add_bone(&name, parent.as_ref(), transform, global, BoneType::User)
                .map_err(warn)?
        }
        UnitKind::AddNull => {
            let name = inputs.require_name()?;
            controller(ctx)?
                .add_null(&name, parent.as_ref(), transform, global)
                .map_err(warn)?
        }
        UnitKind::AddControl => {
            let name = inputs.require_name()?;
            let mut settings = inputs.params().settings.clone().unwrap_or_default();
            settings.sanitize();
            let value = match inputs.value() {
                Some(given) => given.to_control_value(settings.control_type).ok_or_else(|| {
                    warn(format!(
                        "{} value cannot initialize a {:?} control",
                        given.kind_name(),
                        settings.control_type
                    ))
                })?,
                None => settings.identity_value(),
            };
            let offset = inputs
                .get("offset")
                .and_then(VmValue::as_transform)
                .unwrap_or_else(Transform::identity);
            controller(ctx)?
                .add_control(&name, parent.as_ref(), settings, value, offset, Transform::identity())
                .map_err(warn)?
        }
        UnitKind::AddCurve => {
            let name = inputs.require_name()?;
            let value = inputs.value().and_then(VmValue::as_float).unwrap_or(0.0);
            controller(ctx)?.add_curve(&name, value).map_err(warn)?
        }
        UnitKind::AddParent => {
            let item = inputs.require_key(ctx, "item")?;
            let parent = parent.ok_or_else(|| warn("no 'parent' element given"))?;
            let weight = inputs.weight();
            controller(ctx)?
                .add_parent(&item, &parent, weight, true)
                .map_err(warn)?;
            item
        }
        UnitKind::SetDefaultParent => {
            let item = inputs.require_key(ctx, "item")?;
            let parent = parent.ok_or_else(|| warn("no 'parent' element given"))?;
            controller(ctx)?
                .set_parent(&item, &parent, true)
                .map_err(warn)?;
            item
        }
        UnitKind::RemoveElement => {
            let item = inputs.require_key(ctx, "item")?;
            controller(ctx)?.remove_element(&item).map_err(warn)?;
            return Ok(out(VmValue::Bool(true)));
        }
        other => return Err(warn(format!("{other:?} is not a hierarchy edit"))),
    };
    Ok(out(VmValue::Key(key)))
}
