//! Guard well-formedness: guards name conditions, condition bodies are
//! boolean and built from values the engine can decide before provisioning.

use super::references::{check_lookup, check_object_keys, check_scalar, unknown};
use crate::compile::CompileOptions;
use crate::error::{Origin, TargetKind, TemplateError};
use crate::expr::{Expr, RefTarget};
use crate::template::{EntityKind, Template};

pub(super) fn check_guards(
    template: &Template,
    options: &CompileOptions,
    findings: &mut Vec<TemplateError>,
) {
    for (id, resource) in template.resources() {
        if let Some(guard) = &resource.condition {
            let origin = Origin::new(EntityKind::Resource, id, "Condition");
            check_guard_target(template, guard, &origin, findings);
        }
    }
    for (id, output) in template.outputs() {
        if let Some(guard) = &output.condition {
            let origin = Origin::new(EntityKind::Output, id, "Condition");
            check_guard_target(template, guard, &origin, findings);
        }
    }
    for (id, condition) in template.conditions() {
        let origin = Origin::new(EntityKind::Condition, id, "body");
        check_body(template, options, &condition.expr, &origin, findings);
    }
}

fn check_guard_target(
    template: &Template,
    guard: &str,
    origin: &Origin,
    findings: &mut Vec<TemplateError>,
) {
    match template.kind_of(guard) {
        Some(EntityKind::Condition) => {}
        Some(kind) => findings.push(TemplateError::GuardNotBoolean {
            origin: origin.clone(),
            message: format!("guard '{}' names a {}, not a condition", guard, kind),
        }),
        None => findings.push(unknown(origin, TargetKind::Condition, guard)),
    }
}

/// The top of a condition body must be a boolean intrinsic.
fn check_body(
    template: &Template,
    options: &CompileOptions,
    expr: &Expr,
    origin: &Origin,
    findings: &mut Vec<TemplateError>,
) {
    if expr.is_boolean() {
        check_boolean(template, options, expr, origin, findings);
    } else {
        findings.push(not_boolean(
            origin,
            format!(
                "expected Fn::Not, Fn::Equals, Fn::And or Fn::Or, found {}",
                expr.intrinsic_name()
            ),
        ));
    }
}

/// Operands of `Fn::Not`, `Fn::And` and `Fn::Or`: nested boolean
/// intrinsics, or literal and reference leaves the engine coerces.
fn check_boolean(
    template: &Template,
    options: &CompileOptions,
    expr: &Expr,
    origin: &Origin,
    findings: &mut Vec<TemplateError>,
) {
    match expr {
        Expr::Not(inner) => check_boolean(template, options, inner, origin, findings),
        Expr::And(operands) | Expr::Or(operands) => {
            for operand in operands {
                check_boolean(template, options, operand, origin, findings);
            }
        }
        Expr::Equals(left, right) => {
            check_operand(template, options, left, origin, findings);
            check_operand(template, options, right, origin, findings);
        }
        Expr::Literal(_) | Expr::Reference(_) | Expr::Attribute { .. } => {
            check_operand(template, options, expr, origin, findings)
        }
        other => findings.push(not_boolean(
            origin,
            format!(
                "{} cannot be used as a condition operand",
                other.intrinsic_name()
            ),
        )),
    }
}

/// Operand of `Fn::Equals`. Strict mode admits literals and references
/// only; relaxed mode also admits joins, lookups, encodings and
/// structural values built from those.
fn check_operand(
    template: &Template,
    options: &CompileOptions,
    expr: &Expr,
    origin: &Origin,
    findings: &mut Vec<TemplateError>,
) {
    match expr {
        Expr::Literal(scalar) => check_scalar(scalar, origin, findings),
        Expr::Reference(RefTarget::Pseudo(_)) => {}
        Expr::Reference(RefTarget::Logical(id)) => {
            if template.parameters().contains_key(id) {
                return;
            }
            if template.resources().contains_key(id) {
                findings.push(not_boolean(
                    origin,
                    format!("conditions cannot reference resource '{}'", id),
                ));
            } else {
                findings.push(unknown(origin, TargetKind::Parameter, id));
            }
        }
        Expr::Attribute { resource, .. } => findings.push(not_boolean(
            origin,
            format!("conditions cannot read attributes of resource '{}'", resource),
        )),
        Expr::Not(_) | Expr::Equals(..) | Expr::And(_) | Expr::Or(_) => findings.push(not_boolean(
            origin,
            format!("Fn::Equals operands must be values, found {}", expr.intrinsic_name()),
        )),
        _ if options.strict_conditions => findings.push(not_boolean(
            origin,
            format!(
                "{} is not allowed in a condition; only literals and references are",
                expr.intrinsic_name()
            ),
        )),
        Expr::MapLookup {
            mapping,
            top_key,
            second_key,
        } => {
            check_operand(template, options, top_key, origin, findings);
            check_operand(template, options, second_key, origin, findings);
            check_lookup(template, mapping, top_key, second_key, origin, findings);
        }
        Expr::Join { parts: items, .. } | Expr::List(items) => {
            for item in items {
                check_operand(template, options, item, origin, findings);
            }
        }
        Expr::Encode(inner) => check_operand(template, options, inner, origin, findings),
        Expr::Object(entries) => {
            check_object_keys(entries, origin, findings);
            for value in entries.values() {
                check_operand(template, options, value, origin, findings);
            }
        }
    }
}

fn not_boolean(origin: &Origin, message: String) -> TemplateError {
    TemplateError::GuardNotBoolean {
        origin: origin.clone(),
        message,
    }
}
