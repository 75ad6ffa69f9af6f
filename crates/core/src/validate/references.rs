//! Referential integrity for resource and output expressions, plus the
//! literal checks that keep rendered values reloadable.

use crate::error::{Origin, TargetKind, TemplateError};
use crate::expr::{Expr, RefTarget, Scalar};
use crate::template::{EntityKind, Template};
use indexmap::IndexMap;

pub(super) fn check_references(template: &Template, findings: &mut Vec<TemplateError>) {
    for (id, parameter) in template.parameters() {
        if let Some(default) = &parameter.default {
            let origin = Origin::new(EntityKind::Parameter, id, "Default");
            check_scalar(default, &origin, findings);
        }
        for value in &parameter.allowed_values {
            let origin = Origin::new(EntityKind::Parameter, id, "AllowedValues");
            check_scalar(value, &origin, findings);
        }
    }
    for (id, mapping) in template.mappings() {
        for (top, inner) in mapping.entries() {
            for (second, value) in inner {
                let origin = Origin::new(EntityKind::Mapping, id, format!("{}.{}", top, second));
                check_scalar(value, &origin, findings);
            }
        }
    }

    for (id, resource) in template.resources() {
        for (name, value) in &resource.properties {
            let origin = Origin::new(EntityKind::Resource, id, format!("Properties.{}", name));
            check_value(template, value, &origin, findings);
        }
        if let Some(metadata) = &resource.metadata {
            let origin = Origin::new(EntityKind::Resource, id, "Metadata");
            check_value(template, metadata, &origin, findings);
        }
        for target in &resource.depends_on {
            if !template.resources().contains_key(target) {
                findings.push(TemplateError::UnknownReference {
                    origin: Origin::new(EntityKind::Resource, id, "DependsOn"),
                    target_kind: TargetKind::Resource,
                    target: target.clone(),
                });
            }
        }
    }

    for (id, output) in template.outputs() {
        let origin = Origin::new(EntityKind::Output, id, "Value");
        check_value(template, &output.value, &origin, findings);
        if let Some(export) = &output.export {
            let origin = Origin::new(EntityKind::Output, id, "Export.Name");
            check_value(template, export, &origin, findings);
        }
    }
}

/// Value context: anything but boolean intrinsics, every target must exist.
fn check_value(
    template: &Template,
    expr: &Expr,
    origin: &Origin,
    findings: &mut Vec<TemplateError>,
) {
    match expr {
        Expr::Literal(scalar) => check_scalar(scalar, origin, findings),
        Expr::Reference(RefTarget::Pseudo(_)) => {}
        Expr::Reference(RefTarget::Logical(id)) => {
            if !template.is_referenceable(id) {
                findings.push(unknown(origin, TargetKind::ParameterOrResource, id));
            }
        }
        Expr::Attribute { resource, .. } => {
            if !template.resources().contains_key(resource) {
                findings.push(unknown(origin, TargetKind::Resource, resource));
            }
        }
        Expr::MapLookup {
            mapping,
            top_key,
            second_key,
        } => {
            check_value(template, top_key, origin, findings);
            check_value(template, second_key, origin, findings);
            check_lookup(template, mapping, top_key, second_key, origin, findings);
        }
        Expr::Join { parts: items, .. } | Expr::List(items) => {
            for item in items {
                check_value(template, item, origin, findings);
            }
        }
        Expr::Encode(inner) => check_value(template, inner, origin, findings),
        Expr::Object(entries) => {
            check_object_keys(entries, origin, findings);
            for value in entries.values() {
                check_value(template, value, origin, findings);
            }
        }
        Expr::Not(_) | Expr::Equals(..) | Expr::And(_) | Expr::Or(_) => {
            findings.push(TemplateError::InvalidExpressionShape {
                origin: Some(origin.clone()),
                intrinsic: expr.intrinsic_name(),
                message: "boolean intrinsics are only allowed inside condition definitions"
                    .to_owned(),
            });
        }
    }
}

/// The mapping must exist; literal keys must also exist in it.
pub(super) fn check_lookup(
    template: &Template,
    mapping: &str,
    top_key: &Expr,
    second_key: &Expr,
    origin: &Origin,
    findings: &mut Vec<TemplateError>,
) {
    let Some(table) = template.mappings().get(mapping) else {
        findings.push(unknown(origin, TargetKind::Mapping, mapping));
        return;
    };
    let Expr::Literal(Scalar::String(top)) = top_key else {
        return;
    };
    if !table.contains_top_key(top) {
        findings.push(unknown(
            origin,
            TargetKind::MappingKey,
            &format!("{}.{}", mapping, top),
        ));
        return;
    }
    if let Expr::Literal(Scalar::String(second)) = second_key {
        if table.get(top, second).is_none() {
            findings.push(unknown(
                origin,
                TargetKind::MappingKey,
                &format!("{}.{}.{}", mapping, top, second),
            ));
        }
    }
}

/// Non-finite floats have no JSON form.
pub(super) fn check_scalar(scalar: &Scalar, origin: &Origin, findings: &mut Vec<TemplateError>) {
    if let Scalar::Float(v) = scalar {
        if !v.is_finite() {
            findings.push(TemplateError::InvalidExpressionShape {
                origin: Some(origin.clone()),
                intrinsic: "literal",
                message: format!("{} has no JSON representation", v),
            });
        }
    }
}

/// A plain object with a single `Ref` or `Fn::*` key would render exactly
/// like an intrinsic and reload as one.
pub(super) fn check_object_keys(
    entries: &IndexMap<String, Expr>,
    origin: &Origin,
    findings: &mut Vec<TemplateError>,
) {
    if entries.len() != 1 {
        return;
    }
    if let Some(key) = entries.keys().next() {
        if key == "Ref" || key.starts_with("Fn::") {
            findings.push(TemplateError::InvalidExpressionShape {
                origin: Some(origin.clone()),
                intrinsic: "object",
                message: format!("single key '{}' is reserved for intrinsics", key),
            });
        }
    }
}

pub(super) fn unknown(origin: &Origin, target_kind: TargetKind, target: &str) -> TemplateError {
    TemplateError::UnknownReference {
        origin: origin.clone(),
        target_kind,
        target: target.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Pseudo;
    use crate::template::{Mapping, Output, Parameter, Resource};

    fn findings(t: &Template) -> Vec<TemplateError> {
        let mut out = Vec::new();
        check_references(t, &mut out);
        out
    }

    #[test]
    fn attribute_on_unregistered_resource() {
        let mut t = Template::new();
        t.add_resource(
            "Service",
            Resource::new("AWS::ECS::Service")
                .with_property("Role", Expr::attribute("Ghost", "Arn").unwrap()),
        )
        .unwrap();
        assert_eq!(
            findings(&t),
            vec![TemplateError::UnknownReference {
                origin: Origin::new(EntityKind::Resource, "Service", "Properties.Role"),
                target_kind: TargetKind::Resource,
                target: "Ghost".to_string(),
            }]
        );
    }

    #[test]
    fn attribute_on_parameter_is_unknown_resource() {
        let mut t = Template::new();
        t.add_parameter("KeyName", Parameter::string()).unwrap();
        t.add_output("Key", Output::new(Expr::attribute("KeyName", "Arn").unwrap()))
            .unwrap();
        let f = findings(&t);
        assert_eq!(f.len(), 1);
        assert!(matches!(
            f[0],
            TemplateError::UnknownReference {
                target_kind: TargetKind::Resource,
                ..
            }
        ));
    }

    #[test]
    fn forward_references_resolve() {
        let mut t = Template::new();
        t.add_resource(
            "Eip",
            Resource::new("AWS::EC2::EIP").with_property("InstanceId", Expr::reference("Nat")),
        )
        .unwrap();
        t.add_resource("Nat", Resource::new("AWS::EC2::Instance"))
            .unwrap();
        assert!(findings(&t).is_empty());
    }

    #[test]
    fn pseudo_references_need_no_registration() {
        let mut t = Template::new();
        t.add_output(
            "Where",
            Output::new(Expr::join("-", crate::exprs![Pseudo::StackName, Pseudo::Region])),
        )
        .unwrap();
        assert!(findings(&t).is_empty());
    }

    #[test]
    fn lookup_checks_mapping_and_literal_keys() {
        let mut t = Template::new();
        t.add_mapping(
            "RegionMap",
            Mapping::new().with_entry("eu-west-1", [("AMI", "ami-4e6ffe3d")]),
        )
        .unwrap();
        t.add_resource(
            "Launch",
            Resource::new("AWS::AutoScaling::LaunchConfiguration")
                .with_property(
                    "ImageId",
                    Expr::map_lookup("RegionMap", Pseudo::Region, "AMI").unwrap(),
                )
                .with_property(
                    "Arch",
                    Expr::map_lookup("RegionMap", "eu-west-1", "Arch").unwrap(),
                )
                .with_property(
                    "Other",
                    Expr::map_lookup("NoSuchMap", "a", "b").unwrap(),
                ),
        )
        .unwrap();

        let f = findings(&t);
        assert_eq!(f.len(), 2);
        assert!(matches!(
            &f[0],
            TemplateError::UnknownReference { target_kind: TargetKind::MappingKey, target, .. }
                if target == "RegionMap.eu-west-1.Arch"
        ));
        assert!(matches!(
            &f[1],
            TemplateError::UnknownReference { target_kind: TargetKind::Mapping, target, .. }
                if target == "NoSuchMap"
        ));
    }

    #[test]
    fn boolean_intrinsic_in_property_is_misplaced() {
        let mut t = Template::new();
        t.add_resource(
            "Topic",
            Resource::new("AWS::SNS::Topic").with_property("Flag", Expr::equals("a", "b")),
        )
        .unwrap();
        let f = findings(&t);
        assert!(matches!(
            f.as_slice(),
            [TemplateError::InvalidExpressionShape {
                intrinsic: "Fn::Equals",
                origin: Some(_),
                ..
            }]
        ));
    }

    #[test]
    fn depends_on_must_name_a_resource() {
        let mut t = Template::new();
        t.add_parameter("Size", Parameter::number()).unwrap();
        t.add_resource("Svc", Resource::new("AWS::ECS::Service").depends_on("Size"))
            .unwrap();
        let f = findings(&t);
        assert_eq!(f.len(), 1);
        assert!(f[0].to_string().contains("(DependsOn): unknown resource 'Size'"));
    }

    #[test]
    fn non_finite_floats_are_rejected_everywhere() {
        let mut t = Template::new();
        t.add_parameter("Ratio", Parameter::number().with_default(f64::INFINITY))
            .unwrap();
        t.add_mapping("Weights", Mapping::new().with_entry("prod", [("W", f64::NAN)]))
            .unwrap();
        t.add_resource(
            "R",
            Resource::new("Custom::R")
                .with_property("W", f64::NAN)
                .with_property("Ok", 0.5),
        )
        .unwrap();
        let f = findings(&t);
        assert_eq!(f.len(), 3);
        assert!(f.iter().all(|e| matches!(
            e,
            TemplateError::InvalidExpressionShape { intrinsic: "literal", origin: Some(_), .. }
        )));
        assert_eq!(
            f[2].to_string(),
            "Resource 'R' (Properties.W): invalid literal: NaN has no JSON representation"
        );
    }

    #[test]
    fn object_with_single_intrinsic_key_is_rejected() {
        let mut t = Template::new();
        t.add_resource(
            "R",
            Resource::new("Custom::R")
                .with_property("Fake", Expr::object([("Ref", "Vpc")]))
                .with_property("Also", Expr::object([("Fn::Sub", "x")]))
                .with_property("Fine", Expr::object([("Ref", "Vpc"), ("Note", "two keys")])),
        )
        .unwrap();
        let f = findings(&t);
        assert_eq!(f.len(), 2);
        assert!(matches!(
            &f[0],
            TemplateError::InvalidExpressionShape { intrinsic: "object", message, .. }
                if message == "single key 'Ref' is reserved for intrinsics"
        ));
    }
}
