//! Validation pass: referential integrity, cycle freedom and guard
//! well-formedness over a frozen template.
//!
//! Every check appends to a shared findings list; nothing fails fast, so a
//! single run reports every problem at once. Logical-ID uniqueness is
//! enforced earlier, at registration.

mod cycles;
mod guards;
mod references;

use crate::compile::CompileOptions;
use crate::error::TemplateError;
use crate::graph::DependencyGraph;
use crate::template::Template;

pub(crate) fn validate(template: &Template, options: &CompileOptions) -> Vec<TemplateError> {
    let mut findings = Vec::new();

    references::check_references(template, &mut findings);

    let graph = DependencyGraph::build(template);
    cycles::check_cycles(&graph, &mut findings);

    guards::check_guards(template, options, &mut findings);

    tracing::debug!(findings = findings.len(), "validation finished");
    findings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Origin, TargetKind};
    use crate::expr::{Expr, Pseudo};
    use crate::template::{EntityKind, Mapping, Output, Parameter, Resource};

    fn run(t: &Template) -> Vec<TemplateError> {
        validate(t, &CompileOptions::default())
    }

    #[test]
    fn clean_template_has_no_findings() {
        let mut t = Template::new();
        let rev = t.add_parameter("Revision", Parameter::string()).unwrap();
        t.add_condition("Deploy", Expr::not(Expr::equals(&rev, "")))
            .unwrap();
        let repo = t
            .add_resource("Repo", Resource::new("AWS::ECR::Repository"))
            .unwrap();
        t.add_output(
            "RepoUrl",
            Output::new(Expr::join(
                "",
                crate::exprs![Pseudo::AccountId, ".dkr.ecr.", Pseudo::Region, "/", &repo],
            ))
            .with_condition("Deploy"),
        )
        .unwrap();
        assert!(run(&t).is_empty());
    }

    #[test]
    fn findings_accumulate_across_checks() {
        let mut t = Template::new();
        t.add_resource(
            "A",
            Resource::new("Custom::A")
                .with_property("Peer", Expr::reference("B"))
                .with_property("Missing", Expr::attribute("Ghost", "Arn").unwrap()),
        )
        .unwrap();
        t.add_resource("B", Resource::new("Custom::B").depends_on("A"))
            .unwrap();
        t.add_output("Out", Output::new("x").with_condition("Nope"))
            .unwrap();

        let findings = run(&t);
        assert_eq!(findings.len(), 3);
        assert!(matches!(findings[0], TemplateError::UnknownReference { .. }));
        assert!(matches!(findings[1], TemplateError::DependencyCycle { .. }));
        assert_eq!(
            findings[2],
            TemplateError::UnknownReference {
                origin: Origin::new(EntityKind::Output, "Out", "Condition"),
                target_kind: TargetKind::Condition,
                target: "Nope".to_string(),
            }
        );
    }

    #[test]
    fn mapping_and_parameter_namespaces_are_kept_apart() {
        let mut t = Template::new();
        t.add_mapping("RegionMap", Mapping::new().with_entry("eu-west-1", [("AMI", "ami-1")]))
            .unwrap();
        t.add_resource(
            "Host",
            Resource::new("AWS::EC2::Instance").with_property("ImageId", Expr::reference("RegionMap")),
        )
        .unwrap();
        let findings = run(&t);
        assert_eq!(findings.len(), 1);
        assert!(matches!(
            &findings[0],
            TemplateError::UnknownReference {
                target_kind: TargetKind::ParameterOrResource,
                target,
                ..
            } if target == "RegionMap"
        ));
    }
}
