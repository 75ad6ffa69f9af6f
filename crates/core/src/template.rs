//! Entity registry: the template being built up by registration calls.
//!
//! A [`Template`] is an ordinary owned value. It is mutated through the
//! `add_*` methods during the build phase and frozen the first time it is
//! validated or compiled; from then on every registration fails with
//! [`TemplateError::Frozen`].

use crate::error::TemplateError;
use crate::expr::{Expr, Scalar};
use indexmap::IndexMap;
use serde::Serialize;
use std::fmt;

/// Value written to `AWSTemplateFormatVersion` by [`Template::set_format_version`].
pub const FORMAT_VERSION: &str = "2010-09-09";

pub const MAX_PARAMETERS: usize = 200;
pub const MAX_MAPPINGS: usize = 200;
pub const MAX_RESOURCES: usize = 500;
pub const MAX_OUTPUTS: usize = 200;

/// The five entity collections of a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EntityKind {
    Parameter,
    Mapping,
    Condition,
    Resource,
    Output,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EntityKind::Parameter => "Parameter",
            EntityKind::Mapping => "Mapping",
            EntityKind::Condition => "Condition",
            EntityKind::Resource => "Resource",
            EntityKind::Output => "Output",
        };
        f.write_str(s)
    }
}

// ──────────────────────────────────────────────
// Handles
// ──────────────────────────────────────────────

/// Returned by every registration call. Converts into a `Ref` expression and
/// can be passed wherever a logical ID is expected, so callers never restate
/// the ID string when cross-referencing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Handle {
    kind: EntityKind,
    id: String,
}

impl Handle {
    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// `Ref` to this entity.
    pub fn reference(&self) -> Expr {
        Expr::reference(&self.id)
    }

    /// `Fn::GetAtt` on this entity.
    pub fn attr(&self, attribute: impl Into<String>) -> Result<Expr, TemplateError> {
        Expr::attribute(&self.id, attribute)
    }
}

impl AsRef<str> for Handle {
    fn as_ref(&self) -> &str {
        &self.id
    }
}

impl From<&Handle> for Expr {
    fn from(handle: &Handle) -> Self {
        handle.reference()
    }
}

impl From<Handle> for Expr {
    fn from(handle: Handle) -> Self {
        handle.reference()
    }
}

// ──────────────────────────────────────────────
// Entities
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub param_type: String,
    pub description: Option<String>,
    pub default: Option<Scalar>,
    pub allowed_values: Vec<Scalar>,
    pub no_echo: bool,
}

impl Parameter {
    pub fn new(param_type: impl Into<String>) -> Self {
        Parameter {
            param_type: param_type.into(),
            description: None,
            default: None,
            allowed_values: Vec::new(),
            no_echo: false,
        }
    }

    pub fn string() -> Self {
        Parameter::new("String")
    }

    pub fn number() -> Self {
        Parameter::new("Number")
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_default(mut self, default: impl Into<Scalar>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_allowed_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Scalar>,
    {
        self.allowed_values = values.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_no_echo(mut self) -> Self {
        self.no_echo = true;
        self
    }
}

/// Two-level lookup table: top key -> second key -> literal.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mapping {
    entries: IndexMap<String, IndexMap<String, Scalar>>,
}

impl Mapping {
    pub fn new() -> Self {
        Mapping::default()
    }

    /// Add (or extend) the table under `top_key`.
    pub fn with_entry<I, K, V>(mut self, top_key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Scalar>,
    {
        let inner = self.entries.entry(top_key.into()).or_default();
        for (k, v) in values {
            inner.insert(k.into(), v.into());
        }
        self
    }

    pub fn get(&self, top_key: &str, second_key: &str) -> Option<&Scalar> {
        self.entries.get(top_key)?.get(second_key)
    }

    pub fn contains_top_key(&self, top_key: &str) -> bool {
        self.entries.contains_key(top_key)
    }

    pub fn entries(&self) -> &IndexMap<String, IndexMap<String, Scalar>> {
        &self.entries
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub expr: Expr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionPolicy {
    Delete,
    Retain,
    Snapshot,
}

impl DeletionPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            DeletionPolicy::Delete => "Delete",
            DeletionPolicy::Retain => "Retain",
            DeletionPolicy::Snapshot => "Snapshot",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Delete" => Some(DeletionPolicy::Delete),
            "Retain" => Some(DeletionPolicy::Retain),
            "Snapshot" => Some(DeletionPolicy::Snapshot),
            _ => None,
        }
    }
}

/// A provisioned resource. The type is opaque; properties are not checked
/// against any per-type schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub resource_type: String,
    pub properties: IndexMap<String, Expr>,
    pub depends_on: Vec<String>,
    pub condition: Option<String>,
    pub metadata: Option<Expr>,
    pub deletion_policy: Option<DeletionPolicy>,
}

impl Resource {
    pub fn new(resource_type: impl Into<String>) -> Self {
        Resource {
            resource_type: resource_type.into(),
            properties: IndexMap::new(),
            depends_on: Vec::new(),
            condition: None,
            metadata: None,
            deletion_policy: None,
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<Expr>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    /// Explicit ordering hint. Repeated targets are kept once.
    pub fn depends_on(mut self, target: impl AsRef<str>) -> Self {
        let target = target.as_ref();
        if !self.depends_on.iter().any(|d| d == target) {
            self.depends_on.push(target.to_owned());
        }
        self
    }

    pub fn with_condition(mut self, condition: impl AsRef<str>) -> Self {
        self.condition = Some(condition.as_ref().to_owned());
        self
    }

    pub fn with_metadata(mut self, metadata: impl Into<Expr>) -> Self {
        self.metadata = Some(metadata.into());
        self
    }

    pub fn with_deletion_policy(mut self, policy: DeletionPolicy) -> Self {
        self.deletion_policy = Some(policy);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Output {
    pub value: Expr,
    pub description: Option<String>,
    pub export: Option<Expr>,
    pub condition: Option<String>,
}

impl Output {
    pub fn new(value: impl Into<Expr>) -> Self {
        Output {
            value: value.into(),
            description: None,
            export: None,
            condition: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Export name, rendered as `{"Name": ...}`.
    pub fn with_export(mut self, name: impl Into<Expr>) -> Self {
        self.export = Some(name.into());
        self
    }

    pub fn with_condition(mut self, condition: impl AsRef<str>) -> Self {
        self.condition = Some(condition.as_ref().to_owned());
        self
    }
}

// ──────────────────────────────────────────────
// Template
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct Template {
    format_version: Option<String>,
    description: Option<String>,
    parameters: IndexMap<String, Parameter>,
    mappings: IndexMap<String, Mapping>,
    conditions: IndexMap<String, Condition>,
    resources: IndexMap<String, Resource>,
    outputs: IndexMap<String, Output>,
    frozen: bool,
}

impl Template {
    pub fn new() -> Self {
        Template::default()
    }

    /// Emit `AWSTemplateFormatVersion` with [`FORMAT_VERSION`].
    pub fn set_format_version(&mut self) -> Result<(), TemplateError> {
        self.check_frozen("set the format version")?;
        self.format_version = Some(FORMAT_VERSION.to_owned());
        Ok(())
    }

    pub fn set_description(&mut self, description: impl Into<String>) -> Result<(), TemplateError> {
        self.check_frozen("set the description")?;
        self.description = Some(description.into());
        Ok(())
    }

    pub fn add_parameter(
        &mut self,
        id: impl Into<String>,
        parameter: Parameter,
    ) -> Result<Handle, TemplateError> {
        let id = id.into();
        self.admit(EntityKind::Parameter, &id)?;
        self.parameters.insert(id.clone(), parameter);
        Ok(self.registered(EntityKind::Parameter, id))
    }

    pub fn add_mapping(
        &mut self,
        id: impl Into<String>,
        mapping: Mapping,
    ) -> Result<Handle, TemplateError> {
        let id = id.into();
        self.admit(EntityKind::Mapping, &id)?;
        self.mappings.insert(id.clone(), mapping);
        Ok(self.registered(EntityKind::Mapping, id))
    }

    pub fn add_condition(
        &mut self,
        id: impl Into<String>,
        expr: Expr,
    ) -> Result<Handle, TemplateError> {
        let id = id.into();
        self.admit(EntityKind::Condition, &id)?;
        self.conditions.insert(id.clone(), Condition { expr });
        Ok(self.registered(EntityKind::Condition, id))
    }

    pub fn add_resource(
        &mut self,
        id: impl Into<String>,
        resource: Resource,
    ) -> Result<Handle, TemplateError> {
        let id = id.into();
        self.admit(EntityKind::Resource, &id)?;
        self.resources.insert(id.clone(), resource);
        Ok(self.registered(EntityKind::Resource, id))
    }

    pub fn add_output(
        &mut self,
        id: impl Into<String>,
        output: Output,
    ) -> Result<Handle, TemplateError> {
        let id = id.into();
        self.admit(EntityKind::Output, &id)?;
        self.outputs.insert(id.clone(), output);
        Ok(self.registered(EntityKind::Output, id))
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn format_version(&self) -> Option<&str> {
        self.format_version.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn parameters(&self) -> &IndexMap<String, Parameter> {
        &self.parameters
    }

    pub fn mappings(&self) -> &IndexMap<String, Mapping> {
        &self.mappings
    }

    pub fn conditions(&self) -> &IndexMap<String, Condition> {
        &self.conditions
    }

    pub fn resources(&self) -> &IndexMap<String, Resource> {
        &self.resources
    }

    pub fn outputs(&self) -> &IndexMap<String, Output> {
        &self.outputs
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// True when `id` resolves in the shared parameter/resource namespace.
    pub fn is_referenceable(&self, id: &str) -> bool {
        self.parameters.contains_key(id) || self.resources.contains_key(id)
    }

    /// Which collection `id` is registered in, conditions first. Namespaces
    /// other than parameters/resources may legitimately share an ID.
    pub fn kind_of(&self, id: &str) -> Option<EntityKind> {
        if self.conditions.contains_key(id) {
            Some(EntityKind::Condition)
        } else if self.parameters.contains_key(id) {
            Some(EntityKind::Parameter)
        } else if self.resources.contains_key(id) {
            Some(EntityKind::Resource)
        } else if self.mappings.contains_key(id) {
            Some(EntityKind::Mapping)
        } else if self.outputs.contains_key(id) {
            Some(EntityKind::Output)
        } else {
            None
        }
    }

    pub(crate) fn freeze(&mut self) {
        if !self.frozen {
            tracing::trace!("freezing template");
        }
        self.frozen = true;
    }

    // ── Registration checks ──────────────────────────────────────────

    fn check_frozen(&self, action: &str) -> Result<(), TemplateError> {
        if self.frozen {
            return Err(TemplateError::Frozen {
                action: action.to_owned(),
            });
        }
        Ok(())
    }

    fn admit(&self, kind: EntityKind, id: &str) -> Result<(), TemplateError> {
        self.check_frozen(&format!("register {} '{}'", kind, id))?;
        validate_logical_id(id)?;

        let existing = match kind {
            EntityKind::Parameter | EntityKind::Resource => {
                if self.parameters.contains_key(id) {
                    Some(EntityKind::Parameter)
                } else if self.resources.contains_key(id) {
                    Some(EntityKind::Resource)
                } else {
                    None
                }
            }
            EntityKind::Mapping => self.mappings.contains_key(id).then_some(kind),
            EntityKind::Condition => self.conditions.contains_key(id).then_some(kind),
            EntityKind::Output => self.outputs.contains_key(id).then_some(kind),
        };
        if let Some(existing) = existing {
            return Err(TemplateError::DuplicateLogicalId {
                id: id.to_owned(),
                existing,
            });
        }

        let (count, limit) = match kind {
            EntityKind::Parameter => (self.parameters.len(), MAX_PARAMETERS),
            EntityKind::Mapping => (self.mappings.len(), MAX_MAPPINGS),
            EntityKind::Resource => (self.resources.len(), MAX_RESOURCES),
            EntityKind::Output => (self.outputs.len(), MAX_OUTPUTS),
            EntityKind::Condition => return Ok(()),
        };
        if count >= limit {
            return Err(TemplateError::LimitExceeded {
                kind,
                id: id.to_owned(),
                limit,
            });
        }
        Ok(())
    }

    fn registered(&self, kind: EntityKind, id: String) -> Handle {
        tracing::trace!(%kind, %id, "registered");
        Handle { kind, id }
    }
}

fn validate_logical_id(id: &str) -> Result<(), TemplateError> {
    if id.is_empty() {
        return Err(TemplateError::InvalidLogicalId {
            id: id.to_owned(),
            reason: "logical id must not be empty".to_owned(),
        });
    }
    if let Some(c) = id.chars().find(|c| !c.is_ascii_alphanumeric()) {
        return Err(TemplateError::InvalidLogicalId {
            id: id.to_owned(),
            reason: format!("character '{}' is not alphanumeric", c),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_resource_id_is_rejected() {
        let mut t = Template::new();
        t.add_resource("Vpc", Resource::new("AWS::EC2::VPC")).unwrap();
        let err = t
            .add_resource("Vpc", Resource::new("AWS::EC2::VPC"))
            .unwrap_err();
        assert_eq!(
            err,
            TemplateError::DuplicateLogicalId {
                id: "Vpc".to_string(),
                existing: EntityKind::Resource,
            }
        );
    }

    #[test]
    fn parameters_and_resources_share_a_namespace() {
        let mut t = Template::new();
        t.add_parameter("Env", Parameter::string()).unwrap();
        let err = t
            .add_resource("Env", Resource::new("AWS::SNS::Topic"))
            .unwrap_err();
        assert!(matches!(
            err,
            TemplateError::DuplicateLogicalId {
                existing: EntityKind::Parameter,
                ..
            }
        ));
    }

    #[test]
    fn other_namespaces_are_independent() {
        let mut t = Template::new();
        t.add_resource("Deploy", Resource::new("AWS::SNS::Topic"))
            .unwrap();
        t.add_condition("Deploy", Expr::equals("a", "a")).unwrap();
        t.add_mapping("Deploy", Mapping::new()).unwrap();
        t.add_output("Deploy", Output::new("x")).unwrap();
        assert_eq!(t.kind_of("Deploy"), Some(EntityKind::Condition));
    }

    #[test]
    fn logical_ids_must_be_alphanumeric() {
        let mut t = Template::new();
        assert!(matches!(
            t.add_parameter("", Parameter::string()),
            Err(TemplateError::InvalidLogicalId { .. })
        ));
        let err = t
            .add_resource("my-bucket", Resource::new("AWS::S3::Bucket"))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid logical id 'my-bucket': character '-' is not alphanumeric"
        );
    }

    #[test]
    fn handle_converts_to_reference() {
        let mut t = Template::new();
        let vpc = t
            .add_resource("Vpc", Resource::new("AWS::EC2::VPC"))
            .unwrap();
        assert_eq!(vpc.kind(), EntityKind::Resource);
        assert_eq!(Expr::from(&vpc), Expr::reference("Vpc"));
        assert_eq!(
            vpc.attr("CidrBlock").unwrap(),
            Expr::attribute("Vpc", "CidrBlock").unwrap()
        );
    }

    #[test]
    fn resource_limit_is_enforced() {
        let mut t = Template::new();
        for i in 0..MAX_RESOURCES {
            t.add_resource(format!("Topic{}", i), Resource::new("AWS::SNS::Topic"))
                .unwrap();
        }
        let err = t
            .add_resource("OneTooMany", Resource::new("AWS::SNS::Topic"))
            .unwrap_err();
        assert!(matches!(
            err,
            TemplateError::LimitExceeded {
                limit: MAX_RESOURCES,
                ..
            }
        ));
    }

    #[test]
    fn depends_on_collapses_repeats() {
        let r = Resource::new("AWS::ECS::Service")
            .depends_on("Asg")
            .depends_on("Asg")
            .depends_on("Cluster");
        assert_eq!(r.depends_on, vec!["Asg", "Cluster"]);
    }

    #[test]
    fn mapping_lookup_helpers() {
        let m = Mapping::new()
            .with_entry("eu-west-1", [("AMI", "ami-4e6ffe3d")])
            .with_entry("eu-west-1", [("Arch", "x86_64")]);
        assert_eq!(m.get("eu-west-1", "AMI"), Some(&Scalar::from("ami-4e6ffe3d")));
        assert_eq!(m.entries()["eu-west-1"].len(), 2);
        assert!(!m.contains_top_key("us-east-1"));
    }
}
