//! Registration, shape and validation errors.

use crate::template::EntityKind;
use serde::Serialize;
use serde_json::{json, Value};
use std::fmt;

/// Where a finding was discovered: entity kind, logical ID and the field
/// inside that entity (e.g. `Properties.VpcId`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Origin {
    pub kind: EntityKind,
    pub id: String,
    pub field: String,
}

impl Origin {
    pub fn new(kind: EntityKind, id: &str, field: impl Into<String>) -> Self {
        Origin {
            kind,
            id: id.to_owned(),
            field: field.into(),
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}' ({})", self.kind, self.id, self.field)
    }
}

/// Namespace an unresolved reference was expected to live in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TargetKind {
    ParameterOrResource,
    Parameter,
    Resource,
    Mapping,
    MappingKey,
    Condition,
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TargetKind::ParameterOrResource => "parameter or resource",
            TargetKind::Parameter => "parameter",
            TargetKind::Resource => "resource",
            TargetKind::Mapping => "mapping",
            TargetKind::MappingKey => "mapping key",
            TargetKind::Condition => "condition",
        };
        f.write_str(s)
    }
}

/// A single registration failure or validation finding.
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[serde(tag = "error")]
pub enum TemplateError {
    #[error("duplicate logical id '{id}': already registered as a {existing}")]
    DuplicateLogicalId { id: String, existing: EntityKind },

    #[error("invalid logical id '{id}': {reason}")]
    InvalidLogicalId { id: String, reason: String },

    #[error("cannot register {kind} '{id}': template already holds the maximum of {limit}")]
    LimitExceeded {
        kind: EntityKind,
        id: String,
        limit: usize,
    },

    #[error("template is frozen: cannot {action} after validation has started")]
    Frozen { action: String },

    #[error("{origin}: unknown {target_kind} '{target}'")]
    UnknownReference {
        origin: Origin,
        target_kind: TargetKind,
        target: String,
    },

    #[error("dependency cycle detected: {}", .path.join(" \u{2192} "))]
    DependencyCycle { path: Vec<String> },

    #[error("{}invalid {intrinsic}: {message}", .origin.as_ref().map(|o| format!("{}: ", o)).unwrap_or_default())]
    InvalidExpressionShape {
        origin: Option<Origin>,
        intrinsic: &'static str,
        message: String,
    },

    #[error("{origin}: {message}")]
    GuardNotBoolean { origin: Origin, message: String },
}

impl TemplateError {
    /// Construction-time shape error, raised by the `Expr` constructors.
    pub(crate) fn shape(intrinsic: &'static str, message: impl Into<String>) -> Self {
        TemplateError::InvalidExpressionShape {
            origin: None,
            intrinsic,
            message: message.into(),
        }
    }

    /// Structured form: the tagged fields plus the rendered `message`.
    pub fn to_json_value(&self) -> Value {
        let mut value = serde_json::to_value(self).unwrap_or_else(|_| json!({}));
        if let Value::Object(map) = &mut value {
            map.insert("message".to_owned(), json!(self.to_string()));
        }
        value
    }
}

/// Aggregate failure of a validation or compile run. Holds every finding;
/// no document is produced when this is returned.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("template validation failed with {} finding(s){}", .findings.len(), finding_lines(.findings))]
pub struct CompileError {
    pub findings: Vec<TemplateError>,
}

impl CompileError {
    pub fn to_json_value(&self) -> Value {
        json!({
            "findings": self.findings.iter().map(TemplateError::to_json_value).collect::<Vec<_>>(),
        })
    }

    pub fn has_cycle(&self) -> bool {
        self.findings
            .iter()
            .any(|f| matches!(f, TemplateError::DependencyCycle { .. }))
    }
}

fn finding_lines(findings: &[TemplateError]) -> String {
    findings
        .iter()
        .map(|finding| format!("\n  - {}", finding))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_reference_message_names_origin_and_target() {
        let err = TemplateError::UnknownReference {
            origin: Origin::new(EntityKind::Resource, "Service", "Properties.Role"),
            target_kind: TargetKind::Resource,
            target: "Ghost".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Resource 'Service' (Properties.Role): unknown resource 'Ghost'"
        );
        let json = err.to_json_value();
        assert_eq!(json["error"], "UnknownReference");
        assert_eq!(json["target"], "Ghost");
        assert_eq!(json["origin"]["id"], "Service");
    }

    #[test]
    fn shape_error_without_origin() {
        let err = TemplateError::shape("Fn::And", "expected between 2 and 10 conditions, got 1");
        assert_eq!(
            err.to_string(),
            "invalid Fn::And: expected between 2 and 10 conditions, got 1"
        );
    }

    #[test]
    fn compile_error_lists_every_finding() {
        let err = CompileError {
            findings: vec![
                TemplateError::DependencyCycle {
                    path: vec!["A".into(), "B".into(), "A".into()],
                },
                TemplateError::GuardNotBoolean {
                    origin: Origin::new(EntityKind::Output, "Url", "Condition"),
                    message: "guard 'Vpc' names a Resource, not a condition".into(),
                },
            ],
        };
        let text = err.to_string();
        assert!(text.starts_with("template validation failed with 2 finding(s)"));
        assert!(text.contains("A \u{2192} B \u{2192} A"));
        assert!(err.has_cycle());
        assert_eq!(err.to_json_value()["findings"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn compile_error_is_a_std_error() {
        let err = CompileError {
            findings: vec![TemplateError::Frozen {
                action: "add resource 'Late'".into(),
            }],
        };
        let dyn_err: &dyn std::error::Error = &err;
        assert!(dyn_err.source().is_none());
        assert_eq!(
            dyn_err.to_string(),
            "template validation failed with 1 finding(s)\n  - template is frozen: cannot add resource 'Late' after validation has started"
        );
    }
}
