//! Serialization pass: canonical document with fixed section order and
//! registration-ordered entries.
//!
//! Assumes the template already passed validation; nothing is checked here.

use crate::expr::{Expr, Scalar};
use crate::template::{Mapping, Output, Parameter, Resource, Template};
use serde_json::{json, Map, Value};

pub(crate) fn serialize(template: &Template) -> Value {
    let mut doc = Map::new();

    if let Some(version) = template.format_version() {
        doc.insert("AWSTemplateFormatVersion".to_owned(), json!(version));
    }
    if let Some(description) = template.description() {
        doc.insert("Description".to_owned(), json!(description));
    }

    insert_section(&mut doc, "Parameters", template.parameters(), serialize_parameter);
    insert_section(&mut doc, "Mappings", template.mappings(), serialize_mapping);
    insert_section(&mut doc, "Conditions", template.conditions(), |c| {
        render_expr(&c.expr)
    });
    insert_section(&mut doc, "Resources", template.resources(), serialize_resource);
    insert_section(&mut doc, "Outputs", template.outputs(), serialize_output);

    Value::Object(doc)
}

fn insert_section<T>(
    doc: &mut Map<String, Value>,
    name: &str,
    entries: &indexmap::IndexMap<String, T>,
    render: impl Fn(&T) -> Value,
) {
    if entries.is_empty() {
        return;
    }
    let section: Map<String, Value> = entries
        .iter()
        .map(|(id, entry)| (id.clone(), render(entry)))
        .collect();
    doc.insert(name.to_owned(), Value::Object(section));
}

fn serialize_parameter(p: &Parameter) -> Value {
    let mut m = Map::new();
    m.insert("Type".to_owned(), json!(p.param_type));
    if let Some(d) = &p.description {
        m.insert("Description".to_owned(), json!(d));
    }
    if let Some(d) = &p.default {
        m.insert("Default".to_owned(), render_scalar(d));
    }
    if !p.allowed_values.is_empty() {
        m.insert(
            "AllowedValues".to_owned(),
            Value::Array(p.allowed_values.iter().map(render_scalar).collect()),
        );
    }
    if p.no_echo {
        m.insert("NoEcho".to_owned(), json!(true));
    }
    Value::Object(m)
}

fn serialize_mapping(mapping: &Mapping) -> Value {
    let m: Map<String, Value> = mapping
        .entries()
        .iter()
        .map(|(top, inner)| {
            let inner: Map<String, Value> = inner
                .iter()
                .map(|(k, v)| (k.clone(), render_scalar(v)))
                .collect();
            (top.clone(), Value::Object(inner))
        })
        .collect();
    Value::Object(m)
}

fn serialize_resource(r: &Resource) -> Value {
    let mut m = Map::new();
    m.insert("Type".to_owned(), json!(r.resource_type));
    if let Some(c) = &r.condition {
        m.insert("Condition".to_owned(), json!(c));
    }
    if !r.depends_on.is_empty() {
        m.insert("DependsOn".to_owned(), json!(r.depends_on));
    }
    if let Some(meta) = &r.metadata {
        m.insert("Metadata".to_owned(), render_expr(meta));
    }
    if !r.properties.is_empty() {
        let props: Map<String, Value> = r
            .properties
            .iter()
            .map(|(name, value)| (name.clone(), render_expr(value)))
            .collect();
        m.insert("Properties".to_owned(), Value::Object(props));
    }
    if let Some(policy) = r.deletion_policy {
        m.insert("DeletionPolicy".to_owned(), json!(policy.as_str()));
    }
    Value::Object(m)
}

fn serialize_output(o: &Output) -> Value {
    let mut m = Map::new();
    if let Some(d) = &o.description {
        m.insert("Description".to_owned(), json!(d));
    }
    m.insert("Value".to_owned(), render_expr(&o.value));
    if let Some(name) = &o.export {
        m.insert("Export".to_owned(), json!({ "Name": render_expr(name) }));
    }
    if let Some(c) = &o.condition {
        m.insert("Condition".to_owned(), json!(c));
    }
    Value::Object(m)
}

pub fn render_scalar(s: &Scalar) -> Value {
    match s {
        Scalar::String(v) => json!(v),
        Scalar::Int(v) => json!(v),
        Scalar::Float(v) => json!(v),
        Scalar::Bool(v) => json!(v),
    }
}

/// Canonical rendering of one expression: literals as JSON scalars,
/// intrinsics as single-key objects tagged with their wire name.
pub fn render_expr(expr: &Expr) -> Value {
    match expr {
        Expr::Literal(s) => render_scalar(s),
        Expr::Reference(target) => tagged(expr, json!(target.name())),
        Expr::Attribute {
            resource,
            attribute,
        } => tagged(expr, json!([resource, attribute])),
        Expr::Join { delimiter, parts } => tagged(expr, json!([delimiter, render_all(parts)])),
        Expr::MapLookup {
            mapping,
            top_key,
            second_key,
        } => tagged(
            expr,
            json!([mapping, render_expr(top_key), render_expr(second_key)]),
        ),
        Expr::Encode(inner) => tagged(expr, render_expr(inner)),
        Expr::Not(inner) => tagged(expr, json!([render_expr(inner)])),
        Expr::Equals(left, right) => {
            tagged(expr, json!([render_expr(left), render_expr(right)]))
        }
        Expr::And(operands) | Expr::Or(operands) => tagged(expr, render_all(operands)),
        Expr::List(items) => render_all(items),
        Expr::Object(entries) => Value::Object(
            entries
                .iter()
                .map(|(k, v)| (k.clone(), render_expr(v)))
                .collect(),
        ),
    }
}

fn render_all(items: &[Expr]) -> Value {
    Value::Array(items.iter().map(render_expr).collect())
}

fn tagged(expr: &Expr, body: Value) -> Value {
    let mut m = Map::new();
    m.insert(expr.intrinsic_name().to_owned(), body);
    Value::Object(m)
}
