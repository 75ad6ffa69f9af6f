//! Document loader: wire-format JSON back into a [`Template`].
//!
//! The main entry point is [`from_document`]. Entities are registered through
//! the ordinary `add_*` API in document order, so the loaded template behaves
//! exactly like one built by hand. References are not checked here; run the
//! validator on the result.

use crate::error::TemplateError;
use crate::expr::{Expr, Scalar};
use crate::template::{
    DeletionPolicy, Mapping, Output, Parameter, Resource, Template, FORMAT_VERSION,
};
use indexmap::IndexMap;
use serde_json::{Map, Value};

/// Errors while reading a wire document.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{path}: {message}")]
    Malformed { path: String, message: String },
    #[error("{path}: unsupported intrinsic '{name}'")]
    UnsupportedIntrinsic { path: String, name: String },
    #[error(transparent)]
    Template(#[from] TemplateError),
}

fn malformed(path: &str, message: impl Into<String>) -> LoadError {
    LoadError::Malformed {
        path: path.to_owned(),
        message: message.into(),
    }
}

const SECTIONS: &[&str] = &[
    "AWSTemplateFormatVersion",
    "Description",
    "Parameters",
    "Mappings",
    "Conditions",
    "Resources",
    "Outputs",
];

pub fn from_str(text: &str) -> Result<Template, LoadError> {
    let doc: Value = serde_json::from_str(text)?;
    from_document(&doc)
}

pub fn from_document(doc: &Value) -> Result<Template, LoadError> {
    let root = doc
        .as_object()
        .ok_or_else(|| malformed("$", "document must be a JSON object"))?;
    reject_unknown_keys(root, "$", SECTIONS)?;

    let mut template = Template::new();

    if let Some(version) = root.get("AWSTemplateFormatVersion") {
        match version.as_str() {
            Some(FORMAT_VERSION) => template.set_format_version()?,
            _ => {
                return Err(malformed(
                    "AWSTemplateFormatVersion",
                    format!("expected \"{}\"", FORMAT_VERSION),
                ))
            }
        }
    }
    if let Some(description) = root.get("Description") {
        let description = description
            .as_str()
            .ok_or_else(|| malformed("Description", "expected a string"))?;
        template.set_description(description)?;
    }

    for (id, body) in section(root, "Parameters")?.into_iter().flatten() {
        let path = format!("Parameters.{}", id);
        template.add_parameter(id.as_str(), parse_parameter(body, &path)?)?;
    }
    for (id, body) in section(root, "Mappings")?.into_iter().flatten() {
        let path = format!("Mappings.{}", id);
        template.add_mapping(id.as_str(), parse_mapping(body, &path)?)?;
    }
    for (id, body) in section(root, "Conditions")?.into_iter().flatten() {
        let path = format!("Conditions.{}", id);
        template.add_condition(id.as_str(), parse_expr(body, &path)?)?;
    }
    for (id, body) in section(root, "Resources")?.into_iter().flatten() {
        let path = format!("Resources.{}", id);
        template.add_resource(id.as_str(), parse_resource(body, &path)?)?;
    }
    for (id, body) in section(root, "Outputs")?.into_iter().flatten() {
        let path = format!("Outputs.{}", id);
        template.add_output(id.as_str(), parse_output(body, &path)?)?;
    }

    tracing::debug!(
        resources = template.resources().len(),
        outputs = template.outputs().len(),
        "document loaded"
    );
    Ok(template)
}

// ── Section helpers ─────────────────────────────────────────────────

fn section<'a>(
    root: &'a Map<String, Value>,
    name: &str,
) -> Result<Option<&'a Map<String, Value>>, LoadError> {
    match root.get(name) {
        None => Ok(None),
        Some(Value::Object(m)) => Ok(Some(m)),
        Some(_) => Err(malformed(name, "section must be an object")),
    }
}

fn object<'a>(value: &'a Value, path: &str) -> Result<&'a Map<String, Value>, LoadError> {
    value
        .as_object()
        .ok_or_else(|| malformed(path, "expected an object"))
}

fn reject_unknown_keys(
    obj: &Map<String, Value>,
    path: &str,
    allowed: &[&str],
) -> Result<(), LoadError> {
    match obj.keys().find(|k| !allowed.contains(&k.as_str())) {
        Some(key) => Err(malformed(path, format!("unexpected key '{}'", key))),
        None => Ok(()),
    }
}

fn required_str<'a>(obj: &'a Map<String, Value>, field: &str, path: &str) -> Result<&'a str, LoadError> {
    obj.get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| malformed(path, format!("missing string field '{}'", field)))
}

fn optional_str<'a>(
    obj: &'a Map<String, Value>,
    field: &str,
    path: &str,
) -> Result<Option<&'a str>, LoadError> {
    match obj.get(field) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(_) => Err(malformed(path, format!("'{}' must be a string", field))),
    }
}

fn parse_scalar(value: &Value, path: &str) -> Result<Scalar, LoadError> {
    match value {
        Value::String(s) => Ok(Scalar::String(s.clone())),
        Value::Bool(b) => Ok(Scalar::Bool(*b)),
        Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => Ok(Scalar::Int(i)),
            (None, Some(f)) => Ok(Scalar::Float(f)),
            (None, None) => Err(malformed(path, format!("number {} out of range", n))),
        },
        _ => Err(malformed(path, "expected a string, number or boolean")),
    }
}

// ── Entities ────────────────────────────────────────────────────────

fn parse_parameter(value: &Value, path: &str) -> Result<Parameter, LoadError> {
    let obj = object(value, path)?;
    reject_unknown_keys(
        obj,
        path,
        &["Type", "Description", "Default", "AllowedValues", "NoEcho"],
    )?;

    let mut parameter = Parameter::new(required_str(obj, "Type", path)?);
    if let Some(d) = optional_str(obj, "Description", path)? {
        parameter = parameter.with_description(d);
    }
    if let Some(d) = obj.get("Default") {
        parameter = parameter.with_default(parse_scalar(d, &format!("{}.Default", path))?);
    }
    if let Some(values) = obj.get("AllowedValues") {
        let values_path = format!("{}.AllowedValues", path);
        let items = values
            .as_array()
            .ok_or_else(|| malformed(&values_path, "expected an array"))?;
        let scalars = items
            .iter()
            .map(|v| parse_scalar(v, &values_path))
            .collect::<Result<Vec<_>, _>>()?;
        parameter = parameter.with_allowed_values(scalars);
    }
    match obj.get("NoEcho") {
        None | Some(Value::Bool(false)) => {}
        Some(Value::Bool(true)) => parameter = parameter.with_no_echo(),
        Some(Value::String(s)) if s.eq_ignore_ascii_case("true") => {
            parameter = parameter.with_no_echo()
        }
        Some(Value::String(s)) if s.eq_ignore_ascii_case("false") => {}
        Some(_) => return Err(malformed(path, "'NoEcho' must be a boolean")),
    }
    Ok(parameter)
}

fn parse_mapping(value: &Value, path: &str) -> Result<Mapping, LoadError> {
    let mut mapping = Mapping::new();
    for (top, inner) in object(value, path)? {
        let inner_path = format!("{}.{}", path, top);
        let mut entries: IndexMap<String, Scalar> = IndexMap::new();
        for (key, v) in object(inner, &inner_path)? {
            entries.insert(key.clone(), parse_scalar(v, &format!("{}.{}", inner_path, key))?);
        }
        mapping = mapping.with_entry(top.as_str(), entries);
    }
    Ok(mapping)
}

fn parse_resource(value: &Value, path: &str) -> Result<Resource, LoadError> {
    let obj = object(value, path)?;
    reject_unknown_keys(
        obj,
        path,
        &[
            "Type",
            "Condition",
            "DependsOn",
            "Metadata",
            "Properties",
            "DeletionPolicy",
        ],
    )?;

    let mut resource = Resource::new(required_str(obj, "Type", path)?);
    if let Some(guard) = optional_str(obj, "Condition", path)? {
        resource = resource.with_condition(guard);
    }
    match obj.get("DependsOn") {
        None => {}
        Some(Value::String(target)) => resource = resource.depends_on(target),
        Some(Value::Array(targets)) => {
            for target in targets {
                let target = target
                    .as_str()
                    .ok_or_else(|| malformed(path, "'DependsOn' entries must be strings"))?;
                resource = resource.depends_on(target);
            }
        }
        Some(_) => {
            return Err(malformed(
                path,
                "'DependsOn' must be a string or an array of strings",
            ))
        }
    }
    if let Some(metadata) = obj.get("Metadata") {
        resource = resource.with_metadata(parse_expr(metadata, &format!("{}.Metadata", path))?);
    }
    if let Some(props) = obj.get("Properties") {
        let props_path = format!("{}.Properties", path);
        for (name, v) in object(props, &props_path)? {
            let expr = parse_expr(v, &format!("{}.{}", props_path, name))?;
            resource = resource.with_property(name.as_str(), expr);
        }
    }
    if let Some(policy) = optional_str(obj, "DeletionPolicy", path)? {
        let policy = DeletionPolicy::parse(policy).ok_or_else(|| {
            malformed(path, format!("unknown DeletionPolicy '{}'", policy))
        })?;
        resource = resource.with_deletion_policy(policy);
    }
    Ok(resource)
}

fn parse_output(value: &Value, path: &str) -> Result<Output, LoadError> {
    let obj = object(value, path)?;
    reject_unknown_keys(obj, path, &["Description", "Value", "Export", "Condition"])?;

    let raw = obj
        .get("Value")
        .ok_or_else(|| malformed(path, "missing field 'Value'"))?;
    let mut output = Output::new(parse_expr(raw, &format!("{}.Value", path))?);
    if let Some(d) = optional_str(obj, "Description", path)? {
        output = output.with_description(d);
    }
    if let Some(export) = obj.get("Export") {
        let export_path = format!("{}.Export", path);
        let export_obj = object(export, &export_path)?;
        reject_unknown_keys(export_obj, &export_path, &["Name"])?;
        let name = export_obj
            .get("Name")
            .ok_or_else(|| malformed(&export_path, "missing field 'Name'"))?;
        output = output.with_export(parse_expr(name, &format!("{}.Name", export_path))?);
    }
    if let Some(guard) = optional_str(obj, "Condition", path)? {
        output = output.with_condition(guard);
    }
    Ok(output)
}

// ── Expressions ─────────────────────────────────────────────────────

/// Decode one wire value. A single-key object whose key is `Ref` or starts
/// with `Fn::` is an intrinsic; every other object or array is structural.
pub fn parse_expr(value: &Value, path: &str) -> Result<Expr, LoadError> {
    match value {
        Value::Null => Err(malformed(path, "null is not a template value")),
        Value::Array(items) => Ok(Expr::List(parse_items(items, path)?)),
        Value::Object(obj) => {
            if obj.len() == 1 {
                if let Some((key, body)) = obj.iter().next() {
                    if key == "Ref" || key.starts_with("Fn::") {
                        return parse_intrinsic(key, body, path);
                    }
                }
            }
            let mut entries = IndexMap::with_capacity(obj.len());
            for (k, v) in obj {
                entries.insert(k.clone(), parse_expr(v, &format!("{}.{}", path, k))?);
            }
            Ok(Expr::Object(entries))
        }
        scalar => Ok(Expr::Literal(parse_scalar(scalar, path)?)),
    }
}

fn parse_items(items: &[Value], path: &str) -> Result<Vec<Expr>, LoadError> {
    items
        .iter()
        .enumerate()
        .map(|(i, v)| parse_expr(v, &format!("{}[{}]", path, i)))
        .collect()
}

fn parse_intrinsic(name: &str, body: &Value, path: &str) -> Result<Expr, LoadError> {
    let path = format!("{}.{}", path, name);
    let path = path.as_str();
    match name {
        "Ref" => {
            let target = body
                .as_str()
                .ok_or_else(|| malformed(path, "expected a logical ID string"))?;
            Ok(Expr::reference(target))
        }
        "Fn::GetAtt" => {
            let (resource, attribute) = match body {
                Value::String(dotted) => dotted
                    .split_once('.')
                    .ok_or_else(|| malformed(path, "expected \"Resource.Attribute\""))?,
                Value::Array(pair) => match pair.as_slice() {
                    [Value::String(r), Value::String(a)] => (r.as_str(), a.as_str()),
                    _ => return Err(malformed(path, "expected [resource, attribute]")),
                },
                _ => return Err(malformed(path, "expected [resource, attribute]")),
            };
            Ok(Expr::attribute(resource, attribute)?)
        }
        "Fn::Join" => match body.as_array().map(Vec::as_slice) {
            Some([Value::String(delimiter), Value::Array(parts)]) => Ok(Expr::Join {
                delimiter: delimiter.clone(),
                parts: parse_items(parts, path)?,
            }),
            _ => Err(malformed(path, "expected [delimiter, [parts...]]")),
        },
        "Fn::FindInMap" => match body.as_array().map(Vec::as_slice) {
            Some([Value::String(mapping), top, second]) => Ok(Expr::map_lookup(
                mapping,
                parse_expr(top, path)?,
                parse_expr(second, path)?,
            )?),
            _ => Err(malformed(path, "expected [mapping, top key, second key]")),
        },
        "Fn::Base64" => Ok(Expr::encode(parse_expr(body, path)?)),
        "Fn::Not" => match body.as_array().map(Vec::as_slice) {
            Some([inner]) => Ok(Expr::not(parse_expr(inner, path)?)),
            _ => Err(malformed(path, "expected a one-element array")),
        },
        "Fn::Equals" => match body.as_array().map(Vec::as_slice) {
            Some([left, right]) => Ok(Expr::equals(
                parse_expr(left, path)?,
                parse_expr(right, path)?,
            )),
            _ => Err(malformed(path, "expected a two-element array")),
        },
        "Fn::And" | "Fn::Or" => {
            let operands = body
                .as_array()
                .ok_or_else(|| malformed(path, "expected an array of conditions"))?;
            let operands = parse_items(operands, path)?;
            if name == "Fn::And" {
                Ok(Expr::and(operands)?)
            } else {
                Ok(Expr::or(operands)?)
            }
        }
        other => Err(LoadError::UnsupportedIntrinsic {
            path: path.to_owned(),
            name: other.to_owned(),
        }),
    }
}
