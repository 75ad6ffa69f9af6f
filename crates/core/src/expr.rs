//! Expression model: symbolic values that are rendered, never evaluated.
//!
//! Every property value, output value and condition body is an [`Expr`].
//! Raw scalars, handles and pseudo-references convert into `Expr` through
//! `From`, so callers can pass `"10.0.0.0/16"`, `42`, `true` or `&vpc`
//! anywhere an expression is expected.

use crate::error::TemplateError;
use indexmap::IndexMap;

/// Maximum number of operands accepted by `Fn::And` / `Fn::Or`.
pub const MAX_BOOLEAN_OPERANDS: usize = 10;

// ──────────────────────────────────────────────
// Scalars
// ──────────────────────────────────────────────

/// A literal scalar value.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl Scalar {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::String(value.to_owned())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::String(value)
    }
}

impl From<&String> for Scalar {
    fn from(value: &String) -> Self {
        Scalar::String(value.clone())
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Int(value)
    }
}

impl From<i32> for Scalar {
    fn from(value: i32) -> Self {
        Scalar::Int(i64::from(value))
    }
}

impl From<u32> for Scalar {
    fn from(value: u32) -> Self {
        Scalar::Int(i64::from(value))
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar::Float(value)
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Bool(value)
    }
}

// ──────────────────────────────────────────────
// Pseudo-references
// ──────────────────────────────────────────────

/// Built-in references resolved by the provisioning engine, never registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pseudo {
    AccountId,
    Region,
    StackId,
    StackName,
    Partition,
    UrlSuffix,
    NotificationArns,
    NoValue,
}

impl Pseudo {
    pub const ALL: [Pseudo; 8] = [
        Pseudo::AccountId,
        Pseudo::Region,
        Pseudo::StackId,
        Pseudo::StackName,
        Pseudo::Partition,
        Pseudo::UrlSuffix,
        Pseudo::NotificationArns,
        Pseudo::NoValue,
    ];

    /// The wire name, e.g. `AWS::Region`.
    pub fn name(self) -> &'static str {
        match self {
            Pseudo::AccountId => "AWS::AccountId",
            Pseudo::Region => "AWS::Region",
            Pseudo::StackId => "AWS::StackId",
            Pseudo::StackName => "AWS::StackName",
            Pseudo::Partition => "AWS::Partition",
            Pseudo::UrlSuffix => "AWS::URLSuffix",
            Pseudo::NotificationArns => "AWS::NotificationARNs",
            Pseudo::NoValue => "AWS::NoValue",
        }
    }

    pub fn from_name(name: &str) -> Option<Pseudo> {
        Pseudo::ALL.into_iter().find(|p| p.name() == name)
    }
}

/// Target of a `Ref`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefTarget {
    /// A parameter or resource logical ID.
    Logical(String),
    Pseudo(Pseudo),
}

impl RefTarget {
    pub fn name(&self) -> &str {
        match self {
            RefTarget::Logical(id) => id,
            RefTarget::Pseudo(p) => p.name(),
        }
    }
}

// ──────────────────────────────────────────────
// Expressions
// ──────────────────────────────────────────────

/// A symbolic template value.
///
/// `Not`, `Equals`, `And` and `Or` are only meaningful inside condition
/// definitions; the validator rejects them anywhere else.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Scalar),
    Reference(RefTarget),
    Attribute {
        resource: String,
        attribute: String,
    },
    Join {
        delimiter: String,
        parts: Vec<Expr>,
    },
    MapLookup {
        mapping: String,
        top_key: Box<Expr>,
        second_key: Box<Expr>,
    },
    Encode(Box<Expr>),
    Not(Box<Expr>),
    Equals(Box<Expr>, Box<Expr>),
    And(Vec<Expr>),
    Or(Vec<Expr>),
    /// Plain array whose items may themselves be expressions.
    List(Vec<Expr>),
    /// Plain object whose values may themselves be expressions.
    Object(IndexMap<String, Expr>),
}

impl Expr {
    pub fn literal(value: impl Into<Scalar>) -> Self {
        Expr::Literal(value.into())
    }

    /// `Ref` to a parameter or resource. Names of pseudo-references such as
    /// `AWS::Region` produce the corresponding [`Pseudo`] target.
    pub fn reference(target: impl AsRef<str>) -> Self {
        let target = target.as_ref();
        match Pseudo::from_name(target) {
            Some(p) => Expr::Reference(RefTarget::Pseudo(p)),
            None => Expr::Reference(RefTarget::Logical(target.to_owned())),
        }
    }

    pub fn pseudo(pseudo: Pseudo) -> Self {
        Expr::Reference(RefTarget::Pseudo(pseudo))
    }

    pub fn attribute(
        resource: impl AsRef<str>,
        attribute: impl Into<String>,
    ) -> Result<Self, TemplateError> {
        let resource = resource.as_ref();
        let attribute = attribute.into();
        if resource.is_empty() {
            return Err(TemplateError::shape("Fn::GetAtt", "resource name is empty"));
        }
        if attribute.is_empty() {
            return Err(TemplateError::shape(
                "Fn::GetAtt",
                format!("attribute name for resource '{}' is empty", resource),
            ));
        }
        Ok(Expr::Attribute {
            resource: resource.to_owned(),
            attribute,
        })
    }

    pub fn join<I, E>(delimiter: impl Into<String>, parts: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: Into<Expr>,
    {
        Expr::Join {
            delimiter: delimiter.into(),
            parts: parts.into_iter().map(Into::into).collect(),
        }
    }

    pub fn map_lookup(
        mapping: impl AsRef<str>,
        top_key: impl Into<Expr>,
        second_key: impl Into<Expr>,
    ) -> Result<Self, TemplateError> {
        let mapping = mapping.as_ref();
        if mapping.is_empty() {
            return Err(TemplateError::shape("Fn::FindInMap", "mapping name is empty"));
        }
        Ok(Expr::MapLookup {
            mapping: mapping.to_owned(),
            top_key: Box::new(top_key.into()),
            second_key: Box::new(second_key.into()),
        })
    }

    pub fn encode(inner: impl Into<Expr>) -> Self {
        Expr::Encode(Box::new(inner.into()))
    }

    pub fn not(inner: impl Into<Expr>) -> Self {
        Expr::Not(Box::new(inner.into()))
    }

    pub fn equals(left: impl Into<Expr>, right: impl Into<Expr>) -> Self {
        Expr::Equals(Box::new(left.into()), Box::new(right.into()))
    }

    pub fn and<I, E>(operands: I) -> Result<Self, TemplateError>
    where
        I: IntoIterator<Item = E>,
        E: Into<Expr>,
    {
        boolean_operands("Fn::And", operands).map(Expr::And)
    }

    pub fn or<I, E>(operands: I) -> Result<Self, TemplateError>
    where
        I: IntoIterator<Item = E>,
        E: Into<Expr>,
    {
        boolean_operands("Fn::Or", operands).map(Expr::Or)
    }

    pub fn list<I, E>(items: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: Into<Expr>,
    {
        Expr::List(items.into_iter().map(Into::into).collect())
    }

    pub fn object<I, K, E>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, E)>,
        K: Into<String>,
        E: Into<Expr>,
    {
        Expr::Object(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Wire name of the variant, used in diagnostics and rendering.
    pub fn intrinsic_name(&self) -> &'static str {
        match self {
            Expr::Literal(_) => "literal",
            Expr::Reference(_) => "Ref",
            Expr::Attribute { .. } => "Fn::GetAtt",
            Expr::Join { .. } => "Fn::Join",
            Expr::MapLookup { .. } => "Fn::FindInMap",
            Expr::Encode(_) => "Fn::Base64",
            Expr::Not(_) => "Fn::Not",
            Expr::Equals(..) => "Fn::Equals",
            Expr::And(_) => "Fn::And",
            Expr::Or(_) => "Fn::Or",
            Expr::List(_) => "list",
            Expr::Object(_) => "object",
        }
    }

    pub fn is_boolean(&self) -> bool {
        matches!(
            self,
            Expr::Not(_) | Expr::Equals(..) | Expr::And(_) | Expr::Or(_)
        )
    }

    /// Visit this expression and every nested expression, pre-order.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Expr)) {
        visit(self);
        match self {
            Expr::Literal(_) | Expr::Reference(_) | Expr::Attribute { .. } => {}
            Expr::Join { parts: items, .. }
            | Expr::And(items)
            | Expr::Or(items)
            | Expr::List(items) => {
                for item in items {
                    item.walk(visit);
                }
            }
            Expr::MapLookup {
                top_key,
                second_key,
                ..
            } => {
                top_key.walk(visit);
                second_key.walk(visit);
            }
            Expr::Encode(inner) | Expr::Not(inner) => inner.walk(visit),
            Expr::Equals(left, right) => {
                left.walk(visit);
                right.walk(visit);
            }
            Expr::Object(entries) => {
                for value in entries.values() {
                    value.walk(visit);
                }
            }
        }
    }

    /// Logical IDs this expression points at through `Ref` or `Fn::GetAtt`.
    /// Pseudo-references are skipped.
    pub fn referenced_ids(&self) -> Vec<&str> {
        let mut ids = Vec::new();
        self.walk(&mut |e| match e {
            Expr::Reference(RefTarget::Logical(id)) => ids.push(id.as_str()),
            Expr::Attribute { resource, .. } => ids.push(resource.as_str()),
            _ => {}
        });
        ids
    }
}

fn boolean_operands<I, E>(intrinsic: &'static str, operands: I) -> Result<Vec<Expr>, TemplateError>
where
    I: IntoIterator<Item = E>,
    E: Into<Expr>,
{
    let operands: Vec<Expr> = operands.into_iter().map(Into::into).collect();
    if operands.len() < 2 || operands.len() > MAX_BOOLEAN_OPERANDS {
        return Err(TemplateError::shape(
            intrinsic,
            format!(
                "expected between 2 and {} conditions, got {}",
                MAX_BOOLEAN_OPERANDS,
                operands.len()
            ),
        ));
    }
    Ok(operands)
}

// ── Literal wrapping ─────────────────────────────────────────────────

impl From<Scalar> for Expr {
    fn from(value: Scalar) -> Self {
        Expr::Literal(value)
    }
}

impl From<&str> for Expr {
    fn from(value: &str) -> Self {
        Expr::Literal(value.into())
    }
}

impl From<String> for Expr {
    fn from(value: String) -> Self {
        Expr::Literal(value.into())
    }
}

impl From<&String> for Expr {
    fn from(value: &String) -> Self {
        Expr::Literal(value.into())
    }
}

impl From<i64> for Expr {
    fn from(value: i64) -> Self {
        Expr::Literal(value.into())
    }
}

impl From<i32> for Expr {
    fn from(value: i32) -> Self {
        Expr::Literal(value.into())
    }
}

impl From<u32> for Expr {
    fn from(value: u32) -> Self {
        Expr::Literal(value.into())
    }
}

impl From<f64> for Expr {
    fn from(value: f64) -> Self {
        Expr::Literal(value.into())
    }
}

impl From<bool> for Expr {
    fn from(value: bool) -> Self {
        Expr::Literal(value.into())
    }
}

impl From<Pseudo> for Expr {
    fn from(value: Pseudo) -> Self {
        Expr::pseudo(value)
    }
}

impl<E: Into<Expr>> From<Vec<E>> for Expr {
    fn from(items: Vec<E>) -> Self {
        Expr::list(items)
    }
}

/// Build a `Vec<Expr>` from heterogeneous values, wrapping each with
/// `Expr::from`.
///
/// ```
/// use stackform_core::{exprs, Expr, Pseudo};
/// let parts = exprs!["arn:aws:iam::", Pseudo::AccountId, ":root"];
/// assert_eq!(parts.len(), 3);
/// ```
#[macro_export]
macro_rules! exprs {
    ($($e:expr),* $(,)?) => {
        vec![$($crate::Expr::from($e)),*]
    };
}
