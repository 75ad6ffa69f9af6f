//! stackform-core: infrastructure template compiler.
//!
//! Builds a CloudFormation-shaped document from an owned [`Template`]:
//! callers register parameters, mappings, conditions, resources and outputs,
//! wire them together with [`Expr`] values, then compile. Compilation runs
//! the validator over the frozen registry and, if it reports nothing, the
//! serializer.
//!
//! ```
//! use stackform_core::{Expr, Resource, Template};
//!
//! let mut template = Template::new();
//! let vpc = template
//!     .add_resource("Vpc", Resource::new("AWS::EC2::VPC").with_property("CidrBlock", "10.0.0.0/16"))
//!     .unwrap();
//! template
//!     .add_resource("Subnet", Resource::new("AWS::EC2::Subnet").with_property("VpcId", &vpc))
//!     .unwrap();
//! let doc = template.compile().unwrap();
//! assert_eq!(doc["Resources"]["Subnet"]["Properties"]["VpcId"], serde_json::json!({"Ref": "Vpc"}));
//! ```
//!
//! # Public API
//!
//! - [`Template`] and its entities -- the registry (build phase)
//! - [`Expr`], [`Scalar`], [`Pseudo`] -- the expression model
//! - [`Template::compile`] / [`compile()`] -- validate + serialize
//! - [`DependencyGraph`] -- resource graph used for cycle detection
//! - [`load::from_document`] -- read an existing document back into a template
//! - [`TemplateError`], [`CompileError`], [`LoadError`]

pub mod compile;
pub mod error;
pub mod expr;
pub mod graph;
pub mod load;
pub mod serialize;
pub mod template;
mod validate;

// ── Convenience re-exports: key types ────────────────────────────────

pub use compile::{compile, CompileOptions};
pub use error::{CompileError, Origin, TargetKind, TemplateError};
pub use expr::{Expr, Pseudo, RefTarget, Scalar};
pub use graph::{DependencyGraph, Edge, EdgeKind};
pub use load::LoadError;
pub use template::{
    Condition, DeletionPolicy, EntityKind, Handle, Mapping, Output, Parameter, Resource, Template,
};
