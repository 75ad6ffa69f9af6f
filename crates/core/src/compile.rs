//! Compile driver: freeze, validate, serialize.
//!
//! Thin orchestrator over the passes. Both entry points freeze the template
//! before doing anything else, so a template that has been looked at by the
//! validator can no longer change underneath an emitted document.

use crate::error::CompileError;
use crate::serialize;
use crate::template::Template;
use crate::validate;
use serde_json::Value;

/// Policy knobs for a compile run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileOptions {
    /// Condition bodies may only compare literals and parameter/pseudo
    /// references. When off, `Fn::Equals` operands may also use joins,
    /// mapping lookups and encodings.
    pub strict_conditions: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions {
            strict_conditions: true,
        }
    }
}

impl CompileOptions {
    pub fn relaxed() -> Self {
        CompileOptions {
            strict_conditions: false,
        }
    }
}

impl Template {
    pub fn validate(&mut self) -> Result<(), CompileError> {
        self.validate_with(&CompileOptions::default())
    }

    pub fn validate_with(&mut self, options: &CompileOptions) -> Result<(), CompileError> {
        self.freeze();
        tracing::debug!(
            parameters = self.parameters().len(),
            mappings = self.mappings().len(),
            conditions = self.conditions().len(),
            resources = self.resources().len(),
            outputs = self.outputs().len(),
            strict_conditions = options.strict_conditions,
            "validating template"
        );
        let findings = validate::validate(self, options);
        if findings.is_empty() {
            Ok(())
        } else {
            Err(CompileError { findings })
        }
    }

    pub fn compile(&mut self) -> Result<Value, CompileError> {
        self.compile_with(&CompileOptions::default())
    }

    pub fn compile_with(&mut self, options: &CompileOptions) -> Result<Value, CompileError> {
        self.validate_with(options)?;
        let doc = serialize::serialize(self);
        tracing::debug!("template serialized");
        Ok(doc)
    }

    /// Compile and pretty-print.
    pub fn to_json(&mut self) -> Result<String, CompileError> {
        self.compile().map(|doc| format!("{:#}", doc))
    }
}

/// Compile `template` with default options.
pub fn compile(template: &mut Template) -> Result<Value, CompileError> {
    template.compile()
}
