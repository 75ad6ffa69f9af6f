pub(crate) mod compile;
pub(crate) mod demo;
pub(crate) mod graph;
pub(crate) mod validate;

use std::path::Path;
use std::process;

use serde_json::Value;
use stackform_core::{load, CompileError, Template};

use crate::{report_error, OutputFormat};

/// Read and load a template document, exiting with code 1 on failure.
pub(crate) fn load_template(path: &Path, output: OutputFormat, quiet: bool) -> Template {
    let src = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            let msg = format!("error reading file '{}': {}", path.display(), e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    };

    match load::from_str(&src) {
        Ok(template) => {
            tracing::debug!(
                path = %path.display(),
                resources = template.resources().len(),
                "template loaded"
            );
            template
        }
        Err(e) => {
            let msg = format!("error loading '{}': {}", path.display(), e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    }
}

/// Print every finding of a failed run to stderr, unless quiet.
pub(crate) fn report_findings(err: &CompileError, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Json => {
            let mut json = err.to_json_value();
            if let Value::Object(map) = &mut json {
                map.insert("valid".to_owned(), Value::Bool(false));
            }
            eprintln!(
                "{}",
                serde_json::to_string_pretty(&json).unwrap_or_default()
            );
        }
        OutputFormat::Text => eprintln!("{}", err),
    }
}

pub(crate) fn print_document(doc: &Value, compact: bool) {
    if compact {
        println!("{}", doc);
    } else {
        println!("{:#}", doc);
    }
}
