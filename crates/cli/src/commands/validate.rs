use std::path::Path;
use std::process;

use stackform_core::CompileOptions;

use super::{load_template, report_findings};
use crate::OutputFormat;

pub(crate) fn cmd_validate(
    file: &Path,
    options: &CompileOptions,
    output: OutputFormat,
    quiet: bool,
) {
    let mut template = load_template(file, output, quiet);

    if let Err(e) = template.validate_with(options) {
        report_findings(&e, output, quiet);
        process::exit(1);
    }

    if !quiet {
        match output {
            OutputFormat::Text => println!("valid"),
            OutputFormat::Json => println!("{}", serde_json::json!({ "valid": true })),
        }
    }
}
