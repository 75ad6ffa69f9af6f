use std::path::Path;
use std::process;

use stackform_core::CompileOptions;

use super::{load_template, print_document, report_findings};
use crate::OutputFormat;

pub(crate) fn cmd_compile(
    file: &Path,
    options: &CompileOptions,
    compact: bool,
    output: OutputFormat,
    quiet: bool,
) {
    let mut template = load_template(file, output, quiet);
    match template.compile_with(options) {
        Ok(doc) => print_document(&doc, compact),
        Err(e) => {
            report_findings(&e, output, quiet);
            process::exit(1);
        }
    }
}
