//! stackform CLI.
//!
//! Exit codes: 0 on success, 1 on any failure (unreadable input, malformed
//! document, validation findings).

mod commands;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use stackform_core::CompileOptions;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Environment variable holding the log filter directives.
const LOG_ENV: &str = "STACKFORM_LOG";

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Infrastructure template compiler.
#[derive(Parser)]
#[command(name = "stackform", version, about = "Infrastructure template compiler")]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    /// Log compile passes to stderr (STACKFORM_LOG takes precedence)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Validation policy shared by the commands that run the validator.
#[derive(Args, Debug, Clone, Copy)]
pub(crate) struct PolicyArgs {
    /// Allow joins, mapping lookups and encodings inside condition comparisons
    #[arg(long)]
    relaxed_conditions: bool,
}

impl PolicyArgs {
    pub(crate) fn options(&self) -> CompileOptions {
        if self.relaxed_conditions {
            CompileOptions::relaxed()
        } else {
            CompileOptions::default()
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a template document to canonical JSON
    Compile {
        /// Path to the template JSON document
        file: PathBuf,
        #[command(flatten)]
        policy: PolicyArgs,
        /// Print the document on a single line
        #[arg(long)]
        compact: bool,
    },

    /// Validate a template document and report every finding
    Validate {
        /// Path to the template JSON document
        file: PathBuf,
        #[command(flatten)]
        policy: PolicyArgs,
    },

    /// Print the resource dependency graph of a template document
    Graph {
        /// Path to the template JSON document
        file: PathBuf,
    },

    /// Build the bundled ECS cluster example and print the compiled document
    Demo {
        /// Print the document on a single line
        #[arg(long)]
        compact: bool,
    },
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_level));
    let log_result = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .try_init();

    if log_result.is_err() {
        // Logging already initialized, continue
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Compile {
            file,
            policy,
            compact,
        } => {
            commands::compile::cmd_compile(&file, &policy.options(), compact, cli.output, cli.quiet);
        }
        Commands::Validate { file, policy } => {
            commands::validate::cmd_validate(&file, &policy.options(), cli.output, cli.quiet);
        }
        Commands::Graph { file } => {
            commands::graph::cmd_graph(&file, cli.output, cli.quiet);
        }
        Commands::Demo { compact } => {
            commands::demo::cmd_demo(compact, cli.output, cli.quiet);
        }
    }
}

pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("{}", msg),
        OutputFormat::Json => eprintln!("{}", serde_json::json!({ "error": msg })),
    }
}
