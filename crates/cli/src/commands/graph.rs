use std::path::Path;

use stackform_core::{DependencyGraph, EdgeKind};

use super::load_template;
use crate::OutputFormat;

/// Print the dependency graph. Works on templates that would fail
/// validation too; unknown targets are simply absent from the graph.
pub(crate) fn cmd_graph(file: &Path, output: OutputFormat, quiet: bool) {
    let template = load_template(file, output, quiet);
    let graph = DependencyGraph::build(&template);

    match output {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "nodes": graph.node_count(),
                "edges": graph.edge_count(),
                "graph": graph.to_json_value(),
            });
            println!(
                "{}",
                serde_json::to_string_pretty(&json).unwrap_or_default()
            );
        }
        OutputFormat::Text => {
            for node in graph.nodes() {
                let edges = graph.edges(node);
                if edges.is_empty() {
                    println!("{}", node);
                    continue;
                }
                for edge in edges {
                    let marker = match edge.kind {
                        EdgeKind::Expression => "ref",
                        EdgeKind::Explicit => "depends-on",
                    };
                    println!("{} -> {} ({})", node, edge.target, marker);
                }
            }
            if !quiet {
                eprintln!(
                    "{} resource(s), {} edge(s)",
                    graph.node_count(),
                    graph.edge_count()
                );
            }
        }
    }
}
