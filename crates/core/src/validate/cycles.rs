//! Cycle detection over the resource dependency graph.

use crate::error::TemplateError;
use crate::graph::DependencyGraph;
use std::collections::HashSet;

/// Depth-first traversal in registration order with an explicit recursion
/// stack. Every back edge yields one `DependencyCycle` whose path starts and
/// ends at the re-entered resource.
pub(super) fn check_cycles(graph: &DependencyGraph, findings: &mut Vec<TemplateError>) {
    let mut visited: HashSet<&str> = HashSet::new();
    let mut on_stack: HashSet<&str> = HashSet::new();
    let mut stack: Vec<&str> = Vec::new();

    for node in graph.nodes() {
        if !visited.contains(node) {
            dfs(node, graph, &mut visited, &mut on_stack, &mut stack, findings);
        }
    }
}

fn dfs<'a>(
    node: &'a str,
    graph: &'a DependencyGraph,
    visited: &mut HashSet<&'a str>,
    on_stack: &mut HashSet<&'a str>,
    stack: &mut Vec<&'a str>,
    findings: &mut Vec<TemplateError>,
) {
    stack.push(node);
    on_stack.insert(node);

    for target in graph.dependencies_of(node) {
        if on_stack.contains(target) {
            let start = stack.iter().position(|&n| n == target).unwrap_or(0);
            let mut path: Vec<String> = stack[start..].iter().map(|s| s.to_string()).collect();
            path.push(target.to_owned());
            tracing::debug!(cycle = %path.join(" -> "), "dependency cycle");
            findings.push(TemplateError::DependencyCycle { path });
        } else if !visited.contains(target) {
            dfs(target, graph, visited, on_stack, stack, findings);
        }
    }

    on_stack.remove(node);
    visited.insert(node);
    stack.pop();
}
