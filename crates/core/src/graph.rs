//! Resource dependency graph, derived from expression trees and explicit
//! `DependsOn` hints.
//!
//! The graph exists for cycle detection. It does not yield a creation
//! order; the provisioning engine decides that.

use crate::expr::{Expr, RefTarget};
use crate::template::{Resource, Template};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EdgeKind {
    /// Implied by a `Ref` or `Fn::GetAtt` inside the resource.
    Expression,
    /// Listed in the resource's `DependsOn`.
    Explicit,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Edge {
    pub target: String,
    pub kind: EdgeKind,
}

/// Directed graph over resources, nodes in registration order.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    adjacency: IndexMap<String, Vec<Edge>>,
}

impl DependencyGraph {
    pub fn build(template: &Template) -> Self {
        let mut adjacency = IndexMap::with_capacity(template.resources().len());
        for (id, resource) in template.resources() {
            adjacency.insert(id.clone(), resource_edges(template, resource));
        }
        let graph = DependencyGraph { adjacency };
        tracing::debug!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "built dependency graph"
        );
        graph
    }

    pub fn nodes(&self) -> impl Iterator<Item = &str> {
        self.adjacency.keys().map(String::as_str)
    }

    /// Outgoing edges of `node`, empty for unknown nodes.
    pub fn edges(&self, node: &str) -> &[Edge] {
        self.adjacency.get(node).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn dependencies_of(&self, node: &str) -> impl Iterator<Item = &str> {
        self.edges(node).iter().map(|e| e.target.as_str())
    }

    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    pub fn edge_count(&self) -> usize {
        self.adjacency.values().map(Vec::len).sum()
    }

    /// `{"Node": [{"target": ..., "kind": ...}, ...], ...}` in node order.
    pub fn to_json_value(&self) -> Value {
        let mut map = serde_json::Map::new();
        for (node, edges) in &self.adjacency {
            map.insert(node.clone(), json!(edges));
        }
        Value::Object(map)
    }
}

fn resource_edges(template: &Template, resource: &Resource) -> Vec<Edge> {
    let mut edges: Vec<Edge> = Vec::new();
    let mut push = |target: &str, kind: EdgeKind| {
        if template.resources().contains_key(target) && !edges.iter().any(|e| e.target == target)
        {
            edges.push(Edge {
                target: target.to_owned(),
                kind,
            });
        }
    };

    let mut exprs: Vec<&Expr> = resource.properties.values().collect();
    exprs.extend(resource.metadata.as_ref());
    if let Some(guard) = resource
        .condition
        .as_ref()
        .and_then(|c| template.conditions().get(c))
    {
        exprs.push(&guard.expr);
    }
    for expr in exprs {
        expr.walk(&mut |e| match e {
            Expr::Reference(RefTarget::Logical(id)) => push(id.as_str(), EdgeKind::Expression),
            Expr::Attribute { resource: target, .. } => {
                push(target.as_str(), EdgeKind::Expression)
            }
            _ => {}
        });
    }

    for target in &resource.depends_on {
        push(target.as_str(), EdgeKind::Explicit);
    }
    edges
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::Parameter;

    #[test]
    fn edges_come_from_expressions_and_depends_on() {
        let mut t = Template::new();
        let size = t.add_parameter("Size", Parameter::number()).unwrap();
        let vpc = t
            .add_resource("Vpc", Resource::new("AWS::EC2::VPC"))
            .unwrap();
        t.add_resource("Gateway", Resource::new("AWS::EC2::InternetGateway"))
            .unwrap();
        t.add_resource(
            "Subnet",
            Resource::new("AWS::EC2::Subnet")
                .with_property("VpcId", &vpc)
                .with_property("Count", &size)
                .depends_on("Gateway"),
        )
        .unwrap();

        let g = DependencyGraph::build(&t);
        assert_eq!(g.node_count(), 3);
        assert_eq!(
            g.edges("Subnet"),
            &[
                Edge {
                    target: "Vpc".to_string(),
                    kind: EdgeKind::Expression
                },
                Edge {
                    target: "Gateway".to_string(),
                    kind: EdgeKind::Explicit
                },
            ]
        );
        assert!(g.edges("Vpc").is_empty());
    }

    #[test]
    fn repeated_targets_collapse_onto_first_edge() {
        let mut t = Template::new();
        t.add_resource("Role", Resource::new("AWS::IAM::Role"))
            .unwrap();
        t.add_resource(
            "Profile",
            Resource::new("AWS::IAM::InstanceProfile")
                .with_property("Roles", vec![Expr::reference("Role")])
                .with_property("Arn", Expr::attribute("Role", "Arn").unwrap())
                .depends_on("Role"),
        )
        .unwrap();

        let g = DependencyGraph::build(&t);
        assert_eq!(g.edge_count(), 1);
        assert_eq!(g.edges("Profile")[0].kind, EdgeKind::Expression);
    }

    #[test]
    fn unknown_targets_are_not_nodes() {
        let mut t = Template::new();
        t.add_resource(
            "Nat",
            Resource::new("AWS::EC2::Instance").with_property("SubnetId", Expr::reference("Ghost")),
        )
        .unwrap();
        let g = DependencyGraph::build(&t);
        assert_eq!(g.dependencies_of("Nat").count(), 0);
        assert_eq!(g.to_json_value(), json!({"Nat": []}));
    }
}
