use std::fmt::{self, Write};

use crate::graph::DiagramGraph;

/// Serialize a graph as Graphviz DOT: left-to-right, orthogonal edges,
/// parallel edges merged, one dashed box per group.
pub fn to_dot(graph: &DiagramGraph) -> String {
    let mut out = String::with_capacity(1024);
    // Writing into a String cannot fail.
    let _ = write_dot(graph, &mut out);
    out
}

fn write_dot(graph: &DiagramGraph, out: &mut String) -> fmt::Result {
    writeln!(out, "// Architecture Diagram")?;
    writeln!(out, "digraph {{")?;
    writeln!(
        out,
        "\tgraph [concentrate=true nodesep=0.6 rankdir=LR ranksep=0.9 splines=ortho]"
    )?;
    writeln!(out, "\tnode [fontsize=12 shape=box style=\"rounded,filled\"]")?;
    writeln!(out, "\tedge [fontsize=9]")?;

    for cluster in &graph.clusters {
        writeln!(out, "\tsubgraph {} {{", cluster.group.cluster_name())?;
        writeln!(
            out,
            "\t\tcolor=\"#cccccc\" label={} style=\"rounded,dashed\"",
            quote(cluster.label)
        )?;
        for node in &cluster.nodes {
            writeln!(out, "\t\t{} [label={}]", quote(&node.id), quote(&node.label))?;
        }
        writeln!(out, "\t}}")?;
    }

    for edge in &graph.edges {
        writeln!(
            out,
            "\t{} -> {} [label={}]",
            quote(&edge.from),
            quote(&edge.to),
            quote(&edge.label)
        )?;
    }

    writeln!(out, "}}")
}

/// Quote a DOT ID, escaping quotes and backslashes and turning newlines into
/// centered line breaks.
fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => {}
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::synthesize;
    use blueprint_core::{ArchitecturePlan, Component, Connection};

    #[test]
    fn dot_has_layout_clusters_and_edges() {
        let plan = ArchitecturePlan {
            components: vec![
                Component::new("c1", "Client", "client"),
                Component::new("w1", "Web", "web"),
                Component::new("x1", "Weird", "weird"),
            ],
            connections: vec![Connection::new("c1", "w1", "HTTPS")],
            ..ArchitecturePlan::default()
        };
        let dot = to_dot(&synthesize(&plan));

        assert!(dot.starts_with("// Architecture Diagram\ndigraph {"));
        assert!(dot.contains("rankdir=LR"));
        assert!(dot.contains("splines=ortho"));
        assert!(dot.contains("concentrate=true"));
        assert!(dot.contains("subgraph cluster_frontend {"));
        assert!(dot.contains("subgraph cluster_other {"));
        assert!(!dot.contains("cluster_databases"));
        assert!(dot.contains("\t\t\"c1\" [label=\"Client\"]"));
        assert!(dot.contains("\t\"c1\" -> \"w1\" [label=\"HTTPS\"]"));
        assert!(dot.find("cluster_frontend").unwrap() < dot.find("cluster_other").unwrap());
        assert!(dot.trim_end().ends_with('}'));
    }

    #[test]
    fn labels_are_escaped() {
        assert_eq!(quote("say \"hi\""), "\"say \\\"hi\\\"\"");
        assert_eq!(quote("a\\b"), "\"a\\\\b\"");
        assert_eq!(quote("two\nlines"), "\"two\\nlines\"");
    }

    #[test]
    fn empty_graph_is_still_valid_dot() {
        let dot = to_dot(&DiagramGraph::default());
        assert!(!dot.contains("subgraph"));
        assert!(!dot.contains("->"));
        assert!(dot.ends_with("}\n"));
    }
}
