// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Pure renderings of a [`DependencyGraph`] for inspection and tooling.
//!
//! Nothing here touches the file system; callers decide where the text goes.

use serde::Serialize;
use std::fmt::Write;

use crate::model::graph::{DependencyGraph, GraphNode};
use crate::model::value::{Requirement, Specification};

#[derive(Serialize)]
struct GraphView<'a> {
    calculation_configuration: &'a str,
    nodes: Vec<&'a GraphNode>,
    terminal_outputs: Vec<TerminalView<'a>>,
}

#[derive(Serialize)]
struct TerminalView<'a> {
    requirement: &'a Requirement,
    specification: &'a Specification,
}

/// Indented ASCII listing: one block per node, then the terminal outputs.
pub fn to_text(graph: &DependencyGraph) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "DependencyGraph[{}]: {} nodes, {} terminal outputs",
        graph.calculation_configuration(),
        graph.node_count(),
        graph.terminal_outputs().len()
    );
    for node in graph.nodes() {
        let _ = writeln!(out, "  {} on {}", node.function, node.target);
        for input in &node.inputs {
            let _ = writeln!(out, "    <- {}", input);
        }
        for output in &node.outputs {
            let _ = writeln!(out, "    -> {}", output);
        }
    }
    if !graph.terminal_outputs().is_empty() {
        let _ = writeln!(out, "  terminal outputs:");
        for (requirement, specification) in graph.terminal_outputs() {
            let _ = writeln!(out, "    {} => {}", requirement, specification);
        }
    }
    out
}

/// Pretty JSON. Terminal outputs are emitted as a list of pairs because
/// requirements are not string keys.
pub fn to_json(graph: &DependencyGraph) -> serde_json::Result<String> {
    let view = GraphView {
        calculation_configuration: graph.calculation_configuration(),
        nodes: graph.nodes().iter().collect(),
        terminal_outputs: graph
            .terminal_outputs()
            .iter()
            .map(|(requirement, specification)| TerminalView {
                requirement,
                specification,
            })
            .collect(),
    };
    serde_json::to_string_pretty(&view)
}
