// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::collections::BTreeSet;

use crate::engine::terminal::TerminalCollector;
use crate::model::{DependencyGraph, GraphNode};
use crate::observability::messages::builder::GraphAssembled;
use crate::observability::messages::StructuredLog;

/// Copies the collected nodes and terminal outputs into an immutable graph.
///
/// Only meaningful once the build is at its fixed point; calling it again
/// without further work yields an equal graph.
pub(crate) fn assemble(calculation_configuration: &str, terminal: &TerminalCollector) -> DependencyGraph {
    let nodes: BTreeSet<GraphNode> = terminal
        .nodes()
        .into_iter()
        .map(|(key, outputs)| GraphNode::from_key(key, outputs))
        .collect();
    let terminal_outputs = terminal.outputs();

    GraphAssembled {
        calculation_configuration,
        node_count: nodes.len(),
        terminal_output_count: terminal_outputs.len(),
    }
    .log();

    DependencyGraph::new(calculation_configuration, nodes, terminal_outputs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FunctionId, Requirement, ResolvedValue, Specification};

    #[test]
    fn test_assembly_is_idempotent() {
        let terminal = TerminalCollector::new();
        let curve = ResolvedValue::new(
            Specification::new("Curve", "USD", "market_data"),
            FunctionId::new("market_data"),
            0,
            vec![],
        );
        let pv = ResolvedValue::new(
            Specification::new("PV", "SWAP-1", "pv"),
            FunctionId::new("pv"),
            0,
            vec![curve],
        );
        terminal.resolved(&Requirement::new("PV", "SWAP-1"), &pv);

        let first = assemble("default", &terminal);
        let second = assemble("default", &terminal);

        assert_eq!(first, second);
        assert_eq!(first.node_count(), 2);
        assert_eq!(first.calculation_configuration(), "default");
        assert!(first.producer_of(pv.specification()).is_some());
    }
}
