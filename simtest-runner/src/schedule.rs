// Copyright (c) The simtest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deterministic ordering of tests so that restart prerequisites run first.

use crate::{catalog::TestName, errors::CyclicDependencyError, graph::DependencyGraph};
use petgraph::{
    Direction,
    algo::scc::kosaraju_scc,
    graph::{DiGraph, NodeIndex},
};
use std::collections::BTreeMap;

/// An order in which every test comes after the test it restarts from.
///
/// Computed in waves: each wave holds every test whose prerequisite has already been emitted,
/// sorted by name. The order is therefore a pure function of the dependency graph.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExecutionOrder {
    order: Vec<TestName>,
    wave_count: usize,
}

impl ExecutionOrder {
    /// Computes the execution order for `graph`.
    pub fn compute(graph: &DependencyGraph) -> Result<Self, CyclicDependencyError> {
        // Edges go from prerequisite to dependent. Nodes are added in name order.
        let mut dag = DiGraph::<&TestName, ()>::with_capacity(graph.len(), graph.len());
        let nodes: BTreeMap<&TestName, NodeIndex> = graph
            .tests()
            .map(|name| (name, dag.add_node(name)))
            .collect();
        for (name, prerequisite) in graph.iter() {
            if let Some(prerequisite) = prerequisite {
                dag.add_edge(nodes[prerequisite], nodes[name], ());
            }
        }

        let mut remaining: BTreeMap<&TestName, usize> = nodes
            .iter()
            .map(|(name, &ix)| {
                let in_degree = dag.neighbors_directed(ix, Direction::Incoming).count();
                (*name, in_degree)
            })
            .collect();

        let mut order = Vec::with_capacity(graph.len());
        let mut wave_count = 0;
        while !remaining.is_empty() {
            // BTreeMap iteration makes each wave sorted by name.
            let wave: Vec<&TestName> = remaining
                .iter()
                .filter(|&(_, &in_degree)| in_degree == 0)
                .map(|(name, _)| *name)
                .collect();
            if wave.is_empty() {
                return Err(Self::cycle_error(&dag));
            }

            for name in &wave {
                remaining.remove(name);
                for dependent in dag.neighbors_directed(nodes[name], Direction::Outgoing) {
                    if let Some(in_degree) = remaining.get_mut(dag[dependent]) {
                        *in_degree -= 1;
                    }
                }
            }
            wave_count += 1;
            order.extend(wave.into_iter().cloned());
        }

        tracing::debug!(
            "ordered {} tests in {wave_count} waves: {}",
            order.len(),
            order.iter().map(TestName::as_str).collect::<Vec<_>>().join(", "),
        );
        Ok(Self { order, wave_count })
    }

    /// Returns the tests in execution order.
    pub fn as_slice(&self) -> &[TestName] {
        &self.order
    }

    /// Iterates over the tests in execution order.
    pub fn iter(&self) -> std::slice::Iter<'_, TestName> {
        self.order.iter()
    }

    /// Returns the number of tests.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns true if there are no tests to run.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Returns the number of waves the order was computed in.
    pub fn wave_count(&self) -> usize {
        self.wave_count
    }

    /// Reports all cycles in the graph, using the kosaraju algorithm to find strongly connected
    /// components.
    fn cycle_error(dag: &DiGraph<&TestName, ()>) -> CyclicDependencyError {
        let mut cycles: Vec<Vec<TestName>> = kosaraju_scc(dag)
            .into_iter()
            .filter(|scc| match scc.as_slice() {
                [ix] => dag.contains_edge(*ix, *ix),
                _ => true,
            })
            .map(|scc| {
                let mut names: Vec<TestName> = scc.iter().map(|ix| dag[*ix].clone()).collect();
                names.sort();
                names
            })
            .collect();
        cycles.sort();
        CyclicDependencyError::new(cycles)
    }
}

impl<'a> IntoIterator for &'a ExecutionOrder {
    type Item = &'a TestName;
    type IntoIter = std::slice::Iter<'a, TestName>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
