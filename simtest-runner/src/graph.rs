// Copyright (c) The simtest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The restart-dependency relation between tests.

use crate::{
    catalog::{TestCatalog, TestName},
    errors::{CyclicDependencyError, DependencyError},
    schedule::ExecutionOrder,
};
use std::collections::BTreeMap;

/// Maps every test in a run to the test it restarts from, if any.
///
/// Built by closing a set of requested tests over their restart prerequisites, so every referenced
/// prerequisite is itself a key. Acyclicity is checked by [`Self::execution_order`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DependencyGraph {
    restart_from: BTreeMap<TestName, Option<TestName>>,
}

impl DependencyGraph {
    /// Builds the graph for `leaf_tests` and everything they transitively restart from.
    pub fn build(
        catalog: &TestCatalog,
        leaf_tests: impl IntoIterator<Item = TestName>,
    ) -> Result<Self, DependencyError> {
        // Maps unresolved names to the test that referenced them (None for requested tests).
        let mut frontier: BTreeMap<TestName, Option<TestName>> = leaf_tests
            .into_iter()
            .map(|name| (name, None))
            .collect();
        let mut restart_from = BTreeMap::new();

        while let Some((name, referenced_by)) = frontier.pop_first() {
            if restart_from.contains_key(&name) {
                continue;
            }
            if !catalog.exists(&name) {
                return Err(match referenced_by {
                    None => DependencyError::UnknownTest { name },
                    Some(referenced_by) => DependencyError::MissingTest {
                        name,
                        referenced_by,
                    },
                });
            }

            let prerequisite = catalog.definition(&name)?.restart_from()?;
            if let Some(prerequisite) = &prerequisite {
                tracing::debug!("test `{name}` restarts from `{prerequisite}`");
                if !restart_from.contains_key(prerequisite) {
                    frontier
                        .entry(prerequisite.clone())
                        .or_insert_with(|| Some(name.clone()));
                }
            }
            restart_from.insert(name, prerequisite);
        }

        Ok(Self { restart_from })
    }

    /// Creates a graph from explicit `(test, restart_from)` pairs.
    ///
    /// Every prerequisite must also appear as a test.
    pub fn from_edges(
        edges: impl IntoIterator<Item = (TestName, Option<TestName>)>,
    ) -> Result<Self, DependencyError> {
        let restart_from: BTreeMap<_, _> = edges.into_iter().collect();
        for (name, prerequisite) in &restart_from {
            if let Some(prerequisite) = prerequisite
                && !restart_from.contains_key(prerequisite)
            {
                return Err(DependencyError::MissingTest {
                    name: prerequisite.clone(),
                    referenced_by: name.clone(),
                });
            }
        }
        Ok(Self { restart_from })
    }

    /// Iterates over the tests in the graph, sorted by name.
    pub fn tests(&self) -> impl ExactSizeIterator<Item = &TestName> {
        self.restart_from.keys()
    }

    /// Iterates over `(test, restart_from)` pairs, sorted by test name.
    pub fn iter(&self) -> impl Iterator<Item = (&TestName, Option<&TestName>)> {
        self.restart_from
            .iter()
            .map(|(name, prerequisite)| (name, prerequisite.as_ref()))
    }

    /// Returns the test that `name` restarts from.
    ///
    /// Returns `None` if the test has no prerequisite or is not in the graph.
    pub fn restart_from(&self, name: &TestName) -> Option<&TestName> {
        self.restart_from.get(name).and_then(Option::as_ref)
    }

    /// Returns true if `name` is part of this graph.
    pub fn contains(&self, name: &TestName) -> bool {
        self.restart_from.contains_key(name)
    }

    /// Returns the number of tests in the graph.
    pub fn len(&self) -> usize {
        self.restart_from.len()
    }

    /// Returns true if the graph has no tests.
    pub fn is_empty(&self) -> bool {
        self.restart_from.is_empty()
    }

    /// Computes a deterministic execution order in which prerequisites come first.
    pub fn execution_order(&self) -> Result<ExecutionOrder, CyclicDependencyError> {
        ExecutionOrder::compute(self)
    }
}
