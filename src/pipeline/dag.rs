// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 toolflow contributors

//! DAG (Directed Acyclic Graph) of step dependencies
//!
//! Validates a step set (unique names, known dependencies, no cycles) and
//! answers the scheduler's questions about which steps may run next.

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::{HashMap, HashSet};

use crate::errors::ToolflowError;
use crate::pipeline::StepDefinition;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    InProgress,
    Done,
}

/// Dependency graph over a pipeline's steps
///
/// Edges point from a dependency to the step that depends on it.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    graph: DiGraph<String, ()>,
    name_to_index: HashMap<String, NodeIndex>,
    /// Step names in declaration order
    names: Vec<String>,
}

impl DependencyGraph {
    /// Build and validate the graph for a step set
    pub fn build(steps: &[StepDefinition]) -> Result<Self, ToolflowError> {
        let mut graph = DiGraph::new();
        let mut name_to_index = HashMap::new();
        let mut names = Vec::with_capacity(steps.len());

        for step in steps {
            if name_to_index.contains_key(&step.name) {
                return Err(ToolflowError::DuplicateStepName {
                    step: step.name.clone(),
                });
            }
            let node = graph.add_node(step.name.clone());
            name_to_index.insert(step.name.clone(), node);
            names.push(step.name.clone());
        }

        for step in steps {
            let step_node = name_to_index[&step.name];

            for dep_name in &step.depends_on {
                let dep_node = name_to_index.get(dep_name).ok_or_else(|| {
                    ToolflowError::UnknownDependency {
                        step: step.name.clone(),
                        dependency: dep_name.clone(),
                    }
                })?;

                if !graph.contains_edge(*dep_node, step_node) {
                    graph.add_edge(*dep_node, step_node, ());
                }
            }
        }

        let dag = Self {
            graph,
            name_to_index,
            names,
        };

        dag.validate_acyclic()?;

        Ok(dag)
    }

    /// Depth-first search over dependency edges; reaching a node that is still
    /// in progress closes a cycle.
    fn validate_acyclic(&self) -> Result<(), ToolflowError> {
        let mut marks: HashMap<NodeIndex, Mark> = HashMap::new();
        let mut path: Vec<NodeIndex> = Vec::new();

        for name in &self.names {
            let node = self.name_to_index[name];
            if !marks.contains_key(&node) {
                self.visit(node, &mut marks, &mut path)?;
            }
        }

        Ok(())
    }

    fn visit(
        &self,
        node: NodeIndex,
        marks: &mut HashMap<NodeIndex, Mark>,
        path: &mut Vec<NodeIndex>,
    ) -> Result<(), ToolflowError> {
        marks.insert(node, Mark::InProgress);
        path.push(node);

        for dep in self.sorted_neighbors(node, Direction::Incoming) {
            match marks.get(&dep) {
                Some(Mark::InProgress) => {
                    let start = path.iter().position(|n| *n == dep).unwrap_or(0);
                    let mut steps: Vec<String> =
                        path[start..].iter().map(|n| self.graph[*n].clone()).collect();
                    steps.push(self.graph[dep].clone());
                    return Err(ToolflowError::CyclicDependency { steps });
                }
                Some(Mark::Done) => {}
                None => self.visit(dep, marks, path)?,
            }
        }

        path.pop();
        marks.insert(node, Mark::Done);
        Ok(())
    }

    /// Neighbors in declaration order, so traversal and output are stable
    fn sorted_neighbors(&self, node: NodeIndex, direction: Direction) -> Vec<NodeIndex> {
        let mut neighbors: Vec<NodeIndex> =
            self.graph.neighbors_directed(node, direction).collect();
        neighbors.sort();
        neighbors
    }

    /// Steps that may start now: every dependency succeeded and the step has
    /// not finished yet. Returned in declaration order.
    pub fn ready_steps(
        &self,
        completed_success: &HashSet<String>,
        completed_any: &HashSet<String>,
    ) -> Vec<String> {
        self.names
            .iter()
            .filter(|name| !completed_any.contains(*name))
            .filter(|name| {
                self.sorted_neighbors(self.name_to_index[*name], Direction::Incoming)
                    .into_iter()
                    .all(|dep| completed_success.contains(&self.graph[dep]))
            })
            .cloned()
            .collect()
    }

    /// Unfinished steps with at least one dependency that finished without
    /// succeeding. Such steps can never become ready.
    pub fn blocked_steps(
        &self,
        completed_success: &HashSet<String>,
        completed_any: &HashSet<String>,
    ) -> Vec<String> {
        self.names
            .iter()
            .filter(|name| !completed_any.contains(*name))
            .filter(|name| {
                self.sorted_neighbors(self.name_to_index[*name], Direction::Incoming)
                    .into_iter()
                    .any(|dep| {
                        let dep = &self.graph[dep];
                        completed_any.contains(dep) && !completed_success.contains(dep)
                    })
            })
            .cloned()
            .collect()
    }

    /// Step names in a dependency-respecting order, ties by declaration order
    pub fn topological_order(&self) -> Vec<String> {
        let mut done: HashSet<String> = HashSet::new();
        let mut order = Vec::with_capacity(self.names.len());

        while order.len() < self.names.len() {
            let Some(next) = self.ready_steps(&done, &done).into_iter().next() else {
                break;
            };
            done.insert(next.clone());
            order.push(next);
        }

        order
    }

    /// Get dependencies for a step (steps that must run before it)
    pub fn dependencies(&self, step_name: &str) -> Option<Vec<String>> {
        let node = self.name_to_index.get(step_name)?;
        Some(
            self.sorted_neighbors(*node, Direction::Incoming)
                .into_iter()
                .map(|n| self.graph[n].clone())
                .collect(),
        )
    }

    /// Get dependents for a step (steps that depend on it)
    pub fn dependents(&self, step_name: &str) -> Option<Vec<String>> {
        let node = self.name_to_index.get(step_name)?;
        Some(
            self.sorted_neighbors(*node, Direction::Outgoing)
                .into_iter()
                .map(|n| self.graph[n].clone())
                .collect(),
        )
    }

    /// Check if step A depends (directly or transitively) on step B
    pub fn depends_on(&self, step_a: &str, step_b: &str) -> bool {
        let Some(node_a) = self.name_to_index.get(step_a) else {
            return false;
        };
        let Some(node_b) = self.name_to_index.get(step_b) else {
            return false;
        };

        step_a != step_b && petgraph::algo::has_path_connecting(&self.graph, *node_b, *node_a, None)
    }

    pub fn contains(&self, step_name: &str) -> bool {
        self.name_to_index.contains_key(step_name)
    }

    /// Step names in declaration order
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    fn edges(&self) -> Vec<(&str, &str)> {
        let mut edges: Vec<(NodeIndex, NodeIndex)> = self
            .graph
            .edge_indices()
            .filter_map(|e| self.graph.edge_endpoints(e))
            .collect();
        edges.sort_by_key(|(from, to)| (*to, *from));

        edges
            .into_iter()
            .map(|(from, to)| (self.graph[from].as_str(), self.graph[to].as_str()))
            .collect()
    }

    /// Generate Mermaid diagram of the DAG
    pub fn to_mermaid(&self) -> String {
        let mut out = String::from("graph TD\n");

        for (i, name) in self.names.iter().enumerate() {
            out.push_str(&format!("    s{}[\"{}\"]\n", i, name.replace('"', "#quot;")));
        }

        for edge in self.graph.edge_indices() {
            if let Some((from, to)) = self.graph.edge_endpoints(edge) {
                out.push_str(&format!("    s{} --> s{}\n", from.index(), to.index()));
            }
        }

        out
    }

    /// Generate DOT diagram of the DAG
    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph pipeline {\n");
        out.push_str("    rankdir=TB;\n");
        out.push_str("    node [shape=box, style=rounded];\n\n");

        for (from, to) in self.edges() {
            out.push_str(&format!("    \"{}\" -> \"{}\";\n", from, to));
        }

        // Isolated nodes have no edge to introduce them
        for name in &self.names {
            let node = self.name_to_index[name];
            if self.graph.neighbors_undirected(node).next().is_none() {
                out.push_str(&format!("    \"{}\";\n", name));
            }
        }

        out.push_str("}\n");
        out
    }

    /// Generate text representation of execution order
    pub fn to_text(&self, steps: &[StepDefinition]) -> String {
        let tools: HashMap<&str, &str> = steps
            .iter()
            .map(|s| (s.name.as_str(), s.tool.as_str()))
            .collect();

        let mut out = String::new();

        for (i, name) in self.topological_order().iter().enumerate() {
            let deps = self.dependencies(name).unwrap_or_default();
            let tool = tools.get(name.as_str()).copied().unwrap_or("?");

            out.push_str(&format!("{}. {} ({})", i + 1, name, tool));

            if !deps.is_empty() {
                out.push_str(&format!(" [depends: {}]", deps.join(", ")));
            }

            out.push('\n');
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_steps(steps: Vec<(&str, Vec<&str>)>) -> Vec<StepDefinition> {
        steps
            .into_iter()
            .map(|(name, deps)| StepDefinition::new(name, "lint", "scan").depends_on(deps))
            .collect()
    }

    fn set(names: &[&str]) -> HashSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_linear_dag() {
        let steps = make_steps(vec![("c", vec!["b"]), ("b", vec!["a"]), ("a", vec![])]);

        let dag = DependencyGraph::build(&steps).unwrap();
        assert_eq!(dag.topological_order(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_diamond_dag() {
        let steps = make_steps(vec![
            ("a", vec![]),
            ("b", vec!["a"]),
            ("c", vec!["a"]),
            ("d", vec!["b", "c"]),
        ]);

        let dag = DependencyGraph::build(&steps).unwrap();
        assert_eq!(dag.topological_order(), vec!["a", "b", "c", "d"]);
        assert_eq!(dag.dependencies("d").unwrap(), vec!["b", "c"]);
        assert_eq!(dag.dependents("a").unwrap(), vec!["b", "c"]);
    }

    #[test]
    fn test_circular_dependency_detection() {
        let steps = make_steps(vec![("a", vec!["b"]), ("b", vec!["a"])]);

        match DependencyGraph::build(&steps) {
            Err(ToolflowError::CyclicDependency { steps }) => {
                assert_eq!(steps, vec!["a", "b", "a"]);
            }
            other => panic!("expected cycle, got {:?}", other.map(|d| d.len())),
        }
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let steps = make_steps(vec![("ok", vec![]), ("loop", vec!["loop"])]);

        match DependencyGraph::build(&steps) {
            Err(ToolflowError::CyclicDependency { steps }) => {
                assert_eq!(steps, vec!["loop", "loop"]);
            }
            other => panic!("expected cycle, got {:?}", other.map(|d| d.len())),
        }
    }

    #[test]
    fn test_transitive_cycle_detection() {
        let steps = make_steps(vec![
            ("root", vec![]),
            ("a", vec!["root", "c"]),
            ("b", vec!["a"]),
            ("c", vec!["b"]),
        ]);

        let result = DependencyGraph::build(&steps);
        assert!(matches!(result, Err(ToolflowError::CyclicDependency { .. })));
    }

    #[test]
    fn test_unknown_dependency() {
        let steps = make_steps(vec![("a", vec!["nonexistent"])]);

        let result = DependencyGraph::build(&steps);
        assert!(matches!(
            result,
            Err(ToolflowError::UnknownDependency { ref step, ref dependency })
                if step == "a" && dependency == "nonexistent"
        ));
    }

    #[test]
    fn test_duplicate_step_name() {
        let steps = make_steps(vec![("a", vec![]), ("a", vec![])]);

        let result = DependencyGraph::build(&steps);
        assert!(matches!(result, Err(ToolflowError::DuplicateStepName { .. })));
    }

    #[test]
    fn test_repeated_dependency_is_one_edge() {
        let steps = make_steps(vec![("a", vec![]), ("b", vec!["a", "a"])]);

        let dag = DependencyGraph::build(&steps).unwrap();
        assert_eq!(dag.dependencies("b").unwrap(), vec!["a"]);
    }

    #[test]
    fn test_ready_steps() {
        let steps = make_steps(vec![("a", vec![]), ("b", vec!["a"]), ("c", vec![])]);
        let dag = DependencyGraph::build(&steps).unwrap();

        // Steps without dependencies are ready immediately
        assert_eq!(dag.ready_steps(&set(&[]), &set(&[])), vec!["a", "c"]);

        // Finished steps drop out; b waits for a to succeed
        assert_eq!(dag.ready_steps(&set(&[]), &set(&["a"])), vec!["c"]);
        assert_eq!(dag.ready_steps(&set(&["a"]), &set(&["a"])), vec!["b", "c"]);
        assert!(dag.ready_steps(&set(&["a", "b", "c"]), &set(&["a", "b", "c"])).is_empty());
    }

    #[test]
    fn test_blocked_steps() {
        let steps = make_steps(vec![
            ("a", vec![]),
            ("b", vec!["a"]),
            ("c", vec!["b"]),
            ("d", vec![]),
        ]);
        let dag = DependencyGraph::build(&steps).unwrap();

        // a failed: b is blocked, c only once b is finalized
        assert_eq!(dag.blocked_steps(&set(&[]), &set(&["a"])), vec!["b"]);
        assert_eq!(dag.blocked_steps(&set(&[]), &set(&["a", "b"])), vec!["c"]);
        assert!(dag.blocked_steps(&set(&["a"]), &set(&["a"])).is_empty());
    }

    #[test]
    fn test_depends_on_check() {
        let steps = make_steps(vec![("a", vec![]), ("b", vec!["a"]), ("c", vec!["b"])]);

        let dag = DependencyGraph::build(&steps).unwrap();

        assert!(dag.depends_on("c", "a")); // transitive
        assert!(dag.depends_on("c", "b")); // direct
        assert!(dag.depends_on("b", "a")); // direct
        assert!(!dag.depends_on("a", "c")); // reverse
        assert!(!dag.depends_on("a", "a"));
        assert!(!dag.depends_on("a", "missing"));
    }

    #[test]
    fn test_text_output() {
        let steps = make_steps(vec![("report", vec!["scan"]), ("scan", vec![])]);
        let dag = DependencyGraph::build(&steps).unwrap();

        insta::assert_snapshot!(dag.to_text(&steps).trim_end(), @r"
        1. scan (lint)
        2. report (lint) [depends: scan]
        ");
    }

    #[test]
    fn test_mermaid_and_dot_output() {
        let steps = make_steps(vec![("a", vec![]), ("b", vec!["a"]), ("solo", vec![])]);
        let dag = DependencyGraph::build(&steps).unwrap();

        let mermaid = dag.to_mermaid();
        assert!(mermaid.contains("graph TD"));
        assert!(mermaid.contains("s0[\"a\"]"));
        assert!(mermaid.contains("s0 --> s1"));

        let dot = dag.to_dot();
        assert!(dot.contains("\"a\" -> \"b\";"));
        assert!(dot.contains("    \"solo\";"));
        assert!(!dot.contains("    \"a\";"));
    }
}
