//! Constraint dependency graph.
//!
//! Provides `DependencyGraph`, which records which constraints must be
//! re-processed when a stat's base value changes. Nodes are `StatId`s; an
//! edge `dependency -> target` carries the id of the constraint on `target`
//! that reads `dependency`.
//!
//! Registration only guards against two-node cycles (see
//! [`DependencyGraph::has_edge`]). Longer cycles are accepted and can be
//! found after the fact with [`DependencyGraph::find_cycle`]; re-processing
//! never follows more than one edge, so they cannot loop.

use crate::constraint::ConstraintId;
use crate::stat_id::StatId;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::{HashMap, HashSet};

/// Directed graph of constraint dependencies.
///
/// # Examples
///
/// ```rust
/// use statfx::graph::DependencyGraph;
/// use statfx::StatId;
///
/// let max_hp = StatId::from_str("maxHp");
/// let hp = StatId::from_str("hp");
///
/// let mut graph = DependencyGraph::new();
/// assert!(graph.is_empty());
/// graph.add_node(max_hp.clone());
/// graph.add_node(hp.clone());
/// assert!(graph.contains_node(&hp));
/// assert!(!graph.has_edge(&max_hp, &hp));
/// ```
#[derive(Debug, Default)]
pub struct DependencyGraph {
    graph: DiGraph<StatId, ConstraintId>,
    node_map: HashMap<StatId, NodeIndex>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node if it doesn't exist and return its index.
    pub fn add_node(&mut self, stat_id: StatId) -> NodeIndex {
        if let Some(&idx) = self.node_map.get(&stat_id) {
            idx
        } else {
            let idx = self.graph.add_node(stat_id.clone());
            self.node_map.insert(stat_id, idx);
            idx
        }
    }

    /// Record that `constraint` on `target` reads `dependency`.
    ///
    /// Adding the same triple twice is a no-op.
    pub fn add_edge(&mut self, dependency: StatId, target: StatId, constraint: ConstraintId) {
        let from = self.add_node(dependency);
        let to = self.add_node(target);
        let exists = self
            .graph
            .edges_connecting(from, to)
            .any(|edge| *edge.weight() == constraint);
        if !exists {
            self.graph.add_edge(from, to, constraint);
        }
    }

    /// `true` if any constraint on `target` reads `dependency`.
    pub fn has_edge(&self, dependency: &StatId, target: &StatId) -> bool {
        match (self.node_map.get(dependency), self.node_map.get(target)) {
            (Some(&from), Some(&to)) => self.graph.find_edge(from, to).is_some(),
            _ => false,
        }
    }

    /// Remove the edge from `dependency` for `constraint`.
    pub fn remove_edge(&mut self, dependency: &StatId, constraint: ConstraintId) -> bool {
        let Some(&from) = self.node_map.get(dependency) else {
            return false;
        };
        let before = self.graph.edge_count();
        self.graph.retain_edges(|g, e| {
            g.edge_endpoints(e).map(|(s, _)| s) != Some(from) || g[e] != constraint
        });
        self.graph.edge_count() != before
    }

    /// Drop every edge carrying `constraint`.
    pub fn remove_constraint(&mut self, constraint: ConstraintId) {
        self.graph.retain_edges(|g, e| g[e] != constraint);
    }

    /// Constraints to re-process when `dependency` changes, in registration
    /// order.
    pub fn dependents_of(&self, dependency: &StatId) -> Vec<ConstraintId> {
        let Some(&idx) = self.node_map.get(dependency) else {
            return Vec::new();
        };
        let mut ids: Vec<ConstraintId> = self
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .map(|edge| *edge.weight())
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }

    pub fn contains_node(&self, stat_id: &StatId) -> bool {
        self.node_map.contains_key(stat_id)
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.edge_count() == 0
    }

    /// Find a dependency cycle, returned as a closed path `[a, b, ..., a]`.
    pub fn find_cycle(&self) -> Option<Vec<StatId>> {
        let mut visited = HashSet::new();
        let mut rec_stack = HashSet::new();

        for node_idx in self.graph.node_indices() {
            if !visited.contains(&node_idx) {
                let mut path = Vec::new();
                if let Some(cycle) =
                    self.dfs_cycle(node_idx, &mut visited, &mut rec_stack, &mut path)
                {
                    return Some(cycle);
                }
            }
        }
        None
    }

    fn dfs_cycle(
        &self,
        node: NodeIndex,
        visited: &mut HashSet<NodeIndex>,
        rec_stack: &mut HashSet<NodeIndex>,
        path: &mut Vec<NodeIndex>,
    ) -> Option<Vec<StatId>> {
        visited.insert(node);
        rec_stack.insert(node);
        path.push(node);

        for neighbor in self.graph.neighbors_directed(node, Direction::Outgoing) {
            if !visited.contains(&neighbor) {
                if let Some(cycle) = self.dfs_cycle(neighbor, visited, rec_stack, path) {
                    return Some(cycle);
                }
            } else if rec_stack.contains(&neighbor) {
                let start = path.iter().position(|&n| n == neighbor).unwrap_or(0);
                let mut cycle: Vec<StatId> =
                    path[start..].iter().map(|&n| self.graph[n].clone()).collect();
                cycle.push(self.graph[neighbor].clone());
                return Some(cycle);
            }
        }

        rec_stack.remove(&node);
        path.pop();
        None
    }
}
