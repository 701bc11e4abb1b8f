// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Task-decomposition-graph cost estimate.

use std::collections::VecDeque;

use tracing::{debug, instrument};

use super::{Heuristic, HeuristicStats};
use crate::bitset::BitSet;
use crate::graph::{AndOrGraph, NodeType, TdgWeighting};
use crate::model::{Model, TaskRef};
use crate::search::SearchNode;

/// Marker for "cannot be fully decomposed".
pub const TDG_INFINITE: u64 = u64::MAX;

/// Scalar fixpoint over `graph`: OR takes the cheapest predecessor, AND adds
/// its own weight to the sum of its predecessors (repeated subtasks count
/// repeatedly).
///
/// Entries start at [`TDG_INFINITE`] and only decrease, so recursive methods
/// converge.
pub fn tdg_table(graph: &AndOrGraph) -> Vec<u64> {
    let mut cost = vec![TDG_INFINITE; graph.len()];
    let mut queued = BitSet::new(graph.len());
    let mut queue: VecDeque<usize> = graph.nodes().map(|n| n.id).collect();
    for &id in &queue {
        queued.insert(id);
    }
    let mut updates = 0usize;
    while let Some(id) = queue.pop_front() {
        queued.remove(id);
        let Some(node) = graph.node(id) else {
            continue;
        };
        let new = match node.node_type {
            NodeType::Or => node
                .predecessors
                .iter()
                .map(|&p| cost[p])
                .min()
                .unwrap_or(TDG_INFINITE),
            NodeType::And => node
                .predecessors
                .iter()
                .try_fold(node.weight, |acc, &p| {
                    (cost[p] != TDG_INFINITE).then(|| acc.saturating_add(cost[p]))
                })
                .unwrap_or(TDG_INFINITE),
            NodeType::Init => 0,
        };
        if new < cost[id] {
            cost[id] = new;
            updates += 1;
            for &s in &node.successors {
                if queued.insert(s) {
                    queue.push_back(s);
                }
            }
        }
    }
    debug!(nodes = graph.len(), updates, "tdg fixpoint converged");
    cost
}

/// Sum of decomposition costs over a node's task network.
#[derive(Debug, Clone)]
pub struct TdgCost {
    table: Vec<u64>,
    stats: HeuristicStats,
}

impl TdgCost {
    /// Computes the static table for `model`.
    #[instrument(skip(model), fields(components = model.num_components()))]
    pub fn new(model: &Model, weighting: TdgWeighting) -> Self {
        let graph = AndOrGraph::tdg(model, weighting);
        Self {
            table: tdg_table(&graph),
            stats: HeuristicStats::default(),
        }
    }

    /// Table entry of global id `id`.
    pub fn cost(&self, id: usize) -> u64 {
        self.table.get(id).copied().unwrap_or(TDG_INFINITE)
    }

    /// Estimate for `tn`; `f64::INFINITY` when some task cannot be decomposed.
    pub fn network_cost(&self, model: &Model, tn: &[TaskRef]) -> f64 {
        tn.iter()
            .try_fold(0u64, |acc, &t| {
                let c = self.cost(model.task_ref_gid(t));
                (c != TDG_INFINITE).then(|| acc.saturating_add(c))
            })
            .map_or(f64::INFINITY, |v| v as f64)
    }
}

impl Heuristic for TdgCost {
    fn name(&self) -> &'static str {
        "tdg"
    }

    fn initialize(&mut self, model: &Model, root: &mut SearchNode) -> f64 {
        let h = self.network_cost(model, &root.task_network);
        self.stats.record(h);
        h
    }

    fn evaluate(&mut self, model: &Model, _parent: &SearchNode, child: &mut SearchNode) -> f64 {
        let h = self.network_cost(model, &child.task_network);
        self.stats.record(h);
        h
    }

    fn stats(&self) -> &HeuristicStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::model::ModelBuilder;

    /// `t` -> `[a, a]` or `[t, b]`; `u` has no methods.
    fn recursive() -> Model {
        let mut b = ModelBuilder::new();
        let a = b.add_operator("a", 5, [], [], [], []);
        let bop = b.add_operator("b", 1, [], [], [], []);
        let t = b.add_abstract_task("t");
        let u = b.add_abstract_task("u");
        b.add_decomposition(
            "twice-a",
            t,
            [],
            [],
            [TaskRef::Operator(a), TaskRef::Operator(a)],
        );
        b.add_decomposition(
            "again",
            t,
            [],
            [],
            [TaskRef::Abstract(t), TaskRef::Operator(bop)],
        );
        b.set_initial_tn([TaskRef::Abstract(t), TaskRef::Abstract(u)]);
        b.build().unwrap()
    }

    #[test]
    fn unit_weights_count_primitive_steps() {
        let m = recursive();
        let h = TdgCost::new(&m, TdgWeighting::Unit);
        assert_eq!(h.cost(m.task_gid(0)), 2);
        assert_eq!(h.cost(m.operator_gid(1)), 1);
        assert_eq!(h.cost(m.task_gid(1)), TDG_INFINITE);
        assert!(h.network_cost(&m, m.initial_tn()).is_infinite());
        assert!((h.network_cost(&m, &[TaskRef::Abstract(0)]) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn cost_weights_pick_the_cheaper_recursion() {
        let m = recursive();
        let h = TdgCost::new(&m, TdgWeighting::Cost);
        // [a, a] costs 10; [t, b] costs cost(t) + 1, so t settles at 10.
        assert_eq!(h.cost(m.task_gid(0)), 10);
        assert_eq!(h.cost(m.decomposition_gid(1)), 11);
    }

    #[test]
    fn table_is_a_fixpoint() {
        let m = recursive();
        let graph = AndOrGraph::tdg(&m, TdgWeighting::Cost);
        let table = tdg_table(&graph);
        assert_eq!(tdg_table(&graph), table);
    }
}
