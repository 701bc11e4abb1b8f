// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! LM-cut over the composition graph.
//!
//! Each round computes hmax with the remaining operator weights, walks the
//! supporter chain back from the goal to the first operator nodes that still
//! carry weight, and charges the cheapest of them to every member of that cut.
//! A round zeroes at least one operator, so there are at most `O` rounds.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::bitset::BitSet;
use crate::graph::{AndOrGraph, GraphType, NodeType};
use crate::model::{Model, TaskRef};

const INFINITE: u64 = u64::MAX;

/// Outcome of one LM-cut evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LmCutResult {
    /// Sum of all cut costs; `None` when the goal is relaxed-unreachable.
    pub value: Option<u64>,
    /// Cost of each cut in extraction order.
    pub cuts: Vec<u64>,
}

struct Hmax {
    cost: Vec<u64>,
    supporter: Vec<Option<usize>>,
}

/// LM-cut evaluator bound to one model's composition graph.
#[derive(Debug, Clone)]
pub struct LmCut {
    graph: AndOrGraph,
    goal: usize,
    base_weights: Vec<u64>,
}

impl LmCut {
    /// Builds the composition graph of `model`.
    pub fn new(model: &Model) -> Self {
        let graph = AndOrGraph::new(model, GraphType::Composition);
        let goal = graph
            .goal_node()
            .unwrap_or_else(|| model.num_components() + model.num_operators());
        let base_weights = (0..graph.len())
            .map(|id| graph.node(id).map_or(0, |n| n.weight))
            .collect();
        Self {
            graph,
            goal,
            base_weights,
        }
    }

    /// The underlying composition graph.
    pub fn graph(&self) -> &AndOrGraph {
        &self.graph
    }

    /// Nodes the goal depends on for `state` and task network `tn`.
    fn goal_predecessors(&self, model: &Model, tn: &[TaskRef]) -> Vec<usize> {
        model
            .goals()
            .iter_ones()
            .chain(tn.iter().map(|&t| self.graph.task_node(model, t)))
            .collect()
    }

    /// Relaxed max-cost of reaching the goal, with the original operator costs.
    pub fn hmax(&self, model: &Model, state: &BitSet, tn: &[TaskRef]) -> Option<u64> {
        let goal_preds = self.goal_predecessors(model, tn);
        let h = self.hmax_pass(state, &goal_preds, &self.base_weights);
        let c = h.cost[self.goal];
        (c != INFINITE).then_some(c)
    }

    /// Runs LM-cut for `state` and task network `tn`.
    pub fn compute(&self, model: &Model, state: &BitSet, tn: &[TaskRef]) -> LmCutResult {
        let goal_preds = self.goal_predecessors(model, tn);
        let mut weights = self.base_weights.clone();
        let mut result = LmCutResult {
            value: Some(0),
            cuts: Vec::new(),
        };
        loop {
            let h = self.hmax_pass(state, &goal_preds, &weights);
            match h.cost[self.goal] {
                INFINITE => {
                    result.value = None;
                    return result;
                }
                0 => return result,
                _ => {}
            }
            let cut = self.extract_cut(&h, &goal_preds, &weights);
            let Some(m) = cut.iter().map(|&c| weights[c]).min() else {
                return result;
            };
            for &c in &cut {
                weights[c] -= m;
            }
            result.cuts.push(m);
            result.value = result.value.map(|v| v.saturating_add(m));
            debug_assert!(result.cuts.len() <= model.num_operators());
        }
    }

    /// Generalised Dijkstra: INIT facts cost 0, AND = weight + max predecessor,
    /// OR = min predecessor. Records the last (costliest) predecessor of each
    /// AND node as its supporter.
    fn hmax_pass(&self, state: &BitSet, goal_preds: &[usize], weights: &[u64]) -> Hmax {
        let n = self.graph.len();
        let mut cost = vec![INFINITE; n];
        let mut supporter = vec![None; n];
        let mut remaining = vec![0usize; n];
        let mut goal_multiplicity = vec![0usize; n];
        let mut done = BitSet::new(n);
        let mut heap = BinaryHeap::new();

        for &p in goal_preds {
            goal_multiplicity[p] += 1;
        }
        for node in self.graph.nodes() {
            if node.node_type == NodeType::And {
                remaining[node.id] = node.predecessors.len();
                if node.id != self.goal && node.predecessors.is_empty() {
                    cost[node.id] = weights[node.id];
                    heap.push(Reverse((cost[node.id], node.id)));
                }
            }
        }
        remaining[self.goal] = goal_preds.len();
        if goal_preds.is_empty() {
            cost[self.goal] = 0;
            heap.push(Reverse((0, self.goal)));
        }
        for f in state.iter_ones().filter(|&f| f < self.graph.num_facts()) {
            cost[f] = 0;
            heap.push(Reverse((0, f)));
        }

        while let Some(Reverse((c, id))) = heap.pop() {
            if c > cost[id] || !done.insert(id) {
                continue;
            }
            let successors = self.graph.node(id).map(|n| n.successors.as_slice());
            let goal_edges = std::iter::repeat_n(self.goal, goal_multiplicity[id]);
            for s in successors.unwrap_or_default().iter().copied().chain(goal_edges) {
                if done.contains(s) {
                    continue;
                }
                let is_and = s == self.goal
                    || self.graph.node(s).is_some_and(|n| n.node_type == NodeType::And);
                if is_and {
                    remaining[s] -= 1;
                    if remaining[s] == 0 {
                        cost[s] = weights[s].saturating_add(c);
                        supporter[s] = Some(id);
                        heap.push(Reverse((cost[s], s)));
                    }
                } else if c < cost[s] {
                    cost[s] = c;
                    heap.push(Reverse((c, s)));
                }
            }
        }
        Hmax { cost, supporter }
    }

    /// Backtracks from the goal along hmax-tight edges to the weighted frontier.
    fn extract_cut(&self, h: &Hmax, goal_preds: &[usize], weights: &[u64]) -> Vec<usize> {
        let mut cut = Vec::new();
        let mut visited = BitSet::new(self.graph.len());
        let mut stack = vec![self.goal];
        while let Some(id) = stack.pop() {
            if !visited.insert(id) || h.cost[id] == 0 {
                continue;
            }
            if id == self.goal {
                stack.extend(h.supporter[id].or_else(|| goal_preds.first().copied()));
                continue;
            }
            let Some(node) = self.graph.node(id) else {
                continue;
            };
            match node.node_type {
                NodeType::And if weights[id] > 0 => cut.push(id),
                NodeType::And => stack.extend(h.supporter[id]),
                NodeType::Or => stack.extend(
                    node.predecessors
                        .iter()
                        .copied()
                        .filter(|&p| h.cost[p] == h.cost[id]),
                ),
                NodeType::Init => {}
            }
        }
        cut
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::model::ModelBuilder;

    /// p --a(2)--> q --b(3)--> g, task network [a, b].
    fn two_step() -> Model {
        let mut b = ModelBuilder::new();
        let p = b.add_fact("p");
        let q = b.add_fact("q");
        let g = b.add_fact("g");
        let a = b.add_operator("a", 2, [p], [], [q], []);
        let bb = b.add_operator("b", 3, [q], [], [g], []);
        b.set_initial_state([p]);
        b.set_goals([g]);
        b.set_initial_tn([TaskRef::Operator(a), TaskRef::Operator(bb)]);
        b.build().unwrap()
    }

    #[test]
    fn sequential_costs_are_cut_separately() {
        let m = two_step();
        let lmcut = LmCut::new(&m);
        assert_eq!(lmcut.hmax(&m, m.initial_state(), m.initial_tn()), Some(5));
        let r = lmcut.compute(&m, m.initial_state(), m.initial_tn());
        assert_eq!(r.value, Some(5));
        assert_eq!(r.cuts, vec![3, 2]);
    }

    #[test]
    fn satisfied_goal_with_empty_network_is_zero() {
        let m = two_step();
        let lmcut = LmCut::new(&m);
        let state = BitSet::from_indices(m.num_facts(), [2]);
        let r = lmcut.compute(&m, &state, &[]);
        assert_eq!(r, LmCutResult { value: Some(0), cuts: vec![] });
    }

    #[test]
    fn unreachable_goal_is_infinite() {
        let m = two_step();
        let lmcut = LmCut::new(&m);
        let empty = BitSet::new(m.num_facts());
        assert_eq!(lmcut.compute(&m, &empty, m.initial_tn()).value, None);
        assert_eq!(lmcut.hmax(&m, &empty, m.initial_tn()), None);
    }
}
