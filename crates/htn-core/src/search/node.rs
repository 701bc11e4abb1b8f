// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Search nodes and the arena that owns them.

use std::hash::{Hash, Hasher};

use rustc_hash::FxHasher;

use crate::bitset::BitSet;
use crate::heuristic::NodeAnnotation;
use crate::model::{Model, TaskRef};

/// Index of a node in its [`NodeArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeHandle(usize);

impl NodeHandle {
    /// Position in the arena.
    pub fn index(self) -> usize {
        self.0
    }
}

/// What produced a node from its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transition {
    /// Operator (local index) applied to the parent's state.
    Operator(usize),
    /// Decomposition (local index) of the parent's first task.
    Decomposition(usize),
}

/// One HTN search node: a state plus the ordered tasks still to be done.
#[derive(Debug, Clone)]
pub struct SearchNode {
    /// Facts currently true.
    pub state: BitSet,
    /// Remaining tasks, first task at index 0.
    pub task_network: Vec<TaskRef>,
    /// Parent node; `None` for the root.
    pub parent: Option<NodeHandle>,
    /// Inducing operator or decomposition; `None` for the root.
    pub transition: Option<Transition>,
    /// Accumulated operator cost.
    pub g: u64,
    /// Heuristic value (`f64::INFINITY` marks a dead end).
    pub h: f64,
    /// `g + h`.
    pub f: f64,
    /// Generation order; strictly increasing across a search.
    pub sequence: u64,
    /// Number of transitions from the root.
    pub depth: u32,
    /// Per-node heuristic bookkeeping.
    pub annotation: NodeAnnotation,
}

impl SearchNode {
    /// Root node of `model`.
    pub fn root(model: &Model) -> Self {
        Self {
            state: model.initial_state().clone(),
            task_network: model.initial_tn().to_vec(),
            parent: None,
            transition: None,
            g: 0,
            h: 0.0,
            f: 0.0,
            sequence: 0,
            depth: 0,
            annotation: NodeAnnotation::None,
        }
    }

    /// Whether the task network is empty and every goal fact holds.
    pub fn is_goal(&self, model: &Model) -> bool {
        self.task_network.is_empty() && model.goals().is_subset(&self.state)
    }

    /// Closed-list key over the state words and the whole task network.
    pub fn revisit_key(&self) -> u64 {
        let mut hasher = FxHasher::default();
        self.state.as_words().hash(&mut hasher);
        self.task_network.hash(&mut hasher);
        hasher.finish()
    }

    /// Children reachable through the first task, unevaluated.
    ///
    /// An empty task network has no children. An inapplicable first operator
    /// yields none either; an abstract first task yields one child per
    /// applicable decomposition, in model order.
    pub fn successors(&self, model: &Model, handle: NodeHandle) -> Vec<SearchNode> {
        let Some((&first, rest)) = self.task_network.split_first() else {
            return Vec::new();
        };
        let child = |state: BitSet, task_network: Vec<TaskRef>, g: u64, t: Transition| SearchNode {
            state,
            task_network,
            parent: Some(handle),
            transition: Some(t),
            g,
            h: 0.0,
            f: 0.0,
            sequence: 0,
            depth: self.depth + 1,
            annotation: NodeAnnotation::None,
        };
        match first {
            TaskRef::Operator(i) => {
                let op = &model.operators()[i];
                if !op.applicable(&self.state) {
                    return Vec::new();
                }
                vec![child(
                    op.apply(&self.state),
                    rest.to_vec(),
                    self.g + u64::from(op.cost),
                    Transition::Operator(i),
                )]
            }
            TaskRef::Abstract(i) => model.abstract_tasks()[i]
                .decompositions
                .iter()
                .map(|&d| (d, &model.decompositions()[d]))
                .filter(|(_, dec)| dec.applicable(&self.state))
                .map(|(d, dec)| {
                    let mut tn = Vec::with_capacity(dec.task_network.len() + rest.len());
                    tn.extend_from_slice(&dec.task_network);
                    tn.extend_from_slice(rest);
                    child(self.state.clone(), tn, self.g, Transition::Decomposition(d))
                })
                .collect(),
        }
    }
}

/// Owns every node of a search; parents are referenced by [`NodeHandle`].
#[derive(Debug, Default)]
pub struct NodeArena {
    nodes: Vec<SearchNode>,
}

impl NodeArena {
    /// Empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `node` and returns its handle.
    pub fn push(&mut self, node: SearchNode) -> NodeHandle {
        self.nodes.push(node);
        NodeHandle(self.nodes.len() - 1)
    }

    /// Node behind `handle`.
    pub fn get(&self, handle: NodeHandle) -> &SearchNode {
        &self.nodes[handle.0]
    }

    /// Mutable node behind `handle`.
    pub fn get_mut(&mut self, handle: NodeHandle) -> &mut SearchNode {
        &mut self.nodes[handle.0]
    }

    /// Number of stored nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the arena is empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Operators applied on the path from the root to `handle`, in order.
    pub fn extract_plan(&self, handle: NodeHandle) -> Vec<usize> {
        let mut plan = Vec::new();
        let mut cursor = Some(handle);
        while let Some(h) = cursor {
            let node = self.get(h);
            if let Some(Transition::Operator(op)) = node.transition {
                plan.push(op);
            }
            cursor = node.parent;
        }
        plan.reverse();
        plan
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::model::ModelBuilder;

    fn model() -> Model {
        let mut b = ModelBuilder::new();
        let p = b.add_fact("p");
        let q = b.add_fact("q");
        let set_q = b.add_operator("set-q", 2, [p], [], [q], [p]);
        let t = b.add_abstract_task("t");
        b.add_decomposition("needs-q", t, [q], [], [TaskRef::Operator(set_q)]);
        b.add_decomposition("plain", t, [], [], [TaskRef::Operator(set_q)]);
        b.set_initial_state([p]);
        b.set_goals([q]);
        b.set_initial_tn([TaskRef::Abstract(t), TaskRef::Operator(set_q)]);
        b.build().unwrap()
    }

    #[test]
    fn decomposition_prepends_network_and_keeps_state() {
        let m = model();
        let root = SearchNode::root(&m);
        let kids = root.successors(&m, NodeHandle(0));
        assert_eq!(kids.len(), 1, "`needs-q` is not applicable");
        let kid = &kids[0];
        assert_eq!(kid.transition, Some(Transition::Decomposition(1)));
        assert_eq!(
            kid.task_network,
            vec![TaskRef::Operator(0), TaskRef::Operator(0)]
        );
        assert_eq!(kid.state, root.state);
        assert_eq!(kid.g, 0);
        assert_eq!(kid.depth, 1);
    }

    #[test]
    fn operator_consumes_first_task_and_cost() {
        let m = model();
        let mut arena = NodeArena::new();
        let root = arena.push(SearchNode::root(&m));
        let dec = arena.get(root).successors(&m, root).remove(0);
        let dec = arena.push(dec);
        let op = arena.get(dec).successors(&m, dec).remove(0);
        assert_eq!(op.g, 2);
        assert_eq!(op.task_network, vec![TaskRef::Operator(0)]);
        assert!(op.state.contains(1) && !op.state.contains(0));
        let op = arena.push(op);
        // `set-q` needs `p`, which it deleted.
        assert!(arena.get(op).successors(&m, op).is_empty());
        assert_eq!(arena.extract_plan(op), vec![0]);
    }

    #[test]
    fn revisit_key_separates_task_networks() {
        let m = model();
        let a = SearchNode::root(&m);
        let mut b = a.clone();
        b.task_network.reverse();
        assert_ne!(a.revisit_key(), b.revisit_key());
        b.task_network.reverse();
        assert_eq!(a.revisit_key(), b.revisit_key());
    }
}
