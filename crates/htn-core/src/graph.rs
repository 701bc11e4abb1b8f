// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! AND/OR graphs over model components.
//!
//! Nodes are indexed by global id, so landmark tables and cost tables built on
//! top of a graph can be read back with model ids directly. Modes that need
//! extra bookkeeping nodes (operator recomposition, the LM-cut goal) allocate
//! them past the model's id space:
//!
//! ```text
//! [0, total)              model components (facts, operators, tasks, methods)
//! [total, total + O)      recomposition node of operator i at total + i
//! total + O               artificial goal (composition graphs only)
//! ```
//!
//! Construction is pure and total over validated models; it never looks at a
//! search state. INIT nodes receive no incoming edges.

use tracing::debug;

use crate::model::{Model, TaskRef};

/// Analytical purpose of a graph, which fixes its edge orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GraphType {
    /// Leaves-to-root: preconditions and subtasks feed their consumers.
    BottomUp,
    /// Root-to-leaves over the task/method layer; fact layer unchanged.
    TopDown,
    /// Task decomposition graph without facts.
    TdgOnly,
    /// Bottom-up plus operator recomposition nodes and a goal node, for LM-cut.
    Composition,
}

/// What a graph node stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Fact.
    Fact,
    /// Primitive operator.
    Operator,
    /// Abstract task.
    AbstractTask,
    /// Decomposition method.
    Decomposition,
    /// Operator used as a subtask (one per operator).
    Recomposition,
    /// Artificial goal node.
    Goal,
}

/// Propagation semantics of a graph node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeType {
    /// Needs every predecessor.
    And,
    /// Needs any predecessor.
    Or,
    /// Given; terminal.
    Init,
}

/// A graph node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphNode {
    /// Node id (global id for model components).
    pub id: usize,
    /// Entity kind.
    pub kind: NodeKind,
    /// AND / OR / INIT.
    pub node_type: NodeType,
    /// Cost charged when an AND node fires (operator cost where the mode charges it).
    pub weight: u64,
    /// Incoming edges; duplicates encode subtask multiplicity.
    pub predecessors: Vec<usize>,
    /// Outgoing edges.
    pub successors: Vec<usize>,
}

/// How operators are weighted in a [`GraphType::TdgOnly`] graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum TdgWeighting {
    /// Every operator counts 1.
    #[default]
    Unit,
    /// Every operator counts its action cost (zero-cost operators count 0).
    Cost,
}

/// Directed AND/OR graph over a model.
#[derive(Debug, Clone)]
pub struct AndOrGraph {
    graph_type: GraphType,
    nodes: Vec<Option<GraphNode>>,
    num_components: usize,
    num_facts: usize,
    num_operators: usize,
}

impl AndOrGraph {
    /// Builds a graph of `graph_type` over `model`.
    ///
    /// TDG-only graphs weight operators with [`TdgWeighting::Unit`]; use
    /// [`AndOrGraph::tdg`] to choose.
    pub fn new(model: &Model, graph_type: GraphType) -> Self {
        Builder::new(model, graph_type, TdgWeighting::Unit).build()
    }

    /// Builds a TDG-only graph with an explicit operator weighting.
    pub fn tdg(model: &Model, weighting: TdgWeighting) -> Self {
        Builder::new(model, GraphType::TdgOnly, weighting).build()
    }

    /// Mode this graph was built for.
    pub fn graph_type(&self) -> GraphType {
        self.graph_type
    }

    /// Number of node slots (model components plus any extra nodes).
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if the graph has no node slots.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Size of the model's global id space.
    pub fn num_components(&self) -> usize {
        self.num_components
    }

    /// Node at `id`, if that slot is populated in this mode.
    pub fn node(&self, id: usize) -> Option<&GraphNode> {
        self.nodes.get(id).and_then(Option::as_ref)
    }

    /// Populated nodes in id order.
    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.iter().flatten()
    }

    /// Ids of INIT nodes.
    pub fn init_nodes(&self) -> impl Iterator<Item = usize> + '_ {
        self.nodes()
            .filter(|n| n.node_type == NodeType::Init)
            .map(|n| n.id)
    }

    /// Recomposition node of operator `op_index` (top-down and composition graphs).
    pub fn recomposition_of(&self, op_index: usize) -> Option<usize> {
        let id = self.num_components + op_index;
        self.node(id)
            .filter(|n| n.kind == NodeKind::Recomposition)
            .map(|n| n.id)
    }

    /// Artificial goal node (composition graphs).
    pub fn goal_node(&self) -> Option<usize> {
        let id = self.num_components + self.num_operators;
        self.node(id).filter(|n| n.kind == NodeKind::Goal).map(|n| n.id)
    }

    /// Node standing for task-network entry `task` in this graph.
    ///
    /// Operators map to their recomposition node where one exists, since that
    /// is the node methods and task networks refer to.
    pub fn task_node(&self, model: &Model, task: TaskRef) -> usize {
        match task {
            TaskRef::Operator(i) => self
                .recomposition_of(i)
                .unwrap_or_else(|| model.operator_gid(i)),
            TaskRef::Abstract(i) => model.task_gid(i),
        }
    }

    /// Number of facts in the underlying model.
    pub fn num_facts(&self) -> usize {
        self.num_facts
    }
}

struct Builder<'m> {
    model: &'m Model,
    graph_type: GraphType,
    weighting: TdgWeighting,
    nodes: Vec<Option<GraphNode>>,
}

impl<'m> Builder<'m> {
    fn new(model: &'m Model, graph_type: GraphType, weighting: TdgWeighting) -> Self {
        let extra = match graph_type {
            GraphType::BottomUp | GraphType::TdgOnly => 0,
            GraphType::TopDown => model.num_operators(),
            GraphType::Composition => model.num_operators() + 1,
        };
        Self {
            model,
            graph_type,
            weighting,
            nodes: vec![None; model.num_components() + extra],
        }
    }

    fn put(&mut self, id: usize, kind: NodeKind, node_type: NodeType, weight: u64) {
        self.nodes[id] = Some(GraphNode {
            id,
            kind,
            node_type,
            weight,
            predecessors: Vec::new(),
            successors: Vec::new(),
        });
    }

    /// Adds `from -> to` unless `to` is INIT or either slot is unpopulated.
    fn edge(&mut self, from: usize, to: usize) {
        let target_ok = matches!(
            self.nodes.get(to),
            Some(Some(n)) if n.node_type != NodeType::Init
        );
        if !target_ok || !matches!(self.nodes.get(from), Some(Some(_))) {
            return;
        }
        if let Some(Some(n)) = self.nodes.get_mut(to) {
            n.predecessors.push(from);
        }
        if let Some(Some(n)) = self.nodes.get_mut(from) {
            n.successors.push(to);
        }
    }

    fn recomposition(&self, op_index: usize) -> usize {
        self.model.num_components() + op_index
    }

    fn build(mut self) -> AndOrGraph {
        let model = self.model;
        let total = model.num_components();
        let in_initial_tn = |task: TaskRef| model.initial_tn().contains(&task);

        // Facts.
        if self.graph_type != GraphType::TdgOnly {
            for f in 0..model.num_facts() {
                // Composition graphs decide INIT per evaluation, so every fact
                // keeps its achiever edges.
                let init = self.graph_type != GraphType::Composition
                    && model.initial_state().contains(f);
                let ty = if init { NodeType::Init } else { NodeType::Or };
                self.put(f, NodeKind::Fact, ty, 0);
            }
        }

        // Operators and their recomposition nodes.
        for (i, op) in model.operators().iter().enumerate() {
            let weight = match (self.graph_type, self.weighting) {
                (GraphType::TdgOnly, TdgWeighting::Unit) => 1,
                _ => u64::from(op.cost),
            };
            self.put(op.global_id, NodeKind::Operator, NodeType::And, weight);
            match self.graph_type {
                GraphType::TopDown => {
                    let ty = if in_initial_tn(TaskRef::Operator(i)) {
                        NodeType::Init
                    } else {
                        NodeType::Or
                    };
                    self.put(self.recomposition(i), NodeKind::Recomposition, ty, 0);
                }
                GraphType::Composition => {
                    self.put(
                        self.recomposition(i),
                        NodeKind::Recomposition,
                        NodeType::Or,
                        0,
                    );
                }
                GraphType::BottomUp | GraphType::TdgOnly => {}
            }
        }

        for (i, task) in model.abstract_tasks().iter().enumerate() {
            let ty = if self.graph_type == GraphType::TopDown && in_initial_tn(TaskRef::Abstract(i))
            {
                NodeType::Init
            } else {
                NodeType::Or
            };
            self.put(task.global_id, NodeKind::AbstractTask, ty, 0);
        }
        for d in model.decompositions() {
            self.put(d.global_id, NodeKind::Decomposition, NodeType::And, 0);
        }
        if self.graph_type == GraphType::Composition {
            self.put(
                total + model.num_operators(),
                NodeKind::Goal,
                NodeType::And,
                0,
            );
        }

        // Fact layer: identical orientation in every mode that has facts.
        if self.graph_type != GraphType::TdgOnly {
            for op in model.operators() {
                for f in op.pos_pre.iter_ones() {
                    self.edge(f, op.global_id);
                }
                for f in op.add.iter_ones() {
                    self.edge(op.global_id, f);
                }
            }
            for d in model.decompositions() {
                for f in d.pos_pre.iter_ones() {
                    self.edge(f, d.global_id);
                }
            }
        }

        // Task / method layer.
        for d in model.decompositions() {
            let task_gid = model.task_gid(d.compound_task);
            match self.graph_type {
                GraphType::BottomUp | GraphType::TdgOnly => {
                    for &sub in &d.task_network {
                        self.edge(model.task_ref_gid(sub), d.global_id);
                    }
                    self.edge(d.global_id, task_gid);
                }
                GraphType::Composition => {
                    for &sub in &d.task_network {
                        let from = match sub {
                            TaskRef::Operator(i) => self.recomposition(i),
                            TaskRef::Abstract(i) => model.task_gid(i),
                        };
                        self.edge(from, d.global_id);
                    }
                    self.edge(d.global_id, task_gid);
                }
                GraphType::TopDown => {
                    self.edge(task_gid, d.global_id);
                    for &sub in &d.task_network {
                        let to = match sub {
                            TaskRef::Operator(i) => self.recomposition(i),
                            TaskRef::Abstract(i) => model.task_gid(i),
                        };
                        self.edge(d.global_id, to);
                    }
                }
            }
        }
        match self.graph_type {
            GraphType::TopDown => {
                for (i, op) in model.operators().iter().enumerate() {
                    self.edge(self.recomposition(i), op.global_id);
                }
            }
            GraphType::Composition => {
                for (i, op) in model.operators().iter().enumerate() {
                    self.edge(op.global_id, self.recomposition(i));
                }
            }
            GraphType::BottomUp | GraphType::TdgOnly => {}
        }

        let graph = AndOrGraph {
            graph_type: self.graph_type,
            nodes: self.nodes,
            num_components: total,
            num_facts: model.num_facts(),
            num_operators: model.num_operators(),
        };
        debug!(
            graph_type = ?graph.graph_type,
            nodes = graph.nodes().count(),
            edges = graph.nodes().map(|n| n.successors.len()).sum::<usize>(),
            "and/or graph built"
        );
        graph
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::model::ModelBuilder;

    /// p (init) --op--> q ; t := [op] ; initial tn [t]
    fn chain() -> Model {
        let mut b = ModelBuilder::new();
        let p = b.add_fact("p");
        let q = b.add_fact("q");
        let op = b.add_operator("op", 4, [p], [], [q, p], []);
        let t = b.add_abstract_task("t");
        b.add_decomposition("m", t, [], [], [TaskRef::Operator(op), TaskRef::Operator(op)]);
        b.set_initial_state([p]);
        b.set_goals([q]);
        b.set_initial_tn([TaskRef::Abstract(t)]);
        b.build().unwrap()
    }

    #[test]
    fn bottom_up_orients_leaves_to_root() {
        let m = chain();
        let g = AndOrGraph::new(&m, GraphType::BottomUp);
        assert_eq!(g.len(), 5);
        let p = g.node(0).unwrap();
        assert_eq!(p.node_type, NodeType::Init);
        assert!(p.predecessors.is_empty(), "INIT node kept an incoming edge");
        let op = g.node(2).unwrap();
        assert_eq!(op.node_type, NodeType::And);
        assert_eq!(op.predecessors, vec![0]);
        assert_eq!(op.successors, vec![1, 4, 4]);
        let method = g.node(4).unwrap();
        assert_eq!(method.predecessors, vec![2, 2]);
        assert_eq!(method.successors, vec![3]);
        assert_eq!(g.node(3).unwrap().node_type, NodeType::Or);
    }

    #[test]
    fn top_down_splits_operators() {
        let m = chain();
        let g = AndOrGraph::new(&m, GraphType::TopDown);
        assert_eq!(g.len(), 6);
        let recomp = g.recomposition_of(0).unwrap();
        assert_eq!(recomp, 5);
        assert_eq!(g.node(recomp).unwrap().predecessors, vec![4, 4]);
        assert_eq!(g.node(2).unwrap().predecessors, vec![0, 5]);
        // The initial task is INIT and the method hangs below it.
        assert_eq!(g.node(3).unwrap().node_type, NodeType::Init);
        assert_eq!(g.node(4).unwrap().predecessors, vec![3]);
    }

    #[test]
    fn tdg_only_has_no_facts() {
        let m = chain();
        let g = AndOrGraph::tdg(&m, TdgWeighting::Cost);
        assert!(g.node(0).is_none() && g.node(1).is_none());
        assert_eq!(g.node(2).unwrap().weight, 4);
        assert!(g.node(2).unwrap().predecessors.is_empty());
        assert_eq!(AndOrGraph::new(&m, GraphType::TdgOnly).node(2).unwrap().weight, 1);
    }

    #[test]
    fn composition_routes_subtasks_through_recomposition() {
        let m = chain();
        let g = AndOrGraph::new(&m, GraphType::Composition);
        assert_eq!(g.len(), 7);
        assert_eq!(g.goal_node(), Some(6));
        assert_eq!(g.node(0).unwrap().node_type, NodeType::Or);
        assert_eq!(g.node(0).unwrap().predecessors, vec![2]);
        assert_eq!(g.node(5).unwrap().predecessors, vec![2]);
        assert_eq!(g.node(4).unwrap().predecessors, vec![5, 5]);
        assert_eq!(g.task_node(&m, TaskRef::Operator(0)), 5);
    }
}
