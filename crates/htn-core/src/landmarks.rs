// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Landmark fixpoint over AND/OR graphs.
//!
//! Every node's entry is a bit-set over node ids that any relaxed derivation of
//! the node must pass through. Entries start universal (INIT entries at
//! `{self}`) and only shrink:
//!
//! - OR:  `(∩ reached predecessors) ∪ {self}`
//! - AND: `(∪ predecessors) ∪ {self}`, once every predecessor is reached
//! - INIT / leaf: `{self}`
//!
//! A node is re-enqueued only when the entry of one of its predecessors
//! changes, so recursive methods (a task whose method transitively contains the task) are
//! handled as ordinary cycles. Nodes that never become reached keep their
//! universal entry and are reported as unreachable.

use std::collections::VecDeque;

use tracing::{debug, info, instrument};

use crate::bitset::BitSet;
use crate::error::ConfigError;
use crate::graph::{AndOrGraph, GraphType, NodeKind, NodeType};
use crate::model::{Model, TaskRef};

/// Converged landmark entries of one graph.
#[derive(Debug, Clone)]
pub struct LandmarkTable {
    entries: Vec<BitSet>,
    reached: BitSet,
}

impl LandmarkTable {
    /// Width of every entry (number of graph node slots).
    pub fn width(&self) -> usize {
        self.entries.len()
    }

    /// Landmark entry of node `id` (universal when unreachable).
    pub fn entry(&self, id: usize) -> &BitSet {
        &self.entries[id]
    }

    /// Whether node `id` was derived from INIT nodes.
    pub fn is_reached(&self, id: usize) -> bool {
        self.reached.contains(id)
    }

    /// Number of reached nodes.
    pub fn reached_count(&self) -> usize {
        self.reached.count_ones()
    }

    /// Recomputes every node once more; returns how many entries changed.
    ///
    /// Zero after [`propagate`] converged.
    pub fn sweep(&mut self, graph: &AndOrGraph) -> usize {
        let mut changed = 0;
        for node in graph.nodes() {
            if let Some(next) = evaluate(graph, node.id, &self.entries, &self.reached) {
                if !self.reached.contains(node.id) || next != self.entries[node.id] {
                    self.reached.insert(node.id);
                    self.entries[node.id] = next;
                    changed += 1;
                }
            }
        }
        changed
    }
}

/// New entry for `id` from its predecessors, or `None` while it is unreached.
fn evaluate(
    graph: &AndOrGraph,
    id: usize,
    entries: &[BitSet],
    reached: &BitSet,
) -> Option<BitSet> {
    let node = graph.node(id)?;
    let mut next = match node.node_type {
        NodeType::Init => BitSet::new(graph.len()),
        NodeType::Or => {
            let mut acc: Option<BitSet> = None;
            for &p in node.predecessors.iter().filter(|&&p| reached.contains(p)) {
                match acc.as_mut() {
                    Some(acc) => acc.intersect_with(&entries[p]),
                    None => acc = Some(entries[p].clone()),
                }
            }
            acc?
        }
        NodeType::And => {
            let mut acc = BitSet::new(graph.len());
            for &p in &node.predecessors {
                if !reached.contains(p) {
                    return None;
                }
                acc.union_with(&entries[p]);
            }
            acc
        }
    };
    next.insert(id);
    Some(next)
}

/// Runs the worklist fixpoint over `graph`.
pub fn propagate(graph: &AndOrGraph) -> LandmarkTable {
    let width = graph.len();
    let mut entries = vec![BitSet::full(width); width];
    let mut reached = BitSet::new(width);
    let mut queue = VecDeque::new();
    let mut queued = BitSet::new(width);

    for node in graph.nodes() {
        if node.node_type == NodeType::Init {
            entries[node.id] = BitSet::from_indices(width, [node.id]);
        }
        if node.node_type == NodeType::Init || node.predecessors.is_empty() {
            queued.insert(node.id);
            queue.push_back(node.id);
        }
    }

    let mut pops = 0usize;
    while let Some(id) = queue.pop_front() {
        queued.remove(id);
        pops += 1;
        let Some(next) = evaluate(graph, id, &entries, &reached) else {
            continue;
        };
        if reached.contains(id) && next == entries[id] {
            continue;
        }
        reached.insert(id);
        entries[id] = next;
        if let Some(node) = graph.node(id) {
            for &s in &node.successors {
                if queued.insert(s) {
                    queue.push_back(s);
                }
            }
        }
    }
    debug!(
        graph_type = ?graph.graph_type(),
        pops,
        reached = reached.count_ones(),
        "landmark fixpoint converged"
    );
    LandmarkTable { entries, reached }
}

/// Landmark options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct LandmarkConfig {
    /// Close bottom-up landmarks under top-down landmarks.
    pub bidirectional: bool,
    /// Weight unachieved landmarks by uniform cost partitioning.
    pub use_ucp: bool,
}

/// Fractional landmark costs from uniform cost partitioning, by global id.
#[derive(Debug, Clone, PartialEq)]
pub struct UcpCosts {
    costs: Vec<f64>,
}

impl UcpCosts {
    /// Cost of landmark `id` (0 for ids that are not landmarks).
    pub fn cost(&self, id: usize) -> f64 {
        self.costs.get(id).copied().unwrap_or(0.0)
    }

    /// Sum of the costs of `ids`.
    pub fn total<I: IntoIterator<Item = usize>>(&self, ids: I) -> f64 {
        ids.into_iter().map(|id| self.cost(id)).sum()
    }
}

/// Bottom-up and (optionally) top-down landmark tables of one model.
///
/// The tables are sized by the square of the graph width; once a search has
/// seeded its root they can be released with
/// [`clear_structures`](Self::clear_structures), after which every table
/// query fails with [`ConfigError::StructuresCleared`].
#[derive(Debug, Clone)]
pub struct LandmarkEngine {
    num_components: usize,
    goals: BitSet,
    bidirectional: bool,
    bottom_up_graph: Option<AndOrGraph>,
    bottom_up: Option<LandmarkTable>,
    top_down: Option<LandmarkTable>,
}

impl LandmarkEngine {
    /// Builds the bottom-up table and, when `bidirectional`, the top-down table.
    #[instrument(skip(model), fields(components = model.num_components()))]
    pub fn new(model: &Model, bidirectional: bool) -> Self {
        let bu_graph = AndOrGraph::new(model, GraphType::BottomUp);
        let bottom_up = propagate(&bu_graph);
        let top_down = bidirectional.then(|| {
            let td_graph = AndOrGraph::new(model, GraphType::TopDown);
            propagate(&td_graph)
        });
        Self {
            num_components: model.num_components(),
            goals: model.goals().clone(),
            bidirectional,
            bottom_up_graph: Some(bu_graph),
            bottom_up: Some(bottom_up),
            top_down,
        }
    }

    /// Whether the engine was built with a top-down table.
    pub fn has_top_down(&self) -> bool {
        self.bidirectional
    }

    /// Whether [`clear_structures`](Self::clear_structures) released the tables.
    pub fn is_cleared(&self) -> bool {
        self.bottom_up.is_none()
    }

    fn bottom_up_table(&self) -> Result<&LandmarkTable, ConfigError> {
        self.bottom_up.as_ref().ok_or(ConfigError::StructuresCleared)
    }

    fn top_down_table(&self) -> Result<&LandmarkTable, ConfigError> {
        if !self.bidirectional {
            return Err(ConfigError::TopDownUnavailable);
        }
        self.top_down.as_ref().ok_or(ConfigError::StructuresCleared)
    }

    /// Bottom-up entry of `id`.
    pub fn bottom_up(&self, id: usize) -> Result<&BitSet, ConfigError> {
        Ok(self.bottom_up_table()?.entry(id))
    }

    /// Whether `id` is bottom-up reachable from the initial state.
    pub fn is_reachable(&self, id: usize) -> Result<bool, ConfigError> {
        Ok(self.bottom_up_table()?.is_reached(id))
    }

    /// Top-down entry of `id`.
    pub fn top_down(&self, id: usize) -> Result<&BitSet, ConfigError> {
        Ok(self.top_down_table()?.entry(id))
    }

    /// Bottom-up landmarks of every unsatisfied goal fact and every task in `tn`.
    ///
    /// `Ok(None)` when one of them is unreachable, i.e. the goal cannot be met.
    pub fn seed(
        &self,
        model: &Model,
        state: &BitSet,
        tn: &[TaskRef],
    ) -> Result<Option<BitSet>, ConfigError> {
        let bottom_up = self.bottom_up_table()?;
        let mut acc = BitSet::new(self.num_components);
        let open_goals = self.goals.iter_ones().filter(|&f| !state.contains(f));
        let tasks = tn.iter().map(|&t| model.task_ref_gid(t));
        for id in open_goals.chain(tasks) {
            if !bottom_up.is_reached(id) {
                return Ok(None);
            }
            acc.union_with(bottom_up.entry(id));
        }
        Ok(Some(acc))
    }

    /// Closes `seed` under bottom-up and top-down entries until no bit is added.
    ///
    /// Recomposition ids allocated by the top-down graph are masked off, so the
    /// result only names model components. Always a superset of `seed`.
    pub fn bidirectional_closure(&self, seed: &BitSet) -> Result<BitSet, ConfigError> {
        let td = self.top_down_table()?;
        let bu = self.bottom_up_table()?;
        let width = td.width();
        let mut acc = seed.resized(width);
        let mut queue: VecDeque<usize> = acc.iter_ones().collect();
        while let Some(id) = queue.pop_front() {
            let mut gained = BitSet::new(width);
            if id < self.num_components && bu.is_reached(id) {
                gained.union_with(&bu.entry(id).resized(width));
            }
            if td.is_reached(id) {
                gained.union_with(td.entry(id));
            }
            gained.difference_with(&acc);
            for new in gained.iter_ones() {
                acc.insert(new);
                queue.push_back(new);
            }
        }
        Ok(acc.resized(self.num_components))
    }

    /// Landmarks of a search node: bottom-up seed, closed bidirectionally if asked.
    pub fn landmarks(
        &self,
        model: &Model,
        state: &BitSet,
        tn: &[TaskRef],
        bidirectional: bool,
    ) -> Result<Option<BitSet>, ConfigError> {
        let Some(seed) = self.seed(model, state, tn)? else {
            return Ok(None);
        };
        let lms = if bidirectional {
            self.bidirectional_closure(&seed)?
        } else {
            seed
        };
        info!(
            landmarks = lms.count_ones(),
            bidirectional, "landmarks computed"
        );
        Ok(Some(lms))
    }

    /// Uniform cost partitioning over `landmarks`.
    ///
    /// A fact landmark is the disjunction of its achieving operators and an
    /// abstract-task landmark the disjunction of its methods; operator and
    /// method landmarks stand for themselves. A unit appearing in `k`
    /// disjunctions contributes `1/k` to each, and a disjunction costs the
    /// cheapest of its members. Landmarks without achievers (initially true
    /// facts) cost nothing.
    pub fn ucp_costs(&self, landmarks: &BitSet) -> Result<UcpCosts, ConfigError> {
        let graph = self
            .bottom_up_graph
            .as_ref()
            .ok_or(ConfigError::StructuresCleared)?;
        let mut costs = vec![0.0; self.num_components];
        let disjunction = |id: usize| -> Vec<usize> {
            match graph.node(id) {
                Some(n) if matches!(n.kind, NodeKind::Fact | NodeKind::AbstractTask) => {
                    let mut members = n.predecessors.clone();
                    members.sort_unstable();
                    members.dedup();
                    members
                }
                Some(_) => vec![id],
                None => Vec::new(),
            }
        };
        let disjunctions: Vec<(usize, Vec<usize>)> = landmarks
            .iter_ones()
            .map(|id| (id, disjunction(id)))
            .collect();
        let mut appearances = vec![0u32; graph.len()];
        for (_, members) in &disjunctions {
            for &u in members {
                appearances[u] += 1;
            }
        }
        for (id, members) in &disjunctions {
            costs[*id] = members
                .iter()
                .map(|&u| 1.0 / f64::from(appearances[u]))
                .reduce(f64::min)
                .unwrap_or(0.0);
        }
        Ok(UcpCosts { costs })
    }

    /// Releases the bottom-up graph and both landmark tables.
    pub fn clear_structures(&mut self) {
        self.bottom_up_graph = None;
        self.bottom_up = None;
        self.top_down = None;
    }
}
