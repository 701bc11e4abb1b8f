// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! LM-cut as a node estimator.

use super::{Heuristic, HeuristicStats};
use crate::lmcut::LmCut;
use crate::model::Model;
use crate::search::SearchNode;

/// Recomputes LM-cut from scratch for every node.
#[derive(Debug, Clone)]
pub struct LmCutHeuristic {
    lmcut: LmCut,
    stats: HeuristicStats,
}

impl LmCutHeuristic {
    /// Builds the composition graph of `model`.
    pub fn new(model: &Model) -> Self {
        Self {
            lmcut: LmCut::new(model),
            stats: HeuristicStats::default(),
        }
    }

    fn estimate(&mut self, model: &Model, node: &SearchNode) -> f64 {
        let h = self
            .lmcut
            .compute(model, &node.state, &node.task_network)
            .value
            .map_or(f64::INFINITY, |v| v as f64);
        self.stats.record(h);
        h
    }
}

impl Heuristic for LmCutHeuristic {
    fn name(&self) -> &'static str {
        "lm-cut"
    }

    fn initialize(&mut self, model: &Model, root: &mut SearchNode) -> f64 {
        self.estimate(model, root)
    }

    fn evaluate(&mut self, model: &Model, _parent: &SearchNode, child: &mut SearchNode) -> f64 {
        self.estimate(model, child)
    }

    fn stats(&self) -> &HeuristicStats {
        &self.stats
    }
}
