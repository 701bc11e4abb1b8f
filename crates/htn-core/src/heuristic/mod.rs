// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Heuristic estimators for HTN search nodes.
//!
//! All heuristics share one object-safe trait so the planner can pick one at
//! run time. `f64::INFINITY` is the only dead-end signal: the search discards
//! such nodes instead of treating them as errors.

mod landmark_count;
mod lmcut;
mod tdg;

pub use landmark_count::{LandmarkCount, LandmarkMarks};
pub use lmcut::LmCutHeuristic;
pub use tdg::{tdg_table, TdgCost};

use crate::config::{HeuristicConfig, HeuristicKind};
use crate::error::ConfigError;
use crate::model::Model;
use crate::search::SearchNode;

/// Per-node bookkeeping owned by the heuristic that produced it.
#[derive(Debug, Clone, Default)]
pub enum NodeAnnotation {
    /// Nothing stored (stateless heuristics, or released after expansion).
    #[default]
    None,
    /// Landmark-count marks.
    Landmarks(LandmarkMarks),
}

/// Running diagnostics over heuristic values.
///
/// Mean and minimum cover finite values only.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HeuristicStats {
    /// Total evaluations, dead ends included.
    pub calls: u64,
    /// Evaluations that returned a finite value.
    pub finite: u64,
    /// Running mean of finite values.
    pub mean: f64,
    /// Smallest finite value seen.
    pub min: Option<f64>,
}

impl HeuristicStats {
    /// Folds `value` into the running figures.
    pub fn record(&mut self, value: f64) {
        self.calls += 1;
        if !value.is_finite() {
            return;
        }
        self.finite += 1;
        self.mean += (value - self.mean) / self.finite as f64;
        self.min = Some(self.min.map_or(value, |m| m.min(value)));
    }
}

/// Object-safe heuristic interface.
pub trait Heuristic {
    /// Short identifier used in logs and result records.
    fn name(&self) -> &'static str;

    /// Evaluates the root, attaching whatever per-node data later calls need.
    fn initialize(&mut self, model: &Model, root: &mut SearchNode) -> f64;

    /// Evaluates `child`, generated from `parent`.
    fn evaluate(&mut self, model: &Model, parent: &SearchNode, child: &mut SearchNode) -> f64;

    /// Diagnostics gathered so far.
    fn stats(&self) -> &HeuristicStats;

    /// Drops per-node data of `node` once all its children were evaluated.
    fn release(&mut self, node: &mut SearchNode) {
        node.annotation = NodeAnnotation::None;
    }

    /// Frees construction-time structures that evaluation no longer needs.
    ///
    /// Called once the root is initialized. Re-initializing from the same root
    /// must still give the same value.
    fn clear_structures(&mut self) {}
}

/// Constant-zero estimator for blind search.
#[derive(Debug, Clone, Default)]
pub struct Blind {
    stats: HeuristicStats,
}

impl Heuristic for Blind {
    fn name(&self) -> &'static str {
        "blind"
    }

    fn initialize(&mut self, _model: &Model, _root: &mut SearchNode) -> f64 {
        self.stats.record(0.0);
        0.0
    }

    fn evaluate(&mut self, _model: &Model, _parent: &SearchNode, _child: &mut SearchNode) -> f64 {
        self.stats.record(0.0);
        0.0
    }

    fn stats(&self) -> &HeuristicStats {
        &self.stats
    }
}

impl HeuristicConfig {
    /// Builds the configured heuristic for `model`.
    ///
    /// Fails fast on combinations that could only be detected mid-search.
    pub fn build(&self, model: &Model) -> Result<Box<dyn Heuristic>, ConfigError> {
        if self.landmarks.use_ucp && self.kind != HeuristicKind::LandmarkCount {
            return Err(ConfigError::UcpWithoutLandmarks);
        }
        Ok(match self.kind {
            HeuristicKind::Blind => Box::new(Blind::default()),
            HeuristicKind::LandmarkCount => Box::new(LandmarkCount::new(model, self.landmarks)?),
            HeuristicKind::Tdg => Box::new(TdgCost::new(model, self.tdg_weighting)),
            HeuristicKind::LmCut => Box::new(LmCutHeuristic::new(model)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_ignore_dead_ends_in_mean_and_min() {
        let mut s = HeuristicStats::default();
        s.record(4.0);
        s.record(f64::INFINITY);
        s.record(2.0);
        assert_eq!(s.calls, 3);
        assert_eq!(s.finite, 2);
        assert!((s.mean - 3.0).abs() < 1e-12);
        assert_eq!(s.min, Some(2.0));
    }

    #[test]
    fn empty_stats_have_no_minimum() {
        let s = HeuristicStats::default();
        assert_eq!(s.calls, 0);
        assert_eq!(s.min, None);
    }
}
