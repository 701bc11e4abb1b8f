// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Search outcome records.

use std::time::Duration;

use crate::heuristic::HeuristicStats;
use crate::model::Model;

/// How a search terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum SearchStatus {
    /// A goal node was reached.
    Goal,
    /// The frontier ran dry.
    Unsolvable,
    /// The wall-clock budget ran out.
    Timeout,
    /// The memory budget ran out.
    OutOfMemory,
}

/// Result record of one search.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SearchResult {
    /// Terminal status.
    pub status: SearchStatus,
    /// Nodes expanded (the goal node itself is not counted).
    pub expanded: u64,
    /// Children that entered the frontier.
    pub generated: u64,
    /// Children dropped by the closed list.
    pub pruned_revisits: u64,
    /// Wall-clock time spent searching.
    pub elapsed: Duration,
    /// Number of operators in the plan.
    pub solution_size: usize,
    /// Operator indices in execution order; empty unless `status` is `Goal`.
    pub plan: Vec<usize>,
    /// Sum of plan operator costs.
    pub plan_cost: u64,
    /// Heuristic value of the root.
    pub initial_h: Option<f64>,
    /// Heuristic identifier.
    pub heuristic: String,
    /// Heuristic diagnostics.
    pub heuristic_stats: HeuristicStats,
}

impl SearchResult {
    /// Whether a plan was found.
    pub fn is_goal(&self) -> bool {
        self.status == SearchStatus::Goal
    }

    /// Operator names of the plan.
    pub fn plan_names<'m>(&self, model: &'m Model) -> Vec<&'m str> {
        self.plan
            .iter()
            .filter_map(|&i| model.operators().get(i))
            .map(|op| op.name.as_str())
            .collect()
    }
}
