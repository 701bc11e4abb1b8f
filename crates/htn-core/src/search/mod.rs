// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Forward HTN search: progression over the first task of the network.
//!
//! Nodes live in a [`NodeArena`]; the open list depends on
//! [`SearchKind`](crate::config::SearchKind).
//! Goal tests happen when a node is popped, so the goal node is never
//! counted as expanded. Dead ends (infinite heuristic) are dropped at
//! generation. Budgets are checked cooperatively between expansions.

mod budget;
mod frontier;
mod node;
mod result;
mod telemetry;

pub use budget::{NoMemoryMonitor, ProcStatusMonitor, ResourceMonitor};
pub use node::{NodeArena, NodeHandle, SearchNode, Transition};
pub use result::{SearchResult, SearchStatus};
pub use telemetry::{NullTelemetry, SearchTelemetry, TracingTelemetry};

use rustc_hash::FxHashMap;
use tracing::{info, instrument};

use self::budget::Budget;
use self::frontier::{Frontier, NoveltyTable};
use crate::config::{RevisitPolicy, SearchConfig};
use crate::heuristic::Heuristic;
use crate::model::Model;

/// Counters accumulated while searching.
#[derive(Debug, Default, Clone, Copy)]
struct Counters {
    expanded: u64,
    generated: u64,
    pruned: u64,
}

/// One configured search over one model.
pub struct Search<'m> {
    model: &'m Model,
    config: SearchConfig,
    heuristic: Box<dyn Heuristic + 'm>,
    telemetry: Box<dyn SearchTelemetry + 'm>,
    monitor: Box<dyn ResourceMonitor + 'm>,
}

impl std::fmt::Debug for Search<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Search")
            .field("config", &self.config)
            .field("heuristic", &self.heuristic.name())
            .finish_non_exhaustive()
    }
}

impl<'m> Search<'m> {
    /// Search with no telemetry and the `/proc` memory monitor.
    pub fn new(
        model: &'m Model,
        config: SearchConfig,
        heuristic: Box<dyn Heuristic + 'm>,
    ) -> Self {
        Self {
            model,
            config,
            heuristic,
            telemetry: Box::new(NullTelemetry),
            monitor: Box::new(ProcStatusMonitor),
        }
    }

    /// Replaces the telemetry sink.
    pub fn with_telemetry(mut self, telemetry: Box<dyn SearchTelemetry + 'm>) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// Replaces the memory monitor.
    pub fn with_monitor(mut self, monitor: Box<dyn ResourceMonitor + 'm>) -> Self {
        self.monitor = monitor;
        self
    }

    /// The heuristic driving this search.
    pub fn heuristic(&self) -> &dyn Heuristic {
        self.heuristic.as_ref()
    }

    /// Runs the search to a terminal status.
    #[instrument(skip(self), fields(search = ?self.config.kind, heuristic = self.heuristic.name()))]
    pub fn run(&mut self) -> SearchResult {
        let model = self.model;
        let budget = Budget::start(&self.config);
        let revisit = self.config.revisit == RevisitPolicy::HashedKey;
        let mut arena = NodeArena::new();
        let mut frontier = Frontier::new(self.config.kind);
        let mut closed: FxHashMap<u64, u64> = FxHashMap::default();
        let mut novelty = NoveltyTable::default();
        let mut counters = Counters::default();
        let mut sequence = 0u64;

        let mut root = SearchNode::root(model);
        let h = self.heuristic.initialize(model, &mut root);
        self.heuristic.clear_structures();
        root.h = h;
        root.f = h;
        let initial_h = h.is_finite().then_some(h);
        info!(initial_h = h, tasks = root.task_network.len(), "search started");
        if !h.is_finite() {
            return self.finish(
                SearchStatus::Unsolvable,
                counters,
                &budget,
                &arena,
                None,
                initial_h,
            );
        }
        if revisit {
            closed.insert(root.revisit_key(), 0);
        }
        let novel = self.config.novelty && novelty.observe(model, &root);
        let handle = arena.push(root);
        frontier.push(handle, arena.get(handle), novel);

        while let Some(handle) = frontier.pop() {
            if arena.get(handle).is_goal(model) {
                return self.finish(
                    SearchStatus::Goal,
                    counters,
                    &budget,
                    &arena,
                    Some(handle),
                    initial_h,
                );
            }
            if let Some(status) = budget.check(counters.expanded, self.monitor.as_ref()) {
                info!(open = frontier.len(), nodes = arena.len(), "budget exhausted");
                return self.finish(status, counters, &budget, &arena, None, initial_h);
            }
            self.telemetry.on_expand(arena.get(handle));
            counters.expanded += 1;

            let children = arena.get(handle).successors(model, handle);
            for mut child in children {
                if revisit {
                    let key = child.revisit_key();
                    if closed.get(&key).is_some_and(|&g| g <= child.g) {
                        counters.pruned += 1;
                        self.telemetry.on_prune(&child);
                        continue;
                    }
                    closed.insert(key, child.g);
                }
                let h = self.heuristic.evaluate(model, arena.get(handle), &mut child);
                if !h.is_finite() {
                    continue;
                }
                sequence += 1;
                child.sequence = sequence;
                child.h = h;
                child.f = child.g as f64 + h;
                let novel = self.config.novelty && novelty.observe(model, &child);
                self.telemetry.on_generate(&child);
                counters.generated += 1;
                let child = arena.push(child);
                frontier.push(child, arena.get(child), novel);
            }
            self.heuristic.release(arena.get_mut(handle));
        }
        self.finish(
            SearchStatus::Unsolvable,
            counters,
            &budget,
            &arena,
            None,
            initial_h,
        )
    }

    fn finish(
        &mut self,
        status: SearchStatus,
        counters: Counters,
        budget: &Budget,
        arena: &NodeArena,
        goal: Option<NodeHandle>,
        initial_h: Option<f64>,
    ) -> SearchResult {
        let plan = goal.map(|g| arena.extract_plan(g)).unwrap_or_default();
        let plan_cost = plan
            .iter()
            .filter_map(|&i| self.model.operators().get(i))
            .map(|op| u64::from(op.cost))
            .sum();
        let result = SearchResult {
            status,
            expanded: counters.expanded,
            generated: counters.generated,
            pruned_revisits: counters.pruned,
            elapsed: budget.elapsed(),
            solution_size: plan.len(),
            plan,
            plan_cost,
            initial_h,
            heuristic: self.heuristic.name().to_owned(),
            heuristic_stats: self.heuristic.stats().clone(),
        };
        info!(
            status = ?result.status,
            expanded = result.expanded,
            generated = result.generated,
            solution_size = result.solution_size,
            "search finished"
        );
        self.telemetry.on_finish(&result);
        result
    }
}
