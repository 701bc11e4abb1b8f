// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! One-call entry point: configuration in, result record out.

use tracing::info;

use crate::config::PlannerConfig;
use crate::error::PlannerError;
use crate::model::Model;
use crate::search::{ResourceMonitor, Search, SearchResult, SearchTelemetry};

/// Validated configuration bound to a model, ready to run.
#[derive(Debug)]
pub struct Planner<'m> {
    search: Search<'m>,
}

impl<'m> Planner<'m> {
    /// Validates `config` and builds the configured heuristic.
    ///
    /// Configuration errors surface here, never during the search.
    pub fn new(model: &'m Model, config: PlannerConfig) -> Result<Self, PlannerError> {
        config.validate()?;
        let heuristic = config.heuristic.build(model)?;
        info!(
            heuristic = heuristic.name(),
            search = ?config.search.kind,
            revisit = ?config.search.revisit,
            "planner configured"
        );
        Ok(Self {
            search: Search::new(model, config.search, heuristic),
        })
    }

    /// Replaces the telemetry sink.
    pub fn with_telemetry(self, telemetry: Box<dyn SearchTelemetry + 'm>) -> Self {
        Self {
            search: self.search.with_telemetry(telemetry),
        }
    }

    /// Replaces the memory monitor.
    pub fn with_monitor(self, monitor: Box<dyn ResourceMonitor + 'm>) -> Self {
        Self {
            search: self.search.with_monitor(monitor),
        }
    }

    /// Runs the search.
    pub fn run(&mut self) -> SearchResult {
        self.search.run()
    }
}

/// Builds a planner for `model` and runs it once.
pub fn solve(model: &Model, config: PlannerConfig) -> Result<SearchResult, PlannerError> {
    Ok(Planner::new(model, config)?.run())
}
