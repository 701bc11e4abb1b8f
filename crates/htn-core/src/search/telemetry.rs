// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Observer hooks for the search loop.
//!
//! Sinks see nodes by reference and must not assume they outlive the call.

use tracing::{debug, trace};

use super::{SearchNode, SearchResult};

/// Receives search events. Every method defaults to a no-op.
pub trait SearchTelemetry {
    /// A node was popped for expansion.
    fn on_expand(&mut self, _node: &SearchNode) {}
    /// A child survived pruning and entered the frontier.
    fn on_generate(&mut self, _node: &SearchNode) {}
    /// A child was dropped by the closed list.
    fn on_prune(&mut self, _node: &SearchNode) {}
    /// The search terminated.
    fn on_finish(&mut self, _result: &SearchResult) {}
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullTelemetry;

impl SearchTelemetry for NullTelemetry {}

/// Emits events through `tracing` (`trace` per node, `debug` at the end).
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTelemetry;

impl SearchTelemetry for TracingTelemetry {
    fn on_expand(&mut self, node: &SearchNode) {
        trace!(
            seq = node.sequence,
            g = node.g,
            h = node.h,
            depth = node.depth,
            tasks = node.task_network.len(),
            "expand"
        );
    }

    fn on_generate(&mut self, node: &SearchNode) {
        trace!(seq = node.sequence, g = node.g, h = node.h, "generate");
    }

    fn on_prune(&mut self, node: &SearchNode) {
        trace!(g = node.g, depth = node.depth, "revisit pruned");
    }

    fn on_finish(&mut self, result: &SearchResult) {
        debug!(
            status = ?result.status,
            pruned = result.pruned_revisits,
            evaluations = result.heuristic_stats.calls,
            mean_h = result.heuristic_stats.mean,
            elapsed_ms = result.elapsed.as_millis(),
            "search summary"
        );
    }
}
