// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Error types for model construction and planner configuration.
//!
//! Resource exhaustion and unreachable goals are not errors: they surface as
//! [`SearchStatus`](crate::SearchStatus) values so a driver can batch many
//! problems without per-problem crash handling.

use thiserror::Error;

/// Model malformation detected while building or addressing a [`Model`](crate::Model).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    /// A global id lies outside the model's id space.
    #[error("global id {id} out of range (model has {total} components)")]
    IdOutOfRange {
        /// Offending id.
        id: usize,
        /// Size of the global id space.
        total: usize,
    },
    /// A stored `global_id` disagrees with the id derived from its position.
    #[error("component at global id {expected} stores global id {stored}")]
    GlobalIdMismatch {
        /// Id computed from the component's range position.
        expected: usize,
        /// Id recorded on the component.
        stored: usize,
    },
    /// A fact index lies outside `[0, num_facts)`.
    #[error("fact index {fact} out of range in {context} (model has {num_facts} facts)")]
    FactOutOfRange {
        /// Offending fact index.
        fact: usize,
        /// Number of facts in the model.
        num_facts: usize,
        /// Where the reference occurred.
        context: String,
    },
    /// A task network references a missing operator or abstract task.
    #[error("dangling task reference {task} in {context}")]
    DanglingTaskRef {
        /// Debug rendering of the reference.
        task: String,
        /// Where the reference occurred.
        context: String,
    },
    /// A decomposition's compound task is missing or does not list it.
    #[error("decomposition {decomposition} is not attached to abstract task {task}")]
    DetachedDecomposition {
        /// Decomposition index.
        decomposition: usize,
        /// Claimed compound task index.
        task: usize,
    },
    /// The initial task network is empty (after stripping the artificial top task).
    #[error("initial task network is empty")]
    EmptyInitialTaskNetwork,
    /// A name in an interchange document does not resolve.
    #[error("unknown {kind} name `{name}`")]
    UnknownName {
        /// Kind of entity that was looked up.
        kind: &'static str,
        /// Unresolved name.
        name: String,
    },
    /// The same name was declared twice for one kind of entity.
    #[error("duplicate {kind} name `{name}`")]
    DuplicateName {
        /// Kind of entity.
        kind: &'static str,
        /// Duplicated name.
        name: String,
    },
    /// A subtask name matches both an operator and an abstract task.
    #[error("task name `{0}` is both an operator and an abstract task")]
    AmbiguousTaskName(String),
    /// Interchange document could not be parsed.
    #[error("model document: {0}")]
    Document(String),
}

/// Infeasible or disallowed heuristic / search configuration.
///
/// Raised when a heuristic is constructed, never mid-search.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Top-down landmarks were requested but the top-down graph was never built.
    #[error("top-down landmarks requested but the bidirectional graph was not built")]
    TopDownUnavailable,
    /// Landmark tables were queried after being released.
    #[error("landmark tables were released after the search root was seeded")]
    StructuresCleared,
    /// Uniform cost partitioning needs a landmark-count heuristic.
    #[error("uniform cost partitioning requires the landmark-count heuristic")]
    UcpWithoutLandmarks,
    /// The novelty pre-filter only applies to blind search.
    #[error("novelty pre-filter requires breadth-first or depth-first search")]
    NoveltyWithoutBlindSearch,
    /// The budget check interval must be at least one expansion.
    #[error("budget check interval must be positive")]
    ZeroCheckInterval,
}

/// Umbrella error for planner construction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlannerError {
    /// Model malformation.
    #[error(transparent)]
    Model(#[from] ModelError),
    /// Configuration error.
    #[error(transparent)]
    Config(#[from] ConfigError),
}
