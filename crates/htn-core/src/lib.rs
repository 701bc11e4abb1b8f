// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! htn-core: progression HTN planner over grounded models.
//!
//! A [`Model`] is built once (through [`ModelBuilder`] or, with the `serde`
//! feature, a [`ModelDocument`]) and then shared read-only by the AND/OR
//! graphs, the landmark engine, the heuristics and the search. Every
//! component is addressed by a dense global id: facts first, then operators,
//! abstract tasks and decompositions.
//!
//! ```
//! use htn_core::{solve, ModelBuilder, PlannerConfig, SearchStatus, TaskRef};
//!
//! let mut b = ModelBuilder::new();
//! let holding = b.add_fact("holding");
//! let pick = b.add_operator("pick-up", 1, [], [], [holding], []);
//! b.set_goals([holding]);
//! b.set_initial_tn([TaskRef::Operator(pick)]);
//! let model = b.build()?;
//!
//! let result = solve(&model, PlannerConfig::default())?;
//! assert_eq!(result.status, SearchStatus::Goal);
//! assert_eq!(result.plan_names(&model), ["pick-up"]);
//! # Ok::<(), htn_core::PlannerError>(())
//! ```
#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro,
    clippy::print_stdout,
    clippy::print_stderr
)]
#![allow(
    clippy::must_use_candidate,
    clippy::return_self_not_must_use,
    clippy::unreadable_literal,
    clippy::missing_const_for_fn,
    clippy::redundant_pub_crate,
    clippy::many_single_char_names,
    clippy::module_name_repetitions,
    clippy::use_self,
    clippy::cast_precision_loss
)]

/// Fixed-width word-array bit-sets.
pub mod bitset;
/// Planner configuration values.
pub mod config;
mod error;
/// AND/OR graph views of a model.
pub mod graph;
/// Heuristic estimators.
pub mod heuristic;
/// Landmark tables and the landmark engine.
pub mod landmarks;
/// LM-cut over the composition graph.
pub mod lmcut;
/// Grounded planning model.
pub mod model;
mod planner;
/// Forward HTN search.
pub mod search;

pub use bitset::BitSet;
pub use config::{
    HeuristicConfig, HeuristicKind, PlannerConfig, RevisitPolicy, SearchConfig, SearchKind,
    DEFAULT_CHECK_INTERVAL,
};
pub use error::{ConfigError, ModelError, PlannerError};
pub use graph::{AndOrGraph, GraphType, NodeType, TdgWeighting};
pub use heuristic::{Blind, Heuristic, HeuristicStats, LandmarkCount, LmCutHeuristic, TdgCost};
pub use landmarks::{LandmarkConfig, LandmarkEngine};
pub use lmcut::{LmCut, LmCutResult};
#[cfg(feature = "serde")]
pub use model::ModelDocument;
pub use model::{Component, ComponentKind, Model, ModelBuilder, TaskRef};
pub use planner::{solve, Planner};
pub use search::{
    NoMemoryMonitor, NullTelemetry, ProcStatusMonitor, ResourceMonitor, SearchNode,
    SearchResult, SearchStatus, SearchTelemetry, TracingTelemetry,
};
