// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Planner configuration values.
//!
//! Everything the search and heuristics need is passed in explicitly; there
//! are no process-wide toggles. Under the `serde` feature every struct
//! deserializes from a partial JSON object, missing fields taking their
//! defaults.

use std::time::Duration;

use crate::error::ConfigError;
use crate::graph::TdgWeighting;
use crate::landmarks::LandmarkConfig;

/// Default number of expansions between budget checks.
pub const DEFAULT_CHECK_INTERVAL: u64 = 100;

/// Which search engine drives expansion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum SearchKind {
    /// Best-first on `(f, h, sequence)`.
    #[default]
    AStar,
    /// Best-first on `(h, g, sequence)`.
    GreedyBestFirst,
    /// FIFO frontier.
    BreadthFirst,
    /// LIFO frontier.
    DepthFirst,
}

impl SearchKind {
    /// Whether the frontier ignores heuristic values.
    pub fn is_blind(self) -> bool {
        matches!(self, Self::BreadthFirst | Self::DepthFirst)
    }
}

/// Duplicate detection for generated nodes.
///
/// `HashedKey` keys the closed list on a 64-bit hash of the state and the
/// whole task network. Distinct nodes whose keys collide are treated as the
/// same node, so a solution can be pruned away; the policy trades
/// completeness for fewer re-expansions and is off by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum RevisitPolicy {
    /// Every generated node is kept.
    #[default]
    Off,
    /// Discard nodes whose key was already reached with an equal or better `g`.
    HashedKey,
}

/// Search engine options.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SearchConfig {
    /// Engine.
    pub kind: SearchKind,
    /// Duplicate detection.
    pub revisit: RevisitPolicy,
    /// Wall-clock budget; unlimited when `None`.
    #[cfg_attr(feature = "serde", serde(with = "opt_secs"))]
    pub time_limit: Option<Duration>,
    /// Resident-memory budget in bytes; unlimited when `None`.
    pub memory_limit_bytes: Option<u64>,
    /// Expansions between budget checks.
    pub check_interval: u64,
    /// Serve novel nodes first (blind engines only).
    pub novelty: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            kind: SearchKind::default(),
            revisit: RevisitPolicy::default(),
            time_limit: None,
            memory_limit_bytes: None,
            check_interval: DEFAULT_CHECK_INTERVAL,
            novelty: false,
        }
    }
}

/// Heuristic selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum HeuristicKind {
    /// Constant zero.
    Blind,
    /// Unachieved landmark count.
    #[default]
    LandmarkCount,
    /// Task-decomposition-graph cost.
    Tdg,
    /// LM-cut over the composition graph.
    LmCut,
}

/// Heuristic options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct HeuristicConfig {
    /// Which heuristic.
    pub kind: HeuristicKind,
    /// Landmark options (landmark-count only).
    pub landmarks: LandmarkConfig,
    /// Operator weights of the TDG table.
    pub tdg_weighting: TdgWeighting,
}

/// Complete planner configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PlannerConfig {
    /// Search options.
    pub search: SearchConfig,
    /// Heuristic options.
    pub heuristic: HeuristicConfig,
}

impl PlannerConfig {
    /// Rejects combinations no engine can honour.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.search.check_interval == 0 {
            return Err(ConfigError::ZeroCheckInterval);
        }
        if self.search.novelty && !self.search.kind.is_blind() {
            return Err(ConfigError::NoveltyWithoutBlindSearch);
        }
        let landmark_count = self.heuristic.kind == HeuristicKind::LandmarkCount;
        if self.heuristic.landmarks.use_ucp && !landmark_count {
            return Err(ConfigError::UcpWithoutLandmarks);
        }
        Ok(())
    }
}

#[cfg(feature = "serde")]
mod opt_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::ref_option)]
    pub(super) fn serialize<S>(v: &Option<Duration>, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match v {
            Some(d) => s.serialize_some(&d.as_secs_f64()),
            None => s.serialize_none(),
        }
    }

    pub(super) fn deserialize<'de, D>(d: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = Option::<f64>::deserialize(d)?;
        secs.map(|s| Duration::try_from_secs_f64(s).map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = PlannerConfig::default();
        assert_eq!(cfg.search.check_interval, DEFAULT_CHECK_INTERVAL);
        assert_eq!(cfg.search.kind, SearchKind::AStar);
        assert_eq!(cfg.heuristic.kind, HeuristicKind::LandmarkCount);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn infeasible_combinations_are_rejected() {
        let mut cfg = PlannerConfig::default();
        cfg.search.check_interval = 0;
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroCheckInterval));

        let mut cfg = PlannerConfig::default();
        cfg.search.novelty = true;
        assert_eq!(cfg.validate(), Err(ConfigError::NoveltyWithoutBlindSearch));
        cfg.search.kind = SearchKind::BreadthFirst;
        assert!(cfg.validate().is_ok());

        let mut cfg = PlannerConfig::default();
        cfg.heuristic.kind = HeuristicKind::Tdg;
        cfg.heuristic.landmarks.use_ucp = true;
        assert_eq!(cfg.validate(), Err(ConfigError::UcpWithoutLandmarks));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn partial_json_fills_defaults() {
        let cfg: PlannerConfig = serde_json::from_str(
            r#"{"search": {"kind": "depth_first", "time_limit": 1.5},
                "heuristic": {"kind": "tdg", "tdg_weighting": "cost"}}"#,
        )
        .unwrap();
        assert_eq!(cfg.search.kind, SearchKind::DepthFirst);
        assert_eq!(cfg.search.time_limit, Some(Duration::from_millis(1500)));
        assert_eq!(cfg.search.check_interval, DEFAULT_CHECK_INTERVAL);
        assert_eq!(cfg.heuristic.tdg_weighting, TdgWeighting::Cost);
        assert!(!cfg.heuristic.landmarks.bidirectional);
    }
}
