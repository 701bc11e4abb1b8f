// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Landmark-count heuristic with incremental per-node marking.

use std::rc::Rc;

use tracing::warn;

use super::{Heuristic, HeuristicStats, NodeAnnotation};
use crate::bitset::BitSet;
use crate::error::ConfigError;
use crate::landmarks::{LandmarkConfig, LandmarkEngine, UcpCosts};
use crate::model::{Model, TaskRef};
use crate::search::{SearchNode, Transition};

/// Landmarks of the search root and the ones a node has achieved.
///
/// `lms` is shared by every node of one search; `mark` is always a subset of
/// it and only grows along a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LandmarkMarks {
    /// All landmarks, by global id.
    pub lms: Rc<BitSet>,
    /// Landmarks achieved on the path to this node.
    pub mark: BitSet,
}

impl LandmarkMarks {
    /// Landmarks not yet achieved.
    pub fn open(&self) -> impl Iterator<Item = usize> + '_ {
        self.lms.iter_ones().filter(|&id| !self.mark.contains(id))
    }
}

/// Landmarks seeded at a search root, kept across runs from the same root.
#[derive(Debug, Clone)]
struct RootLandmarks {
    state: BitSet,
    task_network: Vec<TaskRef>,
    /// `None` when the root cannot reach the goal.
    lms: Option<Rc<BitSet>>,
    ucp: Option<UcpCosts>,
}

impl RootLandmarks {
    fn matches(&self, root: &SearchNode) -> bool {
        self.state == root.state && self.task_network == root.task_network
    }
}

/// Counts (or UCP-weights) the landmarks a node has not achieved yet.
///
/// The engine's tables are only consulted when a root is seeded; the search
/// releases them right after, and later runs from the same root reuse the
/// seeded landmarks.
#[derive(Debug)]
pub struct LandmarkCount {
    engine: LandmarkEngine,
    config: LandmarkConfig,
    root: Option<RootLandmarks>,
    stats: HeuristicStats,
}

impl LandmarkCount {
    /// Builds the landmark tables the configuration asks for.
    pub fn new(model: &Model, config: LandmarkConfig) -> Result<Self, ConfigError> {
        Self::from_engine(LandmarkEngine::new(model, config.bidirectional), config)
    }

    /// Wraps an existing engine, checking it can serve `config`.
    pub fn from_engine(engine: LandmarkEngine, config: LandmarkConfig) -> Result<Self, ConfigError> {
        if config.bidirectional && !engine.has_top_down() {
            return Err(ConfigError::TopDownUnavailable);
        }
        Ok(Self {
            engine,
            config,
            root: None,
            stats: HeuristicStats::default(),
        })
    }

    /// The underlying engine.
    pub fn engine(&self) -> &LandmarkEngine {
        &self.engine
    }

    fn seed_root(&self, model: &Model, root: &SearchNode) -> Result<RootLandmarks, ConfigError> {
        let lms = self.engine.landmarks(
            model,
            &root.state,
            &root.task_network,
            self.config.bidirectional,
        )?;
        let ucp = match (&lms, self.config.use_ucp) {
            (Some(lms), true) => Some(self.engine.ucp_costs(lms)?),
            _ => None,
        };
        Ok(RootLandmarks {
            state: root.state.clone(),
            task_network: root.task_network.clone(),
            lms: lms.map(Rc::new),
            ucp,
        })
    }

    fn value(&self, marks: &LandmarkMarks) -> f64 {
        match self.root.as_ref().and_then(|r| r.ucp.as_ref()) {
            Some(ucp) => ucp.total(marks.open()),
            None => (marks.lms.count_ones() - marks.mark.count_ones()) as f64,
        }
    }
}

impl Heuristic for LandmarkCount {
    fn name(&self) -> &'static str {
        "landmark-count"
    }

    fn initialize(&mut self, model: &Model, root: &mut SearchNode) -> f64 {
        if !self.root.as_ref().is_some_and(|r| r.matches(root)) {
            match self.seed_root(model, root) {
                Ok(seeded) => self.root = Some(seeded),
                Err(err) => {
                    warn!(%err, "landmark computation failed");
                    self.stats.record(f64::INFINITY);
                    return f64::INFINITY;
                }
            }
        }
        let Some(lms) = self.root.as_ref().and_then(|r| r.lms.clone()) else {
            self.stats.record(f64::INFINITY);
            return f64::INFINITY;
        };
        let mut mark = root.state.resized(lms.len());
        mark.intersect_with(&lms);
        let marks = LandmarkMarks { lms, mark };
        let h = self.value(&marks);
        root.annotation = NodeAnnotation::Landmarks(marks);
        self.stats.record(h);
        h
    }

    fn evaluate(&mut self, model: &Model, parent: &SearchNode, child: &mut SearchNode) -> f64 {
        let NodeAnnotation::Landmarks(parent_marks) = &parent.annotation else {
            self.stats.record(f64::INFINITY);
            return f64::INFINITY;
        };
        let lms = Rc::clone(&parent_marks.lms);
        let mut mark = parent_marks.mark.clone();
        match child.transition {
            Some(Transition::Operator(i)) => {
                mark.insert(model.operator_gid(i));
                let mut gained = child.state.clone();
                gained.difference_with(&parent.state);
                for f in gained.iter_ones() {
                    mark.insert(f);
                }
            }
            Some(Transition::Decomposition(d)) => {
                let dec = &model.decompositions()[d];
                mark.insert(dec.global_id);
                mark.insert(model.task_gid(dec.compound_task));
            }
            None => {}
        }
        mark.intersect_with(&lms);
        let marks = LandmarkMarks { lms, mark };
        let h = self.value(&marks);
        child.annotation = NodeAnnotation::Landmarks(marks);
        self.stats.record(h);
        h
    }

    fn stats(&self) -> &HeuristicStats {
        &self.stats
    }

    fn clear_structures(&mut self) {
        self.engine.clear_structures();
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::model::ModelBuilder;
    use crate::search::NodeArena;

    /// `deliver` has one method `[pick, drop]`; `drop` achieves the goal.
    fn delivery() -> Model {
        let mut b = ModelBuilder::new();
        let at = b.add_fact("at-depot");
        let holding = b.add_fact("holding");
        let delivered = b.add_fact("delivered");
        let pick = b.add_operator("pick", 1, [at], [], [holding], []);
        let drop = b.add_operator("drop", 1, [holding], [], [delivered], [holding]);
        let t = b.add_abstract_task("deliver");
        b.add_decomposition(
            "m-deliver",
            t,
            [],
            [],
            [TaskRef::Operator(pick), TaskRef::Operator(drop)],
        );
        b.set_initial_state([at]);
        b.set_goals([delivered]);
        b.set_initial_tn([TaskRef::Abstract(t)]);
        b.build().unwrap()
    }

    fn walk(h: &mut dyn Heuristic, m: &Model) -> Vec<f64> {
        let mut arena = NodeArena::new();
        let mut root = SearchNode::root(m);
        let mut values = vec![h.initialize(m, &mut root)];
        let mut cursor = arena.push(root);
        loop {
            let mut kids = arena.get(cursor).successors(m, cursor);
            if kids.is_empty() {
                return values;
            }
            let mut kid = kids.remove(0);
            values.push(h.evaluate(m, arena.get(cursor), &mut kid));
            cursor = arena.push(kid);
        }
    }

    #[test]
    fn count_drops_as_landmarks_are_achieved() {
        let m = delivery();
        let mut h = LandmarkCount::new(&m, LandmarkConfig::default()).unwrap();
        let values = walk(&mut h, &m);
        assert_eq!(values.len(), 4);
        assert!(values.windows(2).all(|w| w[1] <= w[0]), "{values:?}");
        assert_eq!(values.last().copied(), Some(0.0));
        assert_eq!(h.stats().calls, 4);
    }

    #[test]
    fn ucp_values_never_exceed_plain_count() {
        let m = delivery();
        let mut plain = LandmarkCount::new(&m, LandmarkConfig::default()).unwrap();
        let mut ucp = LandmarkCount::new(
            &m,
            LandmarkConfig {
                bidirectional: false,
                use_ucp: true,
            },
        )
        .unwrap();
        for (a, b) in walk(&mut plain, &m).into_iter().zip(walk(&mut ucp, &m)) {
            assert!(b <= a + 1e-9, "ucp {b} > count {a}");
        }
    }

    #[test]
    fn bidirectional_without_top_down_is_rejected() {
        let m = delivery();
        let engine = LandmarkEngine::new(&m, false);
        let err = LandmarkCount::from_engine(
            engine,
            LandmarkConfig {
                bidirectional: true,
                use_ucp: false,
            },
        )
        .unwrap_err();
        assert_eq!(err, ConfigError::TopDownUnavailable);
    }

    #[test]
    fn unreachable_goal_is_infinite_at_the_root() {
        let mut b = ModelBuilder::new();
        let g = b.add_fact("g");
        let noop = b.add_operator("noop", 0, [], [], [], []);
        b.set_goals([g]);
        b.set_initial_tn([TaskRef::Operator(noop)]);
        let m = b.build().unwrap();
        let mut h = LandmarkCount::new(&m, LandmarkConfig::default()).unwrap();
        let mut root = SearchNode::root(&m);
        assert!(h.initialize(&m, &mut root).is_infinite());
    }

    #[test]
    fn released_tables_do_not_change_a_reseeded_root() {
        let m = delivery();
        let config = LandmarkConfig {
            bidirectional: true,
            use_ucp: true,
        };
        let mut h = LandmarkCount::new(&m, config).unwrap();
        let mut root = SearchNode::root(&m);
        let first = h.initialize(&m, &mut root);
        h.clear_structures();
        assert!(h.engine().is_cleared());
        let mut again = SearchNode::root(&m);
        assert_eq!(h.initialize(&m, &mut again), first);
        assert!(first > 0.0);

        // A root never seeded before needs the released tables.
        let mut moved = SearchNode::root(&m);
        moved.task_network.clear();
        assert!(h.initialize(&m, &mut moved).is_infinite());
    }
}
