// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Open lists for the search engines.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};

use rustc_hash::FxHashSet;

use super::{NodeHandle, SearchNode};
use crate::config::SearchKind;
use crate::model::Model;

/// Heap entry; the smallest key is popped first.
#[derive(Debug, Clone, Copy)]
struct Entry {
    primary: f64,
    secondary: f64,
    sequence: u64,
    handle: NodeHandle,
}

impl Entry {
    fn key_cmp(&self, other: &Self) -> Ordering {
        self.primary
            .total_cmp(&other.primary)
            .then_with(|| self.secondary.total_cmp(&other.secondary))
            .then_with(|| self.sequence.cmp(&other.sequence))
    }
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.key_cmp(other) == Ordering::Equal
    }
}

impl Eq for Entry {}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap.
        other.key_cmp(self)
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Two-tier FIFO/LIFO queue: novel nodes are served before the rest.
#[derive(Debug, Default)]
struct BlindQueue {
    lifo: bool,
    novel: VecDeque<NodeHandle>,
    rest: VecDeque<NodeHandle>,
}

impl BlindQueue {
    fn pop(&mut self) -> Option<NodeHandle> {
        let take = |q: &mut VecDeque<NodeHandle>, lifo: bool| {
            if lifo {
                q.pop_back()
            } else {
                q.pop_front()
            }
        };
        take(&mut self.novel, self.lifo).or_else(|| take(&mut self.rest, self.lifo))
    }
}

#[derive(Debug)]
enum FrontierImpl {
    AStar(BinaryHeap<Entry>),
    Greedy(BinaryHeap<Entry>),
    Blind(BlindQueue),
}

/// Open list selected by [`SearchKind`].
#[derive(Debug)]
pub(crate) struct Frontier {
    inner: FrontierImpl,
}

impl Frontier {
    pub(crate) fn new(kind: SearchKind) -> Self {
        let inner = match kind {
            SearchKind::AStar => FrontierImpl::AStar(BinaryHeap::new()),
            SearchKind::GreedyBestFirst => FrontierImpl::Greedy(BinaryHeap::new()),
            SearchKind::BreadthFirst => FrontierImpl::Blind(BlindQueue::default()),
            SearchKind::DepthFirst => FrontierImpl::Blind(BlindQueue {
                lifo: true,
                ..BlindQueue::default()
            }),
        };
        Self { inner }
    }

    /// Adds `node`; `novel` only matters to blind queues.
    pub(crate) fn push(&mut self, handle: NodeHandle, node: &SearchNode, novel: bool) {
        let entry = |primary: f64, secondary: f64| Entry {
            primary,
            secondary,
            sequence: node.sequence,
            handle,
        };
        match &mut self.inner {
            FrontierImpl::AStar(heap) => heap.push(entry(node.f, node.h)),
            FrontierImpl::Greedy(heap) => heap.push(entry(node.h, node.g as f64)),
            FrontierImpl::Blind(q) if novel => q.novel.push_back(handle),
            FrontierImpl::Blind(q) => q.rest.push_back(handle),
        }
    }

    pub(crate) fn pop(&mut self) -> Option<NodeHandle> {
        match &mut self.inner {
            FrontierImpl::AStar(heap) | FrontierImpl::Greedy(heap) => heap.pop().map(|e| e.handle),
            FrontierImpl::Blind(q) => q.pop(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        match &self.inner {
            FrontierImpl::AStar(heap) | FrontierImpl::Greedy(heap) => heap.len(),
            FrontierImpl::Blind(q) => q.novel.len() + q.rest.len(),
        }
    }
}

/// Remembers every `(fact, first task)` pair seen so far.
#[derive(Debug, Default)]
pub(crate) struct NoveltyTable {
    seen: FxHashSet<(usize, usize)>,
}

impl NoveltyTable {
    /// Records the pairs of `node`; true if at least one was new.
    pub(crate) fn observe(&mut self, model: &Model, node: &SearchNode) -> bool {
        let first = node
            .task_network
            .first()
            .map_or(usize::MAX, |&t| model.task_ref_gid(t));
        let mut novel = false;
        for fact in node.state.iter_ones() {
            novel |= self.seen.insert((fact, first));
        }
        novel
    }
}
