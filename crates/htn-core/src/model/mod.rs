// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Grounded planning model.
//!
//! Every fact, operator, abstract task and decomposition occupies one slot of
//! a single contiguous global id space, in that order:
//!
//! ```text
//! [0, F)  [F, F+O)  [F+O, F+O+A)  [F+O+A, F+O+A+D)
//!  facts  operators abstract tasks decompositions
//! ```
//!
//! Graph nodes, landmark bit-sets and heuristic tables are indexed by global
//! id, so the kind of a component is recovered from range membership alone.
//! The model is immutable once [`ModelBuilder::build`] returns.

mod builder;
#[cfg(feature = "serde")]
mod document;

pub use builder::{ModelBuilder, ARTIFICIAL_TOP_PREFIX};
#[cfg(feature = "serde")]
pub use document::{DecompositionDoc, ModelDocument, OperatorDoc};

use crate::bitset::BitSet;
use crate::error::ModelError;

/// Reference to a task inside a task network.
///
/// Indices are local to their kind (`model.operators()[i]`,
/// `model.abstract_tasks()[i]`), not global ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TaskRef {
    /// Primitive operator.
    Operator(usize),
    /// Abstract (compound) task.
    Abstract(usize),
}

/// Kind of a component, recovered from its global id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    /// Fact.
    Fact,
    /// Primitive operator.
    Operator,
    /// Abstract task.
    AbstractTask,
    /// Decomposition method.
    Decomposition,
}

/// An atomic proposition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fact {
    /// Global id (equal to the fact index).
    pub global_id: usize,
    /// Grounded name.
    pub name: String,
}

/// A primitive action with bit-packed preconditions and effects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operator {
    /// Global id.
    pub global_id: usize,
    /// Grounded name.
    pub name: String,
    /// Action cost charged once per application.
    pub cost: u32,
    /// Facts that must hold.
    pub pos_pre: BitSet,
    /// Facts that must not hold.
    pub neg_pre: BitSet,
    /// Facts made true.
    pub add: BitSet,
    /// Facts made false.
    pub del: BitSet,
}

impl Operator {
    /// `(state & pos) == pos && (state & neg) == 0`.
    #[inline]
    pub fn applicable(&self, state: &BitSet) -> bool {
        self.pos_pre.is_subset(state) && self.neg_pre.is_disjoint(state)
    }

    /// `(state & !del) | add`.
    pub fn apply(&self, state: &BitSet) -> BitSet {
        let mut next = state.clone();
        next.difference_with(&self.del);
        next.union_with(&self.add);
        next
    }

    /// Delete-relaxed applicability: negative preconditions are ignored.
    #[inline]
    pub fn relaxed_applicable(&self, state: &BitSet) -> bool {
        self.pos_pre.is_subset(state)
    }

    /// Delete-relaxed application: `state | add`.
    pub fn relaxed_apply(&self, state: &BitSet) -> BitSet {
        let mut next = state.clone();
        next.union_with(&self.add);
        next
    }
}

/// A compound task, refined only through its decompositions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbstractTask {
    /// Global id.
    pub global_id: usize,
    /// Grounded name.
    pub name: String,
    /// Local indices of this task's methods, in declaration order.
    pub decompositions: Vec<usize>,
}

/// A method rewriting one abstract task into an ordered task network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decomposition {
    /// Global id.
    pub global_id: usize,
    /// Grounded name.
    pub name: String,
    /// Local index of the abstract task this method refines.
    pub compound_task: usize,
    /// Facts that must hold.
    pub pos_pre: BitSet,
    /// Facts that must not hold.
    pub neg_pre: BitSet,
    /// Ordered subtasks (total order).
    pub task_network: Vec<TaskRef>,
}

impl Decomposition {
    /// Same semantics as [`Operator::applicable`].
    #[inline]
    pub fn applicable(&self, state: &BitSet) -> bool {
        self.pos_pre.is_subset(state) && self.neg_pre.is_disjoint(state)
    }
}

/// Borrowed view of a component addressed by global id.
#[derive(Debug, Clone, Copy)]
pub enum Component<'a> {
    /// Fact.
    Fact(&'a Fact),
    /// Primitive operator.
    Operator(&'a Operator),
    /// Abstract task.
    AbstractTask(&'a AbstractTask),
    /// Decomposition method.
    Decomposition(&'a Decomposition),
}

impl<'a> Component<'a> {
    /// Global id stored on the component.
    pub fn global_id(&self) -> usize {
        match self {
            Component::Fact(c) => c.global_id,
            Component::Operator(c) => c.global_id,
            Component::AbstractTask(c) => c.global_id,
            Component::Decomposition(c) => c.global_id,
        }
    }

    /// Name of the component.
    pub fn name(&self) -> &'a str {
        match *self {
            Component::Fact(c) => &c.name,
            Component::Operator(c) => &c.name,
            Component::AbstractTask(c) => &c.name,
            Component::Decomposition(c) => &c.name,
        }
    }
}

/// Immutable grounded HTN problem.
#[derive(Debug, Clone)]
pub struct Model {
    pub(crate) facts: Vec<Fact>,
    pub(crate) operators: Vec<Operator>,
    pub(crate) abstract_tasks: Vec<AbstractTask>,
    pub(crate) decompositions: Vec<Decomposition>,
    pub(crate) initial_state: BitSet,
    pub(crate) goals: BitSet,
    pub(crate) initial_tn: Vec<TaskRef>,
}

impl Model {
    /// Number of facts (`F`).
    #[inline]
    pub fn num_facts(&self) -> usize {
        self.facts.len()
    }

    /// Number of operators (`O`).
    #[inline]
    pub fn num_operators(&self) -> usize {
        self.operators.len()
    }

    /// Number of abstract tasks (`A`).
    #[inline]
    pub fn num_abstract_tasks(&self) -> usize {
        self.abstract_tasks.len()
    }

    /// Number of decompositions (`D`).
    #[inline]
    pub fn num_decompositions(&self) -> usize {
        self.decompositions.len()
    }

    /// Size of the global id space (`F + O + A + D`).
    #[inline]
    pub fn num_components(&self) -> usize {
        self.facts.len()
            + self.operators.len()
            + self.abstract_tasks.len()
            + self.decompositions.len()
    }

    /// All facts in id order.
    pub fn facts(&self) -> &[Fact] {
        &self.facts
    }

    /// All operators in local index order.
    pub fn operators(&self) -> &[Operator] {
        &self.operators
    }

    /// All abstract tasks in local index order.
    pub fn abstract_tasks(&self) -> &[AbstractTask] {
        &self.abstract_tasks
    }

    /// All decompositions in local index order.
    pub fn decompositions(&self) -> &[Decomposition] {
        &self.decompositions
    }

    /// Initial state over facts.
    pub fn initial_state(&self) -> &BitSet {
        &self.initial_state
    }

    /// Goal facts.
    pub fn goals(&self) -> &BitSet {
        &self.goals
    }

    /// Initial task network, with the artificial top task already stripped.
    pub fn initial_tn(&self) -> &[TaskRef] {
        &self.initial_tn
    }

    /// Global id of operator `index`.
    #[inline]
    pub fn operator_gid(&self, index: usize) -> usize {
        self.facts.len() + index
    }

    /// Global id of abstract task `index`.
    #[inline]
    pub fn task_gid(&self, index: usize) -> usize {
        self.facts.len() + self.operators.len() + index
    }

    /// Global id of decomposition `index`.
    #[inline]
    pub fn decomposition_gid(&self, index: usize) -> usize {
        self.facts.len() + self.operators.len() + self.abstract_tasks.len() + index
    }

    /// Global id of a task-network entry.
    #[inline]
    pub fn task_ref_gid(&self, task: TaskRef) -> usize {
        match task {
            TaskRef::Operator(i) => self.operator_gid(i),
            TaskRef::Abstract(i) => self.task_gid(i),
        }
    }

    /// Kind of the component at `id`, by range membership.
    pub fn kind_of(&self, id: usize) -> Result<ComponentKind, ModelError> {
        let f = self.facts.len();
        let o = f + self.operators.len();
        let a = o + self.abstract_tasks.len();
        let d = a + self.decompositions.len();
        match id {
            _ if id < f => Ok(ComponentKind::Fact),
            _ if id < o => Ok(ComponentKind::Operator),
            _ if id < a => Ok(ComponentKind::AbstractTask),
            _ if id < d => Ok(ComponentKind::Decomposition),
            _ => Err(ModelError::IdOutOfRange { id, total: d }),
        }
    }

    /// Looks up a component by global id.
    ///
    /// The stored `global_id` must equal the id derived from range membership;
    /// a mismatch means the model was mis-indexed and is reported rather than
    /// silently followed.
    pub fn component(&self, id: usize) -> Result<Component<'_>, ModelError> {
        let component = match self.kind_of(id)? {
            ComponentKind::Fact => Component::Fact(&self.facts[id]),
            ComponentKind::Operator => {
                Component::Operator(&self.operators[id - self.facts.len()])
            }
            ComponentKind::AbstractTask => {
                Component::AbstractTask(&self.abstract_tasks[id - self.task_gid(0)])
            }
            ComponentKind::Decomposition => {
                Component::Decomposition(&self.decompositions[id - self.decomposition_gid(0)])
            }
        };
        if component.global_id() != id {
            return Err(ModelError::GlobalIdMismatch {
                expected: id,
                stored: component.global_id(),
            });
        }
        Ok(component)
    }

    /// Name of the component at `id`, or a placeholder for ids outside the space.
    pub fn name_of(&self, id: usize) -> &str {
        self.component(id).map_or("<invalid>", |c| c.name())
    }

    /// Name of a task-network entry.
    pub fn task_name(&self, task: TaskRef) -> &str {
        match task {
            TaskRef::Operator(i) => &self.operators[i].name,
            TaskRef::Abstract(i) => &self.abstract_tasks[i].name,
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn tiny() -> Model {
        let mut b = ModelBuilder::new();
        let p = b.add_fact("p");
        let q = b.add_fact("q");
        let op = b.add_operator("make-q", 2, [p], [], [q], [p]);
        let t = b.add_abstract_task("t");
        b.add_decomposition("m", t, [], [], [TaskRef::Operator(op)]);
        b.set_initial_state([p]);
        b.set_goals([q]);
        b.set_initial_tn([TaskRef::Abstract(t)]);
        b.build().unwrap()
    }

    #[test]
    fn global_ids_are_contiguous_by_kind() {
        let m = tiny();
        assert_eq!(m.num_components(), 5);
        assert_eq!(m.kind_of(0).unwrap(), ComponentKind::Fact);
        assert_eq!(m.kind_of(2).unwrap(), ComponentKind::Operator);
        assert_eq!(m.kind_of(3).unwrap(), ComponentKind::AbstractTask);
        assert_eq!(m.kind_of(4).unwrap(), ComponentKind::Decomposition);
        assert_eq!(
            m.kind_of(5),
            Err(ModelError::IdOutOfRange { id: 5, total: 5 })
        );
        for id in 0..m.num_components() {
            assert_eq!(m.component(id).unwrap().global_id(), id);
        }
        assert_eq!(m.name_of(2), "make-q");
    }

    #[test]
    fn component_names_borrow_from_the_model() {
        let m = tiny();
        let names: Vec<&str> = (0..m.num_components())
            .map(|id| m.component(id).unwrap().name())
            .collect();
        assert_eq!(names, ["p", "q", "make-q", "t", "m"]);
        assert_eq!(m.name_of(4), "m");
        assert_eq!(m.name_of(42), "<invalid>");
    }

    #[test]
    fn component_lookup_rejects_mis_indexed_entries() {
        let mut m = tiny();
        m.operators[0].global_id = 99;
        assert_eq!(
            m.component(2).unwrap_err(),
            ModelError::GlobalIdMismatch {
                expected: 2,
                stored: 99
            }
        );
    }

    #[test]
    fn operator_semantics() {
        let m = tiny();
        let op = &m.operators()[0];
        let s0 = m.initial_state().clone();
        assert!(op.applicable(&s0));
        let s1 = op.apply(&s0);
        assert_eq!(s1.iter_ones().collect::<Vec<_>>(), vec![1]);
        assert!(!op.applicable(&s1));
        let relaxed = op.relaxed_apply(&s0);
        assert_eq!(relaxed.iter_ones().collect::<Vec<_>>(), vec![0, 1]);
    }
}
