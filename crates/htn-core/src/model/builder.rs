// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Incremental construction and validation of a [`Model`].
//!
//! This is the seam the grounding toolchain targets: components are declared by
//! local index, bit-vectors are materialised once the fact count is final, and
//! every cross reference is checked before the model becomes immutable.

use tracing::debug;

use super::{AbstractTask, Decomposition, Fact, Model, Operator, TaskRef};
use crate::bitset::BitSet;
use crate::error::ModelError;

/// Name prefix the grounder uses for its artificial top-level task.
pub const ARTIFICIAL_TOP_PREFIX: &str = "__top";

#[derive(Debug, Clone)]
struct OperatorDraft {
    name: String,
    cost: u32,
    pos_pre: Vec<usize>,
    neg_pre: Vec<usize>,
    add: Vec<usize>,
    del: Vec<usize>,
}

#[derive(Debug, Clone)]
struct DecompositionDraft {
    name: String,
    task: usize,
    pos_pre: Vec<usize>,
    neg_pre: Vec<usize>,
    network: Vec<TaskRef>,
}

/// Builder for [`Model`].
#[derive(Debug, Clone, Default)]
pub struct ModelBuilder {
    facts: Vec<String>,
    operators: Vec<OperatorDraft>,
    tasks: Vec<String>,
    decompositions: Vec<DecompositionDraft>,
    initial_state: Vec<usize>,
    goals: Vec<usize>,
    initial_tn: Vec<TaskRef>,
}

impl ModelBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a fact and returns its index (which is also its global id).
    pub fn add_fact(&mut self, name: impl Into<String>) -> usize {
        self.facts.push(name.into());
        self.facts.len() - 1
    }

    /// Declares an operator and returns its local index.
    pub fn add_operator<P, N, A, D>(
        &mut self,
        name: impl Into<String>,
        cost: u32,
        pos_pre: P,
        neg_pre: N,
        add: A,
        del: D,
    ) -> usize
    where
        P: IntoIterator<Item = usize>,
        N: IntoIterator<Item = usize>,
        A: IntoIterator<Item = usize>,
        D: IntoIterator<Item = usize>,
    {
        self.operators.push(OperatorDraft {
            name: name.into(),
            cost,
            pos_pre: pos_pre.into_iter().collect(),
            neg_pre: neg_pre.into_iter().collect(),
            add: add.into_iter().collect(),
            del: del.into_iter().collect(),
        });
        self.operators.len() - 1
    }

    /// Declares an abstract task and returns its local index.
    pub fn add_abstract_task(&mut self, name: impl Into<String>) -> usize {
        self.tasks.push(name.into());
        self.tasks.len() - 1
    }

    /// Declares a method for abstract task `task` and returns its local index.
    pub fn add_decomposition<P, N, T>(
        &mut self,
        name: impl Into<String>,
        task: usize,
        pos_pre: P,
        neg_pre: N,
        network: T,
    ) -> usize
    where
        P: IntoIterator<Item = usize>,
        N: IntoIterator<Item = usize>,
        T: IntoIterator<Item = TaskRef>,
    {
        self.decompositions.push(DecompositionDraft {
            name: name.into(),
            task,
            pos_pre: pos_pre.into_iter().collect(),
            neg_pre: neg_pre.into_iter().collect(),
            network: network.into_iter().collect(),
        });
        self.decompositions.len() - 1
    }

    /// Sets the facts true in the initial state.
    pub fn set_initial_state(&mut self, facts: impl IntoIterator<Item = usize>) -> &mut Self {
        self.initial_state = facts.into_iter().collect();
        self
    }

    /// Sets the goal facts.
    pub fn set_goals(&mut self, facts: impl IntoIterator<Item = usize>) -> &mut Self {
        self.goals = facts.into_iter().collect();
        self
    }

    /// Sets the initial task network.
    pub fn set_initial_tn(&mut self, tasks: impl IntoIterator<Item = TaskRef>) -> &mut Self {
        self.initial_tn = tasks.into_iter().collect();
        self
    }

    /// Validates every reference and freezes the model.
    pub fn build(self) -> Result<Model, ModelError> {
        let num_facts = self.facts.len();
        let num_ops = self.operators.len();
        let num_tasks = self.tasks.len();
        let num_decomps = self.decompositions.len();

        let bits = |ids: &[usize], context: &dyn Fn() -> String| -> Result<BitSet, ModelError> {
            if let Some(&fact) = ids.iter().find(|&&f| f >= num_facts) {
                return Err(ModelError::FactOutOfRange {
                    fact,
                    num_facts,
                    context: context(),
                });
            }
            Ok(BitSet::from_indices(num_facts, ids.iter().copied()))
        };
        let check_ref = |task: TaskRef, context: &dyn Fn() -> String| -> Result<(), ModelError> {
            let ok = match task {
                TaskRef::Operator(i) => i < num_ops,
                TaskRef::Abstract(i) => i < num_tasks,
            };
            if ok {
                Ok(())
            } else {
                Err(ModelError::DanglingTaskRef {
                    task: format!("{task:?}"),
                    context: context(),
                })
            }
        };

        let facts = self
            .facts
            .into_iter()
            .enumerate()
            .map(|(global_id, name)| Fact { global_id, name })
            .collect();

        let mut operators = Vec::with_capacity(num_ops);
        for (i, op) in self.operators.into_iter().enumerate() {
            let ctx = || format!("operator `{}`", op.name);
            operators.push(Operator {
                global_id: num_facts + i,
                cost: op.cost,
                pos_pre: bits(&op.pos_pre, &ctx)?,
                neg_pre: bits(&op.neg_pre, &ctx)?,
                add: bits(&op.add, &ctx)?,
                del: bits(&op.del, &ctx)?,
                name: op.name,
            });
        }

        let mut abstract_tasks: Vec<AbstractTask> = self
            .tasks
            .into_iter()
            .enumerate()
            .map(|(i, name)| AbstractTask {
                global_id: num_facts + num_ops + i,
                name,
                decompositions: Vec::new(),
            })
            .collect();

        let mut decompositions = Vec::with_capacity(num_decomps);
        for (i, d) in self.decompositions.into_iter().enumerate() {
            let ctx = || format!("decomposition `{}`", d.name);
            let Some(task) = abstract_tasks.get_mut(d.task) else {
                return Err(ModelError::DetachedDecomposition {
                    decomposition: i,
                    task: d.task,
                });
            };
            task.decompositions.push(i);
            for &sub in &d.network {
                check_ref(sub, &ctx)?;
            }
            decompositions.push(Decomposition {
                global_id: num_facts + num_ops + num_tasks + i,
                compound_task: d.task,
                pos_pre: bits(&d.pos_pre, &ctx)?,
                neg_pre: bits(&d.neg_pre, &ctx)?,
                task_network: d.network,
                name: d.name,
            });
        }

        let initial_state = bits(&self.initial_state, &|| "initial state".to_owned())?;
        let goals = bits(&self.goals, &|| "goal".to_owned())?;
        for &task in &self.initial_tn {
            check_ref(task, &|| "initial task network".to_owned())?;
        }

        let mut model = Model {
            facts,
            operators,
            abstract_tasks,
            decompositions,
            initial_state,
            goals,
            initial_tn: self.initial_tn,
        };
        strip_artificial_top(&mut model);
        if model.initial_tn.is_empty() {
            return Err(ModelError::EmptyInitialTaskNetwork);
        }
        debug!(
            facts = model.num_facts(),
            operators = model.num_operators(),
            tasks = model.num_abstract_tasks(),
            methods = model.num_decompositions(),
            "model built"
        );
        Ok(model)
    }
}

/// Replaces a lone grounder-inserted top task by its single method's network.
///
/// The task and method stay in the model so global ids remain dense; they are
/// simply no longer reachable from the initial task network.
fn strip_artificial_top(model: &mut Model) {
    let [TaskRef::Abstract(top)] = model.initial_tn.as_slice() else {
        return;
    };
    let task = &model.abstract_tasks[*top];
    if !task.name.starts_with(ARTIFICIAL_TOP_PREFIX) {
        return;
    }
    if let [method] = task.decompositions.as_slice() {
        let network = model.decompositions[*method].task_network.clone();
        debug!(top = %task.name, subtasks = network.len(), "stripped artificial top task");
        model.initial_tn = network;
    }
}
