// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Name-addressed JSON interchange for grounded models.
//!
//! The grounding toolchain emits one document per problem; names are resolved
//! to dense indices through [`ModelBuilder`], so every validation rule of the
//! builder applies here too.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::{Model, ModelBuilder, TaskRef};
use crate::error::ModelError;

/// Grounded operator, by name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OperatorDoc {
    /// Operator name (shares the subtask namespace with abstract tasks).
    pub name: String,
    /// Action cost.
    pub cost: u32,
    /// Positive preconditions.
    pub pre: Vec<String>,
    /// Negative preconditions.
    pub neg_pre: Vec<String>,
    /// Add effects.
    pub add: Vec<String>,
    /// Delete effects.
    pub del: Vec<String>,
}

/// Grounded method, by name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DecompositionDoc {
    /// Method name.
    pub name: String,
    /// Abstract task refined by this method.
    pub task: String,
    /// Positive preconditions.
    pub pre: Vec<String>,
    /// Negative preconditions.
    pub neg_pre: Vec<String>,
    /// Ordered subtasks (operator or abstract task names).
    pub subtasks: Vec<String>,
}

/// A whole grounded problem.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelDocument {
    /// Fact names; position defines the fact id.
    pub facts: Vec<String>,
    /// Operators.
    pub operators: Vec<OperatorDoc>,
    /// Abstract task names.
    pub tasks: Vec<String>,
    /// Methods.
    pub methods: Vec<DecompositionDoc>,
    /// Facts true initially.
    pub init: Vec<String>,
    /// Goal facts.
    pub goal: Vec<String>,
    /// Initial task network.
    pub initial_tn: Vec<String>,
}

impl ModelDocument {
    /// Parses a JSON document.
    pub fn from_json(text: &str) -> Result<Self, ModelError> {
        serde_json::from_str(text).map_err(|e| ModelError::Document(e.to_string()))
    }

    /// Resolves every name and builds the model.
    pub fn into_model(self) -> Result<Model, ModelError> {
        let mut b = ModelBuilder::new();

        let facts = index_names("fact", &self.facts)?;
        for name in &self.facts {
            b.add_fact(name.clone());
        }

        let op_names: Vec<String> = self.operators.iter().map(|o| o.name.clone()).collect();
        let ops = index_names("operator", &op_names)?;
        let tasks = index_names("task", &self.tasks)?;
        if let Some(clash) = op_names.iter().find(|n| tasks.contains_key(n.as_str())) {
            return Err(ModelError::AmbiguousTaskName(clash.clone()));
        }
        index_names(
            "method",
            &self.methods.iter().map(|m| m.name.clone()).collect::<Vec<_>>(),
        )?;

        let fact_ids = |names: &[String]| -> Result<Vec<usize>, ModelError> {
            names.iter().map(|n| resolve("fact", &facts, n)).collect()
        };
        let task_ref = |name: &str| -> Result<TaskRef, ModelError> {
            if let Some(&i) = ops.get(name) {
                Ok(TaskRef::Operator(i))
            } else if let Some(&i) = tasks.get(name) {
                Ok(TaskRef::Abstract(i))
            } else {
                Err(ModelError::UnknownName {
                    kind: "task",
                    name: name.to_owned(),
                })
            }
        };

        for op in &self.operators {
            b.add_operator(
                op.name.clone(),
                op.cost,
                fact_ids(&op.pre)?,
                fact_ids(&op.neg_pre)?,
                fact_ids(&op.add)?,
                fact_ids(&op.del)?,
            );
        }
        for name in &self.tasks {
            b.add_abstract_task(name.clone());
        }
        for m in &self.methods {
            let task = resolve("task", &tasks, &m.task)?;
            let network = m
                .subtasks
                .iter()
                .map(|s| task_ref(s))
                .collect::<Result<Vec<_>, _>>()?;
            b.add_decomposition(
                m.name.clone(),
                task,
                fact_ids(&m.pre)?,
                fact_ids(&m.neg_pre)?,
                network,
            );
        }

        b.set_initial_state(fact_ids(&self.init)?);
        b.set_goals(fact_ids(&self.goal)?);
        let tn = self
            .initial_tn
            .iter()
            .map(|s| task_ref(s))
            .collect::<Result<Vec<_>, _>>()?;
        b.set_initial_tn(tn);
        b.build()
    }
}

fn index_names<'a>(
    kind: &'static str,
    names: &'a [String],
) -> Result<HashMap<&'a str, usize>, ModelError> {
    let mut index = HashMap::with_capacity(names.len());
    for (i, name) in names.iter().enumerate() {
        if index.insert(name.as_str(), i).is_some() {
            return Err(ModelError::DuplicateName {
                kind,
                name: name.clone(),
            });
        }
    }
    Ok(index)
}

fn resolve(
    kind: &'static str,
    index: &HashMap<&str, usize>,
    name: &str,
) -> Result<usize, ModelError> {
    index.get(name).copied().ok_or_else(|| ModelError::UnknownName {
        kind,
        name: name.to_owned(),
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    const DOC: &str = r#"{
        "facts": ["at-a", "at-b"],
        "operators": [
            {"name": "drive-a-b", "cost": 3, "pre": ["at-a"], "add": ["at-b"], "del": ["at-a"]}
        ],
        "tasks": ["goto-b"],
        "methods": [
            {"name": "m-drive", "task": "goto-b", "subtasks": ["drive-a-b"]}
        ],
        "init": ["at-a"],
        "goal": ["at-b"],
        "initial_tn": ["goto-b"]
    }"#;

    #[test]
    fn resolves_names_into_dense_ids() {
        let model = ModelDocument::from_json(DOC).unwrap().into_model().unwrap();
        assert_eq!(model.num_components(), 5);
        assert_eq!(model.operators()[0].cost, 3);
        assert_eq!(model.initial_tn(), &[TaskRef::Abstract(0)]);
        assert_eq!(
            model.decompositions()[0].task_network,
            vec![TaskRef::Operator(0)]
        );
        assert!(model.goals().contains(1));
    }

    #[test]
    fn unknown_fact_is_reported_by_name() {
        let mut doc = ModelDocument::from_json(DOC).unwrap();
        doc.goal = vec!["at-c".into()];
        assert_eq!(
            doc.into_model().unwrap_err(),
            ModelError::UnknownName {
                kind: "fact",
                name: "at-c".into()
            }
        );
    }

    #[test]
    fn operator_and_task_names_must_not_collide() {
        let mut doc = ModelDocument::from_json(DOC).unwrap();
        doc.tasks.push("drive-a-b".into());
        assert_eq!(
            doc.into_model().unwrap_err(),
            ModelError::AmbiguousTaskName("drive-a-b".into())
        );
    }

    #[test]
    fn malformed_json_is_a_document_error() {
        assert!(matches!(
            ModelDocument::from_json("{\"facts\": 3}"),
            Err(ModelError::Document(_))
        ));
    }
}
