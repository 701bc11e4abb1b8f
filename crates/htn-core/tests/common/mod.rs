// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(dead_code)]
#![allow(clippy::unwrap_used)]

use std::time::Duration;

use htn_core::{Model, ModelBuilder, ResourceMonitor, SearchNode, SearchTelemetry, TaskRef};
use proptest::prelude::*;

/// One fact `holding`; `pick-up` adds it, `put-down` deletes it. Task `act`
/// may do either; the goal is `holding`.
pub fn pick_or_put() -> Model {
    let mut b = ModelBuilder::new();
    let holding = b.add_fact("holding");
    let pick = b.add_operator("pick-up", 1, [], [], [holding], []);
    let put = b.add_operator("put-down", 1, [], [], [], [holding]);
    let act = b.add_abstract_task("act");
    b.add_decomposition("m-pick", act, [], [], [TaskRef::Operator(pick)]);
    b.add_decomposition("m-put", act, [], [], [TaskRef::Operator(put)]);
    b.set_goals([holding]);
    b.set_initial_tn([TaskRef::Abstract(act)]);
    b.build().unwrap()
}

/// Task `deliver` has a method through `use-ramp` (needs `ramp`, which nothing
/// achieves) and a method through `carry`, which reaches the goal.
pub fn dead_end_method() -> Model {
    let mut b = ModelBuilder::new();
    let ramp = b.add_fact("ramp");
    let delivered = b.add_fact("delivered");
    let use_ramp = b.add_operator("use-ramp", 1, [ramp], [], [delivered], []);
    let carry = b.add_operator("carry", 3, [], [], [delivered], []);
    let deliver = b.add_abstract_task("deliver");
    b.add_decomposition("m-ramp", deliver, [], [], [TaskRef::Operator(use_ramp)]);
    b.add_decomposition("m-carry", deliver, [], [], [TaskRef::Operator(carry)]);
    b.set_goals([delivered]);
    b.set_initial_tn([TaskRef::Abstract(deliver)]);
    b.build().unwrap()
}

/// The only method of the initial task needs `key`, which is false.
pub fn locked_method() -> Model {
    let mut b = ModelBuilder::new();
    let key = b.add_fact("key");
    let open = b.add_operator("open", 1, [], [], [], []);
    let t = b.add_abstract_task("enter");
    b.add_decomposition("m-enter", t, [key], [], [TaskRef::Operator(open)]);
    b.set_initial_tn([TaskRef::Abstract(t)]);
    b.build().unwrap()
}

/// `loop` rewrites to `[loop, loop]` or `[noop]`; the goal fact is never
/// achieved, so blind search never terminates on its own.
pub fn endless_recursion() -> Model {
    let mut b = ModelBuilder::new();
    let g = b.add_fact("unreachable");
    let noop = b.add_operator("noop", 0, [], [], [], []);
    let t = b.add_abstract_task("loop");
    b.add_decomposition(
        "m-split",
        t,
        [],
        [],
        [TaskRef::Abstract(t), TaskRef::Abstract(t)],
    );
    b.add_decomposition("m-stop", t, [], [], [TaskRef::Operator(noop)]);
    b.set_goals([g]);
    b.set_initial_tn([TaskRef::Abstract(t)]);
    b.build().unwrap()
}

/// Two methods of `t` produce the same child node.
pub fn duplicate_methods() -> Model {
    let mut b = ModelBuilder::new();
    let noop = b.add_operator("noop", 1, [], [], [], []);
    let t = b.add_abstract_task("t");
    b.add_decomposition("m-a", t, [], [], [TaskRef::Operator(noop)]);
    b.add_decomposition("m-b", t, [], [], [TaskRef::Operator(noop)]);
    b.set_initial_tn([TaskRef::Abstract(t)]);
    b.build().unwrap()
}

/// Sleeps on every expansion.
pub struct SlowExpansion(pub Duration);

impl SearchTelemetry for SlowExpansion {
    fn on_expand(&mut self, _node: &SearchNode) {
        std::thread::sleep(self.0);
    }
}

/// Reports a fixed resident size.
pub struct FixedMemory(pub u64);

impl ResourceMonitor for FixedMemory {
    fn resident_bytes(&self) -> Option<u64> {
        Some(self.0)
    }
}

pub const FACTS: usize = 5;
pub const OPERATORS: usize = 4;
pub const TASKS: usize = 2;
pub const METHODS: usize = 4;

fn facts(max: usize) -> impl Strategy<Value = Vec<usize>> {
    prop::collection::vec(0..FACTS, 0..=max)
}

fn task_ref() -> impl Strategy<Value = TaskRef> {
    prop_oneof![
        (0..OPERATORS).prop_map(TaskRef::Operator),
        (0..TASKS).prop_map(TaskRef::Abstract),
    ]
}

type OperatorShape = (u32, Vec<usize>, Vec<usize>, Vec<usize>);
type MethodShape = (usize, Vec<usize>, Vec<TaskRef>);

/// Small random models with fixed component counts; recursion allowed.
pub fn arb_model() -> impl Strategy<Value = Model> {
    let op = (0u32..5, facts(2), facts(2), facts(1));
    let method = (0..TASKS, facts(1), prop::collection::vec(task_ref(), 0..=3));
    (
        prop::collection::vec(op, OPERATORS),
        prop::collection::vec(method, METHODS),
        facts(3),
        facts(2),
        prop::collection::vec(task_ref(), 1..=2),
    )
        .prop_map(|(ops, methods, init, goal, tn)| build(&ops, &methods, init, goal, tn))
}

fn build(
    ops: &[OperatorShape],
    methods: &[MethodShape],
    init: Vec<usize>,
    goal: Vec<usize>,
    tn: Vec<TaskRef>,
) -> Model {
    let mut b = ModelBuilder::new();
    for f in 0..FACTS {
        b.add_fact(format!("f{f}"));
    }
    for (i, (cost, pre, add, del)) in ops.iter().enumerate() {
        b.add_operator(
            format!("o{i}"),
            *cost,
            pre.clone(),
            [],
            add.clone(),
            del.clone(),
        );
    }
    for t in 0..TASKS {
        b.add_abstract_task(format!("t{t}"));
    }
    for (i, (task, pre, subtasks)) in methods.iter().enumerate() {
        b.add_decomposition(format!("m{i}"), *task, pre.clone(), [], subtasks.clone());
    }
    b.set_initial_state(init);
    b.set_goals(goal);
    b.set_initial_tn(tn);
    b.build().unwrap()
}

/// Random state over the fixed fact count.
pub fn arb_state() -> impl Strategy<Value = Vec<usize>> {
    facts(FACTS)
}
