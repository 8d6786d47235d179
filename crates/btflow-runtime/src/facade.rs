//! The agent-facing API: one `Runner`+`State` pair driven by two mutually
//! exclusive modes.
//!
//! Grounded line-for-line in `btflow/core/agent.py`'s `BTAgent`: `step()` for a
//! caller-driven tick (turn-based games, request/response loops), `run()` to hand
//! the tree to the reactive scheduler for a stretch of autonomous operation, and
//! `reset()` to bring both back to a clean slate. The two modes share one
//! `ReactiveRunner`; a mode field enforces that a `step()` cannot race a `run()`.

use std::collections::HashMap;

use btflow_core::{Status, Value};

use crate::checkpoint::Checkpointer;
use crate::error::{Result, RuntimeError};
use crate::runner::{ReactiveRunner, RunOptions};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Idle,
    Step,
    Run,
}

pub struct AgentFacade {
    runner: ReactiveRunner,
    mode: Mode,
}

pub struct RunRequest<'a> {
    pub input: Option<HashMap<String, Value>>,
    pub reset_tree: bool,
    pub reset_data: bool,
    pub max_ticks: Option<u64>,
    pub checkpointer: Option<&'a dyn Checkpointer>,
    pub checkpoint_interval: u64,
    pub thread_id: String,
    pub max_fps: f64,
}

impl AgentFacade {
    pub fn new(runner: ReactiveRunner) -> Self {
        AgentFacade { runner, mode: Mode::Idle }
    }

    /// One caller-driven tick. Disables auto-driving (a concurrent `run()` loop
    /// would otherwise race this same tick), resets action fields, optionally
    /// applies an observation, ticks once, and returns the resulting actions.
    pub fn step(&mut self, observation: Option<HashMap<String, Value>>) -> Result<HashMap<String, Value>> {
        if self.mode == Mode::Run {
            return Err(RuntimeError::ModeViolation("cannot step() while a run() is in progress".into()));
        }
        self.mode = Mode::Step;

        self.runner.set_auto_driving(false);
        self.runner.tree().store().reset_actions();
        if let Some(observation) = observation {
            self.runner.tree().store().update(observation)?;
        }
        self.runner.tick_once();

        let actions = self.runner.tree().store().get_actions();
        self.mode = Mode::Idle;
        Ok(actions)
    }

    /// Hands the tree to the reactive scheduler until it reaches a terminal
    /// status or `max_ticks` is hit.
    pub async fn run(&mut self, request: RunRequest<'_>) -> Result<Status> {
        if self.mode == Mode::Step {
            return Err(RuntimeError::ModeViolation("cannot run() while a step() is in progress".into()));
        }
        self.mode = Mode::Run;

        if request.reset_tree {
            self.runner.interrupt();
        }
        if request.reset_data {
            self.runner.tree().store().reset_to_defaults();
        }
        self.runner.drain_tick_signal();

        if let Some(input) = request.input {
            self.runner.tree().store().update(input)?;
        }

        let opts = RunOptions {
            max_ticks: request.max_ticks,
            checkpointer: request.checkpointer,
            checkpoint_interval: request.checkpoint_interval,
            thread_id: request.thread_id,
            max_fps: request.max_fps,
            hot_loop_multiplier: 1.5,
        };
        let result = self.runner.run(opts).await;
        self.mode = Mode::Idle;
        result
    }

    /// Interrupts the tree, optionally clears the store, drains any pending
    /// signal, and disables auto-driving.
    pub fn reset(&mut self, reset_data: bool) -> Result<()> {
        self.runner.interrupt();
        if reset_data {
            self.runner.tree().store().reset_to_defaults();
        }
        self.runner.drain_tick_signal();
        self.runner.set_auto_driving(false);
        self.mode = Mode::Idle;
        Ok(())
    }

    pub fn runner(&self) -> &ReactiveRunner {
        &self.runner
    }

    pub fn runner_mut(&mut self) -> &mut ReactiveRunner {
        &mut self.runner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use btflow_core::state::Schema;
    use btflow_core::state::StateStore;
    use btflow_core::tree::{CompositeKind, Tree, TreeBuilder};
    use btflow_core::Behavior;
    use std::time::Duration;

    struct CountingLeaf {
        status: Status,
    }
    impl Behavior for CountingLeaf {
        fn name(&self) -> &str {
            "leaf"
        }
        fn status(&self) -> Status {
            self.status
        }
        fn set_status(&mut self, status: Status) {
            self.status = status;
        }
        fn update(&mut self) -> Status {
            Status::Running
        }
    }

    fn facade() -> AgentFacade {
        let mut b = TreeBuilder::new();
        let leaf = b.leaf(Box::new(CountingLeaf { status: Status::Invalid }));
        let root = b.composite("seq", CompositeKind::Sequence { memory: true }, vec![leaf]);
        let tree = Tree::new(b.finish(), root, StateStore::new(Schema::builder().build()));
        let runner = ReactiveRunner::new(tree, Duration::from_secs(1)).unwrap();
        AgentFacade::new(runner)
    }

    #[test]
    fn step_ticks_once_and_returns_idle() {
        let mut agent = facade();
        let actions = agent.step(None).unwrap();
        assert!(actions.is_empty());
    }

    #[tokio::test]
    async fn run_rejects_while_stepping_is_not_possible_after_step_completes() {
        let mut agent = facade();
        agent.step(None).unwrap();
        // step() always returns to Idle before returning, so a subsequent run()
        // is allowed to proceed (verified by the lack of a ModeViolation here).
        let request = RunRequest {
            input: None,
            reset_tree: false,
            reset_data: false,
            max_ticks: Some(1),
            checkpointer: None,
            checkpoint_interval: 1,
            thread_id: "t".to_string(),
            max_fps: 60.0,
        };
        let status = agent.run(request).await.unwrap();
        assert_eq!(status, Status::Running);
    }
}
