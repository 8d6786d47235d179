//! The reactive scheduler: binds a [`Tree`] and its `StateStore` into one
//! wake-driven tick loop.
//!
//! Grounded line-for-line in `btflow/core/runtime.py`'s `ReactiveRunner`. The
//! single-slot coalescing `tick_signal` described there (idempotent sets, one wait
//! consumes it) maps onto `tokio::sync::Notify` directly — `notify_one()` before
//! anyone is waiting stores exactly one permit, and a burst of sets during one tick
//! collapses into the single permit a subsequent `notified()` consumes. The teacher
//! idiom for a coalescing wake is `aura-core/src/reactive/dynamic.rs`'s version
//! counter; `Notify` is the tokio-native equivalent for something that must block
//! between ticks rather than poll a counter.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use tokio::sync::Notify;

use btflow_core::state::SubscriptionId;
use btflow_core::tree::Tree;
use btflow_core::{Status, WakeFn};

use crate::checkpoint::{Checkpoint, Checkpointer};
use crate::error::Result;

pub struct RunOptions<'a> {
    pub max_ticks: Option<u64>,
    pub checkpointer: Option<&'a dyn Checkpointer>,
    pub checkpoint_interval: u64,
    pub thread_id: String,
    pub max_fps: f64,
    pub hot_loop_multiplier: f64,
}

impl<'a> RunOptions<'a> {
    pub fn new(thread_id: impl Into<String>, max_fps: f64) -> Self {
        RunOptions {
            max_ticks: None,
            checkpointer: None,
            checkpoint_interval: 1,
            thread_id: thread_id.into(),
            max_fps,
            hot_loop_multiplier: 1.5,
        }
    }
}

pub struct ReactiveRunner {
    tree: Tree,
    subscription: SubscriptionId,
    tick_signal: Arc<Notify>,
    auto_driving: Arc<AtomicBool>,
}

impl ReactiveRunner {
    /// Binds the runner to `tree`: runs `setup()`, injects the state store and a
    /// shared wake callback into every node, and subscribes to store updates.
    pub fn new(mut tree: Tree, setup_timeout: Duration) -> Result<Self> {
        tree.setup(setup_timeout)?;

        let tick_signal = Arc::new(Notify::new());
        let auto_driving = Arc::new(AtomicBool::new(false));

        let wake: WakeFn = gated_wake(&tick_signal, &auto_driving);
        tree.bind_state_store();
        tree.bind_wake_up(wake.clone());

        let subscriber_wake = gated_wake(&tick_signal, &auto_driving);
        let subscription = tree.store().subscribe(move || subscriber_wake());

        Ok(ReactiveRunner { tree, subscription, tick_signal, auto_driving })
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut Tree {
        &mut self.tree
    }

    /// Delegates to `Tree::tick()`; does not touch `tick_signal`.
    pub fn tick_once(&mut self) -> Status {
        self.tree.tick()
    }

    pub fn set_auto_driving(&self, on: bool) {
        self.auto_driving.store(on, Ordering::Release);
    }

    pub fn auto_driving(&self) -> bool {
        self.auto_driving.load(Ordering::Acquire)
    }

    pub fn signal_tick(&self) {
        self.tick_signal.notify_one();
    }

    /// Drains a pending tick signal without blocking, so a facade `run()` call can
    /// discard a stale wake-up left over from before the run started.
    pub fn drain_tick_signal(&self) {
        self.tick_signal.notified().now_or_never();
    }

    pub fn interrupt(&mut self) {
        self.tree.interrupt();
    }

    /// Disables driving, unsubscribes from the store, clears every leaf's wake
    /// callback, and interrupts the tree — the runner's `finally` equivalent.
    pub fn shutdown(&mut self) {
        self.set_auto_driving(false);
        self.tree.store().unsubscribe(self.subscription);
        self.tree.bind_wake_up(Arc::new(|| {}));
        self.tree.interrupt();
    }

    /// Restores tree and store state from a checkpoint per spec.md §4.7.1. Uses
    /// `initialize`, not `update`: the dump already holds complete field values, so
    /// running it back through a reducer (e.g. an append reducer would push the
    /// whole restored array as one element) or notifying subscribers before the
    /// tree itself is restored would both be wrong.
    fn restore_from(&mut self, checkpoint: &Checkpoint) -> Result<()> {
        self.tree.store().initialize(checkpoint.state_dump.clone())?;

        for (name, status_name) in &checkpoint.tree_state {
            let Some(id) = self.tree.find_by_name(name) else { continue };
            let Some(saved_status) = Status::parse(status_name) else { continue };

            let restored = match saved_status {
                Status::Running if !self.tree.is_composite(id) => Status::Invalid,
                other => other,
            };
            self.tree.restore_status(id, restored);

            if restored == Status::Running && self.tree.is_composite(id) {
                self.tree.repair_current_child(id)?;
            }
        }
        Ok(())
    }

    /// Runs ticks until the root reaches a terminal status or `max_ticks` is hit.
    pub async fn run(&mut self, opts: RunOptions<'_>) -> Result<Status> {
        self.set_auto_driving(true);

        if let Some(checkpointer) = opts.checkpointer {
            if let Some(checkpoint) = checkpointer.load_latest(&opts.thread_id).await? {
                self.restore_from(&checkpoint)?;
            }
        }

        self.signal_tick();

        let tick_period = Duration::from_secs_f64(1.0 / opts.max_fps);
        let hot_loop_threshold = opts.hot_loop_multiplier * opts.max_fps;

        let mut tick_count: u64 = 0;
        let mut window_start = Instant::now();
        let mut window_ticks: u32 = 0;
        let mut warned_this_window = false;

        let result = loop {
            self.tick_signal.notified().await;

            let tick_start = Instant::now();
            let status = self.tree.tick();
            tick_count += 1;

            if let Some(checkpointer) = opts.checkpointer {
                if opts.checkpoint_interval > 0 && tick_count % opts.checkpoint_interval == 0 {
                    checkpointer.save(&self.snapshot(&opts.thread_id, tick_count)).await?;
                }
            }

            if status.is_terminal() {
                break Ok(status);
            }
            if let Some(max_ticks) = opts.max_ticks {
                if tick_count >= max_ticks {
                    break Ok(status);
                }
            }

            let elapsed = tick_start.elapsed();
            if elapsed < tick_period {
                tokio::time::sleep(tick_period - elapsed).await;
            } else {
                tokio::task::yield_now().await;
            }

            window_ticks += 1;
            if window_start.elapsed() >= Duration::from_secs(1) {
                window_start = Instant::now();
                window_ticks = 0;
                warned_this_window = false;
            }
            if !warned_this_window && window_ticks as f64 > hot_loop_threshold {
                tracing::warn!(
                    ticks_per_second = window_ticks,
                    threshold = hot_loop_threshold,
                    "behavior tree is hot-looping"
                );
                warned_this_window = true;
            }
        };

        self.shutdown();
        result
    }

    fn snapshot(&self, thread_id: &str, step: u64) -> Checkpoint {
        let tree_state = self
            .tree
            .iterate()
            .into_iter()
            .map(|id| (self.tree.name_of(id).to_string(), self.tree.status_of(id).to_string()))
            .collect();
        Checkpoint {
            thread_id: thread_id.to_string(),
            step,
            timestamp: chrono::Utc::now(),
            state_dump: self.tree.store().get_all(),
            tree_state,
        }
    }
}

fn gated_wake(tick_signal: &Arc<Notify>, auto_driving: &Arc<AtomicBool>) -> WakeFn {
    let tick_signal = tick_signal.clone();
    let auto_driving = auto_driving.clone();
    Arc::new(move || {
        if auto_driving.load(Ordering::Acquire) {
            tick_signal.notify_one();
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use btflow_core::state::Schema;
    use btflow_core::state::StateStore;
    use btflow_core::tree::{CompositeKind, TreeBuilder};
    use btflow_core::Behavior;

    struct OneShotLeaf {
        status: Status,
    }
    impl Behavior for OneShotLeaf {
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
            Status::Success
        }
    }

    fn build_tree() -> Tree {
        let mut b = TreeBuilder::new();
        let leaf = b.leaf(Box::new(OneShotLeaf { status: Status::Invalid }));
        let root = b.composite("seq", CompositeKind::Sequence { memory: false }, vec![leaf]);
        Tree::new(b.finish(), root, StateStore::new(Schema::builder().build()))
    }

    #[tokio::test]
    async fn run_terminates_on_first_success() {
        let tree = build_tree();
        let mut runner = ReactiveRunner::new(tree, Duration::from_secs(1)).unwrap();
        let opts = RunOptions::new("thread-a", 60.0);
        let status = runner.run(opts).await.unwrap();
        assert_eq!(status, Status::Success);
        assert!(!runner.auto_driving());
    }

    #[tokio::test]
    async fn tick_once_does_not_touch_signal() {
        let tree = build_tree();
        let mut runner = ReactiveRunner::new(tree, Duration::from_secs(1)).unwrap();
        assert_eq!(runner.tick_once(), Status::Success);
    }
}
