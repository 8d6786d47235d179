//! Bridges a [`btflow_core::AsyncLeaf`] onto a synchronous [`Behavior`] by owning
//! the tokio task that runs it.
//!
//! Grounded in `btflow/core/behaviour.py`'s `AsyncBehaviour`, with the inner leaf
//! kept in an `Arc<tokio::sync::Mutex<_>>` rather than moved into the spawned task
//! outright — cancelling and re-spawning a task must not lose the leaf's own state
//! (e.g. a held client handle), and `initialise()`/`bind_state_store` are called
//! from synchronous code, so the construction-time accesses use `try_lock`, which
//! cannot contend because nothing else touches the leaf before the first task is
//! spawned.

use std::sync::Arc;

use btflow_core::{Behavior, WakeFn};
use btflow_core::{AsyncLeaf, Status};
use parking_lot::Mutex;
use tokio::task::AbortHandle;

enum TaskOutcome {
    Status(Status),
    Cancelled,
    Panicked(String),
}

pub struct AsyncLeafNode<L: AsyncLeaf + 'static> {
    name: String,
    inner: Arc<tokio::sync::Mutex<L>>,
    status: Status,
    scheduled: bool,
    abort_handle: Option<AbortHandle>,
    outcome: Arc<Mutex<Option<TaskOutcome>>>,
    wake: Option<WakeFn>,
    feedback_message: Option<String>,
}

impl<L: AsyncLeaf + 'static> AsyncLeafNode<L> {
    pub fn new(name: impl Into<String>, leaf: L) -> Self {
        AsyncLeafNode {
            name: name.into(),
            inner: Arc::new(tokio::sync::Mutex::new(leaf)),
            status: Status::Invalid,
            scheduled: false,
            abort_handle: None,
            outcome: Arc::new(Mutex::new(None)),
            wake: None,
            feedback_message: None,
        }
    }
}

impl<L: AsyncLeaf + 'static> Behavior for AsyncLeafNode<L> {
    fn name(&self) -> &str {
        &self.name
    }

    fn status(&self) -> Status {
        self.status
    }

    fn set_status(&mut self, status: Status) {
        self.status = status;
    }

    fn initialise(&mut self) {
        if let Some(handle) = self.abort_handle.take() {
            handle.abort();
        }
        *self.outcome.lock() = None;
        self.feedback_message = None;
        self.scheduled = true;

        let inner = Arc::clone(&self.inner);
        let worker = tokio::spawn(async move {
            let mut guard = inner.lock().await;
            guard.update_async().await
        });
        self.abort_handle = Some(worker.abort_handle());

        let outcome_slot = Arc::clone(&self.outcome);
        let wake = self.wake.clone();
        tokio::spawn(async move {
            let outcome = match worker.await {
                Ok(status) => TaskOutcome::Status(status),
                Err(e) if e.is_cancelled() => TaskOutcome::Cancelled,
                Err(e) => TaskOutcome::Panicked(e.to_string()),
            };
            *outcome_slot.lock() = Some(outcome);
            if let Some(wake) = wake {
                wake();
            }
        });
    }

    fn update(&mut self) -> Status {
        if !self.scheduled {
            return Status::Failure;
        }
        match self.outcome.lock().take() {
            None => Status::Running,
            Some(TaskOutcome::Status(s)) => s,
            Some(TaskOutcome::Cancelled) => Status::Invalid,
            Some(TaskOutcome::Panicked(message)) => {
                self.feedback_message = Some(message);
                Status::Failure
            }
        }
    }

    fn terminate(&mut self, _new_status: Status) {
        if let Some(handle) = self.abort_handle.take() {
            handle.abort();
        }
        self.scheduled = false;
    }

    fn setup(&mut self, timeout: std::time::Duration) -> btflow_core::Result<()> {
        match self.inner.try_lock() {
            Ok(mut guard) => guard.setup(timeout),
            Err(_) => {
                tracing::warn!(node = %self.name, "AsyncLeafNode::setup could not acquire inner lock");
                Ok(())
            }
        }
    }

    fn feedback_message(&self) -> Option<&str> {
        self.feedback_message.as_deref()
    }

    fn bind_state_store(&mut self, store: &btflow_core::state::StateStore) {
        match self.inner.try_lock() {
            Ok(mut guard) => guard.bind_state_store(store),
            Err(_) => tracing::warn!(node = %self.name, "AsyncLeafNode::bind_state_store could not acquire inner lock"),
        }
    }

    fn bind_wake_up(&mut self, wake: WakeFn) {
        self.wake = Some(wake);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct CountingLeaf {
        status: Status,
        calls: Arc<AtomicUsize>,
        result: Status,
    }

    impl Behavior for CountingLeaf {
        fn name(&self) -> &str {
            "counting"
        }
        fn status(&self) -> Status {
            self.status
        }
        fn set_status(&mut self, status: Status) {
            self.status = status;
        }
        fn update(&mut self) -> Status {
            unreachable!("AsyncLeafNode drives update_async, not update")
        }
    }

    #[async_trait]
    impl AsyncLeaf for CountingLeaf {
        async fn update_async(&mut self) -> Status {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result
        }
    }

    #[tokio::test]
    async fn completes_and_reports_status() {
        let calls = Arc::new(AtomicUsize::new(0));
        let leaf = CountingLeaf { status: Status::Invalid, calls: calls.clone(), result: Status::Success };
        let mut node = AsyncLeafNode::new("leaf", leaf);

        node.initialise();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(node.update(), Status::Success);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn update_without_initialise_fails() {
        let leaf = CountingLeaf { status: Status::Invalid, calls: Arc::new(AtomicUsize::new(0)), result: Status::Success };
        let mut node = AsyncLeafNode::new("leaf", leaf);
        assert_eq!(node.update(), Status::Failure);
    }

    #[tokio::test]
    async fn terminate_cancels_in_flight_task() {
        struct SleepyLeaf;
        impl Behavior for SleepyLeaf {
            fn name(&self) -> &str {
                "sleepy"
            }
            fn status(&self) -> Status {
                Status::Invalid
            }
            fn set_status(&mut self, _status: Status) {}
            fn update(&mut self) -> Status {
                unreachable!()
            }
        }
        #[async_trait]
        impl AsyncLeaf for SleepyLeaf {
            async fn update_async(&mut self) -> Status {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Status::Success
            }
        }

        let mut node = AsyncLeafNode::new("sleepy", SleepyLeaf);
        node.initialise();
        tokio::task::yield_now().await;
        node.terminate(Status::Invalid);
        assert!(node.abort_handle.is_none());
    }
}
