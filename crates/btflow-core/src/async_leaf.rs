//! The `AsyncLeaf` plug-in contract.
//!
//! Just the trait: a leaf author implements `update_async` against plain
//! `async-trait` syntax without needing a tokio dependency of their own. The
//! concrete adapter that spawns this onto an executor, tracks the `JoinHandle`,
//! and bridges completion back into the synchronous `Behavior::update` polling
//! model lives in `btflow_runtime::async_leaf` (it needs tokio; this trait
//! doesn't). Grounded in `btflow/core/behaviour.py`'s `AsyncBehaviour`.

use async_trait::async_trait;

use crate::behavior::Behavior;
use crate::status::Status;

/// A leaf whose work is expressed as a single `async fn` rather than a poll loop.
///
/// **Structured concurrency rule** (spec.md §4.3): `update_async` must not spawn
/// fire-and-forget tasks of its own; fan-out belongs to a `Parallel` composite, or
/// must be fully awaited before `update_async` returns.
#[async_trait]
pub trait AsyncLeaf: Behavior {
    async fn update_async(&mut self) -> Status;
}
