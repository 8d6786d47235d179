//! The node contract every leaf, composite, and decorator implements.
//!
//! The tick lifecycle itself (initialise → update → maybe terminate → record) is
//! owned by the tree walker, not by individual nodes (spec.md §4.2) — a node only
//! implements the four primitives below. Parent linkage is an arena index
//! (`NodeId`, defined in `crate::tree::node`), never an owning pointer, so the tree
//! is a flat `Vec` rather than a graph of `Rc`/`RefCell` cycles.

use std::time::Duration;

use crate::error::Result;
use crate::state::StateStore;
use crate::status::Status;
use crate::tree::NodeId;

/// Callback a node invokes to ask the scheduler for a prompt re-tick. Bound once at
/// runner construction; nodes that never complete asynchronously simply never call
/// it.
pub type WakeFn = std::sync::Arc<dyn Fn() + Send + Sync>;

/// Core node behavior: the four lifecycle primitives plus status bookkeeping.
///
/// `initialise`/`update`/`terminate` mirror `py_trees.behaviour.Behaviour` in the
/// original (`btflow/core/behaviour.py`); `setup` and the `bind_*` hooks default to
/// no-ops so leaf authors only override what they need.
pub trait Behavior: Send {
    fn name(&self) -> &str;

    fn status(&self) -> Status;

    fn set_status(&mut self, status: Status);

    /// Called once per tick before the first `update()` since the node last left
    /// `Running`.
    fn initialise(&mut self) {}

    /// Produces this tick's status. The only primitive every node must implement.
    fn update(&mut self) -> Status;

    /// Called when `update()` just returned a terminal status, or the tree is being
    /// interrupted (in which case `new_status` is `Status::Invalid`).
    fn terminate(&mut self, new_status: Status) {
        let _ = new_status;
    }

    /// One-time setup pass, called in pre-order at `Tree::setup`. Default succeeds
    /// immediately; nodes that need to block (e.g. connecting to a backend) should
    /// respect `timeout` and return an error on expiry.
    fn setup(&mut self, timeout: Duration) -> Result<()> {
        let _ = timeout;
        Ok(())
    }

    /// Diagnostic text surfaced by trace events and checkpoint dumps; not part of
    /// the lifecycle contract itself.
    fn feedback_message(&self) -> Option<&str> {
        None
    }

    /// Children, in tick order. Empty for leaves; used by the tree walker and by
    /// checkpoint-restore's composite reconstruction (spec.md §4.7.1).
    fn children(&self) -> &[NodeId] {
        &[]
    }

    /// Called once at runner construction for nodes that want access to shared
    /// state. Default no-op; leaves that read/write state override it.
    fn bind_state_store(&mut self, store: &StateStore) {
        let _ = store;
    }

    /// Called once at runner construction. Async leaves store the callback and
    /// invoke it exactly once per task completion; everything else ignores it.
    fn bind_wake_up(&mut self, wake: WakeFn) {
        let _ = wake;
    }
}
