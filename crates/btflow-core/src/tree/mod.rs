//! The behavior tree itself: an arena of nodes, ticked from the root.

mod builder;
mod composite;
mod decorator;
mod node;

pub use builder::TreeBuilder;
pub use composite::{CompositeKind, CompositeNode, ParallelPolicy};
pub use decorator::{DecoratorKind, DecoratorNode};
pub use node::{NodeId, NodeSlot};

use std::time::{Duration, Instant};

use crate::error::{BtflowError, Result};
use crate::state::StateStore;
use crate::status::Status;
use crate::visitor::Visitor;

/// The operations a composite/decorator needs from its containing tree while
/// ticking, without holding a borrow of the tree itself. `Tree` implements this by
/// recursing back into its own arena (see `Tree::tick_node`'s `mem::replace` trick
/// for why that recursion doesn't alias).
pub trait NodeTicker {
    fn tick(&mut self, id: NodeId) -> Status;
    /// Forces `id` (and, recursively, the parts of its subtree still `Running`)
    /// into `status`, calling `terminate` along the way. Used both for normal
    /// terminal cleanup and for external interruption.
    fn force_terminate(&mut self, id: NodeId, status: Status);
    /// Wakes the ambient scheduler without changing any state field — used by
    /// `LoopUntilSuccess` to schedule its retry tick (spec: "zero-change state
    /// notification").
    fn signal(&mut self);
}

pub struct Tree {
    slots: Vec<NodeSlot>,
    root: NodeId,
    store: StateStore,
    visitors: Vec<Box<dyn Visitor>>,
}

impl Tree {
    pub fn new(slots: Vec<NodeSlot>, root: NodeId, store: StateStore) -> Self {
        Tree { slots, root, store, visitors: Vec::new() }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn register_visitor(&mut self, visitor: Box<dyn Visitor>) {
        self.visitors.push(visitor);
    }

    pub fn status_of(&self, id: NodeId) -> Status {
        self.slots[id.0].status()
    }

    pub fn name_of(&self, id: NodeId) -> &str {
        self.slots[id.0].name()
    }

    pub fn children_of(&self, id: NodeId) -> &[NodeId] {
        self.slots[id.0].children()
    }

    pub fn is_composite(&self, id: NodeId) -> bool {
        matches!(self.slots[id.0], NodeSlot::Composite(_))
    }

    /// Pre-order walk calling `Behavior::setup` on every leaf (composites and
    /// decorators have no setup step of their own).
    pub fn setup(&mut self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        for id in self.iterate() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if let NodeSlot::Leaf(b) = &mut self.slots[id.0] {
                b.setup(remaining)?;
            }
        }
        Ok(())
    }

    /// Injects this tree's state store into every leaf (composites/decorators have
    /// no state-store hook of their own). Called once at Runner construction.
    pub fn bind_state_store(&mut self) {
        let store = self.store.clone();
        for slot in &mut self.slots {
            if let NodeSlot::Leaf(b) = slot {
                b.bind_state_store(&store);
            }
        }
    }

    /// Binds the same wake callback onto every leaf; an `AsyncLeaf` adapter invokes
    /// it once its background task completes, an ordinary sync leaf ignores it (the
    /// default `Behavior::bind_wake_up` is a no-op).
    pub fn bind_wake_up(&mut self, wake: crate::behavior::WakeFn) {
        for slot in &mut self.slots {
            if let NodeSlot::Leaf(b) = slot {
                b.bind_wake_up(wake.clone());
            }
        }
    }

    /// Depth-first pre-order over every arena slot (not gated by composite walk
    /// policy — this visits every node regardless of whether a real tick would
    /// reach it).
    pub fn iterate(&self) -> Vec<NodeId> {
        let mut out = Vec::with_capacity(self.slots.len());
        self.iterate_from(self.root, &mut out);
        out
    }

    fn iterate_from(&self, id: NodeId, out: &mut Vec<NodeId>) {
        out.push(id);
        for &child in self.slots[id.0].children() {
            self.iterate_from(child, out);
        }
    }

    /// Visits the root once, running registered visitors' `initialise`/`visit`/
    /// `finalise` around the walk.
    pub fn tick(&mut self) -> Status {
        for v in &mut self.visitors {
            v.initialise();
        }
        let before = self.iterate();
        let status = self.tick_node(self.root);
        for id in before {
            // Only report nodes whose status actually reflects this walk; a node
            // a memory-enabled composite skipped keeps its prior status, which is
            // still meaningful to report (e.g. an earlier Success still holds).
            let name = self.slots[id.0].name().to_string();
            let s = self.slots[id.0].status();
            for v in &mut self.visitors {
                v.visit(id, &name, s);
            }
        }
        for v in &mut self.visitors {
            v.finalise();
        }
        status
    }

    /// Terminates the root (and any `Running` subtree) with `Invalid`.
    pub fn interrupt(&mut self) {
        if self.status_of(self.root) == Status::Running {
            self.force_terminate(self.root, Status::Invalid);
        }
    }

    fn tick_node(&mut self, id: NodeId) -> Status {
        let mut slot = std::mem::replace(&mut self.slots[id.0], NodeSlot::Taken);
        let new_status = match &mut slot {
            NodeSlot::Leaf(b) => {
                if b.status() != Status::Running {
                    b.initialise();
                }
                b.update()
            }
            NodeSlot::Composite(c) => c.tick(self),
            NodeSlot::Decorator(d) => d.tick(self),
            NodeSlot::Taken => unreachable!(),
        };
        self.slots[id.0] = slot;

        if new_status.is_terminal() {
            self.terminate_node(id, new_status);
        } else {
            self.set_status(id, new_status);
        }
        new_status
    }

    fn set_status(&mut self, id: NodeId, status: Status) {
        match &mut self.slots[id.0] {
            NodeSlot::Leaf(b) => b.set_status(status),
            NodeSlot::Composite(c) => c.status = status,
            NodeSlot::Decorator(d) => d.status = status,
            NodeSlot::Taken => unreachable!(),
        }
    }

    /// The common terminate path: a leaf's `terminate(status)` runs directly; a
    /// composite interrupts any still-`Running` child to `Invalid`; a decorator
    /// interrupts its child (if still `Running`) to the *same* `status` it itself
    /// received. This single function backs both the generic post-tick terminate
    /// step and `NodeTicker::force_terminate`'s external interruption.
    fn terminate_node(&mut self, id: NodeId, status: Status) {
        let mut slot = std::mem::replace(&mut self.slots[id.0], NodeSlot::Taken);
        match &mut slot {
            NodeSlot::Leaf(b) => {
                b.terminate(status);
                b.set_status(status);
            }
            NodeSlot::Composite(c) => {
                let children = c.children.clone();
                c.status = status;
                self.slots[id.0] = slot;
                // `id`'s slot is a normal Composite again here, not Taken — safe to
                // recurse since every child below lives at a different arena index.
                for child in children {
                    if self.status_of(child) == Status::Running {
                        self.force_terminate(child, Status::Invalid);
                    }
                }
                return;
            }
            NodeSlot::Decorator(d) => {
                d.reset_retry_counter();
                let child = d.child();
                d.status = status;
                self.slots[id.0] = slot;
                if let Some(child) = child {
                    if self.status_of(child) == Status::Running {
                        self.force_terminate(child, status);
                    }
                }
                return;
            }
            NodeSlot::Taken => unreachable!(),
        }
        self.slots[id.0] = slot;
    }

    // --- Checkpoint-restore support (spec.md §4.7.1), driven by btflow-runtime ---

    pub fn find_by_name(&self, name: &str) -> Option<NodeId> {
        self.iterate().into_iter().find(|&id| self.slots[id.0].name() == name)
    }

    /// Sets a node's status directly, bypassing `initialise`/`terminate` — used
    /// only by checkpoint restore, which is reconstructing prior state rather than
    /// driving a tick.
    pub fn restore_status(&mut self, id: NodeId, status: Status) {
        self.set_status(id, status);
    }

    /// For a composite restored as `Running`, repairs `current_child` to the first
    /// child whose status has not yet met the composite's success criterion, or
    /// stops the composite with `Invalid` if none exists (spec.md §4.7.1 step 4).
    pub fn repair_current_child(&mut self, id: NodeId) -> Result<()> {
        let children = match &self.slots[id.0] {
            NodeSlot::Composite(c) => c.children.clone(),
            _ => {
                return Err(BtflowError::internal(format!(
                    "repair_current_child called on non-composite node {}",
                    id.0
                )))
            }
        };
        let is_sequence = matches!(
            &self.slots[id.0],
            NodeSlot::Composite(CompositeNode { kind: CompositeKind::Sequence { .. }, .. })
        );
        let is_parallel = matches!(
            &self.slots[id.0],
            NodeSlot::Composite(CompositeNode { kind: CompositeKind::Parallel { .. }, .. })
        );

        let next = children.iter().position(|&child| {
            let s = self.status_of(child);
            if is_parallel {
                matches!(s, Status::Invalid | Status::Running)
            } else if is_sequence {
                s != Status::Success
            } else {
                s != Status::Failure
            }
        });

        if let NodeSlot::Composite(c) = &mut self.slots[id.0] {
            match next {
                Some(i) => c.current_child = i,
                None => {
                    c.status = Status::Invalid;
                    c.current_child = 0;
                }
            }
        }
        Ok(())
    }
}

impl NodeTicker for Tree {
    fn tick(&mut self, id: NodeId) -> Status {
        self.tick_node(id)
    }

    fn force_terminate(&mut self, id: NodeId, status: Status) {
        self.terminate_node(id, status);
    }

    fn signal(&mut self) {
        self.store.signal();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::Behavior;
    use crate::state::Schema;

    struct FixedLeaf {
        name: String,
        status: Status,
        result: Status,
        ticks: u32,
    }

    impl FixedLeaf {
        fn new(name: &str, result: Status) -> Self {
            FixedLeaf { name: name.to_string(), status: Status::Invalid, result, ticks: 0 }
        }
    }

    impl Behavior for FixedLeaf {
        fn name(&self) -> &str {
            &self.name
        }
        fn status(&self) -> Status {
            self.status
        }
        fn set_status(&mut self, status: Status) {
            self.status = status;
        }
        fn update(&mut self) -> Status {
            self.ticks += 1;
            self.result
        }
    }

    fn store() -> StateStore {
        StateStore::new(Schema::builder().build())
    }

    #[test]
    fn sequence_stops_at_first_failure() {
        let mut b = TreeBuilder::new();
        let a = b.leaf(Box::new(FixedLeaf::new("a", Status::Success)));
        let f = b.leaf(Box::new(FixedLeaf::new("b", Status::Failure)));
        let c = b.leaf(Box::new(FixedLeaf::new("c", Status::Success)));
        let root = b.composite("seq", CompositeKind::Sequence { memory: false }, vec![a, f, c]);
        let mut tree = Tree::new(b.finish(), root, store());
        assert_eq!(tree.tick(), Status::Failure);
    }

    #[test]
    fn selector_succeeds_on_first_success() {
        let mut b = TreeBuilder::new();
        let f = b.leaf(Box::new(FixedLeaf::new("a", Status::Failure)));
        let s = b.leaf(Box::new(FixedLeaf::new("b", Status::Success)));
        let root = b.composite("sel", CompositeKind::Selector { memory: false }, vec![f, s]);
        let mut tree = Tree::new(b.finish(), root, store());
        assert_eq!(tree.tick(), Status::Success);
    }

    #[test]
    fn interrupt_forces_invalid_through_running_subtree() {
        let mut b = TreeBuilder::new();
        let r = b.leaf(Box::new(FixedLeaf::new("running", Status::Running)));
        let root = b.composite("seq", CompositeKind::Sequence { memory: true }, vec![r]);
        let mut tree = Tree::new(b.finish(), root, store());
        assert_eq!(tree.tick(), Status::Running);
        tree.interrupt();
        assert_eq!(tree.status_of(root), Status::Invalid);
        assert_eq!(tree.status_of(r), Status::Invalid);
    }

    #[test]
    fn iterate_is_pre_order() {
        let mut b = TreeBuilder::new();
        let a = b.leaf(Box::new(FixedLeaf::new("a", Status::Success)));
        let c = b.leaf(Box::new(FixedLeaf::new("c", Status::Success)));
        let root = b.composite("seq", CompositeKind::Sequence { memory: false }, vec![a, c]);
        let tree = Tree::new(b.finish(), root, store());
        assert_eq!(tree.iterate(), vec![root, a, c]);
    }
}
