//! Arena node identity and the per-slot storage the tree walks over.

use crate::behavior::Behavior;
use crate::status::Status;
use crate::tree::composite::CompositeNode;
use crate::tree::decorator::DecoratorNode;

/// Index into a `Tree`'s arena. Never an owning pointer — parent/child linkage is
/// always by `NodeId`, which is how the arena avoids `Rc<RefCell<_>>` cycles
/// (REDESIGN FLAGS: arena + indices instead of parent back-references).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct NodeId(pub usize);

impl NodeId {
    pub const ROOT: NodeId = NodeId(0);
}

/// One arena slot.
///
/// `Taken` is a transient placeholder `Tree::tick_node`/`terminate_node` swap in via
/// `mem::replace` while a node is being processed, so the recursive call into a
/// child doesn't alias the parent's own slot through `self`. It is never observed
/// outside of that window.
pub enum NodeSlot {
    Leaf(Box<dyn Behavior>),
    Composite(CompositeNode),
    Decorator(DecoratorNode),
    Taken,
}

impl NodeSlot {
    pub fn status(&self) -> Status {
        match self {
            NodeSlot::Leaf(b) => b.status(),
            NodeSlot::Composite(c) => c.status,
            NodeSlot::Decorator(d) => d.status,
            NodeSlot::Taken => unreachable!("node slot accessed while taken"),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            NodeSlot::Leaf(b) => b.name(),
            NodeSlot::Composite(c) => &c.name,
            NodeSlot::Decorator(d) => &d.name,
            NodeSlot::Taken => unreachable!("node slot accessed while taken"),
        }
    }

    pub fn feedback_message(&self) -> Option<&str> {
        match self {
            NodeSlot::Leaf(b) => b.feedback_message(),
            NodeSlot::Composite(c) => c.feedback_message.as_deref(),
            NodeSlot::Decorator(d) => d.feedback_message.as_deref(),
            NodeSlot::Taken => unreachable!("node slot accessed while taken"),
        }
    }

    pub fn children(&self) -> &[NodeId] {
        match self {
            NodeSlot::Leaf(b) => b.children(),
            NodeSlot::Composite(c) => &c.children,
            NodeSlot::Decorator(d) => &d.children,
            NodeSlot::Taken => unreachable!("node slot accessed while taken"),
        }
    }
}
