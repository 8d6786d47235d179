//! Arena construction helper.
//!
//! Nodes are added leaves-first (children before the composite/decorator that
//! references them), each returning the `NodeId` the caller threads into its
//! parent's child list — the same bottom-up construction the original assembles
//! in Python by passing already-built child objects into a composite's
//! constructor, just made explicit since there is no cyclic parent pointer to fix
//! up afterward.

use crate::behavior::Behavior;
use crate::tree::composite::{CompositeKind, CompositeNode};
use crate::tree::decorator::{DecoratorKind, DecoratorNode};
use crate::tree::node::{NodeId, NodeSlot};

#[derive(Default)]
pub struct TreeBuilder {
    slots: Vec<NodeSlot>,
}

impl TreeBuilder {
    pub fn new() -> Self {
        TreeBuilder::default()
    }

    pub fn leaf(&mut self, behavior: Box<dyn Behavior>) -> NodeId {
        let id = NodeId(self.slots.len());
        self.slots.push(NodeSlot::Leaf(behavior));
        id
    }

    pub fn composite(
        &mut self,
        name: impl Into<String>,
        kind: CompositeKind,
        children: Vec<NodeId>,
    ) -> NodeId {
        let id = NodeId(self.slots.len());
        self.slots
            .push(NodeSlot::Composite(CompositeNode::new(name, kind, children)));
        id
    }

    pub fn decorator(
        &mut self,
        name: impl Into<String>,
        kind: DecoratorKind,
        child: Option<NodeId>,
    ) -> NodeId {
        let id = NodeId(self.slots.len());
        self.slots
            .push(NodeSlot::Decorator(DecoratorNode::new(name, kind, child)));
        id
    }

    pub fn finish(self) -> Vec<NodeSlot> {
        self.slots
    }
}
