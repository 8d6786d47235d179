//! Observers that ride along a tree walk without participating in it.
//!
//! Grounded in `py_trees.visitors.VisitorBase`: a `Tree::tick()` call runs every
//! registered visitor's `initialise()` before the walk, `visit(node)` for each node
//! as it is visited (pre-order, respecting each composite's own walk policy), and
//! `finalise()` after. Used for things like debug snapshotting or trace emission
//! without baking that logic into the tick algorithm itself.

use crate::status::Status;
use crate::tree::NodeId;

pub trait Visitor: Send {
    fn initialise(&mut self) {}

    /// Called once per node actually visited this tick, with its freshly recorded
    /// status and display name.
    fn visit(&mut self, id: NodeId, name: &str, status: Status) {
        let _ = (id, name, status);
    }

    fn finalise(&mut self) {}
}
