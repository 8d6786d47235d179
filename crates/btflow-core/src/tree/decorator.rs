//! `Inverter` and `LoopUntilSuccess`, the two single-child decorators.

use crate::status::Status;
use crate::tree::{NodeId, NodeTicker};

#[derive(Debug, Clone)]
pub enum DecoratorKind {
    Inverter,
    /// Retries `child` until `Success` or `iterations >= max_iterations`.
    LoopUntilSuccess { max_iterations: u32, iterations: u32 },
}

pub struct DecoratorNode {
    pub name: String,
    pub kind: DecoratorKind,
    /// Zero or one element — a decorator may be constructed without a real child
    /// at design time; ticking it then yields `Failure` (the placeholder rule
    /// carried over from `_Placeholder`/`bind_child` in the source material).
    pub children: Vec<NodeId>,
    pub status: Status,
    pub feedback_message: Option<String>,
}

impl DecoratorNode {
    pub fn new(name: impl Into<String>, kind: DecoratorKind, child: Option<NodeId>) -> Self {
        DecoratorNode {
            name: name.into(),
            kind,
            children: child.into_iter().collect(),
            status: Status::Invalid,
            feedback_message: None,
        }
    }

    pub fn child(&self) -> Option<NodeId> {
        self.children.first().copied()
    }

    pub fn tick(&mut self, ticker: &mut dyn NodeTicker) -> Status {
        let Some(child) = self.child() else {
            self.feedback_message = Some("decorator has no bound child".to_string());
            return Status::Failure;
        };

        match &mut self.kind {
            DecoratorKind::Inverter => match ticker.tick(child) {
                Status::Success => Status::Failure,
                Status::Failure => Status::Success,
                Status::Running => Status::Running,
                // A cancelled async child (or any leaf that legitimately returns
                // Invalid from update()) has nothing to invert; pass it through.
                Status::Invalid => Status::Invalid,
            },
            DecoratorKind::LoopUntilSuccess { max_iterations, iterations } => {
                match ticker.tick(child) {
                    Status::Success => {
                        *iterations = 0;
                        Status::Success
                    }
                    Status::Running => Status::Running,
                    Status::Failure => {
                        *iterations += 1;
                        if *iterations >= *max_iterations {
                            *iterations = 0;
                            Status::Failure
                        } else {
                            ticker.force_terminate(child, Status::Invalid);
                            ticker.signal();
                            Status::Running
                        }
                    }
                    // Matches the original's trailing `return Status.INVALID`
                    // fallback for a child status outside Success/Running/Failure.
                    Status::Invalid => Status::Invalid,
                }
            }
        }
    }

    /// Resets retry bookkeeping; called by `Tree::terminate_node` whenever the
    /// decorator itself goes terminal (spec: "reset counter" on Success/terminate).
    pub fn reset_retry_counter(&mut self) {
        if let DecoratorKind::LoopUntilSuccess { iterations, .. } = &mut self.kind {
            *iterations = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decorator_without_child_fails() {
        let mut node = DecoratorNode::new("inv", DecoratorKind::Inverter, None);
        struct NoopTicker;
        impl NodeTicker for NoopTicker {
            fn tick(&mut self, _id: NodeId) -> Status {
                unreachable!()
            }
            fn force_terminate(&mut self, _id: NodeId, _status: Status) {}
            fn signal(&mut self) {}
        }
        assert_eq!(node.tick(&mut NoopTicker), Status::Failure);
    }

    struct FixedTicker(Status);
    impl NodeTicker for FixedTicker {
        fn tick(&mut self, _id: NodeId) -> Status {
            self.0
        }
        fn force_terminate(&mut self, _id: NodeId, _status: Status) {}
        fn signal(&mut self) {}
    }

    #[test]
    fn inverter_passes_through_an_invalid_child_instead_of_panicking() {
        let mut node = DecoratorNode::new("inv", DecoratorKind::Inverter, Some(NodeId(0)));
        assert_eq!(node.tick(&mut FixedTicker(Status::Invalid)), Status::Invalid);
    }

    #[test]
    fn loop_until_success_passes_through_an_invalid_child_instead_of_panicking() {
        let mut node = DecoratorNode::new(
            "loop",
            DecoratorKind::LoopUntilSuccess { max_iterations: 3, iterations: 0 },
            Some(NodeId(0)),
        );
        assert_eq!(node.tick(&mut FixedTicker(Status::Invalid)), Status::Invalid);
    }
}
