//! `Sequence`, `Selector`, and `Parallel` composites.
//!
//! A composite ticks its children through a `NodeTicker` rather than owning them
//! directly, so it never needs a borrow of the arena that outlives one call — the
//! arena handles re-entrancy via `Tree::tick_node`'s `mem::replace` dance (see
//! `tree::node`). Interruption of lingering `Running` children on termination is
//! handled generically by `Tree::terminate_node`, not here.

use crate::status::Status;
use crate::tree::{NodeId, NodeTicker};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ParallelPolicy {
    SuccessOnAll,
    SuccessOnOne,
    FailureOnAll,
    FailureOnOne,
}

#[derive(Debug, Clone)]
pub enum CompositeKind {
    Sequence { memory: bool },
    Selector { memory: bool },
    Parallel {
        policy: ParallelPolicy,
        synchronise: bool,
        /// Per-child "already resolved to Success this round" flags, sized to
        /// `children.len()`. Only meaningful when `synchronise` is set.
        done: Vec<bool>,
    },
}

pub struct CompositeNode {
    pub name: String,
    pub kind: CompositeKind,
    pub children: Vec<NodeId>,
    /// Index of the child a memory-enabled Sequence/Selector resumes at.
    pub current_child: usize,
    pub status: Status,
    pub feedback_message: Option<String>,
}

impl CompositeNode {
    pub fn new(name: impl Into<String>, kind: CompositeKind, children: Vec<NodeId>) -> Self {
        CompositeNode {
            name: name.into(),
            kind,
            children,
            current_child: 0,
            status: Status::Invalid,
            feedback_message: None,
        }
    }

    /// True when this is the first tick since the composite last went terminal —
    /// i.e. the point at which a non-memory Sequence/Selector restarts from child 0
    /// and a Parallel clears its per-round `done` bookkeeping.
    fn fresh(&self) -> bool {
        self.status != Status::Running
    }

    pub fn tick(&mut self, ticker: &mut dyn NodeTicker) -> Status {
        match &mut self.kind {
            CompositeKind::Sequence { memory } => {
                let start = if *memory && !self.fresh() { self.current_child } else { 0 };
                for i in start..self.children.len() {
                    match ticker.tick(self.children[i]) {
                        Status::Success => continue,
                        Status::Running => {
                            self.current_child = i;
                            return Status::Running;
                        }
                        Status::Failure => {
                            self.current_child = 0;
                            return Status::Failure;
                        }
                        // A child may legitimately hand back Invalid (a cancelled
                        // async leaf, or any user-authored leaf); pass it through
                        // rather than treating it as an impossible state.
                        Status::Invalid => {
                            self.current_child = i;
                            return Status::Invalid;
                        }
                    }
                }
                self.current_child = 0;
                Status::Success
            }
            CompositeKind::Selector { memory } => {
                let start = if *memory && !self.fresh() { self.current_child } else { 0 };
                for i in start..self.children.len() {
                    match ticker.tick(self.children[i]) {
                        Status::Failure => continue,
                        Status::Running => {
                            self.current_child = i;
                            return Status::Running;
                        }
                        Status::Success => {
                            self.current_child = 0;
                            return Status::Success;
                        }
                        Status::Invalid => {
                            self.current_child = i;
                            return Status::Invalid;
                        }
                    }
                }
                self.current_child = 0;
                Status::Failure
            }
            CompositeKind::Parallel { policy, synchronise, done } => {
                if self.fresh() || done.len() != self.children.len() {
                    *done = vec![false; self.children.len()];
                }
                let mut statuses = Vec::with_capacity(self.children.len());
                for (i, &child) in self.children.iter().enumerate() {
                    if *synchronise && done[i] {
                        statuses.push(Status::Success);
                        continue;
                    }
                    let s = ticker.tick(child);
                    if s == Status::Success {
                        done[i] = true;
                    }
                    statuses.push(s);
                }
                aggregate_parallel(*policy, &statuses)
            }
        }
    }
}

fn aggregate_parallel(policy: ParallelPolicy, statuses: &[Status]) -> Status {
    let successes = statuses.iter().filter(|s| **s == Status::Success).count();
    let failures = statuses.iter().filter(|s| **s == Status::Failure).count();
    let total = statuses.len();
    match policy {
        ParallelPolicy::SuccessOnAll => {
            if failures > 0 {
                Status::Failure
            } else if successes == total {
                Status::Success
            } else {
                Status::Running
            }
        }
        ParallelPolicy::SuccessOnOne => {
            if successes > 0 {
                Status::Success
            } else if failures == total {
                Status::Failure
            } else {
                Status::Running
            }
        }
        ParallelPolicy::FailureOnAll => {
            if successes > 0 {
                Status::Success
            } else if failures == total {
                Status::Failure
            } else {
                Status::Running
            }
        }
        ParallelPolicy::FailureOnOne => {
            if failures > 0 {
                Status::Failure
            } else if successes == total {
                Status::Success
            } else {
                Status::Running
            }
        }
    }
}

/// Property-based law tests for `aggregate_parallel`, the way
/// `aura-core/tests/tree_policy_properties.rs` tests its policy lattice's laws.
/// `ParallelPolicy` isn't a lattice, but it has two genuine algebraic properties:
/// the result depends only on the multiset of child statuses (order-independence),
/// and `SuccessOnAll`/`FailureOnOne` and `SuccessOnOne`/`FailureOnAll` are each
/// pointwise identical — not a bug, but the way a two-outcome terminal status
/// makes "all succeed" and "none fail" (and "one succeeds" and "not all fail")
/// coincide, which is exactly what spec.md §4.4 means by "symmetric".
#[cfg(test)]
mod policy_laws {
    use super::*;
    use proptest::prelude::*;
    use proptest::proptest;

    fn status_strategy() -> impl Strategy<Value = Status> {
        prop_oneof![Just(Status::Success), Just(Status::Failure), Just(Status::Running)]
    }

    fn statuses_strategy() -> impl Strategy<Value = Vec<Status>> {
        proptest::collection::vec(status_strategy(), 0..8)
    }

    fn all_policies() -> [ParallelPolicy; 4] {
        [
            ParallelPolicy::SuccessOnAll,
            ParallelPolicy::SuccessOnOne,
            ParallelPolicy::FailureOnAll,
            ParallelPolicy::FailureOnOne,
        ]
    }

    proptest! {
        /// The result depends only on how many children succeeded/failed, not on
        /// which order they ticked in.
        #[test]
        fn order_independent(xs in statuses_strategy()) {
            let mut reversed = xs.clone();
            reversed.reverse();
            let mut rotated = xs.clone();
            rotated.rotate_left(xs.len() / 2);

            for policy in all_policies() {
                prop_assert_eq!(aggregate_parallel(policy, &xs), aggregate_parallel(policy, &reversed));
                prop_assert_eq!(aggregate_parallel(policy, &xs), aggregate_parallel(policy, &rotated));
            }
        }

        /// SuccessOnAll and FailureOnOne are pointwise identical, as are
        /// SuccessOnOne and FailureOnAll (spec.md §4.4: "symmetric").
        #[test]
        fn success_and_failure_policies_coincide_pairwise(xs in statuses_strategy()) {
            prop_assert_eq!(
                aggregate_parallel(ParallelPolicy::SuccessOnAll, &xs),
                aggregate_parallel(ParallelPolicy::FailureOnOne, &xs)
            );
            prop_assert_eq!(
                aggregate_parallel(ParallelPolicy::SuccessOnOne, &xs),
                aggregate_parallel(ParallelPolicy::FailureOnAll, &xs)
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_on_all_requires_every_child_success() {
        assert_eq!(
            aggregate_parallel(ParallelPolicy::SuccessOnAll, &[Status::Success, Status::Running]),
            Status::Running
        );
        assert_eq!(
            aggregate_parallel(ParallelPolicy::SuccessOnAll, &[Status::Success, Status::Success]),
            Status::Success
        );
        assert_eq!(
            aggregate_parallel(ParallelPolicy::SuccessOnAll, &[Status::Success, Status::Failure]),
            Status::Failure
        );
    }

    #[test]
    fn success_on_one_resolves_as_soon_as_one_succeeds() {
        assert_eq!(
            aggregate_parallel(ParallelPolicy::SuccessOnOne, &[Status::Running, Status::Success]),
            Status::Success
        );
        assert_eq!(
            aggregate_parallel(ParallelPolicy::SuccessOnOne, &[Status::Failure, Status::Failure]),
            Status::Failure
        );
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
    fn sequence_passes_through_an_invalid_child_instead_of_panicking() {
        let mut node = CompositeNode::new("seq", CompositeKind::Sequence { memory: false }, vec![NodeId(0)]);
        assert_eq!(node.tick(&mut FixedTicker(Status::Invalid)), Status::Invalid);
    }

    #[test]
    fn selector_passes_through_an_invalid_child_instead_of_panicking() {
        let mut node = CompositeNode::new("sel", CompositeKind::Selector { memory: false }, vec![NodeId(0)]);
        assert_eq!(node.tick(&mut FixedTicker(Status::Invalid)), Status::Invalid);
    }

    #[test]
    fn failure_on_one_is_symmetric_with_success_on_all() {
        assert_eq!(
            aggregate_parallel(ParallelPolicy::FailureOnOne, &[Status::Running, Status::Failure]),
            Status::Failure
        );
        assert_eq!(
            aggregate_parallel(ParallelPolicy::FailureOnOne, &[Status::Success, Status::Success]),
            Status::Success
        );
    }
}
