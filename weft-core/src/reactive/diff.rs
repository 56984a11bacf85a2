//! Input-set reconciliation.
//!
//! Each run of a derived node discovers the inputs it actually read. The
//! delta against the previous run's inputs tells the node which inputs to
//! subscribe to and which stored disconnectors to invoke.

use std::collections::HashSet;

use smallvec::SmallVec;

use super::node::NodeId;

/// Subscribe/unsubscribe deltas between two runs' input sets.
pub(crate) struct InputDelta {
    /// Inputs read by the latest run that the previous run did not read.
    pub(crate) added: SmallVec<[NodeId; 4]>,
    /// Inputs the previous run read that the latest run did not.
    pub(crate) removed: SmallVec<[NodeId; 4]>,
}

/// Reconcile the previous input list against the reads of the latest run.
///
/// Comparison is by node id. Both lists are already de-duplicated; the
/// deltas carry no ordering guarantee beyond enabling correct
/// subscribe/unsubscribe application.
pub(crate) fn diff_inputs(previous: &[NodeId], discovered: &[NodeId]) -> InputDelta {
    let before: HashSet<NodeId> = previous.iter().copied().collect();
    let after: HashSet<NodeId> = discovered.iter().copied().collect();

    InputDelta {
        added: discovered
            .iter()
            .filter(|id| !before.contains(id))
            .copied()
            .collect(),
        removed: previous
            .iter()
            .filter(|id| !after.contains(id))
            .copied()
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: usize) -> Vec<NodeId> {
        (0..n).map(|_| NodeId::next()).collect()
    }

    #[test]
    fn disjoint_sets_swap_entirely() {
        let all = ids(4);
        let delta = diff_inputs(&all[..2], &all[2..]);

        assert_eq!(delta.added.as_slice(), &all[2..]);
        assert_eq!(delta.removed.as_slice(), &all[..2]);
    }

    #[test]
    fn overlap_is_neither_added_nor_removed() {
        let all = ids(3);
        let previous = [all[0], all[1]];
        let discovered = [all[1], all[2]];

        let delta = diff_inputs(&previous, &discovered);
        assert_eq!(delta.added.as_slice(), &[all[2]]);
        assert_eq!(delta.removed.as_slice(), &[all[0]]);
    }

    #[test]
    fn identical_sets_produce_empty_deltas() {
        let all = ids(3);
        let delta = diff_inputs(&all, &all);

        assert!(delta.added.is_empty());
        assert!(delta.removed.is_empty());
    }

    #[test]
    fn empty_previous_adds_everything() {
        let all = ids(2);
        let delta = diff_inputs(&[], &all);

        assert_eq!(delta.added.as_slice(), all.as_slice());
        assert!(delta.removed.is_empty());
    }

    #[test]
    fn empty_discovery_removes_everything() {
        let all = ids(2);
        let delta = diff_inputs(&all, &[]);

        assert!(delta.added.is_empty());
        assert_eq!(delta.removed.as_slice(), all.as_slice());
    }
}
