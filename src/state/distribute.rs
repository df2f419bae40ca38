/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The distribute pass: replay a previously captured envelope onto a (possibly structurally
//! different) tree.
//!
//! Structural drift is not an error. A child entry whose locator matches no live child is
//! parked in the parent's backlog; [ControlTree::attach](crate::tree::ControlTree::attach)
//! consults the backlog so that nodes created later in the same request still receive their
//! state. Entries left over at the end of a request represent nodes deliberately not recreated
//! this time, and are dropped when the next capture pass begins.

use crate::codec::Value;
use crate::tree::{ControlTree, NodeId, TreeError};

use super::bag::StateContainer;
use super::envelope::{root_from_value, ChildLocator, StateEnvelope};

/// Counts reported by a distribute pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DistributeOutcome {
    /// Nodes that had an envelope applied to them.
    pub applied: usize,
    /// Envelopes parked in a backlog because no live child matched their locator.
    pub deferred: usize,
}

/// Distribute a decoded root value (as produced by
/// [capture_root](super::capture::capture_root)) over the tree, restoring the
/// forced-postback list as a side effect.
pub fn distribute_root(
    tree: &mut ControlTree,
    value: &Value,
) -> Result<DistributeOutcome, TreeError> {
    let (envelope, requires_postback) = root_from_value(value)?;
    tree.set_requires_postback(requires_postback);
    let mut outcome = DistributeOutcome::default();
    if let Some(envelope) = envelope {
        distribute(tree, tree.root(), envelope, &mut outcome)?;
    }
    Ok(outcome)
}

/// Apply one envelope to one node: own delta first, then adapter delta, then match each child
/// entry against the live children. Positional locators index the child list directly; name
/// locators scan it (assigning names as needed). Unmatched entries go to the backlog.
pub(crate) fn distribute(
    tree: &mut ControlTree,
    node: NodeId,
    envelope: StateEnvelope,
    outcome: &mut DistributeOutcome,
) -> Result<(), TreeError> {
    let StateEnvelope {
        own,
        adapter,
        children,
    } = envelope;

    if let Some(own) = own {
        tree.bag_mut(node).apply_delta(&own)?;
    }
    if let Some(adapter) = adapter {
        tree.adapter_restore(node, &adapter);
    }
    outcome.applied += 1;

    for (locator, child_envelope) in children {
        let target = match &locator {
            ChildLocator::Position(index) => tree.children(node).get(*index as usize).copied(),
            ChildLocator::Name(name) => find_child_by_name(tree, node, name),
        };
        match target {
            Some(child) => distribute(tree, child, child_envelope, outcome)?,
            None => {
                tree.push_pending(node, locator, child_envelope);
                outcome.deferred += 1;
            }
        }
    }
    Ok(())
}

fn find_child_by_name(tree: &mut ControlTree, node: NodeId, name: &str) -> Option<NodeId> {
    let child_ids: Vec<NodeId> = tree.children(node).to_vec();
    for child in child_ids {
        if tree.ensure_name(child).as_deref() == Some(name) {
            return Some(child);
        }
    }
    None
}
