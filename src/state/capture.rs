/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The capture pass: walk the live tree depth-first, post-order, and assemble every non-trivial
//! per-node delta into one nested envelope.

use crate::codec::Value;
use crate::tree::{ControlTree, NodeId, TreeError};

use super::bag::StateContainer;
use super::envelope::{root_to_value, ChildLocator, StateEnvelope};

/// Capture the whole tree. Returns the single value to serialize (envelope plus the
/// forced-postback side list), or `None` when no node contributed anything. Also reports how
/// many nodes produced a non-trivial envelope.
///
/// Entering the capture pass discards any backlog left over from this request's distribute
/// pass: parked state belongs to one request only and must not leak into the next blob.
pub fn capture_root(tree: &mut ControlTree) -> Result<(Option<Value>, usize), TreeError> {
    tree.clear_pending();
    let mut captured = 0;
    let envelope = capture(tree, tree.root(), &mut captured)?;
    let requires_postback: Vec<String> = tree.requires_postback().to_vec();
    Ok((root_to_value(envelope.as_ref(), &requires_postback), captured))
}

/// Capture one node. Children are captured first; only those producing a non-absent envelope
/// are collected, keyed positionally unless this node keys its children by name (which forces
/// name assignment before capture). Returns `None` when the node's own delta, its adapter
/// delta, and every child envelope are absent.
pub(crate) fn capture(
    tree: &mut ControlTree,
    node: NodeId,
    captured: &mut usize,
) -> Result<Option<StateEnvelope>, TreeError> {
    let child_ids: Vec<NodeId> = tree.children(node).to_vec();
    let by_name = tree.key_children_by_name(node);

    let mut children = Vec::new();
    for (index, child) in child_ids.into_iter().enumerate() {
        if let Some(envelope) = capture(tree, child, captured)? {
            let locator = if by_name {
                match tree.ensure_name(child) {
                    Some(name) => ChildLocator::Name(name),
                    None => ChildLocator::Position(index as u32),
                }
            } else {
                ChildLocator::Position(index as u32)
            };
            children.push((locator, envelope));
        }
    }

    let own = if tree.is_state_enabled(node) {
        tree.bag(node).delta()
    } else {
        None
    };
    let adapter = tree.adapter_capture(node);

    let envelope = StateEnvelope {
        own,
        adapter,
        children,
    };
    if envelope.is_trivial() {
        Ok(None)
    } else {
        *captured += 1;
        Ok(Some(envelope))
    }
}
