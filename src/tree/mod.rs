/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The live control tree that state is captured from and distributed onto.
//!
//! Nodes are stored in a slab arena and addressed by [NodeId] handles, which keeps parent
//! back-references cheap and lets identifier resolution walk in both directions. A node is
//! created detached ([ControlTree::new_node] / [ControlTree::new_scope]), configured, and then
//! [attached](ControlTree::attach); attaching registers local names with the enclosing
//! identifier scope (duplicate names are a fatal construction error), assigns automatic names
//! in attachment order, invalidates cached identifiers, and applies any state envelope parked
//! for the new child's locator by an earlier distribute pass.
//!
//! The tree is strictly single-request, single-thread-of-control data; nothing in here locks.

pub(crate) mod node;

use std::fmt::{self, Display, Formatter};
use std::sync::mpsc::Sender;
use std::time::SystemTime;

use crate::events::{Event, PendingStateAppliedEvent};
use crate::identity::{default_name, DataItemContext, RenderIdMode};
use crate::state::bag::{StateAdapter, StateBag, StateContainer};
use crate::state::distribute::{distribute, DistributeOutcome};
use crate::state::envelope::{ChildLocator, StateEnvelope};

use node::NodeData;

/// Handle to a node in a [ControlTree]. Handles of removed nodes are stale; passing one to any
/// tree method is a caller bug and panics.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct NodeId(u32);

impl Display for NodeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

pub struct ControlTree {
    slots: Vec<Option<NodeData>>,
    free: Vec<u32>,
    root: NodeId,
    default_render_mode: RenderIdMode,
    /// Identifiers of nodes that must forcibly re-run postback handling on the next request.
    requires_postback: Vec<String>,
    event_publisher: Option<Sender<Event>>,
}

impl ControlTree {
    /// Create a tree whose root is an identifier scope with no name.
    pub fn new() -> ControlTree {
        let mut tree = ControlTree {
            slots: Vec::new(),
            free: Vec::new(),
            root: NodeId(0),
            default_render_mode: RenderIdMode::Auto,
            requires_postback: Vec::new(),
            event_publisher: None,
        };
        tree.root = tree.insert(NodeData::new(true));
        tree
    }

    pub fn with_default_render_mode(mode: RenderIdMode) -> ControlTree {
        let mut tree = ControlTree::new();
        tree.default_render_mode = mode;
        tree
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub(crate) fn default_render_mode(&self) -> RenderIdMode {
        self.default_render_mode
    }

    /// Route tree-originated events (currently pending-state application) to a subscriber.
    pub fn set_event_publisher(&mut self, publisher: Sender<Event>) {
        self.event_publisher = Some(publisher);
    }

    /* ↓↓↓ Node construction ↓↓↓ */

    pub fn new_node(&mut self) -> NodeId {
        self.insert(NodeData::new(false))
    }

    pub fn new_scope(&mut self) -> NodeId {
        self.insert(NodeData::new(true))
    }

    fn insert(&mut self, data: NodeData) -> NodeId {
        if let Some(index) = self.free.pop() {
            self.slots[index as usize] = Some(data);
            NodeId(index)
        } else {
            self.slots.push(Some(data));
            NodeId((self.slots.len() - 1) as u32)
        }
    }

    pub(crate) fn node(&self, id: NodeId) -> &NodeData {
        self.slots[id.0 as usize].as_ref().expect("stale NodeId")
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut NodeData {
        self.slots[id.0 as usize].as_mut().expect("stale NodeId")
    }

    /* ↓↓↓ Accessors ↓↓↓ */

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    pub fn local_name(&self, id: NodeId) -> Option<&str> {
        self.node(id).local_name.as_deref()
    }

    pub fn is_naming_scope(&self, id: NodeId) -> bool {
        self.node(id).naming_scope
    }

    pub fn is_attached(&self, id: NodeId) -> bool {
        id == self.root || self.node(id).parent.is_some()
    }

    pub fn key_children_by_name(&self, id: NodeId) -> bool {
        self.node(id).key_children_by_name
    }

    pub fn set_key_children_by_name(&mut self, id: NodeId, by_name: bool) {
        self.node_mut(id).key_children_by_name = by_name;
    }

    pub fn is_state_enabled(&self, id: NodeId) -> bool {
        self.node(id).state_enabled
    }

    pub fn set_state_enabled(&mut self, id: NodeId, enabled: bool) {
        self.node_mut(id).state_enabled = enabled;
    }

    pub fn set_auto_id(&mut self, id: NodeId, auto_id: bool) {
        self.node_mut(id).auto_id = auto_id;
    }

    pub fn render_mode(&self, id: NodeId) -> RenderIdMode {
        self.node(id).render_mode
    }

    pub fn set_render_mode(&mut self, id: NodeId, mode: RenderIdMode) {
        self.node_mut(id).render_mode = mode;
        self.clear_render_caches(id);
    }

    pub fn set_data_item(&mut self, id: NodeId, context: DataItemContext) {
        self.node_mut(id).data_item = Some(context);
        self.clear_render_caches(id);
    }

    pub fn set_adapter(&mut self, id: NodeId, adapter: Box<dyn StateAdapter>) {
        self.node_mut(id).adapter = Some(adapter);
    }

    pub(crate) fn adapter_capture(&self, id: NodeId) -> Option<crate::codec::Value> {
        self.node(id).adapter.as_ref().and_then(|a| a.capture())
    }

    pub(crate) fn adapter_restore(&mut self, id: NodeId, state: &crate::codec::Value) {
        if let Some(adapter) = self.node_mut(id).adapter.as_mut() {
            adapter.restore(state);
        }
    }

    pub fn bag(&self, id: NodeId) -> &StateBag {
        &self.node(id).bag
    }

    pub fn bag_mut(&mut self, id: NodeId) -> &mut StateBag {
        &mut self.node_mut(id).bag
    }

    /// Begin change tracking on every node's state bag. Called once tree construction for the
    /// request is complete, before user code mutates display state.
    pub fn begin_tracking(&mut self) {
        for slot in self.slots.iter_mut().flatten() {
            slot.bag.begin_tracking();
        }
    }

    /// Look a name up in a scope's region.
    pub fn find_in_scope(&self, scope: NodeId, name: &str) -> Option<NodeId> {
        self.node(scope).scope_names.get(name).copied()
    }

    /* ↓↓↓ Naming ↓↓↓ */

    /// The nearest ancestor that is an identifier scope, or `None` for the root and for nodes
    /// on a detached chain with no scope above them.
    pub fn naming_container(&self, id: NodeId) -> Option<NodeId> {
        let mut cur = self.node(id).parent;
        while let Some(node) = cur {
            if self.node(node).naming_scope {
                return Some(node);
            }
            cur = self.node(node).parent;
        }
        None
    }

    /// Assign an explicit local name. Duplicate names within the enclosing identifier scope are
    /// a fatal construction error; the tree must not be used after one is reported.
    pub fn set_local_name(&mut self, id: NodeId, name: &str) -> Result<(), TreeError> {
        if self.node(id).local_name.as_deref() == Some(name) && !self.node(id).auto_named {
            return Ok(());
        }
        if let Some(scope) = self.naming_container(id) {
            if let Some(holder) = self.node(scope).scope_names.get(name) {
                if *holder != id {
                    return Err(self.duplicate_name_error(scope, name));
                }
            }
            if let Some(old) = self.node(id).local_name.clone() {
                self.node_mut(scope).scope_names.remove(&old);
            }
            self.node_mut(scope)
                .scope_names
                .insert(name.to_string(), id);
        }
        let data = self.node_mut(id);
        data.local_name = Some(name.to_string());
        data.auto_named = false;
        // Every descendant identifier is prefixed by this name.
        self.nullify_ids(id);
        Ok(())
    }

    /// The node's local name, assigning one from the enclosing scope's counter if it has none.
    /// `None` if the node has no name and no enclosing scope to request one from.
    pub fn ensure_name(&mut self, id: NodeId) -> Option<String> {
        if let Some(name) = &self.node(id).local_name {
            return Some(name.clone());
        }
        let scope = self.naming_container(id)?;
        Some(self.assign_auto_name(id, scope))
    }

    fn assign_auto_name(&mut self, id: NodeId, scope: NodeId) -> String {
        loop {
            let ordinal = {
                let scope_data = self.node_mut(scope);
                let ordinal = scope_data.next_auto_ordinal;
                scope_data.next_auto_ordinal += 1;
                ordinal
            };
            let name = default_name(ordinal);
            // An explicit name may already occupy this ordinal's slot; skip forward.
            if !self.node(scope).scope_names.contains_key(&name) {
                self.node_mut(scope).scope_names.insert(name.clone(), id);
                let data = self.node_mut(id);
                data.local_name = Some(name.clone());
                data.auto_named = true;
                return name;
            }
        }
    }

    /// Reset a scope's automatic naming: zero the counter, drop every auto-assigned name in the
    /// scope's region, and re-derive names in document order. Names are a pure function of
    /// current order, not remembered history.
    pub fn reset_auto_names(&mut self, scope: NodeId) -> Result<(), TreeError> {
        if !self.node(scope).naming_scope {
            return Err(TreeError::NotAScope { node: scope });
        }
        self.node_mut(scope).next_auto_ordinal = 0;
        let region = self.region_below(scope);
        for id in &region {
            if self.node(*id).auto_named {
                let name = self.node(*id).local_name.clone();
                if let Some(name) = name {
                    self.node_mut(scope).scope_names.remove(&name);
                }
                let data = self.node_mut(*id);
                data.local_name = None;
                data.auto_named = false;
            }
        }
        for id in region {
            if self.node(id).auto_id && self.node(id).local_name.is_none() {
                self.assign_auto_name(id, scope);
            }
            self.nullify_ids(id);
        }
        Ok(())
    }

    /* ↓↓↓ Attachment ↓↓↓ */

    /// Attach `child` (and its subtree) as the last child of `parent`. A child already attached
    /// elsewhere is detached first. On success, any state envelope parked for the child's
    /// locator is applied immediately.
    pub fn attach(&mut self, parent: NodeId, child: NodeId) -> Result<(), TreeError> {
        if child == self.root {
            return Err(TreeError::InvalidAttachment {
                context: "the root cannot be attached",
            });
        }
        if parent == child || self.is_ancestor(child, parent) {
            return Err(TreeError::InvalidAttachment {
                context: "a node cannot be attached under itself",
            });
        }
        if self.node(child).parent.is_some() {
            self.detach(child);
        }

        let index = self.node(parent).children.len();
        self.node_mut(parent).children.push(child);
        self.node_mut(child).parent = Some(parent);

        self.register_region(child)?;
        self.nullify_ids(child);

        // A distribute pass earlier in this request may have parked state for exactly this
        // locator.
        let locator = if self.node(parent).key_children_by_name {
            match self.ensure_name(child) {
                Some(name) => ChildLocator::Name(name),
                None => ChildLocator::Position(index as u32),
            }
        } else {
            ChildLocator::Position(index as u32)
        };
        if let Some(envelope) = self.node_mut(parent).pending.remove(&locator) {
            let mut outcome = DistributeOutcome::default();
            distribute(self, child, envelope, &mut outcome)?;
            Event::publish(
                &self.event_publisher,
                Event::PendingStateApplied(PendingStateAppliedEvent {
                    timestamp: SystemTime::now(),
                    locator,
                }),
            );
        }
        Ok(())
    }

    /// Detach a node from its parent, keeping the subtree (and its state) alive for
    /// reattachment. Auto-assigned names in the detached region are cleared so they can be
    /// regenerated by the next scope.
    pub fn detach(&mut self, child: NodeId) {
        let parent = match self.node(child).parent {
            Some(parent) => parent,
            None => return,
        };
        for id in self.region_at(child) {
            let name = self.node(id).local_name.clone();
            if let Some(name) = name {
                if let Some(scope) = self.naming_container(id) {
                    self.node_mut(scope).scope_names.remove(&name);
                }
                if self.node(id).auto_named {
                    let data = self.node_mut(id);
                    data.local_name = None;
                    data.auto_named = false;
                }
            }
        }
        self.nullify_ids(child);
        self.node_mut(parent).children.retain(|c| *c != child);
        self.node_mut(child).parent = None;
    }

    /// Remove a node from the tree and destroy its subtree. All state held by the subtree is
    /// discarded and its handles become stale.
    pub fn remove(&mut self, child: NodeId) -> Result<(), TreeError> {
        if child == self.root {
            return Err(TreeError::InvalidAttachment {
                context: "the root cannot be removed",
            });
        }
        self.detach(child);
        for id in self.subtree(child) {
            self.slots[id.0 as usize] = None;
            self.free.push(id.0);
        }
        Ok(())
    }

    fn is_ancestor(&self, candidate: NodeId, of: NodeId) -> bool {
        let mut cur = self.node(of).parent;
        while let Some(node) = cur {
            if node == candidate {
                return true;
            }
            cur = self.node(node).parent;
        }
        false
    }

    /// Register the attached region's names with their (new) enclosing scopes, assigning
    /// automatic names in document order. Raises on the first duplicate explicit name; a
    /// failed attach leaves the tree unusable, as duplicate names are a construction error.
    fn register_region(&mut self, from: NodeId) -> Result<(), TreeError> {
        for id in self.region_at(from) {
            let scope = match self.naming_container(id) {
                Some(scope) => scope,
                // Still on a detached chain with no scope above; names are assigned when the
                // chain eventually attaches below one.
                None => continue,
            };
            match self.node(id).local_name.clone() {
                Some(name) => {
                    if let Some(holder) = self.node(scope).scope_names.get(&name) {
                        if *holder != id {
                            return Err(self.duplicate_name_error(scope, &name));
                        }
                    }
                    self.node_mut(scope).scope_names.insert(name, id);
                }
                None => {
                    if self.node(id).auto_id {
                        self.assign_auto_name(id, scope);
                    }
                }
            }
        }
        Ok(())
    }

    fn duplicate_name_error(&self, scope: NodeId, name: &str) -> TreeError {
        let scope_name = if scope == self.root {
            "<root>".to_string()
        } else {
            self.node(scope)
                .local_name
                .clone()
                .unwrap_or_else(|| scope.to_string())
        };
        TreeError::DuplicateLocalName {
            name: name.to_string(),
            scope: scope_name,
        }
    }

    /* ↓↓↓ Region and subtree walks ↓↓↓ */

    /// Pre-order walk starting at `from`, not descending into nested identifier scopes. The
    /// starting node is included even when it is itself a scope; its children then belong to
    /// its own region, not this one.
    fn region_at(&self, from: NodeId) -> Vec<NodeId> {
        let mut out = vec![from];
        if !self.node(from).naming_scope {
            for child in self.node(from).children.clone() {
                out.extend(self.region_at(child));
            }
        }
        out
    }

    /// Pre-order walk over a scope's region: the descendants whose naming container is this
    /// scope.
    fn region_below(&self, scope: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        for child in self.node(scope).children.clone() {
            out.extend(self.region_at(child));
        }
        out
    }

    fn subtree(&self, from: NodeId) -> Vec<NodeId> {
        let mut out = vec![from];
        for child in self.node(from).children.clone() {
            out.extend(self.subtree(child));
        }
        out
    }

    /* ↓↓↓ Identifier caches ↓↓↓ */

    /// Drop cached hierarchical and render identifiers for a node and every descendant.
    pub(crate) fn nullify_ids(&mut self, from: NodeId) {
        for id in self.subtree(from) {
            let data = self.node_mut(id);
            data.cached_unique_id = None;
            data.cached_render_id = None;
        }
    }

    pub(crate) fn clear_render_caches(&mut self, from: NodeId) {
        for id in self.subtree(from) {
            self.node_mut(id).cached_render_id = None;
        }
    }

    /* ↓↓↓ Forced postback handling ↓↓↓ */

    /// Record that a node must re-run postback handling on the next request even if the client
    /// posts no value for it. The list rides along with the captured state.
    pub fn register_requires_postback(&mut self, id: NodeId) {
        if let Some(unique_id) = self.unique_id(id) {
            if !self.requires_postback.contains(&unique_id) {
                self.requires_postback.push(unique_id);
            }
        }
    }

    pub fn requires_postback(&self) -> &[String] {
        &self.requires_postback
    }

    pub(crate) fn set_requires_postback(&mut self, ids: Vec<String>) {
        self.requires_postback = ids;
    }

    /* ↓↓↓ Pending state backlog ↓↓↓ */

    pub(crate) fn push_pending(&mut self, id: NodeId, locator: ChildLocator, env: StateEnvelope) {
        self.node_mut(id).pending.insert(locator, env);
    }

    /// Number of backlog entries currently parked below this node (for tests and diagnostics).
    pub fn pending_count(&self, id: NodeId) -> usize {
        self.node(id).pending.len()
    }

    /// Drop every backlog entry in the tree. The backlog is scoped to one request's distribute
    /// pass; the capture pass calls this so stale entries cannot leak into the next blob.
    pub(crate) fn clear_pending(&mut self) {
        for slot in self.slots.iter_mut().flatten() {
            slot.pending.clear();
        }
    }
}

impl Default for ControlTree {
    fn default() -> Self {
        ControlTree::new()
    }
}

/// Error while constructing or re-shaping the tree, or while applying captured state to it.
/// Structural integrity errors (duplicate names, malformed envelopes) are fatal: no partial
/// state is applied and the operation must not be retried.
#[derive(Debug)]
pub enum TreeError {
    DuplicateLocalName { name: String, scope: String },
    InvalidAttachment { context: &'static str },
    NotAScope { node: NodeId },
    MalformedEnvelope { context: &'static str },
    MalformedDelta { context: &'static str },
}

impl Display for TreeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            TreeError::DuplicateLocalName { name, scope } => write!(
                f,
                "duplicate local name '{}' within identifier scope '{}'",
                name, scope
            ),
            TreeError::InvalidAttachment { context } => {
                write!(f, "invalid attachment: {}", context)
            }
            TreeError::NotAScope { node } => {
                write!(f, "node {} is not an identifier scope", node)
            }
            TreeError::MalformedEnvelope { context } => {
                write!(f, "malformed state envelope: {}", context)
            }
            TreeError::MalformedDelta { context } => {
                write!(f, "malformed state delta: {}", context)
            }
        }
    }
}
