/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Per-node storage backing the [control tree](crate::tree::ControlTree).

use std::collections::HashMap;

use crate::identity::{DataItemContext, RenderIdMode};
use crate::state::bag::{StateAdapter, StateBag};
use crate::state::envelope::{ChildLocator, StateEnvelope};

use super::NodeId;

pub(crate) struct NodeData {
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,

    /// The node's local name. Either user-assigned or handed out by the enclosing identifier
    /// scope; `auto_named` records which.
    pub(crate) local_name: Option<String>,
    pub(crate) auto_named: bool,
    /// Whether the node participates in automatic name assignment at all. Pure markup nodes
    /// opt out.
    pub(crate) auto_id: bool,

    /// A node flagged as a naming scope guarantees local-name uniqueness among its descendants
    /// up to the next nested scope, and owns the counter that auto-assigned names are drawn
    /// from.
    pub(crate) naming_scope: bool,
    pub(crate) next_auto_ordinal: u32,
    /// Names registered in this scope's region, for duplicate detection and by-name lookup.
    /// Meaningful only when `naming_scope` is set.
    pub(crate) scope_names: HashMap<String, NodeId>,

    /// Capture keys this node's children by local name instead of position.
    pub(crate) key_children_by_name: bool,
    /// A disabled node contributes no own-state delta; its children are still walked.
    pub(crate) state_enabled: bool,

    pub(crate) render_mode: RenderIdMode,
    pub(crate) data_item: Option<DataItemContext>,

    // Identifier caches. Invalidated together, top-down, on rename, reparent, or scope-shape
    // changes.
    pub(crate) cached_unique_id: Option<String>,
    pub(crate) cached_render_id: Option<String>,

    pub(crate) bag: StateBag,
    pub(crate) adapter: Option<Box<dyn StateAdapter>>,

    /// State captured for a child that does not exist yet. Entries are applied and removed when
    /// a matching child attaches later in the same request; leftovers are dropped when the next
    /// capture pass begins.
    pub(crate) pending: HashMap<ChildLocator, StateEnvelope>,
}

impl NodeData {
    pub(crate) fn new(naming_scope: bool) -> NodeData {
        NodeData {
            parent: None,
            children: Vec::new(),
            local_name: None,
            auto_named: false,
            auto_id: true,
            naming_scope,
            next_auto_ordinal: 0,
            scope_names: HashMap::new(),
            key_children_by_name: false,
            state_enabled: true,
            render_mode: RenderIdMode::Inherit,
            data_item: None,
            cached_unique_id: None,
            cached_render_id: None,
            bag: StateBag::new(),
            adapter: None,
            pending: HashMap::new(),
        }
    }

    /// Whether the node carries a user-assigned (not scope-generated) name.
    pub(crate) fn has_explicit_name(&self) -> bool {
        self.local_name.is_some() && !self.auto_named
    }
}
