/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Identifier resolution: local names, hierarchical identifiers, and render identifiers.
//!
//! A node's **local name** is either user-assigned or handed out by the nearest enclosing
//! identifier scope from a per-scope counter (`ctl00`, `ctl01`, ..., `ctl100`, ...). Its
//! **hierarchical identifier** qualifies the local name with every enclosing scope's
//! hierarchical identifier, joined by [ID_SEPARATOR]. Its **render identifier** is the
//! client-facing form, derived by one of three strategies selected per node (or inherited):
//!
//! - [RenderIdMode::Auto]: the hierarchical identifier with [ID_SEPARATOR] replaced by
//!   [RENDER_SEPARATOR].
//! - [RenderIdMode::Static]: the local name verbatim. The caller is responsible for its
//!   render-uniqueness.
//! - [RenderIdMode::Predictable]: a [RENDER_SEPARATOR]-joined chain built from each enclosing
//!   scope's *render* identifier, skipping the segment for the tree root, with a positional or
//!   key-derived suffix for nodes inside a repeating data region.
//!
//! Both identifiers are pure functions of current tree shape. They are cached on the node and
//! invalidated top-down on rename, reparent, or scope-shape changes. Resolving an identifier on
//! a node that has not been attached below any scope yields `None`, not an error.

use crate::tree::{ControlTree, NodeId};

/// Joins hierarchical identifier segments.
pub const ID_SEPARATOR: char = '$';

/// Joins render identifier segments; safe to use in markup `id` attributes.
pub const RENDER_SEPARATOR: char = '_';

/// Strategy for deriving a node's render identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderIdMode {
    /// Resolve through the nearest ancestor with a concrete mode, falling back to the tree's
    /// process-wide default. The default for every node.
    Inherit,
    Auto,
    Static,
    Predictable,
}

/// Repeating-data-region context attached to a scope that represents one bound item.
///
/// `key_suffix` holds the item's declared key field values, already resolved to strings; when
/// empty, `display_index` is used instead. A `bound_single` region head represents a
/// single-bound (non-repeating) control and must not contribute a suffix at all.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DataItemContext {
    pub display_index: i32,
    pub key_suffix: Vec<String>,
    pub bound_single: bool,
}

/// Format of scope-assigned automatic names: a fixed prefix with a zero-padded ordinal for the
/// first hundred allocations, unpadded after that.
pub(crate) fn default_name(ordinal: u32) -> String {
    if ordinal < 100 {
        format!("ctl{:02}", ordinal)
    } else {
        format!("ctl{}", ordinal)
    }
}

impl ControlTree {
    /// The node's fully-qualified hierarchical identifier, or `None` if the node has no name
    /// and no enclosing scope to derive one from. Cached until a rename or reparent
    /// invalidates it.
    pub fn unique_id(&mut self, id: NodeId) -> Option<String> {
        if let Some(cached) = &self.node(id).cached_unique_id {
            return Some(cached.clone());
        }
        let container = match self.naming_container(id) {
            Some(container) => container,
            None => return self.node(id).local_name.clone(),
        };
        let name = self.ensure_name(id)?;
        let prefix = self.unique_id(container);
        let unique_id = match prefix {
            Some(prefix) if container != self.root() => {
                format!("{}{}{}", prefix, ID_SEPARATOR, name)
            }
            _ => name,
        };
        self.node_mut(id).cached_unique_id = Some(unique_id.clone());
        Some(unique_id)
    }

    /// The node's client-facing render identifier under its effective mode. Cached alongside
    /// the hierarchical identifier.
    pub fn render_id(&mut self, id: NodeId) -> Option<String> {
        if let Some(cached) = &self.node(id).cached_render_id {
            return Some(cached.clone());
        }
        let rendered = match self.effective_render_mode(id) {
            RenderIdMode::Static => self
                .ensure_name(id)
                .or_else(|| self.node(id).local_name.clone()),
            RenderIdMode::Predictable => {
                let rendered = self.predictable_render_id(id);
                if rendered.is_empty() {
                    None
                } else {
                    Some(rendered)
                }
            }
            // Auto, and Inherit chains that bottomed out on the tree default.
            _ => self
                .unique_id(id)
                .map(|unique| unique.replace(ID_SEPARATOR, &RENDER_SEPARATOR.to_string())),
        };
        if let Some(rendered) = &rendered {
            self.node_mut(id).cached_render_id = Some(rendered.clone());
        }
        rendered
    }

    /// Resolve [RenderIdMode::Inherit] through the naming-container chain, bottoming out on the
    /// tree's default. Never returns `Inherit`.
    pub fn effective_render_mode(&self, id: NodeId) -> RenderIdMode {
        let mut cur = Some(id);
        while let Some(node) = cur {
            let mode = self.node(node).render_mode;
            if mode != RenderIdMode::Inherit {
                return mode;
            }
            cur = self.naming_container(node);
        }
        match self.default_render_mode() {
            RenderIdMode::Inherit => RenderIdMode::Auto,
            mode => mode,
        }
    }

    /// Predictable-mode construction. Recurses through enclosing scopes' *render* identifiers
    /// (not raw names) so the result stays stable under varying tree shapes, skips the segment
    /// for the tree root, and appends a repeating-region suffix for explicitly-named nodes
    /// bound to a data item.
    fn predictable_render_id(&mut self, id: NodeId) -> String {
        let explicit = self.node(id).has_explicit_name();
        let is_scope = self.node(id).naming_scope;
        let auto_id = self.node(id).auto_id;

        let mut own_segment = if explicit {
            self.node(id).local_name.clone().unwrap_or_default()
        } else {
            String::new()
        };
        if is_scope && !explicit {
            // An unnamed scope head still contributes a segment: its scope-assigned name.
            own_segment = match self.naming_container(id) {
                Some(_) => self.ensure_name(id).unwrap_or_default(),
                None => self.node(id).local_name.clone().unwrap_or_default(),
            };
        }

        let mut rendered = String::new();
        if let Some(container) = self.naming_container(id) {
            if container != self.root() {
                if self.node(container).has_explicit_name() {
                    if let Some(container_id) = self.render_id(container) {
                        rendered.push_str(&container_id);
                        rendered.push(RENDER_SEPARATOR);
                    }
                } else {
                    rendered.push_str(&self.predictable_render_id(container));
                    if !rendered.is_empty() {
                        rendered.push(RENDER_SEPARATOR);
                    }
                }
            }
        }

        if !explicit {
            if is_scope || !auto_id {
                rendered.push_str(&own_segment);
            } else if rendered.ends_with(RENDER_SEPARATOR) {
                // An anonymous auto-named leaf contributes no segment of its own.
                rendered.pop();
            }
            return rendered;
        }

        rendered.push_str(&own_segment);
        if let Some(context) = self
            .data_item_container(id)
            .and_then(|region_head| self.node(region_head).data_item.clone())
        {
            if !context.bound_single {
                if !context.key_suffix.is_empty() {
                    for value in &context.key_suffix {
                        rendered.push(RENDER_SEPARATOR);
                        rendered.push_str(value);
                    }
                } else if context.display_index >= 0 {
                    rendered.push(RENDER_SEPARATOR);
                    rendered.push_str(&context.display_index.to_string());
                }
            }
        }
        rendered
    }

    /// The nearest enclosing scope that carries a repeating-data-item context. The search
    /// starts above the node, so a region head never applies its own suffix to itself.
    fn data_item_container(&self, id: NodeId) -> Option<NodeId> {
        let mut cur = self.naming_container(id);
        while let Some(node) = cur {
            if self.node(node).data_item.is_some() {
                return Some(node);
            }
            cur = self.naming_container(node);
        }
        None
    }
}
