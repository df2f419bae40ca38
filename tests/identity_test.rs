//! Identifier rules: automatic naming, uniqueness within a scope, hierarchical identifier
//! shape and stability, and the three render-identifier strategies.

use viewstate_rs::identity::{DataItemContext, RenderIdMode};
use viewstate_rs::tree::{ControlTree, TreeError};

#[test]
fn unlabeled_nodes_are_named_in_attachment_order() {
    let mut tree = ControlTree::new();
    let root = tree.root();
    let a = tree.new_node();
    let b = tree.new_node();
    let c = tree.new_node();
    tree.attach(root, a).unwrap();
    tree.attach(root, b).unwrap();
    tree.attach(root, c).unwrap();

    assert_eq!(tree.local_name(a), Some("ctl00"));
    assert_eq!(tree.local_name(b), Some("ctl01"));
    assert_eq!(tree.local_name(c), Some("ctl02"));
}

#[test]
fn names_re_derive_from_current_order_after_a_reset() {
    let mut tree = ControlTree::new();
    let root = tree.root();
    let a = tree.new_node();
    let b = tree.new_node();
    let c = tree.new_node();
    tree.attach(root, a).unwrap();
    tree.attach(root, b).unwrap();
    tree.attach(root, c).unwrap();

    tree.remove(b).unwrap();
    tree.reset_auto_names(root).unwrap();

    // Names are a pure function of current position, not remembered history.
    assert_eq!(tree.local_name(a), Some("ctl00"));
    assert_eq!(tree.local_name(c), Some("ctl01"));
}

#[test]
fn duplicate_explicit_names_in_one_scope_are_a_construction_error() {
    let mut tree = ControlTree::new();
    let root = tree.root();
    let first = tree.new_node();
    tree.attach(root, first).unwrap();
    tree.set_local_name(first, "save").unwrap();

    let second = tree.new_node();
    tree.attach(root, second).unwrap();
    assert!(matches!(
        tree.set_local_name(second, "save"),
        Err(TreeError::DuplicateLocalName { .. })
    ));

    // The collision is detected across levels too, as long as no nested scope intervenes.
    let wrapper = tree.new_node();
    let deep = tree.new_node();
    tree.attach(wrapper, deep).unwrap();
    tree.attach(root, wrapper).unwrap();
    assert!(tree.set_local_name(deep, "save").is_err());
}

#[test]
fn nested_scopes_isolate_names() {
    let mut tree = ControlTree::new();
    let root = tree.root();
    let outer = tree.new_node();
    tree.attach(root, outer).unwrap();
    tree.set_local_name(outer, "item").unwrap();

    let inner_scope = tree.new_scope();
    tree.attach(root, inner_scope).unwrap();
    let inner = tree.new_node();
    tree.attach(inner_scope, inner).unwrap();
    // Same name, different scope: fine.
    tree.set_local_name(inner, "item").unwrap();
}

#[test]
fn attaching_a_subtree_with_a_colliding_name_is_rejected() {
    let mut tree = ControlTree::new();
    let root = tree.root();
    let existing = tree.new_node();
    tree.attach(root, existing).unwrap();
    tree.set_local_name(existing, "toolbar").unwrap();

    // Build the colliding subtree while detached, then attach it.
    let wrapper = tree.new_node();
    let clash = tree.new_node();
    tree.attach(wrapper, clash).unwrap();
    tree.set_local_name(clash, "toolbar").unwrap();
    assert!(matches!(
        tree.attach(root, wrapper),
        Err(TreeError::DuplicateLocalName { .. })
    ));
}

#[test]
fn hierarchical_ids_are_scope_prefixed() {
    let mut tree = ControlTree::new();
    let root = tree.root();

    let form = tree.new_scope();
    tree.attach(root, form).unwrap();
    tree.set_local_name(form, "form").unwrap();

    let section = tree.new_node();
    tree.attach(form, section).unwrap();
    tree.set_local_name(section, "section").unwrap();

    let field = tree.new_node();
    tree.attach(section, field).unwrap();
    tree.set_local_name(field, "field").unwrap();

    // Children of the root scope are unprefixed; only scope boundaries contribute segments.
    assert_eq!(tree.unique_id(form).as_deref(), Some("form"));
    assert_eq!(tree.unique_id(section).as_deref(), Some("form$section"));
    assert_eq!(tree.unique_id(field).as_deref(), Some("form$field"));
}

#[test]
fn hierarchical_ids_are_stable_until_a_rename_and_change_for_all_descendants() {
    let mut tree = ControlTree::new();
    let root = tree.root();
    let form = tree.new_scope();
    tree.attach(root, form).unwrap();
    tree.set_local_name(form, "form").unwrap();
    let field = tree.new_node();
    tree.attach(form, field).unwrap();
    tree.set_local_name(field, "field").unwrap();

    let before = tree.unique_id(field);
    assert_eq!(tree.unique_id(field), before);

    tree.set_local_name(form, "renamed").unwrap();
    assert_eq!(tree.unique_id(form).as_deref(), Some("renamed"));
    assert_eq!(tree.unique_id(field).as_deref(), Some("renamed$field"));
}

#[test]
fn detached_nodes_resolve_to_their_explicit_name_or_nothing() {
    let mut tree = ControlTree::new();
    let loose = tree.new_node();
    assert_eq!(tree.unique_id(loose), None);
    assert_eq!(tree.render_id(loose), None);

    let named = tree.new_node();
    tree.set_local_name(named, "floating").unwrap();
    assert_eq!(tree.unique_id(named).as_deref(), Some("floating"));
}

#[test]
fn reattaching_regenerates_automatic_names() {
    let mut tree = ControlTree::new();
    let root = tree.root();
    let nursery = tree.new_scope();
    tree.attach(root, nursery).unwrap();

    let child = tree.new_node();
    tree.attach(nursery, child).unwrap();
    assert_eq!(tree.local_name(child), Some("ctl00"));

    let other_scope = tree.new_scope();
    tree.attach(root, other_scope).unwrap();
    let sibling = tree.new_node();
    tree.attach(other_scope, sibling).unwrap();
    assert_eq!(tree.local_name(sibling), Some("ctl00"));

    // Moving the child under the other scope clears its auto name and draws a fresh one.
    tree.attach(other_scope, child).unwrap();
    assert_eq!(tree.local_name(child), Some("ctl01"));
}

#[test]
fn auto_render_ids_substitute_the_separator() {
    let mut tree = ControlTree::new();
    let root = tree.root();
    let form = tree.new_scope();
    tree.attach(root, form).unwrap();
    tree.set_local_name(form, "form").unwrap();
    let field = tree.new_node();
    tree.attach(form, field).unwrap();
    tree.set_local_name(field, "field").unwrap();

    assert_eq!(tree.unique_id(field).as_deref(), Some("form$field"));
    assert_eq!(tree.render_id(field).as_deref(), Some("form_field"));
}

#[test]
fn static_render_ids_are_the_local_name_verbatim() {
    let mut tree = ControlTree::new();
    let root = tree.root();
    let form = tree.new_scope();
    tree.attach(root, form).unwrap();
    tree.set_local_name(form, "form").unwrap();
    let field = tree.new_node();
    tree.attach(form, field).unwrap();
    tree.set_local_name(field, "field").unwrap();
    tree.set_render_mode(field, RenderIdMode::Static);

    assert_eq!(tree.render_id(field).as_deref(), Some("field"));
}

fn predictable_fixture() -> (ControlTree, viewstate_rs::tree::NodeId, viewstate_rs::tree::NodeId) {
    let mut tree = ControlTree::with_default_render_mode(RenderIdMode::Predictable);
    let root = tree.root();

    let grid = tree.new_scope();
    tree.attach(root, grid).unwrap();
    tree.set_local_name(grid, "grid").unwrap();

    // One repeating item: an unnamed scope bound to the third data row.
    let item = tree.new_scope();
    tree.attach(grid, item).unwrap();
    tree.set_data_item(
        item,
        DataItemContext {
            display_index: 2,
            key_suffix: Vec::new(),
            bound_single: false,
        },
    );

    let label = tree.new_node();
    tree.attach(item, label).unwrap();
    tree.set_local_name(label, "lbl").unwrap();

    (tree, item, label)
}

#[test]
fn predictable_render_ids_chain_render_ids_and_append_the_display_index() {
    let (mut tree, _item, label) = predictable_fixture();
    assert_eq!(tree.unique_id(label).as_deref(), Some("grid$ctl00$lbl"));
    assert_eq!(tree.render_id(label).as_deref(), Some("grid_ctl00_lbl_2"));
}

#[test]
fn predictable_render_ids_prefer_declared_key_fields_over_the_index() {
    let (mut tree, item, label) = predictable_fixture();
    tree.set_data_item(
        item,
        DataItemContext {
            display_index: 2,
            key_suffix: vec!["alpha".to_string(), "7".to_string()],
            bound_single: false,
        },
    );
    assert_eq!(
        tree.render_id(label).as_deref(),
        Some("grid_ctl00_lbl_alpha_7")
    );
}

#[test]
fn single_bound_region_heads_suppress_the_suffix() {
    let (mut tree, item, label) = predictable_fixture();
    tree.set_data_item(
        item,
        DataItemContext {
            display_index: 2,
            key_suffix: vec!["alpha".to_string()],
            bound_single: true,
        },
    );
    assert_eq!(tree.render_id(label).as_deref(), Some("grid_ctl00_lbl"));
}

#[test]
fn predictable_render_ids_skip_the_root_scope_segment() {
    let mut tree = ControlTree::with_default_render_mode(RenderIdMode::Predictable);
    let root = tree.root();
    let top = tree.new_node();
    tree.attach(root, top).unwrap();
    tree.set_local_name(top, "top").unwrap();
    // No separator, no root segment.
    assert_eq!(tree.render_id(top).as_deref(), Some("top"));
}

#[test]
fn anonymous_leaves_contribute_no_predictable_segment() {
    let mut tree = ControlTree::with_default_render_mode(RenderIdMode::Predictable);
    let root = tree.root();
    let grid = tree.new_scope();
    tree.attach(root, grid).unwrap();
    tree.set_local_name(grid, "grid").unwrap();

    let anonymous = tree.new_node();
    tree.attach(grid, anonymous).unwrap();
    // The leaf got an auto name for its hierarchical id, but its predictable render id is
    // just the containing chain with the trailing separator trimmed.
    assert_eq!(tree.unique_id(anonymous).as_deref(), Some("grid$ctl00"));
    assert_eq!(tree.render_id(anonymous).as_deref(), Some("grid"));
}

#[test]
fn render_mode_is_inherited_from_the_nearest_ancestor_with_a_concrete_mode() {
    let mut tree = ControlTree::new();
    let root = tree.root();
    let form = tree.new_scope();
    tree.attach(root, form).unwrap();
    tree.set_local_name(form, "form").unwrap();
    tree.set_render_mode(form, RenderIdMode::Static);

    let field = tree.new_node();
    tree.attach(form, field).unwrap();
    tree.set_local_name(field, "field").unwrap();

    assert_eq!(tree.effective_render_mode(field), RenderIdMode::Static);
    assert_eq!(tree.render_id(field).as_deref(), Some("field"));
}
