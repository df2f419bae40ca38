//! Drift tolerance: state captured from one tree shape must distribute onto a different shape
//! without error, applying what matches and parking the rest in the backlog for nodes that
//! are constructed later in the request.

use viewstate_rs::codec::Value;
use viewstate_rs::state::{capture_root, distribute_root};
use viewstate_rs::tree::{ControlTree, NodeId};

/// A scope keying its children by name, holding named children with one tracked state entry
/// each (the child's own name, so a misdelivery is visible).
fn named_panel(names: &[&str]) -> (ControlTree, NodeId, Vec<NodeId>) {
    let mut tree = ControlTree::new();
    let root = tree.root();
    let panel = tree.new_scope();
    tree.attach(root, panel).unwrap();
    tree.set_local_name(panel, "panel").unwrap();
    tree.set_key_children_by_name(panel, true);

    let mut children = Vec::new();
    for name in names {
        let child = tree.new_node();
        tree.attach(panel, child).unwrap();
        tree.set_local_name(child, name).unwrap();
        children.push(child);
    }
    tree.begin_tracking();
    for (child, name) in children.iter().zip(names) {
        tree.bag_mut(*child).set("value", *name);
    }
    (tree, panel, children)
}

fn captured_value(tree: &mut ControlTree) -> Value {
    let (value, _) = capture_root(tree).unwrap();
    value.expect("capture produced no state")
}

#[test]
fn by_name_state_follows_names_not_positions() {
    let (mut source, _, _) = named_panel(&["first", "second", "third"]);
    let value = captured_value(&mut source);

    // The target has the same children in reverse order.
    let (mut target, _, target_children) = named_panel(&["third", "second", "first"]);
    let outcome = distribute_root(&mut target, &value).unwrap();
    assert_eq!(outcome.deferred, 0);
    assert_eq!(
        target.bag(target_children[0]).get("value"),
        Some(&Value::String("third".to_string()))
    );
    assert_eq!(
        target.bag(target_children[2]).get("value"),
        Some(&Value::String("first".to_string()))
    );
}

#[test]
fn missing_by_name_children_park_their_state_until_attached() {
    let (mut source, _, _) = named_panel(&["first", "second", "third"]);
    let value = captured_value(&mut source);

    let (mut target, panel, _) = named_panel(&["first", "third"]);
    let outcome = distribute_root(&mut target, &value).unwrap();
    assert_eq!(outcome.deferred, 1);
    assert_eq!(target.pending_count(panel), 1);

    // A node with the missing name attached later in the same request receives the parked
    // state immediately.
    let late = target.new_node();
    target.set_local_name(late, "second").unwrap();
    target.attach(panel, late).unwrap();
    assert_eq!(target.pending_count(panel), 0);
    assert_eq!(
        target.bag(late).get("value"),
        Some(&Value::String("second".to_string()))
    );
}

#[test]
fn positional_backlog_resolves_in_attachment_order() {
    // Source: a plain container with three stateful children, positionally keyed.
    let mut source = ControlTree::new();
    let source_root = source.root();
    let mut source_children = Vec::new();
    for _ in 0..3 {
        let child = source.new_node();
        source.attach(source_root, child).unwrap();
        source_children.push(child);
    }
    source.begin_tracking();
    for (i, child) in source_children.iter().enumerate() {
        source.bag_mut(*child).set("index", i as i32);
    }
    let value = captured_value(&mut source);

    // Target: only the first child exists when state arrives.
    let mut target = ControlTree::new();
    let target_root = target.root();
    let existing = target.new_node();
    target.attach(target_root, existing).unwrap();

    let outcome = distribute_root(&mut target, &value).unwrap();
    assert_eq!(outcome.applied, 2); // the root and the one live child
    assert_eq!(outcome.deferred, 2);
    assert_eq!(target.bag(existing).get("index"), Some(&Value::I32(0)));

    // Dynamic construction during the load phase: each attach claims its position's entry.
    let second = target.new_node();
    target.attach(target_root, second).unwrap();
    assert_eq!(target.bag(second).get("index"), Some(&Value::I32(1)));

    let third = target.new_node();
    target.attach(target_root, third).unwrap();
    assert_eq!(target.bag(third).get("index"), Some(&Value::I32(2)));
    assert_eq!(target.pending_count(target_root), 0);
}

#[test]
fn leftover_backlog_is_not_an_error_and_does_not_leak_into_the_next_capture() {
    let (mut source, _, _) = named_panel(&["first", "second"]);
    let value = captured_value(&mut source);

    let (mut target, panel, _) = named_panel(&["first"]);
    let outcome = distribute_root(&mut target, &value).unwrap();
    assert_eq!(outcome.deferred, 1);
    assert_eq!(target.pending_count(panel), 1);

    // The node for the parked entry is deliberately never recreated. Capturing for the next
    // request drops the backlog and serializes only live state.
    let next_value = captured_value(&mut target);
    assert_eq!(target.pending_count(panel), 0);

    let (mut next_target, next_panel, _) = named_panel(&["first"]);
    let next_outcome = distribute_root(&mut next_target, &next_value).unwrap();
    assert_eq!(next_outcome.deferred, 0);
    assert_eq!(next_target.pending_count(next_panel), 0);
}

#[test]
fn state_disabled_nodes_contribute_no_own_delta_but_their_children_are_walked() {
    let mut source = ControlTree::new();
    let source_root = source.root();
    let holder = source.new_node();
    source.attach(source_root, holder).unwrap();
    source.set_state_enabled(holder, false);
    let child = source.new_node();
    source.attach(holder, child).unwrap();
    source.begin_tracking();
    source.bag_mut(holder).set("ignored", "holder");
    source.bag_mut(child).set("kept", "child");
    let value = captured_value(&mut source);

    let mut target = ControlTree::new();
    let target_root = target.root();
    let target_holder = target.new_node();
    target.attach(target_root, target_holder).unwrap();
    let target_child = target.new_node();
    target.attach(target_holder, target_child).unwrap();
    distribute_root(&mut target, &value).unwrap();

    assert_eq!(target.bag(target_holder).get("ignored"), None);
    assert_eq!(
        target.bag(target_child).get("kept"),
        Some(&Value::String("child".to_string()))
    );
}

#[test]
fn nodes_absent_from_the_captured_shape_are_left_untouched() {
    let (mut source, _, _) = named_panel(&["first"]);
    let value = captured_value(&mut source);

    let (mut target, _, target_children) = named_panel(&["first", "brand-new"]);
    target.bag_mut(target_children[1]).set("value", "fresh");
    distribute_root(&mut target, &value).unwrap();

    assert_eq!(
        target.bag(target_children[0]).get("value"),
        Some(&Value::String("first".to_string()))
    );
    assert_eq!(
        target.bag(target_children[1]).get("value"),
        Some(&Value::String("fresh".to_string()))
    );
}
