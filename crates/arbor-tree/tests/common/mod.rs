//! Shared helpers for the integration suites: event recorders and full-tree
//! structural invariant checks driven through the public accessors.
#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use arbor_tree::{BPlusTree, BTree, NodeId, TreeEvent};

pub type EventLog = Rc<RefCell<Vec<TreeEvent<i32>>>>;

/// Subscribes a recording listener and returns the shared event log.
pub fn record_bplus_events(tree: &mut BPlusTree<i32, i32>) -> EventLog {
    let events: EventLog = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&events);
    tree.subscribe(Box::new(move |event| sink.borrow_mut().push(event.clone())));
    events
}

pub fn record_btree_events(tree: &mut BTree<i32>) -> EventLog {
    let events: EventLog = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&events);
    tree.subscribe(Box::new(move |event| sink.borrow_mut().push(event.clone())));
    events
}

/// Ascending key sequence read through the leaf chain.
pub fn bplus_keys(tree: &BPlusTree<i32, i32>) -> Vec<i32> {
    tree.iter().map(|(key, _)| *key).collect()
}

/// Ascending key sequence from an in-order traversal.
pub fn btree_keys(tree: &BTree<i32>) -> Vec<i32> {
    fn walk(tree: &BTree<i32>, id: NodeId, out: &mut Vec<i32>) {
        let keys = tree.node_keys(id).expect("live node");
        let children = tree.node_children(id).expect("live node");
        if children.is_empty() {
            out.extend_from_slice(keys);
            return;
        }
        for (index, &child) in children.iter().enumerate() {
            walk(tree, child, out);
            if index < keys.len() {
                out.push(keys[index]);
            }
        }
    }

    let mut out = Vec::new();
    if let Some(root) = tree.root_id() {
        walk(tree, root, &mut out);
    }
    out
}

fn bplus_subtree_keys(tree: &BPlusTree<i32, i32>, id: NodeId, out: &mut Vec<i32>) {
    let keys = tree.node_keys(id).expect("live node");
    out.extend_from_slice(keys);
    let children = tree.node_children(id).expect("live node");
    for &child in children {
        bplus_subtree_keys(tree, child, out);
    }
}

fn bplus_leaf_keys_in_order(tree: &BPlusTree<i32, i32>, id: NodeId, out: &mut Vec<i32>) {
    let children = tree.node_children(id).expect("live node");
    if children.is_empty() {
        out.extend_from_slice(tree.node_keys(id).expect("live node"));
        return;
    }
    for &child in children {
        bplus_leaf_keys_in_order(tree, child, out);
    }
}

/// Checks every structural invariant of a B+-tree: equal leaf depth,
/// role-specific occupancy bounds (root exempt from minimums), strictly
/// ascending keys, pointer counts, separator routing, and leaf-chain
/// completeness.
pub fn check_bplus_invariants(tree: &BPlusTree<i32, i32>) {
    let Some(root) = tree.root_id() else {
        assert!(tree.is_empty());
        return;
    };
    let fanout = tree.config().fanout;
    let max_keys = fanout - 1;
    let leaf_min = (fanout - 1).div_ceil(2);
    let internal_min = fanout.div_ceil(2) - 1;

    let mut leaf_depths = Vec::new();
    let mut stack = vec![(root, 0usize)];
    while let Some((id, depth)) = stack.pop() {
        let keys = tree.node_keys(id).expect("live node");
        let children = tree.node_children(id).expect("live node");

        assert!(keys.len() <= max_keys, "node {id} holds {} keys", keys.len());
        assert!(
            keys.windows(2).all(|pair| pair[0] < pair[1]),
            "node {id} keys not strictly ascending: {keys:?}"
        );

        if children.is_empty() {
            leaf_depths.push(depth);
            if id != root {
                assert!(
                    keys.len() >= leaf_min,
                    "leaf {id} underfull: {} < {leaf_min}",
                    keys.len()
                );
            }
        } else {
            assert_eq!(
                children.len(),
                keys.len() + 1,
                "node {id} pointer count mismatch"
            );
            if id != root {
                assert!(
                    keys.len() >= internal_min,
                    "internal {id} underfull: {} < {internal_min}",
                    keys.len()
                );
            }
            for (index, &separator) in keys.iter().enumerate() {
                let mut left = Vec::new();
                bplus_subtree_keys(tree, children[index], &mut left);
                let mut right = Vec::new();
                bplus_subtree_keys(tree, children[index + 1], &mut right);
                assert!(
                    left.iter().all(|key| key < &separator),
                    "node {id}: key left of separator {separator} out of place"
                );
                assert!(
                    right.iter().all(|key| key >= &separator),
                    "node {id}: key right of separator {separator} out of place"
                );
            }
            for &child in children {
                stack.push((child, depth + 1));
            }
        }
    }
    assert!(
        leaf_depths.windows(2).all(|pair| pair[0] == pair[1]),
        "leaves at unequal depths: {leaf_depths:?}"
    );

    // The chain must visit exactly the leaves, left to right.
    let chained = bplus_keys(tree);
    let mut in_order = Vec::new();
    bplus_leaf_keys_in_order(tree, root, &mut in_order);
    assert_eq!(chained, in_order, "leaf chain disagrees with traversal");
    assert!(
        chained.windows(2).all(|pair| pair[0] < pair[1]),
        "leaf chain not ascending: {chained:?}"
    );
}

fn btree_subtree_keys(tree: &BTree<i32>, id: NodeId, out: &mut Vec<i32>) {
    out.extend_from_slice(tree.node_keys(id).expect("live node"));
    for &child in tree.node_children(id).expect("live node") {
        btree_subtree_keys(tree, child, out);
    }
}

/// Checks every structural invariant of a B-tree: equal leaf depth, occupancy
/// bounds (root exempt from the minimum), strictly ascending keys, pointer
/// counts, and strict subtree ordering around every separator.
pub fn check_btree_invariants(tree: &BTree<i32>) {
    let Some(root) = tree.root_id() else {
        assert!(tree.is_empty());
        return;
    };
    let fanout = tree.config().fanout;
    let max_keys = fanout - 1;
    let min_keys = fanout.div_ceil(2) - 1;

    let mut leaf_depths = Vec::new();
    let mut stack = vec![(root, 0usize)];
    while let Some((id, depth)) = stack.pop() {
        let keys = tree.node_keys(id).expect("live node");
        let children = tree.node_children(id).expect("live node");

        assert!(keys.len() <= max_keys, "node {id} holds {} keys", keys.len());
        assert!(
            keys.windows(2).all(|pair| pair[0] < pair[1]),
            "node {id} keys not strictly ascending: {keys:?}"
        );
        if id != root {
            assert!(
                keys.len() >= min_keys,
                "node {id} underfull: {} < {min_keys}",
                keys.len()
            );
        }

        if children.is_empty() {
            leaf_depths.push(depth);
        } else {
            assert_eq!(
                children.len(),
                keys.len() + 1,
                "node {id} pointer count mismatch"
            );
            for (index, &separator) in keys.iter().enumerate() {
                let mut left = Vec::new();
                btree_subtree_keys(tree, children[index], &mut left);
                let mut right = Vec::new();
                btree_subtree_keys(tree, children[index + 1], &mut right);
                assert!(
                    left.iter().all(|key| key < &separator),
                    "node {id}: key left of separator {separator} out of place"
                );
                assert!(
                    right.iter().all(|key| key > &separator),
                    "node {id}: key right of separator {separator} out of place"
                );
            }
            for &child in children {
                stack.push((child, depth + 1));
            }
        }
    }
    assert!(
        leaf_depths.windows(2).all(|pair| pair[0] == pair[1]),
        "leaves at unequal depths: {leaf_depths:?}"
    );

    let in_order = btree_keys(tree);
    assert!(
        in_order.windows(2).all(|pair| pair[0] < pair[1]),
        "in-order traversal not ascending: {in_order:?}"
    );
}
