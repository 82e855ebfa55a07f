//! Fold-based visibility.
//!
//! Nothing is cached: folding, reparenting and deletion all change ancestor
//! chains. Single-node queries climb the chain; whole-graph queries make one
//! pass down from the roots and never enter a folded subtree.

use crate::EntityStore;
use mindmap_core::{Edge, Node, NodeId};
use std::collections::{HashSet, VecDeque};

/// A node is hidden iff some proper ancestor is folded. A folded node itself stays visible.
pub fn is_visible(store: &EntityStore, id: NodeId) -> bool {
    if !store.contains(id) {
        return false;
    }
    store
        .ancestors_of(id)
        .into_iter()
        .filter_map(|ancestor| store.node(ancestor))
        .all(|ancestor| !ancestor.folded)
}

fn visible_set(store: &EntityStore) -> HashSet<NodeId> {
    let mut visible = HashSet::with_capacity(store.len());
    let mut queue: VecDeque<NodeId> = store.roots().into();
    while let Some(id) = queue.pop_front() {
        if !visible.insert(id) {
            continue;
        }
        if store.node(id).is_some_and(|n| !n.folded) {
            queue.extend(store.children_of(id));
        }
    }
    visible
}

/// Visible nodes in draw order.
pub fn visible_nodes(store: &EntityStore) -> Vec<&Node> {
    let visible = visible_set(store);
    store.nodes().filter(|n| visible.contains(&n.id)).collect()
}

/// Edges whose endpoints are both visible.
pub fn visible_edges(store: &EntityStore) -> Vec<Edge> {
    let visible = visible_set(store);
    store
        .edges()
        .iter()
        .filter(|e| visible.contains(&e.parent) && visible.contains(&e.child))
        .copied()
        .collect()
}

/// Number of nodes currently hidden under `id` by folds (its own or deeper ones).
pub fn hidden_count(store: &EntityStore, id: NodeId) -> usize {
    if !is_visible(store, id) {
        return store.descendants_of(id).len();
    }
    let mut hidden = 0;
    let mut seen = HashSet::from([id]);
    let mut queue = VecDeque::from([(id, false)]);
    while let Some((current, current_hidden)) = queue.pop_front() {
        let below_hidden = current_hidden || store.node(current).is_some_and(|n| n.folded);
        for child in store.children_of(current) {
            if !seen.insert(child) {
                continue;
            }
            if below_hidden {
                hidden += 1;
            }
            queue.push_back((child, below_hidden));
        }
    }
    hidden
}
