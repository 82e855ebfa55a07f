use crate::EntityStore;
use crate::visibility::is_visible;
use mindmap_core::{NodeId, Vec2};

/// Result of a hit test at a given position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitResult {
    /// Nothing was hit at the tested position.
    None,
    /// The topmost visible node under the position.
    Node(NodeId),
}

impl HitResult {
    pub fn node(self) -> Option<NodeId> {
        match self {
            HitResult::Node(id) => Some(id),
            HitResult::None => None,
        }
    }
}

/// Shape-aware picking over the live store.
///
/// Nodes are tested topmost (last drawn) first. Hidden nodes are never hit,
/// which is what keeps folded content out of selection, dragging and
/// connecting. Geometry comes from [`Node::footprint`], the
/// same function the renderer sizes nodes with.
#[derive(Debug, Clone, Default)]
pub struct HitTester;

impl HitTester {
    pub fn new() -> Self {
        Self
    }

    pub fn hit_test(&self, store: &EntityStore, pos: Vec2) -> HitResult {
        self.hit_test_filtered(store, pos, |_| true)
    }

    /// Like [`Self::hit_test`] but never reports `exclude`.
    pub fn hit_test_excluding(&self, store: &EntityStore, pos: Vec2, exclude: NodeId) -> HitResult {
        self.hit_test_filtered(store, pos, |id| id != exclude)
    }

    pub fn hit_test_filtered(
        &self,
        store: &EntityStore,
        pos: Vec2,
        accept: impl Fn(NodeId) -> bool,
    ) -> HitResult {
        for node in store.nodes().rev() {
            if !accept(node.id) || !node.hit(pos) {
                continue;
            }
            if is_visible(store, node.id) {
                return HitResult::Node(node.id);
            }
        }
        HitResult::None
    }
}
