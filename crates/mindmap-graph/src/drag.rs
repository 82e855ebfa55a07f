//! Drag gestures: rigid subtree translation, drop-target reparenting and
//! the side-mirroring heuristic.

use crate::hit_tester::HitTester;
use crate::store::EntityStore;
use crate::visibility::is_visible;
use mindmap_core::{Color, NodeId, Vec2};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Left,
    Right,
}

/// Which horizontal side of its immediate parent `id` sits on.
fn side_of(store: &EntityStore, id: NodeId) -> Option<Side> {
    let parent = store.node(store.parent_of(id)?)?;
    let node = store.node(id)?;
    let dx = node.position.x - parent.position.x;
    if dx > 0.0 {
        Some(Side::Right)
    } else if dx < 0.0 {
        Some(Side::Left)
    } else {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropOutcome {
    /// Released without having moved; treated as a click.
    Unmoved,
    /// Moved; the parent is unchanged.
    Moved,
    /// Dropped onto a valid target, which is now the parent.
    Reparented {
        previous: Option<NodeId>,
        parent: NodeId,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DropReport {
    pub node: NodeId,
    pub outcome: DropOutcome,
    /// Descendant offsets were mirrored horizontally.
    pub mirrored: bool,
    /// Net translation of the dragged node over the whole gesture.
    pub delta: Vec2,
}

impl DropReport {
    pub fn changed_graph(&self) -> bool {
        !matches!(self.outcome, DropOutcome::Unmoved)
    }
}

/// State held for the duration of one drag.
///
/// Descendant offsets are captured once at the start; motion updates never
/// look at the subtree again, so the subtree moves as one rigid body.
#[derive(Debug, Clone)]
pub struct DragGesture {
    node: NodeId,
    origin: Vec2,
    grab: Vec2,
    start_side: Option<Side>,
    offsets: Vec<(NodeId, Vec2)>,
    moved: bool,
}

impl DragGesture {
    /// Starts dragging `node` grabbed at `pointer`. Hidden or unknown nodes cannot be dragged.
    pub fn begin(store: &EntityStore, node: NodeId, pointer: Vec2) -> Option<Self> {
        if !is_visible(store, node) {
            return None;
        }
        let origin = store.node(node)?.position;
        let offsets = store
            .descendants_of(node)
            .into_iter()
            .filter_map(|id| store.node(id).map(|d| (id, d.position - origin)))
            .collect();

        Some(Self {
            node,
            origin,
            grab: origin - pointer,
            start_side: side_of(store, node),
            offsets,
            moved: false,
        })
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn origin(&self) -> Vec2 {
        self.origin
    }

    pub fn moved(&self) -> bool {
        self.moved
    }

    /// Moves the dragged node under the pointer and carries the captured subtree along.
    pub fn update(&mut self, store: &mut EntityStore, pointer: Vec2) {
        let target = pointer + self.grab;
        let Some(node) = store.node_mut(self.node) else {
            return;
        };
        node.position = target;
        if target != self.origin {
            self.moved = true;
        }
        self.place_subtree(store, target, false);
    }

    fn place_subtree(&self, store: &mut EntityStore, anchor: Vec2, mirror: bool) {
        for &(id, offset) in &self.offsets {
            let offset = if mirror {
                Vec2::new(-offset.x, offset.y)
            } else {
                offset
            };
            if let Some(descendant) = store.node_mut(id) {
                descendant.position = anchor + offset;
            }
        }
    }

    /// Ends the gesture at `pointer`, reparenting onto whatever valid target lies beneath.
    pub fn finish(mut self, store: &mut EntityStore, pointer: Vec2, tester: &HitTester) -> DropReport {
        self.update(store, pointer);
        let Some(position) = store.node(self.node).map(|n| n.position) else {
            return DropReport {
                node: self.node,
                outcome: DropOutcome::Unmoved,
                mirrored: false,
                delta: Vec2::ZERO,
            };
        };
        let delta = position - self.origin;
        if !self.moved {
            return DropReport {
                node: self.node,
                outcome: DropOutcome::Unmoved,
                mirrored: false,
                delta,
            };
        }

        let mut outcome = DropOutcome::Moved;
        if let Some(target) = tester.hit_test_excluding(store, pointer, self.node).node()
            && can_drop_onto(store, self.node, target)
        {
            match store.reparent(self.node, target) {
                Ok(previous) => {
                    if let Some(color) = store.node(target).map(|n| n.color) {
                        propagate_color(store, self.node, color);
                    }
                    tracing::debug!("reparented {} under {}", self.node, target);
                    outcome = DropOutcome::Reparented {
                        previous,
                        parent: target,
                    };
                }
                Err(err) => tracing::debug!("drop of {} on {} ignored: {}", self.node, target, err),
            }
        }

        let end_side = side_of(store, self.node);
        let mirrored = matches!(
            (self.start_side, end_side),
            (Some(start), Some(end)) if start != end
        );
        if mirrored {
            self.place_subtree(store, position, true);
        }

        DropReport {
            node: self.node,
            outcome,
            mirrored,
            delta,
        }
    }
}

/// A drop target must be a visible non-annotation node outside the dragged
/// subtree that is not already the parent.
pub fn can_drop_onto(store: &EntityStore, dragged: NodeId, target: NodeId) -> bool {
    let Some(node) = store.node(target) else {
        return false;
    };
    target != dragged
        && !node.is_annotation()
        && is_visible(store, target)
        && store.parent_of(dragged) != Some(target)
        && !store.is_descendant(dragged, target)
}

/// Paints `root` and its descendants with `color`. Annotations keep their own colour.
pub fn propagate_color(store: &mut EntityStore, root: NodeId, color: Color) {
    let mut targets = vec![root];
    targets.extend(store.descendants_of(root));
    for id in targets {
        if let Some(node) = store.node_mut(id)
            && !node.is_annotation()
        {
            node.color = color;
        }
    }
}
