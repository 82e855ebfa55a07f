use mindmap_core::{Camera, Color, Edge, Node, NodeId, Vec2};
use mindmap_graph::{EntityStore, hidden_count, visible_edges, visible_nodes};

/// In-progress right-drag connection, drawn as a line from `from` to the cursor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RubberBand {
    pub from: NodeId,
    pub cursor: Vec2,
}

/// Everything a renderer needs for one frame. Read-only view of the session.
#[derive(Debug, Clone)]
pub struct RenderFrame<'a> {
    /// Visible nodes, bottom-most first.
    pub nodes: Vec<&'a Node>,
    pub edges: Vec<Edge>,
    pub camera: Camera,
    pub background: Color,
    pub selected: Option<NodeId>,
    pub editing: Option<NodeId>,
    pub rubber_band: Option<RubberBand>,
    /// Folded visible nodes and how many nodes each one hides.
    pub fold_badges: Vec<(NodeId, usize)>,
}

impl<'a> RenderFrame<'a> {
    pub(crate) fn build(
        store: &'a EntityStore,
        selected: Option<NodeId>,
        editing: Option<NodeId>,
        rubber_band: Option<RubberBand>,
    ) -> Self {
        let nodes = visible_nodes(store);
        let fold_badges = nodes
            .iter()
            .filter(|n| n.folded && store.has_children(n.id))
            .map(|n| (n.id, hidden_count(store, n.id)))
            .collect();
        Self {
            nodes,
            edges: visible_edges(store),
            camera: store.camera(),
            background: store.background(),
            selected,
            editing,
            rubber_band,
            fold_badges,
        }
    }

    pub fn node(&self, id: NodeId) -> Option<&'a Node> {
        self.nodes.iter().copied().find(|n| n.id == id)
    }
}
