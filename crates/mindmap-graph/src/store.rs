use mindmap_core::{
    Camera, Color, DEFAULT_BACKGROUND, Edge, GraphError, GraphSnapshot, Node, NodeId, NodeKind,
    Vec2,
};
use std::collections::{HashMap, HashSet, VecDeque};

/// Owns every node and edge and keeps the edge set a forest.
///
/// Nodes are kept in draw order (last drawn = topmost), edges in insertion
/// order, which is also the order `children_of` reports.
#[derive(Debug, Clone)]
pub struct EntityStore {
    nodes: HashMap<NodeId, Node>,
    order: Vec<NodeId>,
    edges: Vec<Edge>,
    parents: HashMap<NodeId, NodeId>,
    /// Children per parent in edge insertion order.
    children: HashMap<NodeId, Vec<NodeId>>,
    camera: Camera,
    background: Color,
    next_id: u64,
}

impl Default for EntityStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityStore {
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            order: Vec::new(),
            edges: Vec::new(),
            parents: HashMap::new(),
            children: HashMap::new(),
            camera: Camera::default(),
            background: DEFAULT_BACKGROUND,
            next_id: 1,
        }
    }

    /// Hands out a fresh id. Ids are never handed out twice by one store.
    pub fn allocate_id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    pub fn create_node(&mut self, kind: NodeKind, position: Vec2) -> NodeId {
        let id = self.allocate_id();
        self.order.push(id);
        self.nodes.insert(id, Node::new(id, kind, position));
        id
    }

    /// Inserts a fully built node, typically one whose id came from [`Self::allocate_id`].
    pub fn insert_node(&mut self, node: Node) -> Result<NodeId, GraphError> {
        let id = node.id;
        if self.nodes.contains_key(&id) {
            return Err(GraphError::Inconsistent(format!("node {id} already exists")));
        }
        self.next_id = self.next_id.max(id.0 + 1);
        self.order.push(id);
        self.nodes.insert(id, node);
        Ok(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    /// Nodes in draw order.
    pub fn nodes(&self) -> impl DoubleEndedIterator<Item = &Node> + '_ {
        self.order.iter().filter_map(|id| self.nodes.get(id))
    }

    pub fn node_ids(&self) -> &[NodeId] {
        &self.order
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn camera(&self) -> Camera {
        self.camera
    }

    pub fn set_camera(&mut self, camera: Camera) {
        self.camera = camera;
    }

    pub fn background(&self) -> Color {
        self.background
    }

    pub fn set_background(&mut self, color: Color) {
        self.background = color;
    }

    pub fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        self.parents.get(&id).copied()
    }

    pub fn children_of(&self, id: NodeId) -> Vec<NodeId> {
        self.children.get(&id).cloned().unwrap_or_default()
    }

    pub fn has_children(&self, id: NodeId) -> bool {
        self.children.get(&id).is_some_and(|c| !c.is_empty())
    }

    pub fn roots(&self) -> Vec<NodeId> {
        self.order
            .iter()
            .copied()
            .filter(|id| !self.parents.contains_key(id))
            .collect()
    }

    /// Every transitive descendant of `id`, breadth first, excluding `id`.
    pub fn descendants_of(&self, id: NodeId) -> Vec<NodeId> {
        let mut visited = HashSet::from([id]);
        let mut queue = VecDeque::from([id]);
        let mut out = Vec::new();

        while let Some(current) = queue.pop_front() {
            for &child in self.children.get(&current).into_iter().flatten() {
                if visited.insert(child) {
                    out.push(child);
                    queue.push_back(child);
                }
            }
        }
        out
    }

    /// True iff `node` is reachable from `ancestor` over outgoing edges.
    ///
    /// Every node has at most one parent, so this climbs from `node` instead
    /// of searching below `ancestor`.
    pub fn is_descendant(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut seen = HashSet::new();
        let mut current = node;
        while let Some(parent) = self.parent_of(current) {
            if parent == ancestor {
                return true;
            }
            if !seen.insert(parent) {
                return false;
            }
            current = parent;
        }
        false
    }

    /// Ancestor chain from the immediate parent up to the root.
    pub fn ancestors_of(&self, id: NodeId) -> Vec<NodeId> {
        let mut chain = Vec::new();
        let mut seen = HashSet::from([id]);
        let mut current = id;
        while let Some(parent) = self.parent_of(current) {
            if !seen.insert(parent) {
                tracing::error!("ancestor chain of {} loops at {}", id, parent);
                break;
            }
            chain.push(parent);
            current = parent;
        }
        chain
    }

    fn link(&mut self, parent: NodeId, child: NodeId) {
        self.edges.push(Edge::new(parent, child));
        self.parents.insert(child, parent);
        self.children.entry(parent).or_default().push(child);
    }

    fn check_edge(&self, parent: NodeId, child: NodeId) -> Result<(), GraphError> {
        if !self.contains(parent) {
            return Err(GraphError::UnknownNode(parent));
        }
        if !self.contains(child) {
            return Err(GraphError::UnknownNode(child));
        }
        if parent == child {
            return Err(GraphError::SelfEdge(child));
        }
        if self.is_descendant(child, parent) {
            return Err(GraphError::CycleViolation { parent, child });
        }
        Ok(())
    }

    /// Adds `parent -> child`. An existing parent edge is not replaced.
    pub fn create_edge(&mut self, parent: NodeId, child: NodeId) -> Result<(), GraphError> {
        self.check_edge(parent, child)?;
        if let Some(existing) = self.parent_of(child) {
            return Err(GraphError::DuplicateParent { child, existing });
        }
        self.link(parent, child);
        Ok(())
    }

    /// Drops the incoming edge of `child`, returning the former parent.
    pub fn detach(&mut self, child: NodeId) -> Option<NodeId> {
        let parent = self.parents.remove(&child)?;
        self.edges.retain(|e| e.child != child);
        if let Some(siblings) = self.children.get_mut(&parent) {
            siblings.retain(|c| *c != child);
        }
        Some(parent)
    }

    /// Replaces the incoming edge of `child` with one from `new_parent`.
    ///
    /// Validation runs before the old edge is removed, so a rejected call is
    /// a no-op.
    pub fn reparent(
        &mut self,
        child: NodeId,
        new_parent: NodeId,
    ) -> Result<Option<NodeId>, GraphError> {
        self.check_edge(new_parent, child)?;
        let previous = self.detach(child);
        self.link(new_parent, child);
        Ok(previous)
    }

    /// Removes `root`, all of its descendants and every edge touching them.
    ///
    /// Returns the removed ids, `root` first. Nothing is removed when the
    /// subtree references a node the store does not own.
    pub fn delete_subtree(&mut self, root: NodeId) -> Result<Vec<NodeId>, GraphError> {
        if !self.contains(root) {
            return Err(GraphError::UnknownNode(root));
        }
        let mut doomed = vec![root];
        doomed.extend(self.descendants_of(root));

        if let Some(missing) = doomed.iter().find(|id| !self.nodes.contains_key(id)) {
            return Err(GraphError::Inconsistent(format!(
                "edge points at missing node {missing}"
            )));
        }

        if let Some(parent) = self.parent_of(root)
            && let Some(siblings) = self.children.get_mut(&parent)
        {
            siblings.retain(|c| *c != root);
        }
        let doomed_set: HashSet<NodeId> = doomed.iter().copied().collect();
        for id in &doomed {
            self.children.remove(id);
            self.nodes.remove(id);
            self.parents.remove(id);
        }
        self.order.retain(|id| !doomed_set.contains(id));
        self.edges
            .retain(|e| !doomed_set.contains(&e.parent) && !doomed_set.contains(&e.child));

        tracing::debug!("deleted subtree of {} ({} nodes)", root, doomed.len());
        Ok(doomed)
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.order.clear();
        self.edges.clear();
        self.parents.clear();
        self.children.clear();
    }

    /// Deep copy without decoded bitmaps.
    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            nodes: self.nodes().map(Node::without_bitmap).collect(),
            edges: self.edges.clone(),
            camera: self.camera,
            background: self.background,
        }
    }

    /// Builds a store from a snapshot, validating the forest invariant.
    pub fn from_snapshot(snapshot: GraphSnapshot) -> Result<Self, GraphError> {
        let mut store = Self::new();
        store.camera = snapshot.camera;
        store.background = snapshot.background;
        for node in snapshot.nodes {
            store.insert_node(node)?;
        }
        for edge in snapshot.edges {
            store.create_edge(edge.parent, edge.child)?;
        }
        Ok(store)
    }

    /// Replaces the whole content with `snapshot`.
    ///
    /// The id allocator only ever moves forward, so ids handed out before the
    /// restore are not reused afterwards.
    pub fn restore(&mut self, snapshot: GraphSnapshot) -> Result<(), GraphError> {
        let mut fresh = Self::from_snapshot(snapshot)?;
        fresh.next_id = fresh.next_id.max(self.next_id);
        *self = fresh;
        Ok(())
    }

    /// Re-derives parent links from the edge list and checks them.
    pub fn check_invariants(&self) -> Result<(), GraphError> {
        let mut seen = HashMap::new();
        for edge in &self.edges {
            if !self.contains(edge.parent) {
                return Err(GraphError::UnknownNode(edge.parent));
            }
            if !self.contains(edge.child) {
                return Err(GraphError::UnknownNode(edge.child));
            }
            if edge.parent == edge.child {
                return Err(GraphError::SelfEdge(edge.child));
            }
            if let Some(existing) = seen.insert(edge.child, edge.parent) {
                return Err(GraphError::DuplicateParent {
                    child: edge.child,
                    existing,
                });
            }
        }
        if seen != self.parents {
            return Err(GraphError::Inconsistent(
                "parent index out of sync with edges".to_string(),
            ));
        }
        let mut children: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        for edge in &self.edges {
            children.entry(edge.parent).or_default().push(edge.child);
        }
        let indexed: HashMap<NodeId, Vec<NodeId>> = self
            .children
            .iter()
            .filter(|(_, c)| !c.is_empty())
            .map(|(p, c)| (*p, c.clone()))
            .collect();
        if children != indexed {
            return Err(GraphError::Inconsistent(
                "child index out of sync with edges".to_string(),
            ));
        }
        for &id in &self.order {
            if self.is_descendant(id, id) {
                return Err(GraphError::CycleViolation {
                    parent: id,
                    child: id,
                });
            }
        }
        if self.order.len() != self.nodes.len() {
            return Err(GraphError::Inconsistent(
                "draw order out of sync with nodes".to_string(),
            ));
        }
        Ok(())
    }
}
