use mindmap_core::{Node, NodeId, NodeKind, Vec2};
use mindmap_graph::EntityStore;

/// A single chain `root -> n1 -> ... -> n{depth}`. Returns the store and the chain, root first.
pub fn generate_chain(depth: usize) -> anyhow::Result<(EntityStore, Vec<NodeId>)> {
    let mut store = EntityStore::new();
    let mut chain = Vec::with_capacity(depth + 1);
    let root = insert(&mut store, NodeKind::container(40.0), Vec2::ZERO, 0)?;
    chain.push(root);

    for i in 1..=depth {
        let id = insert(
            &mut store,
            NodeKind::leaf(40.0),
            Vec2::new(i as f32 * 180.0, 0.0),
            i,
        )?;
        store.create_edge(chain[i - 1], id)?;
        chain.push(id);
    }
    Ok((store, chain))
}

/// A full tree with `fanout` children per node, `levels` deep below the root.
pub fn generate_tree(fanout: usize, levels: usize) -> anyhow::Result<(EntityStore, NodeId)> {
    let mut store = EntityStore::new();
    let root = insert(&mut store, NodeKind::container(40.0), Vec2::ZERO, 0)?;
    let mut frontier = vec![root];
    let mut counter = 1;

    for level in 1..=levels {
        let mut next = Vec::with_capacity(frontier.len() * fanout);
        for parent in frontier {
            for slot in 0..fanout {
                let pos = Vec2::new(level as f32 * 180.0, (counter + slot) as f32 * 90.0);
                let id = insert(&mut store, NodeKind::leaf(40.0), pos, counter)?;
                store.create_edge(parent, id)?;
                next.push(id);
                counter += 1;
            }
        }
        frontier = next;
    }
    Ok((store, root))
}

fn insert(
    store: &mut EntityStore,
    kind: NodeKind,
    position: Vec2,
    index: usize,
) -> anyhow::Result<NodeId> {
    let id = store.allocate_id();
    let node = Node::new(id, kind, position).with_text(format!("Idea {index}"));
    Ok(store.insert_node(node)?)
}
