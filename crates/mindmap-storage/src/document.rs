use chrono::{DateTime, Utc};
use mindmap_core::{
    BASE_UNIT, Camera, Color, DEFAULT_BACKGROUND, DEFAULT_FONT_SIZE, Edge, GraphError, GraphSnapshot,
    Node, NodeId, NodeImage, NodeKind, Shape, Vec2,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

pub const DOCUMENT_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("Malformed document: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Unsupported document version: {0} (max supported: {DOCUMENT_VERSION})")]
    UnsupportedVersion(u32),
    #[error("Node #{index} is invalid: {reason}")]
    InvalidNode { index: usize, reason: String },
    #[error("Edge #{edge} points at node #{index}, but there are only {len} nodes")]
    EdgeOutOfRange { edge: usize, index: usize, len: usize },
    #[error("Edge #{edge} connects node #{index} to itself")]
    SelfEdge { edge: usize, index: usize },
    #[error("Node #{child} has more than one parent (edge #{edge})")]
    DuplicateParent { edge: usize, child: usize },
    #[error("Edges form a cycle through node #{index}")]
    Cycle { index: usize },
    #[error("Document rejected by the graph: {0}")]
    Graph(#[from] GraphError),
}

/// Document-level node kind, as written in files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KindTag {
    Father,
    Child,
    Text,
}

impl From<&NodeKind> for KindTag {
    fn from(kind: &NodeKind) -> Self {
        match kind {
            NodeKind::Container { .. } => Self::Father,
            NodeKind::Leaf { .. } => Self::Child,
            NodeKind::Annotation { .. } => Self::Text,
        }
    }
}

fn default_image_scale() -> f32 {
    1.0
}

fn default_version() -> u32 {
    DOCUMENT_VERSION
}

fn default_background() -> Color {
    DEFAULT_BACKGROUND
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub text: String,
    pub kind: KindTag,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape: Option<Shape>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radius: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default)]
    pub folded: bool,
    /// Encoded image payload, base64 or a `data:` URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default = "default_image_scale")]
    pub image_scale: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f32>,
}

impl NodeRecord {
    fn from_node(node: &Node) -> Self {
        let (shape, radius, font_size) = match node.kind {
            NodeKind::Container { shape, radius } | NodeKind::Leaf { shape, radius } => {
                (Some(shape), Some(radius), None)
            }
            NodeKind::Annotation { font_size } => (None, None, Some(font_size)),
        };
        Self {
            x: node.position.x,
            y: node.position.y,
            text: node.text.clone(),
            kind: KindTag::from(&node.kind),
            shape,
            color: Some(node.color),
            radius,
            link: node.link.clone(),
            folded: node.folded,
            image: node.image.as_ref().map(|img| img.encoded.to_string()),
            image_scale: node.image_scale,
            font_size,
        }
    }

    fn validate(&self, index: usize) -> Result<(), DocumentError> {
        let invalid = |reason: &str| DocumentError::InvalidNode {
            index,
            reason: reason.to_string(),
        };
        if !self.x.is_finite() || !self.y.is_finite() {
            return Err(invalid("position is not finite"));
        }
        if let Some(radius) = self.radius
            && !(radius.is_finite() && radius > 0.0)
        {
            return Err(invalid("radius must be positive"));
        }
        if let Some(size) = self.font_size
            && !(size.is_finite() && size > 0.0)
        {
            return Err(invalid("font size must be positive"));
        }
        if !(self.image_scale.is_finite() && self.image_scale > 0.0) {
            return Err(invalid("image scale must be positive"));
        }
        Ok(())
    }

    fn kind(&self) -> NodeKind {
        let radius = self.radius.unwrap_or(BASE_UNIT);
        match self.kind {
            KindTag::Father => NodeKind::Container {
                shape: self.shape.unwrap_or(Shape::Circle),
                radius,
            },
            KindTag::Child => NodeKind::Leaf {
                shape: self.shape.unwrap_or(Shape::Rectangle),
                radius,
            },
            KindTag::Text => NodeKind::Annotation {
                font_size: self.font_size.unwrap_or(DEFAULT_FONT_SIZE),
            },
        }
    }

    fn into_node(self, id: NodeId) -> Node {
        let kind = self.kind();
        Node {
            id,
            position: Vec2::new(self.x, self.y),
            color: self.color.unwrap_or_else(|| kind.default_color()),
            text: self.text,
            kind,
            link: self.link.filter(|l| !l.is_empty()),
            folded: self.folded,
            image: self.image.filter(|i| !i.is_empty()).map(NodeImage::new),
            image_scale: self.image_scale,
        }
    }
}

/// The persisted form of a map.
///
/// Edges refer to nodes by their position in `nodes`. That mapping is
/// rebuilt from scratch on every encode and decode; live node ids never
/// reach the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default = "Uuid::new_v4")]
    pub document_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub nodes: Vec<NodeRecord>,
    #[serde(default)]
    pub edges: Vec<[usize; 2]>,
    #[serde(default)]
    pub camera: Camera,
    #[serde(default = "default_background")]
    pub background: Color,
}

impl Document {
    pub fn from_snapshot(snapshot: &GraphSnapshot) -> Self {
        let index: HashMap<NodeId, usize> = snapshot
            .nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (node.id, i))
            .collect();

        let edges = snapshot
            .edges
            .iter()
            .filter_map(|edge| match (index.get(&edge.parent), index.get(&edge.child)) {
                (Some(&p), Some(&c)) => Some([p, c]),
                _ => {
                    tracing::warn!("dropping edge {} -> {} with a missing endpoint", edge.parent, edge.child);
                    None
                }
            })
            .collect();

        Self {
            version: DOCUMENT_VERSION,
            document_id: Uuid::new_v4(),
            saved_at: Some(Utc::now()),
            nodes: snapshot.nodes.iter().map(NodeRecord::from_node).collect(),
            edges,
            camera: snapshot.camera,
            background: snapshot.background,
        }
    }

    pub fn with_document_id(mut self, id: Uuid) -> Self {
        self.document_id = id;
        self
    }

    pub fn from_json(json: &str) -> Result<Self, DocumentError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, DocumentError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Checks versions, node fields, edge indices and the forest invariant.
    pub fn validate(&self) -> Result<(), DocumentError> {
        if self.version > DOCUMENT_VERSION {
            return Err(DocumentError::UnsupportedVersion(self.version));
        }
        for (index, record) in self.nodes.iter().enumerate() {
            record.validate(index)?;
        }

        let len = self.nodes.len();
        let mut parents: Vec<Option<usize>> = vec![None; len];
        for (edge, &[p, c]) in self.edges.iter().enumerate() {
            for index in [p, c] {
                if index >= len {
                    return Err(DocumentError::EdgeOutOfRange { edge, index, len });
                }
            }
            if p == c {
                return Err(DocumentError::SelfEdge { edge, index: p });
            }
            if parents[c].is_some() {
                return Err(DocumentError::DuplicateParent { edge, child: c });
            }
            parents[c] = Some(p);
        }

        // With one parent per node, a cycle shows up as a parent chain
        // longer than the node count.
        for start in 0..len {
            let mut current = start;
            let mut steps = 0;
            while let Some(parent) = parents[current] {
                steps += 1;
                if steps > len {
                    return Err(DocumentError::Cycle { index: start });
                }
                current = parent;
            }
        }
        Ok(())
    }

    /// Validates and converts into a snapshot, drawing fresh ids from `alloc`.
    ///
    /// Ids are only drawn once validation has passed.
    pub fn into_snapshot(
        self,
        mut alloc: impl FnMut() -> NodeId,
    ) -> Result<GraphSnapshot, DocumentError> {
        self.validate()?;

        let nodes: Vec<Node> = self
            .nodes
            .into_iter()
            .map(|record| record.into_node(alloc()))
            .collect();
        let edges = self
            .edges
            .iter()
            .map(|&[p, c]| Edge::new(nodes[p].id, nodes[c].id))
            .collect();

        Ok(GraphSnapshot {
            nodes,
            edges,
            camera: self.camera,
            background: self.background,
        })
    }
}
