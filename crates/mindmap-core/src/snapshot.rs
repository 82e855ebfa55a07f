use crate::{Camera, Color, Edge, Node};
use serde::{Deserialize, Serialize};

pub const DEFAULT_BACKGROUND: Color = Color::rgb(0x1e, 0x1e, 0x2e);

/// Deep copy of everything a history entry or a document needs.
///
/// Nodes never carry decoded bitmaps here, only the encoded image payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub camera: Camera,
    pub background: Color,
}

impl Default for GraphSnapshot {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            edges: Vec::new(),
            camera: Camera::default(),
            background: DEFAULT_BACKGROUND,
        }
    }
}
