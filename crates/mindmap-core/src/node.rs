use crate::{Color, NodeId, Vec2};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const DEFAULT_FONT_SIZE: f32 = 18.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Shape {
    #[default]
    Circle,
    Rectangle,
    None,
}

/// What a node is. Sizing, hit testing and colour inheritance all switch on this.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeKind {
    /// Root-like node that children hang off.
    Container { shape: Shape, radius: f32 },
    /// Ordinary child in a tree.
    Leaf { shape: Shape, radius: f32 },
    /// Free-floating text. Never a parent.
    Annotation { font_size: f32 },
}

impl NodeKind {
    pub fn container(radius: f32) -> Self {
        Self::Container {
            shape: Shape::Circle,
            radius,
        }
    }

    pub fn leaf(radius: f32) -> Self {
        Self::Leaf {
            shape: Shape::Rectangle,
            radius,
        }
    }

    pub fn annotation(font_size: f32) -> Self {
        Self::Annotation { font_size }
    }

    /// Tag used by the document format.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Container { .. } => "father",
            Self::Leaf { .. } => "child",
            Self::Annotation { .. } => "text",
        }
    }

    /// Fill used when nothing else says otherwise.
    pub fn default_color(&self) -> Color {
        match self {
            Self::Container { .. } => Color::rgb(0xf5, 0xa9, 0x7f),
            Self::Leaf { .. } => Color::rgb(0x8a, 0xad, 0xf4),
            Self::Annotation { .. } => Color::WHITE,
        }
    }

    pub fn shape(&self) -> Shape {
        match *self {
            Self::Container { shape, .. } | Self::Leaf { shape, .. } => shape,
            Self::Annotation { .. } => Shape::None,
        }
    }
}

/// Decoded pixels, RGBA8, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

/// An attached picture: the persisted encoded form plus the lazily decoded bitmap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeImage {
    /// Base64 of the original encoded bytes (PNG, JPEG, ...).
    pub encoded: Arc<str>,
    #[serde(skip)]
    pub bitmap: Option<Arc<Bitmap>>,
}

impl NodeImage {
    pub fn new(encoded: impl Into<Arc<str>>) -> Self {
        Self {
            encoded: encoded.into(),
            bitmap: None,
        }
    }

    pub fn is_decoded(&self) -> bool {
        self.bitmap.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub position: Vec2,
    pub text: String,
    pub kind: NodeKind,
    pub color: Color,
    pub link: Option<String>,
    /// Hides the subtree below this node. Meaningless without children.
    pub folded: bool,
    pub image: Option<NodeImage>,
    pub image_scale: f32,
}

impl Node {
    pub fn new(id: NodeId, kind: NodeKind, position: Vec2) -> Self {
        Self {
            id,
            position,
            text: String::new(),
            kind,
            color: kind.default_color(),
            link: None,
            folded: false,
            image: None,
            image_scale: 1.0,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    pub fn is_annotation(&self) -> bool {
        matches!(self.kind, NodeKind::Annotation { .. })
    }

    pub fn radius(&self) -> Option<f32> {
        match self.kind {
            NodeKind::Container { radius, .. } | NodeKind::Leaf { radius, .. } => Some(radius),
            NodeKind::Annotation { .. } => None,
        }
    }

    /// Sets the radius of circular/rectangular kinds; annotations are left alone.
    pub fn set_radius(&mut self, value: f32) -> bool {
        match &mut self.kind {
            NodeKind::Container { radius, .. } | NodeKind::Leaf { radius, .. } => {
                *radius = value;
                true
            }
            NodeKind::Annotation { .. } => false,
        }
    }

    pub fn font_size(&self) -> Option<f32> {
        match self.kind {
            NodeKind::Annotation { font_size } => Some(font_size),
            _ => None,
        }
    }

    pub fn set_font_size(&mut self, value: f32) -> bool {
        match &mut self.kind {
            NodeKind::Annotation { font_size } => {
                *font_size = value;
                true
            }
            _ => false,
        }
    }

    /// Copy without the decoded bitmap, as stored in history and documents.
    pub fn without_bitmap(&self) -> Self {
        let mut node = self.clone();
        if let Some(image) = node.image.as_mut() {
            image.bitmap = None;
        }
        node
    }
}
