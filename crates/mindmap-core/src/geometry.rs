//! Node footprints.
//!
//! Both hit testing and the renderer size nodes through [`Node::footprint`];
//! if the two ever disagree, clicks land on things that are not drawn there.

use crate::{Node, NodeKind, Shape, Vec2};
use serde::{Deserialize, Serialize};

/// Reference size. A node with `radius == BASE_UNIT` is drawn at scale 1.
pub const BASE_UNIT: f32 = 40.0;

const CHAR_WIDTH: f32 = 9.0;
const LINE_HEIGHT: f32 = 20.0;
const TEXT_PADDING: f32 = 12.0;
const MIN_LABEL_CHARS: usize = 4;

const ANNOTATION_CHAR_FACTOR: f32 = 0.6;
const ANNOTATION_LINE_FACTOR: f32 = 1.25;
const ANNOTATION_PADDING: f32 = 4.0;

/// A rectangle defined by min and max corners
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub min: Vec2,
    pub max: Vec2,
}

impl Rect {
    /// Rectangle of `half` extents around `center`.
    pub fn from_center_half(center: Vec2, half: Vec2) -> Self {
        Self {
            min: center - half,
            max: center + half,
        }
    }

    pub fn width(&self) -> f32 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f32 {
        self.max.y - self.min.y
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(
            self.min.x + self.width() * 0.5,
            self.min.y + self.height() * 0.5,
        )
    }

    pub fn contains(&self, point: Vec2) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
    }

    /// Return a new rectangle expanded by `amount` on all sides
    pub fn expand(&self, amount: f32) -> Rect {
        Rect {
            min: Vec2::new(self.min.x - amount, self.min.y - amount),
            max: Vec2::new(self.max.x + amount, self.max.y + amount),
        }
    }
}

/// The area a node occupies in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Footprint {
    Circle { center: Vec2, radius: f32 },
    Rect(Rect),
}

impl Footprint {
    pub fn contains(&self, point: Vec2) -> bool {
        match *self {
            Footprint::Circle { center, radius } => center.distance(point) <= radius,
            Footprint::Rect(rect) => rect.contains(point),
        }
    }

    pub fn bounds(&self) -> Rect {
        match *self {
            Footprint::Circle { center, radius } => {
                Rect::from_center_half(center, Vec2::new(radius, radius))
            }
            Footprint::Rect(rect) => rect,
        }
    }
}

/// Width/height of a text label box before scaling: `(chars, lines)`.
fn text_extent(text: &str) -> (usize, usize) {
    let mut lines = 0;
    let mut widest = 0;
    for line in text.split('\n') {
        lines += 1;
        widest = widest.max(line.chars().count());
    }
    (widest, lines.max(1))
}

/// Half extents of a rectangular leaf, derived from its text and radius.
pub fn leaf_half_extents(text: &str, radius: f32) -> Vec2 {
    let (chars, lines) = text_extent(text);
    let scale = radius / BASE_UNIT;
    let width = (chars.max(MIN_LABEL_CHARS) as f32 * CHAR_WIDTH + 2.0 * TEXT_PADDING) * scale;
    let height = (lines as f32 * LINE_HEIGHT + 2.0 * TEXT_PADDING) * scale;
    Vec2::new(width * 0.5, height * 0.5)
}

pub fn annotation_half_extents(text: &str, font_size: f32) -> Vec2 {
    let (chars, lines) = text_extent(text);
    let width = chars.max(1) as f32 * font_size * ANNOTATION_CHAR_FACTOR + 2.0 * ANNOTATION_PADDING;
    let height = lines as f32 * font_size * ANNOTATION_LINE_FACTOR + 2.0 * ANNOTATION_PADDING;
    Vec2::new(width * 0.5, height * 0.5)
}

impl Node {
    pub fn footprint(&self) -> Footprint {
        let center = self.position;
        match self.kind {
            NodeKind::Container {
                shape: Shape::Rectangle,
                radius,
            } => Footprint::Rect(Rect::from_center_half(center, Vec2::new(radius, radius))),
            NodeKind::Leaf {
                shape: Shape::Rectangle,
                radius,
            } => Footprint::Rect(Rect::from_center_half(
                center,
                leaf_half_extents(&self.text, radius),
            )),
            NodeKind::Container { radius, .. } | NodeKind::Leaf { radius, .. } => {
                Footprint::Circle { center, radius }
            }
            NodeKind::Annotation { font_size } => Footprint::Rect(Rect::from_center_half(
                center,
                annotation_half_extents(&self.text, font_size),
            )),
        }
    }

    pub fn hit(&self, point: Vec2) -> bool {
        self.footprint().contains(point)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NodeId;

    #[test]
    fn test_circle_hit_uses_radius() {
        let node = Node::new(NodeId(1), NodeKind::container(40.0), Vec2::new(100.0, 100.0));
        assert!(node.hit(Vec2::new(130.0, 100.0)));
        assert!(!node.hit(Vec2::new(130.0, 130.0)));
    }

    #[test]
    fn test_rect_leaf_grows_with_text() {
        let short = Node::new(NodeId(1), NodeKind::leaf(BASE_UNIT), Vec2::ZERO).with_text("ab");
        let long = Node::new(NodeId(2), NodeKind::leaf(BASE_UNIT), Vec2::ZERO)
            .with_text("a considerably longer label");
        let two_lines = Node::new(NodeId(3), NodeKind::leaf(BASE_UNIT), Vec2::ZERO)
            .with_text("ab\ncd");

        let short_rect = short.footprint().bounds();
        assert!(long.footprint().bounds().width() > short_rect.width());
        assert!(two_lines.footprint().bounds().height() > short_rect.height());
        assert_eq!(two_lines.footprint().bounds().width(), short_rect.width());
    }

    #[test]
    fn test_rect_leaf_scales_with_radius() {
        let base = Node::new(NodeId(1), NodeKind::leaf(BASE_UNIT), Vec2::ZERO).with_text("label");
        let double =
            Node::new(NodeId(2), NodeKind::leaf(BASE_UNIT * 2.0), Vec2::ZERO).with_text("label");
        let a = base.footprint().bounds();
        let b = double.footprint().bounds();
        assert!((b.width() - 2.0 * a.width()).abs() < 1e-3);
        assert!((b.height() - 2.0 * a.height()).abs() < 1e-3);
    }

    #[test]
    fn test_rect_hit_is_axis_aligned_containment() {
        let node = Node::new(NodeId(1), NodeKind::leaf(BASE_UNIT), Vec2::ZERO).with_text("label");
        let rect = node.footprint().bounds();
        assert!(node.hit(Vec2::new(rect.max.x - 0.5, rect.max.y - 0.5)));
        assert!(!node.hit(Vec2::new(rect.max.x + 0.5, 0.0)));
    }

    #[test]
    fn test_square_container() {
        let node = Node::new(
            NodeId(1),
            NodeKind::Container {
                shape: Shape::Rectangle,
                radius: 10.0,
            },
            Vec2::ZERO,
        );
        // Corner is inside a square but outside the circle of the same radius.
        assert!(node.hit(Vec2::new(9.0, 9.0)));
    }
}
