use crate::EntityStore;
use mindmap_core::{Node, Vec2};
use serde::{Deserialize, Serialize};

/// Bounded search for a spot where a new node does not overlap anything.
///
/// Candidates are probed along `direction` in increments of `step`. This is
/// not a packing algorithm: when the budget runs out the last probed spot is
/// used even if it overlaps.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementProbe {
    pub direction: Vec2,
    pub step: f32,
    pub attempts: usize,
    /// Clearance kept around every footprint.
    pub margin: f32,
}

impl Default for PlacementProbe {
    fn default() -> Self {
        Self {
            direction: Vec2::new(0.0, 1.0),
            step: 30.0,
            attempts: 24,
            margin: 6.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Placement {
    Free(Vec2),
    /// Every probe collided; holds the last probed position.
    Exhausted(Vec2),
}

impl Placement {
    pub fn position(self) -> Vec2 {
        match self {
            Placement::Free(pos) | Placement::Exhausted(pos) => pos,
        }
    }
}

impl PlacementProbe {
    pub fn place(&self, store: &EntityStore, candidate: &Node, start: Vec2) -> Placement {
        let attempts = self.attempts.max(1);
        let mut probe = candidate.clone();
        let mut pos = start;

        for attempt in 0..attempts {
            probe.position = pos;
            if !self.collides(store, &probe) {
                return Placement::Free(pos);
            }
            if attempt + 1 < attempts {
                pos += Vec2::new(self.direction.x * self.step, self.direction.y * self.step);
            }
        }

        tracing::warn!(
            "no free spot for {} after {} probes, placing at ({:.1}, {:.1})",
            candidate.id,
            attempts,
            pos.x,
            pos.y
        );
        Placement::Exhausted(pos)
    }

    pub fn collides(&self, store: &EntityStore, probe: &Node) -> bool {
        let bounds = probe.footprint().bounds().expand(self.margin);
        store
            .nodes()
            .filter(|n| n.id != probe.id)
            .any(|n| n.footprint().bounds().intersects(&bounds))
    }
}
