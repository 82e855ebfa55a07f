pub mod drag;
pub mod hit_tester;
pub mod placement;
pub mod store;
pub mod visibility;

pub use drag::{DragGesture, DropOutcome, DropReport, can_drop_onto, propagate_color};
pub use hit_tester::{HitResult, HitTester};
pub use placement::{Placement, PlacementProbe};
pub use store::EntityStore;
pub use visibility::{hidden_count, is_visible, visible_edges, visible_nodes};
