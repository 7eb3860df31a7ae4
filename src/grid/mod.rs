//! City grid: integer lattice positions and the time-aware pathfinder.

pub mod pathfinder;
pub mod position;

pub use pathfinder::{PathResult, Pathfinder, TraversalMap};
pub use position::Position;
