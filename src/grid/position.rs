//! Grid coordinates with the Manhattan metric.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A cell of the city lattice. One grid unit ≈ 1 km.
///
/// Ordering is lexicographic `(x, y)`, which the pathfinder relies on for a
/// deterministic tie-break.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    /// Creates a new position.
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Origin position (0, 0).
    pub const fn origin() -> Self {
        Self { x: 0, y: 0 }
    }

    /// Manhattan distance to another position, in grid units.
    pub fn manhattan_distance(&self, other: &Position) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    /// The four axis-aligned neighbours, in deterministic `(x, y)` order.
    ///
    /// Neighbours may lie outside the grid; bounds are the map's concern.
    pub fn neighbors(&self) -> [Position; 4] {
        [
            Position::new(self.x - 1, self.y),
            Position::new(self.x, self.y - 1),
            Position::new(self.x, self.y + 1),
            Position::new(self.x + 1, self.y),
        ]
    }

    /// Returns true if `other` is exactly one step away on one axis.
    pub fn is_adjacent_to(&self, other: &Position) -> bool {
        self.manhattan_distance(other) == 1
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manhattan_distance_is_symmetric() {
        let a = Position::new(12, 8);
        let b = Position::new(15, 10);
        assert_eq!(a.manhattan_distance(&b), 5);
        assert_eq!(b.manhattan_distance(&a), 5);
        assert_eq!(a.manhattan_distance(&a), 0);
    }

    #[test]
    fn neighbors_are_adjacent_and_sorted() {
        let p = Position::new(5, 5);
        let ns = p.neighbors();
        assert!(ns.iter().all(|n| p.is_adjacent_to(n)));
        let mut sorted = ns;
        sorted.sort();
        assert_eq!(ns, sorted);
    }

    #[test]
    fn adjacency_excludes_diagonals() {
        let p = Position::new(3, 3);
        assert!(p.is_adjacent_to(&Position::new(3, 4)));
        assert!(!p.is_adjacent_to(&Position::new(4, 4)));
        assert!(!p.is_adjacent_to(&p));
    }

    #[test]
    fn ordering_is_lexicographic() {
        assert!(Position::new(1, 9) < Position::new(2, 0));
        assert!(Position::new(2, 1) < Position::new(2, 3));
    }
}
