//! Street blockages: time-windowed poly-lines of impassable cells.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::grid::Position;
use crate::{Id, Timestamp};

/// Errors raised when constructing a blockage from a poly-line.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BlockageError {
    #[error("blockage poly-line needs at least one point")]
    EmptyPolyLine,

    #[error("blockage segment {from} -> {to} is not axis-aligned")]
    SegmentNotAxisAligned { from: Position, to: Position },
}

/// A blockage: every integer cell on the poly-line is impassable while the
/// blockage is active. Activity is inclusive on both endpoints:
/// `active_at(t) ⇔ start ≤ t ≤ end`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Blockage {
    pub id: Id,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
    /// Vertices of the poly-line; consecutive segments are axis-aligned.
    pub polyline: Vec<Position>,
    /// Union of integer cells on all segments, precomputed at construction.
    blocked: HashSet<Position>,
}

impl Blockage {
    pub fn new(
        id: impl Into<Id>,
        start_time: Timestamp,
        end_time: Timestamp,
        polyline: Vec<Position>,
    ) -> Result<Self, BlockageError> {
        if polyline.is_empty() {
            return Err(BlockageError::EmptyPolyLine);
        }

        let mut blocked = HashSet::new();
        blocked.insert(polyline[0]);
        for pair in polyline.windows(2) {
            let (from, to) = (pair[0], pair[1]);
            if from.x != to.x && from.y != to.y {
                return Err(BlockageError::SegmentNotAxisAligned { from, to });
            }
            blocked.extend(cells_on_segment(from, to));
        }

        Ok(Self {
            id: id.into(),
            start_time,
            end_time,
            polyline,
            blocked,
        })
    }

    /// Inclusive activity check on `[start_time, end_time]`.
    pub fn active_at(&self, at: Timestamp) -> bool {
        self.start_time <= at && at <= self.end_time
    }

    /// Whether this blockage ended strictly before `at`.
    pub fn expired_before(&self, at: Timestamp) -> bool {
        self.end_time < at
    }

    /// Whether `position` lies on the blocked poly-line (regardless of time).
    pub fn blocks(&self, position: Position) -> bool {
        self.blocked.contains(&position)
    }

    /// All blocked cells.
    pub fn blocked_cells(&self) -> &HashSet<Position> {
        &self.blocked
    }
}

/// Integer cells on the axis-aligned segment `from..=to`, in either direction.
fn cells_on_segment(from: Position, to: Position) -> Vec<Position> {
    if from.x == to.x {
        let (lo, hi) = (from.y.min(to.y), from.y.max(to.y));
        (lo..=hi).map(|y| Position::new(from.x, y)).collect()
    } else {
        let (lo, hi) = (from.x.min(to.x), from.x.max(to.x));
        (lo..=hi).map(|x| Position::new(x, from.y)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn t0() -> Timestamp {
        NaiveDate::from_ymd_opt(2025, 3, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn window() -> (Timestamp, Timestamp) {
        (t0(), t0() + Duration::hours(4))
    }

    #[test]
    fn l_shaped_polyline_covers_both_segments() {
        let (s, e) = window();
        let b = Blockage::new(
            "B1",
            s,
            e,
            vec![
                Position::new(3, 3),
                Position::new(3, 6),
                Position::new(7, 6),
            ],
        )
        .unwrap();

        assert!(b.blocks(Position::new(3, 4)));
        assert!(b.blocks(Position::new(3, 6))); // corner counted once
        assert!(b.blocks(Position::new(5, 6)));
        assert!(!b.blocks(Position::new(4, 4)));
        // 4 vertical + 5 horizontal − 1 shared corner.
        assert_eq!(b.blocked_cells().len(), 8);
    }

    #[test]
    fn single_point_blockage() {
        let (s, e) = window();
        let b = Blockage::new("B1", s, e, vec![Position::new(10, 10)]).unwrap();
        assert_eq!(b.blocked_cells().len(), 1);
        assert!(b.blocks(Position::new(10, 10)));
    }

    #[test]
    fn diagonal_segment_is_rejected() {
        let (s, e) = window();
        let err =
            Blockage::new("B1", s, e, vec![Position::new(0, 0), Position::new(3, 2)]).unwrap_err();
        assert!(matches!(err, BlockageError::SegmentNotAxisAligned { .. }));
    }

    #[test]
    fn empty_polyline_is_rejected() {
        let (s, e) = window();
        assert_eq!(
            Blockage::new("B1", s, e, vec![]).unwrap_err(),
            BlockageError::EmptyPolyLine
        );
    }

    #[test]
    fn activity_is_inclusive_at_both_endpoints() {
        let (s, e) = window();
        let b = Blockage::new("B1", s, e, vec![Position::new(1, 1)]).unwrap();
        assert!(b.active_at(s));
        assert!(b.active_at(e));
        assert!(b.active_at(s + Duration::minutes(90)));
        assert!(!b.active_at(s - Duration::seconds(1)));
        assert!(!b.active_at(e + Duration::seconds(1)));
    }

    #[test]
    fn expiry_is_strict() {
        let (s, e) = window();
        let b = Blockage::new("B1", s, e, vec![Position::new(1, 1)]).unwrap();
        assert!(!b.expired_before(e));
        assert!(b.expired_before(e + Duration::seconds(1)));
    }

    #[test]
    fn segments_count_cells_in_reverse_direction_too() {
        let cells = cells_on_segment(Position::new(5, 2), Position::new(1, 2));
        assert_eq!(cells.len(), 5);
        assert!(cells.contains(&Position::new(3, 2)));
    }
}
