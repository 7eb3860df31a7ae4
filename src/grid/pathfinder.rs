//! Time-aware shortest paths on the 4-connected lattice.
//!
//! A* with the Manhattan heuristic. A neighbour is rejected when the map
//! reports it blocked *at the instant the vehicle would arrive there*, so a
//! route departing before a blockage window can drive straight through while
//! a later departure detours.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use chrono::Duration;

use crate::grid::Position;
use crate::Timestamp;

/// What the pathfinder needs to know about the world.
///
/// Implemented by the live environment; tests use small literal maps.
pub trait TraversalMap {
    /// Grid width W; valid x is `0..W`.
    fn width(&self) -> i32;

    /// Grid height H; valid y is `0..H`.
    fn height(&self) -> i32;

    /// Returns true if `position` is inside some blockage active at `at`.
    fn is_blocked_at(&self, position: Position, at: Timestamp) -> bool;

    /// Returns true if `position` lies inside `[0, W) × [0, H)`.
    fn in_bounds(&self, position: Position) -> bool {
        position.x >= 0
            && position.x < self.width()
            && position.y >= 0
            && position.y < self.height()
    }
}

/// A computed route and its timing.
#[derive(Debug, Clone, PartialEq)]
pub struct PathResult {
    /// Adjacent cells from origin to destination inclusive.
    /// Empty when origin and destination coincide.
    pub positions: Vec<Position>,
    /// Arrival instant at each cell of `positions`.
    pub arrival_times: Vec<Timestamp>,
    /// Number of steps, in grid units.
    pub total_distance: u32,
    /// Arrival instant at the destination.
    pub arrival_time: Timestamp,
}

/// Open-list entry. Derived ordering is the tie-break contract:
/// lower f, then lower h, then lexicographic `(x, y)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct OpenNode {
    f: u32,
    h: u32,
    position: Position,
    g: u32,
}

/// Shortest-path search with a fixed traversal speed.
#[derive(Debug, Clone, Copy)]
pub struct Pathfinder {
    speed_km_per_h: f64,
}

impl Pathfinder {
    /// Creates a pathfinder for vehicles moving at `speed_km_per_h`.
    pub fn new(speed_km_per_h: f64) -> Self {
        assert!(speed_km_per_h > 0.0, "traversal speed must be positive");
        Self { speed_km_per_h }
    }

    /// Time to traverse `distance` grid units (1 unit ≈ 1 km).
    pub fn travel_duration(&self, distance: u32) -> Duration {
        let seconds = distance as f64 * 3_600.0 / self.speed_km_per_h;
        Duration::seconds(seconds.round() as i64)
    }

    /// Finds a shortest blockage-avoiding route, or `None` when no route
    /// exists, when an endpoint is out of bounds, or when an endpoint is
    /// blocked at departure.
    pub fn find_path<M: TraversalMap>(
        &self,
        map: &M,
        origin: Position,
        destination: Position,
        departure: Timestamp,
    ) -> Option<PathResult> {
        if !map.in_bounds(origin) || !map.in_bounds(destination) {
            return None;
        }
        if map.is_blocked_at(origin, departure) || map.is_blocked_at(destination, departure) {
            return None;
        }
        if origin == destination {
            return Some(PathResult {
                positions: Vec::new(),
                arrival_times: Vec::new(),
                total_distance: 0,
                arrival_time: departure,
            });
        }

        let h0 = origin.manhattan_distance(&destination);
        let mut open = BinaryHeap::new();
        let mut g_score: HashMap<Position, u32> = HashMap::new();
        let mut came_from: HashMap<Position, Position> = HashMap::new();

        g_score.insert(origin, 0);
        open.push(Reverse(OpenNode {
            f: h0,
            h: h0,
            position: origin,
            g: 0,
        }));

        while let Some(Reverse(node)) = open.pop() {
            // Stale heap entry for a cell already reached more cheaply.
            if g_score.get(&node.position) != Some(&node.g) {
                continue;
            }
            if node.position == destination {
                return Some(self.reconstruct(&came_from, origin, destination, departure));
            }

            for neighbor in node.position.neighbors() {
                if !map.in_bounds(neighbor) {
                    continue;
                }
                let tentative_g = node.g + 1;
                let arrival = departure + self.travel_duration(tentative_g);
                if map.is_blocked_at(neighbor, arrival) {
                    continue;
                }
                if tentative_g < g_score.get(&neighbor).copied().unwrap_or(u32::MAX) {
                    g_score.insert(neighbor, tentative_g);
                    came_from.insert(neighbor, node.position);
                    let h = neighbor.manhattan_distance(&destination);
                    open.push(Reverse(OpenNode {
                        f: tentative_g + h,
                        h,
                        position: neighbor,
                        g: tentative_g,
                    }));
                }
            }
        }

        None
    }

    fn reconstruct(
        &self,
        came_from: &HashMap<Position, Position>,
        origin: Position,
        destination: Position,
        departure: Timestamp,
    ) -> PathResult {
        let mut positions = vec![destination];
        let mut cursor = destination;
        while cursor != origin {
            cursor = came_from[&cursor];
            positions.push(cursor);
        }
        positions.reverse();

        let arrival_times: Vec<Timestamp> = (0..positions.len())
            .map(|i| departure + self.travel_duration(i as u32))
            .collect();
        let total_distance = (positions.len() - 1) as u32;
        let arrival_time = arrival_times[positions.len() - 1];

        PathResult {
            positions,
            arrival_times,
            total_distance,
            arrival_time,
        }
    }
}
