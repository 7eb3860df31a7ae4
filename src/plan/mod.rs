//! Per-vehicle plans: ordered action sequences with derived aggregates.

pub mod action;
pub mod errors;

use std::collections::BTreeSet;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::{Vehicle, VehicleType};
use crate::grid::Position;
use crate::{Id, Timestamp};

pub use action::{Action, ActionKind};
pub use errors::PlanError;

/// The plan map a solve produces: vehicle id → plan.
pub type PlanMap = HashMap<Id, Plan>;

/// An ordered action sequence for one vehicle.
///
/// Appending enforces the sequence invariant
/// `action_i.expected_end ≤ action_{i+1}.expected_start`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    actions: Vec<Action>,
}

impl Plan {
    pub fn new() -> Self {
        Self {
            actions: Vec::new(),
        }
    }

    /// Appends an action, enforcing window sanity and non-overlap.
    pub fn push(&mut self, action: Action) -> Result<(), PlanError> {
        if action.expected_start > action.expected_end {
            return Err(PlanError::InvertedWindow {
                start: action.expected_start,
                end: action.expected_end,
            });
        }
        if let ActionKind::Drive { path } = &action.kind {
            if path.is_empty() {
                return Err(PlanError::EmptyDrivePath);
            }
        }
        if let Some(last) = self.actions.last() {
            if action.expected_start < last.expected_end {
                return Err(PlanError::OverlapsPrevious {
                    start: action.expected_start,
                    previous_end: last.expected_end,
                });
            }
        }
        self.actions.push(action);
        Ok(())
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// When the last action is expected to finish.
    pub fn end_time(&self) -> Option<Timestamp> {
        self.actions.last().map(|a| a.expected_end)
    }

    /// Where the vehicle ends up, or `fallback` if the plan never drives.
    pub fn end_position(&self, fallback: Position) -> Position {
        self.actions
            .iter()
            .rev()
            .find_map(|a| a.end_position())
            .unwrap_or(fallback)
    }

    /// Total grid units driven.
    pub fn total_distance(&self) -> u32 {
        self.actions.iter().map(|a| a.distance()).sum()
    }

    /// Total m³ scheduled for delivery.
    pub fn total_glp_delivered(&self) -> f64 {
        self.actions
            .iter()
            .map(|a| match &a.kind {
                ActionKind::Serve { amount_m3, .. } => *amount_m3,
                _ => 0.0,
            })
            .sum()
    }

    /// Ids of the orders this plan serves, deduplicated and sorted.
    pub fn served_orders(&self) -> BTreeSet<Id> {
        self.actions
            .iter()
            .filter_map(|a| match &a.kind {
                ActionKind::Serve { order_id, .. } => Some(order_id.clone()),
                _ => None,
            })
            .collect()
    }

    /// Fuel in gallons the plan will burn, simulated from `start_glp_m3`
    /// with the load shrinking at serves and growing at reloads.
    pub fn total_fuel(&self, vehicle_type: VehicleType, start_glp_m3: f64) -> f64 {
        let mut glp = start_glp_m3;
        let mut fuel = 0.0;
        for action in &self.actions {
            match &action.kind {
                ActionKind::Drive { .. } => {
                    fuel += Vehicle::fuel_for(vehicle_type, action.distance(), glp);
                }
                ActionKind::Serve { amount_m3, .. } => glp = (glp - amount_m3).max(0.0),
                ActionKind::Reload { amount_m3, .. } => {
                    glp = (glp + amount_m3).min(vehicle_type.capacity_m3())
                }
                _ => {}
            }
        }
        fuel
    }

    /// True when every consecutive pair respects the sequence invariant.
    /// Pushed plans always are; this guards deserialized or hand-built ones.
    pub fn timestamps_monotone(&self) -> bool {
        self.actions
            .windows(2)
            .all(|w| w[0].expected_end <= w[1].expected_start)
            && self
                .actions
                .iter()
                .all(|a| a.expected_start <= a.expected_end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn t0() -> Timestamp {
        NaiveDate::from_ymd_opt(2025, 3, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
    }

    fn min(m: i64) -> Duration {
        Duration::minutes(m)
    }

    fn straight_path(from_x: i32, to_x: i32, y: i32) -> Vec<Position> {
        (from_x..=to_x).map(|x| Position::new(x, y)).collect()
    }

    #[test]
    fn push_keeps_sequence_invariant() {
        let mut plan = Plan::new();
        plan.push(Action::drive(straight_path(0, 3, 0), t0(), t0() + min(3)))
            .unwrap();
        plan.push(Action::serve("O1", 5.0, t0() + min(3), t0() + min(18)))
            .unwrap();

        let err = plan
            .push(Action::refuel(t0() + min(10), t0() + min(11)))
            .unwrap_err();
        assert!(matches!(err, PlanError::OverlapsPrevious { .. }));
        assert_eq!(plan.len(), 2);
        assert!(plan.timestamps_monotone());
    }

    #[test]
    fn inverted_window_is_rejected() {
        let mut plan = Plan::new();
        let err = plan
            .push(Action::idle(t0() + min(5), t0()))
            .unwrap_err();
        assert!(matches!(err, PlanError::InvertedWindow { .. }));
    }

    #[test]
    fn empty_drive_path_is_rejected() {
        let mut plan = Plan::new();
        let err = plan
            .push(Action::drive(vec![], t0(), t0() + min(1)))
            .unwrap_err();
        assert_eq!(err, PlanError::EmptyDrivePath);
    }

    #[test]
    fn aggregates_over_a_round_trip() {
        let mut plan = Plan::new();
        plan.push(Action::drive(straight_path(0, 4, 0), t0(), t0() + min(3)))
            .unwrap();
        plan.push(Action::serve("O1", 5.0, t0() + min(3), t0() + min(18)))
            .unwrap();
        plan.push(Action::serve("O2", 3.0, t0() + min(18), t0() + min(33)))
            .unwrap();
        let back: Vec<Position> = straight_path(0, 4, 0).into_iter().rev().collect();
        plan.push(Action::drive(back, t0() + min(33), t0() + min(36)))
            .unwrap();

        assert_eq!(plan.total_distance(), 8);
        assert_eq!(plan.total_glp_delivered(), 8.0);
        assert_eq!(
            plan.served_orders().into_iter().collect::<Vec<_>>(),
            vec!["O1".to_string(), "O2".to_string()]
        );
        assert_eq!(plan.end_position(Position::origin()), Position::new(0, 0));
        assert_eq!(plan.end_time(), Some(t0() + min(36)));
    }

    #[test]
    fn fuel_accounts_for_shrinking_load() {
        let mut plan = Plan::new();
        plan.push(Action::drive(straight_path(0, 10, 0), t0(), t0() + min(8)))
            .unwrap();
        plan.push(Action::serve("O1", 10.0, t0() + min(8), t0() + min(23)))
            .unwrap();
        plan.push(Action::drive(
            straight_path(10, 20, 0),
            t0() + min(23),
            t0() + min(31),
        ))
        .unwrap();

        let fuel = plan.total_fuel(VehicleType::TC, 10.0);
        // Leg 1 loaded (1.5 + 5.0 t), leg 2 empty (1.5 t), both 10 km.
        let expected = 10.0 * 6.5 / 360.0 + 10.0 * 1.5 / 360.0;
        assert!((fuel - expected).abs() < 1e-9);
    }

    #[test]
    fn end_position_falls_back_without_drives() {
        let mut plan = Plan::new();
        plan.push(Action::refuel(t0(), t0() + min(1))).unwrap();
        assert_eq!(plan.end_position(Position::new(12, 8)), Position::new(12, 8));
    }
}
