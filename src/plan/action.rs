//! Typed plan actions with expected execution windows.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::grid::Position;
use crate::{Id, Timestamp};

/// What a vehicle does during one action. Order and depot stops carry ids
/// only; they are resolved against the live environment at execution time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ActionKind {
    /// Follow `path` (adjacent cells, first = current position).
    Drive { path: Vec<Position> },
    /// Deliver up to `amount_m3` to an order.
    Serve { order_id: Id, amount_m3: f64 },
    /// Fill the fuel tank at the current position.
    Refuel,
    /// Load `amount_m3` of GLP from a depot.
    Reload { depot_id: Id, amount_m3: f64 },
    /// Hold position.
    Idle,
}

impl ActionKind {
    /// Short label for logs and status views.
    pub fn label(&self) -> &'static str {
        match self {
            ActionKind::Drive { .. } => "DRIVE",
            ActionKind::Serve { .. } => "SERVE",
            ActionKind::Refuel => "REFUEL",
            ActionKind::Reload { .. } => "RELOAD",
            ActionKind::Idle => "IDLE",
        }
    }
}

/// One step of a vehicle plan, scheduled over `[expected_start, expected_end]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub kind: ActionKind,
    pub expected_start: Timestamp,
    pub expected_end: Timestamp,
}

impl Action {
    pub fn drive(path: Vec<Position>, expected_start: Timestamp, expected_end: Timestamp) -> Self {
        Self {
            kind: ActionKind::Drive { path },
            expected_start,
            expected_end,
        }
    }

    pub fn serve(
        order_id: impl Into<Id>,
        amount_m3: f64,
        expected_start: Timestamp,
        expected_end: Timestamp,
    ) -> Self {
        Self {
            kind: ActionKind::Serve {
                order_id: order_id.into(),
                amount_m3,
            },
            expected_start,
            expected_end,
        }
    }

    pub fn refuel(expected_start: Timestamp, expected_end: Timestamp) -> Self {
        Self {
            kind: ActionKind::Refuel,
            expected_start,
            expected_end,
        }
    }

    pub fn reload(
        depot_id: impl Into<Id>,
        amount_m3: f64,
        expected_start: Timestamp,
        expected_end: Timestamp,
    ) -> Self {
        Self {
            kind: ActionKind::Reload {
                depot_id: depot_id.into(),
                amount_m3,
            },
            expected_start,
            expected_end,
        }
    }

    pub fn idle(expected_start: Timestamp, expected_end: Timestamp) -> Self {
        Self {
            kind: ActionKind::Idle,
            expected_start,
            expected_end,
        }
    }

    /// Grid units covered by this action (zero unless driving).
    pub fn distance(&self) -> u32 {
        match &self.kind {
            ActionKind::Drive { path } => path.len().saturating_sub(1) as u32,
            _ => 0,
        }
    }

    /// First cell of a drive path.
    pub fn start_position(&self) -> Option<Position> {
        match &self.kind {
            ActionKind::Drive { path } => path.first().copied(),
            _ => None,
        }
    }

    /// Last cell of a drive path.
    pub fn end_position(&self) -> Option<Position> {
        match &self.kind {
            ActionKind::Drive { path } => path.last().copied(),
            _ => None,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ActionKind::Drive { path } => {
                write!(f, "DRIVE[{} steps]", path.len().saturating_sub(1))
            }
            ActionKind::Serve {
                order_id,
                amount_m3,
            } => write!(f, "SERVE[{} {:.1} m³]", order_id, amount_m3),
            ActionKind::Refuel => write!(f, "REFUEL"),
            ActionKind::Reload {
                depot_id,
                amount_m3,
            } => write!(f, "RELOAD[{} {:.1} m³]", depot_id, amount_m3),
            ActionKind::Idle => write!(f, "IDLE"),
        }
    }
}
