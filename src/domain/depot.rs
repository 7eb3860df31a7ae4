//! GLP depots: the main plant and the auxiliary tanks.

use serde::{Deserialize, Serialize};

use crate::domain::EPSILON;
use crate::grid::Position;
use crate::Id;

/// A GLP source. The main plant behaves as unbounded; auxiliaries hold a
/// finite stock refilled at every simulated midnight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Depot {
    pub id: Id,
    pub position: Position,
    /// Tank capacity in m³. `f64::INFINITY` for the main plant.
    pub glp_capacity_m3: f64,
    pub is_main: bool,
    /// Whether vehicles can refuel here.
    pub can_refuel: bool,
    /// Current stock in m³.
    pub current_glp_m3: f64,
}

impl Depot {
    /// The main plant: unbounded stock, refuelling available.
    pub fn main(id: impl Into<Id>, position: Position) -> Self {
        Self {
            id: id.into(),
            position,
            glp_capacity_m3: f64::INFINITY,
            is_main: true,
            can_refuel: true,
            current_glp_m3: f64::INFINITY,
        }
    }

    /// An auxiliary depot starting at full stock.
    pub fn auxiliary(id: impl Into<Id>, position: Position, capacity_m3: f64) -> Self {
        Self {
            id: id.into(),
            position,
            glp_capacity_m3: capacity_m3,
            is_main: false,
            can_refuel: true,
            current_glp_m3: capacity_m3,
        }
    }

    /// Whether at least `amount_m3` is in stock.
    pub fn has_stock(&self, amount_m3: f64) -> bool {
        self.is_main || self.current_glp_m3 + EPSILON >= amount_m3
    }

    /// Draws up to `amount_m3` from the tank and returns the drawn volume.
    pub fn dispense(&mut self, amount_m3: f64) -> f64 {
        let amount = amount_m3.max(0.0);
        if self.is_main {
            return amount;
        }
        let drawn = amount.min(self.current_glp_m3);
        self.current_glp_m3 = (self.current_glp_m3 - drawn).max(0.0);
        drawn
    }

    /// Restores the tank to capacity (daily midnight hook).
    pub fn refill(&mut self) {
        self.current_glp_m3 = self.glp_capacity_m3;
    }

    /// Returns the invariants this depot currently violates, as messages.
    pub fn invariant_violations(&self) -> Vec<String> {
        let mut violations = Vec::new();
        if self.current_glp_m3 < -EPSILON {
            violations.push(format!(
                "depot {}: negative stock {}",
                self.id, self.current_glp_m3
            ));
        }
        if !self.is_main && self.current_glp_m3 > self.glp_capacity_m3 + EPSILON {
            violations.push(format!(
                "depot {}: stock {} exceeds capacity {}",
                self.id, self.current_glp_m3, self.glp_capacity_m3
            ));
        }
        violations
    }
}
