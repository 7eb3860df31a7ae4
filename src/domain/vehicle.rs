//! Tanker vehicles: type tables, operational state, and fuel arithmetic.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::EPSILON;
use crate::grid::Position;
use crate::Id;

/// GLP density, tons per m³, identical across vehicle types.
pub const GLP_DENSITY_TONS_PER_M3: f64 = 0.5;

/// Divisor of the fuel consumption formula `d × gross_tons / 360`.
pub const FUEL_CONSUMPTION_FACTOR: f64 = 360.0;

/// Fuel tank size in gallons, identical across vehicle types.
pub const FUEL_CAPACITY_GAL: f64 = 25.0;

/// Cruise speed in km/h, identical across vehicle types.
pub const VEHICLE_SPEED_KM_PER_H: f64 = 80.0;

/// Tanker class. Determines GLP capacity and tare weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VehicleType {
    TA,
    TB,
    TC,
    TD,
}

impl VehicleType {
    /// GLP capacity in m³.
    pub fn capacity_m3(&self) -> f64 {
        match self {
            VehicleType::TA => 25.0,
            VehicleType::TB => 15.0,
            VehicleType::TC => 10.0,
            VehicleType::TD => 5.0,
        }
    }

    /// Empty weight in tons.
    pub fn tare_tons(&self) -> f64 {
        match self {
            VehicleType::TA => 2.5,
            VehicleType::TB => 2.0,
            VehicleType::TC => 1.5,
            VehicleType::TD => 1.0,
        }
    }

    /// Weight of a full GLP load in tons.
    pub fn full_load_tons(&self) -> f64 {
        self.capacity_m3() * GLP_DENSITY_TONS_PER_M3
    }

    /// Gross weight in tons when carrying `glp_m3` of product.
    pub fn gross_weight_tons(&self, glp_m3: f64) -> f64 {
        self.tare_tons() + glp_m3 * GLP_DENSITY_TONS_PER_M3
    }

    /// All types, largest first.
    pub fn all() -> [VehicleType; 4] {
        [
            VehicleType::TA,
            VehicleType::TB,
            VehicleType::TC,
            VehicleType::TD,
        ]
    }
}

impl fmt::Display for VehicleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VehicleType::TA => write!(f, "TA"),
            VehicleType::TB => write!(f, "TB"),
            VehicleType::TC => write!(f, "TC"),
            VehicleType::TD => write!(f, "TD"),
        }
    }
}

/// Operational status of a vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VehicleStatus {
    Available,
    Driving,
    Serving,
    Maintenance,
    Refueling,
    Reloading,
    Idle,
    Unavailable,
}

impl VehicleStatus {
    /// Whether the solver may assign new work in this status.
    /// A vehicle already driving can be re-routed; one in the shop cannot.
    pub fn is_assignable(&self) -> bool {
        matches!(
            self,
            VehicleStatus::Available | VehicleStatus::Idle | VehicleStatus::Driving
        )
    }
}

impl fmt::Display for VehicleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VehicleStatus::Available => "AVAILABLE",
            VehicleStatus::Driving => "DRIVING",
            VehicleStatus::Serving => "SERVING",
            VehicleStatus::Maintenance => "MAINTENANCE",
            VehicleStatus::Refueling => "REFUELING",
            VehicleStatus::Reloading => "RELOADING",
            VehicleStatus::Idle => "IDLE",
            VehicleStatus::Unavailable => "UNAVAILABLE",
        };
        write!(f, "{}", s)
    }
}

/// State-mutation failures that indicate an infeasible command, not a bug.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum VehicleError {
    #[error("vehicle {id}: drive of {distance} units needs {required:.3} gal, has {available:.3}")]
    FuelExhausted {
        id: Id,
        distance: u32,
        required: f64,
        available: f64,
    },

    #[error("vehicle {id}: loading {requested:.3} m³ exceeds capacity {capacity:.3} (current {current:.3})")]
    CapacityExceeded {
        id: Id,
        requested: f64,
        capacity: f64,
        current: f64,
    },

    #[error("vehicle {id}: unloading {requested:.3} m³ exceeds current load {current:.3}")]
    InsufficientGlp {
        id: Id,
        requested: f64,
        current: f64,
    },
}

/// A tanker. Identity (`id`, `vehicle_type`) is immutable; everything else is
/// operational state owned by the environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: Id,
    pub vehicle_type: VehicleType,
    pub position: Position,
    /// Current GLP load in m³, within `[0, capacity]`.
    pub glp_m3: f64,
    /// Current fuel in gallons, within `[0, FUEL_CAPACITY_GAL]`.
    pub fuel_gal: f64,
    pub status: VehicleStatus,
}

impl Vehicle {
    /// Creates an available vehicle with full fuel and no product on board.
    pub fn new(id: impl Into<Id>, vehicle_type: VehicleType, position: Position) -> Self {
        Self {
            id: id.into(),
            vehicle_type,
            position,
            glp_m3: 0.0,
            fuel_gal: FUEL_CAPACITY_GAL,
            status: VehicleStatus::Available,
        }
    }

    pub fn capacity_m3(&self) -> f64 {
        self.vehicle_type.capacity_m3()
    }

    pub fn fuel_capacity_gal(&self) -> f64 {
        FUEL_CAPACITY_GAL
    }

    /// Remaining GLP capacity in m³.
    pub fn free_capacity_m3(&self) -> f64 {
        (self.capacity_m3() - self.glp_m3).max(0.0)
    }

    /// Fuel in gallons to drive `distance` grid units at the current load.
    pub fn fuel_needed(&self, distance: u32) -> f64 {
        Self::fuel_for(self.vehicle_type, distance, self.glp_m3)
    }

    /// Fuel in gallons for `vehicle_type` to drive `distance` units carrying `glp_m3`.
    pub fn fuel_for(vehicle_type: VehicleType, distance: u32, glp_m3: f64) -> f64 {
        (distance as f64 * vehicle_type.gross_weight_tons(glp_m3) / FUEL_CONSUMPTION_FACTOR).abs()
    }

    /// Whether the current fuel covers `distance` units. Exactly reaching
    /// zero fuel is accepted.
    pub fn can_reach(&self, distance: u32) -> bool {
        self.fuel_gal - self.fuel_needed(distance) >= -EPSILON
    }

    /// Burns the fuel for a drive of `distance` units.
    pub fn consume_fuel(&mut self, distance: u32) -> Result<(), VehicleError> {
        let required = self.fuel_needed(distance);
        if self.fuel_gal - required < -EPSILON {
            return Err(VehicleError::FuelExhausted {
                id: self.id.clone(),
                distance,
                required,
                available: self.fuel_gal,
            });
        }
        self.fuel_gal = (self.fuel_gal - required).max(0.0);
        Ok(())
    }

    /// Fills the fuel tank.
    pub fn refuel(&mut self) {
        self.fuel_gal = FUEL_CAPACITY_GAL;
    }

    /// Loads GLP into the tank. Fails on overflow.
    pub fn load_glp(&mut self, amount_m3: f64) -> Result<(), VehicleError> {
        if self.glp_m3 + amount_m3 > self.capacity_m3() + EPSILON {
            return Err(VehicleError::CapacityExceeded {
                id: self.id.clone(),
                requested: amount_m3,
                capacity: self.capacity_m3(),
                current: self.glp_m3,
            });
        }
        self.glp_m3 = (self.glp_m3 + amount_m3).min(self.capacity_m3());
        Ok(())
    }

    /// Unloads GLP from the tank. Fails when the tank holds less.
    pub fn unload_glp(&mut self, amount_m3: f64) -> Result<(), VehicleError> {
        if amount_m3 > self.glp_m3 + EPSILON {
            return Err(VehicleError::InsufficientGlp {
                id: self.id.clone(),
                requested: amount_m3,
                current: self.glp_m3,
            });
        }
        self.glp_m3 = (self.glp_m3 - amount_m3).max(0.0);
        Ok(())
    }

    /// Whether the solver may include this vehicle in a new plan.
    pub fn is_assignable(&self) -> bool {
        self.status.is_assignable()
    }

    /// Returns the invariants this vehicle currently violates, as messages.
    pub fn invariant_violations(&self) -> Vec<String> {
        let mut violations = Vec::new();
        if self.glp_m3 < -EPSILON {
            violations.push(format!("vehicle {}: negative glp {}", self.id, self.glp_m3));
        }
        if self.glp_m3 > self.capacity_m3() + EPSILON {
            violations.push(format!(
                "vehicle {}: glp {} exceeds capacity {}",
                self.id,
                self.glp_m3,
                self.capacity_m3()
            ));
        }
        if self.fuel_gal < -EPSILON {
            violations.push(format!(
                "vehicle {}: negative fuel {}",
                self.id, self.fuel_gal
            ));
        }
        if self.fuel_gal > FUEL_CAPACITY_GAL + EPSILON {
            violations.push(format!(
                "vehicle {}: fuel {} exceeds tank size",
                self.id, self.fuel_gal
            ));
        }
        violations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tanker(vehicle_type: VehicleType) -> Vehicle {
        Vehicle::new("V1", vehicle_type, Position::new(12, 8))
    }

    #[test]
    fn type_tables_are_monotone() {
        let caps: Vec<f64> = VehicleType::all().iter().map(|t| t.capacity_m3()).collect();
        assert!(caps.windows(2).all(|w| w[0] > w[1]));
        let tares: Vec<f64> = VehicleType::all().iter().map(|t| t.tare_tons()).collect();
        assert!(tares.windows(2).all(|w| w[0] > w[1]));
    }

    #[test]
    fn full_load_weight_uses_density() {
        assert!((VehicleType::TA.full_load_tons() - 12.5).abs() < EPSILON);
        assert!((VehicleType::TD.full_load_tons() - 2.5).abs() < EPSILON);
    }

    #[test]
    fn fuel_formula_matches_reference_values() {
        // Empty TD over 36 km: 36 × 1.0 / 360 = 0.1 gal.
        assert!((Vehicle::fuel_for(VehicleType::TD, 36, 0.0) - 0.1).abs() < EPSILON);
        // Full TA over 360 km: 360 × (2.5 + 12.5) / 360 = 15 gal.
        assert!((Vehicle::fuel_for(VehicleType::TA, 360, 25.0) - 15.0).abs() < EPSILON);
    }

    #[test]
    fn consume_fuel_to_exactly_zero_is_accepted() {
        let mut v = tanker(VehicleType::TD);
        v.glp_m3 = 0.0;
        // 25 gal / (1.0/360 gal per km) = 9000 km.
        v.fuel_gal = Vehicle::fuel_for(VehicleType::TD, 9_000, 0.0);
        assert!(v.can_reach(9_000));
        v.consume_fuel(9_000).unwrap();
        assert!(v.fuel_gal.abs() < EPSILON);
    }

    #[test]
    fn consume_fuel_beyond_tank_is_rejected() {
        let mut v = tanker(VehicleType::TA);
        v.fuel_gal = 0.01;
        let err = v.consume_fuel(100).unwrap_err();
        assert!(matches!(err, VehicleError::FuelExhausted { .. }));
        // State unchanged on failure.
        assert!((v.fuel_gal - 0.01).abs() < EPSILON);
    }

    #[test]
    fn load_respects_capacity() {
        let mut v = tanker(VehicleType::TC);
        v.load_glp(10.0).unwrap();
        assert!(matches!(
            v.load_glp(0.1),
            Err(VehicleError::CapacityExceeded { .. })
        ));
    }

    #[test]
    fn unload_respects_current_level() {
        let mut v = tanker(VehicleType::TC);
        v.load_glp(4.0).unwrap();
        v.unload_glp(4.0).unwrap();
        assert!(v.glp_m3.abs() < EPSILON);
        assert!(matches!(
            v.unload_glp(1.0),
            Err(VehicleError::InsufficientGlp { .. })
        ));
    }

    #[test]
    fn assignability_by_status() {
        let mut v = tanker(VehicleType::TB);
        for status in [
            VehicleStatus::Available,
            VehicleStatus::Idle,
            VehicleStatus::Driving,
        ] {
            v.status = status;
            assert!(v.is_assignable());
        }
        for status in [
            VehicleStatus::Maintenance,
            VehicleStatus::Unavailable,
            VehicleStatus::Serving,
            VehicleStatus::Refueling,
            VehicleStatus::Reloading,
        ] {
            v.status = status;
            assert!(!v.is_assignable());
        }
    }

    #[test]
    fn invariant_violations_detects_corruption() {
        let mut v = tanker(VehicleType::TD);
        assert!(v.invariant_violations().is_empty());
        v.glp_m3 = -1.0;
        v.fuel_gal = 30.0;
        assert_eq!(v.invariant_violations().len(), 2);
    }
}
