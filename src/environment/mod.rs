//! Authoritative world state: the time cursor and every live domain entity.
//!
//! The environment exclusively owns vehicles, depots, orders, blockages,
//! incidents, and maintenance windows. Plans and events are not owned here;
//! they reference entities by id and are resolved against this state when
//! executed. `clone()` therefore yields a complete, independent problem
//! snapshot for the solver.

use chrono::Duration;
use tracing::{debug, info, warn};

use crate::config::SimulationConfig;
use crate::domain::{Blockage, Depot, Incident, Maintenance, Order, Vehicle, VehicleStatus};
use crate::grid::{Position, TraversalMap};
use crate::Timestamp;

/// The simulated world at one instant.
#[derive(Debug, Clone)]
pub struct Environment {
    config: SimulationConfig,
    current_time: Timestamp,
    vehicles: Vec<Vehicle>,
    depots: Vec<Depot>,
    pending_orders: Vec<Order>,
    delivered_orders: Vec<Order>,
    blockages: Vec<Blockage>,
    incidents: Vec<Incident>,
    maintenance: Vec<Maintenance>,
}

impl Environment {
    /// An empty world starting at `start_time`.
    pub fn new(config: SimulationConfig, start_time: Timestamp) -> Self {
        Self {
            config,
            current_time: start_time,
            vehicles: Vec::new(),
            depots: Vec::new(),
            pending_orders: Vec::new(),
            delivered_orders: Vec::new(),
            blockages: Vec::new(),
            incidents: Vec::new(),
            maintenance: Vec::new(),
        }
    }

    /// A world populated with the reference depots and fleet.
    pub fn with_default_roster(config: SimulationConfig, start_time: Timestamp) -> Self {
        let mut env = Self::new(config, start_time);
        for depot in crate::config::default_depots() {
            env.add_depot(depot);
        }
        for vehicle in crate::config::default_fleet() {
            env.add_vehicle(vehicle);
        }
        env
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn current_time(&self) -> Timestamp {
        self.current_time
    }

    // --- Registration -----------------------------------------------------

    pub fn add_vehicle(&mut self, vehicle: Vehicle) {
        if self.find_vehicle_by_id(&vehicle.id).is_some() {
            warn!(vehicle = %vehicle.id, "duplicate vehicle id ignored");
            return;
        }
        self.vehicles.push(vehicle);
    }

    pub fn add_depot(&mut self, depot: Depot) {
        if self.find_depot_by_id(&depot.id).is_some() {
            warn!(depot = %depot.id, "duplicate depot id ignored");
            return;
        }
        self.depots.push(depot);
    }

    pub fn add_order(&mut self, order: Order) {
        if self.find_order_by_id(&order.id).is_some() {
            warn!(order = %order.id, "duplicate order id ignored");
            return;
        }
        debug!(
            order = %order.id,
            glp_m3 = order.glp_request_m3,
            due = %order.due_time,
            "order registered"
        );
        self.pending_orders.push(order);
    }

    pub fn add_blockage(&mut self, blockage: Blockage) {
        debug!(
            blockage = %blockage.id,
            cells = blockage.blocked_cells().len(),
            from = %blockage.start_time,
            to = %blockage.end_time,
            "blockage registered"
        );
        self.blockages.push(blockage);
    }

    pub fn register_incident(&mut self, incident: Incident) {
        debug!(
            vehicle = %incident.vehicle_id,
            kind = %incident.incident_type,
            available_again = %incident.availability_time(),
            "incident registered"
        );
        self.incidents.push(incident);
    }

    pub fn register_maintenance(&mut self, maintenance: Maintenance) {
        debug!(
            vehicle = %maintenance.vehicle_id,
            from = %maintenance.start,
            to = %maintenance.end,
            "maintenance registered"
        );
        self.maintenance.push(maintenance);
    }

    // --- Queries ----------------------------------------------------------

    pub fn vehicles(&self) -> &[Vehicle] {
        &self.vehicles
    }

    /// Vehicles the solver may plan for.
    pub fn available_vehicles(&self) -> Vec<&Vehicle> {
        self.vehicles.iter().filter(|v| v.is_assignable()).collect()
    }

    pub fn pending_orders(&self) -> &[Order] {
        &self.pending_orders
    }

    pub fn delivered_orders(&self) -> &[Order] {
        &self.delivered_orders
    }

    /// Pending orders past their due time at the current instant.
    pub fn overdue_orders(&self) -> Vec<&Order> {
        self.pending_orders
            .iter()
            .filter(|o| o.is_overdue_at(self.current_time))
            .collect()
    }

    pub fn blockages(&self) -> &[Blockage] {
        &self.blockages
    }

    pub fn active_blockages_at(&self, at: Timestamp) -> Vec<&Blockage> {
        self.blockages.iter().filter(|b| b.active_at(at)).collect()
    }

    pub fn depots(&self) -> &[Depot] {
        &self.depots
    }

    pub fn incidents(&self) -> &[Incident] {
        &self.incidents
    }

    pub fn maintenance_windows(&self) -> &[Maintenance] {
        &self.maintenance
    }

    pub fn find_vehicle_by_id(&self, id: &str) -> Option<&Vehicle> {
        self.vehicles.iter().find(|v| v.id == id)
    }

    pub fn find_vehicle_by_id_mut(&mut self, id: &str) -> Option<&mut Vehicle> {
        self.vehicles.iter_mut().find(|v| v.id == id)
    }

    pub fn find_order_by_id(&self, id: &str) -> Option<&Order> {
        self.pending_orders
            .iter()
            .chain(self.delivered_orders.iter())
            .find(|o| o.id == id)
    }

    pub fn find_order_by_id_mut(&mut self, id: &str) -> Option<&mut Order> {
        self.pending_orders.iter_mut().find(|o| o.id == id)
    }

    pub fn find_depot_by_id(&self, id: &str) -> Option<&Depot> {
        self.depots.iter().find(|d| d.id == id)
    }

    pub fn find_depot_by_id_mut(&mut self, id: &str) -> Option<&mut Depot> {
        self.depots.iter_mut().find(|d| d.id == id)
    }

    pub fn main_depot(&self) -> Option<&Depot> {
        self.depots.iter().find(|d| d.is_main)
    }

    /// The closest refuel-capable depot with at least `amount_m3` in stock.
    /// Distance ties break on depot id so callers stay deterministic.
    pub fn nearest_reload_depot(&self, from: Position, amount_m3: f64) -> Option<&Depot> {
        self.depots
            .iter()
            .filter(|d| d.can_refuel && d.has_stock(amount_m3))
            .min_by_key(|d| (d.position.manhattan_distance(&from), d.id.clone()))
    }

    /// Whether `vehicle_id` has an incident still holding it out of service at `at`.
    pub fn has_unresolved_incident(&self, vehicle_id: &str, at: Timestamp) -> bool {
        self.incidents
            .iter()
            .any(|i| i.vehicle_id == vehicle_id && !i.is_resolved_at(at))
    }

    /// Marks every outstanding incident of `vehicle_id` resolved.
    /// Returns how many were flipped.
    pub fn resolve_incidents_for(&mut self, vehicle_id: &str) -> usize {
        let now = self.current_time;
        let mut resolved = 0;
        for incident in &mut self.incidents {
            if incident.vehicle_id == vehicle_id && !incident.is_resolved_at(now) {
                incident.resolve();
                resolved += 1;
            }
        }
        resolved
    }

    /// Whether `position` is inside a blockage active at `at`.
    pub fn is_position_blocked_at(&self, position: Position, at: Timestamp) -> bool {
        self.blockages
            .iter()
            .any(|b| b.active_at(at) && b.blocks(position))
    }

    // --- Mutation ---------------------------------------------------------

    /// Refills one depot by id. Returns false when the id is unknown.
    pub fn refill_depot(&mut self, id: &str) -> bool {
        match self.find_depot_by_id_mut(id) {
            Some(depot) => {
                depot.refill();
                true
            }
            None => false,
        }
    }

    /// Refills every auxiliary depot to capacity.
    pub fn refill_auxiliaries(&mut self) {
        for depot in self.depots.iter_mut().filter(|d| !d.is_main) {
            depot.refill();
        }
    }

    /// Advances the time cursor by `delta_minutes`, applying the transition
    /// effects in order:
    ///
    /// 1. A crossed local midnight refills every depot.
    /// 2. Vehicle statuses are recomputed from the maintenance and incident
    ///    registries.
    /// 3. Delivered orders leave the pending queue; blockages whose window
    ///    has passed are dropped.
    pub fn advance_time(&mut self, delta_minutes: i64) {
        let new_time = self.current_time + Duration::minutes(delta_minutes);

        if new_time.date() != self.current_time.date() {
            info!(day = %new_time.date(), "day boundary: refilling depots");
            for depot in &mut self.depots {
                depot.refill();
            }
        }

        let home = self.depots.iter().find(|d| d.is_main).map(|d| d.position);
        let maintenance = &self.maintenance;
        let incidents = &self.incidents;
        for vehicle in &mut self.vehicles {
            let in_maintenance = maintenance
                .iter()
                .any(|m| m.vehicle_id == vehicle.id && m.active_at(new_time));
            let incident_hold = incidents
                .iter()
                .any(|i| i.vehicle_id == vehicle.id && !i.is_resolved_at(new_time));

            if in_maintenance {
                if vehicle.status != VehicleStatus::Maintenance {
                    debug!(vehicle = %vehicle.id, "entering maintenance");
                }
                vehicle.status = VehicleStatus::Maintenance;
            } else if incident_hold {
                vehicle.status = VehicleStatus::Unavailable;
            } else if matches!(
                vehicle.status,
                VehicleStatus::Maintenance | VehicleStatus::Unavailable
            ) {
                // A severe breakdown ends with the vehicle towed to the
                // plant rather than resuming from the roadside.
                let towed_home = incidents.iter().any(|i| {
                    i.vehicle_id == vehicle.id
                        && i.incident_type.requires_depot_return()
                        && i.availability_time() <= new_time
                });
                if towed_home {
                    if let Some(position) = home {
                        vehicle.position = position;
                    }
                }
                debug!(vehicle = %vehicle.id, "back in service");
                vehicle.status = VehicleStatus::Available;
            }
        }

        let mut still_pending = Vec::with_capacity(self.pending_orders.len());
        for order in self.pending_orders.drain(..) {
            if order.delivered() {
                debug!(order = %order.id, "order completed");
                self.delivered_orders.push(order);
            } else {
                still_pending.push(order);
            }
        }
        self.pending_orders = still_pending;

        self.blockages.retain(|b| !b.expired_before(new_time));

        self.current_time = new_time;
    }

    // --- Auditing ---------------------------------------------------------

    /// Collects every violated state invariant as a message. Empty = healthy.
    pub fn check_invariants(&self) -> Vec<String> {
        let mut violations = Vec::new();
        for vehicle in &self.vehicles {
            violations.extend(vehicle.invariant_violations());
        }
        for order in self.pending_orders.iter().chain(&self.delivered_orders) {
            violations.extend(order.invariant_violations());
        }
        for depot in &self.depots {
            violations.extend(depot.invariant_violations());
        }
        violations
    }
}

impl TraversalMap for Environment {
    fn width(&self) -> i32 {
        self.config.grid.width
    }

    fn height(&self) -> i32 {
        self.config.grid.height
    }

    fn is_blocked_at(&self, position: Position, at: Timestamp) -> bool {
        self.is_position_blocked_at(position, at)
    }
}
