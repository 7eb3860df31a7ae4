//! Deterministic cost and feasibility scoring for plans and solutions.
//!
//! Everything here is a pure function of (vehicle state, route, environment):
//! no mutation, no randomness. Infeasibility is not an error, it is an
//! infinite cost, which is how the solver prunes candidates.

use chrono::Duration;

use crate::config::SimulationConfig;
use crate::domain::{Vehicle, EPSILON};
use crate::domain::vehicle::VEHICLE_SPEED_KM_PER_H;
use crate::environment::Environment;
use crate::grid::Position;
use crate::plan::{ActionKind, Plan, PlanMap};
use crate::{Id, Timestamp};

/// A stop of a draft route, before paths and timestamps are materialized.
#[derive(Debug, Clone, PartialEq)]
pub enum Stop {
    /// Deliver `amount_m3` to an order.
    Serve { order_id: Id, amount_m3: f64 },
    /// Load `amount_m3` at a depot (implies a full refuel where possible).
    Reload { depot_id: Id, amount_m3: f64 },
}

impl Stop {
    pub fn serve(order_id: impl Into<Id>, amount_m3: f64) -> Self {
        Stop::Serve {
            order_id: order_id.into(),
            amount_m3,
        }
    }

    pub fn reload(depot_id: impl Into<Id>, amount_m3: f64) -> Self {
        Stop::Reload {
            depot_id: depot_id.into(),
            amount_m3,
        }
    }
}

/// Outcome of simulating a stop sequence with Manhattan legs.
#[derive(Debug, Clone)]
pub struct RouteReport {
    /// False when fuel, capacity, or partial-delivery rules were violated.
    pub feasible: bool,
    /// Total grid units over all legs (including the return leg, if any).
    pub distance: u32,
    /// Arrival instant at each stop.
    pub arrivals: Vec<Timestamp>,
    /// Total minutes of lateness accumulated over serve stops.
    pub delay_minutes: f64,
    /// Total minutes of slack before due times over serve stops.
    pub slack_minutes: f64,
    /// Lateness penalty portion of the route cost.
    pub late_cost: f64,
    pub end_position: Position,
    pub end_time: Timestamp,
    pub end_glp_m3: f64,
    pub end_fuel_gal: f64,
}

impl RouteReport {
    fn infeasible(position: Position, time: Timestamp) -> Self {
        Self {
            feasible: false,
            distance: 0,
            arrivals: Vec::new(),
            delay_minutes: 0.0,
            slack_minutes: 0.0,
            late_cost: f64::INFINITY,
            end_position: position,
            end_time: time,
            end_glp_m3: 0.0,
            end_fuel_gal: 0.0,
        }
    }
}

/// Cost components of a whole solution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostBreakdown {
    pub distance_cost: f64,
    pub late_cost: f64,
    pub undelivered_cost: f64,
    pub total: f64,
}

/// Plan and solution scorer.
#[derive(Debug, Clone)]
pub struct Evaluator {
    config: crate::config::EvaluatorConfig,
    serve_minutes: i64,
    reload_minutes: i64,
    refuel_minutes: i64,
}

impl Evaluator {
    pub fn new(config: &SimulationConfig) -> Self {
        Self {
            config: config.evaluator,
            serve_minutes: config.serve_duration_minutes,
            reload_minutes: config.reload_duration_minutes,
            refuel_minutes: config.refuel_duration_minutes,
        }
    }

    fn travel(&self, distance: u32) -> Duration {
        let seconds = distance as f64 * 3_600.0 / VEHICLE_SPEED_KM_PER_H;
        Duration::seconds(seconds.round() as i64)
    }

    fn lateness_penalty(&self, arrival: Timestamp, due: Timestamp) -> (f64, f64) {
        if arrival <= due {
            return (0.0, 0.0);
        }
        let late_minutes = (arrival - due).num_seconds() as f64 / 60.0;
        let late_hours = (late_minutes / 60.0).ceil();
        (late_minutes, late_hours * self.config.late_penalty_per_hour)
    }

    // --- Stop-sequence simulation ----------------------------------------

    /// Simulates `stops` from the vehicle's current state using Manhattan
    /// legs, optionally followed by a return leg to `return_to`.
    ///
    /// Returns `None` when a stop references an unknown order or depot;
    /// rule violations yield a report with `feasible == false`.
    pub fn simulate_stops(
        &self,
        vehicle: &Vehicle,
        stops: &[Stop],
        return_to: Option<Position>,
        env: &Environment,
    ) -> Option<RouteReport> {
        let mut position = vehicle.position;
        let mut glp = vehicle.glp_m3;
        let mut fuel = vehicle.fuel_gal;
        let mut time = env.current_time();
        let mut distance = 0u32;
        let mut arrivals = Vec::with_capacity(stops.len());
        let mut delay_minutes = 0.0;
        let mut slack_minutes = 0.0;
        let mut late_cost = 0.0;

        for stop in stops {
            let target = match stop {
                Stop::Serve { order_id, .. } => env.find_order_by_id(order_id)?.position,
                Stop::Reload { depot_id, .. } => env.find_depot_by_id(depot_id)?.position,
            };

            let leg = position.manhattan_distance(&target);
            let fuel_needed = Vehicle::fuel_for(vehicle.vehicle_type, leg, glp);
            if fuel_needed > fuel + EPSILON {
                return Some(RouteReport::infeasible(position, time));
            }
            fuel -= fuel_needed;
            distance += leg;
            time += self.travel(leg);
            position = target;
            arrivals.push(time);

            match stop {
                Stop::Serve {
                    order_id,
                    amount_m3,
                } => {
                    if !self.config.allow_partial_delivery && *amount_m3 > glp + EPSILON {
                        return Some(RouteReport::infeasible(position, time));
                    }
                    let order = env.find_order_by_id(order_id)?;
                    let (late, penalty) = self.lateness_penalty(time, order.due_time);
                    delay_minutes += late;
                    late_cost += penalty;
                    if late == 0.0 {
                        slack_minutes += (order.due_time - time).num_seconds() as f64 / 60.0;
                    }
                    glp = (glp - amount_m3.min(glp)).max(0.0);
                    time += Duration::minutes(self.serve_minutes);
                }
                Stop::Reload {
                    depot_id,
                    amount_m3,
                } => {
                    let depot = env.find_depot_by_id(depot_id)?;
                    if !depot.has_stock(*amount_m3) {
                        return Some(RouteReport::infeasible(position, time));
                    }
                    if glp + amount_m3 > vehicle.capacity_m3() + EPSILON
                        && self.config.enforce_capacity
                        && !self.config.allow_overflow
                    {
                        return Some(RouteReport::infeasible(position, time));
                    }
                    glp = (glp + amount_m3).min(vehicle.capacity_m3());
                    time += Duration::minutes(self.reload_minutes);
                    if depot.can_refuel {
                        fuel = vehicle.fuel_capacity_gal();
                        time += Duration::minutes(self.refuel_minutes);
                    }
                }
            }
        }

        if let Some(destination) = return_to {
            let leg = position.manhattan_distance(&destination);
            let fuel_needed = Vehicle::fuel_for(vehicle.vehicle_type, leg, glp);
            if fuel_needed > fuel + EPSILON {
                return Some(RouteReport::infeasible(position, time));
            }
            fuel -= fuel_needed;
            distance += leg;
            time += self.travel(leg);
            position = destination;
        }

        Some(RouteReport {
            feasible: true,
            distance,
            arrivals,
            delay_minutes,
            slack_minutes,
            late_cost,
            end_position: position,
            end_time: time,
            end_glp_m3: glp,
            end_fuel_gal: fuel,
        })
    }

    // --- Plan scoring -----------------------------------------------------

    /// Scores one materialized plan: the lateness penalty sum, or
    /// `f64::INFINITY` when any feasibility rule is violated.
    pub fn score_plan(&self, vehicle: &Vehicle, plan: &Plan, env: &Environment) -> f64 {
        let mut glp = vehicle.glp_m3;
        let mut fuel = vehicle.fuel_gal;
        let mut time = env.current_time();
        let mut late_cost = 0.0;

        for action in plan.actions() {
            match &action.kind {
                ActionKind::Drive { .. } => {
                    let leg = action.distance();
                    let fuel_needed = Vehicle::fuel_for(vehicle.vehicle_type, leg, glp);
                    if fuel_needed > fuel + EPSILON {
                        return f64::INFINITY;
                    }
                    fuel -= fuel_needed;
                    time += self.travel(leg);
                }
                ActionKind::Serve {
                    order_id,
                    amount_m3,
                } => {
                    if !self.config.allow_partial_delivery && *amount_m3 > glp + EPSILON {
                        return f64::INFINITY;
                    }
                    let Some(order) = env.find_order_by_id(order_id) else {
                        return f64::INFINITY;
                    };
                    let (_, penalty) = self.lateness_penalty(time, order.due_time);
                    late_cost += penalty;
                    glp = (glp - amount_m3.min(glp)).max(0.0);
                    time += Duration::minutes(self.serve_minutes);
                }
                ActionKind::Refuel => {
                    fuel = vehicle.fuel_capacity_gal();
                    time += Duration::minutes(self.refuel_minutes);
                }
                ActionKind::Reload { amount_m3, .. } => {
                    if glp + amount_m3 > vehicle.capacity_m3() + EPSILON
                        && self.config.enforce_capacity
                        && !self.config.allow_overflow
                    {
                        return f64::INFINITY;
                    }
                    // Fuel is untouched here: a reload only moves product.
                    // Plans refuel through an explicit action, which depots
                    // without a pump never get.
                    glp = (glp + amount_m3).min(vehicle.capacity_m3());
                    time += Duration::minutes(self.reload_minutes);
                }
                ActionKind::Idle => {
                    time += action.expected_end - action.expected_start;
                }
            }
        }

        late_cost
    }

    /// Scores a whole solution:
    /// `Σ route late costs + undelivered × penalty + distance × weight`.
    pub fn score_solution(&self, plans: &PlanMap, env: &Environment) -> f64 {
        self.cost_breakdown(plans, env).total
    }

    /// Detailed cost components of a solution.
    pub fn cost_breakdown(&self, plans: &PlanMap, env: &Environment) -> CostBreakdown {
        let mut late_cost = 0.0;
        let mut total_distance = 0u32;

        for (vehicle_id, plan) in plans {
            let Some(vehicle) = env.find_vehicle_by_id(vehicle_id) else {
                return CostBreakdown {
                    distance_cost: 0.0,
                    late_cost: f64::INFINITY,
                    undelivered_cost: 0.0,
                    total: f64::INFINITY,
                };
            };
            let route = self.score_plan(vehicle, plan, env);
            if route.is_infinite() {
                return CostBreakdown {
                    distance_cost: 0.0,
                    late_cost: f64::INFINITY,
                    undelivered_cost: 0.0,
                    total: f64::INFINITY,
                };
            }
            late_cost += route;
            total_distance += plan.total_distance();
        }

        let undelivered = self.undelivered_count(plans, env) as f64;
        let distance_cost = total_distance as f64 * self.config.distance_cost_weight;
        let undelivered_cost = undelivered * self.config.undelivered_penalty;

        CostBreakdown {
            distance_cost,
            late_cost,
            undelivered_cost,
            total: distance_cost + late_cost + undelivered_cost,
        }
    }

    /// Whether every plan in the solution is feasible.
    pub fn is_valid(&self, plans: &PlanMap, env: &Environment) -> bool {
        self.score_solution(plans, env).is_finite()
    }

    /// Fraction of pending orders whose remaining volume the solution covers.
    pub fn order_fulfilment_rate(&self, plans: &PlanMap, env: &Environment) -> f64 {
        let pending = env.pending_orders();
        if pending.is_empty() {
            return 1.0;
        }
        let covered = pending
            .iter()
            .filter(|o| self.planned_for(plans, &o.id) + EPSILON >= o.remaining_m3)
            .count();
        covered as f64 / pending.len() as f64
    }

    /// Fraction of the total pending volume the solution covers.
    pub fn glp_satisfaction_rate(&self, plans: &PlanMap, env: &Environment) -> f64 {
        let requested: f64 = env.pending_orders().iter().map(|o| o.remaining_m3).sum();
        if requested <= EPSILON {
            return 1.0;
        }
        let planned: f64 = env
            .pending_orders()
            .iter()
            .map(|o| self.planned_for(plans, &o.id).min(o.remaining_m3))
            .sum();
        planned / requested
    }

    fn planned_for(&self, plans: &PlanMap, order_id: &str) -> f64 {
        plans
            .values()
            .flat_map(|p| p.actions())
            .map(|a| match &a.kind {
                ActionKind::Serve {
                    order_id: id,
                    amount_m3,
                } if id == order_id => *amount_m3,
                _ => 0.0,
            })
            .sum()
    }

    fn undelivered_count(&self, plans: &PlanMap, env: &Environment) -> usize {
        env.pending_orders()
            .iter()
            .filter(|o| self.planned_for(plans, &o.id) + EPSILON < o.remaining_m3)
            .count()
    }
}
