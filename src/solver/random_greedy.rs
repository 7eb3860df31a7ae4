//! Randomised fallback: chunk orders over random vehicles, then repair each
//! vehicle's route greedily by proximity.
//!
//! Used when the insertion heuristic returns nothing at all (typically when
//! every order is already past due, which insertion refuses to schedule).
//! Lateness is acceptable here; an infeasible vehicle is simply dropped.

use std::collections::HashMap;
use std::time::Instant;

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;

use crate::domain::{Vehicle, EPSILON};
use crate::environment::Environment;
use crate::evaluator::Stop;
use crate::plan::PlanMap;
use crate::solver::{Solver, SolverError};
use crate::Id;

/// One split piece of an order, bound for a specific vehicle.
type Chunk = (Id, f64);

pub(crate) fn construct<R: Rng>(
    solver: &Solver,
    problem: &Environment,
    rng: &mut R,
    deadline: Instant,
) -> Result<PlanMap, SolverError> {
    let mut vehicles: Vec<Vehicle> = problem
        .available_vehicles()
        .into_iter()
        .cloned()
        .collect();
    vehicles.sort_by(|a, b| a.id.cmp(&b.id));
    if vehicles.is_empty() {
        return Ok(PlanMap::new());
    }

    let assignments = assign_chunks(solver, problem, &vehicles, rng, deadline)?;

    let mut plans = PlanMap::new();
    for vehicle in &vehicles {
        solver.ensure_budget(deadline)?;
        let Some(chunks) = assignments.get(&vehicle.id) else {
            continue;
        };

        let Some(stops) = fix_route(problem, vehicle, chunks.clone()) else {
            debug!(vehicle = %vehicle.id, "fallback route not fixable; vehicle dropped");
            continue;
        };
        if stops.is_empty() {
            continue;
        }

        let home = problem.main_depot().map(|d| d.position);
        let feasible = solver
            .evaluator()
            .simulate_stops(vehicle, &stops, home, problem)
            .map_or(false, |r| r.feasible);
        if !feasible {
            debug!(vehicle = %vehicle.id, "fallback route infeasible; vehicle dropped");
            continue;
        }

        if let Some(plan) = solver.materialize(vehicle, &stops, problem) {
            if !plan.is_empty() {
                plans.insert(vehicle.id.clone(), plan);
            }
        }
    }

    Ok(plans)
}

/// Splits every open order into capacity-capped chunks and deals them to
/// uniformly random vehicles.
fn assign_chunks<R: Rng>(
    solver: &Solver,
    problem: &Environment,
    vehicles: &[Vehicle],
    rng: &mut R,
    deadline: Instant,
) -> Result<HashMap<Id, Vec<Chunk>>, SolverError> {
    let chunk_sizes = &solver.config().solver.chunk_sizes_m3;
    let mut assignments: HashMap<Id, Vec<Chunk>> = HashMap::new();

    for order in problem.pending_orders() {
        let mut open = order.remaining_m3;
        while open > EPSILON {
            solver.ensure_budget(deadline)?;
            let size = chunk_sizes.choose(rng).copied().unwrap_or(5.0);
            let vehicle = match vehicles.choose(rng) {
                Some(v) => v,
                None => break,
            };
            let chunk = size.min(open).min(vehicle.capacity_m3());
            if chunk <= EPSILON {
                break;
            }
            assignments
                .entry(vehicle.id.clone())
                .or_default()
                .push((order.id.clone(), chunk));
            open -= chunk;
        }
    }

    Ok(assignments)
}

/// Orders a vehicle's chunks greedily by proximity, splicing in fill-up
/// reloads whenever the on-board GLP cannot cover the next chunk. Returns
/// `None` when a needed reload depot does not exist.
fn fix_route(problem: &Environment, vehicle: &Vehicle, mut chunks: Vec<Chunk>) -> Option<Vec<Stop>> {
    let mut stops = Vec::with_capacity(chunks.len());
    let mut position = vehicle.position;
    let mut glp = vehicle.glp_m3;

    while !chunks.is_empty() {
        let next = (0..chunks.len()).min_by_key(|&i| {
            let (order_id, _) = &chunks[i];
            let distance = problem
                .find_order_by_id(order_id)
                .map(|o| position.manhattan_distance(&o.position))
                .unwrap_or(u32::MAX);
            (distance, order_id.clone())
        })?;
        let (order_id, mut amount) = chunks.remove(next);
        let Some(order) = problem.find_order_by_id(&order_id) else {
            continue; // stale chunk for an unknown order
        };

        if glp + EPSILON < amount {
            let shortfall = amount - glp;
            let depot = problem.nearest_reload_depot(position, shortfall)?;
            let fill = vehicle.capacity_m3() - glp;
            let load = if depot.is_main {
                fill
            } else {
                fill.min(depot.current_glp_m3)
            };
            if load > EPSILON {
                stops.push(Stop::reload(depot.id.clone(), load));
                position = depot.position;
                glp = (glp + load).min(vehicle.capacity_m3());
            }
            if glp + EPSILON < amount {
                amount = glp; // best effort: partial chunk
            }
            if amount <= EPSILON {
                continue;
            }
        }

        stops.push(Stop::serve(order_id, amount));
        glp -= amount;
        position = order.position;
    }

    Some(stops)
}
