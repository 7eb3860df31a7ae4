//! Sequential insertion heuristic: seed the tightest feasible order, then
//! grow each route by cheapest feasible insertion.

use std::collections::HashMap;
use std::time::Instant;

use tracing::debug;

use crate::domain::{Order, Vehicle, EPSILON};
use crate::environment::Environment;
use crate::evaluator::{RouteReport, Stop};
use crate::plan::PlanMap;
use crate::solver::{Solver, SolverError};
use crate::Id;

/// An accepted insertion: the perturbed route and what it booked.
struct BestInsertion {
    route: Vec<Stop>,
    order_id: Id,
    amount_m3: f64,
    cost: f64,
}

/// Builds one route per available vehicle until orders run out.
///
/// Vehicles are visited in id order, orders in ascending time-window length
/// (the most critical first), so a given problem always yields the same
/// plans.
pub(crate) fn construct(
    solver: &Solver,
    problem: &Environment,
    deadline: Instant,
) -> Result<PlanMap, SolverError> {
    let main_position = problem.main_depot().map(|d| d.position);

    let mut orders: Vec<Order> = problem
        .pending_orders()
        .iter()
        .filter(|o| !o.delivered())
        .cloned()
        .collect();
    orders.sort_by(|a, b| {
        a.time_window()
            .cmp(&b.time_window())
            .then_with(|| a.id.cmp(&b.id))
    });

    let mut remaining: HashMap<Id, f64> = orders
        .iter()
        .map(|o| (o.id.clone(), o.remaining_m3))
        .collect();

    let mut vehicles: Vec<Vehicle> = problem
        .available_vehicles()
        .into_iter()
        .cloned()
        .collect();
    vehicles.sort_by(|a, b| a.id.cmp(&b.id));

    let mut plans = PlanMap::new();

    for vehicle in &vehicles {
        solver.ensure_budget(deadline)?;
        if remaining.values().all(|r| *r <= EPSILON) {
            break;
        }

        let Some((seed_id, seed_amount)) =
            find_seed(solver, problem, vehicle, &orders, &remaining, main_position)
        else {
            continue;
        };

        let mut route = vec![Stop::serve(seed_id.clone(), seed_amount)];
        let mut booked: Vec<(Id, f64)> = vec![(seed_id.clone(), seed_amount)];
        book(&mut remaining, &seed_id, seed_amount);

        loop {
            solver.ensure_budget(deadline)?;
            let Some(current) = feasible_report(solver, problem, vehicle, &route, None) else {
                break;
            };
            let Some(best) =
                find_best_insertion(solver, problem, vehicle, &route, &current, &orders, &remaining)
            else {
                break;
            };
            book(&mut remaining, &best.order_id, best.amount_m3);
            booked.push((best.order_id.clone(), best.amount_m3));
            debug!(
                vehicle = %vehicle.id,
                order = %best.order_id,
                amount_m3 = best.amount_m3,
                cost = best.cost,
                "order inserted"
            );
            route = best.route;
        }

        // Closing the route: a drive home must still be fuel-feasible, or
        // the whole route is discarded and its orders released to the pool.
        let closed = feasible_report(solver, problem, vehicle, &route, main_position).is_some();
        let plan = if closed {
            solver.materialize(vehicle, &route, problem)
        } else {
            None
        };

        match plan {
            Some(plan) if !plan.is_empty() => {
                plans.insert(vehicle.id.clone(), plan);
            }
            _ => {
                debug!(vehicle = %vehicle.id, "route not closable; orders released");
                for (order_id, amount) in booked {
                    release(&mut remaining, &order_id, amount);
                }
            }
        }
    }

    Ok(plans)
}

fn book(remaining: &mut HashMap<Id, f64>, order_id: &str, amount: f64) {
    if let Some(r) = remaining.get_mut(order_id) {
        *r = (*r - amount).max(0.0);
    }
}

fn release(remaining: &mut HashMap<Id, f64>, order_id: &str, amount: f64) {
    if let Some(r) = remaining.get_mut(order_id) {
        *r += amount;
    }
}

/// Simulates a route and returns the report only when it is feasible.
fn feasible_report(
    solver: &Solver,
    problem: &Environment,
    vehicle: &Vehicle,
    route: &[Stop],
    return_to: Option<crate::grid::Position>,
) -> Option<RouteReport> {
    solver
        .evaluator()
        .simulate_stops(vehicle, route, return_to, problem)
        .filter(|r| r.feasible)
}

/// Picks the first order (in criticality order) the vehicle can serve from
/// its current state, on time, with a fuel-feasible return to the plant.
fn find_seed(
    solver: &Solver,
    problem: &Environment,
    vehicle: &Vehicle,
    orders: &[Order],
    remaining: &HashMap<Id, f64>,
    main_position: Option<crate::grid::Position>,
) -> Option<(Id, f64)> {
    let allow_partial = solver.config().evaluator.allow_partial_delivery;

    for order in orders {
        let open = remaining.get(&order.id).copied().unwrap_or(0.0);
        if open <= EPSILON {
            continue;
        }
        let amount = if vehicle.glp_m3 + EPSILON >= open {
            open
        } else if allow_partial && vehicle.glp_m3 > EPSILON {
            vehicle.glp_m3
        } else {
            continue;
        };

        let candidate = [Stop::serve(order.id.clone(), amount)];
        let Some(report) = feasible_report(solver, problem, vehicle, &candidate, main_position)
        else {
            continue;
        };
        if report.delay_minutes > EPSILON {
            continue; // seed must arrive before the due time
        }
        return Some((order.id.clone(), amount));
    }
    None
}

/// Tries every (order, position) pair, with a reload-preceded variant when
/// the plain insertion is not feasible, and returns the cheapest one.
fn find_best_insertion(
    solver: &Solver,
    problem: &Environment,
    vehicle: &Vehicle,
    route: &[Stop],
    current: &RouteReport,
    orders: &[Order],
    remaining: &HashMap<Id, f64>,
) -> Option<BestInsertion> {
    let weights = &solver.config().solver;
    let mut best: Option<BestInsertion> = None;

    for order in orders {
        let open = remaining.get(&order.id).copied().unwrap_or(0.0);
        if open <= EPSILON {
            continue;
        }
        let amount = open.min(vehicle.capacity_m3());

        for index in 0..=route.len() {
            let plain = spliced(route, index, &[Stop::serve(order.id.clone(), amount)]);
            let candidate = if insertion_works(solver, problem, vehicle, &plain) {
                Some(plain)
            } else {
                with_reload(solver, problem, vehicle, route, index, &order.id, amount)
                    .filter(|c| insertion_works(solver, problem, vehicle, c))
            };
            let Some(candidate) = candidate else { continue };
            let Some(report) = feasible_report(solver, problem, vehicle, &candidate, None) else {
                continue;
            };

            let delta_distance = report.distance as f64 - current.distance as f64;
            let delta_delay = report.delay_minutes - current.delay_minutes;
            let waiting = (report.slack_minutes - current.slack_minutes).max(0.0);
            let cost = weights.distance_weight * delta_distance
                + weights.delay_weight * delta_delay
                + weights.waiting_weight * waiting;

            if best.as_ref().map_or(true, |b| cost < b.cost) {
                best = Some(BestInsertion {
                    route: candidate,
                    order_id: order.id.clone(),
                    amount_m3: amount,
                    cost,
                });
            }
        }
    }

    best
}

/// A candidate is acceptable when it stays fuel-feasible, keeps every serve
/// on time, and can actually deliver each stop's booked amount.
fn insertion_works(
    solver: &Solver,
    problem: &Environment,
    vehicle: &Vehicle,
    candidate: &[Stop],
) -> bool {
    if !amounts_deliverable(vehicle, candidate) {
        return false;
    }
    match feasible_report(solver, problem, vehicle, candidate, None) {
        Some(report) => report.delay_minutes <= EPSILON,
        None => false,
    }
}

/// Variant with a fill-up reload spliced in just before the new serve.
/// The depot is the nearest refuel-capable one holding the fill volume.
fn with_reload(
    solver: &Solver,
    problem: &Environment,
    vehicle: &Vehicle,
    route: &[Stop],
    index: usize,
    order_id: &str,
    amount: f64,
) -> Option<Vec<Stop>> {
    let prefix_report = solver
        .evaluator()
        .simulate_stops(vehicle, &route[..index], None, problem)
        .filter(|r| r.feasible)?;

    let fill = vehicle.capacity_m3() - prefix_report.end_glp_m3;
    if fill <= EPSILON {
        return None;
    }
    let depot = problem.nearest_reload_depot(prefix_report.end_position, fill)?;

    Some(spliced(
        route,
        index,
        &[
            Stop::reload(depot.id.clone(), fill),
            Stop::serve(order_id.to_string(), amount),
        ],
    ))
}

/// Walks the GLP level through the stops and checks every serve can deliver
/// its full booked amount.
fn amounts_deliverable(vehicle: &Vehicle, stops: &[Stop]) -> bool {
    let mut glp = vehicle.glp_m3;
    for stop in stops {
        match stop {
            Stop::Serve { amount_m3, .. } => {
                if glp + EPSILON < *amount_m3 {
                    return false;
                }
                glp -= amount_m3;
            }
            Stop::Reload { amount_m3, .. } => {
                glp = (glp + amount_m3).min(vehicle.capacity_m3());
            }
        }
    }
    true
}

fn spliced(route: &[Stop], index: usize, inserted: &[Stop]) -> Vec<Stop> {
    let mut out = Vec::with_capacity(route.len() + inserted.len());
    out.extend_from_slice(&route[..index]);
    out.extend_from_slice(inserted);
    out.extend_from_slice(&route[index..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulationConfig;
    use crate::domain::{Depot, VehicleType};
    use crate::grid::Position;
    use crate::plan::ActionKind;
    use chrono::{Duration, NaiveDate};
    use std::time::Duration as StdDuration;

    fn t0() -> crate::Timestamp {
        NaiveDate::from_ymd_opt(2025, 3, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
    }

    fn far_deadline() -> Instant {
        Instant::now() + StdDuration::from_secs(60)
    }

    fn base_env() -> Environment {
        let mut env = Environment::new(SimulationConfig::default(), t0());
        env.add_depot(Depot::main("MAIN_PLANT", Position::new(12, 8)));
        env.add_depot(Depot::auxiliary("NORTH_DEPOT", Position::new(42, 42), 160.0));
        env
    }

    fn loaded(id: &str, vehicle_type: VehicleType) -> Vehicle {
        let mut v = Vehicle::new(id, vehicle_type, Position::new(12, 8));
        v.glp_m3 = vehicle_type.capacity_m3();
        v
    }

    fn order(id: &str, amount: f64, due_hours: i64, position: Position) -> Order {
        Order::new(id, t0(), t0() + Duration::hours(due_hours), amount, position)
    }

    #[test]
    fn single_order_yields_out_and_back_plan() {
        let mut env = base_env();
        env.add_vehicle(loaded("TC01", VehicleType::TC));
        env.add_order(order("O1", 8.0, 4, Position::new(15, 10)));

        let solver = Solver::new(env.config());
        let plans = construct(&solver, &env, far_deadline()).unwrap();

        assert_eq!(plans.len(), 1);
        let plan = &plans["TC01"];
        let labels: Vec<_> = plan.actions().iter().map(|a| a.kind.label()).collect();
        assert_eq!(labels, vec!["DRIVE", "SERVE", "DRIVE"]);
        assert_eq!(plan.served_orders().len(), 1);
        assert!(plan.timestamps_monotone());
    }

    #[test]
    fn tightest_window_gets_the_seed() {
        let mut env = base_env();
        env.add_vehicle(loaded("TD01", VehicleType::TD)); // 5 m³: one order only
        env.add_order(order("LOOSE", 5.0, 20, Position::new(20, 8)));
        env.add_order(order("TIGHT", 5.0, 2, Position::new(20, 9)));

        let solver = Solver::new(env.config());
        let plans = construct(&solver, &env, far_deadline()).unwrap();

        // The first serve of the route is the seed.
        let first_served = plans["TD01"]
            .actions()
            .iter()
            .find_map(|a| match &a.kind {
                ActionKind::Serve { order_id, .. } => Some(order_id.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(first_served, "TIGHT");
    }

    #[test]
    fn second_order_is_inserted_into_the_same_route() {
        let mut env = base_env();
        env.add_vehicle(loaded("TB01", VehicleType::TB)); // 15 m³
        env.add_order(order("O1", 6.0, 6, Position::new(16, 8)));
        env.add_order(order("O2", 6.0, 6, Position::new(18, 8)));

        let solver = Solver::new(env.config());
        let plans = construct(&solver, &env, far_deadline()).unwrap();

        assert_eq!(plans.len(), 1);
        let served = plans["TB01"].served_orders();
        assert!(served.contains("O1") && served.contains("O2"));
    }

    #[test]
    fn glp_shortfall_inserts_a_reload_stop() {
        let mut env = base_env();
        env.add_vehicle(loaded("TD01", VehicleType::TD)); // 5 m³ on board
        env.add_order(order("O1", 5.0, 8, Position::new(16, 8)));
        env.add_order(order("O2", 5.0, 8, Position::new(18, 8)));

        let solver = Solver::new(env.config());
        let plans = construct(&solver, &env, far_deadline()).unwrap();

        let plan = &plans["TD01"];
        let served = plan.served_orders();
        assert!(served.contains("O1") && served.contains("O2"));
        assert!(plan
            .actions()
            .iter()
            .any(|a| matches!(a.kind, ActionKind::Reload { .. })));
    }

    #[test]
    fn overdue_orders_are_never_inserted() {
        let mut env = base_env();
        env.add_vehicle(loaded("TC01", VehicleType::TC));
        env.add_order(Order::new(
            "LATE",
            t0() - Duration::hours(3),
            t0() - Duration::hours(1), // already past due
            5.0,
            Position::new(20, 8),
        ));

        let solver = Solver::new(env.config());
        let plans = construct(&solver, &env, far_deadline()).unwrap();
        assert!(plans.is_empty());
    }

    #[test]
    fn vehicle_without_glp_is_skipped() {
        let mut env = base_env();
        env.add_vehicle(Vehicle::new("TC01", VehicleType::TC, Position::new(12, 8)));
        env.add_order(order("O1", 8.0, 4, Position::new(15, 10)));

        let solver = Solver::new(env.config());
        let plans = construct(&solver, &env, far_deadline()).unwrap();
        assert!(plans.is_empty());
    }

    #[test]
    fn full_capacity_solution_scores_finite_and_complete() {
        let mut env = base_env();
        env.add_vehicle(loaded("TB01", VehicleType::TB));
        env.add_vehicle(loaded("TC01", VehicleType::TC));
        env.add_order(order("O1", 9.0, 6, Position::new(20, 10)));
        env.add_order(order("O2", 10.0, 6, Position::new(8, 20)));

        let solver = Solver::new(env.config());
        let plans = construct(&solver, &env, far_deadline()).unwrap();

        let evaluator = solver.evaluator();
        assert!(evaluator.score_solution(&plans, &env).is_finite());
        assert!(evaluator.is_valid(&plans, &env));
        assert_eq!(evaluator.order_fulfilment_rate(&plans, &env), 1.0);
        assert_eq!(evaluator.glp_satisfaction_rate(&plans, &env), 1.0);
    }

    #[test]
    fn construction_is_deterministic() {
        let mut env = base_env();
        env.add_vehicle(loaded("TB01", VehicleType::TB));
        env.add_vehicle(loaded("TB02", VehicleType::TB));
        for n in 0..6 {
            env.add_order(order(
                &format!("O{}", n),
                4.0,
                4 + n as i64,
                Position::new(10 + 3 * n, 12),
            ));
        }

        let solver = Solver::new(env.config());
        let first = construct(&solver, &env, far_deadline()).unwrap();
        let second = construct(&solver, &env, far_deadline()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn elapsed_deadline_times_out() {
        let mut env = base_env();
        env.add_vehicle(loaded("TC01", VehicleType::TC));
        env.add_order(order("O1", 8.0, 4, Position::new(15, 10)));

        let solver = Solver::new(env.config());
        let past = Instant::now() - StdDuration::from_millis(5);
        assert!(matches!(
            construct(&solver, &env, past),
            Err(SolverError::TimedOut { .. })
        ));
    }
}
