//! Route construction: the insertion heuristic and its randomised fallback.
//!
//! The solver consumes a cloned environment (the problem) and produces a
//! plan map. Stop sequences are drafted with Manhattan-leg feasibility
//! (delegated to the [`Evaluator`]) and only materialized into real,
//! blockage-aware paths at the end; a draft whose legs cannot be routed is
//! discarded rather than patched.

pub mod insertion;
pub mod random_greedy;

use std::time::{Duration as StdDuration, Instant};

use chrono::Duration;
use rand::rngs::StdRng;
use rand::SeedableRng;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::SimulationConfig;
use crate::domain::Vehicle;
use crate::environment::Environment;
use crate::evaluator::{Evaluator, Stop};
use crate::grid::{Pathfinder, Position};
use crate::plan::{Action, Plan, PlanMap};
use crate::domain::vehicle::VEHICLE_SPEED_KM_PER_H;

/// Solver failures. Infeasibility is never an error; only running out of
/// wall-clock budget is.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SolverError {
    #[error("solver exceeded its {budget_secs} s wall-clock budget")]
    TimedOut { budget_secs: u64 },
}

/// Assignment and routing solver.
#[derive(Debug, Clone)]
pub struct Solver {
    config: SimulationConfig,
    evaluator: Evaluator,
    pathfinder: Pathfinder,
}

impl Solver {
    pub fn new(config: &SimulationConfig) -> Self {
        Self {
            config: config.clone(),
            evaluator: Evaluator::new(config),
            pathfinder: Pathfinder::new(VEHICLE_SPEED_KM_PER_H),
        }
    }

    pub fn evaluator(&self) -> &Evaluator {
        &self.evaluator
    }

    pub fn pathfinder(&self) -> &Pathfinder {
        &self.pathfinder
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Builds plans for the given problem snapshot.
    ///
    /// Runs the insertion heuristic first; when it produces no route at all
    /// while orders and vehicles both exist, falls back to the randomised
    /// chunk assignment.
    pub fn solve(&self, problem: &Environment) -> Result<PlanMap, SolverError> {
        let budget_secs = self.config.solver.budget_secs;
        let deadline = Instant::now() + StdDuration::from_secs(budget_secs);

        let plans = insertion::construct(self, problem, deadline)?;

        let have_orders = problem.pending_orders().iter().any(|o| !o.delivered());
        let have_vehicles = !problem.available_vehicles().is_empty();
        if plans.is_empty() && have_orders && have_vehicles {
            info!("insertion produced no routes; running randomised fallback");
            let mut rng = StdRng::seed_from_u64(self.config.solver.seed);
            let plans = random_greedy::construct(self, problem, &mut rng, deadline)?;
            debug!(routes = plans.len(), "fallback construction finished");
            return Ok(plans);
        }

        debug!(routes = plans.len(), "insertion construction finished");
        Ok(plans)
    }

    /// Fails with [`SolverError::TimedOut`] once `deadline` has passed.
    pub(crate) fn ensure_budget(&self, deadline: Instant) -> Result<(), SolverError> {
        if Instant::now() > deadline {
            warn!(
                budget_secs = self.config.solver.budget_secs,
                "solver budget exhausted"
            );
            return Err(SolverError::TimedOut {
                budget_secs: self.config.solver.budget_secs,
            });
        }
        Ok(())
    }

    /// Turns a draft stop sequence into a timestamped plan with real paths,
    /// appending a final leg to the main depot. Returns `None` when any leg
    /// cannot be routed on the live grid.
    pub(crate) fn materialize(
        &self,
        vehicle: &Vehicle,
        stops: &[Stop],
        problem: &Environment,
    ) -> Option<Plan> {
        let mut plan = Plan::new();
        let mut position = vehicle.position;
        let mut time = problem.current_time();

        for stop in stops {
            let target = match stop {
                Stop::Serve { order_id, .. } => problem.find_order_by_id(order_id)?.position,
                Stop::Reload { depot_id, .. } => problem.find_depot_by_id(depot_id)?.position,
            };
            self.drive_leg(&mut plan, &mut position, &mut time, target, problem)?;

            match stop {
                Stop::Serve {
                    order_id,
                    amount_m3,
                } => {
                    let end = time + Duration::minutes(self.config.serve_duration_minutes);
                    plan.push(Action::serve(order_id.clone(), *amount_m3, time, end))
                        .ok()?;
                    time = end;
                }
                Stop::Reload {
                    depot_id,
                    amount_m3,
                } => {
                    let can_refuel = problem.find_depot_by_id(depot_id)?.can_refuel;
                    let end = time + Duration::minutes(self.config.reload_duration_minutes);
                    plan.push(Action::reload(depot_id.clone(), *amount_m3, time, end))
                        .ok()?;
                    time = end;
                    if can_refuel {
                        let end = time + Duration::minutes(self.config.refuel_duration_minutes);
                        plan.push(Action::refuel(time, end)).ok()?;
                        time = end;
                    }
                }
            }
        }

        if let Some(main) = problem.main_depot() {
            let home = main.position;
            self.drive_leg(&mut plan, &mut position, &mut time, home, problem)?;
        }

        Some(plan)
    }

    fn drive_leg(
        &self,
        plan: &mut Plan,
        position: &mut Position,
        time: &mut crate::Timestamp,
        target: Position,
        problem: &Environment,
    ) -> Option<()> {
        if *position == target {
            return Some(());
        }
        let path = self
            .pathfinder
            .find_path(problem, *position, target, *time)?;
        if path.total_distance == 0 {
            return Some(());
        }
        plan.push(Action::drive(path.positions, *time, path.arrival_time))
            .ok()?;
        *time = path.arrival_time;
        *position = target;
        Some(())
    }
}
