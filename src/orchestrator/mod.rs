//! The tick loop: drain events, execute due actions, decide replanning,
//! advance time.
//!
//! One tick is atomic from the outside; the control facade only observes
//! the state between ticks. Inside a tick the phases always run in the same
//! order: events first, then action execution, then the replanning decision,
//! then the time advance.

pub mod stats;

#[cfg(test)]
mod tests;

use std::collections::HashMap;
use std::time::Instant;

use chrono::Duration;
use tracing::{debug, error, info, warn};

use crate::config::SimulationConfig;
use crate::domain::{Incident, VehicleStatus};
use crate::environment::Environment;
use crate::events::{Event, EventKind, EventQueue};
use crate::grid::Position;
use crate::plan::{Action, ActionKind, PlanMap};
use crate::solver::Solver;
use crate::{Id, Timestamp};

pub use stats::SimulationStats;

/// Lifecycle of the action under a vehicle's cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum ActionPhase {
    #[default]
    Scheduled,
    Executing,
}

/// Per-vehicle plan cursor.
#[derive(Debug, Clone, Copy, Default)]
struct Progress {
    index: usize,
    phase: ActionPhase,
}

/// What one `run_step` call did.
#[derive(Debug, Clone, Copy)]
pub struct TickReport {
    /// Simulation time after the tick.
    pub sim_time: Timestamp,
    pub events_applied: usize,
    pub actions_completed: usize,
    pub replanned: bool,
    /// False once paused or finished.
    pub running: bool,
    /// True once SIMULATION_END has been applied.
    pub finished: bool,
}

/// The simulation driver.
pub struct Orchestrator {
    env: Environment,
    queue: EventQueue,
    plans: PlanMap,
    progress: HashMap<Id, Progress>,
    solver: Solver,
    config: SimulationConfig,
    sim_time: Timestamp,
    tick_counter: u32,
    last_plan_time: Timestamp,
    needs_replanning: bool,
    running: bool,
    finished: bool,
    speed_ms: u64,
    stats: SimulationStats,
}

impl Orchestrator {
    /// Wraps an environment; simulation time starts at the environment's
    /// current time.
    pub fn new(env: Environment) -> Self {
        let config = env.config().clone();
        let sim_time = env.current_time();
        Self {
            solver: Solver::new(&config),
            speed_ms: config.default_speed_ms,
            env,
            queue: EventQueue::new(),
            plans: PlanMap::new(),
            progress: HashMap::new(),
            config,
            sim_time,
            tick_counter: 0,
            last_plan_time: sim_time,
            needs_replanning: false,
            running: true,
            finished: false,
            stats: SimulationStats::default(),
        }
    }

    // --- Accessors ---------------------------------------------------------

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    pub fn environment_mut(&mut self) -> &mut Environment {
        &mut self.env
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn plans(&self) -> &PlanMap {
        &self.plans
    }

    pub fn sim_time(&self) -> Timestamp {
        self.sim_time
    }

    pub fn tick_counter(&self) -> u32 {
        self.tick_counter
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn needs_replanning(&self) -> bool {
        self.needs_replanning
    }

    pub fn speed_ms(&self) -> u64 {
        self.speed_ms
    }

    pub fn stats(&self) -> &SimulationStats {
        &self.stats
    }

    pub fn pending_event_count(&self) -> usize {
        self.queue.len()
    }

    /// The action currently under a vehicle's plan cursor.
    pub fn current_action(&self, vehicle_id: &str) -> Option<&Action> {
        let progress = self.progress.get(vehicle_id).copied().unwrap_or_default();
        self.plans.get(vehicle_id)?.actions().get(progress.index)
    }

    /// Cells still ahead on the vehicle's current drive, if it is driving.
    pub fn remaining_path(&self, vehicle_id: &str) -> Option<Vec<Position>> {
        match &self.current_action(vehicle_id)?.kind {
            ActionKind::Drive { path } => {
                let at = self.env.find_vehicle_by_id(vehicle_id)?.position;
                let from = path.iter().position(|p| *p == at).unwrap_or(0);
                Some(path[from..].to_vec())
            }
            _ => None,
        }
    }

    // --- External control --------------------------------------------------

    /// Schedules an event. Safe to call at any point; it takes effect when
    /// the tick loop drains its timestamp.
    pub fn push_event(&mut self, event: Event) {
        self.queue.push(event);
    }

    /// Pause flag. Idempotent; a finished simulation stays finished.
    pub fn set_running(&mut self, running: bool) {
        if !self.finished {
            self.running = running;
        }
    }

    /// Raw pacing setter; range validation lives in the control facade.
    pub fn set_speed_ms(&mut self, speed_ms: u64) {
        self.speed_ms = speed_ms;
    }

    /// Registers a breakdown: incident recorded, vehicle out of service,
    /// its plan aborted.
    pub fn apply_breakdown(&mut self, incident: Incident) {
        let vehicle_id = incident.vehicle_id.clone();
        warn!(
            vehicle = %vehicle_id,
            kind = %incident.incident_type,
            "vehicle breakdown"
        );
        self.env.register_incident(incident);
        self.abort_plan(&vehicle_id, "breakdown");
        if let Some(vehicle) = self.env.find_vehicle_by_id_mut(&vehicle_id) {
            vehicle.status = VehicleStatus::Unavailable;
        }
        self.needs_replanning = true;
    }

    /// Resolves a vehicle's incidents and puts it back in service.
    pub fn apply_repair(&mut self, vehicle_id: &str) {
        let resolved = self.env.resolve_incidents_for(vehicle_id);
        if let Some(vehicle) = self.env.find_vehicle_by_id_mut(vehicle_id) {
            vehicle.status = VehicleStatus::Available;
        }
        info!(vehicle = %vehicle_id, incidents = resolved, "vehicle repaired");
        self.needs_replanning = true;
    }

    // --- Tick loop ---------------------------------------------------------

    /// Executes one tick. The caller (worker thread or test) is responsible
    /// for pacing and for not calling this while paused.
    pub fn run_step(&mut self) -> TickReport {
        debug_assert_eq!(self.env.current_time(), self.sim_time);

        // 1. Drain due events.
        let due = self.queue.poll_due(self.sim_time);
        let events_applied = due.len();
        for event in due {
            self.apply_event(event);
        }

        // 2. Execute due plan actions.
        let actions_completed = self.execute_due_actions();

        // 3. Count the tick.
        self.tick_counter += 1;

        // 4. Replanning decision.
        let replanned = self.decide_replanning();

        // 5. Advance simulated time.
        self.sim_time += Duration::minutes(self.config.step_minutes);
        self.env.advance_time(self.config.step_minutes);

        // 6. Post-tick invariant audit.
        self.audit_invariants();

        self.stats.ticks += 1;
        TickReport {
            sim_time: self.sim_time,
            events_applied,
            actions_completed,
            replanned,
            running: self.running,
            finished: self.finished,
        }
    }

    fn apply_event(&mut self, event: Event) {
        debug!(kind = event.kind.label(), time = %event.time, "applying event");
        let triggers = event.kind.triggers_replanning();

        match event.kind {
            EventKind::OrderArrival(order) => self.env.add_order(order),
            EventKind::BlockageStart(blockage) => {
                // Schedule the matching end event so routes refresh the
                // moment the window closes.
                self.queue.push(Event::new(
                    blockage.end_time,
                    EventKind::BlockageEnd {
                        blockage_id: blockage.id.clone(),
                    },
                ));
                self.env.add_blockage(blockage);
            }
            EventKind::BlockageEnd { blockage_id } => {
                // The environment drops the blockage itself once the window
                // has passed; this event only forces fresh routes.
                debug!(blockage = %blockage_id, "blockage window closed");
            }
            EventKind::VehicleBreakdown(incident) => self.apply_breakdown(incident),
            EventKind::MaintenanceStart(maintenance) => {
                let vehicle_id = maintenance.vehicle_id.clone();
                // Close this window on schedule and book the bimonthly
                // repetition.
                self.queue.push(Event::new(
                    maintenance.end,
                    EventKind::MaintenanceEnd {
                        vehicle_id: vehicle_id.clone(),
                    },
                ));
                let next = maintenance.create_next();
                self.queue
                    .push(Event::new(next.start, EventKind::MaintenanceStart(next)));
                self.env.register_maintenance(maintenance);
                self.abort_plan(&vehicle_id, "maintenance");
                if let Some(vehicle) = self.env.find_vehicle_by_id_mut(&vehicle_id) {
                    vehicle.status = VehicleStatus::Maintenance;
                }
            }
            EventKind::MaintenanceEnd { vehicle_id } => {
                debug!(vehicle = %vehicle_id, "maintenance window closed");
            }
            EventKind::GlpDepotRefill { depot_id } => match depot_id {
                Some(id) => {
                    if !self.env.refill_depot(&id) {
                        warn!(depot = %id, "refill event for unknown depot");
                    }
                }
                None => self.env.refill_auxiliaries(),
            },
            EventKind::PlanCheckpoint => {}
            EventKind::SimulationEnd => {
                info!(time = %self.sim_time, "simulation end");
                self.running = false;
                self.finished = true;
            }
        }

        if triggers {
            self.needs_replanning = true;
        }
        self.stats.events_applied += 1;
    }

    /// Advances every vehicle's plan cursor as far as the clock allows.
    fn execute_due_actions(&mut self) -> usize {
        let now = self.sim_time;
        let mut vehicle_ids: Vec<Id> = self.plans.keys().cloned().collect();
        vehicle_ids.sort();

        let mut completed = 0;
        for vehicle_id in vehicle_ids {
            loop {
                let Some(plan) = self.plans.get(&vehicle_id) else {
                    break;
                };
                let progress = self.progress.get(&vehicle_id).copied().unwrap_or_default();

                if progress.index >= plan.len() {
                    self.finish_plan(&vehicle_id);
                    break;
                }
                let action = plan.actions()[progress.index].clone();

                if progress.phase == ActionPhase::Scheduled {
                    if action.expected_start > now {
                        break;
                    }
                    if let Err(reason) = self.start_action(&vehicle_id, &action) {
                        warn!(
                            vehicle = %vehicle_id,
                            action = action.kind.label(),
                            %reason,
                            "action precondition failed; aborting plan"
                        );
                        self.abort_plan(&vehicle_id, "failed precondition");
                        self.needs_replanning = true;
                        break;
                    }
                    self.set_progress(&vehicle_id, progress.index, ActionPhase::Executing);
                }

                if action.expected_end > now {
                    break;
                }
                self.complete_action(&vehicle_id, &action);
                self.set_progress(&vehicle_id, progress.index + 1, ActionPhase::Scheduled);
                completed += 1;
                self.stats.actions_completed += 1;
            }
        }
        completed
    }

    fn set_progress(&mut self, vehicle_id: &str, index: usize, phase: ActionPhase) {
        self.progress
            .insert(vehicle_id.to_string(), Progress { index, phase });
    }

    /// Checks preconditions and flips the vehicle into the action's status.
    fn start_action(&mut self, vehicle_id: &str, action: &Action) -> Result<(), String> {
        if let ActionKind::Reload { depot_id, .. } = &action.kind {
            if self.env.find_depot_by_id(depot_id).is_none() {
                return Err(format!("unknown depot {}", depot_id));
            }
        }
        let Some(vehicle) = self.env.find_vehicle_by_id_mut(vehicle_id) else {
            return Err("vehicle not found".to_string());
        };

        match &action.kind {
            ActionKind::Drive { path } => {
                let Some(first) = path.first() else {
                    return Err("empty drive path".to_string());
                };
                if *first != vehicle.position {
                    return Err(format!(
                        "drive starts at {} but vehicle is at {}",
                        first, vehicle.position
                    ));
                }
                let distance = (path.len() - 1) as u32;
                if !vehicle.can_reach(distance) {
                    return Err(format!(
                        "needs {:.3} gal for {} units, has {:.3}",
                        vehicle.fuel_needed(distance),
                        distance,
                        vehicle.fuel_gal
                    ));
                }
                vehicle.status = VehicleStatus::Driving;
            }
            ActionKind::Serve { .. } => vehicle.status = VehicleStatus::Serving,
            ActionKind::Refuel => vehicle.status = VehicleStatus::Refueling,
            ActionKind::Reload { .. } => vehicle.status = VehicleStatus::Reloading,
            ActionKind::Idle => vehicle.status = VehicleStatus::Idle,
        }
        Ok(())
    }

    /// Applies the action's material effects at its expected end.
    fn complete_action(&mut self, vehicle_id: &str, action: &Action) {
        let now = self.sim_time;
        match &action.kind {
            ActionKind::Drive { path } => {
                let distance = (path.len().saturating_sub(1)) as u32;
                if let Some(vehicle) = self.env.find_vehicle_by_id_mut(vehicle_id) {
                    if let Err(err) = vehicle.consume_fuel(distance) {
                        warn!(vehicle = %vehicle_id, %err, "fuel ran out mid-drive");
                        self.abort_plan(vehicle_id, "fuel exhausted");
                        self.needs_replanning = true;
                        return;
                    }
                    if let Some(last) = path.last() {
                        vehicle.position = *last;
                    }
                }
                self.stats.distance_driven += u64::from(distance);
            }
            ActionKind::Serve {
                order_id,
                amount_m3,
            } => {
                let available = self
                    .env
                    .find_vehicle_by_id(vehicle_id)
                    .map(|v| v.glp_m3)
                    .unwrap_or(0.0);
                let open = self
                    .env
                    .find_order_by_id(order_id)
                    .map(|o| o.remaining_m3)
                    .unwrap_or(0.0);
                let amount = amount_m3.min(available).min(open);
                if amount <= 0.0 {
                    debug!(vehicle = %vehicle_id, order = %order_id, "nothing to serve");
                    return;
                }

                if let Some(vehicle) = self.env.find_vehicle_by_id_mut(vehicle_id) {
                    if let Err(err) = vehicle.unload_glp(amount) {
                        error!(vehicle = %vehicle_id, %err, "serve bookkeeping failed");
                        return;
                    }
                }
                let booked = self
                    .env
                    .find_order_by_id_mut(order_id)
                    .map(|o| o.record_delivery(vehicle_id, amount, now))
                    .unwrap_or(0.0);
                if booked > 0.0 {
                    info!(
                        vehicle = %vehicle_id,
                        order = %order_id,
                        amount_m3 = booked,
                        "delivery completed"
                    );
                    self.stats.deliveries += 1;
                    self.stats.glp_delivered_m3 += booked;
                }
            }
            ActionKind::Refuel => {
                if let Some(vehicle) = self.env.find_vehicle_by_id_mut(vehicle_id) {
                    vehicle.refuel();
                }
            }
            ActionKind::Reload {
                depot_id,
                amount_m3,
            } => {
                let free = self
                    .env
                    .find_vehicle_by_id(vehicle_id)
                    .map(|v| v.free_capacity_m3())
                    .unwrap_or(0.0);
                let drawn = self
                    .env
                    .find_depot_by_id_mut(depot_id)
                    .map(|d| d.dispense(amount_m3.min(free)))
                    .unwrap_or(0.0);
                if drawn > 0.0 {
                    if let Some(vehicle) = self.env.find_vehicle_by_id_mut(vehicle_id) {
                        if let Err(err) = vehicle.load_glp(drawn) {
                            error!(vehicle = %vehicle_id, %err, "reload bookkeeping failed");
                        }
                    }
                }
            }
            ActionKind::Idle => {}
        }
    }

    /// Drops a finished plan and returns the vehicle to the idle pool.
    fn finish_plan(&mut self, vehicle_id: &str) {
        self.plans.remove(vehicle_id);
        self.progress.remove(vehicle_id);
        if let Some(vehicle) = self.env.find_vehicle_by_id_mut(vehicle_id) {
            if matches!(
                vehicle.status,
                VehicleStatus::Driving
                    | VehicleStatus::Serving
                    | VehicleStatus::Refueling
                    | VehicleStatus::Reloading
                    | VehicleStatus::Idle
            ) {
                vehicle.status = VehicleStatus::Available;
            }
        }
        debug!(vehicle = %vehicle_id, "plan completed");
    }

    /// Removes a vehicle's plan without executing the remaining actions and
    /// returns the vehicle to the idle pool (callers that take it out of
    /// service set their own status afterwards).
    fn abort_plan(&mut self, vehicle_id: &str, reason: &str) {
        if self.plans.remove(vehicle_id).is_some() {
            self.progress.remove(vehicle_id);
            self.stats.actions_aborted += 1;
            self.release_vehicle(vehicle_id);
            debug!(vehicle = %vehicle_id, reason, "plan aborted");
        }
    }

    /// Resets an action-bound status back to available.
    fn release_vehicle(&mut self, vehicle_id: &str) {
        if let Some(vehicle) = self.env.find_vehicle_by_id_mut(vehicle_id) {
            if matches!(
                vehicle.status,
                VehicleStatus::Driving
                    | VehicleStatus::Serving
                    | VehicleStatus::Refueling
                    | VehicleStatus::Reloading
                    | VehicleStatus::Idle
            ) {
                vehicle.status = VehicleStatus::Available;
            }
        }
    }

    /// Evaluates the replan triggers and, when preconditions hold, swaps the
    /// plan map wholesale. The trigger state resets either way so a failing
    /// precondition cannot wedge the loop.
    fn decide_replanning(&mut self) -> bool {
        let since_last_plan = self.sim_time - self.last_plan_time;
        let time_based = self.needs_replanning
            && since_last_plan > Duration::minutes(self.config.replan_interval_minutes);
        let tick_based = self.tick_counter >= self.config.ticks_per_replan;
        if !time_based && !tick_based {
            return false;
        }

        let mut replanned = false;
        let mut retry = false;
        let have_orders = !self.env.pending_orders().is_empty();
        let have_vehicles = !self.env.available_vehicles().is_empty();

        if have_orders && have_vehicles {
            let started = Instant::now();
            let problem = self.env.clone();
            match self.solver.solve(&problem) {
                Ok(new_plans) => {
                    info!(
                        routes = new_plans.len(),
                        pending = self.env.pending_orders().len(),
                        "replanned"
                    );
                    self.install_plans(new_plans);
                    self.stats.replans += 1;
                    replanned = true;
                }
                Err(err) => {
                    // Keep the previous plans and try again next tick.
                    warn!(%err, "solver failed; retaining previous plans");
                    retry = true;
                }
            }
            self.stats.solver_millis += started.elapsed().as_millis() as u64;
        } else {
            self.stats.replans_skipped += 1;
        }

        self.tick_counter = 0;
        self.last_plan_time = self.sim_time;
        self.needs_replanning = retry;
        replanned
    }

    /// Swaps in a fresh plan map. A vehicle in the middle of an action keeps
    /// its current plan when the new solution does not cover it (the solver
    /// never plans for a vehicle that is serving or reloading, and cutting
    /// an action halfway would leave half-applied state). Vehicles whose
    /// not-yet-started work is dropped go back to the pool.
    fn install_plans(&mut self, new_plans: PlanMap) {
        let old_plans = std::mem::take(&mut self.plans);
        let old_progress = std::mem::take(&mut self.progress);
        self.plans = new_plans;

        for (vehicle_id, old_plan) in old_plans {
            if self.plans.contains_key(&vehicle_id) {
                continue;
            }
            let in_flight = old_progress
                .get(&vehicle_id)
                .map_or(false, |p| p.phase == ActionPhase::Executing);
            if in_flight {
                if let Some(progress) = old_progress.get(&vehicle_id) {
                    self.progress.insert(vehicle_id.clone(), *progress);
                }
                self.plans.insert(vehicle_id, old_plan);
            } else {
                self.release_vehicle(&vehicle_id);
            }
        }
    }

    /// Post-tick invariant audit. A violation is a programmer error: it is
    /// logged loudly and forces a full replan on the next tick.
    fn audit_invariants(&mut self) {
        let mut violations = self.env.check_invariants();
        for (vehicle_id, plan) in &self.plans {
            if !plan.timestamps_monotone() {
                violations.push(format!("plan for {}: non-monotone timestamps", vehicle_id));
            }
        }
        if !violations.is_empty() {
            for violation in &violations {
                error!(%violation, "invariant violated");
            }
            self.needs_replanning = true;
        }
    }
}
