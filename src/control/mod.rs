//! External control surface: pause/resume, pacing, breakdown injection,
//! repair, and tick-atomic snapshots.
//!
//! A [`SimulationHandle`] wraps the orchestrator in the single process-wide
//! reader/writer lock. The simulation worker takes the write lock for the
//! duration of one tick; control commands take it briefly; snapshots share
//! the read lock and never observe a partial tick.

pub mod errors;
pub mod snapshot;
pub mod worker;

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use crate::domain::{Incident, IncidentType, Order, VehicleStatus};
use crate::events::{Event, EventKind};
use crate::orchestrator::{Orchestrator, TickReport};

pub use errors::ControlError;
pub use snapshot::{
    BlockageView, DepotView, EnvironmentSnapshot, OrderView, StatusSnapshot, VehicleView,
};
pub use worker::SimulationWorker;

/// Shared, clonable handle over the running simulation.
#[derive(Clone)]
pub struct SimulationHandle {
    pub(crate) inner: Arc<RwLock<Orchestrator>>,
}

impl SimulationHandle {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self {
            inner: Arc::new(RwLock::new(orchestrator)),
        }
    }

    // --- Loop control -------------------------------------------------------

    /// Suspends the tick loop. Idempotent.
    pub fn pause(&self) {
        self.inner.write().set_running(false);
        info!("simulation paused");
    }

    /// Resumes the tick loop. Idempotent; a finished simulation stays
    /// finished.
    pub fn resume(&self) {
        self.inner.write().set_running(true);
        info!("simulation resumed");
    }

    pub fn is_running(&self) -> bool {
        self.inner.read().is_running()
    }

    /// Sets the wall-clock pause between ticks, validated against the
    /// configured range.
    pub fn set_speed(&self, speed_ms: u64) -> Result<(), ControlError> {
        let mut orchestrator = self.inner.write();
        let (min, max) = {
            let config = orchestrator.config();
            (config.min_speed_ms, config.max_speed_ms)
        };
        if speed_ms < min || speed_ms > max {
            return Err(ControlError::SpeedOutOfRange {
                requested: speed_ms,
                min,
                max,
            });
        }
        orchestrator.set_speed_ms(speed_ms);
        info!(speed_ms, "tick pacing changed");
        Ok(())
    }

    pub fn speed(&self) -> u64 {
        self.inner.read().speed_ms()
    }

    /// Runs exactly one tick. Intended for tests and external drivers that
    /// pace the loop themselves.
    pub fn step_once(&self) -> TickReport {
        self.inner.write().run_step()
    }

    // --- Producers ----------------------------------------------------------

    /// Schedules an arbitrary event.
    pub fn submit_event(&self, event: Event) {
        self.inner.write().push_event(event);
    }

    /// Registers an order as an arrival event at the current simulated time,
    /// so it lands at the next tick boundary like any other event.
    pub fn submit_order(&self, order: Order) {
        let mut orchestrator = self.inner.write();
        let at = orchestrator.sim_time();
        orchestrator.push_event(Event::new(at, EventKind::OrderArrival(order)));
    }

    // --- Fleet commands -----------------------------------------------------

    /// Injects a breakdown at the current simulated time. The incident type
    /// is inferred from the estimated repair duration.
    pub fn break_down(
        &self,
        vehicle_id: &str,
        reason: &str,
        estimated_repair_hours: f64,
    ) -> Result<(), ControlError> {
        let mut orchestrator = self.inner.write();
        let (status, position) = {
            let vehicle = orchestrator
                .environment()
                .find_vehicle_by_id(vehicle_id)
                .ok_or_else(|| ControlError::VehicleNotFound(vehicle_id.to_string()))?;
            (vehicle.status, vehicle.position)
        };
        if status == VehicleStatus::Unavailable {
            return Err(ControlError::VehicleAlreadyUnavailable(
                vehicle_id.to_string(),
            ));
        }

        let incident = Incident::new(
            vehicle_id,
            IncidentType::from_estimated_hours(estimated_repair_hours),
            orchestrator.sim_time(),
            position,
        )
        .with_reason(reason);
        orchestrator.apply_breakdown(incident);
        Ok(())
    }

    /// Resolves a broken-down vehicle's incidents and returns it to service.
    pub fn repair(&self, vehicle_id: &str) -> Result<(), ControlError> {
        let mut orchestrator = self.inner.write();
        let status = orchestrator
            .environment()
            .find_vehicle_by_id(vehicle_id)
            .map(|v| v.status)
            .ok_or_else(|| ControlError::VehicleNotFound(vehicle_id.to_string()))?;
        if status != VehicleStatus::Unavailable {
            return Err(ControlError::VehicleNotUnavailable(vehicle_id.to_string()));
        }

        orchestrator.apply_repair(vehicle_id);
        Ok(())
    }

    // --- Snapshots ----------------------------------------------------------

    pub fn snapshot_environment(&self) -> EnvironmentSnapshot {
        snapshot::environment_snapshot(&self.inner.read())
    }

    pub fn snapshot_vehicles(&self) -> Vec<VehicleView> {
        snapshot::vehicle_views(&self.inner.read())
    }

    pub fn snapshot_orders(&self) -> Vec<OrderView> {
        snapshot::order_views(&self.inner.read())
    }

    pub fn snapshot_blockages(&self) -> Vec<BlockageView> {
        snapshot::blockage_views(&self.inner.read())
    }

    pub fn snapshot_status(&self) -> StatusSnapshot {
        snapshot::status_snapshot(&self.inner.read())
    }
}
