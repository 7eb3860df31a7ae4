//! Read-only serde views over the orchestrator state.
//!
//! Views are built while holding the read lock and serialized by the caller
//! after it is released, so encoding never blocks the tick loop. Collections
//! are emitted in a deterministic order: two snapshots with no tick between
//! them serialize identically except for the `timestamp` field.

use serde::Serialize;

use crate::config::DATE_TIME_FORMAT;
use crate::grid::Position;
use crate::orchestrator::{Orchestrator, SimulationStats};
use crate::{Id, Timestamp};

fn format_time(at: Timestamp) -> String {
    at.format(DATE_TIME_FORMAT).to_string()
}

fn wall_clock() -> String {
    format_time(chrono::Utc::now().naive_utc())
}

/// One vehicle, with its in-flight work if any.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VehicleView {
    pub id: Id,
    pub vehicle_type: String,
    pub position: Position,
    pub glp_m3: f64,
    pub glp_capacity_m3: f64,
    pub fuel_gal: f64,
    pub status: String,
    /// Label of the action under the plan cursor, if the vehicle has a plan.
    pub current_action: Option<String>,
    /// Cells still ahead on the current drive.
    pub remaining_path: Option<Vec<Position>>,
    /// Orders the remaining plan will serve.
    pub planned_orders: Vec<Id>,
}

/// One pending order with its computed urgency.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderView {
    pub id: Id,
    pub position: Position,
    pub glp_request_m3: f64,
    pub remaining_m3: f64,
    pub arrive_time: String,
    pub due_time: String,
    pub priority: f64,
    pub overdue: bool,
    pub deliveries: usize,
}

/// One active blockage with its cell set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlockageView {
    pub id: Id,
    pub start_time: String,
    pub end_time: String,
    pub cells: Vec<Position>,
}

/// One depot's stock level. Capacity and stock are `None` for the main
/// plant, whose supply is unbounded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DepotView {
    pub id: Id,
    pub position: Position,
    pub glp_capacity_m3: Option<f64>,
    pub current_glp_m3: Option<f64>,
    pub is_main: bool,
    pub can_refuel: bool,
}

/// Loop state and counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusSnapshot {
    pub timestamp: String,
    pub simulation_time: String,
    pub running: bool,
    pub finished: bool,
    pub speed_ms: u64,
    pub tick_counter: u32,
    pub pending_orders: usize,
    pub delivered_orders: usize,
    pub pending_events: usize,
    pub stats: SimulationStats,
}

/// The full tick-atomic world view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnvironmentSnapshot {
    pub timestamp: String,
    pub simulation_time: String,
    pub vehicles: Vec<VehicleView>,
    pub orders: Vec<OrderView>,
    pub blockages: Vec<BlockageView>,
    pub depots: Vec<DepotView>,
}

pub(crate) fn vehicle_views(orchestrator: &Orchestrator) -> Vec<VehicleView> {
    let env = orchestrator.environment();
    let mut views: Vec<VehicleView> = env
        .vehicles()
        .iter()
        .map(|v| VehicleView {
            id: v.id.clone(),
            vehicle_type: v.vehicle_type.to_string(),
            position: v.position,
            glp_m3: v.glp_m3,
            glp_capacity_m3: v.capacity_m3(),
            fuel_gal: v.fuel_gal,
            status: v.status.to_string(),
            current_action: orchestrator
                .current_action(&v.id)
                .map(|a| a.kind.label().to_string()),
            remaining_path: orchestrator.remaining_path(&v.id),
            planned_orders: orchestrator
                .plans()
                .get(&v.id)
                .map(|p| p.served_orders().into_iter().collect())
                .unwrap_or_default(),
        })
        .collect();
    views.sort_by(|a, b| a.id.cmp(&b.id));
    views
}

pub(crate) fn order_views(orchestrator: &Orchestrator) -> Vec<OrderView> {
    let env = orchestrator.environment();
    let now = env.current_time();
    let mut views: Vec<OrderView> = env
        .pending_orders()
        .iter()
        .map(|o| OrderView {
            id: o.id.clone(),
            position: o.position,
            glp_request_m3: o.glp_request_m3,
            remaining_m3: o.remaining_m3,
            arrive_time: format_time(o.arrive_time),
            due_time: format_time(o.due_time),
            priority: o.priority_at(now),
            overdue: o.is_overdue_at(now),
            deliveries: o.deliveries.len(),
        })
        .collect();
    views.sort_by(|a, b| a.id.cmp(&b.id));
    views
}

pub(crate) fn blockage_views(orchestrator: &Orchestrator) -> Vec<BlockageView> {
    let env = orchestrator.environment();
    let now = env.current_time();
    let mut views: Vec<BlockageView> = env
        .active_blockages_at(now)
        .into_iter()
        .map(|b| {
            let mut cells: Vec<Position> = b.blocked_cells().iter().copied().collect();
            cells.sort();
            BlockageView {
                id: b.id.clone(),
                start_time: format_time(b.start_time),
                end_time: format_time(b.end_time),
                cells,
            }
        })
        .collect();
    views.sort_by(|a, b| a.id.cmp(&b.id));
    views
}

pub(crate) fn depot_views(orchestrator: &Orchestrator) -> Vec<DepotView> {
    let mut views: Vec<DepotView> = orchestrator
        .environment()
        .depots()
        .iter()
        .map(|d| DepotView {
            id: d.id.clone(),
            position: d.position,
            glp_capacity_m3: (!d.is_main).then_some(d.glp_capacity_m3),
            current_glp_m3: (!d.is_main).then_some(d.current_glp_m3),
            is_main: d.is_main,
            can_refuel: d.can_refuel,
        })
        .collect();
    views.sort_by(|a, b| a.id.cmp(&b.id));
    views
}

pub(crate) fn status_snapshot(orchestrator: &Orchestrator) -> StatusSnapshot {
    StatusSnapshot {
        timestamp: wall_clock(),
        simulation_time: format_time(orchestrator.sim_time()),
        running: orchestrator.is_running(),
        finished: orchestrator.is_finished(),
        speed_ms: orchestrator.speed_ms(),
        tick_counter: orchestrator.tick_counter(),
        pending_orders: orchestrator.environment().pending_orders().len(),
        delivered_orders: orchestrator.environment().delivered_orders().len(),
        pending_events: orchestrator.pending_event_count(),
        stats: *orchestrator.stats(),
    }
}

pub(crate) fn environment_snapshot(orchestrator: &Orchestrator) -> EnvironmentSnapshot {
    EnvironmentSnapshot {
        timestamp: wall_clock(),
        simulation_time: format_time(orchestrator.sim_time()),
        vehicles: vehicle_views(orchestrator),
        orders: order_views(orchestrator),
        blockages: blockage_views(orchestrator),
        depots: depot_views(orchestrator),
    }
}
