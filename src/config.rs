//! Simulation configuration and the default city roster.
//!
//! Everything that used to be scattered module-level constants lives in one
//! [`SimulationConfig`] handed to the orchestrator at construction. The
//! default values describe the reference city: a 70×50 grid, a main plant at
//! (12,8), two auxiliary depots, and a 20-vehicle tanker fleet.

use crate::domain::{Depot, Vehicle, VehicleType};
use crate::grid::Position;

/// Canonical timestamp format for every serialized view (`2025-03-01 08:30:00`).
pub const DATE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// City grid geometry.
#[derive(Debug, Clone, Copy)]
pub struct GridConfig {
    /// Grid width W; valid x is `0..W`.
    pub width: i32,
    /// Grid height H; valid y is `0..H`.
    pub height: i32,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            width: 70,
            height: 50,
        }
    }
}

/// Knobs for the route construction heuristics.
#[derive(Debug, Clone)]
pub struct SolverConfig {
    /// Insertion cost weight on added distance (α).
    pub distance_weight: f64,
    /// Insertion cost weight on induced delay (β).
    pub delay_weight: f64,
    /// Insertion cost weight on slack before the due time (γ).
    pub waiting_weight: f64,
    /// Wall-clock budget for a single solve; overruns keep the previous plans.
    pub budget_secs: u64,
    /// Seed for the randomised fallback, so runs are reproducible.
    pub seed: u64,
    /// Chunk sizes the fallback splits orders into, in m³.
    pub chunk_sizes_m3: Vec<f64>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            distance_weight: 0.6,
            delay_weight: 0.3,
            waiting_weight: 0.1,
            budget_secs: 30,
            seed: 42,
            chunk_sizes_m3: vec![5.0, 10.0, 15.0, 20.0, 25.0],
        }
    }
}

/// Feasibility toggles and penalty weights for plan scoring.
#[derive(Debug, Clone, Copy)]
pub struct EvaluatorConfig {
    /// Whether a vehicle may serve less than the requested amount.
    pub allow_partial_delivery: bool,
    /// Whether reload amounts are checked against vehicle capacity.
    pub enforce_capacity: bool,
    /// Whether a reload overflowing the tank is tolerated (clamped) instead of infeasible.
    pub allow_overflow: bool,
    /// Penalty per started hour of lateness at a delivery.
    pub late_penalty_per_hour: f64,
    /// Penalty per order left without a plan.
    pub undelivered_penalty: f64,
    /// Cost per grid unit of total distance.
    pub distance_cost_weight: f64,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            allow_partial_delivery: true,
            enforce_capacity: true,
            allow_overflow: false,
            late_penalty_per_hour: 500.0,
            undelivered_penalty: 10_000.0,
            distance_cost_weight: 10.0,
        }
    }
}

/// Top-level simulation configuration.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    // --- World geometry ---
    pub grid: GridConfig,

    // --- Tick loop ---
    /// Simulated minutes advanced per tick.
    pub step_minutes: i64,
    /// Minimum simulated minutes between time-triggered replans.
    pub replan_interval_minutes: i64,
    /// Tick count that forces a replan regardless of the time trigger.
    pub ticks_per_replan: u32,

    // --- Wall-clock pacing ---
    /// Default milliseconds the worker sleeps between ticks.
    pub default_speed_ms: u64,
    /// Lower bound accepted by the speed command.
    pub min_speed_ms: u64,
    /// Upper bound accepted by the speed command.
    pub max_speed_ms: u64,

    // --- Service durations ---
    /// Minutes a vehicle spends serving an order.
    pub serve_duration_minutes: i64,
    /// Minutes a vehicle spends reloading GLP at a depot.
    pub reload_duration_minutes: i64,
    /// Minutes a vehicle spends refuelling.
    pub refuel_duration_minutes: i64,

    // --- Sub-configs ---
    pub solver: SolverConfig,
    pub evaluator: EvaluatorConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            grid: GridConfig::default(),
            step_minutes: 5,
            replan_interval_minutes: 15,
            ticks_per_replan: 12,
            default_speed_ms: 1_000,
            min_speed_ms: 50,
            max_speed_ms: 10_000,
            serve_duration_minutes: 15,
            reload_duration_minutes: 15,
            refuel_duration_minutes: 1,
            solver: SolverConfig::default(),
            evaluator: EvaluatorConfig::default(),
        }
    }
}

// --- Default roster -------------------------------------------------------

/// Id of the main plant depot.
pub const MAIN_PLANT_ID: &str = "MAIN_PLANT";
/// Grid position of the main plant.
pub const MAIN_PLANT_POSITION: Position = Position::new(12, 8);
/// Default capacity of an auxiliary depot in m³.
pub const AUX_DEPOT_CAPACITY_M3: f64 = 160.0;

/// The three depots of the reference city.
pub fn default_depots() -> Vec<Depot> {
    vec![
        Depot::main(MAIN_PLANT_ID, MAIN_PLANT_POSITION),
        Depot::auxiliary("NORTH_DEPOT", Position::new(42, 42), AUX_DEPOT_CAPACITY_M3),
        Depot::auxiliary("EAST_DEPOT", Position::new(63, 3), AUX_DEPOT_CAPACITY_M3),
    ]
}

/// The reference fleet: 2×TA, 4×TB, 4×TC, 10×TD, parked at the main plant
/// with full fuel and a full GLP load.
pub fn default_fleet() -> Vec<Vehicle> {
    let roster = [
        (VehicleType::TA, 2),
        (VehicleType::TB, 4),
        (VehicleType::TC, 4),
        (VehicleType::TD, 10),
    ];

    let mut fleet = Vec::new();
    for (vehicle_type, count) in roster {
        for n in 1..=count {
            let id = format!("{}{:02}", vehicle_type, n);
            let mut vehicle = Vehicle::new(id, vehicle_type, MAIN_PLANT_POSITION);
            vehicle.glp_m3 = vehicle_type.capacity_m3();
            fleet.push(vehicle);
        }
    }
    fleet
}
