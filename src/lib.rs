//! fleetgrid - Fleet orchestration and routing for GLP delivery on a city grid.
//!
//! A tick-driven simulation engine: orders with hard deadlines arrive
//! continuously, a heterogeneous tanker fleet picks up GLP at depots and
//! delivers it over a blockage-aware integer lattice, and a cost-based
//! insertion solver replans vehicle routes as the world changes.

pub mod config;
pub mod control;
pub mod domain;
pub mod environment;
pub mod evaluator;
pub mod events;
pub mod grid;
pub mod orchestrator;
pub mod plan;
pub mod solver;

/// Identifier type used for vehicles, orders, depots, and other entities.
pub type Id = String;

/// Wall-clock simulation timestamp (minute-level semantics, second arithmetic).
pub type Timestamp = chrono::NaiveDateTime;

/// Generates a new unique identifier (UUID v4).
pub fn generate_id() -> Id {
    uuid::Uuid::new_v4().to_string()
}
