//! Domain entities: immutable identity plus mutable operational state.
//!
//! The environment owns the live instances; plans and events refer to them
//! by id only.

pub mod blockage;
pub mod depot;
pub mod incident;
pub mod maintenance;
pub mod order;
pub mod vehicle;

pub use blockage::{Blockage, BlockageError};
pub use depot::Depot;
pub use incident::{Incident, IncidentType, Shift};
pub use maintenance::Maintenance;
pub use order::{DeliveryRecord, Order};
pub use vehicle::{Vehicle, VehicleStatus, VehicleType};

/// Tolerance for fuel/volume comparisons. A drive that lands exactly on zero
/// fuel is accepted; strictly negative is not.
pub const EPSILON: f64 = 1e-9;
