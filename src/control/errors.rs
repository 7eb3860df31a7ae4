use thiserror::Error;

use crate::Id;

/// Command-validation failures. These never mutate state; the caller gets a
/// structured reason to relay.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ControlError {
    #[error("vehicle {0} not found")]
    VehicleNotFound(Id),

    #[error("vehicle {0} is already out of service")]
    VehicleAlreadyUnavailable(Id),

    #[error("vehicle {0} is not out of service")]
    VehicleNotUnavailable(Id),

    #[error("speed {requested} ms is outside the accepted range [{min}, {max}] ms")]
    SpeedOutOfRange { requested: u64, min: u64, max: u64 },
}
