use crate::model::{RequestId, RequestState, ZoneId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    InvalidVehicleId(&'static str),
    UnknownZone(ZoneId),
    AllocationFailed(ZoneId),
    /// `state` is `None` when the request does not exist.
    InvalidTransition {
        request_id: RequestId,
        state: Option<RequestState>,
    },
    NothingToRollback,
}

impl EngineError {
    /// Stable label for response bodies and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::InvalidVehicleId(_) => "invalid_vehicle_id",
            EngineError::UnknownZone(_) => "unknown_zone",
            EngineError::AllocationFailed(_) => "allocation_failed",
            EngineError::InvalidTransition { .. } => "invalid_transition",
            EngineError::NothingToRollback => "nothing_to_rollback",
        }
    }

    /// Rejected before any state was consulted for capacity or lifecycle.
    pub fn is_validation(&self) -> bool {
        matches!(self, EngineError::InvalidVehicleId(_) | EngineError::UnknownZone(_))
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::InvalidVehicleId(why) => write!(f, "invalid vehicle id: {why}"),
            EngineError::UnknownZone(id) => write!(f, "unknown zone: {id}"),
            EngineError::AllocationFailed(id) => write!(f, "no free slot in zone {id}"),
            EngineError::InvalidTransition {
                request_id,
                state: Some(state),
            } => write!(f, "request {request_id} is {state}, expected ALLOCATED"),
            EngineError::InvalidTransition {
                request_id,
                state: None,
            } => write!(f, "request {request_id} not found"),
            EngineError::NothingToRollback => write!(f, "nothing to roll back"),
        }
    }
}

impl std::error::Error for EngineError {}
