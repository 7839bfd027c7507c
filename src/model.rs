use std::fmt;

use serde::{Deserialize, Serialize};

/// Unix milliseconds.
pub type Ms = i64;

pub type ZoneId = u32;
pub type AreaId = u32;
pub type SlotId = u32;

/// Ledger key. Assigned from 1 upwards and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Full address of a slot. Slot ids are only unique within their area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotRef {
    pub zone: ZoneId,
    pub area: AreaId,
    pub slot: SlotId,
}

impl SlotRef {
    pub fn new(zone: ZoneId, area: AreaId, slot: SlotId) -> Self {
        Self { zone, area, slot }
    }
}

impl fmt::Display for SlotRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.zone, self.area, self.slot)
    }
}

/// Request lifecycle.
///
/// `Pending` only exists between creation and binding inside one engine call;
/// the ledger never stores it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestState {
    Pending,
    Allocated,
    Cancelled,
    Released,
}

impl RequestState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestState::Pending => "PENDING",
            RequestState::Allocated => "ALLOCATED",
            RequestState::Cancelled => "CANCELLED",
            RequestState::Released => "RELEASED",
        }
    }

    /// Forward transitions only. Rollback bypasses this table.
    pub fn can_transition_to(self, next: RequestState) -> bool {
        matches!(
            (self, next),
            (RequestState::Pending, RequestState::Allocated)
                | (RequestState::Allocated, RequestState::Cancelled)
                | (RequestState::Allocated, RequestState::Released)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RequestState::Cancelled | RequestState::Released)
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A vehicle's claim on a slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub id: RequestId,
    pub vehicle_id: String,
    /// Zone the vehicle asked for. The bound slot may sit in a neighbour
    /// when `cross_zone` is set.
    pub zone_id: ZoneId,
    pub state: RequestState,
    pub created_at: Ms,
    pub slot: Option<SlotRef>,
    pub released_at: Option<Ms>,
    /// Whole seconds from allocation to release. Set iff `Released`.
    pub duration_secs: Option<u64>,
    pub cross_zone: bool,
}

impl Request {
    pub fn pending(id: RequestId, vehicle_id: String, zone_id: ZoneId, created_at: Ms) -> Self {
        Self {
            id,
            vehicle_id,
            zone_id,
            state: RequestState::Pending,
            created_at,
            slot: None,
            released_at: None,
            duration_secs: None,
            cross_zone: false,
        }
    }

    /// Move to `next` if the lifecycle allows it; on refusal returns the current state.
    pub fn transition(&mut self, next: RequestState) -> Result<(), RequestState> {
        if self.state.can_transition_to(next) {
            self.state = next;
            Ok(())
        } else {
            Err(self.state)
        }
    }
}

/// One undoable mutation. This is the operation log record format: it holds
/// exactly what is needed to invert the call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE", rename_all_fields = "camelCase")]
pub enum Operation {
    Allocate {
        request_id: RequestId,
        slot: SlotRef,
    },
    Cancel {
        request_id: RequestId,
        slot: SlotRef,
    },
    Release {
        request_id: RequestId,
        slot: SlotRef,
        released_at: Ms,
        duration_secs: u64,
    },
}

impl Operation {
    pub fn request_id(&self) -> RequestId {
        match self {
            Operation::Allocate { request_id, .. }
            | Operation::Cancel { request_id, .. }
            | Operation::Release { request_id, .. } => *request_id,
        }
    }

    pub fn slot(&self) -> SlotRef {
        match self {
            Operation::Allocate { slot, .. }
            | Operation::Cancel { slot, .. }
            | Operation::Release { slot, .. } => *slot,
        }
    }

    /// Short label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Operation::Allocate { .. } => "allocate",
            Operation::Cancel { .. } => "cancel",
            Operation::Release { .. } => "release",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalEntry {
    pub seq: u64,
    pub at: Ms,
    pub op: Operation,
}

// ── Query result types ───────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotInfo {
    pub id: SlotId,
    pub occupied: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AreaInfo {
    pub id: AreaId,
    pub slots: Vec<SlotInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ZoneInfo {
    pub id: ZoneId,
    pub areas: Vec<AreaInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestInfo {
    pub id: RequestId,
    pub vehicle_id: String,
    pub zone_id: ZoneId,
    pub slot: Option<SlotRef>,
    pub state: RequestState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
    pub cross_zone: bool,
}

impl From<&Request> for RequestInfo {
    fn from(r: &Request) -> Self {
        Self {
            id: r.id,
            vehicle_id: r.vehicle_id.clone(),
            zone_id: r.zone_id,
            slot: r.slot,
            state: r.state,
            duration: match r.state {
                RequestState::Released => r.duration_secs,
                _ => None,
            },
            cross_zone: r.cross_zone,
        }
    }
}

/// Consistent read of topology + ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub zones: Vec<ZoneInfo>,
    pub requests: Vec<RequestInfo>,
}

/// Result of a successful `allocate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Allocation {
    pub request_id: RequestId,
    pub slot: SlotRef,
    pub cross_zone: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneUtilization {
    pub id: ZoneId,
    pub occupied: usize,
    pub capacity: usize,
    pub utilization_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Analytics {
    pub zones: Vec<ZoneUtilization>,
    pub total_requests: usize,
    pub allocated: usize,
    pub cancelled: usize,
    pub released: usize,
    pub average_duration_secs: f64,
    /// Zone with the most occupied slots; lowest id wins ties.
    pub peak_zone: Option<ZoneId>,
    pub undo_depth: usize,
}
