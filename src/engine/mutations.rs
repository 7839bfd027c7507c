use tracing::{debug, info};

use crate::limits::*;
use crate::model::*;

use super::clock::{elapsed_secs, now_ms};
use super::store::ParkingState;
use super::{after_mutation, Engine, EngineError};

/// Trim and uppercase a raw vehicle id, rejecting empty, oversized or
/// whitespace-bearing tokens.
pub fn normalize_vehicle_id(raw: &str) -> Result<String, EngineError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(EngineError::InvalidVehicleId("empty"));
    }
    if trimmed.chars().count() > MAX_VEHICLE_ID_LEN {
        return Err(EngineError::InvalidVehicleId("too long"));
    }
    if trimmed.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(EngineError::InvalidVehicleId("contains whitespace or control characters"));
    }
    Ok(trimmed.to_uppercase())
}

// ── State transitions (caller holds the write guard) ─────────────

impl ParkingState {
    /// First-fit allocation. With `cross_zone`, a full zone falls back to its
    /// adjacent zones in declared order.
    pub fn allocate(
        &mut self,
        vehicle_id: String,
        zone_id: ZoneId,
        now: Ms,
        cross_zone: bool,
    ) -> Result<Allocation, EngineError> {
        let zone = self
            .topology
            .zone(zone_id)
            .ok_or(EngineError::UnknownZone(zone_id))?;

        let (slot, overflowed) = match self.topology.first_free(zone_id) {
            Some(slot) => (slot, false),
            None if cross_zone => zone
                .adjacent
                .iter()
                .find_map(|&n| self.topology.first_free(n))
                .map(|slot| (slot, true))
                .ok_or(EngineError::AllocationFailed(zone_id))?,
            None => return Err(EngineError::AllocationFailed(zone_id)),
        };

        let id = self.ledger.next_id();
        let mut request = Request::pending(id, vehicle_id, zone_id, now);
        request
            .transition(RequestState::Allocated)
            .map_err(|state| EngineError::InvalidTransition {
                request_id: id,
                state: Some(state),
            })?;
        request.slot = Some(slot);
        request.cross_zone = overflowed;

        self.topology.bind(slot, id);
        self.ledger.insert(request);
        self.journal.push(Operation::Allocate { request_id: id, slot }, now);

        Ok(Allocation {
            request_id: id,
            slot,
            cross_zone: overflowed,
        })
    }

    pub fn cancel(&mut self, request_id: RequestId, now: Ms) -> Result<Operation, EngineError> {
        self.settle(request_id, RequestState::Cancelled, now)
    }

    /// The vehicle leaves: records whole seconds since allocation.
    pub fn release(&mut self, request_id: RequestId, now: Ms) -> Result<Operation, EngineError> {
        self.settle(request_id, RequestState::Released, now)
    }

    /// Move an ALLOCATED request to a terminal state and free its slot.
    fn settle(
        &mut self,
        request_id: RequestId,
        next: RequestState,
        now: Ms,
    ) -> Result<Operation, EngineError> {
        let req = self
            .ledger
            .get_mut(request_id)
            .ok_or(EngineError::InvalidTransition {
                request_id,
                state: None,
            })?;
        req.transition(next)
            .map_err(|state| EngineError::InvalidTransition {
                request_id,
                state: Some(state),
            })?;
        let Some(slot) = req.slot.take() else {
            panic!("allocated request {request_id} has no slot");
        };

        let op = if next == RequestState::Released {
            let duration_secs = elapsed_secs(req.created_at, now);
            req.released_at = Some(now);
            req.duration_secs = Some(duration_secs);
            Operation::Release {
                request_id,
                slot,
                released_at: now,
                duration_secs,
            }
        } else {
            Operation::Cancel { request_id, slot }
        };

        self.topology.unbind(slot, request_id);
        self.journal.push(op.clone(), now);
        Ok(op)
    }

    /// Pop the newest log entry and invert it.
    ///
    /// Stack order guarantees the state still matches what the entry left
    /// behind; anything else is a bug and panics before touching state.
    pub fn rollback(&mut self) -> Result<Operation, EngineError> {
        let entry = self.journal.pop().ok_or(EngineError::NothingToRollback)?;
        let request_id = entry.op.request_id();
        let slot = entry.op.slot();
        let occupant = self.topology.slot(&slot).and_then(|c| c.occupant);

        match &entry.op {
            Operation::Allocate { .. } => {
                let req = self.ledger.get(request_id);
                assert!(
                    req.is_some_and(|r| r.state == RequestState::Allocated && r.slot == Some(slot)),
                    "undo allocate: request {request_id} is not allocated to {slot}"
                );
                assert_eq!(occupant, Some(request_id), "undo allocate: slot {slot} occupant mismatch");

                self.topology.unbind(slot, request_id);
                self.ledger.remove(request_id);
            }
            Operation::Cancel { .. } | Operation::Release { .. } => {
                let expected = match entry.op {
                    Operation::Cancel { .. } => RequestState::Cancelled,
                    _ => RequestState::Released,
                };
                assert_eq!(occupant, None, "undo {}: slot {slot} was re-taken", entry.op.label());
                let Some(req) = self.ledger.get_mut(request_id) else {
                    panic!("undo {}: request {request_id} missing", entry.op.label());
                };
                assert_eq!(req.state, expected, "undo {}: request {request_id} state", entry.op.label());

                req.state = RequestState::Allocated;
                req.slot = Some(slot);
                req.released_at = None;
                req.duration_secs = None;
                self.topology.bind(slot, request_id);
            }
        }
        Ok(entry.op)
    }

    /// Undo up to `k` entries (clamped to `1..=MAX_ROLLBACK_STEPS`), newest
    /// first. Fails only when there is nothing to undo at all.
    pub fn rollback_many(&mut self, k: usize) -> Result<Vec<Operation>, EngineError> {
        if self.journal.is_empty() {
            return Err(EngineError::NothingToRollback);
        }
        let k = k.clamp(1, MAX_ROLLBACK_STEPS);
        let mut undone = Vec::with_capacity(k.min(self.journal.len()));
        while undone.len() < k {
            match self.rollback() {
                Ok(op) => undone.push(op),
                Err(_) => break,
            }
        }
        Ok(undone)
    }
}

// ── Engine entry points ──────────────────────────────────────────

impl Engine {
    pub async fn allocate(&self, vehicle_id: &str, zone_id: ZoneId) -> Result<Allocation, EngineError> {
        let vehicle_id = normalize_vehicle_id(vehicle_id)?;
        let mut state = self.state.write().await;
        let result = state.allocate(vehicle_id.clone(), zone_id, now_ms(), self.options.cross_zone);

        let outcome = match &result {
            Ok(a) => {
                after_mutation(&state, &[a.slot.zone]);
                info!(
                    "vehicle {vehicle_id} allocated slot {} (request {}{})",
                    a.slot,
                    a.request_id,
                    if a.cross_zone { ", cross-zone" } else { "" }
                );
                if a.cross_zone { "cross_zone" } else { "allocated" }
            }
            Err(e) => {
                debug!("allocation for {vehicle_id} in zone {zone_id} rejected: {e}");
                e.kind()
            }
        };
        metrics::counter!(
            crate::observability::ALLOCATIONS_TOTAL,
            "zone" => zone_id.to_string(),
            "outcome" => outcome
        )
        .increment(1);
        result
    }

    pub async fn cancel(&self, request_id: RequestId) -> Result<Operation, EngineError> {
        let mut state = self.state.write().await;
        let op = state.cancel(request_id, now_ms()).inspect_err(|e| {
            debug!("cancel {request_id} rejected: {e}");
        })?;
        after_mutation(&state, &[op.slot().zone]);
        info!("request {request_id} cancelled, slot {} freed", op.slot());
        Ok(op)
    }

    pub async fn release(&self, request_id: RequestId) -> Result<Operation, EngineError> {
        let mut state = self.state.write().await;
        let op = state.release(request_id, now_ms()).inspect_err(|e| {
            debug!("release {request_id} rejected: {e}");
        })?;
        after_mutation(&state, &[op.slot().zone]);
        if let Operation::Release { duration_secs, .. } = &op {
            info!("request {request_id} released slot {} after {duration_secs}s", op.slot());
        }
        Ok(op)
    }

    /// Single-step undo of the most recent mutation, whoever made it.
    pub async fn rollback(&self) -> Result<Operation, EngineError> {
        let mut undone = self.rollback_many(1).await?;
        // rollback_many(1) returns exactly one op when it succeeds.
        undone.pop().ok_or(EngineError::NothingToRollback)
    }

    pub async fn rollback_many(&self, k: usize) -> Result<Vec<Operation>, EngineError> {
        let mut state = self.state.write().await;
        let undone = state.rollback_many(k).inspect_err(|e| {
            debug!("rollback rejected: {e}");
        })?;

        let zones: Vec<ZoneId> = undone.iter().map(|op| op.slot().zone).collect();
        after_mutation(&state, &zones);
        for op in &undone {
            info!("rolled back {} of request {} on slot {}", op.label(), op.request_id(), op.slot());
            metrics::counter!(crate::observability::ROLLBACKS_TOTAL, "kind" => op.label()).increment(1);
        }
        Ok(undone)
    }
}
