mod clock;
mod error;
mod journal;
mod mutations;
mod queries;
mod store;

pub use error::EngineError;
pub use journal::Journal;
pub use mutations::normalize_vehicle_id;
pub use store::{Ledger, ParkingState, SlotCell, Topology};

use tokio::sync::RwLock;

use crate::model::ZoneId;
use crate::topology::{TopologyError, TopologySpec};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineOptions {
    /// Fall back to adjacent zones when the requested zone is full.
    pub cross_zone: bool,
}

/// Allocation engine. One lock guards topology, ledger and undo log together:
/// every mutation holds the write side for its whole duration, reads copy out
/// under the read side.
pub struct Engine {
    state: RwLock<ParkingState>,
    options: EngineOptions,
}

impl Engine {
    pub fn new(topology: Topology, options: EngineOptions) -> Self {
        let engine = Self {
            state: RwLock::new(ParkingState::new(topology)),
            options,
        };
        // Fresh process: publish zeroed gauges so dashboards see every zone.
        if let Ok(state) = engine.state.try_read() {
            for zone in state.topology.zones() {
                publish_zone_gauge(&state, zone.id);
            }
            publish_journal_gauge(&state);
        }
        engine
    }

    pub fn from_spec(spec: &TopologySpec, options: EngineOptions) -> Result<Self, TopologyError> {
        Ok(Self::new(Topology::from_spec(spec)?, options))
    }

    pub fn options(&self) -> EngineOptions {
        self.options
    }
}

/// Post-mutation bookkeeping, run while the write guard is still held.
fn after_mutation(state: &ParkingState, zones: &[ZoneId]) {
    debug_assert!(
        state.check_invariants().is_ok(),
        "invariant violated: {:?}",
        state.check_invariants()
    );
    for &zone in zones {
        publish_zone_gauge(state, zone);
    }
    publish_journal_gauge(state);
}

fn publish_zone_gauge(state: &ParkingState, zone: ZoneId) {
    metrics::gauge!(crate::observability::SLOTS_OCCUPIED, "zone" => zone.to_string())
        .set(state.topology.occupied(zone) as f64);
}

fn publish_journal_gauge(state: &ParkingState) {
    metrics::gauge!(crate::observability::UNDO_LOG_DEPTH).set(state.journal.len() as f64);
}
