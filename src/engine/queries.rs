use crate::model::*;

use super::store::ParkingState;
use super::Engine;

impl ParkingState {
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            zones: self.topology.zone_infos(),
            requests: self.ledger.iter().map(RequestInfo::from).collect(),
        }
    }

    pub fn analytics(&self) -> Analytics {
        let zones: Vec<ZoneUtilization> = self
            .topology
            .zones()
            .iter()
            .map(|z| {
                let capacity = self.topology.capacity(z.id);
                let occupied = self.topology.occupied(z.id);
                let utilization_pct = if capacity > 0 {
                    occupied as f64 / capacity as f64 * 100.0
                } else {
                    0.0
                };
                ZoneUtilization {
                    id: z.id,
                    occupied,
                    capacity,
                    utilization_pct,
                }
            })
            .collect();

        // Zones are ascending, so strict `>` keeps the lowest id on ties.
        let mut peak: Option<(ZoneId, usize)> = None;
        for z in &zones {
            if peak.is_none_or(|(_, best)| z.occupied > best) {
                peak = Some((z.id, z.occupied));
            }
        }

        let mut allocated = 0;
        let mut cancelled = 0;
        let mut released = 0;
        let mut total_duration = 0u64;
        for r in self.ledger.iter() {
            match r.state {
                RequestState::Allocated => allocated += 1,
                RequestState::Cancelled => cancelled += 1,
                RequestState::Released => {
                    released += 1;
                    total_duration += r.duration_secs.unwrap_or(0);
                }
                RequestState::Pending => {}
            }
        }
        let average_duration_secs = if released > 0 {
            total_duration as f64 / released as f64
        } else {
            0.0
        };

        Analytics {
            zones,
            total_requests: self.ledger.len(),
            allocated,
            cancelled,
            released,
            average_duration_secs,
            peak_zone: peak.map(|(id, _)| id),
            undo_depth: self.journal.len(),
        }
    }
}

impl Engine {
    /// Consistent copy of topology + ledger.
    pub async fn snapshot(&self) -> Snapshot {
        self.state.read().await.snapshot()
    }

    pub async fn analytics(&self) -> Analytics {
        self.state.read().await.analytics()
    }

    pub async fn request(&self, id: RequestId) -> Option<RequestInfo> {
        self.state.read().await.ledger.get(id).map(RequestInfo::from)
    }

    pub async fn undo_depth(&self) -> usize {
        self.state.read().await.journal.len()
    }

    pub async fn check_invariants(&self) -> Result<(), String> {
        self.state.read().await.check_invariants()
    }
}
