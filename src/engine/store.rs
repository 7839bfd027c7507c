use std::collections::{BTreeMap, HashMap};
use std::ops::Range;

use crate::model::*;
use crate::topology::{TopologySpec, TopologyError};

use super::journal::Journal;

/// A slot and the request currently bound to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotCell {
    pub addr: SlotRef,
    pub occupant: Option<RequestId>,
}

impl SlotCell {
    pub fn is_free(&self) -> bool {
        self.occupant.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AreaNode {
    pub id: AreaId,
    slots: Range<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneNode {
    pub id: ZoneId,
    pub adjacent: Vec<ZoneId>,
    pub areas: Vec<AreaNode>,
    /// All slots of all areas, contiguous in the arena.
    slots: Range<usize>,
}

/// Zone → area → slot hierarchy over one flat slot arena.
///
/// Zones, areas and slots are sorted by id at build time, so arena order
/// is the first-fit scan order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    zones: Vec<ZoneNode>,
    slots: Vec<SlotCell>,
    zone_index: HashMap<ZoneId, usize>,
    slot_index: HashMap<SlotRef, usize>,
}

impl Topology {
    pub fn from_spec(spec: &TopologySpec) -> Result<Self, TopologyError> {
        spec.validate()?;

        let mut zone_specs: Vec<_> = spec.zones.iter().collect();
        zone_specs.sort_by_key(|z| z.id);

        let mut zones = Vec::with_capacity(zone_specs.len());
        let mut slots = Vec::new();
        let mut zone_index = HashMap::new();
        let mut slot_index = HashMap::new();

        for zs in zone_specs {
            let zone_start = slots.len();
            let mut area_specs: Vec<_> = zs.areas.iter().collect();
            area_specs.sort_by_key(|a| a.id);

            let mut areas = Vec::with_capacity(area_specs.len());
            for asp in area_specs {
                let area_start = slots.len();
                let mut ids = asp.slots.clone();
                ids.sort_unstable();
                for slot in ids {
                    let addr = SlotRef::new(zs.id, asp.id, slot);
                    slot_index.insert(addr, slots.len());
                    slots.push(SlotCell { addr, occupant: None });
                }
                areas.push(AreaNode {
                    id: asp.id,
                    slots: area_start..slots.len(),
                });
            }

            let mut adjacent = Vec::with_capacity(zs.adjacent.len());
            for &n in &zs.adjacent {
                if !adjacent.contains(&n) {
                    adjacent.push(n);
                }
            }

            zone_index.insert(zs.id, zones.len());
            zones.push(ZoneNode {
                id: zs.id,
                adjacent,
                areas,
                slots: zone_start..slots.len(),
            });
        }

        Ok(Self {
            zones,
            slots,
            zone_index,
            slot_index,
        })
    }

    pub fn zones(&self) -> &[ZoneNode] {
        &self.zones
    }

    pub fn zone(&self, id: ZoneId) -> Option<&ZoneNode> {
        self.zone_index.get(&id).map(|&i| &self.zones[i])
    }

    pub fn slots(&self) -> &[SlotCell] {
        &self.slots
    }

    pub fn slot(&self, addr: &SlotRef) -> Option<&SlotCell> {
        self.slot_index.get(addr).map(|&i| &self.slots[i])
    }

    pub fn zone_slots(&self, zone: &ZoneNode) -> &[SlotCell] {
        &self.slots[zone.slots.clone()]
    }

    pub fn area_slots(&self, area: &AreaNode) -> &[SlotCell] {
        &self.slots[area.slots.clone()]
    }

    /// First free slot of `zone_id` in scan order.
    pub fn first_free(&self, zone_id: ZoneId) -> Option<SlotRef> {
        let zone = self.zone(zone_id)?;
        self.zone_slots(zone)
            .iter()
            .find(|s| s.is_free())
            .map(|s| s.addr)
    }

    pub fn capacity(&self, zone_id: ZoneId) -> usize {
        self.zone(zone_id).map_or(0, |z| z.slots.len())
    }

    pub fn occupied(&self, zone_id: ZoneId) -> usize {
        self.zone(zone_id).map_or(0, |z| {
            self.zone_slots(z).iter().filter(|s| !s.is_free()).count()
        })
    }

    /// Bind `request` to a free slot. Panics if the slot is unknown or taken:
    /// callers only bind slots they have just checked.
    pub(super) fn bind(&mut self, addr: SlotRef, request: RequestId) {
        let idx = self.index_of(addr);
        let cell = &mut self.slots[idx];
        assert!(
            cell.occupant.is_none(),
            "slot {addr} already bound to request {:?}",
            cell.occupant
        );
        cell.occupant = Some(request);
    }

    /// Clear a slot bound to `request`. Panics if it is bound to anything else.
    pub(super) fn unbind(&mut self, addr: SlotRef, request: RequestId) {
        let idx = self.index_of(addr);
        let cell = &mut self.slots[idx];
        assert_eq!(
            cell.occupant,
            Some(request),
            "slot {addr} is not bound to request {request}"
        );
        cell.occupant = None;
    }

    fn index_of(&self, addr: SlotRef) -> usize {
        match self.slot_index.get(&addr) {
            Some(&idx) => idx,
            None => panic!("slot {addr} is not part of the topology"),
        }
    }

    pub fn zone_infos(&self) -> Vec<ZoneInfo> {
        self.zones
            .iter()
            .map(|z| ZoneInfo {
                id: z.id,
                areas: z
                    .areas
                    .iter()
                    .map(|a| AreaInfo {
                        id: a.id,
                        slots: self
                            .area_slots(a)
                            .iter()
                            .map(|s| SlotInfo {
                                id: s.addr.slot,
                                occupied: !s.is_free(),
                            })
                            .collect(),
                    })
                    .collect(),
            })
            .collect()
    }
}

/// Every request ever created, keyed (and therefore ordered) by id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ledger {
    requests: BTreeMap<RequestId, Request>,
    next_id: u64,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger {
    pub fn new() -> Self {
        Self {
            requests: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// Hand out the next id. Ids are consumed even if the request is later
    /// rolled back.
    pub(super) fn next_id(&mut self) -> RequestId {
        let id = RequestId(self.next_id);
        self.next_id += 1;
        id
    }

    pub fn get(&self, id: RequestId) -> Option<&Request> {
        self.requests.get(&id)
    }

    pub(super) fn get_mut(&mut self, id: RequestId) -> Option<&mut Request> {
        self.requests.get_mut(&id)
    }

    pub(super) fn insert(&mut self, request: Request) {
        self.requests.insert(request.id, request);
    }

    pub(super) fn remove(&mut self, id: RequestId) -> Option<Request> {
        self.requests.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Request> {
        self.requests.values()
    }
}

/// Everything guarded by the engine lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParkingState {
    pub topology: Topology,
    pub ledger: Ledger,
    pub journal: Journal,
}

impl ParkingState {
    pub fn new(topology: Topology) -> Self {
        Self {
            topology,
            ledger: Ledger::new(),
            journal: Journal::new(),
        }
    }

    /// Cross-check the slot ↔ request association and the duration rule.
    pub fn check_invariants(&self) -> Result<(), String> {
        for cell in self.topology.slots() {
            let Some(rid) = cell.occupant else { continue };
            let Some(req) = self.ledger.get(rid) else {
                return Err(format!("slot {} bound to missing request {rid}", cell.addr));
            };
            if req.state != RequestState::Allocated {
                return Err(format!("slot {} bound to request {rid} in state {}", cell.addr, req.state));
            }
            if req.slot != Some(cell.addr) {
                return Err(format!("slot {} bound to request {rid} which points at {:?}", cell.addr, req.slot));
            }
        }
        for req in self.ledger.iter() {
            match req.state {
                RequestState::Pending => {
                    return Err(format!("request {} stored while pending", req.id));
                }
                RequestState::Allocated => {
                    let Some(addr) = req.slot else {
                        return Err(format!("allocated request {} has no slot", req.id));
                    };
                    let occupant = self.topology.slot(&addr).and_then(|c| c.occupant);
                    if occupant != Some(req.id) {
                        return Err(format!("request {} points at slot {addr} held by {occupant:?}", req.id));
                    }
                }
                RequestState::Cancelled | RequestState::Released => {
                    if req.slot.is_some() {
                        return Err(format!("{} request {} still holds a slot", req.state, req.id));
                    }
                }
            }
            if req.duration_secs.is_some() != (req.state == RequestState::Released) {
                return Err(format!("request {} in state {} has duration {:?}", req.id, req.state, req.duration_secs));
            }
        }
        Ok(())
    }
}
