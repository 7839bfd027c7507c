use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::limits::*;
use crate::model::{AreaId, SlotId, ZoneId};

/// On-disk topology description (`PARKD_TOPOLOGY`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologySpec {
    pub zones: Vec<ZoneSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneSpec {
    pub id: ZoneId,
    /// Overflow targets, tried in this order.
    #[serde(default)]
    pub adjacent: Vec<ZoneId>,
    #[serde(default)]
    pub areas: Vec<AreaSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AreaSpec {
    pub id: AreaId,
    pub slots: Vec<SlotId>,
}

#[derive(Debug)]
pub enum TopologyError {
    Io(std::io::Error),
    Parse(serde_json::Error),
    NoZones,
    ZeroZoneId,
    DuplicateZone(ZoneId),
    DuplicateArea { zone: ZoneId, area: AreaId },
    DuplicateSlot { zone: ZoneId, area: AreaId, slot: SlotId },
    EmptyArea { zone: ZoneId, area: AreaId },
    UnknownNeighbour { zone: ZoneId, neighbour: ZoneId },
    SelfAdjacent(ZoneId),
    LimitExceeded(&'static str),
}

impl std::fmt::Display for TopologyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TopologyError::Io(e) => write!(f, "cannot read topology: {e}"),
            TopologyError::Parse(e) => write!(f, "malformed topology: {e}"),
            TopologyError::NoZones => write!(f, "topology has no zones"),
            TopologyError::ZeroZoneId => write!(f, "zone ids must be positive"),
            TopologyError::DuplicateZone(id) => write!(f, "duplicate zone {id}"),
            TopologyError::DuplicateArea { zone, area } => {
                write!(f, "duplicate area {area} in zone {zone}")
            }
            TopologyError::DuplicateSlot { zone, area, slot } => {
                write!(f, "duplicate slot {slot} in zone {zone} area {area}")
            }
            TopologyError::EmptyArea { zone, area } => {
                write!(f, "area {area} in zone {zone} has no slots")
            }
            TopologyError::UnknownNeighbour { zone, neighbour } => {
                write!(f, "zone {zone} is adjacent to unknown zone {neighbour}")
            }
            TopologyError::SelfAdjacent(id) => write!(f, "zone {id} lists itself as adjacent"),
            TopologyError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
        }
    }
}

impl std::error::Error for TopologyError {}

impl From<std::io::Error> for TopologyError {
    fn from(e: std::io::Error) -> Self {
        TopologyError::Io(e)
    }
}

impl From<serde_json::Error> for TopologyError {
    fn from(e: serde_json::Error) -> Self {
        TopologyError::Parse(e)
    }
}

impl TopologySpec {
    /// Read and validate a JSON topology file.
    pub fn load(path: &Path) -> Result<Self, TopologyError> {
        let raw = std::fs::read_to_string(path)?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<Self, TopologyError> {
        let spec: TopologySpec = serde_json::from_str(raw)?;
        spec.validate()?;
        Ok(spec)
    }

    /// Three zones: 1 and 2 adjacent to each other, 3 isolated.
    pub fn demo_city() -> Self {
        Self {
            zones: vec![
                ZoneSpec {
                    id: 1,
                    adjacent: vec![2],
                    areas: vec![AreaSpec { id: 101, slots: vec![1, 2] }],
                },
                ZoneSpec {
                    id: 2,
                    adjacent: vec![1],
                    areas: vec![AreaSpec { id: 201, slots: vec![3] }],
                },
                ZoneSpec {
                    id: 3,
                    adjacent: vec![],
                    areas: vec![AreaSpec { id: 301, slots: vec![4] }],
                },
            ],
        }
    }

    pub fn validate(&self) -> Result<(), TopologyError> {
        if self.zones.is_empty() {
            return Err(TopologyError::NoZones);
        }
        if self.zones.len() > MAX_ZONES {
            return Err(TopologyError::LimitExceeded("too many zones"));
        }

        let mut zone_ids = HashSet::new();
        let mut total_slots = 0usize;
        for zone in &self.zones {
            if zone.id == 0 {
                return Err(TopologyError::ZeroZoneId);
            }
            if !zone_ids.insert(zone.id) {
                return Err(TopologyError::DuplicateZone(zone.id));
            }
            let mut area_ids = HashSet::new();
            for area in &zone.areas {
                if !area_ids.insert(area.id) {
                    return Err(TopologyError::DuplicateArea { zone: zone.id, area: area.id });
                }
                if area.slots.is_empty() {
                    return Err(TopologyError::EmptyArea { zone: zone.id, area: area.id });
                }
                let mut slot_ids = HashSet::new();
                for &slot in &area.slots {
                    if !slot_ids.insert(slot) {
                        return Err(TopologyError::DuplicateSlot {
                            zone: zone.id,
                            area: area.id,
                            slot,
                        });
                    }
                }
                total_slots += area.slots.len();
            }
        }
        if total_slots > MAX_SLOTS_TOTAL {
            return Err(TopologyError::LimitExceeded("too many slots"));
        }

        for zone in &self.zones {
            for &neighbour in &zone.adjacent {
                if neighbour == zone.id {
                    return Err(TopologyError::SelfAdjacent(zone.id));
                }
                if !zone_ids.contains(&neighbour) {
                    return Err(TopologyError::UnknownNeighbour { zone: zone.id, neighbour });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_city_is_valid() {
        let city = TopologySpec::demo_city();
        city.validate().unwrap();
        let slots: usize = city
            .zones
            .iter()
            .flat_map(|z| z.areas.iter())
            .map(|a| a.slots.len())
            .sum();
        assert_eq!(slots, 4);
    }

    #[test]
    fn parse_minimal_file() {
        let spec = TopologySpec::parse(r#"{"zones":[{"id":1,"areas":[{"id":10,"slots":[1]}]}]}"#)
            .unwrap();
        assert_eq!(spec.zones[0].adjacent, Vec::<ZoneId>::new());
        assert_eq!(spec.zones[0].areas[0].slots, vec![1]);
    }

    #[test]
    fn parse_rejects_garbage() {
        let err = TopologySpec::parse("{not json").unwrap_err();
        assert!(matches!(err, TopologyError::Parse(_)));
    }

    #[test]
    fn rejects_empty_topology() {
        let err = TopologySpec::parse(r#"{"zones":[]}"#).unwrap_err();
        assert!(matches!(err, TopologyError::NoZones));
    }

    #[test]
    fn rejects_duplicates() {
        let dup_zone = r#"{"zones":[{"id":1,"areas":[]},{"id":1,"areas":[]}]}"#;
        assert!(matches!(
            TopologySpec::parse(dup_zone).unwrap_err(),
            TopologyError::DuplicateZone(1)
        ));

        let dup_area = r#"{"zones":[{"id":1,"areas":[{"id":5,"slots":[1]},{"id":5,"slots":[2]}]}]}"#;
        assert!(matches!(
            TopologySpec::parse(dup_area).unwrap_err(),
            TopologyError::DuplicateArea { zone: 1, area: 5 }
        ));

        let dup_slot = r#"{"zones":[{"id":1,"areas":[{"id":5,"slots":[1,1]}]}]}"#;
        assert!(matches!(
            TopologySpec::parse(dup_slot).unwrap_err(),
            TopologyError::DuplicateSlot { slot: 1, .. }
        ));
    }

    #[test]
    fn same_slot_id_in_different_areas_is_fine() {
        let raw = r#"{"zones":[{"id":1,"areas":[{"id":5,"slots":[1]},{"id":6,"slots":[1]}]}]}"#;
        TopologySpec::parse(raw).unwrap();
    }

    #[test]
    fn rejects_bad_adjacency() {
        let unknown = r#"{"zones":[{"id":1,"adjacent":[9],"areas":[]}]}"#;
        assert!(matches!(
            TopologySpec::parse(unknown).unwrap_err(),
            TopologyError::UnknownNeighbour { zone: 1, neighbour: 9 }
        ));
        let selfish = r#"{"zones":[{"id":1,"adjacent":[1],"areas":[]}]}"#;
        assert!(matches!(
            TopologySpec::parse(selfish).unwrap_err(),
            TopologyError::SelfAdjacent(1)
        ));
    }

    #[test]
    fn rejects_zero_zone_and_empty_area() {
        assert!(matches!(
            TopologySpec::parse(r#"{"zones":[{"id":0}]}"#).unwrap_err(),
            TopologyError::ZeroZoneId
        ));
        assert!(matches!(
            TopologySpec::parse(r#"{"zones":[{"id":2,"areas":[{"id":1,"slots":[]}]}]}"#).unwrap_err(),
            TopologyError::EmptyArea { zone: 2, area: 1 }
        ));
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let path = std::env::temp_dir().join("parkd_test_topology_missing.json");
        let _ = std::fs::remove_file(&path);
        assert!(matches!(TopologySpec::load(&path).unwrap_err(), TopologyError::Io(_)));
    }

    #[test]
    fn load_from_file() {
        let dir = std::env::temp_dir().join("parkd_test_topology");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("city.json");
        std::fs::write(&path, serde_json::to_string(&TopologySpec::demo_city()).unwrap()).unwrap();
        assert_eq!(TopologySpec::load(&path).unwrap(), TopologySpec::demo_city());
    }
}
