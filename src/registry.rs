use std::collections::HashMap;
use std::io;
use std::path::Path;

use crate::limits::*;
use crate::model::{Resource, ResourceKind};

/// The fixed catalog of bookable resources. Seeded once at startup and
/// read-only afterwards; the engine consults it to validate resource ids
/// and kinds.
pub struct ResourceCatalog {
    entries: Vec<Resource>,
    by_id: HashMap<String, usize>,
}

impl ResourceCatalog {
    fn build(entries: Vec<Resource>) -> io::Result<Self> {
        if entries.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "resource catalog is empty",
            ));
        }
        if entries.len() > MAX_CATALOG_ENTRIES {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "resource catalog too large",
            ));
        }
        let mut by_id = HashMap::with_capacity(entries.len());
        for (idx, entry) in entries.iter().enumerate() {
            if entry.id.is_empty() || entry.id.len() > MAX_RESOURCE_ID_LEN {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("bad resource id {:?}", entry.id),
                ));
            }
            if by_id.insert(entry.id.clone(), idx).is_some() {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("duplicate resource id {:?}", entry.id),
                ));
            }
        }
        Ok(Self { entries, by_id })
    }

    /// The built-in fleet: 4 pool vehicles and 2 meeting rooms.
    pub fn default_fleet() -> Self {
        let entries = vec![
            vehicle("vehicle-1", "Hiace Van", "Van", "250-81-11"),
            vehicle("vehicle-2", "Corolla Fielder", "Fielder", "530-44-72"),
            vehicle("vehicle-3", "Note e-Power", "Note", "531-09-36"),
            vehicle("vehicle-4", "Carry Truck", "Truck", "480-77-58"),
            space("space-1", "Meeting Room A", "Room A", 10),
            space("space-2", "Meeting Room B", "Room B", 4),
        ];
        Self::build(entries).expect("built-in catalog is valid")
    }

    /// Load a catalog from a JSON file (an array of resources). Duplicate or
    /// empty ids are rejected.
    pub fn from_json_file(path: &Path) -> io::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let entries: Vec<Resource> = serde_json::from_str(&raw)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        Self::build(entries)
    }

    pub fn get(&self, id: &str) -> Option<&Resource> {
        self.by_id.get(id).map(|&idx| &self.entries[idx])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Resource> {
        self.entries.iter()
    }

    pub fn vehicles(&self) -> impl Iterator<Item = &Resource> {
        self.entries
            .iter()
            .filter(|r| r.kind == ResourceKind::Vehicle)
    }

    pub fn spaces(&self) -> impl Iterator<Item = &Resource> {
        self.entries
            .iter()
            .filter(|r| r.kind == ResourceKind::Space)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn vehicle(id: &str, name: &str, short: &str, plate: &str) -> Resource {
    Resource {
        id: id.into(),
        display_name: name.into(),
        short_name: Some(short.into()),
        kind: ResourceKind::Vehicle,
        capacity: None,
        plate: Some(plate.into()),
    }
}

fn space(id: &str, name: &str, short: &str, capacity: u32) -> Resource {
    Resource {
        id: id.into(),
        display_name: name.into(),
        short_name: Some(short.into()),
        kind: ResourceKind::Space,
        capacity: Some(capacity),
        plate: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_fleet_shape() {
        let catalog = ResourceCatalog::default_fleet();
        assert_eq!(catalog.len(), 6);
        assert_eq!(catalog.vehicles().count(), 4);
        assert_eq!(catalog.spaces().count(), 2);
    }

    #[test]
    fn lookup_by_id() {
        let catalog = ResourceCatalog::default_fleet();
        let van = catalog.get("vehicle-1").unwrap();
        assert_eq!(van.kind, ResourceKind::Vehicle);
        assert!(van.plate.is_some());

        let room = catalog.get("space-2").unwrap();
        assert_eq!(room.kind, ResourceKind::Space);
        assert_eq!(room.capacity, Some(4));

        assert!(catalog.get("vehicle-9").is_none());
    }

    #[test]
    fn json_file_round_trip() {
        let dir = std::env::temp_dir().join("fleetcal_test_registry");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("catalog.json");

        let json = serde_json::to_string(&[
            vehicle("kei-1", "Kei Van", "Kei", "480-10-20"),
            space("room-1", "Small Room", "Small", 2),
        ])
        .unwrap();
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(json.as_bytes()).unwrap();

        let catalog = ResourceCatalog::from_json_file(&path).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.get("kei-1").unwrap().display_name, "Kei Van");

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn duplicate_ids_rejected() {
        let entries = vec![
            vehicle("v", "A", "A", "1"),
            vehicle("v", "B", "B", "2"),
        ];
        assert!(ResourceCatalog::build(entries).is_err());
    }

    #[test]
    fn empty_catalog_rejected() {
        assert!(ResourceCatalog::build(Vec::new()).is_err());
    }
}
