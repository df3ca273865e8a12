//! Resource definitions: shapes, costs, interest and incompatibilities.
//!
//! A resource is a fixed arrangement of cells relative to an anchor point,
//! available in one or more orientations. The catalog is loaded once and is
//! read-only for the rest of the run.

use crate::constants::*;
use crate::error::PlanError;
use crate::location::Location;
use fnv::{FnvHashMap, FnvHashSet};
use itertools::Itertools;
use serde::Deserialize;
use std::path::Path;

/// One orientation of a resource: a set of `(row, col)` offsets from the anchor.
#[derive(Clone, Debug, PartialEq)]
pub struct Orientation {
    pub rotation_id: u32,
    cells: Vec<(i32, i32)>,
    /// Bounding box of the offsets: `(min_row, min_col, max_row, max_col)`.
    extent: (i32, i32, i32, i32),
}

impl Orientation {
    /// Build an orientation, rejecting empty or duplicated cell lists.
    pub fn new(rotation_id: u32, cells: Vec<(i32, i32)>) -> Result<Self, String> {
        if cells.is_empty() {
            return Err(format!("orientation {} has no cells", rotation_id));
        }
        if !cells.iter().all_unique() {
            return Err(format!("orientation {} repeats a cell", rotation_id));
        }

        let extent = cells.iter().fold(
            (i32::MAX, i32::MAX, i32::MIN, i32::MIN),
            |(r0, c0, r1, c1), &(r, c)| (r0.min(r), c0.min(c), r1.max(r), c1.max(c)),
        );

        Ok(Orientation {
            rotation_id,
            cells,
            extent,
        })
    }

    #[inline]
    pub fn cells(&self) -> &[(i32, i32)] {
        &self.cells
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Bounding box of the offsets as `(min_row, min_col, max_row, max_col)`.
    #[inline]
    pub fn extent(&self) -> (i32, i32, i32, i32) {
        self.extent
    }

    /// Absolute (signed) cells covered when anchored at `anchor`.
    /// Cells may fall outside the grid; bounds are the checker's concern.
    pub fn place_at(&self, anchor: Location) -> impl Iterator<Item = (i64, i64)> + '_ {
        self.cells.iter().map(move |&(dr, dc)| anchor.offset(dr, dc))
    }

    /// Footprint when anchored at `anchor`, or `None` if any cell falls
    /// outside a `rows x cols` grid.
    pub fn footprint(&self, anchor: Location, rows: usize, cols: usize) -> Option<Vec<Location>> {
        self.place_at(anchor)
            .map(|(r, c)| Location::checked(r, c, rows, cols))
            .collect()
    }
}

/// A resource definition.
#[derive(Clone, Debug)]
pub struct ResourceType {
    pub id: u32,
    pub name: String,
    pub category: String,
    pub bounding_box: u32,
    pub cost: u64,
    pub interest_factor: f64,
    pub incompatible_with: FnvHashSet<u32>,
    pub orientations: Vec<Orientation>,
}

impl ResourceType {
    /// True if `other` may not appear inside this resource's exclusion window.
    /// A resource always excludes its own id.
    #[inline]
    pub fn excludes(&self, other: u32) -> bool {
        other == self.id || self.incompatible_with.contains(&other)
    }

    /// Two-way compatibility: neither resource excludes the other.
    pub fn is_compatible_with(&self, other: &ResourceType) -> bool {
        !self.excludes(other.id) && !other.excludes(self.id)
    }

    pub fn orientation(&self, rotation_id: u32) -> Option<&Orientation> {
        self.orientations
            .iter()
            .find(|o| o.rotation_id == rotation_id)
    }
}

/// Raw catalog entry as it appears in the JSON file. Every field is optional
/// here so that missing fields are reported per entry instead of failing the
/// whole document.
#[derive(Deserialize)]
struct RawResource {
    resource_id: Option<u32>,
    name: Option<String>,
    #[serde(rename = "type")]
    category: Option<String>,
    bounding_box: Option<u32>,
    cost: Option<u64>,
    interest_factor: Option<f64>,
    #[serde(default)]
    incompatible_with: Vec<u32>,
    orientations: Option<Vec<RawOrientation>>,
}

#[derive(Deserialize)]
struct RawOrientation {
    rotation: Option<u32>,
    cells: Option<Vec<(i32, i32)>>,
}

#[derive(Deserialize)]
struct RawCatalog {
    resources: Vec<serde_json::Value>,
}

impl RawResource {
    fn into_resource(self, index: usize) -> Result<ResourceType, PlanError> {
        let id = self
            .resource_id
            .ok_or_else(|| PlanError::malformed(index, "missing resource_id"))?;
        if id == PATHWAY_ID || id == BLOCKED_ID {
            return Err(PlanError::malformed(
                index,
                format!("resource_id {} is reserved", id),
            ));
        }
        let name = self
            .name
            .ok_or_else(|| PlanError::malformed(index, "missing name"))?;
        let category = self
            .category
            .ok_or_else(|| PlanError::malformed(index, "missing type"))?;
        let cost = self
            .cost
            .ok_or_else(|| PlanError::malformed(index, "missing cost"))?;
        let interest_factor = self
            .interest_factor
            .ok_or_else(|| PlanError::malformed(index, "missing interest_factor"))?;
        if !interest_factor.is_finite() || interest_factor < 0.0 {
            return Err(PlanError::malformed(
                index,
                format!("interest_factor {} is not a non-negative number", interest_factor),
            ));
        }

        let raw_orientations = self
            .orientations
            .ok_or_else(|| PlanError::malformed(index, "missing orientations"))?;
        if raw_orientations.is_empty() {
            return Err(PlanError::malformed(index, "orientations list is empty"));
        }

        let mut orientations = Vec::with_capacity(raw_orientations.len());
        for (i, raw) in raw_orientations.into_iter().enumerate() {
            let rotation_id = raw.rotation.unwrap_or(i as u32);
            let cells = raw.cells.ok_or_else(|| {
                PlanError::malformed(index, format!("orientation {} is missing cells", i))
            })?;
            let orientation =
                Orientation::new(rotation_id, cells).map_err(|e| PlanError::malformed(index, e))?;
            orientations.push(orientation);
        }

        let bounding_box = self
            .bounding_box
            .unwrap_or_else(|| orientations.iter().map(|o| o.len() as u32).max().unwrap_or(0));

        Ok(ResourceType {
            id,
            name,
            category,
            bounding_box,
            cost,
            interest_factor,
            incompatible_with: self.incompatible_with.into_iter().collect(),
            orientations,
        })
    }
}

/// Read-only lookup of resource definitions by id.
#[derive(Clone, Debug, Default)]
pub struct ResourceCatalog {
    resources: FnvHashMap<u32, ResourceType>,
}

impl ResourceCatalog {
    /// Build a catalog from already-constructed resources. Duplicate ids are rejected.
    pub fn from_resources(
        resources: impl IntoIterator<Item = ResourceType>,
    ) -> Result<Self, PlanError> {
        let mut map = FnvHashMap::default();
        for (index, resource) in resources.into_iter().enumerate() {
            if resource.orientations.is_empty() {
                return Err(PlanError::malformed(index, "orientations list is empty"));
            }
            if !resource.orientations.iter().map(|o| o.rotation_id).all_unique() {
                return Err(PlanError::malformed(index, "rotation ids are not unique"));
            }
            let id = resource.id;
            if map.insert(id, resource).is_some() {
                return Err(PlanError::malformed(
                    index,
                    format!("duplicate resource_id {}", id),
                ));
            }
        }
        Ok(ResourceCatalog { resources: map })
    }

    /// Parse the `{"resources": [...]}` JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, PlanError> {
        let raw: RawCatalog = serde_json::from_str(json)?;
        let mut resources = Vec::with_capacity(raw.resources.len());
        for (index, value) in raw.resources.into_iter().enumerate() {
            let entry: RawResource = serde_json::from_value(value)
                .map_err(|e| PlanError::malformed(index, e.to_string()))?;
            resources.push(entry.into_resource(index)?);
        }
        Self::from_resources(resources)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, PlanError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    #[inline]
    pub fn get(&self, id: u32) -> Option<&ResourceType> {
        self.resources.get(&id)
    }

    pub fn contains(&self, id: u32) -> bool {
        self.resources.contains_key(&id)
    }

    /// All ids in ascending order.
    pub fn ids(&self) -> Vec<u32> {
        self.resources.keys().copied().sorted().collect()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"{
        "resources": [
            {
                "resource_id": 2,
                "name": "Lion Enclosure",
                "type": "enclosure",
                "bounding_box": 2,
                "cost": 5000,
                "interest_factor": 3.5,
                "incompatible_with": [3],
                "orientations": [
                    {"rotation": 0, "cells": [[0, 0], [0, 1]]},
                    {"rotation": 90, "cells": [[0, 0], [1, 0]]}
                ]
            },
            {
                "resource_id": 3,
                "name": "Gazelle Paddock",
                "type": "enclosure",
                "cost": 1200,
                "interest_factor": 1.0,
                "incompatible_with": [],
                "orientations": [{"rotation": 0, "cells": [[0, 0]]}]
            }
        ]
    }"#;

    #[test]
    fn loads_catalog() {
        let catalog = ResourceCatalog::from_json_str(CATALOG).unwrap();
        assert_eq!(catalog.ids(), vec![2, 3]);

        let lion = catalog.get(2).unwrap();
        assert_eq!(lion.orientations.len(), 2);
        assert_eq!(lion.orientation(90).unwrap().cells(), &[(0, 0), (1, 0)]);
        assert!(lion.excludes(2));
        assert!(lion.excludes(3));

        let gazelle = catalog.get(3).unwrap();
        assert_eq!(gazelle.bounding_box, 1);
        assert!(!gazelle.excludes(2));
        assert!(!lion.is_compatible_with(gazelle));
    }

    #[test]
    fn reports_missing_field_with_entry_index() {
        let json = r#"{"resources": [
            {"resource_id": 2, "name": "a", "type": "t", "cost": 1, "interest_factor": 1.0,
             "orientations": [{"rotation": 0, "cells": [[0, 0]]}]},
            {"resource_id": 3, "name": "b", "type": "t", "interest_factor": 1.0,
             "orientations": [{"rotation": 0, "cells": [[0, 0]]}]}
        ]}"#;

        match ResourceCatalog::from_json_str(json) {
            Err(PlanError::MalformedCatalogEntry { index, reason }) => {
                assert_eq!(index, 1);
                assert!(reason.contains("cost"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn rejects_reserved_and_duplicate_ids() {
        let reserved = r#"{"resources": [{"resource_id": 1, "name": "a", "type": "t", "cost": 1,
            "interest_factor": 1.0, "orientations": [{"cells": [[0, 0]]}]}]}"#;
        assert!(matches!(
            ResourceCatalog::from_json_str(reserved),
            Err(PlanError::MalformedCatalogEntry { index: 0, .. })
        ));

        let duplicate = r#"{"resources": [
            {"resource_id": 4, "name": "a", "type": "t", "cost": 1, "interest_factor": 1.0,
             "orientations": [{"cells": [[0, 0]]}]},
            {"resource_id": 4, "name": "b", "type": "t", "cost": 1, "interest_factor": 1.0,
             "orientations": [{"cells": [[0, 0]]}]}
        ]}"#;
        assert!(matches!(
            ResourceCatalog::from_json_str(duplicate),
            Err(PlanError::MalformedCatalogEntry { index: 1, .. })
        ));
    }

    #[test]
    fn orientation_rejects_duplicate_cells() {
        assert!(Orientation::new(0, vec![]).is_err());
        assert!(Orientation::new(0, vec![(0, 0), (0, 0)]).is_err());
    }

    #[test]
    fn footprint_clips_to_grid() {
        let bar = Orientation::new(0, vec![(0, 0), (0, 1), (0, 2)]).unwrap();
        assert_eq!(bar.extent(), (0, 0, 0, 2));

        let anchor = Location::new(1, 1);
        let cells = bar.footprint(anchor, 5, 5).unwrap();
        assert_eq!(
            cells,
            vec![Location::new(1, 1), Location::new(1, 2), Location::new(1, 3)]
        );
        assert!(bar.footprint(Location::new(1, 3), 5, 5).is_none());
    }
}
