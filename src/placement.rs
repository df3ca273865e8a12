//! Committing placements and the per-trial state they accumulate in.
//!
//! `PlacementState` is owned by exactly one trial. It is created from the
//! level's base grid, mutated only through `place` and `remove`, and either
//! becomes a `Solution` or is dropped.

use crate::catalog::*;
use crate::constants::*;
use crate::grid::*;
use crate::location::*;
use fnv::FnvHashMap;
use serde::{Deserialize, Serialize};

/// A committed placement: which resource, which orientation, and where.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Placement {
    pub resource_id: u32,
    pub rotation_id: u32,
    pub anchor: Location,
}

impl Placement {
    /// Absolute footprint cells, or `None` if the resource or rotation is not
    /// in the catalog or a cell falls outside a `rows x cols` grid.
    pub fn footprint(
        &self,
        catalog: &ResourceCatalog,
        rows: usize,
        cols: usize,
    ) -> Option<Vec<Location>> {
        catalog
            .get(self.resource_id)?
            .orientation(self.rotation_id)?
            .footprint(self.anchor, rows, cols)
    }
}

/// Stamp `resource` onto the grid at `anchor`.
///
/// The caller must have confirmed the configuration with
/// [`can_place`](crate::constraint::can_place); nothing is re-validated here
/// and every footprint cell is assumed to be inside the grid.
pub fn place(
    grid: &mut Grid,
    resource: &ResourceType,
    orientation: &Orientation,
    anchor: Location,
) -> Placement {
    for (r, c) in orientation.place_at(anchor) {
        debug_assert!(grid.get_signed(r, c) == Some(PATHWAY_ID), "overlapping stamp");
        grid.set(Location::new(r as usize, c as usize), resource.id);
    }

    Placement {
        resource_id: resource.id,
        rotation_id: orientation.rotation_id,
        anchor,
    }
}

/// Grid, placement log and running counters for one trial.
#[derive(Clone, Debug)]
pub struct PlacementState {
    grid: Grid,
    placements: Vec<Placement>,
    /// Placements per resource id.
    counts: FnvHashMap<u32, u32>,
    total_cost: u64,
    /// Cells covered by placements in the log.
    placed_cells: usize,
    /// Pathway cells in the base grid.
    open_cells: usize,
}

impl PlacementState {
    pub fn new(base_grid: Grid) -> Self {
        let open_cells = base_grid.count(|v| v == PATHWAY_ID);
        PlacementState {
            grid: base_grid,
            placements: Vec::new(),
            counts: FnvHashMap::default(),
            total_cost: 0,
            placed_cells: 0,
            open_cells,
        }
    }

    #[inline]
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    #[inline]
    pub fn placements(&self) -> &[Placement] {
        &self.placements
    }

    #[inline]
    pub fn get_count(&self, resource_id: u32) -> u32 {
        self.counts.get(&resource_id).copied().unwrap_or(0)
    }

    #[inline]
    pub fn total_cost(&self) -> u64 {
        self.total_cost
    }

    #[inline]
    pub fn placed_cells(&self) -> usize {
        self.placed_cells
    }

    /// Fraction of the base grid's pathway cells now covered by placements.
    pub fn utilization(&self) -> f64 {
        if self.open_cells == 0 {
            1.0
        } else {
            self.placed_cells as f64 / self.open_cells as f64
        }
    }

    /// Commit a placement that has already passed the constraint check.
    pub fn place(
        &mut self,
        resource: &ResourceType,
        orientation: &Orientation,
        anchor: Location,
    ) -> Placement {
        let placement = place(&mut self.grid, resource, orientation, anchor);
        *self.counts.entry(resource.id).or_insert(0) += 1;
        self.total_cost += resource.cost;
        self.placed_cells += orientation.len();
        self.placements.push(placement);
        placement
    }

    /// Remove the placement at `index`, reverting its cells to pathway and
    /// dropping it from the log in one step. Returns `None` (and changes
    /// nothing) if the index or its catalog entry is unknown.
    pub fn remove(&mut self, index: usize, catalog: &ResourceCatalog) -> Option<Placement> {
        let placement = *self.placements.get(index)?;
        let resource = catalog.get(placement.resource_id)?;
        let orientation = resource.orientation(placement.rotation_id)?;
        let cells = orientation.footprint(placement.anchor, self.grid.rows(), self.grid.cols())?;

        for loc in cells {
            self.grid.set(loc, PATHWAY_ID);
        }
        self.placements.remove(index);

        if let Some(count) = self.counts.get_mut(&resource.id) {
            *count -= 1;
            if *count == 0 {
                self.counts.remove(&resource.id);
            }
        }
        self.total_cost -= resource.cost;
        self.placed_cells -= orientation.len();

        Some(placement)
    }

    pub fn into_parts(self) -> (Grid, Vec<Placement>, u64) {
        (self.grid, self.placements, self.total_cost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> ResourceCatalog {
        let bar = ResourceType {
            id: 2,
            name: "bar".to_string(),
            category: "test".to_string(),
            bounding_box: 2,
            cost: 250,
            interest_factor: 1.0,
            incompatible_with: Default::default(),
            orientations: vec![
                Orientation::new(0, vec![(0, 0), (0, 1)]).unwrap(),
                Orientation::new(90, vec![(0, 0), (1, 0)]).unwrap(),
            ],
        };
        ResourceCatalog::from_resources(vec![bar]).unwrap()
    }

    #[test]
    fn place_writes_footprint_and_counters() {
        let catalog = catalog();
        let bar = catalog.get(2).unwrap();
        let mut state = PlacementState::new(Grid::new(4, 4));

        let placement = state.place(bar, &bar.orientations[1], Location::new(1, 1));
        assert_eq!(placement.rotation_id, 90);
        assert_eq!(state.grid().get(Location::new(1, 1)), 2);
        assert_eq!(state.grid().get(Location::new(2, 1)), 2);
        assert_eq!(state.grid().get(Location::new(1, 2)), PATHWAY_ID);

        assert_eq!(state.get_count(2), 1);
        assert_eq!(state.total_cost(), 250);
        assert_eq!(state.placed_cells(), 2);
        assert!((state.utilization() - 2.0 / 16.0).abs() < 1e-12);
        assert_eq!(
            placement.footprint(&catalog, 4, 4).unwrap(),
            vec![Location::new(1, 1), Location::new(2, 1)]
        );
    }

    #[test]
    fn remove_reverts_cells_and_log_together() {
        let catalog = catalog();
        let bar = catalog.get(2).unwrap();
        let mut state = PlacementState::new(Grid::new(4, 4));
        state.place(bar, &bar.orientations[0], Location::new(0, 0));
        state.place(bar, &bar.orientations[1], Location::new(2, 3));

        let removed = state.remove(0, &catalog).unwrap();
        assert_eq!(removed.anchor, Location::new(0, 0));
        assert_eq!(state.placements().len(), 1);
        assert_eq!(state.grid().get(Location::new(0, 0)), PATHWAY_ID);
        assert_eq!(state.grid().get(Location::new(0, 1)), PATHWAY_ID);
        assert_eq!(state.grid().get(Location::new(3, 3)), 2);
        assert_eq!(state.get_count(2), 1);
        assert_eq!(state.total_cost(), 250);

        assert!(state.remove(5, &catalog).is_none());
        assert_eq!(state.placements().len(), 1);
    }

    #[test]
    fn utilization_ignores_blocked_cells() {
        let grid = Grid::from_rows(&[vec![0, 0], vec![1, 1]]).unwrap();
        let catalog = catalog();
        let bar = catalog.get(2).unwrap();
        let mut state = PlacementState::new(grid);
        state.place(bar, &bar.orientations[0], Location::new(1, 0));
        assert!((state.utilization() - 1.0).abs() < 1e-12);
    }
}
