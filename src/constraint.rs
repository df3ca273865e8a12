//! Feasibility of stamping a resource orientation onto a grid.
//!
//! Checks run in a fixed order and stop at the first failure:
//!   1. every footprint cell lies inside the grid,
//!   2. every footprint cell is currently pathway,
//!   3. the level's spacing rule (same-id adjacency, or the incompatibility
//!      radius) holds.
//!
//! The radius rule consults only the candidate's own incompatibility set. A
//! resource already on the grid is not asked whether it tolerates the
//! candidate, so with an asymmetric catalog the test is one-directional.

use crate::catalog::*;
use crate::constants::*;
use crate::grid::*;
use crate::location::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which cells count as adjacent under the adjacency rule.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Neighborhood {
    #[default]
    Eight,
    Four,
}

impl Neighborhood {
    pub fn offsets(self) -> &'static [(i32, i32)] {
        match self {
            Neighborhood::Eight => &NEIGHBORS_8,
            Neighborhood::Four => &NEIGHBORS_4,
        }
    }
}

/// The spacing rule active at a level.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Mode {
    /// No neighbour of the footprint may hold the same resource id.
    Adjacency(Neighborhood),
    /// No cell within this Chebyshev radius of the footprint may hold an id
    /// the candidate excludes.
    IncompatibilityRadius(u32),
}

impl Default for Mode {
    fn default() -> Self {
        Mode::IncompatibilityRadius(FORBIDDEN_RADIUS)
    }
}

/// Why a placement was refused.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Rejection {
    OutOfBounds,
    Occupied(Location),
    Adjacent(Location),
    Incompatible { at: Location, occupant: u32 },
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::OutOfBounds => write!(f, "footprint leaves the grid"),
            Rejection::Occupied(loc) => {
                write!(f, "cell ({}, {}) is not pathway", loc.row(), loc.col())
            }
            Rejection::Adjacent(loc) => write!(
                f,
                "same resource already adjacent at ({}, {})",
                loc.row(),
                loc.col()
            ),
            Rejection::Incompatible { at, occupant } => write!(
                f,
                "incompatible resource {} within range at ({}, {})",
                occupant,
                at.row(),
                at.col()
            ),
        }
    }
}

/// Full check with the reason for the first failure.
pub fn check_placement(
    grid: &Grid,
    resource: &ResourceType,
    orientation: &Orientation,
    anchor: Location,
    mode: Mode,
) -> Result<(), Rejection> {
    let rows = grid.rows();
    let cols = grid.cols();

    for (r, c) in orientation.place_at(anchor) {
        if Location::checked(r, c, rows, cols).is_none() {
            return Err(Rejection::OutOfBounds);
        }
    }

    for (r, c) in orientation.place_at(anchor) {
        let loc = Location::new(r as usize, c as usize);
        if !grid.is_pathway(loc) {
            return Err(Rejection::Occupied(loc));
        }
    }

    // From here on every footprint cell holds pathway, so the footprint can
    // never match a resource id and needs no explicit exclusion below.
    match mode {
        Mode::Adjacency(neighborhood) => {
            check_adjacency(grid, resource, orientation, anchor, neighborhood)
        }
        Mode::IncompatibilityRadius(radius) => {
            check_radius(grid, resource, orientation, anchor, radius)
        }
    }
}

/// Predicate form of [`check_placement`].
#[inline]
pub fn can_place(
    grid: &Grid,
    resource: &ResourceType,
    orientation: &Orientation,
    anchor: Location,
    mode: Mode,
) -> bool {
    check_placement(grid, resource, orientation, anchor, mode).is_ok()
}

fn check_adjacency(
    grid: &Grid,
    resource: &ResourceType,
    orientation: &Orientation,
    anchor: Location,
    neighborhood: Neighborhood,
) -> Result<(), Rejection> {
    for (r, c) in orientation.place_at(anchor) {
        for &(dr, dc) in neighborhood.offsets() {
            let (nr, nc) = (r + dr as i64, c + dc as i64);
            if grid.get_signed(nr, nc) == Some(resource.id) {
                return Err(Rejection::Adjacent(Location::new(nr as usize, nc as usize)));
            }
        }
    }
    Ok(())
}

fn check_radius(
    grid: &Grid,
    resource: &ResourceType,
    orientation: &Orientation,
    anchor: Location,
    radius: u32,
) -> Result<(), Rejection> {
    let (min_r, min_c, max_r, max_c) = orientation.extent();
    let radius = radius as i64;
    let (top, left) = anchor.offset(min_r, min_c);
    let (bottom, right) = anchor.offset(max_r, max_c);

    let mut hit = None;
    // The expanded bounding box over-covers irregular shapes, so each hit is
    // confirmed against the actual footprint cells.
    grid.any_resource_in_window(
        top - radius,
        left - radius,
        bottom + radius,
        right + radius,
        |loc, occupant| {
            if !resource.excludes(occupant) {
                return false;
            }
            let (r, c) = (loc.row() as i64, loc.col() as i64);
            let within = orientation
                .place_at(anchor)
                .any(|(fr, fc)| (fr - r).abs().max((fc - c).abs()) <= radius);
            if within {
                hit = Some(Rejection::Incompatible { at: loc, occupant });
            }
            within
        },
    );

    match hit {
        Some(rejection) => Err(rejection),
        None => Ok(()),
    }
}
