//! The finished layout and its on-disk form.

use crate::catalog::*;
use crate::constants::*;
use crate::constraint::*;
use crate::error::PlanError;
use crate::grid::*;
use crate::location::*;
use crate::placement::*;
use crate::scoring::ScoreReport;
use crate::search::TrialOutcome;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Best layout found for a level.
#[derive(Clone, Debug)]
pub struct Solution {
    pub level: u8,
    pub grid: Grid,
    /// Placements in the order they were committed.
    pub placements: Vec<Placement>,
    pub score: f64,
    pub total_cost: u64,
    pub report: ScoreReport,
    /// Seed of the trial that produced this layout.
    pub seed: u64,
}

/// Why a placement log does not reproduce its grid.
#[derive(Debug, Error, PartialEq)]
pub enum ReplayError {
    #[error("placement #{index} names a resource or rotation missing from the catalog")]
    UnknownPlacement { index: usize },

    #[error("placement #{index} is infeasible on replay: {reason}")]
    Rejected { index: usize, reason: Rejection },

    #[error("replayed grid differs from the solution grid")]
    GridMismatch,
}

impl Solution {
    pub(crate) fn from_outcome(level: u8, outcome: TrialOutcome) -> Self {
        let seed = outcome.stats.seed;
        let report = outcome.report;
        let (grid, placements, total_cost) = outcome.state.into_parts();
        Solution {
            level,
            grid,
            placements,
            score: report.score,
            total_cost,
            report,
            seed,
        }
    }

    /// Re-apply every placement in log order to `base_grid`, checking each
    /// one under `mode` before it is stamped, and compare the result with
    /// the solution grid.
    pub fn verify_replay(
        &self,
        base_grid: &Grid,
        catalog: &ResourceCatalog,
        mode: Mode,
    ) -> Result<(), ReplayError> {
        let mut grid = base_grid.clone();
        for (index, placement) in self.placements.iter().enumerate() {
            let resource = catalog
                .get(placement.resource_id)
                .ok_or(ReplayError::UnknownPlacement { index })?;
            let orientation = resource
                .orientation(placement.rotation_id)
                .ok_or(ReplayError::UnknownPlacement { index })?;

            check_placement(&grid, resource, orientation, placement.anchor, mode)
                .map_err(|reason| ReplayError::Rejected { index, reason })?;
            place(&mut grid, resource, orientation, placement.anchor);
        }

        if grid == self.grid {
            Ok(())
        } else {
            Err(ReplayError::GridMismatch)
        }
    }

    pub fn write(&self, path: impl AsRef<Path>) -> Result<(), PlanError> {
        write_solution(path, &self.grid)
    }
}

#[derive(Serialize, Deserialize)]
struct SolutionFile {
    zoo: Vec<Vec<u32>>,
}

/// `{"zoo": [...]}` with one grid row per line.
pub fn zoo_json(grid: &Grid) -> String {
    let rows: Vec<String> = grid
        .to_rows()
        .iter()
        .map(|row| {
            let cells: Vec<String> = row.iter().map(|v| v.to_string()).collect();
            format!("  [{}]", cells.join(", "))
        })
        .collect();
    format!("{{\"zoo\": [\n{}\n]}}\n", rows.join(",\n"))
}

pub fn write_solution(path: impl AsRef<Path>, grid: &Grid) -> Result<(), PlanError> {
    std::fs::write(path, zoo_json(grid))?;
    Ok(())
}

pub fn parse_solution(json: &str) -> Result<Grid, PlanError> {
    let file: SolutionFile = serde_json::from_str(json)?;
    Grid::from_rows(&file.zoo)
        .ok_or_else(|| PlanError::invalid_level("solution rows have different lengths"))
}

pub fn read_solution(path: impl AsRef<Path>) -> Result<Grid, PlanError> {
    parse_solution(&std::fs::read_to_string(path)?)
}

/// A resource cell with an 8-neighbour holding the same id.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct AdjacencyViolation {
    pub at: Location,
    pub neighbour: Location,
    pub resource_id: u32,
}

/// First same-id 8-neighbour pair in row-major order, ignoring pathway and
/// blocked cells.
///
/// A written grid carries no placement boundaries, so two cells of one
/// multi-cell footprint also count; the check is exact for single-cell
/// resources only.
pub fn first_adjacency_violation(grid: &Grid) -> Option<AdjacencyViolation> {
    grid.iter()
        .filter(|&(_, id)| id != PATHWAY_ID && id != BLOCKED_ID)
        .find_map(|(at, id)| {
            NEIGHBORS_8.iter().find_map(|&(dr, dc)| {
                let (r, c) = at.offset(dr, dc);
                let neighbour = Location::checked(r, c, grid.rows(), grid.cols())?;
                (grid.get(neighbour) == id).then_some(AdjacencyViolation {
                    at,
                    neighbour,
                    resource_id: id,
                })
            })
        })
}
