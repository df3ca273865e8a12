//! Level descriptions and their validation against the rule table.
//!
//! The text format is a loose header followed by two bracketed JSON blocks:
//!
//! ```text
//! Level Number: 1
//! Zoo Size: 10x10
//! Available Resources: [2, 3, 5]
//! Base Zoo: [[1, 1, ...], ...]
//! ```

use crate::catalog::ResourceCatalog;
use crate::config::EngineConfig;
use crate::constants::*;
use crate::error::PlanError;
use crate::grid::Grid;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

static LEVEL_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"Level Number:\s*(\d+)").unwrap());

static ZOO_SIZE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Zoo Size:\s*(\d+)\s*[xX]\s*(\d+)").unwrap());

/// One level to solve, as supplied by the caller. Immutable once loaded.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LevelSpec {
    pub level: u8,
    pub rows: usize,
    pub cols: usize,
    pub allowed_resource_ids: Vec<u32>,
    pub base_grid: Vec<Vec<u32>>,
}

impl LevelSpec {
    /// An all-pathway level of the given size.
    pub fn open(level: u8, rows: usize, cols: usize, allowed_resource_ids: Vec<u32>) -> Self {
        LevelSpec {
            level,
            rows,
            cols,
            allowed_resource_ids,
            base_grid: vec![vec![PATHWAY_ID; cols]; rows],
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, PlanError> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// Parse the level text format.
    pub fn parse(text: &str) -> Result<Self, PlanError> {
        let level = LEVEL_NUMBER
            .captures(text)
            .and_then(|c| c[1].parse::<u8>().ok())
            .ok_or_else(|| PlanError::LevelParse("missing or invalid 'Level Number'".to_string()))?;

        let (rows, cols) = ZOO_SIZE
            .captures(text)
            .and_then(|c| Some((c[1].parse::<usize>().ok()?, c[2].parse::<usize>().ok()?)))
            .ok_or_else(|| PlanError::LevelParse("missing or invalid 'Zoo Size'".to_string()))?;

        let allowed_resource_ids: Vec<u32> =
            serde_json::from_str(bracket_block(text, "Available Resources:")?)?;
        let base_grid: Vec<Vec<u32>> = serde_json::from_str(bracket_block(text, "Base Zoo:")?)?;

        Ok(LevelSpec {
            level,
            rows,
            cols,
            allowed_resource_ids,
            base_grid,
        })
    }

    /// Check the level against its rule table entry and the catalog, and
    /// build the base grid. Nothing is solved if this fails.
    pub fn validate(
        &self,
        config: &EngineConfig,
        catalog: &ResourceCatalog,
    ) -> Result<Grid, PlanError> {
        let rules = config.rules(self.level).ok_or_else(|| {
            PlanError::invalid_level(format!(
                "level {} is outside {}..={}",
                self.level, MIN_LEVEL, MAX_LEVEL
            ))
        })?;

        if (self.rows, self.cols) != (rules.rows, rules.cols) {
            return Err(PlanError::invalid_level(format!(
                "level {} requires a {}x{} grid, got {}x{}",
                self.level, rules.rows, rules.cols, self.rows, self.cols
            )));
        }

        let grid = Grid::from_rows(&self.base_grid)
            .ok_or_else(|| PlanError::invalid_level("base grid rows have different lengths"))?;
        if (grid.rows(), grid.cols()) != (self.rows, self.cols) {
            return Err(PlanError::invalid_level(format!(
                "base grid is {}x{} but the level declares {}x{}",
                grid.rows(),
                grid.cols(),
                self.rows,
                self.cols
            )));
        }

        if self.allowed_resource_ids.is_empty() {
            return Err(PlanError::invalid_level("no resources are available"));
        }
        for &id in &self.allowed_resource_ids {
            if id == PATHWAY_ID || id == BLOCKED_ID {
                return Err(PlanError::invalid_level(format!(
                    "reserved id {} listed as an available resource",
                    id
                )));
            }
            if !catalog.contains(id) {
                return Err(PlanError::UnknownResource(id));
            }
        }

        if let Some((loc, occupant)) = grid
            .iter()
            .find(|&(_, v)| !is_allowed_base_occupant(v, &self.allowed_resource_ids))
        {
            return Err(PlanError::invalid_level(format!(
                "base grid cell ({}, {}) holds id {} which level {} does not allow",
                loc.row(),
                loc.col(),
                occupant,
                self.level
            )));
        }

        Ok(grid)
    }
}

/// The first bracketed block after `marker`, including its brackets, with
/// nesting taken into account.
fn bracket_block<'a>(text: &'a str, marker: &str) -> Result<&'a str, PlanError> {
    let start = text
        .find(marker)
        .ok_or_else(|| PlanError::LevelParse(format!("missing '{}'", marker)))?;
    let open = text[start..]
        .find('[')
        .map(|i| start + i)
        .ok_or_else(|| PlanError::LevelParse(format!("no '[' after '{}'", marker)))?;

    let mut depth = 0usize;
    for (i, ch) in text[open..].char_indices() {
        match ch {
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(&text[open..=open + i]);
                }
            }
            _ => {}
        }
    }

    Err(PlanError::LevelParse(format!("unmatched '[' after '{}'", marker)))
}
