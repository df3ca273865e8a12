//! Constrained grid packing planner.
//!
//! Fills a level grid with multi-cell resource shapes under per-level
//! spacing rules, scores the layout with the level's formula, and keeps the
//! best of several seeded trials.

pub mod catalog;
pub mod config;
pub mod constants;
pub mod constraint;
pub mod error;
pub mod grid;
pub mod level;
pub mod location;
pub mod placement;
pub mod plan;
pub mod planner;
pub mod scoring;
pub mod search;

pub use catalog::{Orientation, ResourceCatalog, ResourceType};
pub use config::{ConfigError, EngineConfig, LevelRules, RuleMode, SearchConfig};
pub use constraint::{can_place, check_placement, Mode, Neighborhood, Rejection};
pub use error::PlanError;
pub use grid::Grid;
pub use level::LevelSpec;
pub use location::Location;
pub use placement::{Placement, PlacementState};
pub use plan::{first_adjacency_violation, read_solution, write_solution, ReplayError, Solution};
pub use planner::{solve, solve_configured, solve_with_config};
pub use scoring::{ScoreReport, ScoringFormula};
pub use search::{ScanOrder, SeedSequence, TrialBudget, ValueFunction};
