/// Occupant id of an empty, placeable cell.
pub const PATHWAY_ID: u32 = 1;

/// Occupant id of a blocked cell in a base grid.
pub const BLOCKED_ID: u32 = 0;

/// Chebyshev radius of the incompatibility exclusion window.
pub const FORBIDDEN_RADIUS: u32 = 5;

/// Chebyshev radius within which placements contribute interest to each other.
pub const INTEREST_RADIUS: u32 = 10;

/// Weight applied to the interest of each neighbouring placement.
pub const NEIGHBOR_INTEREST_WEIGHT: f64 = 0.1;

/// Score deducted per incompatibility violation at level 2.
pub const VIOLATION_PENALTY: f64 = 1000.0;

/// Divisor applied to the level 3 gross score.
pub const GROSS_SCORE_DIVISOR: f64 = 10_000.0;

/// Cost scale used by the level 4 cost discount and the cost-efficiency heuristic.
pub const COST_SCALE: f64 = 10_000_000.0;

/// Fraction of originally open cells after which a trial stops scanning.
pub const DEFAULT_EARLY_STOP_UTILIZATION: f64 = 0.85;

/// Placement count above which the interest score is estimated from a sample.
pub const DEFAULT_INTEREST_SAMPLE_LIMIT: usize = 4096;

/// Side length of the blocks used by the occupancy summary.
pub const SUMMARY_BLOCK_SIZE: usize = 8;

/// Lowest and highest level number in the rule table.
pub const MIN_LEVEL: u8 = 1;
pub const MAX_LEVEL: u8 = 4;

/// Grid dimensions `(rows, cols)` per level, level 1 first.
pub const LEVEL_DIMENSIONS: [(usize, usize); 4] = [(10, 10), (50, 50), (200, 200), (800, 800)];

/// Grid dimensions `(rows, cols)` required at a given level.
/// Returns `None` for levels outside the rule table.
pub fn level_dimensions(level: u8) -> Option<(usize, usize)> {
    match level {
        MIN_LEVEL..=MAX_LEVEL => Some(LEVEL_DIMENSIONS[(level - MIN_LEVEL) as usize]),
        _ => None,
    }
}

/// True if a base grid at the given level may contain this occupant before search.
///
/// Blocked and pathway cells are always allowed; any other occupant must be one
/// of the resources the level makes available.
pub fn is_allowed_base_occupant(occupant: u32, allowed_resource_ids: &[u32]) -> bool {
    occupant == PATHWAY_ID || occupant == BLOCKED_ID || allowed_resource_ids.contains(&occupant)
}
