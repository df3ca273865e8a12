//! Level scoring.
//!
//! Every level rewards covered area scaled by a balance multiplier built from
//! a diversity index. Levels 1 and 2 use the pairwise (without-replacement)
//! index, levels 3 and 4 the sum-of-squares index; both go by "Simpson's
//! index" but they differ, and each level keeps its own.
//!
//! Level 3 adds an interest term in which nearby placements lend each other a
//! share of their interest; level 4 discounts that score by total cost.

use crate::catalog::*;
use crate::constants::*;
use crate::grid::*;
use crate::location::*;
use crate::placement::*;
use fnv::{FnvHashMap, FnvHashSet};
use itertools::Itertools;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;

/// Diversity index variant.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiversityIndex {
    /// `Σ n(n−1) / N(N−1)`, or 1 when fewer than two placements exist.
    Pairwise,
    /// `Σ (n/N)²`, or 0 with no placements.
    SumOfSquares,
}

impl DiversityIndex {
    pub fn compute(self, counts: &[u32]) -> f64 {
        let total: u64 = counts.iter().map(|&n| n as u64).sum();
        match self {
            DiversityIndex::Pairwise => {
                if total < 2 {
                    return 1.0;
                }
                let numerator: u64 = counts
                    .iter()
                    .map(|&n| n as u64 * (n as u64).saturating_sub(1))
                    .sum();
                numerator as f64 / (total * (total - 1)) as f64
            }
            DiversityIndex::SumOfSquares => {
                if total == 0 {
                    return 0.0;
                }
                let total = total as f64;
                counts
                    .iter()
                    .map(|&n| {
                        let share = n as f64 / total;
                        share * share
                    })
                    .sum()
            }
        }
    }
}

/// `(S + 1/D) / 2`, falling back to `S / 2` when `D` is zero.
pub fn balance_multiplier(unique_types: usize, diversity: f64) -> f64 {
    let s = unique_types as f64;
    if diversity > 0.0 {
        (s + 1.0 / diversity) / 2.0
    } else {
        s / 2.0
    }
}

/// Search-only weighting that discourages piling onto one type.
#[inline]
pub fn overuse_penalty(type_count: u32, total_count: u32) -> f64 {
    if total_count == 0 {
        return 1.0;
    }
    1.0 / (1.0 + 3.0 * type_count as f64 / total_count as f64)
}

/// Search-only weighting that favours cheap resources.
#[inline]
pub fn cost_efficiency(cost: u64) -> f64 {
    2.0 * COST_SCALE / (COST_SCALE + cost as f64)
}

/// The score formula for a level.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringFormula {
    /// `area × M`
    Level1,
    /// `area × M − 1000 × violations`
    Level2,
    /// `interest × utilized_area × M / 10000`
    Level3,
    /// level 3 score `/ (1 + total_cost / 10^7)`
    Level4,
}

impl ScoringFormula {
    pub fn for_level(level: u8) -> Option<Self> {
        match level {
            1 => Some(ScoringFormula::Level1),
            2 => Some(ScoringFormula::Level2),
            3 => Some(ScoringFormula::Level3),
            4 => Some(ScoringFormula::Level4),
            _ => None,
        }
    }

    pub fn diversity_index(self) -> DiversityIndex {
        match self {
            ScoringFormula::Level1 | ScoringFormula::Level2 => DiversityIndex::Pairwise,
            ScoringFormula::Level3 | ScoringFormula::Level4 => DiversityIndex::SumOfSquares,
        }
    }
}

/// Tuning for the parts of scoring that scan neighbourhoods.
#[derive(Copy, Clone, Debug)]
pub struct ScoreOptions {
    /// Radius within which incompatible cells count as a violation.
    pub violation_radius: u32,
    /// Radius within which placements share interest.
    pub interest_radius: u32,
    /// Placement count above which the interest sum is sampled.
    pub interest_sample_limit: usize,
    /// Seed for the interest sample.
    pub sample_seed: u64,
}

impl Default for ScoreOptions {
    fn default() -> Self {
        ScoreOptions {
            violation_radius: FORBIDDEN_RADIUS,
            interest_radius: INTEREST_RADIUS,
            interest_sample_limit: DEFAULT_INTEREST_SAMPLE_LIMIT,
            sample_seed: 0,
        }
    }
}

/// Score plus the metrics it was built from.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ScoreReport {
    pub formula: ScoringFormula,
    /// Sum of footprint sizes over all placements.
    pub area: usize,
    /// Non-pathway cells in the final grid.
    pub utilized_area: usize,
    pub unique_types: usize,
    pub diversity: f64,
    pub multiplier: f64,
    /// Ordered incompatible cell pairs halved (level 2 only). Half values
    /// come from one-sided exclusions.
    pub violations: f64,
    /// Interest sum (levels 3 and 4 only).
    pub interest: f64,
    pub total_cost: u64,
    pub score: f64,
}

/// Score a finished (or partial) layout.
pub fn evaluate(
    formula: ScoringFormula,
    grid: &Grid,
    placements: &[Placement],
    catalog: &ResourceCatalog,
    options: &ScoreOptions,
) -> ScoreReport {
    let mut counts: FnvHashMap<u32, u32> = FnvHashMap::default();
    let mut area = 0usize;
    let mut total_cost = 0u64;
    for placement in placements {
        *counts.entry(placement.resource_id).or_insert(0) += 1;
        if let Some(resource) = catalog.get(placement.resource_id) {
            total_cost += resource.cost;
            area += resource
                .orientation(placement.rotation_id)
                .map(|o| o.len())
                .unwrap_or(0);
        }
    }

    let counts: Vec<u32> = counts
        .into_iter()
        .sorted()
        .map(|(_, n)| n)
        .collect();
    let unique_types = counts.len();
    let diversity = formula.diversity_index().compute(&counts);
    let multiplier = balance_multiplier(unique_types, diversity);
    let utilized_area = grid.non_pathway_count();

    let mut report = ScoreReport {
        formula,
        area,
        utilized_area,
        unique_types,
        diversity,
        multiplier,
        violations: 0.0,
        interest: 0.0,
        total_cost,
        score: 0.0,
    };

    report.score = match formula {
        ScoringFormula::Level1 => area as f64 * multiplier,
        ScoringFormula::Level2 => {
            report.violations = count_violations(grid, placements, catalog, options.violation_radius);
            area as f64 * multiplier - report.violations * VIOLATION_PENALTY
        }
        ScoringFormula::Level3 | ScoringFormula::Level4 => {
            report.interest = interest_score(grid, placements, catalog, options);
            let gross = report.interest * utilized_area as f64 * multiplier / GROSS_SCORE_DIVISOR;
            if formula == ScoringFormula::Level4 {
                gross / (1.0 + total_cost as f64 / COST_SCALE)
            } else {
                gross
            }
        }
    };

    report
}

/// Footprints of all placements that resolve against the catalog and grid,
/// paired with their placement index.
fn resolved_footprints(
    grid: &Grid,
    placements: &[Placement],
    catalog: &ResourceCatalog,
) -> Vec<(usize, Vec<Location>)> {
    placements
        .iter()
        .enumerate()
        .filter_map(|(i, p)| Some((i, p.footprint(catalog, grid.rows(), grid.cols())?)))
        .collect()
}

/// Count ordered pairs `(p, q)` of placement cells within `radius` of each
/// other where `p`'s resource excludes `q`'s id, halved. A pair excluded from
/// both sides (always the case for equal ids) counts 1; a one-sided exclusion
/// counts 1/2. Cells of the same placement never pair with each other, and
/// pre-filled base cells are not placements.
pub fn count_violations(
    grid: &Grid,
    placements: &[Placement],
    catalog: &ResourceCatalog,
    radius: u32,
) -> f64 {
    // Placement index + 1 per cell; 0 for cells no placement covers.
    let mut owner = GridArray::new(grid.rows(), grid.cols(), 0u32);
    let footprints = resolved_footprints(grid, placements, catalog);
    for (index, cells) in &footprints {
        for loc in cells {
            owner.set(loc.row(), loc.col(), *index as u32 + 1);
        }
    }

    let radius = radius as i64;
    let mut ordered = 0u64;

    for (index, cells) in &footprints {
        let placement = &placements[*index];
        let resource = match catalog.get(placement.resource_id) {
            Some(resource) => resource,
            None => continue,
        };
        let own = *index as u32 + 1;

        for &loc in cells {
            let (r, c) = (loc.row() as i64, loc.col() as i64);
            grid.any_resource_in_window(r - radius, c - radius, r + radius, c + radius, |other, occupant| {
                let other_owner = *owner.get(other.row(), other.col());
                // Each unordered pair is seen from both ends; count it from the lower cell only.
                if other_owner == 0 || other_owner == own || other <= loc {
                    return false;
                }
                let other_excludes = catalog
                    .get(occupant)
                    .map_or(false, |o| o.excludes(resource.id));
                ordered += resource.excludes(occupant) as u64 + other_excludes as u64;
                false
            });
        }
    }

    ordered as f64 / 2.0
}

/// Bucketed placement lookup for neighbourhood queries.
struct PlacementIndex<'a> {
    footprints: &'a [(usize, Vec<Location>)],
    /// Bounding box per footprint: `(min_row, min_col, max_row, max_col)`.
    bounds: Vec<(usize, usize, usize, usize)>,
    buckets: FnvHashMap<(usize, usize), Vec<usize>>,
}

const INDEX_BUCKET_SIZE: usize = 16;

impl<'a> PlacementIndex<'a> {
    fn new(footprints: &'a [(usize, Vec<Location>)]) -> Self {
        let bounds: Vec<_> = footprints
            .iter()
            .map(|(_, cells)| {
                cells.iter().fold(
                    (usize::MAX, usize::MAX, 0, 0),
                    |(r0, c0, r1, c1), loc| {
                        (r0.min(loc.row()), c0.min(loc.col()), r1.max(loc.row()), c1.max(loc.col()))
                    },
                )
            })
            .collect();

        let mut buckets: FnvHashMap<(usize, usize), Vec<usize>> = FnvHashMap::default();
        for (slot, &(r0, c0, r1, c1)) in bounds.iter().enumerate() {
            for br in r0 / INDEX_BUCKET_SIZE..=r1 / INDEX_BUCKET_SIZE {
                for bc in c0 / INDEX_BUCKET_SIZE..=c1 / INDEX_BUCKET_SIZE {
                    buckets.entry((br, bc)).or_default().push(slot);
                }
            }
        }

        PlacementIndex {
            footprints,
            bounds,
            buckets,
        }
    }

    /// Slots of all other footprints within Chebyshev `radius` of `slot`.
    fn neighbours(&self, slot: usize, radius: usize) -> Vec<usize> {
        let (r0, c0, r1, c1) = self.bounds[slot];
        let lo_r = r0.saturating_sub(radius) / INDEX_BUCKET_SIZE;
        let lo_c = c0.saturating_sub(radius) / INDEX_BUCKET_SIZE;
        let hi_r = (r1 + radius) / INDEX_BUCKET_SIZE;
        let hi_c = (c1 + radius) / INDEX_BUCKET_SIZE;

        let mut seen = FnvHashSet::default();
        let mut result = Vec::new();
        for br in lo_r..=hi_r {
            for bc in lo_c..=hi_c {
                let Some(bucket) = self.buckets.get(&(br, bc)) else {
                    continue;
                };
                for &other in bucket {
                    if other == slot || !seen.insert(other) {
                        continue;
                    }
                    if self.bounds_gap(slot, other) <= radius
                        && footprint_distance(&self.footprints[slot].1, &self.footprints[other].1)
                            <= radius as u32
                    {
                        result.push(other);
                    }
                }
            }
        }
        result.sort_unstable();
        result
    }

    /// Chebyshev gap between two bounding boxes; a lower bound on footprint distance.
    fn bounds_gap(&self, a: usize, b: usize) -> usize {
        let (ar0, ac0, ar1, ac1) = self.bounds[a];
        let (br0, bc0, br1, bc1) = self.bounds[b];
        let row_gap = br0.saturating_sub(ar1).max(ar0.saturating_sub(br1));
        let col_gap = bc0.saturating_sub(ac1).max(ac0.saturating_sub(bc1));
        row_gap.max(col_gap)
    }
}

/// Minimum Chebyshev distance between any two cells of two footprints.
pub fn footprint_distance(a: &[Location], b: &[Location]) -> u32 {
    a.iter()
        .cartesian_product(b.iter())
        .map(|(x, y)| x.distance_to(*y))
        .min()
        .unwrap_or(u32::MAX)
}

/// `Σ_p [ base(p) + 0.1 × Σ_{q near p} base(q) ]`.
///
/// With more placements than `options.interest_sample_limit`, the outer sum
/// runs over a seeded random sample and is scaled up by `n / sample`.
pub fn interest_score(
    grid: &Grid,
    placements: &[Placement],
    catalog: &ResourceCatalog,
    options: &ScoreOptions,
) -> f64 {
    let footprints = resolved_footprints(grid, placements, catalog);
    if footprints.is_empty() {
        return 0.0;
    }

    let base: Vec<f64> = footprints
        .iter()
        .map(|(i, _)| {
            catalog
                .get(placements[*i].resource_id)
                .map(|r| r.interest_factor)
                .unwrap_or(0.0)
        })
        .collect();
    let index = PlacementIndex::new(&footprints);

    let n = footprints.len();
    let slots: Vec<usize> = if n > options.interest_sample_limit {
        let mut rng = ChaCha8Rng::seed_from_u64(options.sample_seed);
        rand::seq::index::sample(&mut rng, n, options.interest_sample_limit)
            .into_iter()
            .sorted()
            .collect()
    } else {
        (0..n).collect()
    };

    let radius = options.interest_radius as usize;
    let sampled: f64 = slots
        .iter()
        .map(|&slot| {
            let shared: f64 = index
                .neighbours(slot, radius)
                .into_iter()
                .map(|other| base[other])
                .sum();
            base[slot] + NEIGHBOR_INTEREST_WEIGHT * shared
        })
        .sum();

    sampled * n as f64 / slots.len() as f64
}
