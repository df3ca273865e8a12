//! Public entry points for solving a level.
//!
//! `solve` runs with the built-in rule table; `solve_with_config` takes an
//! explicit `EngineConfig`. Both reject a malformed level before any trial
//! starts, then run the search and hand back the best `Solution`.

use crate::catalog::ResourceCatalog;
use crate::config::EngineConfig;
use crate::error::PlanError;
use crate::level::LevelSpec;
use crate::plan::Solution;
use crate::scoring::ScoringFormula;
use crate::search::*;
use log::*;

/// Solve a level under the built-in rule table.
pub fn solve(
    catalog: &ResourceCatalog,
    level_spec: &LevelSpec,
    trial_budget: TrialBudget,
    seed_sequence: SeedSequence,
) -> Result<Solution, PlanError> {
    let config = EngineConfig::default();
    solve_with_config(catalog, level_spec, &config, trial_budget, seed_sequence)
}

/// Solve a level under `config`'s rules. `config.search.threads` picks the
/// worker pool; the trial budget and seeds are taken as given.
pub fn solve_with_config(
    catalog: &ResourceCatalog,
    level_spec: &LevelSpec,
    config: &EngineConfig,
    trial_budget: TrialBudget,
    seed_sequence: SeedSequence,
) -> Result<Solution, PlanError> {
    let base_grid = level_spec.validate(config, catalog)?;
    let rules = config
        .rules(level_spec.level)
        .ok_or_else(|| PlanError::invalid_level(format!("no rules for level {}", level_spec.level)))?;
    let formula = ScoringFormula::for_level(level_spec.level)
        .ok_or_else(|| PlanError::invalid_level(format!("no score formula for level {}", level_spec.level)))?;

    let ctx = SearchContext::new(
        catalog,
        rules,
        formula,
        &base_grid,
        &level_spec.allowed_resource_ids,
    )?;

    debug!(
        "Solving level {} ({}x{}): {} resources, scan={:?}, value={:?}, trials={}",
        level_spec.level,
        level_spec.rows,
        level_spec.cols,
        level_spec.allowed_resource_ids.len(),
        rules.scan,
        rules.value,
        ctx.planned_trials(&trial_budget, &seed_sequence)
    );

    let (outcome, stats) = run_search(&ctx, &trial_budget, &seed_sequence, config.search.threads)?;
    let solution = Solution::from_outcome(level_spec.level, outcome);

    info!(
        "Level {}: best score {:.4} from trial {} of {} ({} placements, cost {}, {:?})",
        level_spec.level,
        solution.score,
        stats.best_trial,
        stats.trials_run,
        solution.placements.len(),
        solution.total_cost,
        stats.elapsed
    );

    Ok(solution)
}

/// Solve with the trial budget and seeds taken from `config.search`.
pub fn solve_configured(
    catalog: &ResourceCatalog,
    level_spec: &LevelSpec,
    config: &EngineConfig,
) -> Result<Solution, PlanError> {
    let mut budget = TrialBudget::new(config.search.trials);
    if let Some(limit) = config.search.time_limit() {
        budget = budget.with_time_limit(limit);
    }
    solve_with_config(
        catalog,
        level_spec,
        config,
        budget,
        SeedSequence::from_base(config.search.seed),
    )
}
