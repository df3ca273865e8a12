//! Zoo layout planner CLI

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use log::info;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use zoo_foreman::{
    first_adjacency_violation, read_solution, solve_with_config, EngineConfig, LevelSpec,
    ResourceCatalog, ScoringFormula, SeedSequence, TrialBudget,
};

#[derive(Parser)]
#[command(name = "zoo-foreman")]
#[command(about = "Constrained grid packing planner for zoo levels")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve a level and write the zoo grid
    Solve {
        /// Level description file
        level: PathBuf,

        /// Resource catalog (JSON)
        #[arg(short, long, default_value = "resources.json")]
        resources: PathBuf,

        /// Engine configuration overlay (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output file for the solution grid
        #[arg(short, long, default_value = "solution.txt")]
        output: PathBuf,

        /// Maximum number of trials (overrides the config)
        #[arg(short, long)]
        trials: Option<usize>,

        /// Base seed (overrides the config)
        #[arg(short, long)]
        seed: Option<u64>,

        /// Explicit per-trial seeds; caps the number of trials
        #[arg(long, value_delimiter = ',', conflicts_with = "seed")]
        seeds: Vec<u64>,

        /// Time limit in seconds after which no new trial starts
        #[arg(long)]
        time_limit: Option<u64>,

        /// Worker threads (0 uses all cores)
        #[arg(long)]
        threads: Option<usize>,

        /// Also write the metric report as JSON
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Check a written solution for same-id neighbours
    Check {
        /// Solution file
        #[arg(default_value = "solution.txt")]
        solution: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Solve {
            level,
            resources,
            config,
            output,
            trials,
            seed,
            seeds,
            time_limit,
            threads,
            report,
        } => {
            let mut engine_config = match &config {
                Some(path) => EngineConfig::load(path)
                    .with_context(|| format!("loading config {}", path.display()))?,
                None => EngineConfig::default(),
            };
            if let Some(trials) = trials {
                engine_config.search.trials = trials;
            }
            if let Some(seed) = seed {
                engine_config.search.seed = seed;
            }
            if let Some(secs) = time_limit {
                engine_config.search.time_limit_secs = Some(secs);
            }
            if let Some(threads) = threads {
                engine_config.search.threads = threads;
            }
            engine_config.validate()?;

            let catalog = ResourceCatalog::load(&resources)
                .with_context(|| format!("loading resources {}", resources.display()))?;
            let level_spec = LevelSpec::load(&level)
                .with_context(|| format!("loading level {}", level.display()))?;

            let mut budget = TrialBudget::new(engine_config.search.trials);
            if let Some(limit) = engine_config.search.time_limit() {
                budget = budget.with_time_limit(limit);
            }
            let seed_sequence = if seeds.is_empty() {
                SeedSequence::from_base(engine_config.search.seed)
            } else {
                SeedSequence::Explicit(seeds)
            };

            let solution =
                solve_with_config(&catalog, &level_spec, &engine_config, budget, seed_sequence)?;
            solution.write(&output)?;

            let metrics = &solution.report;
            info!("Placed {} items", solution.placements.len());
            info!("Area: {}", metrics.area);
            info!("Utilized area: {}", metrics.utilized_area);
            info!("Unique types: {}", metrics.unique_types);
            info!("Diversity index: {:.4}", metrics.diversity);
            info!("Balance multiplier: {:.4}", metrics.multiplier);
            match metrics.formula {
                ScoringFormula::Level2 => info!("Violations: {}", metrics.violations),
                ScoringFormula::Level3 | ScoringFormula::Level4 => {
                    info!("Interest: {:.4}", metrics.interest);
                    info!("Total cost: {}", metrics.total_cost);
                }
                ScoringFormula::Level1 => {}
            }
            info!("Score: {:.4} (seed {:#x})", solution.score, solution.seed);
            info!("Wrote {}", output.display());

            if let Some(path) = report {
                std::fs::write(&path, serde_json::to_string_pretty(metrics)?)?;
                info!("Wrote report {}", path.display());
            }
        }

        Commands::Check { solution } => {
            let grid = read_solution(&solution)
                .with_context(|| format!("reading solution {}", solution.display()))?;
            if let Some(violation) = first_adjacency_violation(&grid) {
                bail!(
                    "adjacency violation at ({},{}) for resource ID {}",
                    violation.at.row(),
                    violation.at.col(),
                    violation.resource_id
                );
            }
            info!("No adjacency violations in {}", solution.display());
        }
    }

    Ok(())
}
