//! Core of s2f recipe generation: deferred tasks and the engine that runs them,
//! the strategies that produce per-pathway parameters, and the assembly,
//! validation and serialization of the resulting recipe.

/// Parameter names and values
pub mod params;
/// Pathways and pathway patterns
pub mod pathway;
/// Deferred units of work
pub mod task;
/// Sequential and parallel task execution
pub mod engine;
/// Wildcard expansion and merging of strategy results
pub mod assemble;
/// Parameter completeness checks
pub mod validate;
/// Dataset access and sampling
pub mod dataset;
/// Reference data tables
pub mod bio_data;
/// Recipe document reading and writing
pub mod xml;
/// Pluggable recipe strategies
pub mod strategy;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

pub use assemble::{init_recipe, Recipe};
pub use dataset::{Dataset, SummaryDataset};
pub use engine::{run_parallel, run_sequential};
pub use params::{ParamMap, ParamValue};
pub use pathway::{Pathway, PathwayPattern, Pattern};
pub use strategy::StrategySpec;
pub use task::{LogSetup, Task, TaskResult};
pub use validate::{clean_recipe, ParamRules, Validity};
pub use xml::Document;

/// How to execute the tasks of parallel strategies.
#[derive(Debug, Clone)]
pub struct ExecParams {
    /// Number of workers; negative values count back from the number of cpus.
    pub jobs: i32,
    /// Task `i` of a parallel strategy is seeded with `base_seed + i`.
    pub base_seed: Option<u64>,
    /// Applied by each worker before running a task.
    pub log: Option<LogSetup>,
}

/// Run every strategy against `dataset`, then assemble and clean the recipe.
pub fn generate_recipe(
    dataset: &Arc<dyn Dataset>,
    strategies: &[StrategySpec],
    exec: &ExecParams,
    rules: &ParamRules,
) -> Result<Recipe> {
    let mtypes = dataset.entity_types();

    log::info!("Execute strategies");
    let mut results = Vec::with_capacity(strategies.len());
    for strategy in strategies {
        let msg = format!("Executed strategy {}", strategy.name());
        let rules = util::timed(&msg, || strategy.run(dataset, exec))
            .with_context(|| format!("while executing strategy {}", strategy.name()))?;
        results.push(rules);
    }

    log::info!("Assemble the recipe");
    let mut recipe = init_recipe(mtypes, results.into_iter().flatten());

    log::info!("Clean the recipe");
    clean_recipe(&mut recipe, mtypes, rules);

    Ok(recipe)
}

/// Load a list of strategies from a YAML file.
pub fn load_strategies(path: &Path) -> Result<Vec<StrategySpec>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("while reading strategies file {:?}", path))?;
    strategy::parse_strategies(&text)
        .with_context(|| format!("while parsing strategies file {:?}", path))
}
