use std::path::Path;

use anyhow::{Context, Result};

use recipe::strategy::to_yaml;
use recipe::{Document, ExecParams, LogSetup, ParamRules, Recipe, StrategySpec};

use crate::fs::write_atomic;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// One recipe, computed in this process.
#[derive(Debug, Clone)]
pub struct Generation<'a> {
    pub dataset: &'a Path,
    pub strategies: &'a [StrategySpec],
    pub seed: u64,
    pub jobs: i32,
    pub log: LogSetup,
}

impl Generation<'_> {
    /// Open the dataset and compute the cleaned recipe.
    pub fn recipe(&self) -> Result<Recipe> {
        let dataset = recipe::dataset::open(self.dataset)?;
        log::info!(
            "Dataset {} has {} mtypes",
            dataset.identity(),
            dataset.entity_types().len()
        );
        let exec = ExecParams {
            jobs: self.jobs,
            base_seed: Some(self.seed),
            log: Some(self.log),
        };
        recipe::generate_recipe(&dataset, self.strategies, &exec, &ParamRules::default())
    }

    /// Comment identifying what a recipe was generated from.
    pub fn provenance(&self) -> Result<String> {
        Ok(format!(
            "\nGenerated by s2f-recipe=={VERSION}\nfrom dataset {}\nusing strategies (seed={}):\n{}",
            self.dataset.display(),
            self.seed,
            to_yaml(self.strategies)?,
        ))
    }

    /// Compute the recipe and write it to `output` in one step.
    pub fn write(&self, output: &Path) -> Result<usize> {
        let recipe = self.recipe()?;
        let doc = Document::from_recipe(&recipe, Some(self.provenance()?));
        log::info!("Writing {} pathways to {:?}", recipe.len(), output);
        write_atomic(output, &doc.render())
            .with_context(|| format!("while writing recipe {:?}", output))?;
        Ok(recipe.len())
    }
}
