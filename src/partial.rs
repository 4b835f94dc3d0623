use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use recipe::{LogSetup, ParamValue, StrategySpec};

use crate::fs::write_atomic;
use crate::generate::Generation;

/// Name of a partial recipe whose strategies add no constraints.
pub const MISSING_CONSTRAINTS: &str = "MISSING_CONSTRAINTS";

/// Computes and saves the recipe of one region.
///
/// The output path is derived from a checksum of the dataset, the strategies
/// and the seed, so an existing output means the work was already done.
/// Tasks are serialized to JSON to be handed to jobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialRecipeTask {
    pub strategies: Vec<StrategySpec>,
    /// Directory holding partial recipes.
    pub base_path: PathBuf,
    /// Canonical path of the dataset; its identity in the checksum.
    pub dataset: PathBuf,
    pub seed: u64,
    pub jobs: i32,
    pub log: LogSetup,
}

impl PartialRecipeTask {
    /// `key:value` pairs of every `add_constraints` parameter, sorted by key.
    pub fn name(&self) -> String {
        let mut params: BTreeMap<&str, &ParamValue> = BTreeMap::new();
        for constraints in self.strategies.iter().filter_map(StrategySpec::constraints) {
            for (k, v) in constraints {
                params.insert(k.as_str(), v);
            }
        }
        if params.is_empty() {
            return MISSING_CONSTRAINTS.to_owned();
        }
        params
            .iter()
            .map(|(k, v)| format!("{k}:{v}"))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Hex digest over what determines the recipe; `jobs` and `log` don't.
    pub fn checksum(&self) -> Result<String> {
        let identity = (self.dataset.to_string_lossy(), &self.strategies, self.seed);
        let canonical = serde_json::to_string(&identity)?;
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        Ok(format!("{:x}", hasher.finalize()))
    }

    /// `<base_path>/recipe_<name>_<checksum>.xml`, with the name url-encoded.
    pub fn output(&self) -> Result<PathBuf> {
        let file = format!("recipe_{}_{}.xml", quote_plus(&self.name()), self.checksum()?);
        Ok(self.base_path.join(file))
    }

    /// Whether the partial recipe was already generated and saved.
    pub fn complete(&self) -> Result<bool> {
        Ok(self.output()?.is_file())
    }

    /// Compute the partial recipe and save it. Configures logging for this process first.
    pub fn run(&self) -> Result<()> {
        self.log.apply();
        let output = self.output()?;
        log::info!(
            "Running partial task {:?}\nwith output {:?}\nand parameters:\n{}",
            self.name(),
            output,
            serde_json::to_string_pretty(self)?,
        );
        let generation = Generation {
            dataset: &self.dataset,
            strategies: &self.strategies,
            seed: self.seed,
            jobs: self.jobs,
            log: self.log,
        };
        generation.write(&output)?;
        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_atomic(path, &serde_json::to_string_pretty(self)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("while reading task file {:?}", path))?;
        serde_json::from_str(&text).with_context(|| format!("while parsing task file {:?}", path))
    }
}

/// Form-urlencode a partial recipe name; spaces become `+`.
fn quote_plus(s: &str) -> String {
    url::form_urlencoded::byte_serialize(s.as_bytes()).collect()
}
