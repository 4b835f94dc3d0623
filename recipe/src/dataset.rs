use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};

use util::HashMap;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Dataset defines no cells")]
    NoCells,
    #[error("Mtype '{0}' is defined with more than one synapse class")]
    ConflictingSynapseClass(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SynapseClass {
    #[serde(rename = "EXC")]
    Exc,
    #[serde(rename = "INH")]
    Inh,
}

/// Select cells to sample bouton densities from.
#[derive(Debug, Clone, PartialEq)]
pub struct BoutonQuery {
    pub size: usize,
    pub mtype: Option<String>,
    pub target: Option<String>,
    pub region: Option<String>,
    pub synapses_per_bouton: f64,
}

/// Select connections to sample synapse counts from.
#[derive(Debug, Clone, PartialEq)]
pub struct PathwayQuery {
    pub size: usize,
    pub pre_mtype: String,
    pub post_mtype: String,
    pub pre_target: Option<String>,
    pub post_target: Option<String>,
}

/// Read-only access to the data recipes are computed from.
///
/// Handles are shared between worker threads, so sampling takes its random
/// source as an argument rather than owning one.
pub trait Dataset: Send + Sync {
    /// Stable identifier of this dataset, used in cache checksums.
    fn identity(&self) -> &str;

    /// All entity types, sorted and unique.
    fn entity_types(&self) -> &[String];

    fn synapse_class(&self, mtype: &str) -> Option<SynapseClass>;

    /// Draw up to `query.size` bouton density values. Empty if nothing matches.
    fn sample_bouton_density(&self, query: &BoutonQuery, rng: &mut StdRng) -> Vec<f64>;

    /// Draw up to `query.size` synapse-per-connection counts. Empty if nothing matches.
    fn sample_synapse_count(&self, query: &PathwayQuery, rng: &mut StdRng) -> Vec<f64>;
}

/// Mean of the non-NaN values; NaN if there are none.
pub fn nan_mean(values: &[f64]) -> f64 {
    let (sum, count) = values
        .iter()
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        f64::NAN
    } else {
        sum / count as f64
    }
}

#[derive(Debug, Deserialize)]
struct CellGroup {
    mtype: String,
    synapse_class: SynapseClass,
    #[serde(default)]
    targets: Vec<String>,
    #[serde(default)]
    regions: Vec<String>,
    #[serde(default)]
    bouton_density: Vec<f64>,
}

#[derive(Debug, Deserialize)]
struct ConnectionGroup {
    from: String,
    to: String,
    #[serde(default)]
    synapse_count: Vec<f64>,
}

#[derive(Debug, Deserialize)]
struct SummaryFile {
    name: Option<String>,
    cells: Vec<CellGroup>,
    #[serde(default)]
    connections: Vec<ConnectionGroup>,
}

/// A dataset summarized as pools of observations per cell group and per
/// pathway, loaded from YAML:
///
/// ```yaml
/// name: toy
/// cells:
///   - mtype: L5_TPC
///     synapse_class: EXC
///     targets: [Mosaic]
///     regions: [SSp]
///     bouton_density: [0.18, 0.21]
/// connections:
///   - from: L5_TPC
///     to: L5_TPC
///     synapse_count: [3, 5, 4]
/// ```
#[derive(Debug)]
pub struct SummaryDataset {
    identity: String,
    mtypes: Vec<String>,
    classes: HashMap<String, SynapseClass>,
    cells: Vec<CellGroup>,
    connections: HashMap<(String, String), Vec<f64>>,
}

impl SummaryDataset {
    /// Load from a YAML file; the canonical path is the dataset identity.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("while reading dataset {:?}", path))?;
        let file: SummaryFile = serde_yaml::from_str(&text)
            .with_context(|| format!("while parsing dataset {:?}", path))?;
        let identity = path.canonicalize()?.to_string_lossy().into_owned();
        Ok(Self::build(identity, file)?)
    }

    /// Parse from YAML text; the `name` field is the dataset identity.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let file: SummaryFile = serde_yaml::from_str(text)?;
        let identity = file.name.clone().unwrap_or_default();
        Ok(Self::build(identity, file)?)
    }

    fn build(identity: String, file: SummaryFile) -> Result<Self, Error> {
        if file.cells.is_empty() {
            return Err(Error::NoCells);
        }
        let mut classes = HashMap::default();
        for cell in &file.cells {
            match classes.get(&cell.mtype) {
                Some(class) if *class != cell.synapse_class => {
                    return Err(Error::ConflictingSynapseClass(cell.mtype.clone()));
                }
                Some(_) => (),
                None => {
                    classes.insert(cell.mtype.clone(), cell.synapse_class);
                }
            }
        }
        let mtypes: BTreeSet<String> = classes.keys().cloned().collect();

        let mut connections: HashMap<(String, String), Vec<f64>> = HashMap::default();
        for conn in file.connections {
            connections
                .entry((conn.from, conn.to))
                .or_default()
                .extend(conn.synapse_count);
        }

        Ok(Self {
            identity,
            mtypes: mtypes.into_iter().collect(),
            classes,
            cells: file.cells,
            connections,
        })
    }

    fn has_target(&self, mtype: &str, target: &Option<String>) -> bool {
        match target {
            None => true,
            Some(target) => self
                .cells
                .iter()
                .any(|c| c.mtype == mtype && c.targets.contains(target)),
        }
    }
}

fn draw(pool: &[f64], size: usize, rng: &mut StdRng) -> Vec<f64> {
    if pool.is_empty() {
        return Vec::new();
    }
    (0..size).filter_map(|_| pool.choose(rng).copied()).collect()
}

impl Dataset for SummaryDataset {
    fn identity(&self) -> &str {
        &self.identity
    }

    fn entity_types(&self) -> &[String] {
        &self.mtypes
    }

    fn synapse_class(&self, mtype: &str) -> Option<SynapseClass> {
        self.classes.get(mtype).copied()
    }

    fn sample_bouton_density(&self, query: &BoutonQuery, rng: &mut StdRng) -> Vec<f64> {
        let matches = |c: &&CellGroup| {
            query.mtype.as_ref().map_or(true, |m| &c.mtype == m)
                && query.target.as_ref().map_or(true, |t| c.targets.contains(t))
                && query.region.as_ref().map_or(true, |r| c.regions.contains(r))
        };
        let pool: Vec<f64> = self
            .cells
            .iter()
            .filter(matches)
            .flat_map(|c| c.bouton_density.iter().copied())
            .collect();
        draw(&pool, query.size, rng)
            .into_iter()
            .map(|v| v / query.synapses_per_bouton)
            .collect()
    }

    fn sample_synapse_count(&self, query: &PathwayQuery, rng: &mut StdRng) -> Vec<f64> {
        if !self.has_target(&query.pre_mtype, &query.pre_target)
            || !self.has_target(&query.post_mtype, &query.post_target)
        {
            return Vec::new();
        }
        let key = (query.pre_mtype.clone(), query.post_mtype.clone());
        match self.connections.get(&key) {
            Some(pool) => draw(pool, query.size, rng),
            None => Vec::new(),
        }
    }
}

/// Open the dataset at `path`.
pub fn open(path: &Path) -> Result<Arc<dyn Dataset>> {
    Ok(Arc::new(SummaryDataset::load(path)?))
}
