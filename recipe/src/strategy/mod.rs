use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::assemble::Rules;
use crate::dataset::Dataset;
use crate::engine::{run_parallel, run_sequential};
use crate::params::ParamMap;
use crate::task::Task;
use crate::ExecParams;

mod add_constraints;
mod estimate_bouton_reduction;
mod estimate_individual_bouton_reduction;
mod estimate_syns_con;
mod existing_recipe;
mod experimental_syns_con;
mod generalized_cv;
mod override_mtype;

pub use estimate_syns_con::EstimateSynsCon;
pub use existing_recipe::ExistingRecipe;
pub use experimental_syns_con::ExperimentalSynsCon;
pub use generalized_cv::GeneralizedCv;
pub use override_mtype::OverrideMtype;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Only one key can be specified for the strategy (found {0})")]
    KeyCount(usize),
    #[error("Strategy entry must be a map of strategy name to parameters")]
    NotAMap,
    #[error("Strategies must be a list")]
    NotAList,
    #[error("Invalid formula '{text}'")]
    Formula {
        text: String,
        #[source]
        source: formula::Error,
    },
    #[error("Bouton density table has no '*' row")]
    MissingGlobalDensity,
}

/// Reference value: a number, or a table to read it from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BioData {
    Value(f64),
    Table(PathBuf),
}

/// Where estimates come from: a table of precomputed values,
/// or sampling parameters for the dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Sample {
    Table(PathBuf),
    Params(SampleParams),
}

fn default_size() -> usize {
    100
}

fn default_syns_bouton() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleParams {
    #[serde(default = "default_size")]
    pub size: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default = "default_syns_bouton")]
    pub assume_syns_bouton: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post: Option<String>,
}

impl Default for SampleParams {
    fn default() -> Self {
        Self {
            size: default_size(),
            target: None,
            region: None,
            assume_syns_bouton: default_syns_bouton(),
            pre: None,
            post: None,
        }
    }
}

/// Parameters shared by both bouton reduction strategies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoutonReduction {
    pub bio_data: BioData,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample: Option<Sample>,
}

/// A configured strategy. In configuration files each one is a single-key
/// map from strategy name to its parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategySpec {
    AddConstraints(ParamMap),
    GeneralizedCv(GeneralizedCv),
    OverrideMtype(OverrideMtype),
    ExistingRecipe(ExistingRecipe),
    ExperimentalSynsCon(ExperimentalSynsCon),
    EstimateBoutonReduction(BoutonReduction),
    EstimateIndividualBoutonReduction(BoutonReduction),
    EstimateSynsCon(EstimateSynsCon),
}

impl StrategySpec {
    pub fn name(&self) -> &'static str {
        use StrategySpec::*;
        match self {
            AddConstraints(_) => "add_constraints",
            GeneralizedCv(_) => "generalized_cv",
            OverrideMtype(_) => "override_mtype",
            ExistingRecipe(_) => "existing_recipe",
            ExperimentalSynsCon(_) => "experimental_syns_con",
            EstimateBoutonReduction(_) => "estimate_bouton_reduction",
            EstimateIndividualBoutonReduction(_) => "estimate_individual_bouton_reduction",
            EstimateSynsCon(_) => "estimate_syns_con",
        }
    }

    /// Whether tasks run on the worker pool (seeded) or in order in this thread.
    pub fn is_parallel(&self) -> bool {
        use StrategySpec::*;
        matches!(
            self,
            EstimateBoutonReduction(_) | EstimateIndividualBoutonReduction(_) | EstimateSynsCon(_)
        )
    }

    /// Build the tasks for this strategy. Only reads dataset metadata and
    /// reference tables; sampling happens when the tasks run.
    pub fn prepare(&self, dataset: &Arc<dyn Dataset>) -> Result<Vec<Task<Rules>>> {
        use StrategySpec::*;
        let tasks = match self {
            AddConstraints(params) => add_constraints::prepare(params),
            GeneralizedCv(params) => params.prepare(),
            OverrideMtype(params) => params.prepare(dataset.as_ref()),
            ExistingRecipe(params) => params.prepare(),
            ExperimentalSynsCon(params) => params.prepare(dataset.as_ref()),
            EstimateBoutonReduction(params) => estimate_bouton_reduction::prepare(params, dataset)?,
            EstimateIndividualBoutonReduction(params) => {
                estimate_individual_bouton_reduction::prepare(params, dataset)?
            }
            EstimateSynsCon(params) => params.prepare(dataset)?,
        };
        Ok(tasks
            .into_iter()
            .map(|task| task.with_group(self.name()))
            .collect())
    }

    /// Prepare and execute this strategy, concatenating the task results in order.
    pub fn run(&self, dataset: &Arc<dyn Dataset>, exec: &ExecParams) -> Result<Rules> {
        let tasks = self.prepare(dataset)?;
        log::debug!("Strategy {} prepared {} tasks", self.name(), tasks.len());
        let results = if self.is_parallel() {
            run_parallel(tasks, exec.jobs, exec.base_seed, exec.log.as_ref())?
        } else {
            run_sequential(tasks)?
        };
        Ok(results.into_iter().flat_map(|res| res.value).collect())
    }

    /// Parameters of an `add_constraints` strategy.
    pub fn constraints(&self) -> Option<&ParamMap> {
        match self {
            Self::AddConstraints(params) => Some(params),
            _ => None,
        }
    }

    /// Parse one `{name: params}` entry.
    pub fn from_entry(entry: serde_json::Value) -> Result<Self> {
        match &entry {
            serde_json::Value::Object(map) if map.len() == 1 => Ok(serde_json::from_value(entry)?),
            serde_json::Value::Object(map) => Err(Error::KeyCount(map.len()).into()),
            _ => Err(Error::NotAMap.into()),
        }
    }
}

/// Parse a list of strategy entries from YAML text.
pub fn parse_strategies(text: &str) -> Result<Vec<StrategySpec>> {
    let value: serde_json::Value = serde_yaml::from_str(text)?;
    strategies_from_value(value)
}

/// Interpret an already loaded list of strategy entries.
pub fn strategies_from_value(value: serde_json::Value) -> Result<Vec<StrategySpec>> {
    match value {
        serde_json::Value::Array(entries) => entries.into_iter().map(StrategySpec::from_entry).collect(),
        _ => Err(Error::NotAList.into()),
    }
}

/// Render strategies back into their configuration form.
pub fn to_yaml(strategies: &[StrategySpec]) -> Result<String> {
    let value = serde_json::to_value(strategies)?;
    Ok(serde_yaml::to_string(&value)?)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::dataset::SummaryDataset;
    use crate::params::ParamValue;
    use crate::pathway::PathwayPattern;

    pub fn toy() -> Arc<dyn Dataset> {
        let text = "
name: toy
cells:
  - mtype: X_CHC
    synapse_class: INH
    bouton_density: [0.5]
  - mtype: Y_OTHER
    synapse_class: EXC
    bouton_density: [0.25]
connections:
  - from: X_CHC
    to: Y_OTHER
    synapse_count: [5.0]
  - from: Y_OTHER
    to: Y_OTHER
    synapse_count: [10.0]
";
        Arc::new(SummaryDataset::from_yaml_str(text).unwrap())
    }

    #[test]
    fn test_parse() -> Result<()> {
        let strategies = parse_strategies(
            "
- add_constraints:
    fromRegion: SSp
- generalized_cv:
    cv: 0.32
- override_mtype:
    mtype_pattern: CHC
    cv_syns_connection: 0.5
- estimate_syns_con:
    formula: 6 * ((n - 1) ** 0.5) - 1
    formula_ee: 1.5 * n
    max_value: 25
    sample:
      size: 1000
- estimate_bouton_reduction:
    bio_data: 0.2
    sample: densities.tsv
",
        )?;
        assert_eq!(5, strategies.len());
        assert_eq!(
            Some(&ParamValue::Text("SSp".into())),
            strategies[0].constraints().and_then(|c| c.get("fromRegion"))
        );
        assert_eq!(StrategySpec::GeneralizedCv(GeneralizedCv { cv: 0.32 }), strategies[1]);
        match &strategies[2] {
            StrategySpec::OverrideMtype(o) => {
                assert_eq!("CHC", o.mtype_pattern);
                assert_eq!(Some(&ParamValue::Number(0.5)), o.params.get("cv_syns_connection"));
            }
            other => panic!("unexpected {:?}", other),
        }
        match &strategies[3] {
            StrategySpec::EstimateSynsCon(e) => {
                assert_eq!(Some(25.0), e.max_value);
                assert_eq!(
                    Some(Sample::Params(SampleParams {
                        size: 1000,
                        ..Default::default()
                    })),
                    e.sample
                );
            }
            other => panic!("unexpected {:?}", other),
        }
        match &strategies[4] {
            StrategySpec::EstimateBoutonReduction(b) => {
                assert_eq!(BioData::Value(0.2), b.bio_data);
                assert_eq!(Some(Sample::Table("densities.tsv".into())), b.sample);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(strategies[3].is_parallel());
        assert!(!strategies[0].is_parallel());
        Ok(())
    }

    #[test]
    fn test_parse_errors() {
        let err = parse_strategies("- generalized_cv: {cv: 0.3}\n  add_constraints: {}\n").unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::KeyCount(2))));
        assert!(parse_strategies("- {}\n").is_err());
        assert!(parse_strategies("- unknown_strategy: {}\n").is_err());
        assert!(parse_strategies("- generalized_cv\n").is_err());
        assert!(parse_strategies("generalized_cv: {cv: 1}\n").is_err());
    }

    #[test]
    fn test_yaml_round_trip() -> Result<()> {
        let strategies = parse_strategies("- generalized_cv:\n    cv: 0.32\n")?;
        let yaml = to_yaml(&strategies)?;
        assert!(yaml.contains("generalized_cv"));
        assert_eq!(strategies, parse_strategies(&yaml)?);
        Ok(())
    }

    #[test]
    fn test_run_groups_and_order() -> Result<()> {
        let exec = ExecParams {
            jobs: 2,
            base_seed: Some(0),
            log: None,
        };
        let strategy = StrategySpec::GeneralizedCv(GeneralizedCv { cv: 0.1 });
        let tasks = strategy.prepare(&toy())?;
        assert_eq!(Some("generalized_cv"), tasks[0].group());
        let rules = strategy.run(&toy(), &exec)?;
        assert_eq!(vec![(PathwayPattern::any(), crate::params::single("cv_syns_connection", 0.1))], rules);
        Ok(())
    }
}
