//! Functional mean number of synapses per connection, predicted from the
//! structural number of appositions per connection `n` by a formula.
//! Each synapse class pairing can use its own formula.

use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use formula::Expression;

use super::{Error, Sample, SampleParams};
use crate::assemble::Rules;
use crate::bio_data::SynapseCountTable;
use crate::dataset::{nan_mean, Dataset, PathwayQuery, SynapseClass};
use crate::params::{single, MEAN_SYNS_CONNECTION};
use crate::pathway::PathwayPattern;
use crate::task::Task;

/// Formulas may only use this variable.
const VAR: &str = "n";

/// Smallest value a prediction can take.
const FLOOR: f64 = 1.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimateSynsCon {
    pub formula: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula_ee: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula_ei: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula_ie: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula_ii: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample: Option<Sample>,
}

fn compile(text: &str) -> Result<Arc<Expression>, Error> {
    let to_err = |source| Error::Formula {
        text: text.to_owned(),
        source,
    };
    let expr = Expression::parse(text).map_err(to_err)?;
    expr.check_names(&[VAR]).map_err(to_err)?;
    Ok(Arc::new(expr))
}

/// Compiled formulas, by synapse class of the pre and post mtypes.
struct Formulas {
    default: Arc<Expression>,
    custom: Vec<((SynapseClass, SynapseClass), Arc<Expression>)>,
}

impl Formulas {
    fn compile(params: &EstimateSynsCon) -> Result<Self, Error> {
        use SynapseClass::*;
        let mut custom = Vec::with_capacity(4);
        for (classes, text) in [
            ((Exc, Exc), &params.formula_ee),
            ((Exc, Inh), &params.formula_ei),
            ((Inh, Exc), &params.formula_ie),
            ((Inh, Inh), &params.formula_ii),
        ] {
            if let Some(text) = text {
                custom.push((classes, compile(text)?));
            }
        }
        Ok(Self {
            default: compile(&params.formula)?,
            custom,
        })
    }

    fn choose(&self, pre: Option<SynapseClass>, post: Option<SynapseClass>) -> Arc<Expression> {
        if let (Some(pre), Some(post)) = (pre, post) {
            if let Some((_, expr)) = self.custom.iter().find(|(classes, _)| *classes == (pre, post)) {
                return expr.clone();
            }
        }
        self.default.clone()
    }
}

/// Apply `expr` to the estimate `n`: NaN results become the floor value,
/// and results are capped at `max_value` when given.
fn predict(expr: &Expression, n: f64, max_value: Option<f64>) -> Result<f64, formula::Error> {
    let value = expr.eval(&[(VAR, n)])?.max(FLOOR);
    Ok(match max_value {
        Some(max) => value.min(max),
        None => value,
    })
}

impl EstimateSynsCon {
    /// One task per pathway of `mtypes × mtypes`.
    pub fn prepare(&self, dataset: &Arc<dyn Dataset>) -> Result<Vec<Task<Rules>>> {
        let formulas = Formulas::compile(self)?;
        let mtypes = dataset.entity_types();

        let table = match &self.sample {
            Some(Sample::Table(path)) => Some(SynapseCountTable::load(path)?),
            _ => None,
        };
        let sample = match &self.sample {
            Some(Sample::Params(sample)) => sample.clone(),
            _ => SampleParams::default(),
        };

        let mut tasks = Vec::with_capacity(mtypes.len() * mtypes.len());
        for pre in mtypes {
            for post in mtypes {
                let expr = formulas.choose(dataset.synapse_class(pre), dataset.synapse_class(post));
                let table_value = table
                    .as_ref()
                    .map(|t| t.get(pre, post).unwrap_or(f64::NAN));
                let query = PathwayQuery {
                    size: sample.size,
                    pre_mtype: pre.clone(),
                    post_mtype: post.clone(),
                    pre_target: sample.pre.clone(),
                    post_target: sample.post.clone(),
                };
                let max_value = self.max_value;
                let dataset = dataset.clone();
                tasks.push(Task::new(move |rng| {
                    let n = match table_value {
                        Some(v) => v,
                        None => nan_mean(&dataset.sample_synapse_count(&query, rng)),
                    };
                    let (pre, post) = (query.pre_mtype, query.post_mtype);
                    if n.is_nan() {
                        log::warn!("Could not estimate ({pre}, {post}) nsyn, skipping");
                        return Ok(Vec::new());
                    }
                    log::debug!("nsyn estimate for pathway ({pre}, {post}): {n:.3}");
                    let value = predict(&expr, n, max_value)?;
                    Ok(vec![(
                        PathwayPattern::new(pre.as_str(), post.as_str()),
                        single(MEAN_SYNS_CONNECTION, value),
                    )])
                }));
            }
        }
        Ok(tasks)
    }
}
