//! Override parameters for pathways starting from a subset of mtypes.
//! Meant to come last, e.g. for chandelier cells whose single touch
//! stands for a train of synapses.

use serde::{Deserialize, Serialize};

use crate::assemble::Rules;
use crate::dataset::Dataset;
use crate::params::ParamMap;
use crate::pathway::{Pattern, PathwayPattern};
use crate::task::Task;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverrideMtype {
    /// Substring an mtype must contain to be overridden.
    pub mtype_pattern: String,
    #[serde(flatten)]
    pub params: ParamMap,
}

impl OverrideMtype {
    pub fn prepare(&self, dataset: &dyn Dataset) -> Vec<Task<Rules>> {
        let mtypes: Vec<String> = dataset
            .entity_types()
            .iter()
            .filter(|m| m.contains(&self.mtype_pattern))
            .cloned()
            .collect();
        let params = self.params.clone();
        vec![Task::new(move |_| {
            Ok(mtypes
                .into_iter()
                .map(|m| (PathwayPattern::new(Pattern::Id(m), Pattern::Any), params.clone()))
                .collect())
        })]
    }
}
