//! Mean number of synapses per connection for the pathways where it
//! has been determined experimentally.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::assemble::Rules;
use crate::bio_data::SynapseCountTable;
use crate::dataset::Dataset;
use crate::params::{single, MEAN_SYNS_CONNECTION};
use crate::pathway::PathwayPattern;
use crate::task::Task;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentalSynsCon {
    /// Table with `from to mean` columns.
    pub bio_data: PathBuf,
}

impl ExperimentalSynsCon {
    pub fn prepare(&self, dataset: &dyn Dataset) -> Vec<Task<Rules>> {
        let path = self.bio_data.clone();
        let mtypes = dataset.entity_types().to_vec();
        vec![Task::new(move |_| {
            let mut table = SynapseCountTable::load(&path)?;
            table.retain_known(&mtypes);
            Ok(table
                .rows
                .into_iter()
                .map(|(from, to, mean)| {
                    (
                        PathwayPattern::new(from.as_str(), to.as_str()),
                        single(MEAN_SYNS_CONNECTION, mean),
                    )
                })
                .collect())
        })]
    }
}
