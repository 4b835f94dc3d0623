//! A single coefficient of variation of the number of synapses
//! per connection, for all pathways.

use serde::{Deserialize, Serialize};

use crate::assemble::Rules;
use crate::params::{single, CV_SYNS_CONNECTION};
use crate::pathway::PathwayPattern;
use crate::task::Task;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneralizedCv {
    pub cv: f64,
}

impl GeneralizedCv {
    pub fn prepare(&self) -> Vec<Task<Rules>> {
        let cv = self.cv;
        vec![Task::new(move |_| {
            Ok(vec![(PathwayPattern::any(), single(CV_SYNS_CONNECTION, cv))])
        })]
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_generalized_cv() -> anyhow::Result<()> {
        let rules = GeneralizedCv { cv: 0.32 }.prepare().remove(0).run(0, None, None)?.value;
        assert_eq!(vec![(PathwayPattern::any(), single(CV_SYNS_CONNECTION, 0.32))], rules);
        Ok(())
    }
}
