//! A bouton reduction factor for each mtype, from the mean bouton density
//! of that mtype. With a single reference value, it is used for all mtypes.

use std::sync::Arc;

use anyhow::Result;

use super::{BioData, BoutonReduction, Sample, SampleParams};
use crate::assemble::Rules;
use crate::bio_data::BoutonDensityTable;
use crate::dataset::{nan_mean, BoutonQuery, Dataset};
use crate::params::{single, BOUTON_REDUCTION_FACTOR};
use crate::pathway::{Pattern, PathwayPattern};
use crate::task::Task;

/// One task per mtype with a reference value.
pub fn prepare(params: &BoutonReduction, dataset: &Arc<dyn Dataset>) -> Result<Vec<Task<Rules>>> {
    let mtypes = dataset.entity_types();
    let refs: Vec<(String, f64)> = match &params.bio_data {
        BioData::Value(v) => mtypes.iter().map(|m| (m.clone(), *v)).collect(),
        BioData::Table(path) => {
            let mut table = BoutonDensityTable::load(path)?;
            table.retain_known(mtypes);
            table.rows
        }
    };

    let table = match &params.sample {
        Some(Sample::Table(path)) => Some(BoutonDensityTable::load(path)?),
        _ => None,
    };
    let sample = match &params.sample {
        Some(Sample::Params(sample)) => sample.clone(),
        _ => SampleParams::default(),
    };

    let mut tasks = Vec::with_capacity(refs.len());
    for (mtype, ref_value) in refs {
        // table lookups are resolved now; dataset sampling is left to the task:
        let table_value = table
            .as_ref()
            .map(|t| t.get(&mtype).unwrap_or(f64::NAN));
        let sample = sample.clone();
        let dataset = dataset.clone();
        tasks.push(Task::new(move |rng| {
            let value = match table_value {
                Some(v) => v,
                None => {
                    let query = BoutonQuery {
                        size: sample.size,
                        mtype: Some(mtype.clone()),
                        target: sample.target,
                        region: sample.region,
                        synapses_per_bouton: sample.assume_syns_bouton,
                    };
                    nan_mean(&dataset.sample_bouton_density(&query, rng))
                }
            };
            if value.is_nan() {
                log::warn!("Could not estimate '{mtype}' bouton density, skipping");
                return Ok(Vec::new());
            }
            log::debug!("Bouton density estimate for '{mtype}': {value:.3}");
            Ok(vec![(
                PathwayPattern::new(Pattern::Id(mtype), Pattern::Any),
                single(BOUTON_REDUCTION_FACTOR, ref_value / value),
            )])
        }));
    }
    Ok(tasks)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::engine::run_parallel;
    use crate::strategy::test::toy;

    fn run(params: &BoutonReduction) -> Result<Rules> {
        let tasks = prepare(params, &toy())?;
        Ok(run_parallel(tasks, 2, Some(0), None)?
            .into_iter()
            .flat_map(|r| r.value)
            .collect())
    }

    #[test]
    fn test_single_reference_value() -> Result<()> {
        // toy dataset: X_CHC always 0.5, Y_OTHER always 0.25.
        let params = BoutonReduction {
            bio_data: BioData::Value(1.0),
            sample: None,
        };
        assert_eq!(
            vec![
                (PathwayPattern::new("X_CHC", "*"), single(BOUTON_REDUCTION_FACTOR, 2.0)),
                (PathwayPattern::new("Y_OTHER", "*"), single(BOUTON_REDUCTION_FACTOR, 4.0)),
            ],
            run(&params)?
        );
        Ok(())
    }

    #[test]
    fn test_tables_skip_unknown_and_missing() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let bio = dir.path().join("bio.tsv");
        let sample = dir.path().join("sample.tsv");
        std::fs::write(&bio, "mtype mean\nX_CHC 0.2\nY_OTHER 0.3\nL6_XYZ 1.0\n")?;
        std::fs::write(&sample, "mtype mean\nX_CHC 0.4\n")?;
        let params = BoutonReduction {
            bio_data: BioData::Table(bio),
            sample: Some(Sample::Table(sample)),
        };
        // L6_XYZ is unknown, Y_OTHER has no estimate:
        assert_eq!(
            vec![(PathwayPattern::new("X_CHC", "*"), single(BOUTON_REDUCTION_FACTOR, 0.5))],
            run(&params)?
        );
        Ok(())
    }

    #[test]
    fn test_sampling_with_syns_per_bouton() -> Result<()> {
        let params = BoutonReduction {
            bio_data: BioData::Value(1.0),
            sample: Some(Sample::Params(SampleParams {
                size: 10,
                assume_syns_bouton: 2.0,
                ..Default::default()
            })),
        };
        let rules = run(&params)?;
        assert_eq!(Some(4.0), rules[0].1[BOUTON_REDUCTION_FACTOR].as_number());
        assert_eq!(Some(8.0), rules[1].1[BOUTON_REDUCTION_FACTOR].as_number());
        Ok(())
    }
}
