//! One overall bouton reduction factor, from the mean bouton density
//! over all mtypes. Variability between mtypes is not taken into account.

use std::sync::Arc;

use anyhow::Result;

use super::{BioData, BoutonReduction, Error, Sample, SampleParams};
use crate::assemble::Rules;
use crate::bio_data::BoutonDensityTable;
use crate::dataset::{nan_mean, BoutonQuery, Dataset};
use crate::params::{single, BOUTON_REDUCTION_FACTOR};
use crate::pathway::PathwayPattern;
use crate::task::Task;

fn global_density(table: &BoutonDensityTable) -> Result<f64, Error> {
    table.global().ok_or(Error::MissingGlobalDensity)
}

pub fn prepare(params: &BoutonReduction, dataset: &Arc<dyn Dataset>) -> Result<Vec<Task<Rules>>> {
    let ref_value = match &params.bio_data {
        BioData::Value(v) => *v,
        BioData::Table(path) => global_density(&BoutonDensityTable::load(path)?)?,
    };

    // a table sample is read here; otherwise the task samples the dataset:
    let table_value = match &params.sample {
        Some(Sample::Table(path)) => Some(global_density(&BoutonDensityTable::load(path)?)?),
        _ => None,
    };
    let sample = match &params.sample {
        Some(Sample::Params(sample)) => sample.clone(),
        _ => SampleParams::default(),
    };
    let dataset = dataset.clone();

    Ok(vec![Task::new(move |rng| {
        let value = match table_value {
            Some(v) => v,
            None => {
                let query = BoutonQuery {
                    size: sample.size,
                    mtype: None,
                    target: sample.target,
                    region: sample.region,
                    synapses_per_bouton: sample.assume_syns_bouton,
                };
                nan_mean(&dataset.sample_bouton_density(&query, rng))
            }
        };
        if value.is_nan() {
            log::warn!("Could not estimate bouton density, skipping");
            return Ok(Vec::new());
        }
        log::debug!("Bouton density estimate: {value:.3}");
        Ok(vec![(
            PathwayPattern::any(),
            single(BOUTON_REDUCTION_FACTOR, ref_value / value),
        )])
    })])
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::strategy::test::toy;

    fn run(params: &BoutonReduction) -> Result<Rules> {
        let mut tasks = prepare(params, &toy())?;
        assert_eq!(1, tasks.len());
        Ok(tasks.remove(0).run(0, Some(1), None)?.value)
    }

    #[test]
    fn test_sampled() -> Result<()> {
        // toy densities are 0.5 and 0.25, region selects nothing:
        let params = BoutonReduction {
            bio_data: BioData::Value(0.5),
            sample: Some(Sample::Params(SampleParams {
                region: Some("nowhere".to_owned()),
                ..Default::default()
            })),
        };
        assert!(run(&params)?.is_empty());

        let params = BoutonReduction {
            bio_data: BioData::Value(1.0),
            sample: None,
        };
        let rules = run(&params)?;
        assert_eq!(1, rules.len());
        let factor = rules[0].1[BOUTON_REDUCTION_FACTOR].as_number().unwrap();
        assert!((2.0..=4.0).contains(&factor), "factor {factor}");
        Ok(())
    }

    #[test]
    fn test_tables() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let bio = dir.path().join("bio.tsv");
        let sample = dir.path().join("sample.tsv");
        std::fs::write(&bio, "mtype mean\n* 0.3\nX_CHC 0.1\n")?;
        std::fs::write(&sample, "mtype mean\n* 0.6\n")?;
        let params = BoutonReduction {
            bio_data: BioData::Table(bio),
            sample: Some(Sample::Table(sample)),
        };
        assert_eq!(
            vec![(PathwayPattern::any(), single(BOUTON_REDUCTION_FACTOR, 0.5))],
            run(&params)?
        );
        Ok(())
    }

    #[test]
    fn test_missing_global_row() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let bio = dir.path().join("bio.tsv");
        std::fs::write(&bio, "mtype mean\nX_CHC 0.1\n")?;
        let params = BoutonReduction {
            bio_data: BioData::Table(bio),
            sample: None,
        };
        assert!(prepare(&params, &toy()).is_err());
        Ok(())
    }
}
