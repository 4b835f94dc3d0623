use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use recipe::strategy::strategies_from_value;
use recipe::{Document, LogSetup, StrategySpec};

use crate::exec::{self, ExecutorConfig};
use crate::fs::{write_atomic, Fs};
use crate::generate::VERSION;
use crate::partial::PartialRecipeTask;
use crate::ui::Ui;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Merge config has no 'regions' list")]
    NoRegions,
    #[error("Region {0} has no 'strategies' list")]
    NoStrategies(usize),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub strategies: Vec<StrategySpec>,
}

/// Strategies of every region, in merge order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeConfig {
    pub regions: Vec<Region>,
}

impl MergeConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let value: serde_json::Value = serde_yaml::from_str(text)?;
        let regions = value
            .get("regions")
            .and_then(serde_json::Value::as_array)
            .ok_or(Error::NoRegions)?;
        let mut result = Vec::with_capacity(regions.len());
        for (i, region) in regions.iter().enumerate() {
            let strategies = region.get("strategies").ok_or(Error::NoStrategies(i))?;
            let strategies = strategies_from_value(strategies.clone())
                .with_context(|| format!("while reading strategies of region {i}"))?;
            result.push(Region { strategies });
        }
        Ok(Self { regions: result })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("while reading merge config {:?}", path))?;
        Self::from_yaml_str(&text).with_context(|| format!("while parsing merge config {:?}", path))
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(&serde_json::to_value(self)?)?)
    }
}

/// Computes the partial recipe of every region through the executor,
/// reusing the ones already on disk, then merges them into `output`.
#[derive(Debug, Clone)]
pub struct FullRecipeTask {
    pub config: MergeConfig,
    pub executor: ExecutorConfig,
    pub dataset: PathBuf,
    pub workdir: PathBuf,
    pub output: PathBuf,
    pub seed: u64,
    pub jobs: i32,
    pub log: LogSetup,
}

impl FullRecipeTask {
    /// One task per region; they all share the seed.
    pub fn partial_tasks(&self, recipes_dir: &Path) -> Vec<PartialRecipeTask> {
        self.config
            .regions
            .iter()
            .map(|region| PartialRecipeTask {
                strategies: region.strategies.clone(),
                base_path: recipes_dir.to_path_buf(),
                dataset: self.dataset.clone(),
                seed: self.seed,
                jobs: self.jobs,
                log: self.log,
            })
            .collect()
    }

    pub fn run(&self, ui: &mut Ui) -> Result<()> {
        let mut fs = Fs::new(&self.workdir);
        fs.ensure_workdir_exists(ui.verbose)?;
        let _lock = fs.lock()?;
        let recipes = fs.recipes_dir();
        log::info!("Recipes folder: {:?}", recipes);
        fs.create_dir(&recipes)?;

        let all_tasks = self.partial_tasks(&recipes);
        let mut pending = Vec::with_capacity(all_tasks.len());
        for task in &all_tasks {
            if !task.complete()? {
                pending.push(task.clone());
            }
        }
        let msg = format!(
            "Recipes already calculated: {}/{}",
            all_tasks.len() - pending.len(),
            all_tasks.len()
        );
        log::info!("{msg}");
        ui.verbose_msg(&msg);

        if !pending.is_empty() {
            let timestamp = chrono::Local::now().format("%Y%m%dT%H%M%S").to_string();
            let folder = fs.log_folder(&timestamp);
            log::info!("Log folder: {:?}", folder);
            ui.verbose_progress(&format!("Running {} jobs", pending.len()));
            ui.start_timer();
            let failures = exec::execute_pending_tasks(&pending, &self.executor, &folder, &fs)?;
            if failures > 0 {
                ui.failure("Some jobs didn't complete successfully, exiting.");
                return Err(exec::Error::JobsFailed(failures).into());
            }
            ui.done();
            ui.print_elapsed("Running jobs");
        }

        self.merge(&all_tasks)
    }

    /// Comment identifying what the merged recipe was generated from.
    fn provenance(&self) -> Result<String> {
        Ok(format!(
            "\nGenerated by s2f-recipe=={VERSION}\nfrom dataset {}\nusing strategies (seed={}):\n{}",
            self.dataset.display(),
            self.seed,
            self.config.to_yaml()?,
        ))
    }

    /// Concatenate the rules of every partial recipe, in task order.
    pub fn merge(&self, tasks: &[PartialRecipeTask]) -> Result<()> {
        let mut listing = Vec::with_capacity(tasks.len());
        let mut merged = Document {
            comment: Some(self.provenance()?),
            rules: Vec::new(),
        };
        for (n, task) in tasks.iter().enumerate() {
            let output = task.output()?;
            listing.push(format!("{}: {} [{:?}]", n + 1, task.name(), output));
            let partial = Document::load(&output)?;
            merged.rules.extend(partial.rules);
        }
        log::info!("Merging {} recipes:\n{}", tasks.len(), listing.join("\n"));

        log::info!("Writing {:?}", self.output);
        write_atomic(&self.output, &merged.render())
            .with_context(|| format!("while writing merged recipe {:?}", self.output))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::exec::Cluster;
    use crate::settings::Settings;

    const MERGE_CONFIG: &str = "
regions:
  - strategies:
      - add_constraints:
          fromRegion: SSp
          bouton_reduction_factor: 1.0
          mean_syns_connection: 3.0
      - generalized_cv:
          cv: 0.32
  - strategies:
      - add_constraints:
          fromRegion: MOp
          bouton_reduction_factor: 2.0
          mean_syns_connection: 4.0
      - generalized_cv:
          cv: 0.5
";

    const DATASET: &str = "
name: toy
cells:
  - mtype: L4_CHC
    synapse_class: INH
  - mtype: L5_TPC
    synapse_class: EXC
";

    fn ui() -> Ui {
        let settings = Settings {
            verbose: 0,
            action: crate::settings::Action::Clean {
                workdir: PathBuf::new(),
            },
        };
        Ui::new(&settings)
    }

    fn task(dir: &Path) -> Result<FullRecipeTask> {
        let dataset = dir.join("dataset.yaml");
        std::fs::write(&dataset, DATASET)?;
        Ok(FullRecipeTask {
            config: MergeConfig::from_yaml_str(MERGE_CONFIG)?,
            executor: ExecutorConfig {
                cluster: Cluster::Debug,
                poll_interval: 0.0,
                ..Default::default()
            },
            dataset,
            workdir: dir.join("work"),
            output: dir.join("out.xml"),
            seed: 0,
            jobs: 1,
            log: LogSetup::new(0),
        })
    }

    #[test]
    fn test_merge_config() -> Result<()> {
        let config = MergeConfig::from_yaml_str(MERGE_CONFIG)?;
        assert_eq!(2, config.regions.len());
        assert_eq!(2, config.regions[1].strategies.len());
        assert!(config.to_yaml()?.contains("fromRegion: MOp"));

        assert!(MergeConfig::from_yaml_str("regions: {}\n").is_err());
        assert!(MergeConfig::from_yaml_str("regions:\n  - {}\n").is_err());
        assert!(MergeConfig::from_yaml_str("regions:\n  - strategies:\n    - {a: 1, b: 2}\n").is_err());
        Ok(())
    }

    #[test]
    fn test_run_and_reuse() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let task = task(dir.path())?;
        task.run(&mut ui())?;

        let doc = Document::load(&task.output)?;
        assert_eq!(8, doc.rules.len());
        let region = |i: usize| {
            doc.rules[i]
                .attrs
                .iter()
                .find(|(k, _)| k == "fromRegion")
                .map(|(_, v)| v.clone())
        };
        // regions in config order:
        assert_eq!(Some("SSp".to_owned()), region(0));
        assert_eq!(Some("MOp".to_owned()), region(7));
        let comment = doc.comment.clone().unwrap_or_default();
        assert!(comment.contains("using strategies (seed=0):"));

        // partials are cached; the dataset is no longer needed:
        std::fs::remove_file(&task.dataset)?;
        std::fs::remove_file(&task.output)?;
        task.run(&mut ui())?;
        assert_eq!(doc, Document::load(&task.output)?);
        Ok(())
    }

    #[test]
    fn test_failed_job_leaves_no_output() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut task = task(dir.path())?;
        task.dataset = dir.path().join("missing.yaml");
        let err = task.run(&mut ui()).unwrap_err();
        assert!(matches!(err.downcast_ref::<exec::Error>(), Some(exec::Error::JobsFailed(2))));
        assert!(!task.output.exists());
        Ok(())
    }

    #[test]
    fn test_failed_job_keeps_existing_output() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut task = task(dir.path())?;
        // the second region's formula can't be compiled:
        let config = MERGE_CONFIG.replace(
            "cv: 0.5",
            "cv: 0.5\n      - estimate_syns_con:\n          formula: open(n)",
        );
        task.config = MergeConfig::from_yaml_str(&config)?;
        let previous = b"<ConnectionRules/>\n".to_vec();
        std::fs::write(&task.output, &previous)?;

        let err = task.run(&mut ui()).unwrap_err();
        assert!(matches!(err.downcast_ref::<exec::Error>(), Some(exec::Error::JobsFailed(1))));
        assert_eq!(previous, std::fs::read(&task.output)?);
        // the successful region is kept for the next run, and the lock released:
        let partials = task.partial_tasks(&dir.path().join("work").join("recipes"));
        assert!(partials[0].complete()?);
        assert!(!partials[1].complete()?);
        assert!(!dir.path().join("work").join(".lock").exists());
        Ok(())
    }

    #[test]
    fn test_locked_workdir() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let task = task(dir.path())?;
        std::fs::create_dir_all(&task.workdir)?;
        std::fs::write(task.workdir.join(".lock"), "1\n")?;
        let err = task.run(&mut ui()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<crate::fs::Error>(),
            Some(crate::fs::Error::Locked(_))
        ));
        assert!(!task.output.exists());
        Ok(())
    }

    #[test]
    fn test_merge_keeps_task_order() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let task = task(dir.path())?;
        let partials = task.partial_tasks(dir.path());
        let rule = |from: &str| {
            format!("<?xml version='1.0' encoding='UTF-8'?>\n<ConnectionRules>\n  <rule fromMType=\"{from}\" toMType=\"B\" x=\"1.000\"/>\n</ConnectionRules>\n")
        };
        std::fs::write(partials[0].output()?, rule("Z"))?;
        std::fs::write(partials[1].output()?, rule("A"))?;
        task.merge(&partials)?;
        let doc = Document::load(&task.output)?;
        let froms: Vec<&str> = doc.rules.iter().map(|r| r.attrs[0].1.as_str()).collect();
        assert_eq!(vec!["Z", "A"], froms);
        Ok(())
    }
}
