use std::path::Path;

use anyhow::{Context, Result};

use crate::clean::Cleaner;
use crate::exec::ExecutorConfig;
use crate::fs::Fs;
use crate::full::{FullRecipeTask, MergeConfig};
use crate::generate::Generation;
use crate::partial::PartialRecipeTask;
use crate::schema::Schema;
use crate::settings::{Action, Generate, Run, Settings};
use crate::ui::Ui;

/// This struct actually runs the command-line app.
pub struct App {
    /// Interpreted command line settings
    settings: Settings,
    /// User interface
    ui: Ui,
}

impl App {
    /// Create a new `App`.
    pub fn new(settings: Settings) -> Self {
        let ui = Ui::new(&settings);
        Self { settings, ui }
    }

    /// Run the app, using settings to determine which action to take.
    pub fn run(mut self) -> Result<()> {
        match self.settings.action.clone() {
            Action::Generate(generate) => self.generate(&generate),
            Action::Run(run) => self.run_full(&run),
            Action::Clean { workdir } => self.clean(&workdir),
            Action::Partial { task } => self.partial(&task),
        }
    }

    fn generate(&mut self, settings: &Generate) -> Result<()> {
        if !settings.skip_validation {
            self.validate(Schema::Strategies, &settings.strategies)?;
        }
        self.ui
            .verbose_progress_debug("Reading strategies", &settings.strategies);
        let strategies = recipe::load_strategies(&settings.strategies)?;
        self.ui.done();

        self.ui.verbose_progress("Generating recipe");
        self.ui.start_timer();
        let generation = Generation {
            dataset: &settings.dataset,
            strategies: &strategies,
            seed: settings.seed,
            jobs: settings.jobs,
            log: self.settings.log(),
        };
        let n = generation
            .write(&settings.output)
            .context("while generating recipe")?;
        self.ui.done();
        self.ui.print_elapsed("Generating recipe");

        self.ui
            .success(&format!("Wrote {n} pathways to {:?}.", settings.output));
        Ok(())
    }

    fn run_full(&mut self, settings: &Run) -> Result<()> {
        if !settings.skip_validation {
            self.validate(Schema::MergeConfig, &settings.config)?;
            self.validate(Schema::ExecutorConfig, &settings.executor)?;
        }
        self.ui.verbose_msg(&format!("Using work directory {:?}", settings.workdir));
        let task = FullRecipeTask {
            config: MergeConfig::load(&settings.config)?,
            executor: ExecutorConfig::load(&settings.executor)?,
            dataset: settings.dataset.clone(),
            workdir: settings.workdir.clone(),
            output: settings.output.clone(),
            seed: settings.seed,
            jobs: settings.jobs,
            log: self.settings.log(),
        };
        log::info!(
            "Running main task with {} regions, seed {}, jobs {}",
            task.config.regions.len(),
            task.seed,
            task.jobs
        );
        task.run(&mut self.ui).context("while running full recipe task")?;
        self.ui
            .success(&format!("Wrote merged recipe to {:?}.", settings.output));
        Ok(())
    }

    fn clean(&mut self, workdir: &Path) -> Result<()> {
        if !workdir.exists() {
            log::warn!("Work directory {:?} doesn't exist; nothing to clean", workdir);
            return Ok(());
        }
        let mut fs = Fs::new(workdir);
        fs.ensure_workdir_exists(self.ui.verbose)?;
        let _lock = fs.lock()?;
        Cleaner::new(&fs, &self.ui).clean()
    }

    fn validate(&self, schema: Schema, path: &Path) -> Result<()> {
        self.ui
            .verbose_progress_debug(&format!("Validating {}", schema.name()), path);
        schema.validate_file(path)?;
        self.ui.done();
        Ok(())
    }

    /// Job entry point: the task configures its own logging.
    fn partial(&mut self, task_file: &Path) -> Result<()> {
        let task = PartialRecipeTask::load(task_file)?;
        task.run()
            .with_context(|| format!("while running partial task {:?}", task.name()))
    }
}
