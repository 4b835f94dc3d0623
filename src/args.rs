use clap::{Parser, Subcommand};

const CMD_NAME: &str = "s2f-recipe";
pub const DEFAULT_WORKDIR: &str = ".s2f_recipe";

/// Stores our command-line args format.
#[derive(Parser, Debug)]
#[command(name = CMD_NAME, version, about = None, long_about = None)]
pub struct Args {
    /// Print additional info (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate a recipe in this process
    Generate(GenerateArgs),
    /// Generate one partial recipe per region as separate jobs, then merge them
    Run(RunArgs),
    /// Delete partial recipes and job logs from the work directory
    Clean {
        /// Work directory holding partial recipes and job logs
        #[arg(short, long, value_name = "DIR", default_value = DEFAULT_WORKDIR)]
        #[arg(env = "S2F_RECIPE_WORKDIR")]
        workdir: String,
    },
    /// Compute a single partial recipe (job entry point)
    #[command(hide = true)]
    Partial {
        /// Serialized partial recipe task
        #[arg(long, value_name = "FILE")]
        task: String,
    },
}

#[derive(clap::Args, Debug)]
pub struct GenerateArgs {
    /// Dataset file
    #[arg(value_name = "DATASET")]
    pub dataset: String,

    /// Strategies file
    #[arg(short, long, value_name = "FILE")]
    pub strategies: String,

    /// Output recipe
    #[arg(short, long, value_name = "FILE")]
    pub output: String,

    /// Base seed for sampling
    #[arg(long, default_value_t = 0)]
    pub seed: u64,

    /// Number of workers; negative values count back from the number of cpus
    #[arg(short, long, default_value_t = -1, allow_negative_numbers = true)]
    pub jobs: i32,

    /// Don't check the strategies file against its schema
    #[arg(long)]
    pub skip_validation: bool,
}

#[derive(clap::Args, Debug)]
pub struct RunArgs {
    /// Dataset file
    #[arg(value_name = "DATASET")]
    pub dataset: String,

    /// Merge configuration, listing the strategies of each region
    #[arg(short, long, value_name = "FILE")]
    pub config: String,

    /// Executor configuration
    #[arg(short, long, value_name = "FILE")]
    pub executor: String,

    /// Output recipe
    #[arg(short, long, value_name = "FILE")]
    pub output: String,

    /// Work directory holding partial recipes and job logs
    #[arg(short, long, value_name = "DIR", default_value = DEFAULT_WORKDIR)]
    #[arg(env = "S2F_RECIPE_WORKDIR")]
    pub workdir: String,

    /// Base seed for sampling, shared by every region
    #[arg(long, default_value_t = 0)]
    pub seed: u64,

    /// Number of workers per job; negative values count back from the number of cpus
    #[arg(short, long, default_value_t = -1, allow_negative_numbers = true)]
    pub jobs: i32,

    /// Don't check the merge and executor configs against their schemas
    #[arg(long)]
    pub skip_validation: bool,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_generate() {
        let args = Args::parse_from([
            CMD_NAME, "-vv", "generate", "ds.yaml", "-s", "s.yaml", "-o", "out.xml", "-j", "-2",
        ]);
        assert_eq!(2, args.verbose);
        match args.command {
            Command::Generate(g) => {
                assert_eq!("ds.yaml", g.dataset);
                assert_eq!(-2, g.jobs);
                assert_eq!(0, g.seed);
                assert!(!g.skip_validation);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_run() {
        let args = Args::parse_from([
            CMD_NAME, "run", "ds.yaml", "-c", "m.yaml", "-e", "e.yaml", "-o", "out.xml",
            "--skip-validation",
        ]);
        match args.command {
            Command::Run(r) => {
                assert!(r.skip_validation);
                assert_eq!(DEFAULT_WORKDIR, r.workdir);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_partial() {
        let args = Args::parse_from([CMD_NAME, "partial", "--task", "t.json"]);
        assert_eq!(0, args.verbose);
        assert!(matches!(args.command, Command::Partial { task } if task == "t.json"));
    }

    #[test]
    fn test_verify() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }
}
