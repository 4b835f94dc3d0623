/// High-level command line app
mod app;
/// Definition of command-line args
mod args;
/// Removing partial recipes and job logs
mod clean;
/// Job submission and polling
pub mod exec;
/// Filesystem operations
mod fs;
/// Per-region recipes merged into one
pub mod full;
/// Single recipe generation
mod generate;
/// Cached per-region recipes
pub mod partial;
/// Configuration file schemas
mod schema;
/// Interpreted run settings
mod settings;
/// Text UI
mod ui;

// exported for tests:
pub use app::App;
pub use args::{Args, Command, GenerateArgs, RunArgs};
pub use settings::Settings;

/// Run the command-line app.
pub fn run() -> Result<(), anyhow::Error> {
    use clap::Parser;
    let args = Args::parse();

    // INTERPRET SETTINGS ///////////////
    let settings: Settings = args.try_into()?;
    settings.log().apply();

    // RUN THE THING /////////////////
    let app = App::new(settings);
    app.run()?;

    Ok(())
}
