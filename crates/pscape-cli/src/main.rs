//! CLI frontend for the PastoralScape livestock and disease simulation.

mod commands;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "pscape",
    about = "PastoralScape: pastoralist livestock and disease simulation",
    version,
    propagate_version = true
)]
struct Cli {
    /// Log engine progress to stderr (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a template parameter file
    Init {
        /// Name of the parameter file to create (".yaml" is appended if missing)
        name: String,
    },

    /// Validate a parameter file and show the scheduled calendar
    Check {
        /// Parameter file (default: built-in parameters)
        #[arg(short, long)]
        params: Option<PathBuf>,
    },

    /// Run the simulation and summarize the results
    Run {
        /// Parameter file (default: built-in parameters)
        #[arg(short, long)]
        params: Option<PathBuf>,

        /// RNG seed of the first run (default: the seed in the parameters)
        #[arg(short, long)]
        seed: Option<u64>,

        /// Number of runs with consecutive seeds
        #[arg(long, default_value = "1")]
        seeds: u32,

        /// Keep at most this many occupancy and herd records per run (0: all)
        #[arg(long)]
        max_records: Option<usize>,

        /// Print the summaries as JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Init { name } => commands::init::run(&name),
        Commands::Check { params } => commands::check::run(params.as_deref()),
        Commands::Run {
            params,
            seed,
            seeds,
            max_records,
            json,
        } => commands::run::run(params.as_deref(), seed, seeds, max_records, json),
    };
    if let Err(e) = result {
        eprintln!("error: {e}");
        process::exit(1);
    }
}
