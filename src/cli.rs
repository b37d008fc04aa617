//! CLI argument parsing for the itinerary-worker binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "itinerary-worker", about = "Itinerary timeline scheduler")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the worker server (default if no subcommand given)
    Serve,
    /// Run database migrations and exit
    Migrate,
    /// Build a trip plan from a JSON file with trip, points and windows
    Plan {
        /// Planning input JSON
        #[arg(long, short)]
        input: PathBuf,
        /// Write the plan here instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Compare two plan JSON files leg by leg
    Diff {
        a: PathBuf,
        b: PathBuf,
    },
}
