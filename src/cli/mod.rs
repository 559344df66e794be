//! CLI module for the split engine
//!
//! Provides subcommands for exercising the engine from a terminal:
//! - `simulate`: run synthetic visitors through one experiment

pub mod simulate;

use clap::{Parser, Subcommand};

/// PMP Split Engine - sticky weighted A/B assignment
#[derive(Parser)]
#[command(name = "pmp-split-engine")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Split synthetic visitors into an experiment and report the outcome
    Simulate(simulate::SimulateArgs),
}
