//! Command-line interface definitions.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "solver-service")]
#[command(about = "Fast-transfer auction solver for the Wormhole liquidity layer", long_about = None)]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
	/// Path to configuration file
	#[arg(short, long, value_name = "FILE", env = "SOLVER_CONFIG", default_value = "config/solver.toml")]
	pub config: PathBuf,

	/// Log level override (trace, debug, info, warn, error)
	#[arg(short, long, env = "SOLVER_LOG_LEVEL")]
	pub log_level: Option<String>,

	#[command(subcommand)]
	pub command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
	/// Run the solver until interrupted
	Start,
	/// Validate the configuration file and exit
	Validate,
}

impl Cli {
	/// Filter directive for the subscriber: the flag wins over the config value.
	pub fn log_filter<'a>(&'a self, configured: &'a str) -> &'a str {
		self.log_level.as_deref().unwrap_or(configured)
	}
}
