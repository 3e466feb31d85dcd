use anyhow::{Context, Result};
use clap::Parser;
use solver_config::{Config, ConfigLoader};
use solver_core::SolverBuilder;
use solver_service::cli::{Cli, Command};
use solver_service::signals::shutdown_signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
	let cli = Cli::parse();

	let config = ConfigLoader::new()
		.with_file(&cli.config)
		.load()
		.await
		.with_context(|| format!("Failed to load configuration from {:?}", cli.config))?;

	setup_tracing(cli.log_filter(&config.solver.log_level));

	match cli.command {
		Some(Command::Start) | None => start_solver(config).await,
		Some(Command::Validate) => {
			describe_config(&config);
			info!("Configuration is valid");
			Ok(())
		}
	}
}

async fn start_solver(config: Config) -> Result<()> {
	describe_config(&config);

	let mut engine = SolverBuilder::new(config)
		.build()
		.await
		.context("Failed to build solver")?;

	engine
		.run(shutdown_signal())
		.await
		.context("Solver stopped with an error")?;

	info!("Solver stopped");
	Ok(())
}

fn describe_config(config: &Config) {
	info!(
		solver = %config.solver.name,
		rpc = %config.solana.rpc_url,
		matching_engine = %config.solana.matching_engine_program,
		offer_token = %config.solver.offer_token,
		emitters = config.wormhole.emitters.len(),
		priced_chains = config.pricing.len(),
		storage = %config.storage.backend,
		"Loaded configuration"
	);
}

/// `RUST_LOG` wins over the configured level.
fn setup_tracing(log_level: &str) {
	let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

	tracing_subscriber::registry()
		.with(env_filter)
		.with(tracing_subscriber::fmt::layer())
		.init();
}
