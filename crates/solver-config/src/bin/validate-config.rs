//! Configuration validation utility
//!
//! Usage: cargo run --bin validate-config config/solver.toml

use std::env;
use std::process;

use solver_config::ConfigLoader;

#[tokio::main]
async fn main() {
	let args: Vec<String> = env::args().collect();

	if args.len() != 2 {
		eprintln!("Usage: {} <config-file>", args[0]);
		process::exit(1);
	}

	let config_path = &args[1];

	println!("Validating configuration file: {}", config_path);

	match ConfigLoader::new().with_file(config_path).load().await {
		Ok(config) => {
			println!("✅ Configuration is valid!");
			println!("Solver name: {}", config.solver.name);
			println!("Matching engine: {}", config.solana.matching_engine_program);
			println!("Offer token: {}", config.solver.offer_token);
			println!(
				"Priced source chains: {:?}",
				config.pricing.keys().collect::<Vec<_>>()
			);
			println!("Watched emitters: {}", config.wormhole.emitters.len());
			println!(
				"Durable nonce: {}",
				config
					.solana
					.nonce_account
					.map(|n| n.to_string())
					.unwrap_or_else(|| "disabled".to_string())
			);
			println!("Storage backend: {}", config.storage.backend);
		}
		Err(e) => {
			eprintln!("❌ Configuration validation failed:");
			eprintln!("{}", e);
			process::exit(1);
		}
	}
}
