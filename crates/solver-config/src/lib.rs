// solver-config/src/lib.rs

use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::warn;

pub mod serde_helpers;
pub mod types;

pub use types::*;

use solver_types::{Classify, ErrorClass};

/// Fixed-point denominator for pricing parameters.
const PRICING_PRECISION: u64 = 10_000;

#[derive(Error, Debug)]
pub enum ConfigError {
	#[error("File not found: {0}")]
	FileNotFound(String),

	#[error("Parse error: {0}")]
	ParseError(String),

	#[error("Validation error: {0}")]
	ValidationError(String),

	#[error("Environment variable not found: {0}")]
	EnvVarNotFound(String),

	#[error("IO error: {0}")]
	IoError(#[from] std::io::Error),
}

impl Classify for ConfigError {
	fn class(&self) -> ErrorClass {
		ErrorClass::Fatal
	}
}

/// Configuration loader with environment variable substitution
#[derive(Default)]
pub struct ConfigLoader {
	file_path: Option<String>,
	env_prefix: String,
}

impl ConfigLoader {
	pub fn new() -> Self {
		Self {
			file_path: None,
			env_prefix: "SOLVER_".to_string(),
		}
	}

	pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
		self.file_path = Some(path.as_ref().to_string_lossy().to_string());
		self
	}

	pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.env_prefix = prefix.into();
		self
	}

	pub async fn load(&self) -> Result<Config, ConfigError> {
		let file_path = self.file_path.as_ref().ok_or_else(|| {
			ConfigError::FileNotFound("No configuration file specified".to_string())
		})?;

		if !Path::new(file_path).exists() {
			return Err(ConfigError::FileNotFound(file_path.clone()));
		}

		let content = tokio::fs::read_to_string(file_path).await?;
		self.load_from_str(&content)
	}

	/// Parses, overrides and validates configuration text.
	pub fn load_from_str(&self, content: &str) -> Result<Config, ConfigError> {
		let substituted = substitute_env_vars(content)?;

		let mut config: Config =
			toml::from_str(&substituted).map_err(|e| ConfigError::ParseError(e.to_string()))?;

		self.apply_env_overrides(&mut config)?;
		validate_config(&config)?;

		Ok(config)
	}

	fn apply_env_overrides(&self, config: &mut Config) -> Result<(), ConfigError> {
		if let Ok(log_level) = env::var(format!("{}LOG_LEVEL", self.env_prefix)) {
			config.solver.log_level = log_level;
		}

		if let Ok(rpc_url) = env::var(format!("{}SOLANA_RPC_URL", self.env_prefix)) {
			config.solana.rpc_url = rpc_url;
		}

		if let Ok(keypair) = env::var(format!("{}KEYPAIR", self.env_prefix)) {
			config.solver.keypair = keypair;
		}

		if let Ok(capacity) = env::var(format!("{}EVENT_CHANNEL_CAPACITY", self.env_prefix)) {
			config.solver.event_channel_capacity = capacity.parse().map_err(|e| {
				ConfigError::ValidationError(format!("Invalid event channel capacity: {}", e))
			})?;
		}

		Ok(())
	}
}

/// Replaces `${VAR_NAME}` patterns with environment values.
fn substitute_env_vars(content: &str) -> Result<String, ConfigError> {
	let mut result = content.to_string();

	let re = regex::Regex::new(r"\$\{([^}]+)\}")
		.map_err(|e| ConfigError::ParseError(e.to_string()))?;

	for cap in re.captures_iter(content) {
		let full_match = &cap[0];
		let var_name = &cap[1];

		let env_value =
			env::var(var_name).map_err(|_| ConfigError::EnvVarNotFound(var_name.to_string()))?;

		result = result.replace(full_match, &env_value);
	}

	Ok(result)
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
	if config.solver.keypair.trim().is_empty() {
		return Err(ConfigError::ValidationError(
			"solver.keypair must be set".to_string(),
		));
	}

	if config.solver.event_channel_capacity == 0 {
		return Err(ConfigError::ValidationError(
			"solver.event_channel_capacity must be greater than zero".to_string(),
		));
	}

	if config.message_layout().is_none() {
		return Err(ConfigError::ValidationError(format!(
			"auction.fast_fill_amount_bytes must be 8 or 16, got {}",
			config.auction.fast_fill_amount_bytes
		)));
	}

	for (chain, pricing) in &config.pricing {
		if pricing.probability == 0 || pricing.probability > PRICING_PRECISION {
			return Err(ConfigError::ValidationError(format!(
				"pricing.{}.probability must be in (0, {}]",
				chain, PRICING_PRECISION
			)));
		}
	}

	if config.delivery.blockhash_refresh_slots == 0 {
		return Err(ConfigError::ValidationError(
			"delivery.blockhash_refresh_slots must be greater than zero".to_string(),
		));
	}

	for emitter in &config.wormhole.emitters {
		if emitter.address_bytes().is_none() {
			return Err(ConfigError::ValidationError(format!(
				"wormhole emitter for chain {} must be a 32-byte hex address",
				emitter.chain
			)));
		}
		if !config.evm.contains_key(&emitter.chain) {
			warn!(
				chain = emitter.chain,
				"No source-chain RPC configured; auctions from this chain cannot be settled"
			);
		}
	}

	match config.storage.backend.as_str() {
		"memory" => {}
		"file" => {
			if config.storage.path.is_none() {
				return Err(ConfigError::ValidationError(
					"storage.path is required for the file backend".to_string(),
				));
			}
		}
		other => {
			return Err(ConfigError::ValidationError(format!(
				"Unknown storage backend: {}",
				other
			)));
		}
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;

	const BASE: &str = r#"
		[solver]
		name = "test-solver"
		keypair = "${SOLVER_TEST_KEYPAIR_A}"
		offer_token = "11111111111111111111111111111111"

		[solana]
		rpc_url = "http://localhost:8899"
		matching_engine_program = "mPydpGUWxzERTNpyvTKdvS7v8kvw5sgwfiP8WQFrXVS"
		core_bridge_program = "3u8hJUVTA4jH1wYAyUur7FFZVQ8H635K3tSHHF4ssjQ5"

		[auction]
		security_deposit_base = 4200000
		security_deposit_bps = 5000
		fast_fill_amount_bytes = 8

		[pricing.6]
		probability = 9900
		edge_pct_of_fv = 100

		[delivery]

		[wormhole]
		api_url = "https://api.testnet.wormholescan.io"
		emitters = [{ chain = 6, address = "0000000000000000000000008cd7d6a7ba6f6acd5e3f9f0b6a7a5ccc3a41e8b2" }]

		[circle]
		api_url = "https://iris-api-sandbox.circle.com"

		[evm.6]
		rpc_url = "http://localhost:8545"
	"#;

	fn loader() -> ConfigLoader {
		// Isolated prefix so overrides from the real environment do not leak in.
		ConfigLoader::new().with_env_prefix("SOLVER_CONFIG_TEST_")
	}

	#[test]
	fn test_load_with_substitution_and_defaults() {
		std::env::set_var("SOLVER_TEST_KEYPAIR_A", "secret");

		let config = loader().load_from_str(BASE).unwrap();

		assert_eq!(config.solver.keypair, "secret");
		assert_eq!(config.solver.event_channel_capacity, 1024);
		assert_eq!(config.solana.commitment, "confirmed");
		assert_eq!(config.delivery.max_retries, 3);
		assert!(config.delivery.skip_preflight_bids);
		assert_eq!(
			config.pricing.get(&6),
			Some(&PricingConfig {
				probability: 9900,
				edge_pct_of_fv: 100
			})
		);
		assert_eq!(config.wormhole.backoff.max_attempts, Some(10));
		assert_eq!(config.circle.backoff.max_attempts, None);
		assert_eq!(config.solana.posted_vaa_backoff.max_attempts, Some(6));
		assert_eq!(config.storage, StorageConfig::default());
		assert_eq!(config.own_offer_tokens().len(), 1);
		assert_eq!(
			config.solana.usdc_mint.to_string(),
			"EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v"
		);
		assert_eq!(
			config.wormhole.emitters[0].address_bytes().map(|b| b[31]),
			Some(0xb2)
		);
	}

	#[test]
	fn test_missing_env_var() {
		let content = BASE.replace("SOLVER_TEST_KEYPAIR_A", "SOLVER_TEST_DEFINITELY_UNSET");
		let err = loader().load_from_str(&content).unwrap_err();
		assert!(matches!(err, ConfigError::EnvVarNotFound(name) if name == "SOLVER_TEST_DEFINITELY_UNSET"));
	}

	#[test]
	fn test_invalid_fast_fill_width() {
		let content = BASE
			.replace("${SOLVER_TEST_KEYPAIR_A}", "secret")
			.replace("fast_fill_amount_bytes = 8", "fast_fill_amount_bytes = 12");
		let err = loader().load_from_str(&content).unwrap_err();
		assert!(matches!(err, ConfigError::ValidationError(_)));
	}

	#[test]
	fn test_invalid_probability() {
		let content = BASE
			.replace("${SOLVER_TEST_KEYPAIR_A}", "secret")
			.replace("probability = 9900", "probability = 10001");
		let err = loader().load_from_str(&content).unwrap_err();
		assert!(matches!(err, ConfigError::ValidationError(msg) if msg.contains("probability")));
	}

	#[test]
	fn test_file_backend_requires_path() {
		let content = format!(
			"{}\n[storage]\nbackend = \"file\"\n",
			BASE.replace("${SOLVER_TEST_KEYPAIR_A}", "secret")
		);
		let err = loader().load_from_str(&content).unwrap_err();
		assert!(matches!(err, ConfigError::ValidationError(msg) if msg.contains("storage.path")));
	}

	#[test]
	fn test_env_override() {
		std::env::set_var("SOLVER_OVERRIDE_TEST_SOLANA_RPC_URL", "http://override:8899");
		let content = BASE.replace("${SOLVER_TEST_KEYPAIR_A}", "secret");

		let config = ConfigLoader::new()
			.with_env_prefix("SOLVER_OVERRIDE_TEST_")
			.load_from_str(&content)
			.unwrap();

		assert_eq!(config.solana.rpc_url, "http://override:8899");
	}

	#[tokio::test]
	async fn test_load_from_file() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		file.write_all(BASE.replace("${SOLVER_TEST_KEYPAIR_A}", "secret").as_bytes())
			.unwrap();

		let config = loader().with_file(file.path()).load().await.unwrap();
		assert_eq!(config.solver.name, "test-solver");
	}

	#[tokio::test]
	async fn test_missing_file() {
		let err = loader()
			.with_file("/nonexistent/solver.toml")
			.load()
			.await
			.unwrap_err();
		assert!(matches!(err, ConfigError::FileNotFound(_)));
	}
}
