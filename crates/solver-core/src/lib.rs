//! # Solver Core
//!
//! The engine that ties discovery, offers, delivery and settlement together.
//!
//! Discovery sources push [`SolverEvent`]s into one bounded channel. The
//! dispatch loop in [`SolverEngine::run`] feeds each event to the
//! [`EventHandler`], which owns the auction scheduler and decides what to do
//! synchronously. Every resulting action that needs the network runs as its
//! own task, so a slow settlement never delays a bid on another auction.
//!
//! Every outcome is written to the audit ledger in [`StorageService`].

use serde::{Deserialize, Serialize};
use solver_account::{create_account, AccountInterface, AccountService};
use solver_chains::{
	ChainClient, RetryPolicy, SolanaRpcClient, SourceChainRegistry, WormholeClient,
	WormholescanClient,
};
use solver_config::{BackoffConfig, Config, StorageConfig};
use solver_delivery::DeliveryService;
use solver_discovery::{
	AuctionEventDiscovery, DiscoveryInterface, DiscoveryService, SlotDiscovery, VaaDiscovery,
};
use solver_order::{
	CctpPrograms, FairValueStrategy, MatchingEngineInstructions, OfferOutcome, OfferSettings,
	OrderService, SkipReason, VaaSource,
};
use solver_settlement::{
	AbandonReason, CircleClient, IrisClient, SettlementClients, SettlementOutcome,
	SettlementService, SettlementSettings,
};
use solver_storage::{create_storage, namespaces, StorageInterface, StorageService};
use solver_types::{
	Classify, ComputeBudget, ObservedVaa, Pubkey, SolverEvent, SubmissionOutcome,
};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

pub mod error;
pub mod handler;
pub mod scheduler;

pub use error::CoreError;
pub use handler::{Action, EventHandler};
pub use scheduler::{AuctionScheduler, PendingAuction};

/// Ledger entry for an offer decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BidRecord {
	pub auction: Pubkey,
	pub improvement: bool,
	pub offer_price: Option<u64>,
	pub skipped: Option<SkipReason>,
	pub submission: Option<SubmissionOutcome>,
	pub recorded_at: i64,
}

/// Ledger entry for an execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
	pub auction: Pubkey,
	pub submission: SubmissionOutcome,
	pub recorded_at: i64,
}

/// Ledger entry for a settlement attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementRecord {
	pub sequence: u64,
	pub auction: Option<Pubkey>,
	pub abandoned: Option<AbandonReason>,
	pub submission: Option<SubmissionOutcome>,
	pub recorded_at: i64,
}

/// Services shared by the spawned action tasks.
#[derive(Clone)]
struct Services {
	storage: Arc<StorageService>,
	delivery: Arc<DeliveryService>,
	order: Arc<OrderService>,
	settlement: Arc<SettlementService>,
	own_offer_tokens: Arc<Vec<Pubkey>>,
}

impl Services {
	async fn record<T: Serialize>(&self, namespace: &str, id: &str, record: &T) {
		if let Err(e) = self.storage.store(namespace, id, record).await {
			warn!(namespace, id, error = %e, "Failed to write ledger entry");
		}
	}

	async fn offer(&self, outcome: OfferOutcome, auction: Pubkey, improvement: bool) {
		let recorded_at = chrono::Utc::now().timestamp_millis();
		let record = match outcome {
			OfferOutcome::Skip(reason) => BidRecord {
				auction,
				improvement,
				offer_price: None,
				skipped: Some(reason),
				submission: None,
				recorded_at,
			},
			OfferOutcome::Bid {
				offer_price,
				transaction,
			} => {
				let submission = self.delivery.submit(transaction).await;
				BidRecord {
					auction,
					improvement,
					offer_price: Some(offer_price),
					skipped: None,
					submission: Some(submission),
					recorded_at,
				}
			}
		};
		let id = format!("{}-{}", auction, recorded_at);
		self.record(namespaces::BIDS, &id, &record).await;
	}

	async fn execute(&self, auction: Pubkey, fast_vaa: Option<Pubkey>) {
		let prepared = match self
			.order
			.prepare_execution(auction, fast_vaa, &self.own_offer_tokens)
			.await
		{
			Ok(Some(tx)) => tx,
			Ok(None) => return,
			Err(e) => {
				error!(%auction, error = %e, class = %e.class(), "Execution failed");
				return;
			}
		};

		let submission = self.delivery.submit(prepared).await;
		let record = ExecutionRecord {
			auction,
			submission,
			recorded_at: chrono::Utc::now().timestamp_millis(),
		};
		self.record(namespaces::EXECUTIONS, &auction.to_string(), &record)
			.await;
	}

	async fn settle(&self, finalized: ObservedVaa) {
		let sequence = finalized.vaa.body.sequence;
		let outcome = match self.settlement.settle(&finalized).await {
			Ok(outcome) => outcome,
			Err(e) => {
				error!(sequence, error = %e, class = %e.class(), "Settlement failed");
				return;
			}
		};

		let recorded_at = chrono::Utc::now().timestamp_millis();
		let record = match outcome {
			SettlementOutcome::Abandoned { auction, reason } => SettlementRecord {
				sequence,
				auction,
				abandoned: Some(reason),
				submission: None,
				recorded_at,
			},
			SettlementOutcome::Ready(tx) => {
				let auction = tx.auction;
				let submission = self.delivery.submit(tx).await;
				info!(
					%auction,
					sequence,
					success = submission.success,
					"Settlement submitted"
				);
				SettlementRecord {
					sequence,
					auction: Some(auction),
					abandoned: None,
					submission: Some(submission),
					recorded_at,
				}
			}
		};
		let id = format!(
			"{}-{}",
			finalized.vaa.body.emitter_chain, sequence
		);
		self.record(namespaces::SETTLEMENTS, &id, &record).await;
	}
}

pub struct SolverEngine {
	config: Config,
	discovery: Arc<DiscoveryService>,
	handler: EventHandler,
	services: Services,
}

impl SolverEngine {
	pub fn config(&self) -> &Config {
		&self.config
	}

	/// Runs the dispatch loop until `shutdown` resolves or every source is gone.
	pub async fn run<F>(&mut self, shutdown: F) -> Result<(), CoreError>
	where
		F: Future<Output = ()>,
	{
		let (event_tx, mut event_rx) =
			mpsc::channel(self.config.solver.event_channel_capacity.max(1));
		self.discovery.start_all(event_tx).await?;
		info!(solver = %self.config.solver.name, "Solver started");

		tokio::pin!(shutdown);
		loop {
			tokio::select! {
				event = event_rx.recv() => {
					let Some(event) = event else {
						warn!("Event channel closed");
						break;
					};
					self.dispatch(event);
				}

				_ = &mut shutdown => {
					info!("Shutting down solver");
					break;
				}
			}
		}

		self.discovery.stop_all().await?;
		Ok(())
	}

	fn dispatch(&mut self, event: SolverEvent) {
		for action in self.handler.handle(event) {
			let services = self.services.clone();
			match action {
				Action::RefreshBlockhash { slot } => services.delivery.spawn_refresh(slot),
				Action::ConsiderInitialOffer { vaa, order, slot } => {
					tokio::spawn(async move {
						match services.order.consider_initial_offer(&vaa, &order, slot).await {
							Ok(outcome) => {
								match services.order.instructions().auction(&vaa.digest()) {
									Ok(auction) => services.offer(outcome, auction, false).await,
									Err(e) => error!(error = %e, "Cannot derive auction"),
								}
							}
							Err(e) => error!(
								sequence = vaa.body.sequence,
								error = %e,
								class = %e.class(),
								"Initial offer failed"
							),
						}
					});
				}
				Action::ConsiderImprovement { update, slot } => {
					tokio::spawn(async move {
						match services.order.consider_improvement(&update, slot).await {
							Ok(outcome) => services.offer(outcome, update.auction, true).await,
							Err(e) => error!(
								auction = %update.auction,
								error = %e,
								class = %e.class(),
								"Improvement failed"
							),
						}
					});
				}
				Action::ExecuteFastOrder { auction, fast_vaa } => {
					tokio::spawn(async move { services.execute(auction, fast_vaa).await });
				}
				Action::Settle(finalized) => {
					tokio::spawn(async move { services.settle(finalized).await });
				}
			}
		}
	}
}

type ChainFactory = Box<dyn Fn(&Config) -> Result<Arc<dyn ChainClient>, CoreError> + Send>;
type WormholeFactory = Box<dyn Fn(&Config) -> Arc<dyn WormholeClient> + Send>;
type CircleFactory = Box<dyn Fn(&Config) -> Arc<dyn CircleClient> + Send>;
type SourceFactory = Box<dyn Fn(&Config) -> Result<SourceChainRegistry, CoreError> + Send>;
type AccountFactory =
	Box<dyn Fn(&Config) -> Result<Box<dyn AccountInterface>, CoreError> + Send>;
type StorageFactory =
	Box<dyn Fn(&StorageConfig) -> Result<Box<dyn StorageInterface>, CoreError> + Send>;

fn retry_policy(backoff: &BackoffConfig) -> RetryPolicy {
	RetryPolicy::exponential(
		backoff.initial(),
		backoff.max(),
		backoff.multiplier,
		backoff.max_attempts,
	)
}

// Factory pattern for creating services from config
pub struct SolverBuilder {
	config: Config,
	chain_factory: ChainFactory,
	wormhole_factory: WormholeFactory,
	circle_factory: CircleFactory,
	source_factory: SourceFactory,
	account_factory: AccountFactory,
	storage_factory: StorageFactory,
}

fn default_chain(config: &Config) -> Result<Arc<dyn ChainClient>, CoreError> {
	Ok(Arc::new(SolanaRpcClient::new(
		config.solana.rpc_url.clone(),
		&config.solana.commitment,
	)?))
}

fn default_wormhole(config: &Config) -> Arc<dyn WormholeClient> {
	Arc::new(WormholescanClient::new(config.wormhole.api_url.clone()))
}

fn default_circle(config: &Config) -> Arc<dyn CircleClient> {
	Arc::new(IrisClient::new(config.circle.api_url.clone()))
}

fn default_sources(config: &Config) -> Result<SourceChainRegistry, CoreError> {
	let endpoints: HashMap<u16, String> = config
		.evm
		.iter()
		.map(|(chain, evm)| (*chain, evm.rpc_url.clone()))
		.collect();
	Ok(SourceChainRegistry::with_endpoints(&endpoints)?)
}

fn default_account(config: &Config) -> Result<Box<dyn AccountInterface>, CoreError> {
	Ok(create_account(&config.solver.keypair)?)
}

fn default_storage(storage: &StorageConfig) -> Result<Box<dyn StorageInterface>, CoreError> {
	Ok(create_storage(&storage.backend, storage.path.as_deref())?)
}

impl SolverBuilder {
	/// Builder wired to the production clients.
	pub fn new(config: Config) -> Self {
		Self {
			config,
			chain_factory: Box::new(default_chain),
			wormhole_factory: Box::new(default_wormhole),
			circle_factory: Box::new(default_circle),
			source_factory: Box::new(default_sources),
			account_factory: Box::new(default_account),
			storage_factory: Box::new(default_storage),
		}
	}

	pub fn with_chain_factory<F>(mut self, factory: F) -> Self
	where
		F: Fn(&Config) -> Result<Arc<dyn ChainClient>, CoreError> + Send + 'static,
	{
		self.chain_factory = Box::new(factory);
		self
	}

	pub fn with_wormhole_factory<F>(mut self, factory: F) -> Self
	where
		F: Fn(&Config) -> Arc<dyn WormholeClient> + Send + 'static,
	{
		self.wormhole_factory = Box::new(factory);
		self
	}

	pub fn with_circle_factory<F>(mut self, factory: F) -> Self
	where
		F: Fn(&Config) -> Arc<dyn CircleClient> + Send + 'static,
	{
		self.circle_factory = Box::new(factory);
		self
	}

	pub fn with_source_factory<F>(mut self, factory: F) -> Self
	where
		F: Fn(&Config) -> Result<SourceChainRegistry, CoreError> + Send + 'static,
	{
		self.source_factory = Box::new(factory);
		self
	}

	pub fn with_account_factory<F>(mut self, factory: F) -> Self
	where
		F: Fn(&Config) -> Result<Box<dyn AccountInterface>, CoreError> + Send + 'static,
	{
		self.account_factory = Box::new(factory);
		self
	}

	pub fn with_storage_factory<F>(mut self, factory: F) -> Self
	where
		F: Fn(&StorageConfig) -> Result<Box<dyn StorageInterface>, CoreError> + Send + 'static,
	{
		self.storage_factory = Box::new(factory);
		self
	}

	pub async fn build(self) -> Result<SolverEngine, CoreError> {
		let config = self.config;
		let layout = config.message_layout().ok_or_else(|| {
			CoreError::Configuration(format!(
				"Unsupported fast fill amount width: {}",
				config.auction.fast_fill_amount_bytes
			))
		})?;

		let storage = Arc::new(StorageService::new((self.storage_factory)(&config.storage)?));
		let account = Arc::new(AccountService::new((self.account_factory)(&config)?));
		let chain = (self.chain_factory)(&config)?;
		let wormhole = (self.wormhole_factory)(&config);

		let delivery = Arc::new(
			DeliveryService::new(chain.clone(), account, config.delivery.clone()).await?,
		);
		let payer = delivery.signer();
		info!(%payer, "Solver signer loaded");

		let instructions = MatchingEngineInstructions::new(
			config.program_addresses(),
			CctpPrograms {
				token_messenger_minter: config.solana.token_messenger_minter_program,
				message_transmitter: config.solana.message_transmitter_program,
			},
			config.solana.usdc_mint,
		);
		let compute_budget = ComputeBudget {
			unit_limit: config.delivery.compute_unit_limit,
			unit_price_micro_lamports: config.delivery.compute_unit_price,
		};

		let mut emitters = Vec::new();
		for emitter in &config.wormhole.emitters {
			let address = emitter.address_bytes().ok_or_else(|| {
				CoreError::Configuration(format!("Invalid emitter address {}", emitter.address))
			})?;
			emitters.push((emitter.chain, address));
		}

		let order = Arc::new(
			OrderService::new(
				chain.clone(),
				Box::new(FairValueStrategy::new(config.pricing.clone())),
				instructions.clone(),
				layout,
				OfferSettings {
					payer,
					offer_token: config.solver.offer_token,
					config_id: config.auction.config_id,
					security_deposit_base: config.auction.security_deposit_base,
					security_deposit_bps: config.auction.security_deposit_bps,
					compute_budget,
					skip_preflight_bids: config.delivery.skip_preflight_bids,
					posted_retry: retry_policy(&config.solana.posted_vaa_backoff),
				},
			)
			.with_vaa_source(VaaSource {
				wormhole: wormhole.clone(),
				emitters: emitters.clone(),
			}),
		);

		let own_offer_tokens = config.own_offer_tokens();
		let mut settings =
			SettlementSettings::new(payer, config.solver.offer_token, own_offer_tokens.clone());
		settings.nonce_account = config.solana.nonce_account;
		settings.compute_budget = compute_budget;
		settings.vaa_retry = retry_policy(&config.wormhole.backoff);
		settings.attestation_retry = retry_policy(&config.circle.backoff);

		let settlement = Arc::new(SettlementService::new(
			SettlementClients {
				chain: chain.clone(),
				wormhole: wormhole.clone(),
				circle: (self.circle_factory)(&config),
				sources: Arc::new((self.source_factory)(&config)?),
			},
			instructions,
			layout,
			settings,
		));

		let sources: Vec<Box<dyn DiscoveryInterface>> = vec![
			Box::new(SlotDiscovery::new(
				chain.clone(),
				config.solana.poll_interval(),
				config.solana.max_tick_backfill,
			)),
			Box::new(AuctionEventDiscovery::new(
				chain.clone(),
				config.solana.matching_engine_program,
				config.solana.poll_interval(),
				config.solana.signature_page_size,
			)),
			Box::new(VaaDiscovery::new(
				wormhole,
				emitters,
				config.wormhole.poll_interval(),
				config.wormhole.page_size as usize,
			)),
		];

		let handler = EventHandler::new(
			own_offer_tokens.clone(),
			layout,
			config.delivery.blockhash_refresh_slots,
		);

		Ok(SolverEngine {
			discovery: Arc::new(DiscoveryService::new(sources)),
			handler,
			services: Services {
				storage,
				delivery,
				order,
				settlement,
				own_offer_tokens: Arc::new(own_offer_tokens),
			},
			config,
		})
	}
}
