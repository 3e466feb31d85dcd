//! Pure event handling.
//!
//! [`EventHandler`] owns the scheduler and turns each [`SolverEvent`] into
//! the [`Action`]s the engine should perform. It never touches the network,
//! which keeps every scheduling decision testable in isolation.

use crate::scheduler::AuctionScheduler;
use solver_types::{
	AuctionUpdated, FastMarketOrder, LiquidityLayerMessage, MessageLayout, ObservedVaa, Pubkey,
	SolverEvent, Vaa,
};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
	ConsiderInitialOffer {
		vaa: Vaa,
		order: FastMarketOrder,
		slot: u64,
	},
	ConsiderImprovement {
		update: AuctionUpdated,
		slot: u64,
	},
	/// `fast_vaa` is unknown for auctions only seen through improvements.
	ExecuteFastOrder {
		auction: Pubkey,
		fast_vaa: Option<Pubkey>,
	},
	Settle(ObservedVaa),
	RefreshBlockhash {
		slot: u64,
	},
}

pub struct EventHandler {
	scheduler: AuctionScheduler,
	own_offer_tokens: Vec<Pubkey>,
	layout: MessageLayout,
	blockhash_refresh_slots: u64,
	last_refresh: Option<u64>,
	current_slot: u64,
}

impl EventHandler {
	pub fn new(
		own_offer_tokens: Vec<Pubkey>,
		layout: MessageLayout,
		blockhash_refresh_slots: u64,
	) -> Self {
		Self {
			scheduler: AuctionScheduler::new(),
			own_offer_tokens,
			layout,
			blockhash_refresh_slots: blockhash_refresh_slots.max(1),
			last_refresh: None,
			current_slot: 0,
		}
	}

	pub fn scheduler(&self) -> &AuctionScheduler {
		&self.scheduler
	}

	pub fn current_slot(&self) -> u64 {
		self.current_slot
	}

	pub fn handle(&mut self, event: SolverEvent) -> Vec<Action> {
		match event {
			SolverEvent::AuctionUpdated(update) => self.on_auction_updated(update),
			SolverEvent::SlotTick(slot) => self.on_slot(slot),
			SolverEvent::VaaObserved(observed) => self.on_vaa(observed),
		}
	}

	fn on_auction_updated(&mut self, update: AuctionUpdated) -> Vec<Action> {
		let ours = self.own_offer_tokens.contains(&update.best_offer_token);
		// Executable from the first slot after the offer period.
		let execute_slot = update.end_slot.saturating_add(1);

		// Known auctions keep their slot; a late fast VAA address is merged in.
		if !self.scheduler.update_auction(&update.auction, ours) || update.vaa.is_some() {
			self.scheduler
				.add_auction(execute_slot, update.auction, update.vaa, ours);
		}
		debug!(
			auction = %update.auction,
			best_offer_token = %update.best_offer_token,
			ours,
			execute_slot,
			"Auction updated"
		);

		if ours {
			return Vec::new();
		}
		vec![Action::ConsiderImprovement {
			update,
			slot: self.current_slot,
		}]
	}

	fn on_slot(&mut self, slot: u64) -> Vec<Action> {
		if slot <= self.current_slot {
			return Vec::new();
		}
		self.current_slot = slot;

		let mut actions = Vec::new();
		let due = match self.last_refresh {
			Some(last) => slot.saturating_sub(last) >= self.blockhash_refresh_slots,
			None => true,
		};
		if due {
			self.last_refresh = Some(slot);
			actions.push(Action::RefreshBlockhash { slot });
		}

		for entry in self.scheduler.on_tick(slot) {
			if entry.execute {
				actions.push(Action::ExecuteFastOrder {
					auction: entry.auction,
					fast_vaa: entry.fast_vaa,
				});
			} else {
				debug!(auction = %entry.auction, slot, "Auction ended, not ours");
			}
		}
		actions
	}

	fn on_vaa(&mut self, observed: ObservedVaa) -> Vec<Action> {
		let sequence = observed.vaa.body.sequence;
		let message = match self.layout.decode(&observed.vaa.body.payload) {
			Ok(message) => message,
			Err(e) => {
				warn!(sequence, error = %e, "Ignoring undecodable VAA payload");
				return Vec::new();
			}
		};

		match message {
			LiquidityLayerMessage::FastMarketOrder(order) => {
				vec![Action::ConsiderInitialOffer {
					vaa: observed.vaa,
					order,
					slot: self.current_slot,
				}]
			}
			LiquidityLayerMessage::CctpDeposit(deposit)
				if deposit.slow_order_response().is_some() =>
			{
				vec![Action::Settle(observed)]
			}
			_ => {
				debug!(sequence, "Ignoring VAA without auction relevance");
				Vec::new()
			}
		}
	}
}
