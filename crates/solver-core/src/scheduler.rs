//! Auction scheduler.
//!
//! Auctions are bucketed by the slot at which they become executable. A tick
//! releases the bucket for exactly that slot; buckets for earlier slots that
//! were never ticked are discarded, so a solver that fell behind does not act
//! on stale auctions.

use solver_types::Pubkey;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Solver-side view of one open auction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAuction {
	pub auction: Pubkey,
	/// Posted fast VAA account, once known.
	pub fast_vaa: Option<Pubkey>,
	/// Whether the solver holds the best offer.
	pub execute: bool,
}

#[derive(Debug, Default)]
pub struct AuctionScheduler {
	/// End slot to auctions, in insertion order.
	slots: BTreeMap<u64, Vec<Pubkey>>,
	entries: HashMap<Pubkey, (u64, PendingAuction)>,
}

impl AuctionScheduler {
	pub fn new() -> Self {
		Self::default()
	}

	/// Schedules an auction for `end_slot`.
	///
	/// Re-adding a known auction behaves like [`update_auction`](Self::update_auction)
	/// and keeps its original slot; a `fast_vaa` fills in a missing one.
	pub fn add_auction(
		&mut self,
		end_slot: u64,
		auction: Pubkey,
		fast_vaa: Option<Pubkey>,
		execute: bool,
	) {
		if let Some((_, entry)) = self.entries.get_mut(&auction) {
			entry.execute = execute;
			if entry.fast_vaa.is_none() {
				entry.fast_vaa = fast_vaa;
			}
			return;
		}

		self.slots.entry(end_slot).or_default().push(auction);
		self.entries.insert(
			auction,
			(
				end_slot,
				PendingAuction {
					auction,
					fast_vaa,
					execute,
				},
			),
		);
	}

	/// Sets the execute flag of a scheduled auction in place.
	///
	/// Returns `false` for unknown auctions.
	pub fn update_auction(&mut self, auction: &Pubkey, execute: bool) -> bool {
		match self.entries.get_mut(auction) {
			Some((_, entry)) => {
				entry.execute = execute;
				true
			}
			None => false,
		}
	}

	pub fn contains(&self, auction: &Pubkey) -> bool {
		self.entries.contains_key(auction)
	}

	pub fn end_slot(&self, auction: &Pubkey) -> Option<u64> {
		self.entries.get(auction).map(|(slot, _)| *slot)
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// Smallest tracked end slot.
	pub fn next_slot(&self) -> Option<u64> {
		self.slots.keys().next().copied()
	}

	/// Releases every auction scheduled for exactly `slot`, executable or
	/// not, and drops the buckets of earlier slots.
	pub fn on_tick(&mut self, slot: u64) -> Vec<PendingAuction> {
		while let Some(first) = self.next_slot() {
			if first >= slot {
				break;
			}
			let stale = self.remove_slot(first);
			debug!(slot = first, dropped = stale.len(), "Dropping stale auction slot");
		}

		if self.next_slot() == Some(slot) {
			self.remove_slot(slot)
		} else {
			Vec::new()
		}
	}

	fn remove_slot(&mut self, slot: u64) -> Vec<PendingAuction> {
		self.slots
			.remove(&slot)
			.unwrap_or_default()
			.into_iter()
			.filter_map(|auction| self.entries.remove(&auction).map(|(_, entry)| entry))
			.collect()
	}
}
