//! Events delivered to the engine's dispatch loop.

use crate::matching_engine::AuctionUpdated;
use crate::vaa::Vaa;
use serde::{Deserialize, Serialize};

/// Input to the single-threaded dispatch loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SolverEvent {
	/// The matching engine reported a new best offer.
	AuctionUpdated(AuctionUpdated),
	/// Chain time advanced to this slot.
	SlotTick(u64),
	/// A VAA from a watched token-router emitter.
	VaaObserved(ObservedVaa),
}

/// A VAA together with the source transaction that published it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservedVaa {
	pub vaa: Vaa,
	pub tx_hash: Option<String>,
}
