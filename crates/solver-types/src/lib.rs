//! Shared types for the fast-transfer auction solver.
//!
//! Contains the liquidity-layer message codec, the Wormhole VAA envelope,
//! Solana address helpers, matching-engine account and event layouts, and
//! the transaction and event types passed between services.

pub mod errors;
pub mod events;
pub mod matching_engine;
pub mod messages;
pub mod pubkey;
pub mod transaction;
pub mod vaa;

pub use errors::*;
pub use events::*;
pub use matching_engine::{
	anchor_discriminator, security_deposit, Auction, AuctionConfig, AuctionInfo, AuctionStatus, AuctionUpdated,
	LayoutError, MessageProtocol, ProgramAddresses,
};
pub use messages::*;
pub use pubkey::{programs, Pubkey};
pub use transaction::*;
pub use vaa::{keccak256, PostedVaa, Vaa, VaaBody};
