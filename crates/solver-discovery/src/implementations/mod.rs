//! Discovery source implementations.
//!
//! - `solana`: matching-engine events and slot ticks from the cluster
//! - `wormhole`: signed VAAs from the guardian API

pub mod solana;
pub mod wormhole;
