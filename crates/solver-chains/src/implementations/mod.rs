//! Chain client implementations.
//!
//! - `solana`: nonblocking `solana-client` wrapper for the destination cluster
//! - `evm`: alloy-backed reader for source-chain transaction logs
//! - `wormholescan`: REST client for signed VAAs

pub mod evm;
pub mod solana;
pub mod wormholescan;
