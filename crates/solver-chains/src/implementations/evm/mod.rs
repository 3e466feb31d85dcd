//! EVM source-chain access.
//!
//! Only receipts are read: the settlement path needs the logs of the
//! transaction that published a finalized message, nothing else.

mod alloy;

pub use self::alloy::AlloySourceChain;
