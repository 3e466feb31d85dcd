//! Attestation service clients.

pub mod iris;
