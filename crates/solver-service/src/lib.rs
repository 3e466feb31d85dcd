//! Service entry point for the fast-transfer auction solver.
//!
//! # Components
//!
//! - `cli`: command-line interface
//! - `signals`: process shutdown handling
//!
//! The binary loads configuration, installs the tracing subscriber, builds
//! the engine through [`solver_core::SolverBuilder`] and runs it until a
//! shutdown signal arrives.

pub mod cli;
pub mod signals;
