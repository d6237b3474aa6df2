//! Core types and error definitions for the Loom orchestrator.
//!
//! This crate provides the foundational pieces shared by the orchestration
//! crates: the error taxonomy and the clock abstraction the registry stamps
//! liveness timestamps with.
//!
//! # Main types
//!
//! - [`LoomError`]: Unified error enum for registry and dispatch failures.
//! - [`LoomResult`]: Convenience alias for `Result<T, LoomError>`.
//! - [`Clock`]: Injectable time source; [`SystemClock`] for production,
//!   [`ManualClock`] for deterministic tests.

/// Time sources.
pub mod clock;
/// Error taxonomy.
pub mod error;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{LoomError, LoomResult};
