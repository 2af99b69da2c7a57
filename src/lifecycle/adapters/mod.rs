//! Adapter implementations for lifecycle ports.
//!
//! - [`memory`]: thread-safe in-memory manifest store and mirror for tests
//! - [`fs`]: on-disk manifest store with atomic replace
//! - [`postgres`]: Diesel-backed relational mirror

pub mod fs;
pub mod memory;
pub mod postgres;
