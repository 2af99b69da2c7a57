//! Epic lifecycle pipeline.
//!
//! Epics move through nine ordered stages from research to release. This
//! module follows a hexagonal layout:
//!
//! - `domain`: stage catalog, transition rules, the pipeline state machine,
//!   manifests, gate admission, and the relational projection
//! - `ports`: manifest store and relational mirror contracts
//! - `adapters`: filesystem, in-memory, and `PostgreSQL` implementations
//! - `services`: manifest operations, mirror synchronization, and pipeline
//!   operations
//! - `config`: enforcement-mode resolution

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
