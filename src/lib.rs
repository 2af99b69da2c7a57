//! Stagegate: lifecycle pipeline engine for epics.
//!
//! Epics progress through a fixed sequence of production stages, from
//! research to release. Gate enforcement can block out-of-order progress.
//! State lives in a canonical per-epic manifest and is projected into a
//! queryable relational mirror.
//!
//! # Architecture
//!
//! Stagegate follows hexagonal architecture principles:
//!
//! - **Domain**: Pure business logic with no infrastructure dependencies
//! - **Ports**: Abstract trait interfaces for persistence
//! - **Adapters**: Concrete implementations of ports (filesystem, database)
//!
//! # Modules
//!
//! - [`lifecycle`]: Stage catalog, state machine, manifests, gates, and the
//!   relational mirror

pub mod lifecycle;
