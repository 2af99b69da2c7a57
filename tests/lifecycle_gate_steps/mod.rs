//! Step definitions for lifecycle gate BDD scenarios.

mod given;
mod then;
mod when;
