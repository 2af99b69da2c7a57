//! Unit tests for the lifecycle module.
