//! Test utilities for GraphNest integration tests
//!
//! - `fake_engine`: a scripted in-memory engine over `MemoryFs`
//! - `test_fixture`: the session layer wired to that engine
//!
//! Every fixture owns its own filesystem and key-value store, so tests can
//! run in parallel.

#![allow(dead_code)]

pub mod fake_engine;
pub mod test_fixture;
