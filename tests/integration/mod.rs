//! Integration test suite for godeps-cache
//!
//! End-to-end tests that exercise the library facade and the `godeps-cache`
//! binary against real temporary cache roots.
//!
//! # Running Integration Tests
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//!
//! - **cli_commands**: `init`, `path`, `status`, `mark` and `exec` behavior
//! - **concurrency**: Mutual exclusion and parallelism between cache handles
//! - **cross_process**: Locking and initialization across OS processes
//! - **lock_lifecycle**: Release on failure, panic and cancellation
//! - **staleness**: Markers, TTL, offline and forced refresh

// Shared test utilities (from parent tests/ directory)
#[path = "../common/mod.rs"]
mod common;

mod cli_commands;
mod staleness;
