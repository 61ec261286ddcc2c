//! Testing infrastructure for ocmonitor integration tests.
//!
//! This crate provides utilities for writing robust integration tests:
//! - `TestWorld`: isolated OpenCode data directory plus CLI runner
//! - `fixtures`: SQLite database and flat-file store builders

pub mod fixtures;
pub mod world;

pub use fixtures::{FileStoreFixture, MessageSpec, SqliteFixture};
pub use world::TestWorld;
