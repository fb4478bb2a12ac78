//! In-memory graph sources.
//!
//! An [`InMemoryRepository`] holds any number of named sources, each with
//! named workspaces of graph nodes. It implements [`fedstore_core::WorkSource`],
//! so it can back a federation directly.

mod repository;

pub use repository::{InMemoryConnection, InMemoryRepository, DEFAULT_WORKSPACE};
