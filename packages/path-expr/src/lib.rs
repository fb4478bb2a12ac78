//! Path expressions: the pattern language used to declare projections.
//!
//! A path expression such as `/a/*/c[@title]` or `repo:ws://(b|c)` is
//! compiled once into a [`PathPattern`] and then matched against any number
//! of concrete paths, each producing an independent [`Match`].
//!
//! This crate is the leaf of the fedstore stack and has no dependency on
//! the graph model; paths are handled as strings.
//!
//! # Example
//!
//! ```rust
//! use fedstore_path_expr::PathPattern;
//!
//! let pattern = PathPattern::compile("/a/*").unwrap();
//! assert!(pattern.matcher("/a/b").matches());
//! assert!(!pattern.matcher("/a/b/c").matches());
//! ```

mod error;
mod pattern;
mod predicates;
mod repository_path;
mod translate;

pub use error::ExpressionError;
pub use pattern::{Match, PathPattern};
pub use predicates::{remove_all_predicates_except_indexes, remove_unused_predicates};
pub use repository_path::RepositoryPath;
