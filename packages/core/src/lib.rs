//! Core fedstore: the graph model shared by sources and the federation layer.
//!
//! - `Path`: absolute graph path whose segments carry same-name-sibling indexes
//! - `Value` / `Node`: property values and the nodes that hold them
//! - `Request` / `Operation`: path-addressed commands, single or composite
//! - `Connection` / `WorkSource`: the boundary to a backing content source
//!
//! # Example
//!
//! ```rust
//! use fedstore_core::{path, Command, Operation, Request};
//!
//! let batch = Operation::Composite(vec![
//!     Request::new(Command::ReadNode { at: path!("/a") }),
//!     Request::new(Command::DeleteBranch { at: path!("/b") }),
//! ]);
//! assert_eq!(batch.size(), 2);
//! assert!(!batch.is_read_only());
//! ```

mod error;
mod node;
mod operation;
mod path;
mod path_trie;
mod traits;
mod value;

pub use error::Error;
pub use node::Node;
pub use operation::{Command, Operation, OperationResult, Request, Response};
pub use path::{Path, Segment};
pub use path_trie::PathTrie;
pub use traits::{Connection, WorkSource};
pub use value::Value;

pub use fedstore_path_expr::ExpressionError;
